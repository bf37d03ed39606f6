pub mod http;
#[cfg(test)]
pub mod memory;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::error::StoreError;

/// create-index 的结果。引擎侧的 create 是原子的 create-if-absent：
/// 并发创建同名索引时恰好一个成功，其余得到 `AlreadyExists`（不是错误）。
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum CreateOutcome {
    Created,
    AlreadyExists,
}

/// `_aliases` 单个动作，序列化为 `{"add": {"index": .., "alias": ..}}`
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AliasAction {
    Add { index: String, alias: String },
    Remove { index: String, alias: String },
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ReindexReport {
    pub total: u64,
    pub created: u64,
    pub updated: u64,
}

/// 存储引擎抽象：只暴露迁移需要的原语
#[async_trait]
pub trait SearchStore: Send + Sync {
    /// 绑定在 alias 上的物理索引名（无绑定时为空）
    async fn get_alias(&self, alias: &str) -> Result<Vec<String>, StoreError>;

    /// 物理索引的 live mapping；索引不存在时为 `None`
    async fn get_mapping(&self, index: &str) -> Result<Option<Value>, StoreError>;

    async fn create_index(&self, index: &str, body: &Value) -> Result<CreateOutcome, StoreError>;

    /// 索引中的文档数（已刷新部分）
    async fn count(&self, index: &str) -> Result<u64, StoreError>;

    /// 批量复制 from 的全部文档到 to，保留文档 ID；完成并刷新后返回
    async fn reindex(&self, from: &str, to: &str) -> Result<ReindexReport, StoreError>;

    /// 单请求内原子应用全部动作
    async fn update_aliases(&self, actions: &[AliasAction]) -> Result<(), StoreError>;

    async fn get_index_template(&self, name: &str) -> Result<Option<Value>, StoreError>;

    async fn put_index_template(&self, name: &str, body: &Value) -> Result<(), StoreError>;

    async fn get_pipeline(&self, id: &str) -> Result<Option<Value>, StoreError>;

    async fn put_pipeline(&self, id: &str, body: &Value) -> Result<(), StoreError>;
}

pub use http::HttpStore;
#[cfg(test)]
pub use memory::MemoryStore;
