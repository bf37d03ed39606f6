use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};

use crate::error::StoreError;
use crate::store::{AliasAction, CreateOutcome, ReindexReport, SearchStore};

/// 进程内存储引擎（仅测试）：语义上模拟 ES 的 create-if-absent / reindex / 原子 `_aliases`，
/// 附带调用计数与故障注入。
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemState>,
}

#[derive(Clone, Debug, Default)]
pub struct MemIndex {
    pub mappings: Value,
    pub settings: Value,
    pub docs: BTreeMap<String, Value>,
}

/// 变更类调用计数
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct CallCounts {
    pub create_index: usize,
    pub reindex: usize,
    pub update_aliases: usize,
    pub put_index_template: usize,
    pub put_pipeline: usize,
}

impl CallCounts {
    pub fn mutations(&self) -> usize {
        self.create_index
            + self.reindex
            + self.update_aliases
            + self.put_index_template
            + self.put_pipeline
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct Faults {
    pub unreachable: bool,
    pub fail_create: bool,
    pub fail_reindex: bool,
    pub fail_update_aliases: bool,
    /// `_aliases` 失败后引擎随即不可达
    pub disconnect_after_alias_failure: bool,
}

#[derive(Debug, Default)]
struct MemState {
    indices: BTreeMap<String, MemIndex>,
    aliases: BTreeMap<String, BTreeSet<String>>,
    templates: BTreeMap<String, Value>,
    pipelines: BTreeMap<String, Value>,
    calls: CallCounts,
    faults: Faults,
}

impl MemState {
    fn check_reachable(&self) -> Result<(), StoreError> {
        if self.faults.unreachable {
            Err(injected("GET /", 503, "connection refused"))
        } else {
            Ok(())
        }
    }
}

fn injected(endpoint: &str, status: u16, body: &str) -> StoreError {
    StoreError::Status {
        endpoint: endpoint.to_string(),
        status,
        body: body.to_string(),
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 直接放置一个物理索引（绕过计数），用于构造初始状态
    pub fn insert_index(&self, name: &str, mappings: Value) {
        self.state.lock().indices.insert(
            name.to_string(),
            MemIndex {
                mappings,
                settings: json!({}),
                docs: BTreeMap::new(),
            },
        );
    }

    pub fn insert_doc(&self, index: &str, id: &str, doc: Value) {
        if let Some(idx) = self.state.lock().indices.get_mut(index) {
            idx.docs.insert(id.to_string(), doc);
        }
    }

    pub fn bind_alias(&self, alias: &str, index: &str) {
        self.state
            .lock()
            .aliases
            .entry(alias.to_string())
            .or_default()
            .insert(index.to_string());
    }

    pub fn insert_template(&self, name: &str, body: Value) {
        self.state.lock().templates.insert(name.to_string(), body);
    }

    pub fn insert_pipeline(&self, id: &str, body: Value) {
        self.state.lock().pipelines.insert(id.to_string(), body);
    }

    pub fn index(&self, name: &str) -> Option<MemIndex> {
        self.state.lock().indices.get(name).cloned()
    }

    pub fn index_names(&self) -> Vec<String> {
        self.state.lock().indices.keys().cloned().collect()
    }

    pub fn aliased(&self, alias: &str) -> Vec<String> {
        self.state
            .lock()
            .aliases
            .get(alias)
            .map(|s| s.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn calls(&self) -> CallCounts {
        self.state.lock().calls
    }

    pub fn set_faults(&self, faults: Faults) {
        self.state.lock().faults = faults;
    }
}

#[async_trait]
impl SearchStore for MemoryStore {
    async fn get_alias(&self, alias: &str) -> Result<Vec<String>, StoreError> {
        tokio::task::yield_now().await;
        let st = self.state.lock();
        st.check_reachable()?;
        Ok(st
            .aliases
            .get(alias)
            .map(|s| s.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn get_mapping(&self, index: &str) -> Result<Option<Value>, StoreError> {
        tokio::task::yield_now().await;
        let st = self.state.lock();
        st.check_reachable()?;
        Ok(st.indices.get(index).map(|i| i.mappings.clone()))
    }

    async fn create_index(&self, index: &str, body: &Value) -> Result<CreateOutcome, StoreError> {
        tokio::task::yield_now().await;
        let mut st = self.state.lock();
        st.check_reachable()?;
        st.calls.create_index += 1;
        if st.faults.fail_create {
            return Err(injected(&format!("PUT /{}", index), 500, "injected failure"));
        }
        if st.indices.contains_key(index) {
            return Ok(CreateOutcome::AlreadyExists);
        }
        st.indices.insert(
            index.to_string(),
            MemIndex {
                mappings: body.get("mappings").cloned().unwrap_or_else(|| json!({})),
                settings: body.get("settings").cloned().unwrap_or_else(|| json!({})),
                docs: BTreeMap::new(),
            },
        );
        Ok(CreateOutcome::Created)
    }

    async fn count(&self, index: &str) -> Result<u64, StoreError> {
        tokio::task::yield_now().await;
        let st = self.state.lock();
        st.check_reachable()?;
        st.indices
            .get(index)
            .map(|i| i.docs.len() as u64)
            .ok_or_else(|| StoreError::IndexNotFound(index.to_string()))
    }

    async fn reindex(&self, from: &str, to: &str) -> Result<ReindexReport, StoreError> {
        tokio::task::yield_now().await;
        let mut st = self.state.lock();
        st.check_reachable()?;
        st.calls.reindex += 1;
        if st.faults.fail_reindex {
            return Err(injected("POST /_reindex", 500, "injected failure"));
        }
        let docs = st
            .indices
            .get(from)
            .ok_or_else(|| StoreError::IndexNotFound(from.to_string()))?
            .docs
            .clone();
        let dest = st
            .indices
            .get_mut(to)
            .ok_or_else(|| StoreError::IndexNotFound(to.to_string()))?;

        let mut report = ReindexReport::default();
        for (id, doc) in docs {
            report.total += 1;
            if dest.docs.insert(id, doc).is_some() {
                report.updated += 1;
            } else {
                report.created += 1;
            }
        }
        Ok(report)
    }

    async fn update_aliases(&self, actions: &[AliasAction]) -> Result<(), StoreError> {
        tokio::task::yield_now().await;
        let mut st = self.state.lock();
        st.check_reachable()?;
        st.calls.update_aliases += 1;
        if st.faults.fail_update_aliases {
            if st.faults.disconnect_after_alias_failure {
                st.faults.unreachable = true;
            }
            return Err(injected("POST /_aliases", 500, "injected failure"));
        }

        // 先整体校验，再整体应用：任一动作失败则不做任何修改
        for action in actions {
            match action {
                AliasAction::Add { index, .. } => {
                    if !st.indices.contains_key(index) {
                        return Err(StoreError::IndexNotFound(index.clone()));
                    }
                }
                AliasAction::Remove { index, alias } => {
                    let bound = st.aliases.get(alias).is_some_and(|s| s.contains(index));
                    if !bound {
                        return Err(StoreError::Status {
                            endpoint: "POST /_aliases".to_string(),
                            status: 404,
                            body: format!("aliases [{}] missing on [{}]", alias, index),
                        });
                    }
                }
            }
        }
        for action in actions {
            match action {
                AliasAction::Add { index, alias } => {
                    st.aliases
                        .entry(alias.clone())
                        .or_default()
                        .insert(index.clone());
                }
                AliasAction::Remove { index, alias } => {
                    let now_empty = match st.aliases.get_mut(alias) {
                        Some(set) => {
                            set.remove(index);
                            set.is_empty()
                        }
                        None => false,
                    };
                    if now_empty {
                        st.aliases.remove(alias);
                    }
                }
            }
        }
        Ok(())
    }

    async fn get_index_template(&self, name: &str) -> Result<Option<Value>, StoreError> {
        tokio::task::yield_now().await;
        let st = self.state.lock();
        st.check_reachable()?;
        Ok(st.templates.get(name).cloned())
    }

    async fn put_index_template(&self, name: &str, body: &Value) -> Result<(), StoreError> {
        tokio::task::yield_now().await;
        let mut st = self.state.lock();
        st.check_reachable()?;
        st.calls.put_index_template += 1;
        st.templates.insert(name.to_string(), body.clone());
        Ok(())
    }

    async fn get_pipeline(&self, id: &str) -> Result<Option<Value>, StoreError> {
        tokio::task::yield_now().await;
        let st = self.state.lock();
        st.check_reachable()?;
        Ok(st.pipelines.get(id).cloned())
    }

    async fn put_pipeline(&self, id: &str, body: &Value) -> Result<(), StoreError> {
        tokio::task::yield_now().await;
        let mut st = self.state.lock();
        st.check_reachable()?;
        st.calls.put_pipeline += 1;
        st.pipelines.insert(id.to_string(), body.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_is_create_if_absent() {
        let store = MemoryStore::new();
        let body = json!({"mappings": {"properties": {"a": {"type": "text"}}}});
        assert_eq!(
            store.create_index("x", &body).await.unwrap(),
            CreateOutcome::Created
        );
        assert_eq!(
            store.create_index("x", &json!({})).await.unwrap(),
            CreateOutcome::AlreadyExists
        );
        // 第二次 create 不改变已存在索引
        assert_eq!(store.index("x").unwrap().mappings, body["mappings"]);
    }

    #[tokio::test]
    async fn failed_alias_update_applies_nothing() {
        let store = MemoryStore::new();
        store.insert_index("old", json!({}));
        store.insert_index("new", json!({}));
        store.bind_alias("posts", "old");

        let err = store
            .update_aliases(&[
                AliasAction::Add {
                    index: "new".into(),
                    alias: "posts".into(),
                },
                AliasAction::Remove {
                    index: "missing".into(),
                    alias: "posts".into(),
                },
            ])
            .await;
        assert!(err.is_err());
        assert_eq!(store.aliased("posts"), vec!["old".to_string()]);
    }

    #[tokio::test]
    async fn reindex_preserves_ids() {
        let store = MemoryStore::new();
        store.insert_index("old", json!({}));
        store.insert_index("new", json!({}));
        store.insert_doc("old", "hello-world", json!({"title": "Hello"}));
        store.insert_doc("old", "second", json!({"title": "Second"}));

        let report = store.reindex("old", "new").await.unwrap();
        assert_eq!(report.total, 2);
        assert_eq!(report.created, 2);
        assert_eq!(store.index("new").unwrap().docs, store.index("old").unwrap().docs);
    }

    #[tokio::test]
    async fn unreachable_fails_reads() {
        let store = MemoryStore::new();
        store.set_faults(Faults {
            unreachable: true,
            ..Faults::default()
        });
        assert!(store.get_alias("posts").await.is_err());
    }
}
