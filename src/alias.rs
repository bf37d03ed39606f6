use std::sync::Arc;

use crate::error::StoreError;
use crate::store::{AliasAction, SearchStore};

/// 别名解析与原子切换
#[derive(Clone)]
pub struct AliasResolver {
    store: Arc<dyn SearchStore>,
}

impl AliasResolver {
    pub fn new(store: Arc<dyn SearchStore>) -> Self {
        Self { store }
    }

    /// alias 当前指向的物理索引。
    ///
    /// 正常情况下至多一个；若外部操作导致多个绑定，取字典序最大者（指纹名 + 后缀下即最新创建的候选），并告警。
    pub async fn resolve(&self, alias: &str) -> Result<Option<String>, StoreError> {
        let mut bound = self.store.get_alias(alias).await?;
        bound.sort();
        if bound.len() > 1 {
            tracing::warn!(
                "Alias {} is bound to {} indices {:?}, using the last one",
                alias,
                bound.len(),
                bound
            );
        }
        Ok(bound.pop())
    }

    /// 首次绑定（单请求，单个 add）
    pub async fn bind(&self, alias: &str, index: &str) -> Result<(), StoreError> {
        self.store
            .update_aliases(&[AliasAction::Add {
                index: index.to_string(),
                alias: alias.to_string(),
            }])
            .await?;
        tracing::info!("Alias {} bound to {}", alias, index);
        Ok(())
    }

    /// 切换点：add(to) 与 remove(from) 在同一个 `_aliases` 请求内生效
    pub async fn swap(&self, alias: &str, from: &str, to: &str) -> Result<(), StoreError> {
        self.store
            .update_aliases(&[
                AliasAction::Add {
                    index: to.to_string(),
                    alias: alias.to_string(),
                },
                AliasAction::Remove {
                    index: from.to_string(),
                    alias: alias.to_string(),
                },
            ])
            .await?;
        tracing::info!("Alias {} switched {} -> {}", alias, from, to);
        Ok(())
    }
}
