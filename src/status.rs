use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::alias::AliasResolver;
use crate::definition::{ArtifactDefinition, Definitions, IndexDefinition, Slot};
use crate::error::StoreError;
use crate::mapping::{mappings_equal, templates_equal};
use crate::store::SearchStore;

/// 单个逻辑索引的状态
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexStatus {
    pub exists: bool,
    /// 不存在或定义不可用时为 `None`
    pub up_to_date: Option<bool>,
    /// alias 当前指向的物理索引
    #[serde(skip_serializing_if = "Option::is_none")]
    pub physical: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// index-template / ingest pipeline 的状态
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactStatus {
    pub exists: bool,
    pub up_to_date: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreStatus {
    pub indices: BTreeMap<String, IndexStatus>,
    pub template: ArtifactStatus,
    pub pipeline: ArtifactStatus,
}

impl IndexStatus {
    pub fn is_ready(&self) -> bool {
        self.exists && self.up_to_date == Some(true)
    }
}

impl ArtifactStatus {
    pub fn is_ready(&self) -> bool {
        self.exists && self.up_to_date == Some(true)
    }
}

impl StoreStatus {
    /// 所有被跟踪对象的 exists / upToDate 的逻辑与
    pub fn is_ready(&self) -> bool {
        self.indices.values().all(IndexStatus::is_ready)
            && self.template.is_ready()
            && self.pipeline.is_ready()
    }
}

/// 对比期望定义与存储引擎中的实际状态
pub struct StatusInspector {
    store: Arc<dyn SearchStore>,
    resolver: AliasResolver,
    definitions: Arc<Definitions>,
}

impl StatusInspector {
    pub fn new(store: Arc<dyn SearchStore>, definitions: Arc<Definitions>) -> Self {
        Self {
            resolver: AliasResolver::new(store.clone()),
            store,
            definitions,
        }
    }

    pub fn store(&self) -> &Arc<dyn SearchStore> {
        &self.store
    }

    pub fn resolver(&self) -> &AliasResolver {
        &self.resolver
    }

    pub fn definitions(&self) -> &Definitions {
        &self.definitions
    }

    /// 全量状态。连接错误直接返回给调用方，不做缓存。
    pub async fn get_status(&self) -> Result<StoreStatus, StoreError> {
        let mut indices = BTreeMap::new();
        for slot in &self.definitions.indices {
            indices.insert(slot.name.clone(), self.index_status(slot).await?);
        }
        Ok(StoreStatus {
            indices,
            template: self.template_status().await?,
            pipeline: self.pipeline_status().await?,
        })
    }

    pub async fn index_status(&self, slot: &Slot<IndexDefinition>) -> Result<IndexStatus, StoreError> {
        let Some(physical) = self.resolver.resolve(&slot.name).await? else {
            return Ok(IndexStatus {
                error: slot.error_message(),
                ..IndexStatus::default()
            });
        };
        let Some(live) = self.store.get_mapping(&physical).await? else {
            // alias 解析与读取 mapping 之间索引消失，按不存在处理
            return Ok(IndexStatus {
                error: slot.error_message(),
                ..IndexStatus::default()
            });
        };

        let up_to_date = match &slot.definition {
            Ok(def) => Some(mappings_equal(&def.mappings, &live)),
            Err(_) => None,
        };
        Ok(IndexStatus {
            exists: true,
            up_to_date,
            physical: Some(physical),
            error: slot.error_message(),
        })
    }

    pub async fn template_status(&self) -> Result<ArtifactStatus, StoreError> {
        let slot = &self.definitions.log_template;
        let live = self.store.get_index_template(&slot.name).await?;
        Ok(artifact_status(slot, live, templates_equal))
    }

    pub async fn pipeline_status(&self) -> Result<ArtifactStatus, StoreError> {
        let slot = &self.definitions.log_pipeline;
        let live = self.store.get_pipeline(&slot.name).await?;
        Ok(artifact_status(slot, live, mappings_equal))
    }
}

fn artifact_status(
    slot: &Slot<ArtifactDefinition>,
    live: Option<Value>,
    matches: fn(&Value, &Value) -> bool,
) -> ArtifactStatus {
    let Some(live) = live else {
        return ArtifactStatus {
            error: slot.error_message(),
            ..ArtifactStatus::default()
        };
    };
    ArtifactStatus {
        exists: true,
        up_to_date: slot
            .definition
            .as_ref()
            .ok()
            .map(|def| matches(&def.body, &live)),
        error: slot.error_message(),
    }
}
