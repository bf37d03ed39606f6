use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;

use crate::definition::{ArtifactDefinition, IndexDefinition, Slot};
use crate::error::MigrationError;
use crate::mapping::mappings_equal;
use crate::ready::ReadinessGate;
use crate::status::{ArtifactStatus, StatusInspector};
use crate::store::CreateOutcome;

/// 迁移失败日志的 target
pub const SETUP_LOG_TARGET: &str = "elasticsearch setup";

/// 候选名上限：`alias-fp`、`alias-fp-1` … `alias-fp-15`
const MAX_CANDIDATES: usize = 16;

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum IndexOutcome {
    Unchanged,
    Created { index: String },
    Migrated { from: String, to: String, documents: u64 },
    Failed { error: String },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum ArtifactOutcome {
    Unchanged,
    Updated,
    Failed { error: String },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SetupReport {
    pub indices: BTreeMap<String, IndexOutcome>,
    pub template: ArtifactOutcome,
    pub pipeline: ArtifactOutcome,
}

impl SetupReport {
    pub fn success(&self) -> bool {
        self.indices
            .values()
            .all(|o| !matches!(o, IndexOutcome::Failed { .. }))
            && !matches!(self.template, ArtifactOutcome::Failed { .. })
            && !matches!(self.pipeline, ArtifactOutcome::Failed { .. })
    }
}

/// 迁移编排：把每个逻辑索引幂等地推进到期望状态。
///
/// 并发安全不依赖锁，依赖引擎侧 create-index 的 create-if-absent 语义：
/// 同名并发创建只有一个成功，另一方得到 AlreadyExists 后复查并复用。
pub struct Orchestrator {
    inspector: Arc<StatusInspector>,
    gate: Arc<ReadinessGate>,
}

impl Orchestrator {
    pub fn new(inspector: Arc<StatusInspector>, gate: Arc<ReadinessGate>) -> Self {
        Self { inspector, gate }
    }

    /// 全部对象最终 up-to-date 时返回 true
    pub async fn setup(&self) -> bool {
        self.run().await.success()
    }

    pub async fn run(&self) -> SetupReport {
        let defs = self.inspector.definitions();

        let mut indices = BTreeMap::new();
        for slot in &defs.indices {
            let outcome = match self.setup_index(slot).await {
                Ok(o) => o,
                Err(e) => {
                    let e = anyhow::Error::from(e);
                    tracing::error!(target: SETUP_LOG_TARGET, "{}: {:#}", slot.name, e);
                    IndexOutcome::Failed {
                        error: format!("{:#}", e),
                    }
                }
            };
            indices.insert(slot.name.clone(), outcome);
        }

        let template = self
            .ensure_artifact(&defs.log_template, ArtifactKind::Template)
            .await;
        let pipeline = self
            .ensure_artifact(&defs.log_pipeline, ArtifactKind::Pipeline)
            .await;

        // 状态已变化，下一次 is_ready 重新计算
        self.gate.reset();

        let report = SetupReport {
            indices,
            template,
            pipeline,
        };
        if report.success() {
            tracing::info!("Setup complete: {:?}", report.indices);
        } else {
            tracing::warn!("Setup incomplete: {:?}", report);
        }
        report
    }

    async fn setup_index(&self, slot: &Slot<IndexDefinition>) -> Result<IndexOutcome, MigrationError> {
        let def = slot
            .definition
            .as_ref()
            .map_err(|e| MigrationError::Definition(e.to_string()))?;
        let status = self.inspector.index_status(slot).await?;

        match (status.up_to_date, status.physical) {
            (Some(true), _) => {
                tracing::debug!("{} is up to date", def.alias);
                Ok(IndexOutcome::Unchanged)
            }
            (_, Some(old)) if status.exists => self.migrate(def, old).await,
            _ => self.create_fresh(def).await,
        }
    }

    /// alias 不存在：创建（或复用）目标并绑定
    async fn create_fresh(&self, def: &IndexDefinition) -> Result<IndexOutcome, MigrationError> {
        let target = self.choose_target(def, None).await?;
        self.inspector.resolver().bind(&def.alias, &target).await?;
        Ok(IndexOutcome::Created { index: target })
    }

    /// mapping 漂移：新建 → reindex → 原子切换；旧索引保留
    async fn migrate(&self, def: &IndexDefinition, old: String) -> Result<IndexOutcome, MigrationError> {
        tracing::info!("{} drifted on {}, migrating", def.alias, old);
        let target = self.choose_target(def, Some(&old)).await?;

        let report = self.inspector.store().reindex(&old, &target).await?;
        tracing::info!(
            "Reindexed {} -> {}: {} docs ({} created, {} updated)",
            old,
            target,
            report.total,
            report.created,
            report.updated
        );

        let resolver = self.inspector.resolver();
        if let Err(swap_err) = resolver.swap(&def.alias, &old, &target).await {
            // 并发的另一次 setup 可能已完成同一切换
            match resolver.resolve(&def.alias).await {
                Ok(Some(current)) if current == target => {
                    tracing::info!("{} already switched to {} concurrently", def.alias, target);
                }
                Ok(_) => return Err(swap_err.into()),
                Err(resolve_err) => {
                    tracing::warn!(
                        "Cannot re-resolve {} after failed swap: {}",
                        def.alias,
                        resolve_err
                    );
                    return Err(swap_err.into());
                }
            }
        }

        Ok(IndexOutcome::Migrated {
            from: old,
            to: target,
            documents: report.total,
        })
    }

    /// 候选名搜索：空闲则创建；已存在、mapping 匹配且为空则复用；否则尝试下一个后缀。
    /// 当前 alias 指向的索引永远不会被选为目标。
    ///
    /// 遗留索引里的文档可能已在旧索引中被删除，reindex 只会新增或覆盖，
    /// 所以非空的遗留索引不复用，也不清空（它可能正被并发的 setup 填充）。
    async fn choose_target(
        &self,
        def: &IndexDefinition,
        current: Option<&str>,
    ) -> Result<String, MigrationError> {
        let store = self.inspector.store();
        let body = def.create_body();

        for attempt in 0..MAX_CANDIDATES {
            let name = def.candidate(attempt);
            if current == Some(name.as_str()) {
                tracing::warn!("Candidate {} is the index being replaced, skipping", name);
                continue;
            }

            match store.get_mapping(&name).await? {
                Some(live) if mappings_equal(&def.mappings, &live) => {
                    let docs = store.count(&name).await?;
                    if docs == 0 {
                        tracing::info!("Reusing existing index {}", name);
                        return Ok(name);
                    }
                    tracing::warn!("Candidate {} already holds {} documents, skipping", name, docs);
                    continue;
                }
                Some(_) => {
                    tracing::warn!("Candidate {} holds a different mapping, skipping", name);
                    continue;
                }
                None => {}
            }

            match store.create_index(&name, &body).await? {
                CreateOutcome::Created => {
                    tracing::info!("Created index {}", name);
                    let live = store.get_mapping(&name).await?;
                    if !live.is_some_and(|m| mappings_equal(&def.mappings, &m)) {
                        return Err(MigrationError::CreatedMismatch { index: name });
                    }
                    return Ok(name);
                }
                CreateOutcome::AlreadyExists => {
                    // 与并发 setup 竞争同一名字，按对方创建的结果复查
                    let live = store.get_mapping(&name).await?;
                    if live.is_some_and(|m| mappings_equal(&def.mappings, &m)) {
                        tracing::info!("Index {} created concurrently, reusing", name);
                        return Ok(name);
                    }
                    tracing::warn!("Candidate {} appeared with a different mapping, skipping", name);
                }
            }
        }

        Err(MigrationError::CandidatesExhausted {
            alias: def.alias.clone(),
            tried: MAX_CANDIDATES,
        })
    }

    async fn ensure_artifact(&self, slot: &Slot<ArtifactDefinition>, kind: ArtifactKind) -> ArtifactOutcome {
        match self.put_artifact_if_needed(slot, kind).await {
            Ok(o) => o,
            Err(e) => {
                let e = anyhow::Error::from(e);
                tracing::error!(target: SETUP_LOG_TARGET, "{} {}: {:#}", kind.label(), slot.name, e);
                ArtifactOutcome::Failed {
                    error: format!("{:#}", e),
                }
            }
        }
    }

    async fn put_artifact_if_needed(
        &self,
        slot: &Slot<ArtifactDefinition>,
        kind: ArtifactKind,
    ) -> Result<ArtifactOutcome, MigrationError> {
        let def = slot
            .definition
            .as_ref()
            .map_err(|e| MigrationError::Definition(e.to_string()))?;
        let status: ArtifactStatus = match kind {
            ArtifactKind::Template => self.inspector.template_status().await?,
            ArtifactKind::Pipeline => self.inspector.pipeline_status().await?,
        };
        if status.is_ready() {
            return Ok(ArtifactOutcome::Unchanged);
        }

        let store = self.inspector.store();
        match kind {
            ArtifactKind::Template => store.put_index_template(&def.name, &def.body).await?,
            ArtifactKind::Pipeline => store.put_pipeline(&def.name, &def.body).await?,
        }
        tracing::info!("Installed {} {}", kind.label(), def.name);
        Ok(ArtifactOutcome::Updated)
    }
}

#[derive(Copy, Clone, Debug)]
enum ArtifactKind {
    Template,
    Pipeline,
}

impl ArtifactKind {
    fn label(self) -> &'static str {
        match self {
            ArtifactKind::Template => "index template",
            ArtifactKind::Pipeline => "ingest pipeline",
        }
    }
}
