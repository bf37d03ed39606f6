use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::StoreError;
use crate::status::{StatusInspector, StoreStatus};

/// 就绪门控：把状态检查归约为一个布尔值。
///
/// 只缓存肯定结果（定义在进程内不变，就绪后只有本引擎会改动索引）；
/// 否定结果与连接错误每次都重新检查。
pub struct ReadinessGate {
    inspector: Arc<StatusInspector>,
    ready: AtomicBool,
}

impl ReadinessGate {
    pub fn new(inspector: Arc<StatusInspector>) -> Self {
        Self {
            inspector,
            ready: AtomicBool::new(false),
        }
    }

    pub async fn is_ready(&self) -> Result<bool, StoreError> {
        if self.ready.load(Ordering::Acquire) {
            return Ok(true);
        }
        Ok(self.status().await?.is_ready())
    }

    /// 完整状态（诊断页用），顺带刷新缓存
    pub async fn status(&self) -> Result<StoreStatus, StoreError> {
        let status = self.inspector.get_status().await?;
        if status.is_ready() {
            self.ready.store(true, Ordering::Release);
        }
        Ok(status)
    }

    /// 缓存值，不访问存储引擎
    pub fn cached(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    pub fn reset(&self) {
        self.ready.store(false, Ordering::Release);
    }
}
