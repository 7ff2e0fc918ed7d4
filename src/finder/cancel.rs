//! 协作式取消信号
//!
//! 工作线程在每次读目录、处理每个子条目以及每次阻塞等待时检查该信号。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
struct Inner {
    cancelled: AtomicBool,
    deadline: Option<Instant>,
    parent: Option<CancelToken>,
}

/// 可克隆的取消令牌
///
/// 克隆共享同一状态；`child()` 派生的令牌在父令牌取消时同样视为已取消，
/// 但取消子令牌不会影响父令牌。
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    inner: Arc<Inner>,
}

impl CancelToken {
    /// 创建一个永不自动过期的令牌
    pub fn new() -> Self {
        Self::default()
    }

    /// 创建一个在 `timeout` 之后自动取消的令牌
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                deadline: Instant::now().checked_add(timeout),
                ..Default::default()
            }),
        }
    }

    /// 派生子令牌
    pub fn child(&self) -> Self {
        Self {
            inner: Arc::new(Inner {
                parent: Some(self.clone()),
                ..Default::default()
            }),
        }
    }

    /// 触发取消
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
    }

    /// 是否已取消（显式取消、超时或父令牌取消）
    pub fn is_cancelled(&self) -> bool {
        if self.inner.cancelled.load(Ordering::SeqCst) {
            return true;
        }
        if let Some(deadline) = self.inner.deadline {
            if Instant::now() >= deadline {
                return true;
            }
        }
        self.inner
            .parent
            .as_ref()
            .map_or(false, CancelToken::is_cancelled)
    }
}
