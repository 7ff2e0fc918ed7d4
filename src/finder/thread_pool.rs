//! 工作线程池与准入控制模块
//!
//! 目录读取任务运行在 rayon 线程池上；同时读取目录的数量由准入槽位限制，
//! 槽位通过守卫对象在所有退出路径上归还。
//!
//! 线程数和槽位数分别配置。默认两者相等，此时每个线程最多持有一个槽位，
//! `acquire` 不会等待；线程多于槽位时，多出的任务在 `acquire` 处排队，
//! 并发读取目录的上限始终由槽位决定。

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Condvar, Mutex, PoisonError};
use std::time::Duration;

use log::{debug, trace};

use super::cancel::CancelToken;
use crate::errors::{FindError, FindResult};

/// 等待槽位时检查取消信号的间隔
const CANCEL_POLL: Duration = Duration::from_millis(20);

/// 解析并发度：0 表示使用主机的 CPU 数量
pub fn resolve_concurrency(requested: usize) -> usize {
    if requested == 0 {
        num_cpus::get().max(1)
    } else {
        requested
    }
}

/// 固定容量的准入槽位
#[derive(Debug)]
pub struct AdmissionSlots {
    capacity: usize,
    in_use: Mutex<usize>,
    peak: AtomicUsize,
    released: Condvar,
}

impl AdmissionSlots {
    /// 创建具有 `capacity` 个槽位的准入控制
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            in_use: Mutex::new(0),
            peak: AtomicUsize::new(0),
            released: Condvar::new(),
        }
    }

    /// 获取一个槽位；若在等待期间被取消则返回 `None`
    pub fn acquire(&self, cancel: &CancelToken) -> Option<SlotGuard<'_>> {
        let mut in_use = self.in_use.lock().unwrap_or_else(PoisonError::into_inner);
        while *in_use >= self.capacity {
            if cancel.is_cancelled() {
                return None;
            }
            let (guard, _) = self
                .released
                .wait_timeout(in_use, CANCEL_POLL)
                .unwrap_or_else(PoisonError::into_inner);
            in_use = guard;
        }
        if cancel.is_cancelled() {
            return None;
        }
        *in_use += 1;
        self.peak.fetch_max(*in_use, Ordering::Relaxed);
        trace!("Slot acquired ({}/{})", *in_use, self.capacity);
        Some(SlotGuard { slots: self })
    }

    /// 当前占用的槽位数
    pub fn in_use(&self) -> usize {
        *self.in_use.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 槽位总数
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// 同时占用槽位数的最大值
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::Relaxed)
    }

    fn release(&self) {
        let mut in_use = self.in_use.lock().unwrap_or_else(PoisonError::into_inner);
        *in_use = in_use.saturating_sub(1);
        drop(in_use);
        self.released.notify_one();
    }
}

/// 持有一个准入槽位；析构时归还
#[derive(Debug)]
pub struct SlotGuard<'a> {
    slots: &'a AdmissionSlots,
}

impl Drop for SlotGuard<'_> {
    fn drop(&mut self) {
        self.slots.release();
    }
}

/// 目录遍历使用的线程池
#[derive(Debug)]
pub struct WorkerPool {
    pool: rayon::ThreadPool,
    slots: AdmissionSlots,
}

impl WorkerPool {
    /// 创建 `concurrency` 个线程和同样数量槽位的线程池
    pub fn new(concurrency: usize) -> FindResult<Self> {
        let concurrency = resolve_concurrency(concurrency);
        Self::with_threads(concurrency, concurrency)
    }

    /// 创建 `threads` 个线程、`slots` 个准入槽位的线程池
    pub fn with_threads(slots: usize, threads: usize) -> FindResult<Self> {
        let threads = resolve_concurrency(threads);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("pfind-walker-{}", i))
            .build()
            .map_err(|e| FindError::ThreadPool(e.to_string()))?;

        let slots = AdmissionSlots::new(resolve_concurrency(slots));
        debug!(
            "Created worker pool with {} threads and {} slots",
            threads,
            slots.capacity()
        );

        Ok(Self { pool, slots })
    }

    /// 准入槽位
    pub fn slots(&self) -> &AdmissionSlots {
        &self.slots
    }

    /// 在线程池内运行一个作用域，等待其中派生的所有任务完成
    pub fn scope<'scope, OP>(&self, op: OP)
    where
        OP: FnOnce(&rayon::Scope<'scope>) + Send,
    {
        self.pool.scope(op)
    }

    /// 线程数量
    pub fn thread_count(&self) -> usize {
        self.pool.current_num_threads()
    }
}
