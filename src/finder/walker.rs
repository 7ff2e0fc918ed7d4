//! 并发目录遍历
//!
//! 每个目录由线程池中的一个任务读取，读取前需要获得准入槽位。对每个子条目：
//! lstat → 隐藏检查 → （可选）解析符号链接 → 忽略规则剪枝 → 过滤并发送 →
//! 决定是否递归。匹配结果只通过有界队列交给写入线程。

use std::collections::HashSet;
use std::fs::{self, DirEntry, Metadata};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use crossbeam::channel::{SendTimeoutError, Sender};
use log::{debug, trace};

use super::cancel::CancelToken;
use super::entry::{dir_identity, DirIdentity, Entry};
use super::filter::{is_hidden, FileFilter};
use super::options::SearchConfig;
use super::thread_pool::WorkerPool;

/// 队列已满时检查取消信号的间隔
const SEND_POLL: Duration = Duration::from_millis(20);

/// 一个已解析元数据的子条目
struct Child {
    path: PathBuf,
    entry_name: std::ffi::OsString,
    metadata: Metadata,
}

/// 并发遍历器
///
/// 一次遍历结束后即丢弃；持有的发送端随之关闭，写入线程据此结束。
pub struct FileWalker<'a> {
    config: &'a SearchConfig,
    pool: &'a WorkerPool,
    tx: Sender<Entry>,
    stop: CancelToken,
    visited: Mutex<HashSet<DirIdentity>>,
    interrupted: AtomicBool,
}

impl<'a> FileWalker<'a> {
    /// 使用给定配置创建遍历器
    pub fn new(
        config: &'a SearchConfig,
        pool: &'a WorkerPool,
        tx: Sender<Entry>,
        stop: CancelToken,
    ) -> Self {
        Self {
            config,
            pool,
            tx,
            stop,
            visited: Mutex::new(HashSet::new()),
            interrupted: AtomicBool::new(false),
        }
    }

    /// 从配置的根目录开始遍历，阻塞直到所有任务完成或被取消
    ///
    /// 返回遍历是否因取消而提前停止；完整走完的遍历即使之后才到期也返回 false。
    pub fn walk(self) -> bool {
        let root = self.config.root.clone();
        if self.config.follow_links {
            if let Ok(metadata) = fs::metadata(&root) {
                self.first_visit(&root, &metadata);
            }
        }

        let walker = &self;
        self.pool.scope(|scope| walker.walk_dir(scope, root, 0));
        self.interrupted.load(Ordering::Relaxed)
    }

    /// 检查取消信号，并记录遍历因此提前停止
    fn should_stop(&self) -> bool {
        if self.stop.is_cancelled() {
            self.interrupted.store(true, Ordering::Relaxed);
            return true;
        }
        false
    }

    /// 读取一个目录并处理其子条目
    fn walk_dir<'s>(&'s self, scope: &rayon::Scope<'s>, dir: PathBuf, depth: usize) {
        if self.should_stop() {
            return;
        }
        let Some(_slot) = self.pool.slots().acquire(&self.stop) else {
            self.interrupted.store(true, Ordering::Relaxed);
            return;
        };

        let read_dir = match fs::read_dir(&dir) {
            Ok(read_dir) => read_dir,
            Err(e) => {
                debug!("Skipping unreadable directory {}: {}", dir.display(), e);
                return;
            }
        };

        for dir_entry in read_dir {
            if self.should_stop() {
                return;
            }
            let dir_entry = match dir_entry {
                Ok(dir_entry) => dir_entry,
                Err(e) => {
                    debug!("Error reading entry in {}: {}", dir.display(), e);
                    continue;
                }
            };
            let Some(child) = self.inspect(&dir_entry) else {
                continue;
            };
            let is_dir = child.metadata.is_dir();

            if self.config.ignore.enabled() && self.config.ignore.is_match(&child.path, is_dir) {
                trace!("Ignored {}", child.path.display());
                continue;
            }

            let entry = Entry::from_metadata(child.path.clone(), &child.entry_name, &child.metadata);
            if self.config.filters.matches(&entry) && !self.emit(entry) {
                return;
            }

            if is_dir
                && self.config.may_descend(depth)
                && self.first_visit(&child.path, &child.metadata)
            {
                let path = child.path;
                scope.spawn(move |scope| self.walk_dir(scope, path, depth + 1));
            }
        }
    }

    /// lstat、隐藏检查与符号链接解析；任何失败都跳过该条目
    fn inspect(&self, dir_entry: &DirEntry) -> Option<Child> {
        let path = dir_entry.path();
        let entry_name = dir_entry.file_name();

        let link_metadata = match fs::symlink_metadata(&path) {
            Ok(metadata) => metadata,
            Err(e) => {
                trace!("Cannot stat {}: {}", path.display(), e);
                return None;
            }
        };

        if !self.config.include_hidden && is_hidden(&entry_name, &link_metadata) {
            return None;
        }

        let metadata = if self.config.follow_links && link_metadata.file_type().is_symlink() {
            match fs::metadata(&path) {
                Ok(target) => target,
                Err(e) => {
                    trace!("Skipping broken link {}: {}", path.display(), e);
                    return None;
                }
            }
        } else {
            link_metadata
        };

        Some(Child {
            path,
            entry_name,
            metadata,
        })
    }

    /// 发送到写入线程；若已取消或队列关闭则返回 false
    fn emit(&self, mut entry: Entry) -> bool {
        loop {
            match self.tx.send_timeout(entry, SEND_POLL) {
                Ok(()) => return true,
                Err(SendTimeoutError::Timeout(returned)) => {
                    if self.should_stop() {
                        return false;
                    }
                    entry = returned;
                }
                Err(SendTimeoutError::Disconnected(_)) => return false,
            }
        }
    }

    /// 记录目录的物理标识；只有第一次访问返回 true。
    /// 不跟随符号链接时不可能成环，总是返回 true。
    fn first_visit(&self, path: &Path, metadata: &Metadata) -> bool {
        if !self.config.follow_links {
            return true;
        }
        let Some(identity) = dir_identity(path, metadata) else {
            return true;
        };
        let inserted = self
            .visited
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(identity);
        if !inserted {
            debug!("Already visited {}, not descending", path.display());
        }
        inserted
    }
}
