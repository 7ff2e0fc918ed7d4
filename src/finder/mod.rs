//! 文件查找模块
//!
//! 这个模块提供了有界并发的目录遍历、过滤和输出功能。
//! 遍历任务并发地产生匹配结果，唯一的写入线程负责把它们按格式写到输出端。

pub mod cancel;
pub mod entry;
pub mod filter;
pub mod options;
pub mod output;
pub mod parse;
mod thread_pool;
mod walker;

use std::io::Write;
use std::thread;
use std::time::Instant;

use crossbeam::channel::bounded;
use log::{debug, info};

pub use self::cancel::CancelToken;
pub use self::entry::Entry;
pub use self::filter::{EntryType, FileFilter, SizeFilter};
pub use self::options::{FindOptions, SearchConfig};
pub use self::output::OutputFormat;
pub use thread_pool::{AdmissionSlots, WorkerPool};

use self::output::OutputWriter;
use self::walker::FileWalker;
use crate::errors::{FindError, FindResult};

/// 匹配队列容量
const QUEUE_CAPACITY: usize = 256;

/// 一次成功运行的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    /// 写入输出端的匹配条目数
    pub matched: usize,
    /// 运行是否因取消（中断或超时）而提前结束
    pub cancelled: bool,
}

/// 文件查找器
///
/// 持有已验证的配置；每次 `run` 都会创建新的线程池、队列和写入线程。
#[derive(Debug)]
pub struct Finder {
    config: SearchConfig,
}

impl Finder {
    /// 验证选项并创建查找器；配置错误在这里返回，早于任何遍历
    pub fn new(options: FindOptions) -> FindResult<Self> {
        let config = options.validate()?;
        Ok(Self { config })
    }

    /// 已验证的配置
    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// 执行搜索，把结果写入 `out`
    ///
    /// 返回匹配条目数。输出端写入失败时返回 [`FindError::Output`]，
    /// 取消时返回 `Ok` 且 `cancelled` 为 true，内容为取消前已写出的部分。
    pub fn run<W>(&self, out: W, cancel: &CancelToken) -> FindResult<RunSummary>
    where
        W: Write + Send,
    {
        let start_time = Instant::now();
        let pool = WorkerPool::new(self.config.concurrency)?;

        info!(
            "Starting search in {} with {} workers",
            self.config.root.display(),
            pool.thread_count()
        );
        debug!("Active filters: {}", self.config.describe_filters());

        let (tx, rx) = bounded::<Entry>(QUEUE_CAPACITY);
        // 写入失败时由写入线程取消，使遍历尽早停止
        let halt = cancel.child();

        let (interrupted, report) = thread::scope(|s| {
            let writer = OutputWriter::new(out, self.config.output, self.config.pretty);
            let writer_halt = halt.clone();
            let handle = s.spawn(move || writer.drain(rx, &writer_halt));

            let interrupted = FileWalker::new(&self.config, &pool, tx, halt.clone()).walk();

            handle.join().map(|report| (interrupted, report))
        })
        .map_err(|_| FindError::Internal("output writer panicked".to_string()))?;

        let elapsed = start_time.elapsed();
        debug!(
            "Peak concurrent directory reads: {}/{}",
            pool.slots().peak(),
            pool.slots().capacity()
        );
        if let Some(source) = report.error {
            return Err(FindError::Output {
                written: report.written,
                source,
            });
        }

        // 只有遍历确实因取消而停止才算被取消；已走完的运行不再检查截止时间
        let cancelled = interrupted;
        info!(
            "Search finished: {} matches in {:.2?}{}",
            report.written,
            elapsed,
            if cancelled { " (cancelled)" } else { "" }
        );

        Ok(RunSummary {
            matched: report.written,
            cancelled,
        })
    }
}

/// 使用给定选项执行一次搜索
pub fn run<W>(options: FindOptions, out: W, cancel: &CancelToken) -> FindResult<RunSummary>
where
    W: Write + Send,
{
    Finder::new(options)?.run(out, cancel)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self, File};
    use std::time::Duration;
    use tempfile::tempdir;

    #[test]
    fn test_finder_basic() {
        let temp_dir = tempdir().unwrap();
        let base_path = temp_dir.path();

        // 创建测试文件结构
        fs::create_dir(base_path.join("dir1")).unwrap();
        fs::create_dir(base_path.join("dir2")).unwrap();

        let mut file1 = File::create(base_path.join("dir1/test1.txt")).unwrap();
        file1.write_all(b"test content").unwrap();

        let mut file2 = File::create(base_path.join("dir2/test2.txt")).unwrap();
        file2.write_all(b"test content").unwrap();

        let options = FindOptions::new()
            .with_root(base_path)
            .with_extensions(["txt"])
            .with_entry_type(EntryType::Files)
            .with_respect_gitignore(false);
        let finder = Finder::new(options).unwrap();

        let mut out = Vec::new();
        let summary = finder.run(&mut out, &CancelToken::new()).unwrap();

        let text = String::from_utf8(out).unwrap();
        assert_eq!(summary.matched, 2);
        assert!(!summary.cancelled);
        assert!(text.lines().any(|p| p.ends_with("test1.txt")));
        assert!(text.lines().any(|p| p.ends_with("test2.txt")));
    }

    #[test]
    fn test_finder_hidden_files() {
        let temp_dir = tempdir().unwrap();
        let base_path = temp_dir.path();

        // 创建测试文件结构，包括隐藏文件
        fs::write(base_path.join(".hidden.txt"), b"hidden content").unwrap();
        fs::write(base_path.join("normal.txt"), b"normal content").unwrap();

        // 测试不包含隐藏文件的情况
        let options = FindOptions::new()
            .with_root(base_path)
            .with_respect_gitignore(false);
        let mut out = Vec::new();
        let summary = run(options.clone(), &mut out, &CancelToken::new()).unwrap();
        assert_eq!(summary.matched, 1);
        assert!(String::from_utf8(out).unwrap().trim_end().ends_with("normal.txt"));

        // 测试包含隐藏文件的情况
        let mut out = Vec::new();
        let summary = run(
            options.with_include_hidden(true),
            &mut out,
            &CancelToken::new(),
        )
        .unwrap();
        assert_eq!(summary.matched, 2);
    }

    #[test]
    fn test_config_error_before_output() {
        let temp_dir = tempdir().unwrap();
        let options = FindOptions::new().with_root(temp_dir.path()).with_regex("([");

        let mut out = Vec::new();
        let result = run(options, &mut out, &CancelToken::new());
        assert!(matches!(result, Err(FindError::InvalidRegex { .. })));
        assert!(out.is_empty());
    }

    #[test]
    fn test_cancelled_run_is_ok() {
        let temp_dir = tempdir().unwrap();
        fs::write(temp_dir.path().join("a.txt"), b"a").unwrap();
        let options = FindOptions::new()
            .with_root(temp_dir.path())
            .with_output(OutputFormat::Json)
            .with_respect_gitignore(false);

        let cancel = CancelToken::new();
        cancel.cancel();
        let mut out = Vec::new();
        let summary = run(options, &mut out, &cancel).unwrap();

        assert!(summary.cancelled);
        assert_eq!(summary.matched, 0);
        let parsed: Vec<Entry> = serde_json::from_slice(&out).unwrap();
        assert!(parsed.is_empty());
    }

    /// Sink whose flush outlasts a short deadline
    struct SlowSink {
        delay: Duration,
        data: Vec<u8>,
    }

    impl Write for SlowSink {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.data.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            thread::sleep(self.delay);
            Ok(())
        }
    }

    #[test]
    fn test_deadline_after_complete_walk_is_not_cancelled() {
        let temp_dir = tempdir().unwrap();
        fs::write(temp_dir.path().join("a.txt"), b"a").unwrap();
        let options = FindOptions::new()
            .with_root(temp_dir.path())
            .with_respect_gitignore(false);

        // the walk finishes at once, the deadline passes while output is flushed
        let cancel = CancelToken::with_timeout(Duration::from_millis(250));
        let mut sink = SlowSink {
            delay: Duration::from_millis(300),
            data: Vec::new(),
        };
        let summary = run(options, &mut sink, &cancel).unwrap();

        assert!(cancel.is_cancelled());
        assert!(!summary.cancelled);
        assert_eq!(summary.matched, 1);
        assert!(String::from_utf8(sink.data).unwrap().ends_with("a.txt\n"));
    }
}
