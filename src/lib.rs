//! 用于并发查找文件和目录的库
//!
//! 本库提供了高性能的文件查找功能，支持：
//! - 有界并发的目录遍历
//! - 多种过滤条件（扩展名、名称、正则、大小、时间、隐藏文件）
//! - gitignore 风格的忽略规则，忽略的目录整棵剪枝
//! - 跟随符号链接时的环路检测
//! - 纯文本、JSON 数组和 NDJSON 三种输出格式
//!
//! ## 使用场景
//!
//! - 在项目中查找特定类型的文件
//! - 清理过时或大文件
//! - 为其他工具生成结构化的文件清单
//!
//! # 示例
//!
//! 基本用法：
//! ```no_run
//! use pfind::finder::{CancelToken, EntryType, Finder, FindOptions, OutputFormat};
//!
//! // 创建查找选项
//! let options = FindOptions::new()
//!     .with_root(".")
//!     .with_extensions(["rs"])          // 只要 .rs 文件
//!     .with_entry_type(EntryType::Files)
//!     .with_max_depth(Some(3))          // 最大搜索深度
//!     .with_output(OutputFormat::Ndjson);
//!
//! let finder = Finder::new(options).unwrap();
//!
//! // 执行查找，结果直接写到标准输出
//! let summary = finder.run(std::io::stdout(), &CancelToken::new()).unwrap();
//! eprintln!("找到 {} 个文件", summary.matched);
//! ```
//!
//! 输出顺序取决于调度，除非并发度为 1，否则每次运行可能不同。
//! 更多用法请参考各模块文档。

pub mod cli;
pub mod errors;
pub mod finder;
pub mod ignore;

// Re-export main types for convenience
pub use errors::{FindError, FindResult};
pub use finder::{CancelToken, Entry, FindOptions, Finder, OutputFormat, RunSummary};
