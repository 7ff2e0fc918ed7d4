//! pfind 工具的命令行接口
//!
//! 本模块提供了命令行参数解析，并把参数转换为 [`FindOptions`]。
//! 大小、时间等字符串在这里解析，解析失败属于配置错误。

use std::path::PathBuf;
use std::time::Duration;

use chrono::Utc;
use clap::Parser;

use crate::errors::FindResult;
use crate::finder::filter::{EntryType, SizeFilter};
use crate::finder::options::FindOptions;
use crate::finder::output::OutputFormat;
use crate::finder::parse::{parse_duration, parse_since, parse_size, parse_time};

/// 快速的并发文件查找工具，支持 gitignore 风格的忽略规则
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// 搜索路径（默认：当前目录）
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// 按扩展名过滤（可多次指定或用逗号分隔），例如 --ext .go --ext md
    #[arg(short = 'e', long = "ext", value_name = "EXT", value_delimiter = ',')]
    pub extensions: Vec<String>,

    /// 文件名子串匹配
    #[arg(short = 'n', long)]
    pub name: Option<String>,

    /// 文件名正则表达式
    #[arg(short = 'r', long)]
    pub regex: Option<String>,

    /// 条目类型：f=文件, d=目录, a=全部
    #[arg(short = 't', long = "type", default_value = "f")]
    pub entry_type: String,

    /// 包含隐藏文件
    #[arg(short = 'H', long)]
    pub hidden: bool,

    /// 最小大小（含），例如 10K, 2MB, 1G
    #[arg(long, value_name = "SIZE")]
    pub min_size: Option<String>,

    /// 最大大小（含）
    #[arg(long, value_name = "SIZE")]
    pub max_size: Option<String>,

    /// 大于指定大小
    #[arg(long, value_name = "SIZE")]
    pub larger: Option<String>,

    /// 小于指定大小
    #[arg(long, value_name = "SIZE")]
    pub smaller: Option<String>,

    /// 在此之后修改，例如 7d, 3h, 2025-08-01
    #[arg(long, value_name = "WHEN")]
    pub since: Option<String>,

    /// 修改时间不早于（YYYY-MM-DD 或 RFC3339）
    #[arg(long, value_name = "TIME")]
    pub after: Option<String>,

    /// 修改时间不晚于（YYYY-MM-DD 或 RFC3339）
    #[arg(long, value_name = "TIME")]
    pub before: Option<String>,

    /// 最大搜索深度（-1 = 不限，0 = 只列出根目录的直接子项）
    #[arg(long, value_name = "NUM", default_value_t = -1, allow_negative_numbers = true)]
    pub max_depth: i64,

    /// 并发读取目录的数量（0 = CPU 数量）
    #[arg(short = 'j', long, value_name = "NUM", default_value_t = 0)]
    pub concurrency: usize,

    /// 输出格式：path|json|ndjson
    #[arg(short = 'o', long, default_value = "path")]
    pub output: String,

    /// 格式化 JSON 输出
    #[arg(long)]
    pub pretty: bool,

    /// 把结果写入文件而不是标准输出
    #[arg(long, value_name = "FILE")]
    pub out: Option<PathBuf>,

    /// 跟随符号链接
    #[arg(short = 'L', long)]
    pub follow_links: bool,

    /// 不读取项目的 .gitignore
    #[arg(long)]
    pub no_gitignore: bool,

    /// 额外的忽略模式（可多次指定）
    #[arg(long = "ignore", value_name = "PATTERN")]
    pub ignore_patterns: Vec<String>,

    /// 超时时间，例如 30s, 5m
    #[arg(long, value_name = "DURATION")]
    pub timeout: Option<String>,

    /// 启用调试日志
    #[arg(short, long)]
    pub debug: bool,
}

impl Cli {
    /// 构建查找选项
    pub fn build_options(&self) -> FindResult<FindOptions> {
        let now = Utc::now();

        let size = SizeFilter {
            min: self.min_size.as_deref().map(parse_size).transpose()?,
            max: self.max_size.as_deref().map(parse_size).transpose()?,
            larger: self.larger.as_deref().map(parse_size).transpose()?,
            smaller: self.smaller.as_deref().map(parse_size).transpose()?,
        };

        let mut options = FindOptions::new()
            .with_root(&self.path)
            .with_extensions(self.extensions.iter().cloned())
            .with_entry_type(self.entry_type.parse::<EntryType>()?)
            .with_size(size)
            .with_include_hidden(self.hidden)
            .with_max_depth(usize::try_from(self.max_depth).ok())
            .with_concurrency(self.concurrency)
            .with_output(self.output.parse::<OutputFormat>()?)
            .with_pretty(self.pretty)
            .with_follow_links(self.follow_links)
            .with_respect_gitignore(!self.no_gitignore)
            .with_ignore_patterns(self.ignore_patterns.iter().cloned());

        if let Some(name) = &self.name {
            options = options.with_name(name);
        }
        if let Some(regex) = &self.regex {
            options = options.with_regex(regex);
        }
        if let Some(since) = &self.since {
            options = options.with_since(parse_since(since, now)?);
        }
        if let Some(after) = &self.after {
            options = options.with_after(parse_time(after)?);
        }
        if let Some(before) = &self.before {
            options = options.with_before(parse_time(before)?);
        }

        Ok(options)
    }

    /// 解析超时参数
    pub fn timeout(&self) -> FindResult<Option<Duration>> {
        self.timeout.as_deref().map(parse_duration).transpose()
    }
}
