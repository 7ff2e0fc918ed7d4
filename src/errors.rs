use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for operations that can produce FindError
pub type FindResult<T> = Result<T, FindError>;

/// pfind 的自定义错误类型
///
/// 配置错误在遍历开始之前报告；单个条目的 IO 错误在遍历中被吞掉，
/// 不会出现在这里；输出错误在写入线程排空队列之后作为最终错误返回。
#[derive(Debug, Error)]
pub enum FindError {
    /// 未指定搜索根目录
    #[error("必须指定搜索根目录")]
    EmptyRoot,

    /// 指定的路径无效
    #[error("无效路径: {}", .0.display())]
    InvalidPath(PathBuf),

    /// 正则表达式无法编译
    #[error("无效的正则表达式 '{pattern}': {source}")]
    InvalidRegex {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// 大小规格无法解析
    #[error("无效的大小: {0}")]
    InvalidSize(String),

    /// 时间规格无法解析
    #[error("无效的时间: {0}")]
    InvalidTime(String),

    /// 无效的文件类型
    #[error("无效的文件类型: {0}")]
    InvalidFileType(String),

    /// 不支持的输出格式
    #[error("不支持的输出格式: {0}")]
    UnsupportedFormat(String),

    /// 模式匹配错误
    #[error("模式匹配错误: {message}")]
    PatternError { message: String },

    /// 文件系统错误（遍历开始前的 IO 错误）
    #[error("文件系统错误 {}: {source}", path.display())]
    FilesystemError {
        #[source]
        source: io::Error,
        path: PathBuf,
    },

    /// 输出写入失败
    #[error("输出写入失败 (已写入 {written} 条): {source}")]
    Output {
        written: usize,
        #[source]
        source: io::Error,
    },

    /// 无法创建工作线程池
    #[error("线程池错误: {0}")]
    ThreadPool(String),

    /// 内部错误
    #[error("内部错误: {0}")]
    Internal(String),
}

impl FindError {
    /// 是否为配置错误（在任何遍历 IO 之前报告）
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            FindError::EmptyRoot
                | FindError::InvalidPath(_)
                | FindError::InvalidRegex { .. }
                | FindError::InvalidSize(_)
                | FindError::InvalidTime(_)
                | FindError::InvalidFileType(_)
                | FindError::UnsupportedFormat(_)
                | FindError::PatternError { .. }
        )
    }

    /// 输出端是否已被关闭（例如管道另一端退出）
    pub fn is_broken_pipe(&self) -> bool {
        matches!(
            self,
            FindError::Output { source, .. } if source.kind() == io::ErrorKind::BrokenPipe
        )
    }
}
