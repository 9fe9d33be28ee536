use thiserror::Error;

/// structural-diff 工具的错误类型定义
#[derive(Error, Debug)]
pub enum StructuralDiffError {
    #[error("Source parsing error: {0}")]
    ParseError(String),

    #[error("File I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Unsupported file type: {0}")]
    UnsupportedFileType(String),

    #[error("Cannot compare files of different types: {before} vs {after}")]
    LanguageMismatch { before: String, after: String },

    #[error("Tree-sitter parsing failed: {0}")]
    TreeSitterError(String),

    /// 节点的字节范围无法从源码中截取（越界或落在 UTF-8 字符中间）
    #[error("Invalid byte range {start}..{end} for source of {len} bytes")]
    InvalidByteRange { start: usize, end: usize, len: usize },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// 项目通用的 Result 类型别名
pub type Result<T> = std::result::Result<T, StructuralDiffError>;
