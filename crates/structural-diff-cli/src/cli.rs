//! 命令行接口模块
//!
//! 提供命令行参数解析和参数校验

use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use structural_diff_core::{FilePair, Result, StructuralDiffError};

/// structural-diff - 结构化语法差异工具
///
/// 解析两个源码文件，在语法树上计算最小代价的结构化差异。
#[derive(Parser, Debug)]
#[command(name = "structural-diff")]
#[command(author = "structural-diff contributors")]
#[command(version = "0.1.0")]
#[command(about = "A structural diff tool that compares syntax trees instead of lines")]
#[command(
    long_about = "structural-diff parses two source files with tree-sitter, normalizes both syntax trees into leaves, sequences, fixed tuples and keyed maps, and computes a minimal-cost patch of copies, insertions, deletions and nested replacements."
)]
pub struct Cli {
    /// 修改前的文件
    #[arg(
        help = "Source file before the change",
        value_name = "BEFORE",
        required_unless_present = "batch"
    )]
    pub before: Option<PathBuf>,

    /// 修改后的文件
    #[arg(
        help = "Source file after the change",
        value_name = "AFTER",
        required_unless_present = "batch"
    )]
    pub after: Option<PathBuf>,

    /// 批处理清单
    #[arg(
        short = 'b',
        long = "batch",
        value_name = "MANIFEST",
        conflicts_with_all = ["before", "after"],
        help = "Diff every `before<TAB>after` pair listed in a manifest file"
    )]
    pub batch: Option<PathBuf>,

    /// 输出格式
    #[arg(
        short = 'f',
        long = "format",
        value_enum,
        default_value_t = OutputFormat::Json,
        help = "Output format for the diff"
    )]
    pub format: OutputFormat,

    /// 格式化 JSON 输出
    #[arg(long = "pretty", help = "Pretty-print JSON output")]
    pub pretty: bool,

    /// 输出到文件
    #[arg(
        short = 'o',
        long = "output",
        value_name = "FILE",
        help = "Write output to a file instead of stdout"
    )]
    pub output_file: Option<PathBuf>,

    /// 批处理线程数
    #[arg(
        short = 'j',
        long = "threads",
        value_name = "N",
        help = "Number of worker threads for batch mode (defaults to CPU count)",
        value_parser = clap::value_parser!(u16).range(1..)
    )]
    pub threads: Option<u16>,

    /// 详细输出
    #[arg(short = 'v', long = "verbose", help = "Enable verbose logging output")]
    pub verbose: bool,
}

/// 输出格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// 供查看器读取的 JSON 文档
    #[value(name = "json")]
    Json,
    /// 终端可读的文本
    #[value(name = "text")]
    Text,
}

/// 运行模式
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    /// 比较一对文件
    Pair(FilePair),
    /// 按清单批量比较
    Batch(PathBuf),
}

/// 应用程序配置信息
#[derive(Debug, Clone)]
pub struct Config {
    pub mode: Mode,
    pub output_format: OutputFormat,
    pub pretty: bool,
    /// 是否启用详细输出
    pub verbose: bool,
    /// 输出文件路径
    pub output_file: Option<PathBuf>,
    /// 批处理线程数
    pub threads: Option<usize>,
}

impl From<Cli> for Config {
    fn from(cli: Cli) -> Self {
        let mode = match cli.batch {
            Some(manifest) => Mode::Batch(manifest),
            None => Mode::Pair(FilePair::new(
                cli.before.unwrap_or_default(),
                cli.after.unwrap_or_default(),
            )),
        };

        Config {
            mode,
            output_format: cli.format,
            pretty: cli.pretty,
            verbose: cli.verbose,
            output_file: cli.output_file,
            threads: cli.threads.map(usize::from),
        }
    }
}

impl Cli {
    /// 解析命令行参数
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// 验证参数的有效性
    pub fn validate(&self) -> Result<()> {
        match (&self.batch, &self.before, &self.after) {
            (Some(manifest), _, _) => require_file(manifest)?,
            (None, Some(before), Some(after)) => {
                require_file(before)?;
                require_file(after)?;
                FilePair::new(before, after).validate()?;
            }
            _ => {
                return Err(StructuralDiffError::ConfigError(
                    "Both BEFORE and AFTER files are required".to_string(),
                ));
            }
        }

        // 验证并创建输出文件路径 (如果指定)
        if let Some(output_file) = &self.output_file {
            if let Some(parent) = output_file.parent() {
                // 只有当父目录不是空路径时才检查和创建
                if !parent.as_os_str().is_empty() && !parent.exists() {
                    std::fs::create_dir_all(parent).map_err(|e| {
                        StructuralDiffError::IoError(std::io::Error::new(
                            e.kind(),
                            format!(
                                "Failed to create output directory {}: {}",
                                parent.display(),
                                e
                            ),
                        ))
                    })?;
                }
            }
        }

        Ok(())
    }
}

fn require_file(path: &std::path::Path) -> Result<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(StructuralDiffError::IoError(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("File does not exist: {}", path.display()),
        )))
    }
}
