//! structural-diff - 结构化语法差异工具
//!
//! 解析两个源码文件，输出语法树之间最小代价的结构化差异。

mod cli;

use cli::{Cli, Config, Mode, OutputFormat};
use std::fmt::Write as _;
use std::io::IsTerminal;
use structural_diff_core::{
    BatchDiffer, DiffDocument, FilePair, Interpreter, PairDiff, Result, read_manifest,
};
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

fn main() {
    // 解析命令行参数
    let cli = Cli::parse_args();

    // 初始化日志记录，日志写到 stderr，stdout 只输出结果
    init_logging(cli.verbose);

    // 验证参数
    if let Err(e) = cli.validate() {
        error!("Invalid arguments: {}", e);
        std::process::exit(1);
    }

    let config: Config = cli.into();
    debug!(
        "Configuration: mode={:?}, format={:?}",
        config.mode, config.output_format
    );

    match run(&config) {
        Ok(0) => debug!("Diff completed successfully"),
        Ok(failures) => {
            error!("{} file pair(s) could not be diffed", failures);
            std::process::exit(1);
        }
        Err(e) => {
            error!("Application error: {}", e);
            std::process::exit(1);
        }
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .init();
}

/// 主要应用逻辑，返回失败的文件对数量
fn run(config: &Config) -> Result<usize> {
    let (output, failures) = match &config.mode {
        Mode::Pair(pair) => (render_pair(config, pair)?, 0),
        Mode::Batch(manifest) => render_batch(config, manifest)?,
    };

    match &config.output_file {
        Some(path) => {
            std::fs::write(path, output)?;
            info!("Diff written to {}", path.display());
        }
        None => println!("{output}"),
    }

    Ok(failures)
}

fn render_pair(config: &Config, pair: &FilePair) -> Result<String> {
    let pair_diff = pair.diff(&Interpreter::new())?;
    let summary = pair_diff.diff.summary();
    info!(
        "Diffed {} -> {}: cost {}, {} copies, {} inserts, {} deletes, {} replaces",
        pair.before.display(),
        pair.after.display(),
        summary.cost,
        summary.copies,
        summary.inserts,
        summary.deletes,
        summary.replaces
    );

    match config.output_format {
        OutputFormat::Json => pair_diff.document().to_json(config.pretty),
        OutputFormat::Text => Ok(render_text(&pair_diff)),
    }
}

fn render_batch(config: &Config, manifest: &std::path::Path) -> Result<(String, usize)> {
    let pairs = read_manifest(manifest)?;

    let mut differ = BatchDiffer::new();
    if let Some(threads) = config.threads {
        differ = differ.with_thread_pool_size(threads);
    }
    // 单对失败已在批处理中记录，这里只汇总数量
    let result = differ.diff_pairs(&pairs)?;

    let output = match config.output_format {
        OutputFormat::Json => {
            let documents: Vec<DiffDocument> =
                result.successful.iter().map(PairDiff::document).collect();
            if config.pretty {
                serde_json::to_string_pretty(&documents)?
            } else {
                serde_json::to_string(&documents)?
            }
        }
        OutputFormat::Text => result
            .successful
            .iter()
            .map(render_text)
            .collect::<Vec<_>>()
            .join("\n\n"),
    };

    Ok((output, result.failed.len()))
}

/// 终端可读的文本输出
fn render_text(pair_diff: &PairDiff) -> String {
    let summary = pair_diff.diff.summary();
    let mut text = String::new();
    // 写入 String 不会失败
    let _ = writeln!(text, "--- {}", pair_diff.pair.before.display());
    let _ = writeln!(text, "+++ {}", pair_diff.pair.after.display());
    let _ = writeln!(text, "{}", pair_diff.diff);
    let _ = write!(
        text,
        "cost: {}, copies: {}, inserts: {}, deletes: {}, replaces: {}",
        summary.cost, summary.copies, summary.inserts, summary.deletes, summary.replaces
    );
    text
}
