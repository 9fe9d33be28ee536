//! 批量差异计算模块
//!
//! 在 rayon 线程池上并发比较多对文件，单对失败不影响其他文件

use crate::document::DiffDocument;
use crate::error::{Result, StructuralDiffError};
use crate::interpreter::{Diff, DiffPolicy, Interpreter, StructuralPolicy};
use crate::parser::{ParserFactory, SourceFile};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// 一对待比较的文件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePair {
    pub before: PathBuf,
    pub after: PathBuf,
}

impl FilePair {
    pub fn new(before: impl Into<PathBuf>, after: impl Into<PathBuf>) -> Self {
        Self {
            before: before.into(),
            after: after.into(),
        }
    }

    /// 检查两个文件都受支持且扩展名相同
    ///
    /// `.c` 与 `.h` 虽然共用一种语法，扩展名不同仍视为不匹配
    pub fn validate(&self) -> Result<()> {
        for path in [&self.before, &self.after] {
            if ParserFactory::detect_language(path).is_none() {
                return Err(StructuralDiffError::UnsupportedFileType(
                    path.to_string_lossy().to_string(),
                ));
            }
        }

        if self.before.extension() != self.after.extension() {
            return Err(StructuralDiffError::LanguageMismatch {
                before: self.before.to_string_lossy().to_string(),
                after: self.after.to_string_lossy().to_string(),
            });
        }
        Ok(())
    }

    /// 解析两个文件并计算差异
    pub fn diff<P: DiffPolicy>(&self, interpreter: &Interpreter<P>) -> Result<PairDiff> {
        self.validate()?;
        let before = SourceFile::parse(&self.before)?;
        let after = SourceFile::parse(&self.after)?;
        let diff = interpreter.diff(&before.term, &after.term);

        Ok(PairDiff {
            pair: self.clone(),
            before,
            after,
            diff,
        })
    }
}

/// 一对文件的比较结果
#[derive(Debug)]
pub struct PairDiff {
    pub pair: FilePair,
    pub before: SourceFile,
    pub after: SourceFile,
    pub diff: Diff,
}

impl PairDiff {
    /// 生成结果文档，携带两侧源码和文件路径
    pub fn document(&self) -> DiffDocument {
        DiffDocument::new(
            self.before.source_code.as_str(),
            self.after.source_code.as_str(),
            &self.diff,
        )
        .with_paths(
            self.pair.before.to_string_lossy(),
            self.pair.after.to_string_lossy(),
        )
    }
}

/// 读取批处理清单
///
/// 每行一对以制表符分隔的路径，空行和 `#` 开头的行被忽略；
/// 相对路径相对于清单文件所在目录
pub fn read_manifest(path: &Path) -> Result<Vec<FilePair>> {
    let content = std::fs::read_to_string(path)?;
    let base = path.parent().unwrap_or_else(|| Path::new(""));

    let mut pairs = Vec::new();
    for (index, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        match line.split('\t').collect::<Vec<_>>().as_slice() {
            [before, after] => pairs.push(FilePair::new(
                base.join(before.trim()),
                base.join(after.trim()),
            )),
            _ => {
                return Err(StructuralDiffError::ConfigError(format!(
                    "{}:{}: expected `before<TAB>after`",
                    path.display(),
                    index + 1
                )));
            }
        }
    }

    debug!("Read {} file pairs from {}", pairs.len(), path.display());
    Ok(pairs)
}

/// 批量比较结果
#[derive(Debug)]
pub struct BatchResult {
    /// 比较成功的文件对
    pub successful: Vec<PairDiff>,
    /// 比较失败的文件对及错误信息
    pub failed: Vec<(FilePair, StructuralDiffError)>,
    pub stats: BatchStats,
}

/// 批量比较统计信息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchStats {
    /// 总处理时间
    pub total_duration: Duration,
    /// 处理的文件对数量
    pub pairs_processed: u64,
    pub successful_pairs: u64,
    pub failed_pairs: u64,
    /// 平均每对文件的处理时间
    pub avg_pair_duration: Duration,
    /// 成功文件对的代价之和
    pub total_cost: u64,
}

/// 批量比较监控器
pub struct DiffMonitor {
    start_time: Instant,
    pairs_processed: AtomicU64,
    total_nanos: AtomicU64,
    error_count: AtomicU64,
    total_cost: AtomicU64,
}

impl DiffMonitor {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            pairs_processed: AtomicU64::new(0),
            total_nanos: AtomicU64::new(0),
            error_count: AtomicU64::new(0),
            total_cost: AtomicU64::new(0),
        }
    }

    /// 记录一对文件处理完成
    pub fn record_pair_processed(&self, processing_time: Duration) {
        self.pairs_processed.fetch_add(1, Ordering::Relaxed);
        let nanos = u64::try_from(processing_time.as_nanos()).unwrap_or(u64::MAX);
        self.total_nanos.fetch_add(nanos, Ordering::Relaxed);
    }

    pub fn record_cost(&self, cost: usize) {
        self.total_cost
            .fetch_add(u64::try_from(cost).unwrap_or(u64::MAX), Ordering::Relaxed);
    }

    /// 记录错误
    pub fn record_error(&self) {
        self.error_count.fetch_add(1, Ordering::Relaxed);
    }

    /// 获取统计信息
    pub fn get_stats(&self) -> BatchStats {
        let pairs_processed = self.pairs_processed.load(Ordering::Relaxed);
        let failed_pairs = self.error_count.load(Ordering::Relaxed);
        let total_nanos = self.total_nanos.load(Ordering::Relaxed);

        let avg_pair_duration = if pairs_processed > 0 {
            Duration::from_nanos(total_nanos / pairs_processed)
        } else {
            Duration::ZERO
        };

        BatchStats {
            total_duration: self.start_time.elapsed(),
            pairs_processed,
            successful_pairs: pairs_processed.saturating_sub(failed_pairs),
            failed_pairs,
            avg_pair_duration,
            total_cost: self.total_cost.load(Ordering::Relaxed),
        }
    }
}

impl Default for DiffMonitor {
    fn default() -> Self {
        Self::new()
    }
}

/// 并发批量比较器
pub struct BatchDiffer<P = StructuralPolicy> {
    /// 线程池大小
    thread_pool_size: usize,
    /// 批处理大小
    batch_size: usize,
    interpreter: Interpreter<P>,
}

impl BatchDiffer<StructuralPolicy> {
    /// 使用默认策略和 CPU 核数大小的线程池
    pub fn new() -> Self {
        Self::with_interpreter(Interpreter::new())
    }
}

impl Default for BatchDiffer<StructuralPolicy> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: DiffPolicy + Sync> BatchDiffer<P> {
    pub fn with_interpreter(interpreter: Interpreter<P>) -> Self {
        Self {
            thread_pool_size: num_cpus::get(),
            batch_size: 10,
            interpreter,
        }
    }

    /// 设置线程池大小
    pub fn with_thread_pool_size(mut self, size: usize) -> Self {
        self.thread_pool_size = size.max(1);
        self
    }

    /// 设置批处理大小
    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size.max(1);
        self
    }

    pub fn thread_pool_size(&self) -> usize {
        self.thread_pool_size
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// 并发比较多对文件
    pub fn diff_pairs(&self, pairs: &[FilePair]) -> Result<BatchResult> {
        let monitor = DiffMonitor::new();

        info!(
            "Diffing {} file pairs on {} threads",
            pairs.len(),
            self.thread_pool_size
        );

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.thread_pool_size)
            .build()
            .map_err(|e| {
                StructuralDiffError::ConfigError(format!("Failed to create thread pool: {e}"))
            })?;

        let results: Vec<_> = pool.install(|| {
            pairs
                .par_chunks(self.batch_size)
                .flat_map(|chunk| {
                    chunk
                        .par_iter()
                        .map(|pair| self.diff_pair_with_recovery(pair, &monitor))
                })
                .collect()
        });

        let mut successful = Vec::new();
        let mut failed = Vec::new();
        for result in results {
            match result {
                Ok(pair_diff) => successful.push(pair_diff),
                Err(failure) => failed.push(failure),
            }
        }

        let stats = monitor.get_stats();
        info!(
            "Batch finished: {} succeeded, {} failed, total cost {}, took {:?}",
            successful.len(),
            failed.len(),
            stats.total_cost,
            stats.total_duration
        );

        Ok(BatchResult {
            successful,
            failed,
            stats,
        })
    }

    fn diff_pair_with_recovery(
        &self,
        pair: &FilePair,
        monitor: &DiffMonitor,
    ) -> std::result::Result<PairDiff, (FilePair, StructuralDiffError)> {
        let start_time = Instant::now();
        let result = pair.diff(&self.interpreter);
        let processing_time = start_time.elapsed();
        monitor.record_pair_processed(processing_time);

        match result {
            Ok(pair_diff) => {
                monitor.record_cost(pair_diff.diff.cost());
                debug!(
                    "Diffed {} -> {}: cost {}, took {:?}",
                    pair.before.display(),
                    pair.after.display(),
                    pair_diff.diff.cost(),
                    processing_time
                );
                Ok(pair_diff)
            }
            Err(error) => {
                warn!(
                    "Failed to diff {} -> {}: {}",
                    pair.before.display(),
                    pair.after.display(),
                    error
                );
                monitor.record_error();
                Err((pair.clone(), error))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_batch_differ_configuration() {
        let differ = BatchDiffer::new().with_thread_pool_size(2).with_batch_size(5);
        assert_eq!(differ.thread_pool_size(), 2);
        assert_eq!(differ.batch_size(), 5);

        let clamped = BatchDiffer::new().with_thread_pool_size(0).with_batch_size(0);
        assert_eq!(clamped.thread_pool_size(), 1);
        assert_eq!(clamped.batch_size(), 1);
    }

    #[test]
    fn test_validate_pairs() {
        assert!(FilePair::new("a.js", "b.js").validate().is_ok());
        assert!(FilePair::new("old/a.h", "new/a.h").validate().is_ok());

        // 同一语法的不同扩展名也不匹配
        for (before, after) in [("a.js", "b.c"), ("a.c", "b.h"), ("a.js", "b.mjs")] {
            assert!(
                matches!(
                    FilePair::new(before, after).validate(),
                    Err(StructuralDiffError::LanguageMismatch { .. })
                ),
                "{before} vs {after}"
            );
        }
        assert!(matches!(
            FilePair::new("a.txt", "b.txt").validate(),
            Err(StructuralDiffError::UnsupportedFileType(path)) if path == "a.txt"
        ));
    }

    #[test]
    fn test_diff_pairs_isolates_failures() {
        let dir = TempDir::new().unwrap();
        let a = write(&dir, "a.js", "const x = {a: 1, b: 2};\n");
        let b = write(&dir, "b.js", "const x = {b: 2, c: 3};\n");
        let c = write(&dir, "c.c", "int main(void) { return 0; }\n");

        let pairs = vec![
            FilePair::new(&a, &b),
            FilePair::new(&a, &a),
            FilePair::new(&a, &c),
            FilePair::new(&a, dir.path().join("missing.js")),
        ];

        let result = BatchDiffer::new()
            .with_thread_pool_size(2)
            .with_batch_size(1)
            .diff_pairs(&pairs)
            .unwrap();

        assert_eq!(result.successful.len(), 2);
        assert_eq!(result.failed.len(), 2);
        assert_eq!(result.stats.pairs_processed, 4);
        assert_eq!(result.stats.successful_pairs, 2);
        assert_eq!(result.stats.failed_pairs, 2);
        // 删除和插入的都是三个节点的键值对
        assert_eq!(result.stats.total_cost, 6);

        let identical = result
            .successful
            .iter()
            .find(|pair_diff| pair_diff.pair.after == a)
            .unwrap();
        assert!(identical.diff.is_identity());

        let mismatch = result.failed.iter().find(|(pair, _)| pair.after == c).unwrap();
        assert!(matches!(mismatch.1, StructuralDiffError::LanguageMismatch { .. }));
    }

    #[test]
    fn test_pair_document() {
        let dir = TempDir::new().unwrap();
        let a = write(&dir, "a.go", "package main\n\nvar x = 1\n");
        let b = write(&dir, "b.go", "package main\n\nvar x = 2\n");

        let pair_diff = FilePair::new(&a, &b).diff(&Interpreter::new()).unwrap();
        assert_eq!(pair_diff.diff.cost(), 1);

        let document = pair_diff.document();
        assert_eq!(document.before, "package main\n\nvar x = 1\n");
        assert_eq!(document.after, "package main\n\nvar x = 2\n");
        assert_eq!(document.before_path.as_deref(), Some(&*a.to_string_lossy()));
        assert_eq!(document.after_path.as_deref(), Some(&*b.to_string_lossy()));
        assert_eq!(document.summary.cost, 1);
    }

    #[test]
    fn test_read_manifest() {
        let dir = TempDir::new().unwrap();
        let manifest = write(
            &dir,
            "pairs.tsv",
            "# before\tafter\n\nold/a.js\tnew/a.js\n  x.c\ty.c  \n",
        );

        let pairs = read_manifest(&manifest).unwrap();
        assert_eq!(
            pairs,
            vec![
                FilePair::new(dir.path().join("old/a.js"), dir.path().join("new/a.js")),
                FilePair::new(dir.path().join("x.c"), dir.path().join("y.c")),
            ]
        );
    }

    #[test]
    fn test_read_manifest_rejects_malformed_line() {
        let dir = TempDir::new().unwrap();
        let manifest = write(&dir, "pairs.tsv", "a.js b.js\n");

        match read_manifest(&manifest) {
            Err(StructuralDiffError::ConfigError(message)) => {
                assert!(message.ends_with(":1: expected `before<TAB>after`"));
            }
            other => panic!("expected config error, got {other:?}"),
        }
    }

    #[test]
    fn test_monitor_stats() {
        let monitor = DiffMonitor::new();
        monitor.record_pair_processed(Duration::from_millis(10));
        monitor.record_pair_processed(Duration::from_millis(30));
        monitor.record_error();
        monitor.record_cost(7);

        let stats = monitor.get_stats();
        assert_eq!(stats.pairs_processed, 2);
        assert_eq!(stats.successful_pairs, 1);
        assert_eq!(stats.failed_pairs, 1);
        assert_eq!(stats.avg_pair_duration, Duration::from_millis(20));
        assert_eq!(stats.total_cost, 7);
    }
}
