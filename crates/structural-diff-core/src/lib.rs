//! structural-diff-core - 结构化语法树差异核心库
//!
//! 把 Tree-sitter 语法树归一为四种规范形状的注解树，
//! 再在树上求最小代价的补丁：复制、插入、删除和递归替换。

mod align;
pub mod batch;
pub mod document;
pub mod error;
pub mod interpreter;
pub mod parser;
pub mod patch;
pub mod syntax;
pub mod term;

#[cfg(test)]
mod testing;

// 重新导出主要的公共 API
pub use batch::{
    BatchDiffer, BatchResult, BatchStats, DiffMonitor, FilePair, PairDiff, read_manifest,
};
pub use document::{DiffDocument, PatchJson, ReplaceJson, TermJson, patch_to_json};
pub use error::{Result, StructuralDiffError};
pub use interpreter::{Diff, DiffPolicy, Interpreter, StructuralPolicy};
pub use parser::{
    C_SHAPES, CParser, GO_SHAPES, GoParser, JAVASCRIPT_SHAPES, JavaScriptParser, LanguageParser,
    ParserFactory, SourceFile, SupportedLanguage,
};
pub use patch::{Aligned, CostFold, DiffSummary, Nodes, Patch, PatchFold, Replacement};
pub use syntax::{Children, ShapeKind, ShapeTable, Syntax, SyntaxNode, classify, node_text};
pub use term::{Info, Term, TermBuilder};
