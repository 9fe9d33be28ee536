//! JavaScript 语言解析器实现

use super::common::LanguageParser;
use crate::error::{Result, StructuralDiffError};
use crate::syntax::ShapeTable;
use tree_sitter::{Parser, Tree};

/// JavaScript 的产生式形状表
pub static JAVASCRIPT_SHAPES: ShapeTable = ShapeTable {
    fixed: &[
        "pair",
        "binary_expression",
        "assignment_expression",
        "augmented_assignment_expression",
        "subscript_expression",
        "member_expression",
        "new_expression",
        "call_expression",
        "function_expression",
        "function_declaration",
        "arrow_function",
        "ternary_expression",
    ],
    keyed: &["object"],
    pair: "pair",
};

/// JavaScript 语言解析器
pub struct JavaScriptParser {
    parser: Parser,
}

impl JavaScriptParser {
    /// 创建新的 JavaScript 解析器
    pub fn new() -> Result<Self> {
        let language = tree_sitter_javascript::LANGUAGE.into();
        let mut parser = Parser::new();

        parser.set_language(&language).map_err(|e| {
            StructuralDiffError::TreeSitterError(format!("Failed to set JavaScript language: {e}"))
        })?;

        Ok(Self { parser })
    }
}

impl LanguageParser for JavaScriptParser {
    fn parse_source(&mut self, source: &str) -> Result<Tree> {
        self.parser.parse(source, None).ok_or_else(|| {
            StructuralDiffError::ParseError("Failed to parse JavaScript source code".to_string())
        })
    }

    fn shape_table(&self) -> &'static ShapeTable {
        &JAVASCRIPT_SHAPES
    }

    fn language_name(&self) -> &'static str {
        "JavaScript"
    }

    fn file_extensions(&self) -> &'static [&'static str] {
        &["js", "mjs", "cjs"]
    }
}
