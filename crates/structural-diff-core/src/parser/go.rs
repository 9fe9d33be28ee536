//! Go 语言解析器实现
//!
//! 基于 Tree-sitter 的 Go 语言源码解析器

use super::common::LanguageParser;
use crate::error::{Result, StructuralDiffError};
use crate::syntax::ShapeTable;
use tree_sitter::{Parser, Tree};

/// Go 的产生式形状表
///
/// 复合字面量的 `literal_value` 按键比较，`keyed_element` 的第一个子节点是键
pub static GO_SHAPES: ShapeTable = ShapeTable {
    fixed: &[
        "binary_expression",
        "selector_expression",
        "index_expression",
        "call_expression",
        "assignment_statement",
        "short_var_declaration",
        "keyed_element",
        "function_declaration",
    ],
    keyed: &["literal_value"],
    pair: "keyed_element",
};

/// Go 语言解析器
pub struct GoParser {
    parser: Parser,
}

impl GoParser {
    /// 创建新的 Go 解析器
    pub fn new() -> Result<Self> {
        let language = tree_sitter_go::LANGUAGE.into();
        let mut parser = Parser::new();

        parser.set_language(&language).map_err(|e| {
            StructuralDiffError::TreeSitterError(format!("Failed to set Go language: {e}"))
        })?;

        Ok(Self { parser })
    }
}

impl LanguageParser for GoParser {
    /// 解析源码为语法树
    fn parse_source(&mut self, source: &str) -> Result<Tree> {
        self.parser.parse(source, None).ok_or_else(|| {
            StructuralDiffError::ParseError("Failed to parse Go source code".to_string())
        })
    }

    fn shape_table(&self) -> &'static ShapeTable {
        &GO_SHAPES
    }

    /// 获取语言名称
    fn language_name(&self) -> &'static str {
        "Go"
    }

    /// 获取支持的文件扩展名
    fn file_extensions(&self) -> &'static [&'static str] {
        &["go"]
    }
}
