//! C 语言解析器实现

use super::common::LanguageParser;
use crate::error::{Result, StructuralDiffError};
use crate::syntax::ShapeTable;
use tree_sitter::{Parser, Tree};

/// C 的产生式形状表
///
/// 初始化列表按键比较：指定初始化器以指示符为键，
/// 位置初始化器没有键，同一列表中只保留最后一个
pub static C_SHAPES: ShapeTable = ShapeTable {
    fixed: &[
        "binary_expression",
        "assignment_expression",
        "subscript_expression",
        "field_expression",
        "call_expression",
        "conditional_expression",
        "function_definition",
        "init_declarator",
        "initializer_pair",
    ],
    keyed: &["initializer_list"],
    pair: "initializer_pair",
};

/// C 语言解析器
pub struct CParser {
    parser: Parser,
}

impl CParser {
    pub fn new() -> Result<Self> {
        let language = tree_sitter_c::LANGUAGE.into();
        let mut parser = Parser::new();

        parser.set_language(&language).map_err(|e| {
            StructuralDiffError::TreeSitterError(format!("Failed to set C language: {e}"))
        })?;

        Ok(Self { parser })
    }
}

impl LanguageParser for CParser {
    fn parse_source(&mut self, source: &str) -> Result<Tree> {
        self.parser.parse(source, None).ok_or_else(|| {
            StructuralDiffError::ParseError("Failed to parse C source code".to_string())
        })
    }

    fn shape_table(&self) -> &'static ShapeTable {
        &C_SHAPES
    }

    fn language_name(&self) -> &'static str {
        "C"
    }

    fn file_extensions(&self) -> &'static [&'static str] {
        &["c", "h"]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::{ShapeKind, Syntax};
    use crate::term::Term;
    use pretty_assertions::assert_eq;

    fn find<'t>(term: &'t Term, category: &str) -> Option<&'t Term> {
        let mut stack = vec![term];
        while let Some(term) = stack.pop() {
            if term.info().categories().contains(category) {
                return Some(term);
            }
            stack.extend(term.syntax().children().rev());
        }
        None
    }

    #[test]
    fn test_parse_translation_unit() {
        let mut parser = CParser::new().unwrap();
        let tree = parser
            .parse_source("int add(int a, int b) { return a + b; }\n")
            .unwrap();

        assert_eq!(tree.root_node().kind(), "translation_unit");
        assert!(!tree.root_node().has_error());
    }

    #[test]
    fn test_designated_initializer_is_keyed() {
        let mut parser = CParser::new().unwrap();
        let term = parser
            .parse_term("struct point p = { .x = 1, .y = 2 };\n")
            .unwrap();

        let list = find(&term, "initializer_list").expect("initializer_list in tree");
        assert_eq!(list.kind(), ShapeKind::Keyed);

        let keys: Vec<&str> = match list.syntax() {
            Syntax::Keyed(entries) => entries.iter().map(|(key, _)| key.as_str()).collect(),
            _ => unreachable!(),
        };
        assert_eq!(keys, vec![".x", ".y"]);
    }

    #[test]
    fn test_function_definition_is_fixed() {
        let mut parser = CParser::new().unwrap();
        let term = parser
            .parse_term("int add(int a, int b) { return a + b; }\n")
            .unwrap();

        let definition = find(&term, "function_definition").unwrap();
        assert_eq!(definition.kind(), ShapeKind::Fixed);

        let binary = find(definition, "binary_expression").unwrap();
        assert_eq!(binary.kind(), ShapeKind::Fixed);
    }
}
