//! 节点分类模块
//!
//! 将外部解析器产生的具体语法树节点归入四种规范形状之一：
//! 叶子（Leaf）、有序序列（Indexed）、定长元组（Fixed）和键值映射（Keyed）。

use crate::error::{Result, StructuralDiffError};
use std::ops::Range;

/// 原始语法树节点接口
///
/// 分类器只依赖这三项能力，不关心节点来自哪个解析器
pub trait SyntaxNode: Copy {
    /// 语法产生式名称
    fn category(&self) -> &str;

    /// 节点在源码中的字节范围
    fn byte_range(&self) -> Range<usize>;

    /// 按源码顺序返回具名子节点
    fn named_children(&self) -> Vec<Self>;

    /// 未具名的运算符子节点
    ///
    /// 多数文法把运算符记为匿名记号，不出现在具名子节点中
    fn operator(&self) -> Option<Self> {
        None
    }
}

/// 运算符叶子使用的产生式标签，使不同运算符之间可以比较
pub const OPERATOR_CATEGORY: &str = "operator";

impl<'tree> SyntaxNode for tree_sitter::Node<'tree> {
    fn category(&self) -> &str {
        self.kind()
    }

    fn byte_range(&self) -> Range<usize> {
        tree_sitter::Node::byte_range(self)
    }

    fn named_children(&self) -> Vec<Self> {
        let mut cursor = self.walk();
        tree_sitter::Node::named_children(self, &mut cursor).collect()
    }

    fn operator(&self) -> Option<Self> {
        self.child_by_field_name("operator")
            .filter(|operator| !operator.is_named())
    }
}

/// 截取节点对应的源码文本
pub fn node_text<'s, N: SyntaxNode>(node: &N, source: &'s str) -> Result<&'s str> {
    let range = node.byte_range();
    source
        .get(range.clone())
        .ok_or(StructuralDiffError::InvalidByteRange {
            start: range.start,
            end: range.end,
            len: source.len(),
        })
}

/// 规范形状的种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ShapeKind {
    Leaf,
    Indexed,
    Fixed,
    Keyed,
}

impl ShapeKind {
    /// 形状名称，用于输出
    pub fn name(self) -> &'static str {
        match self {
            ShapeKind::Leaf => "leaf",
            ShapeKind::Indexed => "indexed",
            ShapeKind::Fixed => "fixed",
            ShapeKind::Keyed => "keyed",
        }
    }
}

/// 语法产生式到形状的静态映射表
///
/// 每种语言提供一张表；不在任何集合中的产生式默认为 Indexed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShapeTable {
    /// 定长结构的产生式（二元运算、成员访问、函数调用等）
    pub fixed: &'static [&'static str],
    /// 键值结构的产生式（对象字面量等）
    pub keyed: &'static [&'static str],
    /// 键值结构中"键值对"条目的产生式名称
    pub pair: &'static str,
}

impl ShapeTable {
    /// 根据产生式和是否有具名子节点选择形状
    pub fn select(&self, category: &str, has_named_children: bool) -> ShapeKind {
        if !has_named_children {
            ShapeKind::Leaf
        } else if self.fixed.contains(&category) {
            ShapeKind::Fixed
        } else if self.keyed.contains(&category) {
            ShapeKind::Keyed
        } else {
            ShapeKind::Indexed
        }
    }
}

/// 一层规范形状，子节点类型由 `T` 决定
///
/// 分类时 `T` 是"原始节点 + 产生式"，构建完成后 `T` 是 [`crate::Term`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Syntax<T> {
    /// 终结文本
    Leaf(String),
    /// 有序、不定长的子节点序列
    Indexed(Vec<T>),
    /// 有序、由语法规则决定长度的子节点序列
    Fixed(Vec<T>),
    /// 键唯一的映射，保留首次出现的顺序
    Keyed(Vec<(String, T)>),
}

impl<T> Syntax<T> {
    /// 形状种类
    pub fn kind(&self) -> ShapeKind {
        match self {
            Syntax::Leaf(_) => ShapeKind::Leaf,
            Syntax::Indexed(_) => ShapeKind::Indexed,
            Syntax::Fixed(_) => ShapeKind::Fixed,
            Syntax::Keyed(_) => ShapeKind::Keyed,
        }
    }

    /// 子节点数量
    pub fn len(&self) -> usize {
        match self {
            Syntax::Leaf(_) => 0,
            Syntax::Indexed(children) | Syntax::Fixed(children) => children.len(),
            Syntax::Keyed(entries) => entries.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 按顺序遍历子节点
    pub fn children(&self) -> Children<'_, T> {
        match self {
            Syntax::Leaf(_) => Children::Empty,
            Syntax::Indexed(children) | Syntax::Fixed(children) => {
                Children::Ordered(children.iter())
            }
            Syntax::Keyed(entries) => Children::Keyed(entries.iter()),
        }
    }

    /// 取走全部子节点，留下空的同形状
    pub fn take_children(&mut self) -> Vec<T> {
        match self {
            Syntax::Leaf(_) => Vec::new(),
            Syntax::Indexed(children) | Syntax::Fixed(children) => std::mem::take(children),
            Syntax::Keyed(entries) => std::mem::take(entries)
                .into_iter()
                .map(|(_, child)| child)
                .collect(),
        }
    }
}

/// [`Syntax::children`] 返回的迭代器
pub enum Children<'a, T> {
    Empty,
    Ordered(std::slice::Iter<'a, T>),
    Keyed(std::slice::Iter<'a, (String, T)>),
}

impl<'a, T> Iterator for Children<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            Children::Empty => None,
            Children::Ordered(iter) => iter.next(),
            Children::Keyed(iter) => iter.next().map(|(_, child)| child),
        }
    }
}

impl<T> DoubleEndedIterator for Children<'_, T> {
    fn next_back(&mut self) -> Option<Self::Item> {
        match self {
            Children::Empty => None,
            Children::Ordered(iter) => iter.next_back(),
            Children::Keyed(iter) => iter.next_back().map(|(_, child)| child),
        }
    }
}

/// 向键值条目中插入，重复的键覆盖旧值但保留原位置
pub(crate) fn insert_entry<T>(entries: &mut Vec<(String, T)>, key: String, value: T) {
    match entries.iter_mut().find(|(existing, _)| *existing == key) {
        Some(slot) => slot.1 = value,
        None => entries.push((key, value)),
    }
}

/// 对单个节点做一层分类
///
/// 返回的子节点附带各自的产生式，由调用方继续递归分类。
/// 分类本身是全函数，唯一的失败来源是无法截取源码文本。
pub fn classify<N: SyntaxNode>(
    node: N,
    category: &str,
    source: &str,
    table: &ShapeTable,
) -> Result<Syntax<(N, String)>> {
    let children = node.named_children();

    match table.select(category, !children.is_empty()) {
        ShapeKind::Leaf => Ok(Syntax::Leaf(node_text(&node, source)?.to_string())),
        ShapeKind::Fixed => {
            let mut children = tag_with_category(children);
            if let Some(operator) = node.operator() {
                let start = operator.byte_range().start;
                let at = children.partition_point(|(child, _)| child.byte_range().start < start);
                children.insert(at, (operator, OPERATOR_CATEGORY.to_string()));
            }
            Ok(Syntax::Fixed(children))
        }
        ShapeKind::Indexed => Ok(Syntax::Indexed(tag_with_category(children))),
        ShapeKind::Keyed => {
            let mut entries = Vec::with_capacity(children.len());
            for child in children {
                let (key, value_category) = if child.category() == table.pair {
                    let key = match child.named_children().first() {
                        Some(first) => node_text(first, source)?,
                        None => node_text(&node, source)?,
                    };
                    (key, table.pair.to_string())
                } else {
                    // 注释等非键值对条目没有自己的键，借用父节点文本
                    (node_text(&node, source)?, child.category().to_string())
                };
                insert_entry(&mut entries, key.to_string(), (child, value_category));
            }
            Ok(Syntax::Keyed(entries))
        }
    }
}

fn tag_with_category<N: SyntaxNode>(children: Vec<N>) -> Vec<(N, String)> {
    children
        .into_iter()
        .map(|child| {
            let category = child.category().to_string();
            (child, category)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockTree;
    use pretty_assertions::assert_eq;

    const TABLE: ShapeTable = ShapeTable {
        fixed: &["binary"],
        keyed: &["object"],
        pair: "pair",
    };

    #[test]
    fn test_select_shape() {
        assert_eq!(TABLE.select("binary", true), ShapeKind::Fixed);
        assert_eq!(TABLE.select("object", true), ShapeKind::Keyed);
        assert_eq!(TABLE.select("array", true), ShapeKind::Indexed);

        // 没有具名子节点时无论产生式如何都是叶子
        assert_eq!(TABLE.select("binary", false), ShapeKind::Leaf);
        assert_eq!(TABLE.select("object", false), ShapeKind::Leaf);
    }

    #[test]
    fn test_classify_leaf() {
        let source = "foo";
        let tree = MockTree::new().node("identifier", 0..3, &[]);
        let shape = classify(tree.root(), "identifier", source, &TABLE).unwrap();
        assert_eq!(shape, Syntax::Leaf("foo".to_string()));
    }

    #[test]
    fn test_classify_fixed_and_indexed() {
        let source = "a+b";
        let tree = MockTree::new()
            .node("identifier", 0..1, &[])
            .node("identifier", 2..3, &[])
            .node("binary", 0..3, &[0, 1]);

        let fixed = classify(tree.root(), "binary", source, &TABLE).unwrap();
        assert_eq!(fixed.kind(), ShapeKind::Fixed);
        assert_eq!(fixed.len(), 2);

        let indexed = classify(tree.root(), "array", source, &TABLE).unwrap();
        assert_eq!(indexed.kind(), ShapeKind::Indexed);
        let categories: Vec<&str> = indexed.children().map(|(_, c)| c.as_str()).collect();
        assert_eq!(categories, vec!["identifier", "identifier"]);
    }

    #[test]
    fn test_classify_fixed_includes_operator() {
        let source = "a+b";
        let tree = MockTree::new()
            .node("identifier", 0..1, &[])
            .node("+", 1..2, &[])
            .node("identifier", 2..3, &[])
            .node("binary", 0..3, &[0, 2])
            .operator(1);

        let fixed = classify(tree.root(), "binary", source, &TABLE).unwrap();
        let categories: Vec<&str> = fixed.children().map(|(_, c)| c.as_str()).collect();
        assert_eq!(categories, vec!["identifier", OPERATOR_CATEGORY, "identifier"]);

        // 序列形状只保留具名子节点
        let indexed = classify(tree.root(), "array", source, &TABLE).unwrap();
        assert_eq!(indexed.len(), 2);
    }

    #[test]
    fn test_classify_keyed_pairs_and_fallback_key() {
        let source = "{a:1,/*c*/}";
        let tree = MockTree::new()
            .node("property", 1..2, &[])
            .node("number", 3..4, &[])
            .node("pair", 1..4, &[0, 1])
            .node("comment", 5..10, &[])
            .node("object", 0..11, &[2, 3]);

        let shape = classify(tree.root(), "object", source, &TABLE).unwrap();
        let Syntax::Keyed(entries) = shape else {
            panic!("expected keyed shape");
        };

        let keys: Vec<&str> = entries.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["a", "{a:1,/*c*/}"]);
        assert_eq!(entries[0].1.1, "pair");
        assert_eq!(entries[1].1.1, "comment");
    }

    #[test]
    fn test_classify_keyed_duplicate_keys_keep_first_position() {
        let source = "{a:1,b:2,a:3}";
        let tree = MockTree::new()
            .node("property", 1..2, &[])
            .node("number", 3..4, &[])
            .node("pair", 1..4, &[0, 1])
            .node("property", 5..6, &[])
            .node("number", 7..8, &[])
            .node("pair", 5..8, &[3, 4])
            .node("property", 9..10, &[])
            .node("number", 11..12, &[])
            .node("pair", 9..12, &[6, 7])
            .node("object", 0..13, &[2, 5, 8]);

        let Syntax::Keyed(entries) = classify(tree.root(), "object", source, &TABLE).unwrap()
        else {
            panic!("expected keyed shape");
        };

        let keys: Vec<&str> = entries.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["a", "b"]);
        // 后出现的值覆盖先前的值
        assert_eq!(entries[0].1.0.byte_range(), 9..12);
    }

    #[test]
    fn test_classify_invalid_range_is_error() {
        let source = "ab";
        let tree = MockTree::new().node("identifier", 0..10, &[]);
        let result = classify(tree.root(), "identifier", source, &TABLE);

        match result {
            Err(StructuralDiffError::InvalidByteRange { start, end, len }) => {
                assert_eq!((start, end, len), (0, 10, 2));
            }
            other => panic!("Expected InvalidByteRange error, got {other:?}"),
        }
    }

    #[test]
    fn test_classify_is_deterministic() {
        let source = "{a:1}";
        let tree = MockTree::new()
            .node("property", 1..2, &[])
            .node("number", 3..4, &[])
            .node("pair", 1..4, &[0, 1])
            .node("object", 0..5, &[2]);

        let first = classify(tree.root(), "object", source, &TABLE).unwrap();
        let second = classify(tree.root(), "object", source, &TABLE).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_classify_tree_sitter_node() {
        let source = "x = a + b;";
        let mut parser = tree_sitter::Parser::new();
        parser
            .set_language(&tree_sitter_javascript::LANGUAGE.into())
            .expect("Failed to set JavaScript language");
        let tree = parser.parse(source, None).expect("Failed to parse");

        let root = tree.root_node();
        let shape = classify(root, "program", source, &TABLE).unwrap();
        assert_eq!(shape.kind(), ShapeKind::Indexed);

        let (statement, category) = shape.children().next().unwrap();
        assert_eq!(category, "expression_statement");
        assert_eq!(node_text(statement, source).unwrap(), "x = a + b;");

        let assignment = SyntaxNode::named_children(statement)[0];
        let binary = SyntaxNode::named_children(&assignment)[1];
        assert_eq!(binary.category(), "binary_expression");
        let operator = SyntaxNode::operator(&binary).unwrap();
        assert_eq!(node_text(&operator, source).unwrap(), "+");
    }
}
