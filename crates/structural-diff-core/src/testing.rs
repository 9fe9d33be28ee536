//! 测试辅助：内存中的原始语法树

use crate::syntax::SyntaxNode;
use std::ops::Range;

#[derive(Debug, PartialEq)]
struct MockData {
    category: &'static str,
    range: Range<usize>,
    children: Vec<usize>,
    operator: Option<usize>,
}

/// 按后序追加节点的简易语法树，最后追加的节点为根
#[derive(Debug, Default, PartialEq)]
pub struct MockTree {
    nodes: Vec<MockData>,
}

impl MockTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加节点，`children` 为已追加节点的下标
    pub fn node(mut self, category: &'static str, range: Range<usize>, children: &[usize]) -> Self {
        self.nodes.push(MockData {
            category,
            range,
            children: children.to_vec(),
            operator: None,
        });
        self
    }

    /// 给最后追加的节点指定匿名运算符子节点
    pub fn operator(mut self, id: usize) -> Self {
        if let Some(last) = self.nodes.last_mut() {
            last.operator = Some(id);
        }
        self
    }

    pub fn root(&self) -> MockNode<'_> {
        MockNode {
            tree: self,
            id: self.nodes.len() - 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MockNode<'a> {
    tree: &'a MockTree,
    id: usize,
}

impl SyntaxNode for MockNode<'_> {
    fn category(&self) -> &str {
        self.tree.nodes[self.id].category
    }

    fn byte_range(&self) -> Range<usize> {
        self.tree.nodes[self.id].range.clone()
    }

    fn named_children(&self) -> Vec<Self> {
        self.tree.nodes[self.id]
            .children
            .iter()
            .map(|&id| MockNode {
                tree: self.tree,
                id,
            })
            .collect()
    }

    fn operator(&self) -> Option<Self> {
        self.tree.nodes[self.id].operator.map(|id| MockNode {
            tree: self.tree,
            id,
        })
    }
}
