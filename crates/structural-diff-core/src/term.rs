//! 注解语法树模块
//!
//! 把分类后的形状自底向上折叠成不可变的 [`Term`] 树，
//! 每个节点携带形状、源码字节范围和产生式标签。

use crate::error::{Result, StructuralDiffError};
use crate::syntax::{ShapeKind, ShapeTable, Syntax, SyntaxNode, classify, insert_entry};
use rapidhash::RapidHasher;
use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Range;
use std::sync::Arc;
use tracing::debug;

/// 节点注解：源码范围和产生式标签
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Info {
    range: Range<usize>,
    categories: BTreeSet<String>,
}

impl Info {
    /// 创建只有一个产生式标签的注解
    pub fn new(range: Range<usize>, category: impl Into<String>) -> Self {
        Self {
            range,
            categories: BTreeSet::from([category.into()]),
        }
    }

    /// 创建带有多个产生式标签的注解
    pub fn with_categories<I, S>(range: Range<usize>, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            range,
            categories: categories.into_iter().map(Into::into).collect(),
        }
    }

    pub fn range(&self) -> Range<usize> {
        self.range.clone()
    }

    pub fn categories(&self) -> &BTreeSet<String> {
        &self.categories
    }

    /// 排序后的第一个标签，用于简短展示
    pub fn primary_category(&self) -> &str {
        self.categories.iter().next().map_or("", String::as_str)
    }

    /// 两个注解的标签集合是否有交集
    pub fn shares_category_with(&self, other: &Info) -> bool {
        !self.categories.is_disjoint(&other.categories)
    }
}

/// 注解语法树节点
///
/// 子树通过 `Arc` 共享，克隆是常数开销；补丁可以直接引用输入树中的子树。
#[derive(Clone)]
pub struct Term(Arc<TermNode>);

struct TermNode {
    info: Info,
    syntax: Syntax<Term>,
    size: usize,
    digest: u64,
}

impl Term {
    /// 由注解和一层形状构造节点，同时计算子树大小和结构摘要
    pub fn new(info: Info, syntax: Syntax<Term>) -> Self {
        let size = 1 + syntax.children().map(Term::size).sum::<usize>();
        let digest = structural_digest(&syntax);
        Term(Arc::new(TermNode {
            info,
            syntax,
            size,
            digest,
        }))
    }

    pub fn leaf(category: &str, range: Range<usize>, text: impl Into<String>) -> Self {
        Self::new(Info::new(range, category), Syntax::Leaf(text.into()))
    }

    pub fn indexed(category: &str, range: Range<usize>, children: Vec<Term>) -> Self {
        Self::new(Info::new(range, category), Syntax::Indexed(children))
    }

    pub fn fixed(category: &str, range: Range<usize>, children: Vec<Term>) -> Self {
        Self::new(Info::new(range, category), Syntax::Fixed(children))
    }

    /// 构造键值节点，重复的键以后出现的值为准
    pub fn keyed<K: Into<String>>(
        category: &str,
        range: Range<usize>,
        entries: impl IntoIterator<Item = (K, Term)>,
    ) -> Self {
        let mut unique = Vec::new();
        for (key, value) in entries {
            insert_entry(&mut unique, key.into(), value);
        }
        Self::new(Info::new(range, category), Syntax::Keyed(unique))
    }

    pub fn info(&self) -> &Info {
        &self.0.info
    }

    pub fn syntax(&self) -> &Syntax<Term> {
        &self.0.syntax
    }

    pub fn kind(&self) -> ShapeKind {
        self.0.syntax.kind()
    }

    /// 子树节点总数
    pub fn size(&self) -> usize {
        self.0.size
    }

    /// 与注解无关的结构摘要，结构相等的子树摘要必然相同
    pub fn digest(&self) -> u64 {
        self.0.digest
    }

    /// 节点的内存标识，只在树存活期间有效
    pub(crate) fn node_id(&self) -> usize {
        Arc::as_ptr(&self.0) as usize
    }

    /// 忽略注解的结构相等判断
    ///
    /// 形状、叶子文本和子节点逐一相等；键值节点按键比较，与条目顺序无关。
    pub fn structurally_equal(&self, other: &Term) -> bool {
        let mut pending = vec![(self, other)];

        while let Some((a, b)) = pending.pop() {
            if Arc::ptr_eq(&a.0, &b.0) {
                continue;
            }
            if a.digest() != b.digest() || a.size() != b.size() {
                return false;
            }

            match (a.syntax(), b.syntax()) {
                (Syntax::Leaf(x), Syntax::Leaf(y)) => {
                    if x != y {
                        return false;
                    }
                }
                (Syntax::Indexed(xs), Syntax::Indexed(ys))
                | (Syntax::Fixed(xs), Syntax::Fixed(ys)) => {
                    if xs.len() != ys.len() {
                        return false;
                    }
                    pending.extend(xs.iter().zip(ys));
                }
                (Syntax::Keyed(xs), Syntax::Keyed(ys)) => {
                    if xs.len() != ys.len() {
                        return false;
                    }
                    for (key, x) in xs {
                        match ys.iter().find(|(other, _)| other == key) {
                            Some((_, y)) => pending.push((x, y)),
                            None => return false,
                        }
                    }
                }
                _ => return false,
            }
        }

        true
    }
}

impl fmt::Debug for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Term")
            .field("info", &self.0.info)
            .field("syntax", &self.0.syntax)
            .finish()
    }
}

impl Drop for TermNode {
    fn drop(&mut self) {
        // 逐层拆开独占的子树，避免深层嵌套时递归析构耗尽栈空间
        let mut pending = self.syntax.take_children();
        while let Some(term) = pending.pop() {
            if let Ok(mut node) = Arc::try_unwrap(term.0) {
                pending.extend(node.syntax.take_children());
            }
        }
    }
}

fn structural_digest(syntax: &Syntax<Term>) -> u64 {
    let mut hasher = RapidHasher::default();
    syntax.kind().hash(&mut hasher);

    match syntax {
        Syntax::Leaf(text) => text.hash(&mut hasher),
        Syntax::Indexed(children) | Syntax::Fixed(children) => {
            children.len().hash(&mut hasher);
            for child in children {
                child.digest().hash(&mut hasher);
            }
        }
        Syntax::Keyed(entries) => {
            // 键值映射是无序的，条目摘要排序后再合并
            let mut entry_digests: Vec<u64> = entries
                .iter()
                .map(|(key, child)| {
                    let mut entry_hasher = RapidHasher::default();
                    key.hash(&mut entry_hasher);
                    child.digest().hash(&mut entry_hasher);
                    entry_hasher.finish()
                })
                .collect();
            entry_digests.sort_unstable();
            entry_digests.hash(&mut hasher);
        }
    }

    hasher.finish()
}

/// 注解树构建器
///
/// 从外部语法树的根开始逐层分类，用显式栈代替递归，
/// 构建过程不修改外部语法树。
pub struct TermBuilder<'s> {
    source: &'s str,
    table: &'s ShapeTable,
}

enum BranchKind {
    Indexed,
    Fixed,
    Keyed(Vec<String>),
}

struct Frame<N> {
    info: Info,
    kind: BranchKind,
    pending: std::vec::IntoIter<(N, String)>,
    built: Vec<Term>,
}

impl<N> Frame<N> {
    fn new(info: Info, kind: BranchKind, children: Vec<(N, String)>) -> Self {
        Self {
            info,
            kind,
            built: Vec::with_capacity(children.len()),
            pending: children.into_iter(),
        }
    }

    fn finish(self) -> Term {
        let syntax = match self.kind {
            BranchKind::Indexed => Syntax::Indexed(self.built),
            BranchKind::Fixed => Syntax::Fixed(self.built),
            BranchKind::Keyed(keys) => Syntax::Keyed(keys.into_iter().zip(self.built).collect()),
        };
        Term::new(self.info, syntax)
    }
}

enum Opened<N> {
    Leaf(Term),
    Branch(Frame<N>),
}

impl<'s> TermBuilder<'s> {
    /// 创建构建器
    pub fn new(source: &'s str, table: &'s ShapeTable) -> Self {
        Self { source, table }
    }

    /// 以根节点自身的产生式构建注解树
    pub fn build<N: SyntaxNode>(&self, root: N) -> Result<Term> {
        let category = root.category().to_string();
        self.build_with_category(root, category)
    }

    /// 以指定的产生式构建注解树
    pub fn build_with_category<N: SyntaxNode>(
        &self,
        root: N,
        category: impl Into<String>,
    ) -> Result<Term> {
        let mut stack = match self.open(root, category.into())? {
            Opened::Leaf(term) => return Ok(term),
            Opened::Branch(frame) => vec![frame],
        };
        let mut root_term = None;

        while let Some(mut frame) = stack.pop() {
            if let Some((child, category)) = frame.pending.next() {
                match self.open(child, category)? {
                    Opened::Leaf(term) => {
                        frame.built.push(term);
                        stack.push(frame);
                    }
                    Opened::Branch(child_frame) => {
                        stack.push(frame);
                        stack.push(child_frame);
                    }
                }
                continue;
            }

            let term = frame.finish();
            match stack.last_mut() {
                Some(parent) => parent.built.push(term),
                None => root_term = Some(term),
            }
        }

        let term = root_term.ok_or_else(|| {
            StructuralDiffError::ParseError("Syntax tree produced no root term".to_string())
        })?;
        debug!(
            "Built term tree: {} nodes, root category {}",
            term.size(),
            term.info().primary_category()
        );
        Ok(term)
    }

    fn open<N: SyntaxNode>(&self, node: N, category: String) -> Result<Opened<N>> {
        let shape = classify(node, &category, self.source, self.table)?;
        let info = Info::new(node.byte_range(), category);

        Ok(match shape {
            Syntax::Leaf(text) => Opened::Leaf(Term::new(info, Syntax::Leaf(text))),
            Syntax::Indexed(children) => {
                Opened::Branch(Frame::new(info, BranchKind::Indexed, children))
            }
            Syntax::Fixed(children) => Opened::Branch(Frame::new(info, BranchKind::Fixed, children)),
            Syntax::Keyed(entries) => {
                let (keys, children): (Vec<_>, Vec<_>) = entries.into_iter().unzip();
                Opened::Branch(Frame::new(info, BranchKind::Keyed(keys), children))
            }
        })
    }
}
