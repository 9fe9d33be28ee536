//! 补丁模型
//!
//! 差异结果是一棵与输入形状同构的补丁树：复制、插入、删除，
//! 以及对可比较节点的递归替换。补丁树构造后不可变，
//! 对外只通过 [`PatchFold`] 结构折叠来消费。

use crate::syntax::{Children, ShapeKind};
use crate::term::{Info, Term};
use serde::Serialize;
use std::fmt;

/// 补丁节点
#[derive(Debug)]
pub enum Patch {
    /// 两侧子树结构相等
    Copy { before: Term, after: Term },
    /// 只存在于修改后的子树
    Insert(Term),
    /// 只存在于修改前的子树
    Delete(Term),
    /// 可比较但不相等的节点，递归对齐其子节点
    Replace(Box<Replacement>),
}

/// 替换节点：两侧注解加上对齐后的子补丁
#[derive(Debug)]
pub struct Replacement {
    before: Info,
    after: Info,
    body: Aligned<Patch>,
}

impl Replacement {
    pub fn new(before: Info, after: Info, body: Aligned<Patch>) -> Self {
        Self {
            before,
            after,
            body,
        }
    }

    pub fn before(&self) -> &Info {
        &self.before
    }

    pub fn after(&self) -> &Info {
        &self.after
    }

    pub fn body(&self) -> &Aligned<Patch> {
        &self.body
    }
}

impl Drop for Replacement {
    fn drop(&mut self) {
        let mut pending = self.body.take_children();
        while let Some(patch) = pending.pop() {
            if let Patch::Replace(mut nested) = patch {
                pending.extend(nested.body.take_children());
            }
        }
    }
}

/// 对齐后的一层子节点，形状与被替换的节点一致
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Aligned<T> {
    /// 叶子文本的替换
    Leaf { before: String, after: String },
    Indexed(Vec<T>),
    Fixed(Vec<T>),
    /// 键值对齐结果；不可比较的同键条目会以删除 + 插入两项出现
    Keyed(Vec<(String, T)>),
}

impl<T> Aligned<T> {
    pub fn kind(&self) -> ShapeKind {
        match self {
            Aligned::Leaf { .. } => ShapeKind::Leaf,
            Aligned::Indexed(_) => ShapeKind::Indexed,
            Aligned::Fixed(_) => ShapeKind::Fixed,
            Aligned::Keyed(_) => ShapeKind::Keyed,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Aligned::Leaf { .. } => 0,
            Aligned::Indexed(children) | Aligned::Fixed(children) => children.len(),
            Aligned::Keyed(entries) => entries.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn children(&self) -> Children<'_, T> {
        match self {
            Aligned::Leaf { .. } => Children::Empty,
            Aligned::Indexed(children) | Aligned::Fixed(children) => {
                Children::Ordered(children.iter())
            }
            Aligned::Keyed(entries) => Children::Keyed(entries.iter()),
        }
    }

    fn take_children(&mut self) -> Vec<T> {
        match self {
            Aligned::Leaf { .. } => Vec::new(),
            Aligned::Indexed(children) | Aligned::Fixed(children) => std::mem::take(children),
            Aligned::Keyed(entries) => std::mem::take(entries)
                .into_iter()
                .map(|(_, child)| child)
                .collect(),
        }
    }

    /// 保持形状和键，用 `outputs` 依次替换子节点
    fn with_children<U>(&self, outputs: Vec<U>) -> Aligned<U> {
        match self {
            Aligned::Leaf { before, after } => Aligned::Leaf {
                before: before.clone(),
                after: after.clone(),
            },
            Aligned::Indexed(_) => Aligned::Indexed(outputs),
            Aligned::Fixed(_) => Aligned::Fixed(outputs),
            Aligned::Keyed(entries) => Aligned::Keyed(
                entries
                    .iter()
                    .map(|(key, _)| key.clone())
                    .zip(outputs)
                    .collect(),
            ),
        }
    }
}

/// 补丁树的结构折叠
///
/// 替换节点的子节点先被折叠，结果按原形状交给 [`PatchFold::replace`]。
pub trait PatchFold {
    type Output;

    fn copy(&mut self, before: &Term, after: &Term) -> Self::Output;

    fn insert(&mut self, term: &Term) -> Self::Output;

    fn delete(&mut self, term: &Term) -> Self::Output;

    fn replace(
        &mut self,
        replacement: &Replacement,
        children: Aligned<Self::Output>,
    ) -> Self::Output;
}

impl Patch {
    /// 自底向上折叠补丁树，使用显式栈遍历
    pub fn fold<F: PatchFold>(&self, folder: &mut F) -> F::Output {
        enum Visit<'p> {
            Enter(&'p Patch),
            Exit(&'p Replacement),
        }

        let mut stack = vec![Visit::Enter(self)];
        let mut outputs: Vec<F::Output> = Vec::new();

        while let Some(visit) = stack.pop() {
            match visit {
                Visit::Enter(Patch::Copy { before, after }) => {
                    outputs.push(folder.copy(before, after));
                }
                Visit::Enter(Patch::Insert(term)) => outputs.push(folder.insert(term)),
                Visit::Enter(Patch::Delete(term)) => outputs.push(folder.delete(term)),
                Visit::Enter(Patch::Replace(boxed)) => {
                    let replacement: &Replacement = boxed;
                    stack.push(Visit::Exit(replacement));
                    stack.extend(replacement.body.children().rev().map(Visit::Enter));
                }
                Visit::Exit(replacement) => {
                    let children = outputs.split_off(outputs.len() - replacement.body.len());
                    let aligned = replacement.body.with_children(children);
                    outputs.push(folder.replace(replacement, aligned));
                }
            }
        }

        match outputs.pop() {
            Some(output) => output,
            None => unreachable!("every visited patch pushes exactly one output"),
        }
    }

    /// 按结构代价模型计算的总代价
    pub fn cost(&self) -> usize {
        self.fold(&mut CostFold)
    }

    /// 先序遍历补丁树的全部节点
    pub fn iter(&self) -> Nodes<'_> {
        Nodes { stack: vec![self] }
    }

    pub fn is_copy(&self) -> bool {
        matches!(self, Patch::Copy { .. })
    }

    /// 补丁种类名称
    pub fn kind_name(&self) -> &'static str {
        match self {
            Patch::Copy { .. } => "copy",
            Patch::Insert(_) => "insert",
            Patch::Delete(_) => "delete",
            Patch::Replace(_) => "replace",
        }
    }
}

/// [`Patch::iter`] 返回的先序迭代器
pub struct Nodes<'p> {
    stack: Vec<&'p Patch>,
}

impl<'p> Iterator for Nodes<'p> {
    type Item = &'p Patch;

    fn next(&mut self) -> Option<Self::Item> {
        let patch = self.stack.pop()?;
        if let Patch::Replace(replacement) = patch {
            self.stack.extend(replacement.body.children().rev());
        }
        Some(patch)
    }
}

/// 结构代价：复制为 0，插入和删除为子树大小，
/// 替换为子节点代价之和，叶子文本不同时另计 1
#[derive(Debug, Clone, Copy, Default)]
pub struct CostFold;

impl PatchFold for CostFold {
    type Output = usize;

    fn copy(&mut self, _before: &Term, _after: &Term) -> usize {
        0
    }

    fn insert(&mut self, term: &Term) -> usize {
        term.size()
    }

    fn delete(&mut self, term: &Term) -> usize {
        term.size()
    }

    fn replace(&mut self, _replacement: &Replacement, children: Aligned<usize>) -> usize {
        match children {
            Aligned::Leaf { before, after } => usize::from(before != after),
            Aligned::Indexed(costs) | Aligned::Fixed(costs) => costs.into_iter().sum(),
            Aligned::Keyed(entries) => entries.into_iter().map(|(_, cost)| cost).sum(),
        }
    }
}

/// 补丁统计信息
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DiffSummary {
    /// 复制的子树数量
    pub copies: usize,
    /// 插入的子树数量
    pub inserts: usize,
    /// 删除的子树数量
    pub deletes: usize,
    /// 替换节点数量
    pub replaces: usize,
    /// 总代价
    pub cost: usize,
}

impl DiffSummary {
    /// 统计一组补丁中各类节点的数量，代价由调用方填写
    pub fn count(patches: &[Patch]) -> Self {
        let mut counter = SummaryFold::default();
        for patch in patches {
            patch.fold(&mut counter);
        }
        counter.summary
    }

    /// 是否完全没有变化
    pub fn is_unchanged(&self) -> bool {
        self.inserts == 0 && self.deletes == 0 && self.replaces == 0
    }
}

#[derive(Default)]
struct SummaryFold {
    summary: DiffSummary,
}

impl PatchFold for SummaryFold {
    type Output = ();

    fn copy(&mut self, _before: &Term, _after: &Term) {
        self.summary.copies += 1;
    }

    fn insert(&mut self, _term: &Term) {
        self.summary.inserts += 1;
    }

    fn delete(&mut self, _term: &Term) {
        self.summary.deletes += 1;
    }

    fn replace(&mut self, _replacement: &Replacement, _children: Aligned<()>) {
        self.summary.replaces += 1;
    }
}

/// 以类 S 表达式的紧凑文本展示补丁
///
/// `(= ..)` 复制，`(+ ..)` 插入，`(- ..)` 删除，`(~ ..)` 替换
struct SExpression;

impl SExpression {
    fn term(term: &Term) -> String {
        match term.syntax() {
            crate::syntax::Syntax::Leaf(text) => format!("{text:?}"),
            _ => term.info().primary_category().to_string(),
        }
    }
}

impl PatchFold for SExpression {
    type Output = String;

    fn copy(&mut self, before: &Term, _after: &Term) -> String {
        format!("(= {})", Self::term(before))
    }

    fn insert(&mut self, term: &Term) -> String {
        format!("(+ {})", Self::term(term))
    }

    fn delete(&mut self, term: &Term) -> String {
        format!("(- {})", Self::term(term))
    }

    fn replace(&mut self, replacement: &Replacement, children: Aligned<String>) -> String {
        let parts: Vec<String> = match children {
            Aligned::Leaf { before, after } => return format!("(~ {before:?} -> {after:?})"),
            Aligned::Indexed(children) | Aligned::Fixed(children) => children,
            Aligned::Keyed(entries) => entries
                .into_iter()
                .map(|(key, child)| format!("{key:?}: {child}"))
                .collect(),
        };

        let category = replacement.before().primary_category();
        if parts.is_empty() {
            format!("(~ {category})")
        } else {
            format!("(~ {category} {})", parts.join(" "))
        }
    }
}

impl fmt::Display for Patch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.fold(&mut SExpression))
    }
}
