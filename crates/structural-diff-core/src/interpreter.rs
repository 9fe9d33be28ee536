//! 差异解释器
//!
//! 对两棵注解树递归求最小代价补丁树。相等判断、可比较判断和代价函数
//! 由 [`DiffPolicy`] 提供，对齐算法本身与具体代价模型无关。
//! 递归通过堆上的显式帧栈完成，树的深度不会消耗调用栈。

use crate::align::{Alignment, KeyedPlan, Measure, align_sequences};
use crate::patch::{Aligned, DiffSummary, Patch, Replacement};
use crate::syntax::Syntax;
use crate::term::Term;
use std::collections::HashMap;
use std::fmt;
use tracing::debug;

/// 差异解释器依赖的三项能力
pub trait DiffPolicy {
    /// 两棵子树是否相等，相等时整体复制
    fn equal(&self, before: &Term, after: &Term) -> bool;

    /// 两个节点是否可以视为"同一节点被修改"
    fn comparable(&self, before: &Term, after: &Term) -> bool;

    /// 单个补丁节点自身的代价，不含其子补丁
    ///
    /// 分支替换节点的代价只能取决于两侧注解和形状，比较子节点前就会被求值
    fn cost(&self, patch: &Patch) -> usize;
}

/// 默认策略：忽略注解的结构相等、产生式标签有交集即可比较、结构代价
#[derive(Debug, Clone, Copy, Default)]
pub struct StructuralPolicy;

impl DiffPolicy for StructuralPolicy {
    fn equal(&self, before: &Term, after: &Term) -> bool {
        before.structurally_equal(after)
    }

    fn comparable(&self, before: &Term, after: &Term) -> bool {
        before.info().shares_category_with(after.info())
    }

    fn cost(&self, patch: &Patch) -> usize {
        match patch {
            Patch::Copy { .. } => 0,
            Patch::Insert(term) | Patch::Delete(term) => term.size(),
            Patch::Replace(replacement) => match replacement.body() {
                Aligned::Leaf { before, after } => usize::from(before != after),
                _ => 0,
            },
        }
    }
}

/// 一次差异计算的结果
///
/// 通常只有一个补丁；根节点不可比较时是"删除 + 插入"两个补丁。
#[derive(Debug)]
pub struct Diff {
    patches: Vec<Patch>,
    cost: usize,
}

impl Diff {
    pub fn patches(&self) -> &[Patch] {
        &self.patches
    }

    pub fn into_patches(self) -> Vec<Patch> {
        self.patches
    }

    /// 总代价
    pub fn cost(&self) -> usize {
        self.cost
    }

    /// 两侧完全相等
    pub fn is_identity(&self) -> bool {
        self.patches.iter().all(Patch::is_copy)
    }

    /// 根节点不可比较，整体删除后重新插入
    pub fn is_rewrite(&self) -> bool {
        matches!(
            self.patches.as_slice(),
            [Patch::Delete(_), Patch::Insert(_)]
        )
    }

    /// 补丁统计信息
    pub fn summary(&self) -> DiffSummary {
        DiffSummary {
            cost: self.cost,
            ..DiffSummary::count(&self.patches)
        }
    }
}

impl fmt::Display for Diff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, patch) in self.patches.iter().enumerate() {
            if index > 0 {
                writeln!(f)?;
            }
            write!(f, "{patch}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
enum SequenceKind {
    Indexed,
    Fixed,
}

impl SequenceKind {
    fn wrap<T>(self, children: Vec<T>) -> Aligned<T> {
        match self {
            SequenceKind::Indexed => Aligned::Indexed(children),
            SequenceKind::Fixed => Aligned::Fixed(children),
        }
    }
}

/// 一对节点的比较方式：能直接给出补丁的，或需要逐个比较子节点的
enum Pairing<'t> {
    /// 补丁和被复制覆盖的节点数
    Settled(Vec<Patch>, usize),
    Sequence(SequenceKind, &'t [Term], &'t [Term]),
    Keyed(&'t [(String, Term)], &'t [(String, Term)]),
}

/// 等待子节点比较结果的帧
struct Frame<'t, T, R> {
    before: &'t Term,
    after: &'t Term,
    task: T,
    requests: Vec<(&'t Term, &'t Term)>,
    results: Vec<R>,
}

impl<'t, T, R> Frame<'t, T, R> {
    fn new(
        before: &'t Term,
        after: &'t Term,
        task: T,
        requests: Vec<(&'t Term, &'t Term)>,
    ) -> Self {
        Self {
            before,
            after,
            task,
            results: Vec::with_capacity(requests.len()),
            requests,
        }
    }
}

enum Step<'t, T, R> {
    Done(R),
    Pending(Frame<'t, T, R>),
}

/// 在显式帧栈上完成的一趟树遍历
trait Pass<'t> {
    type Task;
    type Output;

    fn open(&mut self, before: &'t Term, after: &'t Term) -> Step<'t, Self::Task, Self::Output>;

    fn close(&mut self, frame: Frame<'t, Self::Task, Self::Output>) -> Self::Output;
}

fn drive<'t, S: Pass<'t>>(pass: &mut S, before: &'t Term, after: &'t Term) -> S::Output {
    let mut stack = match pass.open(before, after) {
        Step::Done(output) => return output,
        Step::Pending(frame) => vec![frame],
    };
    let mut root = None;

    while let Some(mut frame) = stack.pop() {
        if let Some(&(a, b)) = frame.requests.get(frame.results.len()) {
            match pass.open(a, b) {
                Step::Done(output) => {
                    frame.results.push(output);
                    stack.push(frame);
                }
                Step::Pending(child) => {
                    stack.push(frame);
                    stack.push(child);
                }
            }
            continue;
        }

        let output = pass.close(frame);
        match stack.last_mut() {
            Some(parent) => parent.results.push(output),
            None => root = Some(output),
        }
    }

    match root {
        Some(output) => output,
        None => unreachable!("the root frame always completes"),
    }
}

enum MeasureTask<'t> {
    Sequence(SequenceKind, &'t [Term], &'t [Term]),
    Keyed(KeyedPlan<'t>),
}

/// 第一趟：只求代价摘要，不保留补丁
///
/// 每对需要展开子节点的节点都把摘要记入备忘表，第二趟据此重放对齐。
struct MeasurePass<'i, P> {
    interpreter: &'i Interpreter<P>,
    memo: HashMap<(usize, usize), Measure>,
}

impl<'t, P: DiffPolicy> Pass<'t> for MeasurePass<'_, P> {
    type Task = MeasureTask<'t>;
    type Output = Measure;

    fn open(&mut self, before: &'t Term, after: &'t Term) -> Step<'t, MeasureTask<'t>, Measure> {
        // 备忘表只记录需要展开子节点的配对
        if let Some(&measure) = self.memo.get(&(before.node_id(), after.node_id())) {
            return Step::Done(measure);
        }

        match self.interpreter.pairing(before, after) {
            Pairing::Settled(patches, copied) => {
                Step::Done(self.interpreter.measure(&patches, copied))
            }
            Pairing::Sequence(kind, xs, ys) => {
                let requests = xs
                    .iter()
                    .flat_map(|x| ys.iter().map(move |y| (x, y)))
                    .collect();
                Step::Pending(Frame::new(
                    before,
                    after,
                    MeasureTask::Sequence(kind, xs, ys),
                    requests,
                ))
            }
            Pairing::Keyed(xs, ys) => {
                let plan = KeyedPlan::new(xs, ys);
                let requests = plan.requests().to_vec();
                Step::Pending(Frame::new(before, after, MeasureTask::Keyed(plan), requests))
            }
        }
    }

    fn close(&mut self, frame: Frame<'t, MeasureTask<'t>, Measure>) -> Measure {
        let policy = &self.interpreter.policy;
        let (shell, children) = match &frame.task {
            MeasureTask::Sequence(kind, xs, ys) => (
                kind.wrap(Vec::new()),
                align_sequences(policy, xs, ys, &frame.results).measure,
            ),
            MeasureTask::Keyed(plan) => {
                (Aligned::Keyed(Vec::new()), plan.measure(policy, &frame.results))
            }
        };

        let own = policy.cost(&self.interpreter.replace(frame.before, frame.after, shell));
        let measure = Measure {
            cost: own + children.cost,
            copied: children.copied,
        };
        self.memo
            .insert((frame.before.node_id(), frame.after.node_id()), measure);
        measure
    }
}

enum BuildTask<'t> {
    Sequence {
        kind: SequenceKind,
        before: &'t [Term],
        after: &'t [Term],
        alignment: Alignment,
    },
    Keyed(KeyedPlan<'t>),
}

/// 第二趟：沿选定的对齐路径生成补丁，未被选中的配对不再展开
struct BuildPass<'i, P> {
    measures: MeasurePass<'i, P>,
}

impl<'t, P: DiffPolicy> Pass<'t> for BuildPass<'_, P> {
    type Task = BuildTask<'t>;
    type Output = Vec<Patch>;

    fn open(&mut self, before: &'t Term, after: &'t Term) -> Step<'t, BuildTask<'t>, Vec<Patch>> {
        match self.measures.interpreter.pairing(before, after) {
            Pairing::Settled(patches, _) => Step::Done(patches),
            Pairing::Sequence(kind, xs, ys) => {
                let mut pairs = Vec::with_capacity(xs.len() * ys.len());
                for x in xs {
                    for y in ys {
                        pairs.push(drive(&mut self.measures, x, y));
                    }
                }
                let alignment =
                    align_sequences(&self.measures.interpreter.policy, xs, ys, &pairs);
                let requests = alignment.pairs(xs, ys);
                Step::Pending(Frame::new(
                    before,
                    after,
                    BuildTask::Sequence {
                        kind,
                        before: xs,
                        after: ys,
                        alignment,
                    },
                    requests,
                ))
            }
            Pairing::Keyed(xs, ys) => {
                let plan = KeyedPlan::new(xs, ys);
                let requests = plan.requests().to_vec();
                Step::Pending(Frame::new(before, after, BuildTask::Keyed(plan), requests))
            }
        }
    }

    fn close(&mut self, frame: Frame<'t, BuildTask<'t>, Vec<Patch>>) -> Vec<Patch> {
        let Frame {
            before,
            after,
            task,
            results,
            ..
        } = frame;

        let body = match task {
            BuildTask::Sequence {
                kind,
                before: xs,
                after: ys,
                alignment,
            } => kind.wrap(alignment.assemble(xs, ys, results)),
            BuildTask::Keyed(plan) => Aligned::Keyed(plan.assemble(results)),
        };
        vec![self.measures.interpreter.replace(before, after, body)]
    }
}

/// 差异解释器
#[derive(Debug, Clone, Default)]
pub struct Interpreter<P = StructuralPolicy> {
    policy: P,
}

impl Interpreter<StructuralPolicy> {
    /// 使用默认结构策略创建解释器
    pub fn new() -> Self {
        Self {
            policy: StructuralPolicy,
        }
    }
}

impl<P: DiffPolicy> Interpreter<P> {
    /// 使用自定义策略创建解释器
    pub fn with_policy(policy: P) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &P {
        &self.policy
    }

    /// 计算从 `before` 到 `after` 的最小代价补丁
    ///
    /// 先求出所有候选配对的代价摘要，再只为最优路径生成补丁树。
    pub fn diff(&self, before: &Term, after: &Term) -> Diff {
        let mut measures = MeasurePass {
            interpreter: self,
            memo: HashMap::new(),
        };
        let total = drive(&mut measures, before, after);
        let measured = measures.memo.len();

        let patches = drive(&mut BuildPass { measures }, before, after);
        debug!(
            "Diff finished: cost {}, {} root patch(es), {} of {} nodes copied, {} node pairs measured",
            total.cost,
            patches.len(),
            total.copied,
            before.size(),
            measured
        );
        Diff {
            patches,
            cost: total.cost,
        }
    }

    /// 按当前策略计算一组补丁的总代价
    pub fn total_cost(&self, patches: &[Patch]) -> usize {
        patches
            .iter()
            .flat_map(Patch::iter)
            .map(|patch| self.policy.cost(patch))
            .sum()
    }

    /// 按相等、可比较、形状的顺序决定一对节点如何比较
    fn pairing<'t>(&self, before: &'t Term, after: &'t Term) -> Pairing<'t> {
        if self.policy.equal(before, after) {
            let copy = Patch::Copy {
                before: before.clone(),
                after: after.clone(),
            };
            return Pairing::Settled(vec![copy], before.size());
        }

        if !self.policy.comparable(before, after) {
            return self.rewrite(before, after);
        }

        match (before.syntax(), after.syntax()) {
            (Syntax::Leaf(a), Syntax::Leaf(b)) => {
                let body = Aligned::Leaf {
                    before: a.clone(),
                    after: b.clone(),
                };
                Pairing::Settled(vec![self.replace(before, after, body)], 0)
            }
            (Syntax::Indexed(xs), Syntax::Indexed(ys)) => {
                Pairing::Sequence(SequenceKind::Indexed, xs, ys)
            }
            (Syntax::Fixed(xs), Syntax::Fixed(ys)) => Pairing::Sequence(SequenceKind::Fixed, xs, ys),
            (Syntax::Keyed(xs), Syntax::Keyed(ys)) => Pairing::Keyed(xs, ys),
            // 产生式相同但形状不同，不尝试对齐
            _ => self.rewrite(before, after),
        }
    }

    /// 没有子补丁的补丁序列的代价摘要
    fn measure(&self, patches: &[Patch], copied: usize) -> Measure {
        Measure {
            cost: patches.iter().map(|patch| self.policy.cost(patch)).sum(),
            copied,
        }
    }

    fn rewrite<'t>(&self, before: &Term, after: &Term) -> Pairing<'t> {
        Pairing::Settled(
            vec![Patch::Delete(before.clone()), Patch::Insert(after.clone())],
            0,
        )
    }

    fn replace(&self, before: &Term, after: &Term, body: Aligned<Patch>) -> Patch {
        Patch::Replace(Box::new(Replacement::new(
            before.info().clone(),
            after.info().clone(),
            body,
        )))
    }
}
