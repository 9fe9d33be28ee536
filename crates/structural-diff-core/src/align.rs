//! 子节点对齐
//!
//! 有序序列使用编辑距离式的动态规划，配对代价就是递归差异的代价；
//! 键值映射先按键配对，剩余的键分别记为删除或插入。
//! 对齐只依据每对子节点的代价摘要，选定路径后才生成补丁。

use crate::interpreter::DiffPolicy;
use crate::patch::Patch;
use crate::term::Term;
use std::collections::{HashMap, HashSet};

/// 一次配对比较的代价摘要
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Measure {
    /// 总代价
    pub(crate) cost: usize,
    /// 被复制覆盖的节点数，代价相同时取较大者
    pub(crate) copied: usize,
}

impl Measure {
    pub(crate) fn add(self, other: Measure) -> Measure {
        Measure {
            cost: self.cost + other.cost,
            copied: self.copied + other.copied,
        }
    }
}

/// 编辑路径上的一步，下标指向两侧子节点序列
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Edit {
    Pair(usize, usize),
    Delete(usize),
    Insert(usize),
}

/// 序列对齐结果：最优编辑路径及其汇总
#[derive(Debug)]
pub(crate) struct Alignment {
    pub(crate) edits: Vec<Edit>,
    pub(crate) measure: Measure,
}

impl Alignment {
    /// 路径上需要递归展开的配对
    pub(crate) fn pairs<'t>(
        &self,
        before: &'t [Term],
        after: &'t [Term],
    ) -> Vec<(&'t Term, &'t Term)> {
        self.edits
            .iter()
            .filter_map(|edit| match *edit {
                Edit::Pair(i, j) => Some((&before[i], &after[j])),
                _ => None,
            })
            .collect()
    }

    /// 按路径拼出子补丁，`paired` 与 [`Alignment::pairs`] 一一对应
    pub(crate) fn assemble(
        &self,
        before: &[Term],
        after: &[Term],
        paired: Vec<Vec<Patch>>,
    ) -> Vec<Patch> {
        let mut paired = paired.into_iter();
        let mut children = Vec::with_capacity(self.edits.len());
        for edit in &self.edits {
            match *edit {
                Edit::Pair(..) => children.extend(paired.next().unwrap_or_default()),
                Edit::Delete(i) => children.push(Patch::Delete(before[i].clone())),
                Edit::Insert(j) => children.push(Patch::Insert(after[j].clone())),
            }
        }
        children
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Move {
    Start,
    Pair,
    Delete,
    Insert,
}

#[derive(Debug, Clone, Copy)]
struct Cell {
    measure: Measure,
    step: Move,
}

impl Cell {
    const START: Cell = Cell {
        measure: Measure { cost: 0, copied: 0 },
        step: Move::Start,
    };

    /// 代价更低者优先，其次是复制覆盖更多者；完全相同时保留先考虑的候选
    fn improves_on(&self, current: &Cell) -> bool {
        let (a, b) = (self.measure, current.measure);
        a.cost < b.cost || (a.cost == b.cost && a.copied > b.copied)
    }
}

/// 对两个有序子节点序列求最小代价对齐
///
/// `pairs[i * after.len() + j]` 是 `before[i]` 与 `after[j]` 递归差异的代价摘要。
/// 候选顺序为配对、删除、插入，平局时靠前者胜出。
pub(crate) fn align_sequences<P: DiffPolicy>(
    policy: &P,
    before: &[Term],
    after: &[Term],
    pairs: &[Measure],
) -> Alignment {
    let (n, m) = (before.len(), after.len());
    debug_assert_eq!(pairs.len(), n * m);

    let delete_costs: Vec<usize> = before
        .iter()
        .map(|term| policy.cost(&Patch::Delete(term.clone())))
        .collect();
    let insert_costs: Vec<usize> = after
        .iter()
        .map(|term| policy.cost(&Patch::Insert(term.clone())))
        .collect();

    let width = m + 1;
    let mut table = vec![Cell::START; (n + 1) * width];

    for i in 0..=n {
        for j in 0..=m {
            if i == 0 && j == 0 {
                continue;
            }

            let mut best: Option<Cell> = None;
            let mut consider = |candidate: Cell| {
                if best.is_none_or(|current| candidate.improves_on(&current)) {
                    best = Some(candidate);
                }
            };

            if i > 0 && j > 0 {
                let prev = table[(i - 1) * width + (j - 1)];
                consider(Cell {
                    measure: prev.measure.add(pairs[(i - 1) * m + (j - 1)]),
                    step: Move::Pair,
                });
            }
            if i > 0 {
                let prev = table[(i - 1) * width + j];
                consider(Cell {
                    measure: prev.measure.add(Measure {
                        cost: delete_costs[i - 1],
                        copied: 0,
                    }),
                    step: Move::Delete,
                });
            }
            if j > 0 {
                let prev = table[i * width + (j - 1)];
                consider(Cell {
                    measure: prev.measure.add(Measure {
                        cost: insert_costs[j - 1],
                        copied: 0,
                    }),
                    step: Move::Insert,
                });
            }

            if let Some(cell) = best {
                table[i * width + j] = cell;
            }
        }
    }

    // 从右下角回溯出编辑路径
    let mut edits = Vec::with_capacity(n + m);
    let (mut i, mut j) = (n, m);
    while i > 0 || j > 0 {
        match table[i * width + j].step {
            Move::Pair => {
                i -= 1;
                j -= 1;
                edits.push(Edit::Pair(i, j));
            }
            Move::Delete => {
                i -= 1;
                edits.push(Edit::Delete(i));
            }
            Move::Insert => {
                j -= 1;
                edits.push(Edit::Insert(j));
            }
            Move::Start => break,
        }
    }
    edits.reverse();

    Alignment {
        edits,
        measure: table[n * width + m].measure,
    }
}

enum KeyedStep<'t> {
    Common(&'t str),
    Deleted(&'t str, &'t Term),
    Inserted(&'t str, &'t Term),
}

/// 键值映射的对齐计划
///
/// 输出顺序为修改前的键顺序，之后追加仅存在于修改后的键。
pub(crate) struct KeyedPlan<'t> {
    steps: Vec<KeyedStep<'t>>,
    requests: Vec<(&'t Term, &'t Term)>,
}

impl<'t> KeyedPlan<'t> {
    pub(crate) fn new(before: &'t [(String, Term)], after: &'t [(String, Term)]) -> Self {
        let after_by_key: HashMap<&str, &Term> =
            after.iter().map(|(key, term)| (key.as_str(), term)).collect();
        let before_keys: HashSet<&str> = before.iter().map(|(key, _)| key.as_str()).collect();

        let mut steps = Vec::with_capacity(before.len() + after.len());
        let mut requests = Vec::new();

        for (key, term) in before {
            match after_by_key.get(key.as_str()) {
                Some(&other) => {
                    steps.push(KeyedStep::Common(key));
                    requests.push((term, other));
                }
                None => steps.push(KeyedStep::Deleted(key, term)),
            }
        }
        for (key, term) in after {
            if !before_keys.contains(key.as_str()) {
                steps.push(KeyedStep::Inserted(key, term));
            }
        }

        Self { steps, requests }
    }

    /// 需要递归比较的同键子节点，顺序与结果一一对应
    pub(crate) fn requests(&self) -> &[(&'t Term, &'t Term)] {
        &self.requests
    }

    /// 同键子节点的代价摘要加上删除和插入的键
    pub(crate) fn measure<P: DiffPolicy>(&self, policy: &P, results: &[Measure]) -> Measure {
        let unmatched: usize = self
            .steps
            .iter()
            .map(|step| match step {
                KeyedStep::Common(_) => 0,
                KeyedStep::Deleted(_, term) => policy.cost(&Patch::Delete((*term).clone())),
                KeyedStep::Inserted(_, term) => policy.cost(&Patch::Insert((*term).clone())),
            })
            .sum();

        results.iter().fold(
            Measure {
                cost: unmatched,
                copied: 0,
            },
            |total, result| total.add(*result),
        )
    }

    /// 用同键子节点的补丁组装对齐
    pub(crate) fn assemble(self, results: Vec<Vec<Patch>>) -> Vec<(String, Patch)> {
        let mut results = results.into_iter();
        let mut children = Vec::with_capacity(self.steps.len());

        for step in self.steps {
            match step {
                KeyedStep::Common(key) => children.extend(
                    results
                        .next()
                        .unwrap_or_default()
                        .into_iter()
                        .map(|patch| (key.to_string(), patch)),
                ),
                KeyedStep::Deleted(key, term) => {
                    children.push((key.to_string(), Patch::Delete(term.clone())));
                }
                KeyedStep::Inserted(key, term) => {
                    children.push((key.to_string(), Patch::Insert(term.clone())));
                }
            }
        }
        children
    }
}
