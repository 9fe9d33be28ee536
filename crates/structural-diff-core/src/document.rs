//! 差异结果文档
//!
//! 把补丁树折叠成可序列化的 JSON 结构，供外部查看器读取。
//! 文档顶层携带两侧源码全文，查看器按节点的字节范围截取片段；
//! 键值形状序列化为以键为名的 JSON 对象。

use crate::error::Result;
use crate::interpreter::Diff;
use crate::patch::{Aligned, DiffSummary, Patch, PatchFold, Replacement};
use crate::syntax::Syntax;
use crate::term::{Info, Term};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::collections::BTreeSet;
use std::ops::Range;

/// 一次比较的完整结果文档
#[derive(Debug, Serialize)]
pub struct DiffDocument {
    /// 修改前的源码
    pub before: String,
    /// 修改后的源码
    pub after: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub before_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub after_path: Option<String>,
    pub summary: DiffSummary,
    pub diff: Vec<PatchJson>,
}

impl DiffDocument {
    /// 由两侧源码和差异结果构建文档
    pub fn new(before: impl Into<String>, after: impl Into<String>, diff: &Diff) -> Self {
        let mut folder = JsonFold;
        Self {
            before: before.into(),
            after: after.into(),
            before_path: None,
            after_path: None,
            summary: diff.summary(),
            diff: diff
                .patches()
                .iter()
                .map(|patch| patch.fold(&mut folder))
                .collect(),
        }
    }

    /// 附加两侧的文件路径
    pub fn with_paths(mut self, before: impl Into<String>, after: impl Into<String>) -> Self {
        self.before_path = Some(before.into());
        self.after_path = Some(after.into());
        self
    }

    /// 序列化为 JSON 文本
    pub fn to_json(&self, pretty: bool) -> Result<String> {
        let json = if pretty {
            serde_json::to_string_pretty(self)?
        } else {
            serde_json::to_string(self)?
        };
        Ok(json)
    }
}

/// 补丁节点的 JSON 形式
#[derive(Debug, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchJson {
    Copy {
        before: [usize; 2],
        after: [usize; 2],
        term: TermJson,
    },
    Insert(TermJson),
    Delete(TermJson),
    Replace(ReplaceJson),
}

/// 替换节点：两侧范围、合并后的产生式标签和按形状对齐的子节点
#[derive(Debug)]
pub struct ReplaceJson {
    pub before: [usize; 2],
    pub after: [usize; 2],
    pub categories: BTreeSet<String>,
    pub body: Aligned<PatchJson>,
}

impl Serialize for ReplaceJson {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(4))?;
        map.serialize_entry("before", &self.before)?;
        map.serialize_entry("after", &self.after)?;
        map.serialize_entry("categories", &self.categories)?;

        match &self.body {
            Aligned::Leaf { before, after } => {
                map.serialize_entry("leaf", &LeafJson { before, after })?
            }
            Aligned::Indexed(children) => map.serialize_entry("indexed", children)?,
            Aligned::Fixed(children) => map.serialize_entry("fixed", children)?,
            Aligned::Keyed(entries) => map.serialize_entry("keyed", &KeyedPatches(entries))?,
        }
        map.end()
    }
}

#[derive(Serialize)]
struct LeafJson<'a> {
    before: &'a str,
    after: &'a str,
}

/// 键值替换的子节点，按键归组
///
/// 不可比较的同键条目会产生删除和插入两个补丁，因此每个键对应一个补丁列表
struct KeyedPatches<'a>(&'a [(String, PatchJson)]);

impl Serialize for KeyedPatches<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut groups: Vec<(&str, Vec<&PatchJson>)> = Vec::with_capacity(self.0.len());
        for (key, patch) in self.0 {
            match groups.iter_mut().find(|(existing, _)| *existing == key.as_str()) {
                Some((_, patches)) => patches.push(patch),
                None => groups.push((key, vec![patch])),
            }
        }
        serializer.collect_map(groups)
    }
}

/// 子树的 JSON 形式，序列化时按需遍历，不复制子树
#[derive(Debug, Clone)]
pub struct TermJson(Term);

impl TermJson {
    pub fn term(&self) -> &Term {
        &self.0
    }
}

impl Serialize for TermJson {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        TermRef(&self.0).serialize(serializer)
    }
}

struct TermRef<'t>(&'t Term);

impl Serialize for TermRef<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let info = self.0.info();
        let mut map = serializer.serialize_map(Some(3))?;
        map.serialize_entry("range", &span(info.range()))?;
        map.serialize_entry("categories", info.categories())?;

        match self.0.syntax() {
            Syntax::Leaf(text) => map.serialize_entry("leaf", text)?,
            Syntax::Indexed(children) => map.serialize_entry("indexed", &TermSeq(children))?,
            Syntax::Fixed(children) => map.serialize_entry("fixed", &TermSeq(children))?,
            Syntax::Keyed(entries) => map.serialize_entry("keyed", &TermEntries(entries))?,
        }
        map.end()
    }
}

struct TermSeq<'t>(&'t [Term]);

impl Serialize for TermSeq<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_seq(self.0.iter().map(TermRef))
    }
}

struct TermEntries<'t>(&'t [(String, Term)]);

impl Serialize for TermEntries<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_map(self.0.iter().map(|(key, term)| (key, TermRef(term))))
    }
}

fn span(range: Range<usize>) -> [usize; 2] {
    [range.start, range.end]
}

fn merged_categories(before: &Info, after: &Info) -> BTreeSet<String> {
    before
        .categories()
        .union(after.categories())
        .cloned()
        .collect()
}

struct JsonFold;

impl PatchFold for JsonFold {
    type Output = PatchJson;

    fn copy(&mut self, before: &Term, after: &Term) -> PatchJson {
        PatchJson::Copy {
            before: span(before.info().range()),
            after: span(after.info().range()),
            term: TermJson(after.clone()),
        }
    }

    fn insert(&mut self, term: &Term) -> PatchJson {
        PatchJson::Insert(TermJson(term.clone()))
    }

    fn delete(&mut self, term: &Term) -> PatchJson {
        PatchJson::Delete(TermJson(term.clone()))
    }

    fn replace(&mut self, replacement: &Replacement, children: Aligned<PatchJson>) -> PatchJson {
        PatchJson::Replace(ReplaceJson {
            before: span(replacement.before().range()),
            after: span(replacement.after().range()),
            categories: merged_categories(replacement.before(), replacement.after()),
            body: children,
        })
    }
}

/// 单个补丁的 JSON 形式
pub fn patch_to_json(patch: &Patch) -> PatchJson {
    patch.fold(&mut JsonFold)
}
