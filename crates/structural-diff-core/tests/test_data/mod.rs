//! 测试数据集模块
//!
//! 提供三种语言的修改前后源码对

#![allow(dead_code)]

use structural_diff_core::{FilePair, SourceFile, SupportedLanguage, Term};
use tempfile::TempDir;

/// 一组修改前后的源码
pub struct DiffCase {
    pub name: &'static str,
    pub language: SupportedLanguage,
    pub before: &'static str,
    pub after: &'static str,
}

impl DiffCase {
    /// 解析两侧源码，返回注解树
    pub fn terms(&self) -> (Term, Term) {
        (self.term(self.before), self.term(self.after))
    }

    fn term(&self, source: &str) -> Term {
        SourceFile::from_source(self.name, self.language, source.to_string())
            .unwrap_or_else(|e| panic!("{}: failed to parse: {e}", self.name))
            .term
    }

    pub fn extension(&self) -> &'static str {
        match self.language {
            SupportedLanguage::JavaScript => "js",
            SupportedLanguage::C => "c",
            SupportedLanguage::Go => "go",
        }
    }
}

/// 覆盖各种形状和修改方式的源码对
pub fn cases() -> Vec<DiffCase> {
    vec![
        DiffCase {
            name: "js_object_keys",
            language: SupportedLanguage::JavaScript,
            before: "const config = {a: 1, b: 2};\n",
            after: "const config = {b: 2, c: 3};\n",
        },
        DiffCase {
            name: "js_array_append",
            language: SupportedLanguage::JavaScript,
            before: "[1, 2];\n",
            after: "[1, 2, 3];\n",
        },
        DiffCase {
            name: "js_rename_callee",
            language: SupportedLanguage::JavaScript,
            before: "foo(x, y);\n",
            after: "bar(x, y);\n",
        },
        DiffCase {
            name: "js_function_body",
            language: SupportedLanguage::JavaScript,
            before: r#"
function total(items) {
    let sum = 0;
    for (const item of items) {
        sum += item.price;
    }
    return sum;
}
"#,
            after: r#"
function total(items, tax) {
    let sum = 0;
    for (const item of items) {
        sum += item.price * item.quantity;
    }
    return sum * (1 + tax);
}
"#,
        },
        DiffCase {
            name: "js_statement_reorder",
            language: SupportedLanguage::JavaScript,
            before: "a();\nb();\nc();\n",
            after: "c();\na();\nb();\n",
        },
        DiffCase {
            name: "c_literal_change",
            language: SupportedLanguage::C,
            before: "int limit = 10;\n",
            after: "int limit = 20;\n",
        },
        DiffCase {
            name: "c_designated_initializer",
            language: SupportedLanguage::C,
            before: "struct point p = { .x = 1, .y = 2 };\n",
            after: "struct point p = { .x = 1, .y = 3, .z = 4 };\n",
        },
        DiffCase {
            name: "c_function",
            language: SupportedLanguage::C,
            before: r#"
int clamp(int value, int low, int high) {
    if (value < low) return low;
    return value;
}
"#,
            after: r#"
int clamp(int value, int low, int high) {
    if (value < low) return low;
    if (value > high) return high;
    return value;
}
"#,
        },
        DiffCase {
            name: "go_composite_literal",
            language: SupportedLanguage::Go,
            before: "package main\n\nvar p = Point{X: 1, Y: 2}\n",
            after: "package main\n\nvar p = Point{X: 5, Y: 2}\n",
        },
        DiffCase {
            name: "go_new_function",
            language: SupportedLanguage::Go,
            before: r#"package main

import "fmt"

func main() {
    fmt.Println("hello")
}
"#,
            after: r#"package main

import "fmt"

func greet(name string) string {
    return "hello " + name
}

func main() {
    fmt.Println(greet("world"))
}
"#,
        },
    ]
}

/// 按名称查找用例
pub fn case(name: &str) -> DiffCase {
    cases()
        .into_iter()
        .find(|case| case.name == name)
        .unwrap_or_else(|| panic!("unknown case {name}"))
}

/// 把所有用例写入临时目录，返回目录和文件对
pub fn write_cases(cases: &[DiffCase]) -> std::io::Result<(TempDir, Vec<FilePair>)> {
    let temp_dir = TempDir::new()?;
    let mut pairs = Vec::new();

    for case in cases {
        let before = temp_dir
            .path()
            .join(format!("{}_before.{}", case.name, case.extension()));
        let after = temp_dir
            .path()
            .join(format!("{}_after.{}", case.name, case.extension()));
        std::fs::write(&before, case.before)?;
        std::fs::write(&after, case.after)?;
        pairs.push(FilePair::new(before, after));
    }

    Ok((temp_dir, pairs))
}
