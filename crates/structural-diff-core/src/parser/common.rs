//! 通用解析器接口和数据结构
//!
//! 定义多语言解析器的通用接口，以及从源码文件到注解树的入口

use crate::error::{Result, StructuralDiffError};
use crate::syntax::ShapeTable;
use crate::term::{Term, TermBuilder};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use tree_sitter::Tree;

/// 支持的编程语言枚举
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SupportedLanguage {
    JavaScript,
    C,
    Go,
}

impl SupportedLanguage {
    /// 全部支持的语言
    pub const ALL: [SupportedLanguage; 3] = [
        SupportedLanguage::JavaScript,
        SupportedLanguage::C,
        SupportedLanguage::Go,
    ];

    /// 根据文件扩展名识别语言
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension {
            "js" | "mjs" | "cjs" => Some(SupportedLanguage::JavaScript),
            "c" | "h" => Some(SupportedLanguage::C),
            "go" => Some(SupportedLanguage::Go),
            _ => None,
        }
    }

    /// 语言名称
    pub fn name(self) -> &'static str {
        match self {
            SupportedLanguage::JavaScript => "JavaScript",
            SupportedLanguage::C => "C",
            SupportedLanguage::Go => "Go",
        }
    }
}

/// 通用语言解析器接口
pub trait LanguageParser: Send + Sync {
    /// 解析源码为语法树
    fn parse_source(&mut self, source: &str) -> Result<Tree>;

    /// 该语言的产生式形状表
    fn shape_table(&self) -> &'static ShapeTable;

    /// 获取语言名称
    fn language_name(&self) -> &'static str;

    /// 获取支持的文件扩展名
    fn file_extensions(&self) -> &'static [&'static str];

    /// 解析源码并构建注解树
    fn parse_term(&mut self, source: &str) -> Result<Term> {
        let tree = self.parse_source(source)?;
        let root = tree.root_node();
        if root.has_error() {
            // 容错解析仍会产生完整的树，错误节点按普通产生式参与比较
            warn!(
                "{} source contains syntax errors, diffing the recovered tree",
                self.language_name()
            );
        }
        TermBuilder::new(source, self.shape_table()).build(root)
    }
}

/// 解析器工厂
pub struct ParserFactory;

impl ParserFactory {
    /// 根据语言类型创建解析器
    pub fn create_parser(language: SupportedLanguage) -> Result<Box<dyn LanguageParser>> {
        match language {
            SupportedLanguage::JavaScript => {
                Ok(Box::new(super::javascript::JavaScriptParser::new()?))
            }
            SupportedLanguage::C => Ok(Box::new(super::c::CParser::new()?)),
            SupportedLanguage::Go => Ok(Box::new(super::go::GoParser::new()?)),
        }
    }

    /// 根据文件路径检测语言类型
    pub fn detect_language(file_path: &Path) -> Option<SupportedLanguage> {
        SupportedLanguage::from_extension(file_path.extension()?.to_str()?)
    }

    /// 根据文件路径创建对应的解析器
    pub fn create_parser_for_file(file_path: &Path) -> Result<Box<dyn LanguageParser>> {
        let language = Self::detect_language(file_path).ok_or_else(|| {
            StructuralDiffError::UnsupportedFileType(file_path.to_string_lossy().to_string())
        })?;
        Self::create_parser(language)
    }
}

/// 已解析的源码文件
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub path: PathBuf,
    pub source_code: String,
    pub language: SupportedLanguage,
    /// 整个文件的注解树
    pub term: Term,
}

impl SourceFile {
    /// 读取并解析文件
    pub fn parse(path: &Path) -> Result<Self> {
        let language = ParserFactory::detect_language(path).ok_or_else(|| {
            StructuralDiffError::UnsupportedFileType(path.to_string_lossy().to_string())
        })?;
        let source_code = std::fs::read_to_string(path).map_err(|e| {
            StructuralDiffError::IoError(std::io::Error::new(
                e.kind(),
                format!("Failed to read file {}: {}", path.display(), e),
            ))
        })?;
        Self::from_source(path, language, source_code)
    }

    /// 解析内存中的源码
    pub fn from_source(
        path: impl Into<PathBuf>,
        language: SupportedLanguage,
        source_code: String,
    ) -> Result<Self> {
        let path = path.into();
        let mut parser = ParserFactory::create_parser(language)?;
        let term = parser.parse_term(&source_code)?;
        debug!(
            "Parsed {} as {}: {} nodes",
            path.display(),
            language.name(),
            term.size()
        );

        Ok(Self {
            path,
            source_code,
            language,
            term,
        })
    }

    /// 节点范围对应的源码片段
    pub fn snippet(&self, range: std::ops::Range<usize>) -> Option<&str> {
        self.source_code.get(range)
    }
}
