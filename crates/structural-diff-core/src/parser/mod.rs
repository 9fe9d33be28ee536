//! 多语言解析器模块
//!
//! 提供通用的语言解析器接口和具体的语言实现

pub mod c;
pub mod common;
pub mod go;
pub mod javascript;

// 重新导出核心类型
pub use c::{C_SHAPES, CParser};
pub use common::{LanguageParser, ParserFactory, SourceFile, SupportedLanguage};
pub use go::{GO_SHAPES, GoParser};
pub use javascript::{JAVASCRIPT_SHAPES, JavaScriptParser};
