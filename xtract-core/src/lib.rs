//! Declarative structured-data extraction engine: compiles `.xtd` parser
//! definitions into an execution plan, then runs that plan's XPath queries
//! against HTML or XML documents to produce subject/predicate/object
//! relations.

pub mod bank;
pub mod cardinality;
pub mod compiler;
pub mod document;
pub mod dom;
pub mod error;
pub mod loader;
pub mod model;
pub mod parser;
pub mod postprocess;
pub mod query_runner;
pub mod relation;
pub mod url;

pub use bank::ParserBank;
pub use compiler::{compile_bank, compile_parser, CompiledParser};
pub use document::{ContentType, Document};
pub use error::{CompileError, ErrorPolicy, RuntimeError};
pub use loader::{load_parser_defs, LoaderError};
pub use model::{ParserDef, ParserDefFile};
pub use parser::Parser;
pub use relation::{Annotation, ParsedDocument, ParserOutput, Relation};
