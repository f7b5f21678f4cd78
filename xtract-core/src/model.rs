//! Declarative input schema: parser definitions as read from `.xtd` files.
//!
//! These types mirror §3 of the specification field-for-field. They are the
//! Rust-idiomatic stand-in for the original proto-text definition schema:
//! plain `serde::Deserialize` structs loaded from TOML (see `loader.rs`)
//! rather than a protobuf message, since nothing in this workspace's
//! dependency stack pulls in a protobuf toolchain.

use serde::Deserialize;

/// Declared expected multiplicity of a reference's result list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cardinality {
    One,
    Many,
}

/// A single post-processing step applied, in order, to a raw query result.
///
/// `Substr` and `Convert` are reserved for future op kinds; any parser
/// definition that uses them is rejected by `DefinitionCompiler` at compile
/// time (see `compiler::reject_reserved_ops`), never reached at runtime.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PostProcessingOp {
    Replace {
        regexp: String,
        rewrite: String,
        #[serde(default)]
        global: bool,
    },
    Extract {
        regexp: String,
    },
    Substr,
    Convert,
}

/// A single named XPath query with its post-processing pipeline.
#[derive(Debug, Clone, Deserialize)]
pub struct QueryDef {
    pub name: String,
    pub query: String,
    #[serde(default)]
    pub post_processing_ops: Vec<PostProcessingOp>,
}

/// A root XPath plus a non-empty set of subqueries whose results are
/// aligned to the root's node set via DOM ancestry (see `query_runner`).
#[derive(Debug, Clone, Deserialize)]
pub struct QueryGroupDef {
    pub name: String,
    pub root_query: String,
    pub query_defs: Vec<QueryDef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnnotationTemplate {
    pub name: String,
    pub value: String,
    pub value_cardinality: Cardinality,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RelationTemplate {
    #[serde(default)]
    pub url_regexp: Option<String>,
    pub subject: String,
    pub object: String,
    pub subject_cardinality: Cardinality,
    pub object_cardinality: Cardinality,
    pub predicate: String,
    #[serde(default)]
    pub userdata: Option<String>,
    #[serde(default)]
    pub annotation_tmpls: Vec<AnnotationTemplate>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ParserDef {
    pub parser_name: String,
    #[serde(default)]
    pub url_regexp: Option<String>,
    #[serde(default)]
    pub query_defs: Vec<QueryDef>,
    #[serde(default)]
    pub query_group_defs: Vec<QueryGroupDef>,
    #[serde(default)]
    pub relation_tmpls: Vec<RelationTemplate>,
}

/// Top-level shape of a single `.xtd` file: a list of parser definitions.
/// Multiple files matched by a glob are merged by concatenating this list
/// (see `loader::load_parser_defs`), mirroring the original's
/// `ReadXpafParserDefs` file-concatenation semantics.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ParserDefFile {
    #[serde(default)]
    pub parser: Vec<ParserDef>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_parser_def() {
        let toml = r#"
            [[parser]]
            parser_name = "p"

            [[parser.query_defs]]
            name = "t"
            query = "//title"

            [[parser.relation_tmpls]]
            subject = "%url%"
            object = "%t%"
            predicate = "hasTitle"
            subject_cardinality = "one"
            object_cardinality = "one"
        "#;
        let file: ParserDefFile = toml::from_str(toml).unwrap();
        assert_eq!(file.parser.len(), 1);
        assert_eq!(file.parser[0].parser_name, "p");
        assert_eq!(file.parser[0].query_defs[0].query, "//title");
    }

    #[test]
    fn rejects_unknown_op_kind() {
        let toml = r#"
            [[parser]]
            parser_name = "p"
            [[parser.query_defs]]
            name = "t"
            query = "//a"
            [[parser.query_defs.post_processing_ops]]
            kind = "frobnicate"
        "#;
        assert!(toml::from_str::<ParserDefFile>(toml).is_err());
    }
}
