//! Output data model: the relations and annotations a parser produces from
//! one document, rendered to JSON by the CLI's `--output json` mode.

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Annotation {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Relation {
    pub subject: String,
    pub object: String,
    pub predicate: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub userdata: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub annotations: Vec<Annotation>,
}

/// The relations one compiled parser produced from one document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ParserOutput {
    pub parser_name: String,
    pub relations: Vec<Relation>,
}

/// Every parser's output for one document, keyed by the document's own URL.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ParsedDocument {
    pub url: String,
    pub outputs: Vec<ParserOutput>,
}
