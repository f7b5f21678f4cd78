//! A compiled set of parsers, selected per-document by `url_regexp` and run
//! together to build one document's full `ParsedDocument`.

use crate::compiler::CompiledParser;
use crate::dom::XotDomContext;
use crate::document::ContentType;
use crate::error::{ErrorPolicy, ErrorReporter, RuntimeError};
use crate::parser::Parser;
use crate::relation::ParsedDocument;

pub struct ParserBank {
    parsers: Vec<CompiledParser>,
}

impl ParserBank {
    pub fn new(parsers: Vec<CompiledParser>) -> Self {
        ParserBank { parsers }
    }

    pub fn len(&self) -> usize {
        self.parsers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parsers.is_empty()
    }

    /// The parsers whose `url_regexp` (if any) matches `document_url`, in
    /// the order they were compiled.
    pub fn applicable<'a>(&'a self, document_url: &'a str) -> impl Iterator<Item = &'a CompiledParser> {
        self.parsers.iter().filter(move |p| Parser::new(p).applies_to(document_url))
    }

    /// Parses the document's body with every applicable parser, collecting
    /// their outputs into one `ParsedDocument`. A content type other than
    /// HTML or XML is refused outright: the URL is still recorded but no DOM
    /// is built and `outputs` stays empty (§4.6). Under `ErrorPolicy::AbortProcess`
    /// the first fatal error stops the whole document, matching a parser
    /// template's own per-relation abort behavior (see `parser::Parser::parse`).
    pub fn parse_document(
        &self,
        url: &str,
        content: &str,
        content_type: ContentType,
        policy: ErrorPolicy,
    ) -> Result<ParsedDocument, RuntimeError> {
        if !matches!(content_type, ContentType::Html | ContentType::Xml) {
            return Ok(ParsedDocument { url: url.to_string(), outputs: Vec::new() });
        }

        let reporter = ErrorReporter::new(policy);
        let mut dom = XotDomContext::parse(content, content_type)?;

        let mut outputs = Vec::new();
        for compiled in self.applicable(url) {
            let parser = Parser::new(compiled);
            let output = parser.parse(&mut dom, url, &reporter)?;
            // A parser that produced nothing contributes no `ParserOutput`.
            if !output.relations.is_empty() {
                outputs.push(output);
            }
        }
        Ok(ParsedDocument { url: url.to_string(), outputs })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::compile_bank;
    use crate::model::ParserDefFile;

    fn bank_from(toml_src: &str) -> ParserBank {
        let file: ParserDefFile = toml::from_str(toml_src).unwrap();
        ParserBank::new(compile_bank(&file).unwrap())
    }

    #[test]
    fn unknown_content_type_leaves_outputs_empty() {
        let bank = bank_from(
            r#"
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
            "#,
        );
        let doc = bank
            .parse_document("http://x/", "<html><title>Hi</title></html>", ContentType::Unknown, ErrorPolicy::Ignore)
            .unwrap();
        assert_eq!(doc.url, "http://x/");
        assert!(doc.outputs.is_empty());
    }

    #[test]
    fn parser_producing_no_relations_is_dropped_from_outputs() {
        let bank = bank_from(
            r#"
            [[parser]]
            parser_name = "empty"
            [[parser.query_defs]]
            name = "missing"
            query = "//nonexistent"
            [[parser.relation_tmpls]]
            subject = "%url%"
            object = "%missing%"
            predicate = "hasThing"
            subject_cardinality = "one"
            object_cardinality = "one"
            "#,
        );
        let doc = bank
            .parse_document("http://x/", "<html><body></body></html>", ContentType::Html, ErrorPolicy::Ignore)
            .unwrap();
        assert!(doc.outputs.is_empty());
    }
}
