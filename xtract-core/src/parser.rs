//! Runs one compiled parser against one document, materializing its
//! relation templates into concrete `Relation`s.
//!
//! The `QueryResultsCache` is the dense, `QueryId`-indexed memoization layer
//! called out in SPEC_FULL.md §9: every reference into a query or query
//! group is resolved to a `QueryId` at compile time, so a relation template
//! that reuses the same query (e.g. as both `subject` and inside an
//! annotation) evaluates it against the DOM exactly once per document.

use crate::cardinality::RunningCount;
use crate::compiler::{CompiledParser, CompiledRelationTemplate, QueryId, QueryInfoEntry};
use crate::dom::DomContext;
use crate::error::{ErrorReporter, RuntimeError};
use crate::model::Cardinality;
use crate::query_runner::{QueryResults, QueryRunner};
use crate::relation::{Annotation, ParserOutput, Relation};

/// Dense per-document memoization of `get_query_results`, one slot per
/// `QueryId` in the owning parser's `QueryInfoTable`.
struct QueryResultsCache {
    slots: Vec<Option<QueryResults>>,
}

impl QueryResultsCache {
    fn new(len: usize) -> Self {
        QueryResultsCache { slots: vec![None; len] }
    }
}

pub struct Parser<'p> {
    compiled: &'p CompiledParser,
}

impl<'p> Parser<'p> {
    pub fn new(compiled: &'p CompiledParser) -> Self {
        Parser { compiled }
    }

    pub fn name(&self) -> &str {
        &self.compiled.name
    }

    /// Whether this parser's own `url_regexp` (if any) matches the
    /// document's URL. Parsers with no `url_regexp` match every document.
    pub fn applies_to(&self, document_url: &str) -> bool {
        match &self.compiled.url_regexp {
            Some(re) => re.is_match(document_url),
            None => true,
        }
    }

    /// Parses one document, producing every relation this parser's
    /// templates resolve to.
    pub fn parse<D: DomContext>(
        &self,
        dom: &mut D,
        document_url: &str,
        reporter: &ErrorReporter,
    ) -> Result<ParserOutput, RuntimeError> {
        let mut cache = QueryResultsCache::new(self.compiled.query_info.len());
        let mut runner = QueryRunner::new(dom, document_url, reporter);

        let mut relations = Vec::new();
        for rel in &self.compiled.relations {
            relations.extend(self.materialize_relation(
                rel,
                document_url,
                &mut cache,
                &mut runner,
                reporter,
            )?);
        }

        Ok(ParserOutput { parser_name: self.compiled.name.clone(), relations })
    }

    fn materialize_relation<D: DomContext>(
        &self,
        rel: &CompiledRelationTemplate,
        document_url: &str,
        cache: &mut QueryResultsCache,
        runner: &mut QueryRunner<D>,
        reporter: &ErrorReporter,
    ) -> Result<Vec<Relation>, RuntimeError> {
        if let Some(re) = &rel.url_regexp {
            if !re.is_match(document_url) {
                return Ok(Vec::new());
            }
        }

        let subject_results = self.get_query_results(rel.subject_ref, cache, runner)?;
        let object_results = self.get_query_results(rel.object_ref, cache, runner)?;

        // §4.5's running `N`: the first `many` reference anchors the relation
        // count; a `one` reference that isn't a singleton, or a later `many`
        // reference that disagrees, sets a skip flag rather than aborting the
        // whole computation outright (ONE/MANY mismatches on subject/object
        // skip the whole relation; on an annotation they only drop that one
        // annotation, per §4.4/§4.5).
        let mut running = RunningCount::new();
        let mut skip_relation = false;

        if !observe_cardinality(
            &mut running,
            rel.subject_cardinality,
            subject_results.len(),
            "subject",
            &rel.predicate,
            reporter,
        )? {
            skip_relation = true;
        }
        if !observe_cardinality(
            &mut running,
            rel.object_cardinality,
            object_results.len(),
            "object",
            &rel.predicate,
            reporter,
        )? {
            skip_relation = true;
        }

        let mut annotation_results = Vec::with_capacity(rel.annotations.len());
        for ann in &rel.annotations {
            let values = self.get_query_results(ann.value_ref, cache, runner)?;
            let label = format!("annotation `{}`", ann.name);
            let ok =
                observe_cardinality(&mut running, ann.cardinality, values.len(), &label, &rel.predicate, reporter)?;
            annotation_results.push((ann, values, !ok));
        }

        if skip_relation {
            return Ok(Vec::new());
        }

        let n = running.resolved_len();
        let mut relations = Vec::with_capacity(n);
        for i in 0..n {
            let subject = match pick(&subject_results, rel.subject_cardinality, i) {
                Some(s) => s,
                None => {
                    reporter.report(format!(
                        "relation `{}`: missing subject value at index {i}",
                        rel.predicate
                    ))?;
                    continue;
                }
            };
            let object = match pick(&object_results, rel.object_cardinality, i) {
                Some(s) => s,
                None => {
                    reporter.report(format!(
                        "relation `{}`: missing object value at index {i}",
                        rel.predicate
                    ))?;
                    continue;
                }
            };
            let mut annotations = Vec::with_capacity(annotation_results.len());
            for (ann, values, skip_annotation) in &annotation_results {
                if *skip_annotation {
                    continue;
                }
                if let Some(value) = pick(values, ann.cardinality, i) {
                    annotations.push(Annotation { name: ann.name.clone(), value });
                }
            }
            relations.push(Relation {
                subject,
                object,
                predicate: rel.predicate.clone(),
                userdata: rel.userdata.clone(),
                annotations,
            });
        }
        Ok(relations)
    }

    /// Resolves a `QueryId` to its results, computing and caching them on
    /// first access. A `GroupMember` access fills every sibling member's
    /// cache slot in the same DOM pass (see `QueryRunner::run_grouped`).
    fn get_query_results<D: DomContext>(
        &self,
        id: QueryId,
        cache: &mut QueryResultsCache,
        runner: &mut QueryRunner<D>,
    ) -> Result<QueryResults, RuntimeError> {
        if let Some(results) = &cache.slots[id.0] {
            return Ok(results.clone());
        }

        match self.compiled.query_info.get(id) {
            QueryInfoEntry::Literal(text) => {
                let results = QueryResults(vec![(text.clone(), true)]);
                cache.slots[id.0] = Some(results.clone());
                Ok(results)
            }
            QueryInfoEntry::Url => {
                let results = QueryResults(vec![(runner.document_url().to_string(), true)]);
                cache.slots[id.0] = Some(results.clone());
                Ok(results)
            }
            QueryInfoEntry::Standalone(query) => {
                let results = runner.run_standalone(query)?;
                cache.slots[id.0] = Some(results.clone());
                Ok(results)
            }
            QueryInfoEntry::GroupMember { group, index } => {
                let all = runner.run_grouped(group)?;
                for (member_id, result) in group.member_ids.iter().zip(all.into_iter()) {
                    cache.slots[member_id.0] = Some(result);
                }
                Ok(cache.slots[id.0].clone().unwrap_or_else(|| {
                    debug_assert!(false, "group member {index} not filled by run_grouped");
                    QueryResults::default()
                }))
            }
        }
    }
}

/// Selects the value at the index a field's cardinality dictates — index `0`
/// for `one`, index `i` for `many` — and returns it only if that entry's
/// `ok` flag is set. An `ok=false` entry (or a missing index) yields `None`,
/// which drops the containing relation (subject/object) or annotation.
fn pick(results: &QueryResults, cardinality: Cardinality, i: usize) -> Option<String> {
    let index = match cardinality {
        Cardinality::One => 0,
        Cardinality::Many => i,
    };
    match results.get(index) {
        Some((value, true)) => Some(value.clone()),
        _ => None,
    }
}

/// Folds one reference's result-list length into the running `many` anchor
/// (see `cardinality::RunningCount`), additionally enforcing `one`'s
/// "exactly one entry" requirement, which the anchor alone can't express.
/// Returns `false` when this field's cardinality is violated; the caller
/// decides whether that skips the whole relation (subject/object) or just
/// this one annotation.
fn observe_cardinality(
    running: &mut RunningCount,
    cardinality: Cardinality,
    len: usize,
    label: &str,
    predicate: &str,
    reporter: &ErrorReporter,
) -> Result<bool, RuntimeError> {
    match cardinality {
        Cardinality::One => {
            if len == 1 {
                Ok(true)
            } else {
                reporter.report(format!(
                    "relation `{predicate}`: {label} has cardinality `one` but produced {len} results"
                ))?;
                Ok(false)
            }
        }
        Cardinality::Many => {
            if running.observe(len) {
                Ok(true)
            } else {
                reporter.report(format!(
                    "relation `{predicate}`: {label} result count disagrees with an earlier `many` reference"
                ))?;
                Ok(false)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::compile_parser;
    use crate::dom::XotDomContext;
    use crate::document::ContentType;
    use crate::model::{ParserDef, ParserDefFile};

    fn compile(toml_src: &str) -> CompiledParser {
        let def: ParserDef =
            toml::from_str::<ParserDefFile>(toml_src).unwrap().parser.remove(0);
        compile_parser(&def).unwrap()
    }

    #[test]
    fn one_cardinality_with_zero_results_skips_the_relation() {
        let compiled = compile(
            r#"
            [[parser]]
            parser_name = "p"
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
        let mut dom = XotDomContext::parse("<html><body></body></html>", ContentType::Html).unwrap();
        let reporter = ErrorReporter::new(crate::error::ErrorPolicy::Ignore);
        let parser = Parser::new(&compiled);
        let output = parser.parse(&mut dom, "http://x/", &reporter).unwrap();
        assert!(output.relations.is_empty());
    }

    #[test]
    fn annotation_with_failed_extract_is_omitted_but_relation_survives() {
        let compiled = compile(
            r#"
            [[parser]]
            parser_name = "p"
            [[parser.query_defs]]
            name = "title"
            query = "//title"
            [[parser.query_defs]]
            name = "num"
            query = "//title"
            [[parser.query_defs.post_processing_ops]]
            kind = "extract"
            regexp = "^(\\d+)$"
            [[parser.relation_tmpls]]
            subject = "%url%"
            object = "%title%"
            predicate = "hasTitle"
            subject_cardinality = "one"
            object_cardinality = "one"
            [[parser.relation_tmpls.annotation_tmpls]]
            name = "numeric"
            value = "%num%"
            value_cardinality = "one"
            "#,
        );
        let mut dom =
            XotDomContext::parse("<html><head><title>Hi</title></head></html>", ContentType::Html).unwrap();
        let reporter = ErrorReporter::new(crate::error::ErrorPolicy::Ignore);
        let parser = Parser::new(&compiled);
        let output = parser.parse(&mut dom, "http://x/", &reporter).unwrap();
        assert_eq!(output.relations.len(), 1);
        assert!(output.relations[0].annotations.is_empty());
    }

    #[test]
    fn repeated_reference_hits_the_cache_instead_of_re_querying() {
        let compiled = compile(
            r#"
            [[parser]]
            parser_name = "p"
            [[parser.query_defs]]
            name = "title"
            query = "//title"
            [[parser.relation_tmpls]]
            subject = "%title%"
            object = "%title%"
            predicate = "selfLoop"
            subject_cardinality = "one"
            object_cardinality = "one"
            "#,
        );
        let mut dom =
            XotDomContext::parse("<html><head><title>Hi</title></head></html>", ContentType::Html).unwrap();
        let reporter = ErrorReporter::new(crate::error::ErrorPolicy::Ignore);
        let parser = Parser::new(&compiled);
        let output = parser.parse(&mut dom, "http://x/", &reporter).unwrap();
        assert_eq!(output.relations.len(), 1);
        assert_eq!(output.relations[0].subject, "Hi");
        assert_eq!(output.relations[0].object, "Hi");
    }
}
