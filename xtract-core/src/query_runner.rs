//! Executes compiled queries against a `DomContext` and folds raw XPath
//! results through each query's post-processing pipeline.
//!
//! Grounded on `tractor-core`'s `xpath::engine` evaluation loop, generalized
//! from "one query, one document" to the grouped root/subquery alignment
//! this specification's query groups need (see SPEC_FULL.md §4.3).

use std::collections::HashMap;

use xot::Node;

use crate::compiler::{CompiledGroup, CompiledQuery};
use crate::dom::{DomContext, DomError, EvalResult};
use crate::error::ErrorReporter;
use crate::postprocess::{self, PostProcessResult};
use crate::url;

/// The fully post-processed result list of a single query, in document
/// order. Each entry's `bool` distinguishes "empty result" from "result
/// failed post-processing" (see SPEC_FULL.md §3): the latter still counts
/// towards cardinality but is never picked as a relation or annotation value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResults(pub Vec<(String, bool)>);

impl QueryResults {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, i: usize) -> Option<&(String, bool)> {
        self.0.get(i)
    }
}

pub struct QueryRunner<'a, D: DomContext> {
    dom: &'a mut D,
    base_url: &'a str,
    reporter: &'a ErrorReporter,
}

impl<'a, D: DomContext> QueryRunner<'a, D> {
    pub fn new(dom: &'a mut D, base_url: &'a str, reporter: &'a ErrorReporter) -> Self {
        QueryRunner { dom, base_url, reporter }
    }

    pub fn document_url(&self) -> &str {
        self.base_url
    }

    /// Runs a standalone (non-grouped) query: evaluate, absolutize URLs if
    /// the xpath shape calls for it, then post-process each raw value.
    pub fn run_standalone(
        &mut self,
        query: &CompiledQuery,
    ) -> Result<QueryResults, crate::error::RuntimeError> {
        let raw = self.evaluate_to_strings(&query.query)?;
        self.postprocess_all(query, raw)
    }

    /// Runs a query group: evaluate the root query once to get the anchor
    /// node set, then each subquery once (as an absolute path from the
    /// document root), aligning each subquery's results back to the root's
    /// positions by walking DOM ancestry. Returns one `QueryResults` per
    /// subquery, in `group.subqueries` order, each sized to the root count.
    pub fn run_grouped(
        &mut self,
        group: &CompiledGroup,
    ) -> Result<Vec<QueryResults>, crate::error::RuntimeError> {
        let root_nodes = match self.dom.evaluate(&group.root_query) {
            Ok(EvalResult::NodeSet(nodes)) => nodes,
            Ok(_) => {
                self.reporter.report(format!(
                    "query group `{}` root query `{}` did not evaluate to a node-set",
                    group.name, group.root_query
                ))?;
                return Ok(group.subqueries.iter().map(|_| QueryResults::default()).collect());
            }
            Err(e) => return Err(self.dom_error_into_runtime(e)?),
        };

        let root_index: HashMap<Node, usize> =
            root_nodes.iter().enumerate().map(|(i, n)| (*n, i)).collect();
        let n = root_nodes.len();

        let mut out = Vec::with_capacity(group.subqueries.len());
        for sub in &group.subqueries {
            let absolute = format!("{}{}", group.root_query, sub.query);
            let mut slots: Vec<Option<String>> = vec![None; n];

            if let Some(attr_name) = attribute_step_name(&absolute) {
                let owner_xpath = &absolute[..absolute.len() - attr_name.len() - 2];
                match self.dom.evaluate(owner_xpath) {
                    Ok(EvalResult::NodeSet(owners)) => {
                        self.align_results(
                            group,
                            sub,
                            n,
                            owners.len(),
                            owners
                                .into_iter()
                                .filter_map(|owner| self.dom.node_attribute(owner, &attr_name).map(|v| (owner, v))),
                            &root_index,
                            &mut slots,
                        )?;
                    }
                    Ok(_) => self.reporter.report(format!(
                        "query group `{}` subquery `{}`: `{}` did not evaluate to a node-set",
                        group.name, sub.name, owner_xpath
                    ))?,
                    Err(e) => return Err(self.dom_error_into_runtime(e)?),
                }
            } else {
                match self.dom.evaluate(&absolute) {
                    Ok(EvalResult::NodeSet(nodes)) => {
                        let count = nodes.len();
                        self.align_results(
                            group,
                            sub,
                            n,
                            count,
                            nodes.into_iter().filter_map(|node| self.dom.node_content(node).map(|c| (node, c))),
                            &root_index,
                            &mut slots,
                        )?;
                    }
                    Ok(_) => self.reporter.report(format!(
                        "query group `{}` subquery `{}`: `{}` did not evaluate to a node-set",
                        group.name, sub.name, absolute
                    ))?,
                    Err(e) => return Err(self.dom_error_into_runtime(e)?),
                }
            }

            let mut values = Vec::with_capacity(n);
            for slot in slots {
                match slot {
                    Some(raw) => values.push(self.postprocess_one(sub, raw)?),
                    None => values.push((String::new(), false)),
                }
            }
            out.push(QueryResults(values));
        }
        Ok(out)
    }

    /// Aligns each `(node, value)` pair from a subquery's evaluation back to
    /// its root-node slot, logging per §4.2/§7: a result count exceeding the
    /// root count warns (the pigeonhole condition that guarantees a downstream
    /// collision); a result with no root ancestor, or one that collides with
    /// an already-filled slot, is logged and dropped, leaving the slot at its
    /// `("", false)` default or its earlier value.
    #[allow(clippy::too_many_arguments)]
    fn align_results(
        &self,
        group: &CompiledGroup,
        sub: &CompiledQuery,
        root_count: usize,
        result_count: usize,
        results: impl Iterator<Item = (Node, String)>,
        root_index: &HashMap<Node, usize>,
        slots: &mut [Option<String>],
    ) -> Result<(), crate::error::RuntimeError> {
        if result_count > root_count {
            self.reporter.report(format!(
                "query group `{}` subquery `{}`: {} result(s) for {} root node(s)",
                group.name, sub.name, result_count, root_count
            ))?;
        }
        for (node, value) in results {
            match self.align_to_root(node, root_index) {
                None => {
                    self.reporter.report(format!(
                        "query group `{}` subquery `{}`: result has no ancestor among the root nodes",
                        group.name, sub.name
                    ))?;
                }
                Some(slot) if slots[slot].is_some() => {
                    self.reporter.report(format!(
                        "query group `{}` subquery `{}`: two results aligned to the same root node",
                        group.name, sub.name
                    ))?;
                }
                Some(slot) => slots[slot] = Some(value),
            }
        }
        Ok(())
    }

    /// Walks `node_parent` from `node` until a root position is found.
    fn align_to_root(&self, mut node: Node, root_index: &HashMap<Node, usize>) -> Option<usize> {
        loop {
            if let Some(&slot) = root_index.get(&node) {
                return Some(slot);
            }
            node = self.dom.node_parent(node)?;
        }
    }

    fn evaluate_to_strings(&mut self, xpath: &str) -> Result<Vec<String>, crate::error::RuntimeError> {
        match self.dom.evaluate(xpath) {
            Ok(EvalResult::NodeSet(nodes)) => {
                Ok(nodes.iter().filter_map(|n| self.dom.node_content(*n)).collect())
            }
            Ok(EvalResult::AtomicSet(values)) => Ok(values),
            Ok(EvalResult::Boolean(b)) => Ok(vec![if b { "1".to_string() } else { "0".to_string() }]),
            Ok(EvalResult::Number(s)) | Ok(EvalResult::String(s)) => Ok(vec![s]),
            Err(e) => Err(self.dom_error_into_runtime(e)?),
        }
    }

    fn dom_error_into_runtime(
        &self,
        e: DomError,
    ) -> Result<crate::error::RuntimeError, crate::error::RuntimeError> {
        self.reporter.report(e.to_string())?;
        Ok(crate::error::RuntimeError::Dom(e))
    }

    /// Post-processes every raw value from a standalone query's evaluation,
    /// in order, keeping one `(string, ok)` entry per raw value — a failed
    /// post-processing op never shrinks the list, only flips `ok` to `false`
    /// (see SPEC_FULL.md §3's `QueryResults` invariant).
    fn postprocess_all(
        &self,
        query: &CompiledQuery,
        raw: Vec<String>,
    ) -> Result<QueryResults, crate::error::RuntimeError> {
        let mut values = Vec::with_capacity(raw.len());
        for value in raw {
            values.push(self.postprocess_one(query, value)?);
        }
        Ok(QueryResults(values))
    }

    /// Absolutizes (if the query's XPath shape calls for it) then
    /// post-processes a single raw result. `ok=false` on a failed URL
    /// resolution or a non-matching `extract`; the string is then
    /// unspecified content per §4.1 step 3 and left empty.
    fn postprocess_one(
        &self,
        query: &CompiledQuery,
        value: String,
    ) -> Result<(String, bool), crate::error::RuntimeError> {
        let value = match (query.is_url, url::absolutize(self.base_url, &value)) {
            (true, Some(resolved)) => resolved,
            (true, None) => return Ok((String::new(), false)),
            (false, _) => value,
        };
        match postprocess::apply(&query.post_processing_ops, &value) {
            Ok(PostProcessResult::Ok(v)) => Ok((v, true)),
            Ok(PostProcessResult::Dropped) => Ok((String::new(), false)),
            Err(msg) => {
                self.reporter.report(format!("query `{}`: {}", query.name, msg))?;
                Ok((String::new(), false))
            }
        }
    }
}

/// If `xpath` ends in an attribute step (`/@name`), returns the attribute
/// name. Used to special-case attribute axes in grouped queries, since `xot`
/// attribute values have no node identity to align against the root set.
fn attribute_step_name(xpath: &str) -> Option<String> {
    let idx = xpath.rfind("/@")?;
    let name = &xpath[idx + 2..];
    if name.is_empty() || name.contains('/') {
        None
    } else {
        Some(name.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attribute_step_name_extracts_trailing_attribute() {
        assert_eq!(attribute_step_name("//a/@href").as_deref(), Some("href"));
        assert_eq!(attribute_step_name("//title"), None);
    }
}
