//! The `DomContext` collaborator: parses a document body into a DOM and
//! evaluates XPath expressions against it.
//!
//! Grounded on `tractor-core`'s `xpath::engine` module for the xot/xee-xpath
//! query plumbing. Since `xot` has no tolerant HTML5 reader of its own, HTML
//! bodies are first parsed with `scraper` (an html5ever-backed parser also
//! used for HTML DOM work elsewhere in this corpus) and the resulting tree is
//! rebuilt node-by-node into `xot`, the same technique `tractor-core`'s
//! `XeeBuilder` uses to build a `xot` tree directly from a TreeSitter AST.
//! XML bodies are parsed directly by `xot`'s own reader.

use std::collections::HashMap;

use thiserror::Error;
use xee_xpath::{DocumentHandle, Documents, Item, Queries, Query};
use xot::{NameId, Node, Xot};

use crate::document::ContentType;
use crate::url;

#[derive(Debug, Error)]
pub enum DomError {
    #[error("failed to parse document body: {0}")]
    Parse(String),
    #[error("failed to compile xpath `{xpath}`: {source}")]
    Compile { xpath: String, source: String },
    #[error("failed to evaluate xpath `{xpath}`: {source}")]
    Evaluate { xpath: String, source: String },
    #[error("xpath `{0}` produced a mixture of nodes and atomic values")]
    MixedSequence(String),
}

/// The reconciled XPath 1.0-style result of evaluating an expression against
/// a `xee-xpath` sequence (see SPEC_FULL.md §4.2's "ambient addition").
#[derive(Debug, Clone)]
pub enum EvalResult {
    Boolean(bool),
    Number(String),
    String(String),
    /// A sequence of DOM nodes, in document order.
    NodeSet(Vec<Node>),
    /// A sequence of more than one atomic value — the shape an attribute
    /// axis step (`/@href`) takes, since `xot` has no attribute-node type.
    AtomicSet(Vec<String>),
}

/// Evaluates XPath expressions against a parsed document and exposes the DOM
/// node accessors (`content`, `parent`) `QueryRunner` needs.
pub trait DomContext {
    fn evaluate(&mut self, xpath: &str) -> Result<EvalResult, DomError>;
    fn node_content(&self, node: Node) -> Option<String>;
    fn node_parent(&self, node: Node) -> Option<Node>;
    /// Reads a single attribute directly off an element node, bypassing
    /// XPath. Used by grouped-query alignment (see `query_runner`) once an
    /// owner element has already been located by walking `node_parent`,
    /// since `xot` attribute values have no node identity of their own to
    /// align by.
    fn node_attribute(&self, node: Node, name: &str) -> Option<String>;
}

/// `DomContext` backed by `xot` (the tree) and `xee-xpath` (the query
/// engine), with `scraper` used only to tolerantly tokenize HTML bodies
/// before they're rebuilt into the `xot` tree.
pub struct XotDomContext {
    documents: Documents,
    doc_handle: DocumentHandle,
}

impl XotDomContext {
    pub fn parse(content: &str, content_type: ContentType) -> Result<Self, DomError> {
        match content_type {
            ContentType::Xml => Self::parse_xml(content),
            ContentType::Html | ContentType::Unknown => Self::parse_html(content),
        }
    }

    fn parse_xml(content: &str) -> Result<Self, DomError> {
        let mut documents = Documents::new();
        let uri = "file:///document.xml"
            .try_into()
            .map_err(|_| DomError::Parse("invalid internal document uri".to_string()))?;
        let doc_handle = documents
            .add_string(uri, content)
            .map_err(|e| DomError::Parse(e.to_string()))?;
        Ok(XotDomContext { documents, doc_handle })
    }

    fn parse_html(content: &str) -> Result<Self, DomError> {
        let mut documents = Documents::new();
        let uri = "file:///document.html"
            .try_into()
            .map_err(|_| DomError::Parse("invalid internal document uri".to_string()))?;
        // Seed a shell document so `Documents` allocates a root we can graft
        // the real, tolerantly-parsed tree onto (the same shell-then-graft
        // shape `XeeBuilder::build_raw` uses for TreeSitter ASTs).
        let doc_handle = documents
            .add_string(uri, "<html/>")
            .map_err(|e| DomError::Parse(e.to_string()))?;
        let doc_node = documents
            .document_node(doc_handle)
            .ok_or_else(|| DomError::Parse("missing document node".to_string()))?;

        let scraper_doc = scraper::Html::parse_document(content);
        let xot = documents.xot_mut();
        let root = xot
            .document_element(doc_node)
            .map_err(|e| DomError::Parse(e.to_string()))?;
        let mut builder = HtmlTreeBuilder::new(xot);
        builder.populate_root(&scraper_doc, root);

        Ok(XotDomContext { documents, doc_handle })
    }
}

impl DomContext for XotDomContext {
    fn evaluate(&mut self, xpath: &str) -> Result<EvalResult, DomError> {
        let queries = Queries::default();
        let query = queries.sequence(xpath).map_err(|e| DomError::Compile {
            xpath: xpath.to_string(),
            source: e.to_string(),
        })?;
        let sequence = query
            .execute(&mut self.documents, self.doc_handle)
            .map_err(|e| DomError::Evaluate {
                xpath: xpath.to_string(),
                source: e.to_string(),
            })?;

        let mut nodes = Vec::new();
        let mut atoms = Vec::new();
        for item in sequence.iter() {
            match item {
                Item::Node(node) => nodes.push(node),
                Item::Atomic(atomic) => atoms.push(atomic.to_string().unwrap_or_default()),
                Item::Function(_) => return Err(DomError::MixedSequence(xpath.to_string())),
            }
        }

        if !nodes.is_empty() && !atoms.is_empty() {
            return Err(DomError::MixedSequence(xpath.to_string()));
        }
        if !nodes.is_empty() {
            return Ok(EvalResult::NodeSet(nodes));
        }
        match atoms.len() {
            0 => Ok(EvalResult::NodeSet(Vec::new())),
            1 => Ok(classify_scalar(atoms.into_iter().next().unwrap(), xpath)),
            _ => Ok(EvalResult::AtomicSet(atoms)),
        }
    }

    fn node_content(&self, node: Node) -> Option<String> {
        let s = self.documents.xot().string_value(node);
        if s.is_empty() {
            None
        } else {
            Some(s)
        }
    }

    fn node_parent(&self, node: Node) -> Option<Node> {
        self.documents.xot().parent(node)
    }

    fn node_attribute(&self, node: Node, name: &str) -> Option<String> {
        let xot = self.documents.xot();
        let name_id = xot.name(name)?;
        xot.attributes(node).get(name_id).cloned()
    }
}

/// Classifies a single atomic XPath result the way XPath 1.0's legacy
/// boolean/number/string types would have: `"true"`/`"false"` become the
/// boolean `1`/`0` convention §4.2 specifies, a value that parses as a
/// float is a number, everything else is a string. Both the number and
/// string cases carry the value through unchanged — the distinction only
/// matters for `replace`/`extract`, which operate on the raw text either way.
///
/// Attribute-axis expressions (`/@name`) are exempted from reclassification:
/// their atomic result is always attribute text, so `//a/@href` returning
/// `"true"` or `//x/@data` returning `"42"` must stay a `String`, not become
/// a boolean or number. Genuine booleans/numbers come from a structurally
/// different expression (`count()`, a comparison, `boolean()`, `number()`).
fn classify_scalar(raw: String, xpath: &str) -> EvalResult {
    if url::ends_with_attribute_step(xpath) {
        return EvalResult::String(raw);
    }
    match raw.as_str() {
        "true" => EvalResult::Boolean(true),
        "false" => EvalResult::Boolean(false),
        _ if raw.parse::<f64>().is_ok() => EvalResult::Number(raw),
        _ => EvalResult::String(raw),
    }
}

/// Rebuilds a `scraper`-parsed HTML tree into `xot`, the same node-by-node
/// construction `XeeBuilder::build_raw_node_into_documents` uses for
/// TreeSitter ASTs, just sourced from html5ever's tolerant tokenizer instead.
struct HtmlTreeBuilder<'a> {
    xot: &'a mut Xot,
    names: HashMap<String, NameId>,
}

impl<'a> HtmlTreeBuilder<'a> {
    fn new(xot: &'a mut Xot) -> Self {
        HtmlTreeBuilder { xot, names: HashMap::new() }
    }

    fn name_id(&mut self, name: &str) -> NameId {
        if let Some(&id) = self.names.get(name) {
            return id;
        }
        let id = self.xot.add_name(name);
        self.names.insert(name.to_string(), id);
        id
    }

    fn copy_attrs(&mut self, el: &scraper::node::Element, target: Node) {
        for (name, value) in el.attrs() {
            let id = self.name_id(name);
            self.xot.attributes_mut(target).insert(id, value.to_string());
        }
    }

    /// Grafts the parsed document's root element onto `root`, an already
    /// allocated placeholder element (see `parse_html`'s shell-document step).
    fn populate_root(&mut self, doc: &scraper::Html, root: Node) {
        for top in doc.tree.root().children() {
            if let scraper::Node::Element(el) = top.value() {
                self.copy_attrs(el, root);
                for child in top.children() {
                    self.build_node(child, root);
                }
                return;
            }
        }
    }

    fn build_node(&mut self, node_ref: ego_tree::NodeRef<scraper::Node>, parent: Node) {
        match node_ref.value() {
            scraper::Node::Element(el) => {
                let name_id = self.name_id(el.name());
                let element = self.xot.new_element(name_id);
                self.copy_attrs(el, element);
                for child in node_ref.children() {
                    self.build_node(child, element);
                }
                let _ = self.xot.append(parent, element);
            }
            scraper::Node::Text(text) => {
                let content = text.to_string();
                if !content.is_empty() {
                    let text_node = self.xot.new_text(&content);
                    let _ = self.xot.append(parent, text_node);
                }
            }
            // Comments, doctypes and processing instructions carry no
            // queryable relation data and are dropped, matching the
            // TreeSitter builder's treatment of anonymous punctuation nodes.
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_html_and_finds_title() {
        let mut dom = XotDomContext::parse(
            "<html><head><title>Hi</title></head><body></body></html>",
            ContentType::Html,
        )
        .unwrap();
        match dom.evaluate("//title").unwrap() {
            EvalResult::NodeSet(nodes) => {
                assert_eq!(nodes.len(), 1);
                assert_eq!(dom.node_content(nodes[0]).as_deref(), Some("Hi"));
            }
            other => panic!("expected a node-set, got {other:?}"),
        }
    }

    #[test]
    fn attribute_axis_over_multiple_elements_is_an_atomic_set() {
        let mut dom = XotDomContext::parse(
            "<body><img src=\"a.png\"><img src=\"b.png\"></body>",
            ContentType::Html,
        )
        .unwrap();
        match dom.evaluate("//img/@src").unwrap() {
            EvalResult::AtomicSet(values) => {
                assert_eq!(values, vec!["a.png".to_string(), "b.png".to_string()]);
            }
            other => panic!("expected an atomic set, got {other:?}"),
        }
    }

    #[test]
    fn classifies_boolean_and_numeric_scalars() {
        let mut dom = XotDomContext::parse("<root><a/></root>", ContentType::Xml).unwrap();
        assert!(matches!(dom.evaluate("count(//a) > 0").unwrap(), EvalResult::Boolean(true)));
        assert!(matches!(dom.evaluate("count(//a)").unwrap(), EvalResult::Number(_)));
    }

    #[test]
    fn attribute_text_that_looks_boolean_or_numeric_stays_a_string() {
        let mut dom = XotDomContext::parse(
            "<body><a href=\"true\"></a><x data=\"42\"></x></body>",
            ContentType::Html,
        )
        .unwrap();
        match dom.evaluate("//a/@href").unwrap() {
            EvalResult::String(s) => assert_eq!(s, "true"),
            other => panic!("expected a string, got {other:?}"),
        }
        match dom.evaluate("//x/@data").unwrap() {
            EvalResult::String(s) => assert_eq!(s, "42"),
            other => panic!("expected a string, got {other:?}"),
        }
    }

    #[test]
    fn grouped_ancestry_walk_finds_root_via_parent_chain() {
        let mut dom =
            XotDomContext::parse("<ul><li><span>K1</span></li></ul>", ContentType::Xml).unwrap();
        let roots = match dom.evaluate("//li").unwrap() {
            EvalResult::NodeSet(nodes) => nodes,
            other => panic!("expected a node-set, got {other:?}"),
        };
        let spans = match dom.evaluate("//li/span").unwrap() {
            EvalResult::NodeSet(nodes) => nodes,
            other => panic!("expected a node-set, got {other:?}"),
        };
        let mut cursor = Some(spans[0]);
        let mut found_root = false;
        while let Some(node) = cursor {
            if node == roots[0] {
                found_root = true;
                break;
            }
            cursor = dom.node_parent(node);
        }
        assert!(found_root);
    }
}
