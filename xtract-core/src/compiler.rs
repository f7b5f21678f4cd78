//! Compiles declarative `ParserDef`s (as loaded from `.xtd` files) into the
//! dense, index-addressed structures the runtime actually executes against.
//!
//! Grounded on `tractor-core`'s query-compilation pass (string-keyed query
//! definitions resolved once into an execution plan before any document is
//! touched) — generalized here to the `%name%` cross-reference resolution
//! and query-group member layout this specification's schema needs (see
//! SPEC_FULL.md §4.4 and the §9 design note on dense `QueryId` indexing).

use std::collections::HashMap;
use std::rc::Rc;

use regex::Regex;

use crate::error::CompileError;
use crate::model::{
    AnnotationTemplate, Cardinality, ParserDef, ParserDefFile, PostProcessingOp, QueryDef,
    QueryGroupDef, RelationTemplate,
};
use crate::url;

/// Dense index into a compiled parser's `QueryInfoTable`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QueryId(pub usize);

#[derive(Debug, Clone)]
pub struct CompiledQuery {
    pub id: QueryId,
    pub name: String,
    pub query: String,
    pub post_processing_ops: Vec<PostProcessingOp>,
    pub is_url: bool,
}

#[derive(Debug, Clone)]
pub struct CompiledGroup {
    pub name: String,
    pub root_query: String,
    pub subqueries: Vec<CompiledQuery>,
    pub member_ids: Vec<QueryId>,
}

/// What a `QueryId` actually names, resolved once at compile time so the
/// runtime never re-parses a `%name%` reference or a literal string.
#[derive(Debug, Clone)]
pub enum QueryInfoEntry {
    /// A literal value (a relation field that wasn't a `%name%` reference).
    Literal(String),
    /// The builtin `%url%` reference: the document's own URL.
    Url,
    Standalone(Rc<CompiledQuery>),
    GroupMember { group: Rc<CompiledGroup>, index: usize },
}

#[derive(Debug, Clone, Default)]
pub struct QueryInfoTable {
    entries: Vec<QueryInfoEntry>,
}

impl QueryInfoTable {
    pub fn get(&self, id: QueryId) -> &QueryInfoEntry {
        &self.entries[id.0]
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct CompiledAnnotationTemplate {
    pub name: String,
    pub value_ref: QueryId,
    pub cardinality: Cardinality,
}

#[derive(Debug, Clone)]
pub struct CompiledRelationTemplate {
    pub url_regexp: Option<Regex>,
    pub subject_ref: QueryId,
    pub object_ref: QueryId,
    pub subject_cardinality: Cardinality,
    pub object_cardinality: Cardinality,
    pub predicate: String,
    pub userdata: Option<String>,
    pub annotations: Vec<CompiledAnnotationTemplate>,
}

#[derive(Debug, Clone)]
pub struct CompiledParser {
    pub name: String,
    pub url_regexp: Option<Regex>,
    pub query_info: QueryInfoTable,
    pub relations: Vec<CompiledRelationTemplate>,
}

/// Reserves `QueryId`s and resolves `%name%` references while a single
/// parser definition is being compiled. Consumed into a `QueryInfoTable`
/// once every query, group and relation template has been processed.
struct Builder {
    entries: Vec<QueryInfoEntry>,
    name_to_id: HashMap<String, QueryId>,
    /// De-duplicates inlined XPath references: two template fields with the
    /// identical XPath string resolve to the same synthesized `QueryId`
    /// (see SPEC_FULL.md §8, "inlined-XPath de-duplication").
    inlined_by_xpath: HashMap<String, QueryId>,
    next_inlined_name: u64,
}

impl Builder {
    fn new() -> Self {
        let mut builder = Builder {
            entries: Vec::new(),
            name_to_id: HashMap::new(),
            inlined_by_xpath: HashMap::new(),
            next_inlined_name: 0,
        };
        let url_id = QueryId(builder.entries.len());
        builder.entries.push(QueryInfoEntry::Url);
        builder.name_to_id.insert("url".to_string(), url_id);
        builder
    }

    fn reserve(&mut self) -> QueryId {
        let id = QueryId(self.entries.len());
        self.entries.push(QueryInfoEntry::Literal(String::new()));
        id
    }

    fn declare_name(&mut self, name: &str) -> Result<(), CompileError> {
        validate_name(name)?;
        if name == "url" || self.name_to_id.contains_key(name) {
            return Err(CompileError::DuplicateName(name.to_string()));
        }
        Ok(())
    }

    fn insert_standalone(
        &mut self,
        qd: &QueryDef,
    ) -> Result<(), CompileError> {
        self.declare_name(&qd.name)?;
        let id = self.reserve();
        let compiled = CompiledQuery {
            id,
            name: qd.name.clone(),
            query: qd.query.clone(),
            post_processing_ops: qd.post_processing_ops.clone(),
            is_url: url::query_returns_urls(&qd.query),
        };
        self.entries[id.0] = QueryInfoEntry::Standalone(Rc::new(compiled));
        self.name_to_id.insert(qd.name.clone(), id);
        Ok(())
    }

    /// Grouped subqueries are registered under the synthesized `group.sub`
    /// name, not the bare subquery name — mirrors `GetGroupedQueryName` in
    /// the upstream `xpaf_parser.cc`, and is what `%group.sub%` references
    /// resolve against. The bare name is still validated against
    /// `[A-Za-z_]+`; only the dotted form needs to be collision-free, so the
    /// same subquery name may appear in two different groups.
    fn insert_group(&mut self, group_def: &QueryGroupDef) -> Result<(), CompileError> {
        if group_def.query_defs.is_empty() {
            return Err(CompileError::EmptyQueryGroup(group_def.name.clone()));
        }
        for qd in &group_def.query_defs {
            validate_name(&qd.name)?;
        }

        let mut member_ids = Vec::with_capacity(group_def.query_defs.len());
        for qd in &group_def.query_defs {
            let full_name = grouped_query_name(&group_def.name, &qd.name);
            if full_name == "url" || self.name_to_id.contains_key(&full_name) {
                return Err(CompileError::DuplicateName(full_name));
            }
            let id = self.reserve();
            self.name_to_id.insert(full_name, id);
            member_ids.push(id);
        }

        let subqueries: Vec<CompiledQuery> = group_def
            .query_defs
            .iter()
            .zip(member_ids.iter())
            .map(|(qd, id)| CompiledQuery {
                id: *id,
                name: qd.name.clone(),
                query: qd.query.clone(),
                post_processing_ops: qd.post_processing_ops.clone(),
                is_url: url::query_returns_urls(&qd.query),
            })
            .collect();

        let group = Rc::new(CompiledGroup {
            name: group_def.name.clone(),
            root_query: group_def.root_query.clone(),
            subqueries,
            member_ids: member_ids.clone(),
        });

        for (index, id) in member_ids.iter().enumerate() {
            self.entries[id.0] = QueryInfoEntry::GroupMember { group: group.clone(), index };
        }
        Ok(())
    }

    /// Resolves a relation/annotation field string: `%name%` looks up a
    /// previously declared query (or the builtin `%url%`); a leading `/`
    /// inlines the rest of the string as an anonymous XPath query, synthesizing
    /// a `QueryDef` named with the next decimal integer (never collides with a
    /// user name, since those are restricted to `[A-Za-z_]+`); anything else
    /// (including the empty string, per SPEC_FULL.md §9 open question ii's
    /// sibling reasoning about uniform literal handling) is interned as a
    /// literal value.
    fn resolve_reference(&mut self, reference: &str) -> Result<QueryId, CompileError> {
        if let Some(stripped) = reference.strip_prefix('%') {
            if let Some(name) = stripped.strip_suffix('%') {
                if name.is_empty() {
                    return Err(CompileError::MalformedReference(reference.to_string()));
                }
                return self
                    .name_to_id
                    .get(name)
                    .copied()
                    .ok_or_else(|| CompileError::UnresolvedReference(reference.to_string()));
            }
            return Err(CompileError::MalformedReference(reference.to_string()));
        }
        if reference.starts_with('/') {
            return Ok(self.intern_inlined_xpath(reference));
        }
        Ok(self.intern_literal(reference.to_string()))
    }

    /// Interns an inlined XPath expression as a synthesized standalone query,
    /// reusing the existing `QueryId` if the exact same XPath string was
    /// already inlined elsewhere in this parser definition.
    fn intern_inlined_xpath(&mut self, xpath: &str) -> QueryId {
        if let Some(&id) = self.inlined_by_xpath.get(xpath) {
            return id;
        }
        let id = self.reserve();
        let name = self.next_inlined_name.to_string();
        self.next_inlined_name += 1;
        let compiled = CompiledQuery {
            id,
            name,
            query: xpath.to_string(),
            post_processing_ops: Vec::new(),
            is_url: url::query_returns_urls(xpath),
        };
        self.entries[id.0] = QueryInfoEntry::Standalone(Rc::new(compiled));
        self.inlined_by_xpath.insert(xpath.to_string(), id);
        id
    }

    fn intern_literal(&mut self, text: String) -> QueryId {
        let id = QueryId(self.entries.len());
        self.entries.push(QueryInfoEntry::Literal(text));
        id
    }

    fn build(self) -> QueryInfoTable {
        QueryInfoTable { entries: self.entries }
    }
}

/// Synthesizes the `%group.sub%`-reference key a grouped subquery is
/// registered and resolved under.
fn grouped_query_name(group_name: &str, sub_name: &str) -> String {
    format!("{group_name}.{sub_name}")
}

fn validate_name(name: &str) -> Result<(), CompileError> {
    if !name.is_empty() && name.chars().all(|c| c.is_ascii_alphabetic() || c == '_') {
        Ok(())
    } else {
        Err(CompileError::InvalidName(name.to_string()))
    }
}

fn reject_reserved_ops(ops: &[PostProcessingOp]) -> Result<(), CompileError> {
    for op in ops {
        match op {
            PostProcessingOp::Substr => return Err(CompileError::ReservedOp("substr")),
            PostProcessingOp::Convert => return Err(CompileError::ReservedOp("convert")),
            PostProcessingOp::Replace { regexp, .. } | PostProcessingOp::Extract { regexp } => {
                Regex::new(regexp)
                    .map_err(|e| CompileError::InvalidRegex(regexp.clone(), e.to_string()))?;
            }
        }
    }
    Ok(())
}

fn compile_optional_regex(pattern: Option<&str>) -> Result<Option<Regex>, CompileError> {
    pattern
        .map(|p| Regex::new(p).map_err(|e| CompileError::InvalidRegex(p.to_string(), e.to_string())))
        .transpose()
}

fn compile_annotation(
    builder: &mut Builder,
    ann: &AnnotationTemplate,
) -> Result<CompiledAnnotationTemplate, CompileError> {
    let value_ref = builder.resolve_reference(&ann.value)?;
    Ok(CompiledAnnotationTemplate {
        name: ann.name.clone(),
        value_ref,
        cardinality: ann.value_cardinality,
    })
}

fn compile_relation(
    builder: &mut Builder,
    rel: &RelationTemplate,
) -> Result<CompiledRelationTemplate, CompileError> {
    let subject_ref = builder.resolve_reference(&rel.subject)?;
    let object_ref = builder.resolve_reference(&rel.object)?;
    let url_regexp = compile_optional_regex(rel.url_regexp.as_deref())?;
    let annotations = rel
        .annotation_tmpls
        .iter()
        .map(|ann| compile_annotation(builder, ann))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(CompiledRelationTemplate {
        url_regexp,
        subject_ref,
        object_ref,
        subject_cardinality: rel.subject_cardinality,
        object_cardinality: rel.object_cardinality,
        predicate: rel.predicate.clone(),
        userdata: rel.userdata.clone(),
        annotations,
    })
}

/// Compiles a single `ParserDef` into its execution plan.
pub fn compile_parser(def: &ParserDef) -> Result<CompiledParser, CompileError> {
    let mut builder = Builder::new();

    for qd in &def.query_defs {
        reject_reserved_ops(&qd.post_processing_ops)?;
        builder.insert_standalone(qd)?;
    }
    for group in &def.query_group_defs {
        for qd in &group.query_defs {
            reject_reserved_ops(&qd.post_processing_ops)?;
        }
        builder.insert_group(group)?;
    }

    let relations = def
        .relation_tmpls
        .iter()
        .map(|rel| compile_relation(&mut builder, rel))
        .collect::<Result<Vec<_>, _>>()?;

    let url_regexp = compile_optional_regex(def.url_regexp.as_deref())?;
    let query_info = builder.build();

    Ok(CompiledParser { name: def.parser_name.clone(), url_regexp, query_info, relations })
}

/// Compiles every `ParserDef` in a loaded `.xtd` file set into a bank,
/// rejecting duplicate parser names across the whole set.
pub fn compile_bank(file: &ParserDefFile) -> Result<Vec<CompiledParser>, CompileError> {
    let mut seen = HashMap::new();
    let mut parsers = Vec::with_capacity(file.parser.len());
    for def in &file.parser {
        if seen.insert(def.parser_name.clone(), ()).is_some() {
            return Err(CompileError::DuplicateParserName(def.parser_name.clone()));
        }
        parsers.push(compile_parser(def)?);
    }
    Ok(parsers)
}
