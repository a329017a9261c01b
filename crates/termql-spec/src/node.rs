//! Leaf predicates over stored nodes.
//!
//! Each leaf knows how to test a `(NodeId, Node)` pair in memory and, where a
//! backend can express it, how to compile itself. The column and field layout
//! the compiled forms refer to is defined here too ([`relational_row`],
//! [`index_document`]) so that executors index nodes exactly the way leaves
//! query them.
//!
//! [`NodeLeaf::ByReferencePath`] depends on other nodes: run
//! [`resolve_reference_paths`] over a specification before testing or
//! compiling it.

use chrono::{Datelike, NaiveDateTime};
use std::collections::BTreeSet;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use termql_schema::{Node, NodeId};

use crate::index::{BooleanClause, IndexQuery, Occur};
use crate::spec::{Backend, Leaf, Specification};
use crate::sql::{SqlQuery, SqlValue, TAUTOLOGY};

pub type NodeSpecification = Specification<NodeLeaf>;

// Relational columns.
pub const COL_ID: &str = "id";
pub const COL_GRAPH_ID: &str = "graph_id";
pub const COL_TYPE_ID: &str = "type_id";
pub const COL_CODE: &str = "code";
pub const COL_URI: &str = "uri";
pub const COL_NUMBER: &str = "number";
pub const COL_CREATED_DATE: &str = "created_date";
pub const COL_LAST_MODIFIED_DATE: &str = "last_modified_date";

// Index fields.
pub const FIELD_ID: &str = "id";
pub const FIELD_TYPE_ID: &str = "type.id";
pub const FIELD_GRAPH_ID: &str = "type.graph.id";
pub const FIELD_CODE: &str = "code";
pub const FIELD_URI: &str = "uri";
pub const FIELD_NUMBER: &str = "number";
pub const FIELD_CREATED_DATE: &str = "createdDate";
pub const FIELD_LAST_MODIFIED_DATE: &str = "lastModifiedDate";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "leaf", content = "args", rename_all = "snake_case")]
pub enum NodeLeaf {
    ById(Uuid),
    ByGraphId(Uuid),
    ByTypeId(String),
    ByCode(String),
    ByUri(String),
    ByNumber(i64),
    ByCreatedDate {
        lower: Option<NaiveDateTime>,
        upper: Option<NaiveDateTime>,
    },
    ByLastModifiedDate {
        lower: Option<NaiveDateTime>,
        upper: Option<NaiveDateTime>,
    },
    /// Exact property value. An empty `lang` matches values in any language.
    ByPropertyString {
        attr: String,
        lang: String,
        value: String,
    },
    ByPropertyStringPrefix {
        attr: String,
        lang: String,
        prefix: String,
    },
    ByPropertyStringRange {
        attr: String,
        lang: String,
        lower: Option<String>,
        upper: Option<String>,
    },
    /// Every word of `text` occurs among the words of the property's values.
    ByPropertyWords {
        attr: String,
        lang: String,
        text: String,
    },
    /// Some word of the property's values starts with `prefix` (case-folded).
    ByPropertyWordPrefix {
        attr: String,
        lang: String,
        prefix: String,
    },
    ByReference {
        attr: String,
        target: Uuid,
    },
    WithoutReferences {
        attr: String,
    },
    /// Some `attr` reference points at a node matching `path`. Unresolved, it
    /// tests false and compiles nowhere.
    ByReferencePath {
        attr: String,
        path: Box<NodeLeaf>,
    },
}

impl NodeLeaf {
    pub fn spec(self) -> NodeSpecification {
        Specification::Leaf(self)
    }
}

impl Leaf for NodeLeaf {
    type Key = NodeId;
    type Value = Node;

    fn test(&self, key: &NodeId, node: &Node) -> bool {
        match self {
            NodeLeaf::ById(id) => key.id == *id,
            NodeLeaf::ByGraphId(graph) => key.type_id.graph == *graph,
            NodeLeaf::ByTypeId(id) => key.type_id.id == *id,
            NodeLeaf::ByCode(code) => node.code.as_deref() == Some(code.as_str()),
            NodeLeaf::ByUri(uri) => node.uri.as_deref() == Some(uri.as_str()),
            NodeLeaf::ByNumber(n) => node.number == *n,
            NodeLeaf::ByCreatedDate { lower, upper } => {
                within(&node.created_date, lower.as_ref(), upper.as_ref())
            }
            NodeLeaf::ByLastModifiedDate { lower, upper } => {
                within(&node.last_modified_date, lower.as_ref(), upper.as_ref())
            }
            NodeLeaf::ByPropertyString { attr, lang, value } => {
                lang_values(node, attr, lang).any(|v| v == value.as_str())
            }
            NodeLeaf::ByPropertyStringPrefix { attr, lang, prefix } => {
                lang_values(node, attr, lang).any(|v| v.starts_with(prefix.as_str()))
            }
            NodeLeaf::ByPropertyStringRange {
                attr,
                lang,
                lower,
                upper,
            } => lang_values(node, attr, lang)
                .any(|v| within(v, lower.as_deref(), upper.as_deref())),
            NodeLeaf::ByPropertyWords { attr, lang, text } => {
                let wanted = tokenize(text);
                if wanted.is_empty() {
                    return false;
                }
                let present: Vec<String> = lang_values(node, attr, lang).flat_map(tokenize).collect();
                wanted.iter().all(|w| present.contains(w))
            }
            NodeLeaf::ByPropertyWordPrefix { attr, lang, prefix } => {
                let prefix = fold_case(prefix);
                lang_values(node, attr, lang)
                    .flat_map(tokenize)
                    .any(|w| w.starts_with(prefix.as_str()))
            }
            NodeLeaf::ByReference { attr, target } => {
                node.reference_values(attr).any(|r| r.id == *target)
            }
            NodeLeaf::WithoutReferences { attr } => node.reference_values(attr).next().is_none(),
            NodeLeaf::ByReferencePath { .. } => false,
        }
    }

    fn to_sql(&self) -> Option<SqlQuery> {
        let eq = |col: &str, value: SqlValue| SqlQuery::new(format!("{col} = ?"), vec![value]);
        // code and uri are nullable; keep NOT(...) two-valued
        let nullable_eq = |col: &str, value: SqlValue| {
            SqlQuery::new(format!("{col} IS NOT NULL AND {col} = ?"), vec![value])
        };
        Some(match self {
            NodeLeaf::ById(id) => eq(COL_ID, SqlValue::Uuid(*id)),
            NodeLeaf::ByGraphId(graph) => eq(COL_GRAPH_ID, SqlValue::Uuid(*graph)),
            NodeLeaf::ByTypeId(id) => eq(COL_TYPE_ID, SqlValue::Text(id.clone())),
            NodeLeaf::ByCode(code) => nullable_eq(COL_CODE, SqlValue::Text(code.clone())),
            NodeLeaf::ByUri(uri) => nullable_eq(COL_URI, SqlValue::Text(uri.clone())),
            NodeLeaf::ByNumber(n) => eq(COL_NUMBER, SqlValue::Integer(*n)),
            NodeLeaf::ByCreatedDate { lower, upper } => date_range_sql(COL_CREATED_DATE, lower, upper),
            NodeLeaf::ByLastModifiedDate { lower, upper } => {
                date_range_sql(COL_LAST_MODIFIED_DATE, lower, upper)
            }
            _ => return None,
        })
    }

    fn to_index_query(&self) -> Option<IndexQuery> {
        Some(match self {
            NodeLeaf::ByReferencePath { .. } => return None,
            NodeLeaf::ById(id) => IndexQuery::term(FIELD_ID, id.to_string()),
            NodeLeaf::ByGraphId(graph) => IndexQuery::term(FIELD_GRAPH_ID, graph.to_string()),
            NodeLeaf::ByTypeId(id) => IndexQuery::term(FIELD_TYPE_ID, id.clone()),
            NodeLeaf::ByCode(code) => IndexQuery::term(FIELD_CODE, code.clone()),
            NodeLeaf::ByUri(uri) => IndexQuery::term(FIELD_URI, uri.clone()),
            NodeLeaf::ByNumber(n) => IndexQuery::term(FIELD_NUMBER, n.to_string()),
            NodeLeaf::ByCreatedDate { lower, upper } => IndexQuery::range(
                FIELD_CREATED_DATE,
                lower.as_ref().map(date_term),
                upper.as_ref().map(date_term),
            ),
            NodeLeaf::ByLastModifiedDate { lower, upper } => IndexQuery::range(
                FIELD_LAST_MODIFIED_DATE,
                lower.as_ref().map(date_term),
                upper.as_ref().map(date_term),
            ),
            NodeLeaf::ByPropertyString { attr, lang, value } => {
                IndexQuery::term(property_string_field(attr, lang), value.clone())
            }
            NodeLeaf::ByPropertyStringPrefix { attr, lang, prefix } => {
                IndexQuery::prefix(property_string_field(attr, lang), prefix.clone())
            }
            NodeLeaf::ByPropertyStringRange {
                attr,
                lang,
                lower,
                upper,
            } => IndexQuery::range(property_string_field(attr, lang), lower.clone(), upper.clone()),
            NodeLeaf::ByPropertyWords { attr, lang, text } => {
                let field = property_words_field(attr, lang);
                IndexQuery::all_of(
                    tokenize(text)
                        .into_iter()
                        .map(|token| IndexQuery::term(field.clone(), token)),
                )
            }
            NodeLeaf::ByPropertyWordPrefix { attr, lang, prefix } => {
                IndexQuery::prefix(property_words_field(attr, lang), fold_case(prefix))
            }
            NodeLeaf::ByReference { attr, target } => {
                IndexQuery::term(reference_field(attr), target.to_string())
            }
            NodeLeaf::WithoutReferences { attr } => IndexQuery::boolean(vec![
                BooleanClause {
                    occur: Occur::Must,
                    query: IndexQuery::MatchAll,
                },
                BooleanClause {
                    occur: Occur::MustNot,
                    query: IndexQuery::exists(reference_field(attr)),
                },
            ]),
        })
    }

    fn supports(&self, backend: Backend) -> bool {
        match backend {
            Backend::Index => !matches!(self, NodeLeaf::ByReferencePath { .. }),
            Backend::Relational => matches!(
                self,
                NodeLeaf::ById(_)
                    | NodeLeaf::ByGraphId(_)
                    | NodeLeaf::ByTypeId(_)
                    | NodeLeaf::ByCode(_)
                    | NodeLeaf::ByUri(_)
                    | NodeLeaf::ByNumber(_)
                    | NodeLeaf::ByCreatedDate { .. }
                    | NodeLeaf::ByLastModifiedDate { .. }
            ),
        }
    }
}

fn within<T: PartialOrd + ?Sized>(value: &T, lower: Option<&T>, upper: Option<&T>) -> bool {
    lower.map_or(true, |l| l <= value) && upper.map_or(true, |u| value <= u)
}

fn fold_case(s: &str) -> String {
    s.chars().flat_map(char::to_lowercase).collect()
}

fn lang_values<'a>(node: &'a Node, attr: &str, lang: &'a str) -> impl Iterator<Item = &'a str> + 'a {
    node.property_values(attr)
        .filter(move |v| lang.is_empty() || v.lang == lang)
        .map(|v| v.value.as_str())
}

fn date_range_sql(
    col: &str,
    lower: &Option<NaiveDateTime>,
    upper: &Option<NaiveDateTime>,
) -> SqlQuery {
    let mut parts = Vec::new();
    let mut params = Vec::new();
    if let Some(l) = lower {
        parts.push(format!("{col} >= ?"));
        params.push(SqlValue::Timestamp(*l));
    }
    if let Some(u) = upper {
        parts.push(format!("{col} <= ?"));
        params.push(SqlValue::Timestamp(*u));
    }
    if parts.is_empty() {
        return SqlQuery::constant(TAUTOLOGY);
    }
    SqlQuery::new(parts.join(" AND "), params)
}

// =============================================================================
// Document layout
// =============================================================================

// chrono years lie in -262_144..=262_143.
const DATE_TERM_YEAR_OFFSET: i32 = 262_144;

/// Fixed-width timestamp so that term order equals time order. The year is
/// shifted to six unsigned digits, so `2024` is written `264168`.
pub fn date_term(date: &NaiveDateTime) -> String {
    format!(
        "{:06}{}",
        date.year() + DATE_TERM_YEAR_OFFSET,
        date.format("-%m-%dT%H:%M:%S%.9f")
    )
}

/// Whole values: `properties.<attr>.string[.<lang>]`.
pub fn property_string_field(attr: &str, lang: &str) -> String {
    property_field(attr, "string", lang)
}

/// Tokenized words: `properties.<attr>.words[.<lang>]`.
pub fn property_words_field(attr: &str, lang: &str) -> String {
    property_field(attr, "words", lang)
}

fn property_field(attr: &str, kind: &str, lang: &str) -> String {
    if lang.is_empty() {
        format!("properties.{attr}.{kind}")
    } else {
        format!("properties.{attr}.{kind}.{lang}")
    }
}

pub fn reference_field(attr: &str) -> String {
    format!("references.{attr}.id")
}

/// Column values of a node row, `None` for SQL NULL.
pub fn relational_row(key: &NodeId, node: &Node) -> Vec<(&'static str, Option<SqlValue>)> {
    vec![
        (COL_ID, Some(SqlValue::Uuid(key.id))),
        (COL_GRAPH_ID, Some(SqlValue::Uuid(key.type_id.graph))),
        (COL_TYPE_ID, Some(SqlValue::Text(key.type_id.id.clone()))),
        (COL_CODE, node.code.clone().map(SqlValue::Text)),
        (COL_URI, node.uri.clone().map(SqlValue::Text)),
        (COL_NUMBER, Some(SqlValue::Integer(node.number))),
        (COL_CREATED_DATE, Some(SqlValue::Timestamp(node.created_date))),
        (
            COL_LAST_MODIFIED_DATE,
            Some(SqlValue::Timestamp(node.last_modified_date)),
        ),
    ]
}

/// `(field, term)` pairs to index for a node.
pub fn index_document(key: &NodeId, node: &Node) -> Vec<(String, String)> {
    let mut doc = vec![
        (FIELD_ID.to_string(), key.id.to_string()),
        (FIELD_TYPE_ID.to_string(), key.type_id.id.clone()),
        (FIELD_GRAPH_ID.to_string(), key.type_id.graph.to_string()),
        (FIELD_NUMBER.to_string(), node.number.to_string()),
        (FIELD_CREATED_DATE.to_string(), date_term(&node.created_date)),
        (
            FIELD_LAST_MODIFIED_DATE.to_string(),
            date_term(&node.last_modified_date),
        ),
    ];
    if let Some(code) = &node.code {
        doc.push((FIELD_CODE.to_string(), code.clone()));
    }
    if let Some(uri) = &node.uri {
        doc.push((FIELD_URI.to_string(), uri.clone()));
    }

    for (attr, values) in &node.properties {
        for v in values {
            doc.push((property_string_field(attr, ""), v.value.clone()));
            let words = tokenize(&v.value);
            for w in &words {
                doc.push((property_words_field(attr, ""), w.clone()));
            }
            if !v.lang.is_empty() {
                doc.push((property_string_field(attr, &v.lang), v.value.clone()));
                for w in words {
                    doc.push((property_words_field(attr, &v.lang), w));
                }
            }
        }
    }

    for (attr, targets) in &node.references {
        for t in targets {
            doc.push((reference_field(attr), t.id.to_string()));
        }
    }
    doc
}

// =============================================================================
// Dependent leaves
// =============================================================================

/// Replace every [`NodeLeaf::ByReferencePath`] with the references it
/// resolves to.
///
/// `resolver` returns the nodes matching a path-free specification. Nested
/// paths resolve innermost first; a path matching no node becomes an empty
/// `Or`, which matches nothing.
pub fn resolve_reference_paths<F, E>(
    spec: &NodeSpecification,
    resolver: &mut F,
) -> Result<NodeSpecification, E>
where
    F: FnMut(&NodeSpecification) -> Result<Vec<NodeId>, E>,
{
    Ok(match spec {
        Specification::MatchAll => Specification::MatchAll,
        Specification::MatchNone => Specification::MatchNone,
        Specification::Leaf(leaf) => resolve_leaf(leaf, &mut *resolver)?,
        Specification::Not(inner) => {
            Specification::not(resolve_reference_paths(inner, &mut *resolver)?)
        }
        Specification::And(xs) => Specification::And(
            xs.iter()
                .map(|x| resolve_reference_paths(x, &mut *resolver))
                .collect::<Result<_, E>>()?,
        ),
        Specification::Or(xs) => Specification::Or(
            xs.iter()
                .map(|x| resolve_reference_paths(x, &mut *resolver))
                .collect::<Result<_, E>>()?,
        ),
    })
}

fn resolve_leaf<F, E>(leaf: &NodeLeaf, resolver: &mut F) -> Result<NodeSpecification, E>
where
    F: FnMut(&NodeSpecification) -> Result<Vec<NodeId>, E>,
{
    let NodeLeaf::ByReferencePath { attr, path } = leaf else {
        return Ok(Specification::Leaf(leaf.clone()));
    };
    let inner = resolve_leaf(path, &mut *resolver)?;
    let targets: BTreeSet<Uuid> = resolver(&inner)?.into_iter().map(|k| k.id).collect();
    Ok(Specification::or(targets.into_iter().map(|target| {
        NodeLeaf::ByReference {
            attr: attr.clone(),
            target,
        }
        .spec()
    })))
}

// =============================================================================
// Tokenizer
// =============================================================================

const MIN_WORD_LEN: usize = 2;
const STOPWORDS: &[&str] = &[
    "a", "an", "and", "as", "at", "by", "for", "in", "is", "of", "on", "or", "the", "to", "with",
];

/// Lowercased words of `text`, split on non-alphanumerics and camelCase
/// boundaries (`prefLabel` -> `pref`, `label`).
pub fn tokenize(text: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut prev_lower = false;

    for c in text.chars() {
        if !c.is_alphanumeric() {
            flush_word(&mut words, &mut current);
            prev_lower = false;
            continue;
        }
        if c.is_uppercase() && prev_lower {
            flush_word(&mut words, &mut current);
        }
        prev_lower = c.is_lowercase();
        current.extend(c.to_lowercase());
    }
    flush_word(&mut words, &mut current);
    words
}

fn flush_word(words: &mut Vec<String>, current: &mut String) {
    if current.chars().count() >= MIN_WORD_LEN && !STOPWORDS.contains(&current.as_str()) {
        words.push(std::mem::take(current));
    } else {
        current.clear();
    }
}

// =============================================================================
// Display (node-query syntax)
// =============================================================================

impl fmt::Display for NodeLeaf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeLeaf::ById(id) => write!(f, "id:{id}"),
            NodeLeaf::ByGraphId(graph) => write!(f, "graph.id:{graph}"),
            NodeLeaf::ByTypeId(id) => write!(f, "type.id:{id}"),
            NodeLeaf::ByCode(code) => write!(f, "code:{code}"),
            NodeLeaf::ByUri(uri) => write!(f, "uri:{uri}"),
            NodeLeaf::ByNumber(n) => write!(f, "number:{n}"),
            NodeLeaf::ByCreatedDate { lower, upper } => {
                write!(f, "createdDate:")?;
                write_date_range(f, lower, upper)
            }
            NodeLeaf::ByLastModifiedDate { lower, upper } => {
                write!(f, "lastModifiedDate:")?;
                write_date_range(f, lower, upper)
            }
            NodeLeaf::ByPropertyString { attr, lang, value } => {
                write!(f, "p.{}.string:{}", attr_path(attr, lang), quoted(value))
            }
            NodeLeaf::ByPropertyStringPrefix { attr, lang, prefix } => {
                write!(f, "p.{}.string:{}*", attr_path(attr, lang), quoted(prefix))
            }
            NodeLeaf::ByPropertyStringRange {
                attr,
                lang,
                lower,
                upper,
            } => write!(
                f,
                "p.{}.string:[{} TO {}]",
                attr_path(attr, lang),
                lower.as_deref().map(quoted).unwrap_or_else(|| "*".into()),
                upper.as_deref().map(quoted).unwrap_or_else(|| "*".into())
            ),
            NodeLeaf::ByPropertyWords { attr, lang, text } => {
                write!(f, "p.{}:{}", attr_path(attr, lang), quoted(text))
            }
            NodeLeaf::ByPropertyWordPrefix { attr, lang, prefix } => {
                write!(f, "p.{}:{}*", attr_path(attr, lang), quoted(prefix))
            }
            NodeLeaf::ByReference { attr, target } => write!(f, "r.{attr}.id:{target}"),
            NodeLeaf::WithoutReferences { attr } => write!(f, "r.{attr}.id:null"),
            NodeLeaf::ByReferencePath { attr, path } => write!(f, "r.{attr}.{path}"),
        }
    }
}

fn attr_path(attr: &str, lang: &str) -> String {
    if lang.is_empty() {
        attr.to_string()
    } else {
        format!("{attr}.{lang}")
    }
}

pub(crate) fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}

fn write_date_range(
    f: &mut fmt::Formatter<'_>,
    lower: &Option<NaiveDateTime>,
    upper: &Option<NaiveDateTime>,
) -> fmt::Result {
    let show = |d: &Option<NaiveDateTime>| match d {
        Some(d) => d.format("%Y-%m-%dT%H:%M:%S%.f").to_string(),
        None => "*".to_string(),
    };
    write!(f, "[{} TO {}]", show(lower), show(upper))
}
