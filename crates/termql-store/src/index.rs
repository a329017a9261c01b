//! In-memory inverted index executor.
//!
//! Layout: `field -> term -> {doc ids}` with terms kept ordered so prefix and
//! range queries are ordered scans. Documents are the `(field, term)` pairs
//! produced by [`termql_spec::index_document`]. Doc ids are dense `u32`s and
//! are never reused; replacing a node retires its old doc id.
//!
//! Boolean queries follow Lucene:
//! - no clauses: nothing matches,
//! - only MUST_NOT clauses: nothing matches,
//! - MUST clauses present: their intersection (SHOULD clauses only affect
//!   scoring, which this index does not do),
//! - otherwise: the union of the SHOULD clauses,
//! - MUST_NOT hits are removed last.

use ahash::AHashMap;
use anyhow::{anyhow, Result};
use parking_lot::RwLock;
use roaring::RoaringBitmap;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::ops::Bound;

use termql_schema::{Node, NodeId};
use termql_spec::{index_document, BooleanClause, IndexQuery, Occur};

use crate::executor::{IndexExecutor, SearchOptions, SortField};

type Postings = BTreeMap<String, RoaringBitmap>;

#[derive(Debug, Default)]
struct IndexState {
    keys: Vec<NodeId>,
    documents: Vec<Vec<(String, String)>>,
    live_by_key: AHashMap<NodeId, u32>,
    fields: AHashMap<String, Postings>,
    live: RoaringBitmap,
}

#[derive(Debug, Default)]
pub struct MemoryIndex {
    state: RwLock<IndexState>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_nodes<'a>(nodes: impl IntoIterator<Item = &'a Node>) -> Result<Self> {
        let index = Self::new();
        for n in nodes {
            index.insert(n)?;
        }
        Ok(index)
    }

    /// Index (or re-index) a node.
    pub fn insert(&self, node: &Node) -> Result<()> {
        let key = node.key();
        let doc = index_document(&key, node);
        let mut state = self.state.write();
        state.retire(&key);

        let doc_id = u32::try_from(state.keys.len())
            .map_err(|_| anyhow!("index is full ({} documents)", state.keys.len()))?;
        for (field, term) in &doc {
            state
                .fields
                .entry(field.clone())
                .or_default()
                .entry(term.clone())
                .or_default()
                .insert(doc_id);
        }
        state.keys.push(key.clone());
        state.documents.push(doc);
        state.live_by_key.insert(key, doc_id);
        state.live.insert(doc_id);
        Ok(())
    }

    pub fn remove(&self, key: &NodeId) -> bool {
        self.state.write().retire(key)
    }

    pub fn len(&self) -> usize {
        self.state.read().live.len() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().live.is_empty()
    }
}

impl IndexExecutor for MemoryIndex {
    fn search(&self, query: &IndexQuery, options: &SearchOptions) -> Result<Vec<NodeId>> {
        let state = self.state.read();
        let hits = state.eval(query);
        let total = hits.len();

        let mut docs: Vec<u32> = hits.iter().collect();
        if let Some(sort) = &options.sort {
            docs.sort_by(|a, b| state.compare(*a, *b, sort));
        }
        if let Some(limit) = options.limit {
            docs.truncate(limit);
        }

        tracing::debug!(query = %query, total, returned = docs.len(), "index search");
        Ok(docs
            .into_iter()
            .map(|d| state.keys[d as usize].clone())
            .collect())
    }
}

impl IndexState {
    fn retire(&mut self, key: &NodeId) -> bool {
        let Some(doc_id) = self.live_by_key.remove(key) else {
            return false;
        };
        let doc = std::mem::take(&mut self.documents[doc_id as usize]);
        for (field, term) in doc {
            if let Some(postings) = self.fields.get_mut(&field) {
                if let Some(bm) = postings.get_mut(&term) {
                    bm.remove(doc_id);
                    if bm.is_empty() {
                        postings.remove(&term);
                    }
                }
            }
        }
        self.live.remove(doc_id);
        true
    }

    fn eval(&self, query: &IndexQuery) -> RoaringBitmap {
        match query {
            IndexQuery::MatchAll => self.live.clone(),
            IndexQuery::Term { field, value } => self
                .fields
                .get(field)
                .and_then(|p| p.get(value))
                .cloned()
                .unwrap_or_default(),
            IndexQuery::Prefix { field, prefix } => {
                let Some(p) = self.fields.get(field) else {
                    return RoaringBitmap::new();
                };
                union(
                    p.range::<str, _>((Bound::Included(prefix.as_str()), Bound::Unbounded))
                        .take_while(|(t, _)| t.starts_with(prefix.as_str()))
                        .map(|(_, bm)| bm),
                )
            }
            IndexQuery::Range {
                field,
                lower,
                upper,
            } => {
                let Some(p) = self.fields.get(field) else {
                    return RoaringBitmap::new();
                };
                if let (Some(l), Some(u)) = (lower, upper) {
                    if l > u {
                        return RoaringBitmap::new();
                    }
                }
                let bounds = (
                    lower.as_deref().map_or(Bound::Unbounded, Bound::Included),
                    upper.as_deref().map_or(Bound::Unbounded, Bound::Included),
                );
                union(p.range::<str, _>(bounds).map(|(_, bm)| bm))
            }
            IndexQuery::Exists { field } => self
                .fields
                .get(field)
                .map(|p| union(p.values()))
                .unwrap_or_default(),
            IndexQuery::Boolean { clauses } => self.eval_boolean(clauses),
        }
    }

    fn eval_boolean(&self, clauses: &[BooleanClause]) -> RoaringBitmap {
        let mut must: Option<RoaringBitmap> = None;
        let mut should: Option<RoaringBitmap> = None;
        let mut must_not = RoaringBitmap::new();
        for c in clauses {
            let hits = self.eval(&c.query);
            match c.occur {
                Occur::Must => {
                    must = Some(match must {
                        None => hits,
                        Some(mut acc) => {
                            acc &= hits;
                            acc
                        }
                    })
                }
                Occur::Should => {
                    should = Some(match should {
                        None => hits,
                        Some(mut acc) => {
                            acc |= hits;
                            acc
                        }
                    })
                }
                Occur::MustNot => must_not |= hits,
            }
        }
        let Some(mut out) = must.or(should) else {
            return RoaringBitmap::new();
        };
        out -= must_not;
        out
    }

    /// Orders by the smallest term of the field; documents without the field
    /// sort last in either direction, ties keep insertion order.
    fn compare(&self, a: u32, b: u32, sort: &SortField) -> Ordering {
        let ka = self.sort_key(a, &sort.field);
        let kb = self.sort_key(b, &sort.field);
        let ord = match (ka, kb) {
            (Some(x), Some(y)) if sort.descending => y.cmp(x),
            (Some(x), Some(y)) => x.cmp(y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        ord.then(a.cmp(&b))
    }

    fn sort_key(&self, doc: u32, field: &str) -> Option<&str> {
        self.documents[doc as usize]
            .iter()
            .filter(|(f, _)| f == field)
            .map(|(_, t)| t.as_str())
            .min()
    }
}

fn union<'a>(bitmaps: impl Iterator<Item = &'a RoaringBitmap>) -> RoaringBitmap {
    let mut out = RoaringBitmap::new();
    for bm in bitmaps {
        out |= bm;
    }
    out
}
