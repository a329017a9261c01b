//! The engine facade: one schema snapshot, one configuration, and the
//! compile/qualify/execute entry points built on them.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use termql_schema::{NodeId, SchemaIndex, SchemaProvider, TypeId};
use termql_select::{parse_selects, QualifiedSelect, SelectQualifier, SelectionPlan};
use termql_spec::{
    parse_node_query, resolve_reference_paths, to_cnf_bounded, to_dnf_bounded, Cnf, Dnf,
    IndexQuery, NodeLeaf, NodeSpecification, SqlQuery,
};

use crate::config::EngineConfig;
use crate::executor::{IndexExecutor, RelationalExecutor, SearchOptions};

/// Qualified projection plus its depth map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub selects: Vec<QualifiedSelect>,
    pub plan: SelectionPlan,
}

#[derive(Debug, Clone)]
pub struct QueryEngine {
    config: EngineConfig,
    schema: SchemaIndex,
}

impl QueryEngine {
    /// Snapshot the provider's schema.
    pub fn new(config: EngineConfig, provider: &dyn SchemaProvider) -> Result<Self> {
        let schema = SchemaIndex::from_provider(provider).context("loading schema snapshot")?;
        if config.schema.strict {
            schema.validate_strict().context("validating schema snapshot")?;
        }
        tracing::debug!(types = schema.len(), "schema snapshot indexed");
        Ok(Self::with_schema(config, schema))
    }

    pub fn with_schema(config: EngineConfig, schema: SchemaIndex) -> Self {
        Self { config, schema }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn schema(&self) -> &SchemaIndex {
        &self.schema
    }

    pub fn parse(&self, text: &str) -> Result<NodeSpecification> {
        Ok(parse_node_query(text)?)
    }

    pub fn compile_sql(&self, spec: &NodeSpecification) -> Result<SqlQuery> {
        Ok(spec.to_sql()?)
    }

    pub fn compile_index(&self, spec: &NodeSpecification) -> Result<IndexQuery> {
        Ok(spec.to_index_query()?)
    }

    pub fn normalize_cnf(&self, spec: &NodeSpecification) -> Result<Cnf<NodeLeaf>> {
        Ok(to_cnf_bounded(spec, self.config.normal_form.max_clauses)?)
    }

    pub fn normalize_dnf(&self, spec: &NodeSpecification) -> Result<Dnf<NodeLeaf>> {
        Ok(to_dnf_bounded(spec, self.config.normal_form.max_clauses)?)
    }

    /// Parse a projection and qualify it for nodes of the `domain` types.
    pub fn select(&self, text: &str, domain: &[TypeId]) -> Result<Selection> {
        let selects = parse_selects(text)?;
        let selects = SelectQualifier::new(&self.schema)
            .with_mode(self.config.select.mode)
            .qualify(domain, &selects);
        let plan = SelectionPlan::from_qualified(&selects);
        Ok(Selection { selects, plan })
    }

    pub fn find_relational(
        &self,
        executor: &dyn RelationalExecutor,
        spec: &NodeSpecification,
    ) -> Result<Vec<NodeId>> {
        let query = self.compile_sql(spec)?;
        tracing::trace!(%query, "relational find");
        executor
            .execute(&query)
            .with_context(|| format!("executing `{}`", query.template))
    }

    /// Resolve reference paths against `executor`, unlimited.
    pub fn resolve_indexed(
        &self,
        executor: &dyn IndexExecutor,
        spec: &NodeSpecification,
    ) -> Result<NodeSpecification> {
        resolve_reference_paths(spec, &mut |path: &NodeSpecification| -> Result<Vec<NodeId>> {
            let query = self.compile_index(path)?;
            let ids = executor
                .search(&query, &SearchOptions::default())
                .with_context(|| format!("resolving reference path `{path}`"))?;
            tracing::debug!(%path, targets = ids.len(), "reference path resolved");
            Ok(ids)
        })
    }

    /// Searches with the configured default limit unless `options` sets one.
    /// Reference paths are resolved first.
    pub fn find_indexed(
        &self,
        executor: &dyn IndexExecutor,
        spec: &NodeSpecification,
        options: &SearchOptions,
    ) -> Result<Vec<NodeId>> {
        let spec = self.resolve_indexed(executor, spec)?;
        let query = self.compile_index(&spec)?;
        let mut options = options.clone();
        options.limit.get_or_insert(self.config.index.default_limit);
        tracing::trace!(%query, limit = ?options.limit, "index find");
        executor
            .search(&query, &options)
            .with_context(|| format!("searching `{query}`"))
    }
}
