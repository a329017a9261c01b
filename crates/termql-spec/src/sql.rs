//! Relational compilation: a WHERE-clause template with positional `?`
//! placeholders plus the parameter vector that binds them.
//!
//! Fragment text and parameters are appended in the same loop, child by
//! child, so the i-th `?` in the template is always bound to `params[i]`.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::spec::{Backend, CompileError, Leaf, Specification};

pub const TAUTOLOGY: &str = "1 = 1";
pub const CONTRADICTION: &str = "1 = 0";

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum SqlValue {
    Uuid(Uuid),
    Text(String),
    Integer(i64),
    Timestamp(NaiveDateTime),
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlValue::Uuid(u) => write!(f, "'{u}'"),
            SqlValue::Text(s) => write!(f, "'{}'", s.replace('\'', "''")),
            SqlValue::Integer(n) => write!(f, "{n}"),
            SqlValue::Timestamp(t) => write!(f, "'{}'", t.format("%Y-%m-%d %H:%M:%S%.f")),
        }
    }
}

/// A parameterized WHERE-clause.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SqlQuery {
    pub template: String,
    pub params: Vec<SqlValue>,
}

impl SqlQuery {
    pub fn new(template: impl Into<String>, params: Vec<SqlValue>) -> Self {
        Self {
            template: template.into(),
            params,
        }
    }

    pub fn constant(template: &str) -> Self {
        Self::new(template, Vec::new())
    }

    /// Number of `?` placeholders outside of quoted literals.
    pub fn placeholder_count(&self) -> usize {
        let mut in_quote = false;
        let mut count = 0;
        for c in self.template.chars() {
            match c {
                '\'' => in_quote = !in_quote,
                '?' if !in_quote => count += 1,
                _ => {}
            }
        }
        count
    }
}

impl fmt::Display for SqlQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.template)?;
        if !self.params.is_empty() {
            write!(f, " -- [")?;
            for (i, p) in self.params.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{p}")?;
            }
            write!(f, "]")?;
        }
        Ok(())
    }
}

impl<L: Leaf> Specification<L> {
    /// Compile to a relational WHERE-clause.
    ///
    /// Fails with [`CompileError::Unsupported`] naming the first leaf (in
    /// left-to-right order) that has no relational form.
    pub fn to_sql(&self) -> Result<SqlQuery, CompileError> {
        if let Some(leaf) = self.first_unsupported(Backend::Relational) {
            return Err(Self::unsupported(leaf, Backend::Relational));
        }
        let mut out = SqlQuery::constant("");
        self.write_sql(&mut out)?;
        Ok(out)
    }

    fn write_sql(&self, out: &mut SqlQuery) -> Result<(), CompileError> {
        match self {
            Specification::MatchAll => out.template.push_str(TAUTOLOGY),
            Specification::MatchNone => out.template.push_str(CONTRADICTION),
            Specification::Leaf(l) => {
                let q = l
                    .to_sql()
                    .ok_or_else(|| Self::unsupported(l, Backend::Relational))?;
                out.template.push_str(&q.template);
                out.params.extend(q.params);
            }
            Specification::Not(inner) => {
                out.template.push_str("NOT (");
                inner.write_sql(out)?;
                out.template.push(')');
            }
            Specification::And(xs) => write_joined(out, xs, " AND ")?,
            Specification::Or(xs) => write_joined(out, xs, " OR ")?,
        }
        Ok(())
    }
}

fn write_joined<L: Leaf>(
    out: &mut SqlQuery,
    xs: &[Specification<L>],
    sep: &str,
) -> Result<(), CompileError> {
    if xs.is_empty() {
        out.template.push_str(CONTRADICTION);
        return Ok(());
    }
    for (i, x) in xs.iter().enumerate() {
        if i > 0 {
            out.template.push_str(sep);
        }
        out.template.push('(');
        x.write_sql(out)?;
        out.template.push(')');
    }
    Ok(())
}
