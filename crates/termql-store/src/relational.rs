//! In-memory relational executor.
//!
//! Evaluates compiled WHERE-clause templates over node rows so that compiled
//! queries can be checked against in-memory `test` evaluation. The template is
//! parsed with `sqlparser` as `SELECT * FROM node WHERE <template>`, `?`
//! placeholders are bound to parameters in textual order, and the condition is
//! evaluated with SQL's three-valued logic (a row matches only when the
//! condition is TRUE).
//!
//! Supported: `AND`, `OR`, `NOT`, parentheses, `IS [NOT] NULL`, comparisons
//! (`=`, `<>`, `<`, `<=`, `>`, `>=`) between columns, placeholders, integer
//! and string literals, and `NULL`.

use anyhow::{anyhow, bail, Context, Result};
use parking_lot::RwLock;
use sqlparser::ast::{BinaryOperator, Expr, SetExpr, Statement, UnaryOperator, Value};
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;
use std::cmp::Ordering;

use termql_schema::{Node, NodeId};
use termql_spec::{relational_row, SqlQuery, SqlValue};

use crate::executor::RelationalExecutor;

pub const TABLE: &str = "node";

type Row = Vec<(&'static str, Option<SqlValue>)>;

#[derive(Debug, Default)]
pub struct MemoryRelationalStore {
    rows: RwLock<Vec<(NodeId, Row)>>,
}

impl MemoryRelationalStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_nodes<'a>(nodes: impl IntoIterator<Item = &'a Node>) -> Self {
        let store = Self::new();
        for n in nodes {
            store.insert(n);
        }
        store
    }

    /// Insert or replace the row keyed by the node's id and type.
    pub fn insert(&self, node: &Node) {
        let key = node.key();
        let row = relational_row(&key, node);
        let mut rows = self.rows.write();
        match rows.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = row,
            None => rows.push((key, row)),
        }
    }

    pub fn remove(&self, key: &NodeId) -> bool {
        let mut rows = self.rows.write();
        let before = rows.len();
        rows.retain(|(k, _)| k != key);
        rows.len() != before
    }

    pub fn len(&self) -> usize {
        self.rows.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.read().is_empty()
    }
}

impl RelationalExecutor for MemoryRelationalStore {
    fn execute(&self, query: &SqlQuery) -> Result<Vec<NodeId>> {
        let condition = Condition::compile(query)?;
        let rows = self.rows.read();
        let mut out = Vec::new();
        for (key, row) in rows.iter() {
            if condition.eval(row)? == Some(true) {
                out.push(key.clone());
            }
        }
        tracing::debug!(
            template = %query.template,
            params = query.params.len(),
            rows = rows.len(),
            matched = out.len(),
            "relational query"
        );
        Ok(out)
    }
}

// =============================================================================
// Condition tree
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
enum Condition {
    Const(Option<bool>),
    And(Box<Condition>, Box<Condition>),
    Or(Box<Condition>, Box<Condition>),
    Not(Box<Condition>),
    IsNull(Operand),
    Compare(Operand, BinaryOperator, Operand),
}

#[derive(Debug, Clone, PartialEq)]
enum Operand {
    Column(String),
    Value(Option<SqlValue>),
}

impl Condition {
    fn compile(query: &SqlQuery) -> Result<Self> {
        let sql = format!("SELECT * FROM {TABLE} WHERE {}", query.template);
        let statements = Parser::parse_sql(&GenericDialect {}, &sql)
            .with_context(|| format!("parsing template `{}`", query.template))?;
        let [Statement::Query(q)] = statements.as_slice() else {
            bail!("template `{}` is not a single condition", query.template);
        };
        let SetExpr::Select(select) = q.body.as_ref() else {
            bail!("template `{}` is not a single condition", query.template);
        };
        let selection = select
            .selection
            .as_ref()
            .ok_or_else(|| anyhow!("template `{}` has no condition", query.template))?;

        let mut binder = Binder {
            params: &query.params,
            next: 0,
        };
        let condition = binder.condition(selection)?;
        if binder.next != query.params.len() {
            bail!(
                "template `{}` has {} placeholders but {} parameters",
                query.template,
                binder.next,
                query.params.len()
            );
        }
        Ok(condition)
    }

    /// Kleene logic; `None` is UNKNOWN.
    fn eval(&self, row: &Row) -> Result<Option<bool>> {
        Ok(match self {
            Condition::Const(b) => *b,
            Condition::And(l, r) => match (l.eval(row)?, r.eval(row)?) {
                (Some(false), _) | (_, Some(false)) => Some(false),
                (Some(true), Some(true)) => Some(true),
                _ => None,
            },
            Condition::Or(l, r) => match (l.eval(row)?, r.eval(row)?) {
                (Some(true), _) | (_, Some(true)) => Some(true),
                (Some(false), Some(false)) => Some(false),
                _ => None,
            },
            Condition::Not(c) => c.eval(row)?.map(|b| !b),
            Condition::IsNull(o) => Some(o.value(row)?.is_none()),
            Condition::Compare(l, op, r) => {
                let (Some(a), Some(b)) = (l.value(row)?, r.value(row)?) else {
                    return Ok(None);
                };
                let ord = compare(a, b)?;
                Some(match op {
                    BinaryOperator::Eq => ord == Ordering::Equal,
                    BinaryOperator::NotEq => ord != Ordering::Equal,
                    BinaryOperator::Lt => ord == Ordering::Less,
                    BinaryOperator::LtEq => ord != Ordering::Greater,
                    BinaryOperator::Gt => ord == Ordering::Greater,
                    BinaryOperator::GtEq => ord != Ordering::Less,
                    other => bail!("unsupported comparison `{other}`"),
                })
            }
        })
    }
}

impl Operand {
    fn value<'a>(&'a self, row: &'a Row) -> Result<Option<&'a SqlValue>> {
        match self {
            Operand::Value(v) => Ok(v.as_ref()),
            Operand::Column(name) => row
                .iter()
                .find(|(c, _)| c.eq_ignore_ascii_case(name))
                .map(|(_, v)| v.as_ref())
                .ok_or_else(|| anyhow!("unknown column `{name}` in table `{TABLE}`")),
        }
    }
}

fn compare(a: &SqlValue, b: &SqlValue) -> Result<Ordering> {
    Ok(match (a, b) {
        (SqlValue::Integer(x), SqlValue::Integer(y)) => x.cmp(y),
        (SqlValue::Text(x), SqlValue::Text(y)) => x.cmp(y),
        (SqlValue::Uuid(x), SqlValue::Uuid(y)) => x.cmp(y),
        (SqlValue::Timestamp(x), SqlValue::Timestamp(y)) => x.cmp(y),
        _ => bail!("cannot compare {a} with {b}"),
    })
}

/// Walks the parsed expression left to right, so placeholders are bound in
/// the order they appear in the template.
struct Binder<'q> {
    params: &'q [SqlValue],
    next: usize,
}

impl Binder<'_> {
    fn condition(&mut self, expr: &Expr) -> Result<Condition> {
        Ok(match expr {
            Expr::Nested(inner) => self.condition(inner)?,
            Expr::UnaryOp {
                op: UnaryOperator::Not,
                expr,
            } => Condition::Not(Box::new(self.condition(expr)?)),
            Expr::IsNull(e) => Condition::IsNull(self.operand(e)?),
            Expr::IsNotNull(e) => Condition::Not(Box::new(Condition::IsNull(self.operand(e)?))),
            Expr::Value(Value::Boolean(b)) => Condition::Const(Some(*b)),
            Expr::Value(Value::Null) => Condition::Const(None),
            Expr::BinaryOp { left, op, right } => match op {
                BinaryOperator::And => {
                    let l = self.condition(left)?;
                    Condition::And(Box::new(l), Box::new(self.condition(right)?))
                }
                BinaryOperator::Or => {
                    let l = self.condition(left)?;
                    Condition::Or(Box::new(l), Box::new(self.condition(right)?))
                }
                BinaryOperator::Eq
                | BinaryOperator::NotEq
                | BinaryOperator::Lt
                | BinaryOperator::LtEq
                | BinaryOperator::Gt
                | BinaryOperator::GtEq => {
                    let l = self.operand(left)?;
                    Condition::Compare(l, op.clone(), self.operand(right)?)
                }
                other => bail!("unsupported operator `{other}`"),
            },
            other => bail!("unsupported condition `{other}`"),
        })
    }

    fn operand(&mut self, expr: &Expr) -> Result<Operand> {
        Ok(match expr {
            Expr::Nested(inner) => self.operand(inner)?,
            Expr::Identifier(ident) => Operand::Column(ident.value.clone()),
            Expr::Value(Value::Placeholder(p)) if p == "?" => {
                let value = self.params.get(self.next).cloned().ok_or_else(|| {
                    anyhow!("placeholder {} has no parameter", self.next + 1)
                })?;
                self.next += 1;
                Operand::Value(Some(value))
            }
            Expr::Value(Value::Number(n, _)) => Operand::Value(Some(SqlValue::Integer(
                n.parse().with_context(|| format!("integer literal `{n}`"))?,
            ))),
            Expr::Value(Value::SingleQuotedString(s)) => Operand::Value(Some(SqlValue::Text(s.clone()))),
            Expr::Value(Value::Null) => Operand::Value(None),
            other => bail!("unsupported operand `{other}`"),
        })
    }
}
