//! WHERE sub-builder: `and`/`or`/`sql` combinators with `if()` skip support.

use super::{Builder, OrderByBuilder};
use crate::error::Result;
use crate::builder::Value;

/// Accumulates WHERE criteria, tracking whether anything has been written
/// yet so the first criterion omits its boolean operator.
pub struct WhereBuilder {
    inner: Builder,
    written: bool,
}

impl WhereBuilder {
    pub(super) fn new(inner: Builder, written: bool) -> Self {
        WhereBuilder { inner, written }
    }

    /// Sets the skip flag for the immediately following chained call.
    pub fn if_(&mut self, predicate: bool) -> &mut Self {
        self.inner.if_(predicate);
        self
    }

    /// Appends `criteria` prefixed with `AND` once something has already
    /// been written, or bare the first time. A no-op for empty criteria.
    pub fn and(&mut self, criteria: &str) -> &mut Self {
        self.sql("AND", criteria)
    }

    /// Appends `criteria` prefixed with `OR` once something has already
    /// been written, or bare the first time. A no-op for empty criteria.
    pub fn or(&mut self, criteria: &str) -> &mut Self {
        self.sql("OR", criteria)
    }

    /// Appends `criteria` prefixed with the given boolean `op`.
    pub fn sql(&mut self, op: &str, criteria: &str) -> &mut Self {
        if self.inner.skip_next {
            self.inner.skip_next = false;
            return self;
        }
        if criteria.is_empty() {
            return self;
        }
        if self.written {
            self.inner.stmt.push(' ');
            self.inner.stmt.push_str(op);
            self.inner.stmt.push(' ');
        } else {
            self.inner.stmt.push(' ');
        }
        self.inner.stmt.push_str(criteria);
        self.written = true;
        self
    }

    /// Binds a `{param}` value used by a criterion already appended.
    pub fn param(&mut self, name: &str, value: impl Into<Value>) -> &mut Self {
        self.inner.param(name, value);
        self
    }

    /// Starts an ORDER BY clause following this WHERE clause.
    pub fn order(self) -> OrderByBuilder {
        OrderByBuilder::new(self.inner)
    }

    /// Returns to the parent builder for further raw `sql`/`build` calls.
    pub fn end(self) -> Builder {
        self.inner
    }

    /// Renders the accumulated statement (delegates to the inner builder).
    pub fn build(&self) -> Result<(String, Vec<Value>)> {
        self.inner.build()
    }
}
