//! UPDATE sub-builder.

use std::collections::HashMap;

use super::{where_::WhereBuilder, Builder, BuilderOptions, Model, Value};

/// Accumulates `<q>name<q>={name}` assignments for an `UPDATE ... SET`
/// statement already opened in the parent builder.
pub struct UpdateBuilder {
    inner: Builder,
    written: bool,
}

impl UpdateBuilder {
    pub(super) fn new(inner: Builder) -> Self {
        UpdateBuilder {
            inner,
            written: false,
        }
    }

    /// Appends `<q>name<q>={name}`, comma-separating after the first call,
    /// and registers `value` as the bound param.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> &mut Self {
        if self.written {
            self.inner.stmt.push_str(", ");
        }
        let q = self.inner.quote;
        self.inner.stmt.push_str(&format!("{q}{name}{q}={{{name}}}"));
        self.inner.param(name, value);
        self.written = true;
        self
    }

    /// Appends `raw` verbatim (no param registered), comma-separated.
    pub fn set_expr(&mut self, raw: &str) -> &mut Self {
        if self.written {
            self.inner.stmt.push_str(", ");
        }
        self.inner.stmt.push_str(raw);
        self.written = true;
        self
    }

    /// Appends one assignment per field yielded by `model.columns()`.
    pub fn set_model(&mut self, model: &dyn Model) -> &mut Self {
        for (name, value) in model.columns() {
            self.set(name, value);
        }
        self
    }

    /// Appends one assignment per entry of `m`, ordered by `opts.columns`
    /// when given, otherwise sorted lexicographically by key.
    pub fn set_map(&mut self, m: HashMap<String, Value>, opts: &BuilderOptions) -> &mut Self {
        match &opts.columns {
            Some(order) => {
                for name in order {
                    if let Some(v) = m.get(name) {
                        self.set(name, v.clone());
                    }
                }
            }
            None => {
                let mut keys: Vec<&String> = m.keys().collect();
                keys.sort();
                for name in keys {
                    self.set(name, m[name].clone());
                }
            }
        }
        self
    }

    /// Emits ` WHERE` and returns a [`WhereBuilder`] for the update's
    /// conditions.
    pub fn where_(self, criteria: &[&str]) -> WhereBuilder {
        self.inner.where_(criteria)
    }

    /// Returns to the parent builder for further raw `sql`/`build` calls.
    pub fn end(self) -> Builder {
        self.inner
    }
}
