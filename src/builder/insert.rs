//! INSERT sub-builder.

use std::collections::HashMap;

use super::{Builder, BuilderOptions, Model, Value};

/// Accumulates an ordered column list and a column→value map for a single
/// `INSERT INTO` statement.
pub struct InsertBuilder {
    inner: Builder,
    table: String,
    columns: Vec<String>,
    values: HashMap<String, Value>,
}

impl InsertBuilder {
    pub(super) fn new(inner: Builder, table: &str) -> Self {
        InsertBuilder {
            inner,
            table: table.to_string(),
            columns: Vec::new(),
            values: HashMap::new(),
        }
    }

    /// Appends a single column/value pair, preserving insertion order.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> &mut Self {
        if !self.values.contains_key(name) {
            self.columns.push(name.to_string());
        }
        self.values.insert(name.to_string(), value.into());
        self
    }

    /// Appends one column per field yielded by `model.columns()`.
    pub fn set_model(&mut self, model: &dyn Model) -> &mut Self {
        for (name, value) in model.columns() {
            self.set(name, value);
        }
        self
    }

    /// Appends one column per entry of `m`, ordered by `opts.columns` when
    /// given, otherwise sorted lexicographically by key.
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

    /// Renders `INSERT INTO <q>t<q> (c1, ...) VALUES ({c1}, ...)` into the
    /// parent builder, registers each value as a param, and returns it.
    pub fn end(mut self) -> Builder {
        let q = self.inner_quote();
        let quoted_cols: Vec<String> = self
            .columns
            .iter()
            .map(|c| format!("{q}{c}{q}"))
            .collect();
        let placeholders: Vec<String> = self.columns.iter().map(|c| format!("{{{c}}}")).collect();

        self.inner.stmt.push_str(&format!(
            "INSERT INTO {q}{table}{q} ({cols}) VALUES ({vals})",
            table = self.table,
            cols = quoted_cols.join(", "),
            vals = placeholders.join(", "),
        ));

        for col in &self.columns {
            let v = self.values.remove(col).unwrap();
            self.inner.param(col, v);
        }

        self.inner
    }

    fn inner_quote(&self) -> char {
        self.inner.quote
    }
}
