//! Fluent SQL builder: tokenized templates with input substitution and
//! positional parameter binding.

mod insert;
mod orderby;
mod update;
mod value;
mod where_;

pub use insert::InsertBuilder;
pub use orderby::OrderByBuilder;
pub use update::UpdateBuilder;
pub use value::Value;
pub use where_::WhereBuilder;

/// Implemented by record types that can be decomposed into `(column, value)`
/// pairs for `InsertBuilder::set_model` / `UpdateBuilder::set_model`.
///
/// This is the Rust stand-in for the source's runtime struct-field
/// reflection: rather than walking fields at runtime, a type opts in by
/// listing its own columns, honoring whatever `db:"name"` / `db:"-"`
/// convention it wants at the call site.
pub trait Model {
    /// Returns this record's bindable columns in declaration order.
    fn columns(&self) -> Vec<(&'static str, Value)>;
}

/// Options governing `set_map`/allow-list behavior shared by the insert and
/// update sub-builders.
#[derive(Default, Clone)]
pub struct BuilderOptions {
    /// Explicit column order; when absent, map keys are sorted lexically.
    pub columns: Option<Vec<String>>,
}

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::shardid::Id;
use crate::token::{self, Token};

/// A placeholder-rendering function: given a parameter name and its
/// 1-based positional index, returns the driver-specific placeholder text.
pub type Parameterizer = Arc<dyn Fn(&str, usize) -> String + Send + Sync>;

fn mysql_placeholder(_name: &str, _index: usize) -> String {
    "?".to_string()
}

fn postgres_placeholder(_name: &str, index: usize) -> String {
    format!("${index}")
}

fn oracle_placeholder(name: &str, _index: usize) -> String {
    format!(":{name}")
}

/// Fluent builder accumulating a SQL template plus its input/param bindings.
///
/// Renders via [`Builder::build`], which replays the accumulated buffer
/// through the [`token`] module once: `Text` tokens copy verbatim, `Input`
/// tokens expand to their mapped string (empty if unmapped — the tolerant
/// behavior spelled out as the chosen default), and `Param` tokens render a
/// driver placeholder and push the bound value onto the positional args
/// list in left-to-right order.
#[derive(Clone)]
pub struct Builder {
    stmt: String,
    inputs: HashMap<String, String>,
    params: HashMap<String, Value>,
    skip_next: bool,
    quote: char,
    parameterize: Parameterizer,
}

impl Default for Builder {
    fn default() -> Self {
        Self::new(&[])
    }
}

impl Builder {
    /// Creates a builder, joining `chunks` with single spaces as the
    /// initial buffer contents.
    pub fn new(chunks: &[&str]) -> Self {
        Builder {
            stmt: chunks.join(" "),
            inputs: HashMap::new(),
            params: HashMap::new(),
            skip_next: false,
            quote: '`',
            parameterize: Arc::new(mysql_placeholder),
        }
    }

    /// Switches this builder to Postgres's `$i` placeholder dialect.
    pub fn use_postgres(mut self) -> Self {
        self.parameterize = Arc::new(postgres_placeholder);
        self
    }

    /// Switches this builder to MySQL's `?` placeholder dialect (the
    /// default).
    pub fn use_mysql(mut self) -> Self {
        self.parameterize = Arc::new(mysql_placeholder);
        self
    }

    /// Switches this builder to Oracle's `:name` placeholder dialect.
    pub fn use_oracle(mut self) -> Self {
        self.parameterize = Arc::new(oracle_placeholder);
        self
    }

    /// Overrides the identifier quote character (default `` ` ``).
    pub fn with_quote(mut self, quote: char) -> Self {
        self.quote = quote;
        self
    }

    fn quoted(&self, ident: &str) -> String {
        format!("{q}{ident}{q}", q = self.quote)
    }

    /// Appends `s` to the buffer unless the previous `if()` call cleared
    /// this one's turn, in which case the flag is consumed and nothing is
    /// written.
    pub fn sql(&mut self, s: &str) -> &mut Self {
        if self.skip_next {
            self.skip_next = false;
            return self;
        }
        self.stmt.push_str(s);
        self
    }

    /// Sets the skip flag for the immediately following chained call.
    pub fn if_(&mut self, predicate: bool) -> &mut Self {
        self.skip_next = !predicate;
        self
    }

    /// Inserts or overwrites an `<input>` binding.
    pub fn input(&mut self, name: &str, value: impl Into<String>) -> &mut Self {
        self.inputs.insert(name.to_string(), value.into());
        self
    }

    /// Inserts or overwrites a `{param}` binding.
    pub fn param(&mut self, name: &str, value: impl Into<Value>) -> &mut Self {
        self.params.insert(name.to_string(), value.into());
        self
    }

    /// Sets the `rotate` input to `id`'s rotated table suffix.
    pub fn on(&mut self, id: &Id) -> &mut Self {
        self.input("rotate", id.rotated_suffix())
    }

    /// Emits `SELECT <cols|*> FROM <q>table<q>`. A column expression
    /// containing `(`, a space, or the substring `as` is passed through
    /// unquoted (it is already a computed expression, not a bare name).
    pub fn select(&mut self, table: &str, cols: &[&str]) -> &mut Self {
        let rendered_cols = if cols.is_empty() {
            "*".to_string()
        } else {
            cols.iter()
                .map(|c| self.render_column(c))
                .collect::<Vec<_>>()
                .join(", ")
        };
        let q = self.quoted(table);
        self.sql(&format!("SELECT {rendered_cols} FROM {q}"))
    }

    fn render_column(&self, col: &str) -> String {
        if col.contains('(') || col.contains(' ') || col.to_lowercase().contains("as") {
            col.to_string()
        } else {
            self.quoted(col)
        }
    }

    /// Starts an `INSERT INTO <q>table<q>` sub-builder.
    pub fn insert(self, table: &str) -> InsertBuilder {
        InsertBuilder::new(self, table)
    }

    /// Starts an `UPDATE <q>table<q> SET` sub-builder.
    pub fn update(mut self, table: &str) -> UpdateBuilder {
        let q = self.quoted(table);
        self.stmt.push_str(&format!("UPDATE {q} SET "));
        UpdateBuilder::new(self)
    }

    /// Emits `DELETE FROM <q>table<q>`.
    pub fn delete(&mut self, table: &str) -> &mut Self {
        let q = self.quoted(table);
        self.sql(&format!("DELETE FROM {q}"))
    }

    /// Emits ` WHERE` followed by each non-empty criterion, space
    /// separated, and returns a [`WhereBuilder`] for further conditions.
    pub fn where_(mut self, criteria: &[&str]) -> WhereBuilder {
        let joined: Vec<&str> = criteria.iter().copied().filter(|c| !c.is_empty()).collect();
        if !joined.is_empty() {
            self.stmt.push_str(" WHERE ");
            self.stmt.push_str(&joined.join(" "));
        }
        WhereBuilder::new(self, !joined.is_empty())
    }

    /// Starts an [`OrderByBuilder`] against this statement's allow-list-free
    /// defaults; use [`OrderByBuilder::with_allow`] to scope it.
    pub fn order(self) -> OrderByBuilder {
        OrderByBuilder::new(self)
    }

    /// Replays the accumulated buffer through the tokenizer and renders the
    /// final SQL string plus its positional argument list.
    pub fn build(&self) -> Result<(String, Vec<Value>)> {
        let tokens = token::tokenize(&self.stmt);
        let mut sql = String::new();
        let mut args = Vec::new();
        let mut index = 0usize;

        for tok in tokens.iter() {
            match tok {
                Token::Text(t) => sql.push_str(t),
                Token::Input(name) => {
                    if let Some(v) = self.inputs.get(name) {
                        sql.push_str(v);
                    }
                }
                Token::Param(name) => {
                    let value = self
                        .params
                        .get(name)
                        .ok_or_else(|| Error::InvalidParam(name.clone()))?;
                    index += 1;
                    sql.push_str(&(self.parameterize)(name, index));
                    args.push(value.clone());
                }
            }
        }

        Ok((sql, args))
    }

    /// Returns the raw, un-tokenized buffer contents (for debugging/tests).
    pub fn raw(&self) -> &str {
        &self.stmt
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_composition_example() {
        let mut b = Builder::new(&[
            "SELECT * FROM orders_<yyyy>",
            "LEFT JOIN users_<dbid> ON users_<dbid>.id=orders.user_id",
        ]);
        b.input("yyyy", "2024").input("dbid", "db2");
        let mut w = Builder::new(&[b.raw()]);
        w.input("yyyy", "2024").input("dbid", "db2");
        w.sql(" WHERE users_<dbid>.id={user_id} AND orders.status={s}");
        w.param("user_id", "u1").param("s", 1i64);

        let (sql, args) = w.build().unwrap();
        assert_eq!(
            sql,
            "SELECT * FROM orders_2024 LEFT JOIN users_db2 ON users_db2.id=orders.user_id WHERE users_db2.id=? AND orders.status=?"
        );
        assert_eq!(args, vec![Value::Text("u1".to_string()), Value::Int(1)]);
    }

    #[test]
    fn missing_param_is_an_error() {
        let mut b = Builder::new(&["SELECT 1 WHERE id={id}"]);
        b.sql("");
        assert!(matches!(b.build(), Err(Error::InvalidParam(_))));
    }

    #[test]
    fn missing_input_expands_to_empty() {
        let b = Builder::new(&["SELECT * FROM t_<suffix>"]);
        let (sql, _) = b.build().unwrap();
        assert_eq!(sql, "SELECT * FROM t_");
    }

    #[test]
    fn if_skips_the_next_call_only() {
        let mut b = Builder::new(&[]);
        b.if_(false).sql("skipped");
        b.sql("kept");
        assert_eq!(b.raw(), "kept");
    }

    #[test]
    fn select_quotes_bare_columns_but_not_expressions() {
        let mut b = Builder::new(&[]);
        b.select("orders", &["id", "COUNT(*) as total"]);
        assert_eq!(b.raw(), "SELECT `id`, COUNT(*) as total FROM `orders`");
    }
}
