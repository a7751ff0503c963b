//! ORDER BY sub-builder: allow-listed column ordering with optional name
//! transformation.

use super::Builder;

/// Accumulates an `ORDER BY` clause, filtering columns against an optional
/// allow-list (case-insensitive, after an optional snake_case transform).
pub struct OrderByBuilder {
    inner: Builder,
    allow: Vec<String>,
    to_snake: bool,
    columns: Vec<String>,
}

fn to_snake_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 4);
    for (i, c) in s.char_indices() {
        if c.is_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

impl OrderByBuilder {
    pub(super) fn new(inner: Builder) -> Self {
        OrderByBuilder {
            inner,
            allow: Vec::new(),
            to_snake: false,
            columns: Vec::new(),
        }
    }

    /// Restricts accepted columns to `names` (case-insensitive match after
    /// the configured name transform).
    pub fn with_allow(mut self, names: &[&str]) -> Self {
        self.allow = names.iter().map(|n| n.to_lowercase()).collect();
        self
    }

    /// Transforms incoming column names to snake_case before matching them
    /// against the allow-list and rendering them.
    pub fn with_to_snake(mut self) -> Self {
        self.to_snake = true;
        self
    }

    fn get_column(&self, raw: &str) -> Option<String> {
        let name = if self.to_snake {
            to_snake_case(raw)
        } else {
            raw.to_string()
        };
        if self.allow.is_empty() || self.allow.contains(&name.to_lowercase()) {
            Some(name)
        } else {
            None
        }
    }

    fn add(&mut self, raw: &str, direction: &str) -> &mut Self {
        if let Some(col) = self.get_column(raw) {
            self.columns
                .push(format!("{q}{col}{q} {direction}", q = '`'));
        }
        self
    }

    /// Appends `cols` in ascending order, skipping any not in the allow-list.
    pub fn by_asc(&mut self, cols: &[&str]) -> &mut Self {
        for c in cols {
            self.add(c, "ASC");
        }
        self
    }

    /// Appends `cols` in descending order, skipping any not in the
    /// allow-list.
    pub fn by_desc(&mut self, cols: &[&str]) -> &mut Self {
        for c in cols {
            self.add(c, "DESC");
        }
        self
    }

    /// Parses a comma-separated `col[ ASC|DESC]` list and dispatches each
    /// entry to [`OrderByBuilder::by_asc`]/[`OrderByBuilder::by_desc`].
    pub fn by(&mut self, raw: &str) -> &mut Self {
        for part in raw.split(',') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            let mut words = part.split_whitespace();
            let col = match words.next() {
                Some(c) => c,
                None => continue,
            };
            let dir = words.next().unwrap_or("ASC");
            if dir.eq_ignore_ascii_case("desc") {
                self.add(col, "DESC");
            } else {
                self.add(col, "ASC");
            }
        }
        self
    }

    /// Merges another builder's already-accepted columns into this one.
    pub fn with_order_by(mut self, other: OrderByBuilder) -> Self {
        self.columns.extend(other.columns);
        self
    }

    /// Renders the accumulated `ORDER BY` clause into the parent builder
    /// and returns it.
    pub fn end(mut self) -> Builder {
        if !self.columns.is_empty() {
            self.inner.stmt.push_str(" ORDER BY ");
            self.inner.stmt.push_str(&self.columns.join(", "));
        }
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filters_by_allow_list() {
        let b = Builder::new(&["SELECT * FROM t"]);
        let mut ob = b.order().with_allow(&["id", "name"]);
        ob.by_asc(&["id"]).by_desc(&["secret", "name"]);
        let b = ob.end();
        assert_eq!(b.raw(), "SELECT * FROM t ORDER BY `id` ASC, `name` DESC");
    }

    #[test]
    fn by_parses_raw_spec() {
        let b = Builder::new(&["SELECT * FROM t"]);
        let mut ob = b.order();
        ob.by("name desc, id");
        let b = ob.end();
        assert_eq!(b.raw(), "SELECT * FROM t ORDER BY `name` DESC, `id` ASC");
    }
}
