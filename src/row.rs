//! Row-binding capability surface.
//!
//! The collaborator this module stands in for — matching struct/map fields
//! to result columns by name — is explicitly out of scope as systems
//! engineering (see the crate's top-level docs); what belongs in the core
//! is the *capability contract* a destination type must satisfy. Struct
//! destinations use `sqlx`'s own [`sqlx::FromRow`] derive, the ecosystem's
//! existing answer to "bind a row onto a typed record" (honoring
//! `#[sqlx(rename = "col")]` / `#[sqlx(skip)]` in place of `db:"name"` /
//! `db:"-"`). Map destinations are restricted to `HashMap<String,
//! serde_json::Value>` and decoded with [`row_to_map`].

use std::collections::HashMap;

use serde_json::Value as Json;
use sqlx::{sqlite::SqliteRow, Column, Row, TypeInfo};

use crate::error::Result;

/// Decodes every column of `row` into a `(column name, dynamic value)` map.
///
/// Tries, in order, integer, float, text, and blob decoding based on the
/// column's declared SQLite type affinity, falling back to `Json::Null`
/// for anything unrecognized or genuinely `NULL`.
pub fn row_to_map(row: &SqliteRow) -> Result<HashMap<String, Json>> {
    let mut out = HashMap::with_capacity(row.columns().len());
    for col in row.columns() {
        let name = col.name().to_string();
        let type_name = col.type_info().name().to_ascii_uppercase();
        let value: Json = if type_name.contains("INT") {
            match row.try_get::<Option<i64>, _>(col.ordinal())? {
                Some(v) => Json::from(v),
                None => Json::Null,
            }
        } else if type_name.contains("REAL") || type_name.contains("FLOA") || type_name.contains("DOUB") {
            match row.try_get::<Option<f64>, _>(col.ordinal())? {
                Some(v) => serde_json::Number::from_f64(v).map(Json::Number).unwrap_or(Json::Null),
                None => Json::Null,
            }
        } else if type_name.contains("BLOB") {
            match row.try_get::<Option<Vec<u8>>, _>(col.ordinal())? {
                Some(v) => Json::Array(v.into_iter().map(|b| Json::from(b as i64)).collect()),
                None => Json::Null,
            }
        } else {
            match row.try_get::<Option<String>, _>(col.ordinal())? {
                Some(v) => Json::String(v),
                None => Json::Null,
            }
        };
        out.insert(name, value);
    }
    Ok(out)
}

/// Re-exported so downstream record types only need `use
/// sqlgrid::row::FromRow;` to derive struct binding.
pub use sqlx::FromRow;
