//! Template tokenizer: `<input>` / `{param}` / literal text.

use std::sync::{Arc, RwLock};

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

/// One element of a tokenized builder template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// Literal text, copied verbatim on render.
    Text(String),
    /// `<name>` — expands to a mapped input string, empty if unmapped.
    Input(String),
    /// `{name}` — expands to a driver placeholder; binds a positional value.
    Param(String),
}

impl Token {
    /// The substring this token was parsed from, used to reconstruct the
    /// original template by concatenation.
    pub fn as_str(&self) -> &str {
        match self {
            Token::Text(s) => s,
            Token::Input(s) => s,
            Token::Param(s) => s,
        }
    }
}

static TOKEN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<\w+>|\{\w+\}").unwrap());

static MEMO: Lazy<RwLock<HashMap<String, Arc<[Token]>>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

/// Parses `s` into an ordered token stream, memoizing by the raw string.
///
/// Memoization is safe because tokens are immutable once produced; this is
/// a single process-wide cache, not scoped per builder.
pub fn tokenize(s: &str) -> Arc<[Token]> {
    if let Some(hit) = MEMO.read().unwrap().get(s) {
        return hit.clone();
    }

    let mut tokens = Vec::new();
    let mut last = 0;
    for m in TOKEN_RE.find_iter(s) {
        if m.start() > last {
            tokens.push(Token::Text(s[last..m.start()].to_string()));
        }
        let matched = m.as_str();
        let inner = &matched[1..matched.len() - 1];
        if matched.starts_with('<') {
            tokens.push(Token::Input(inner.to_string()));
        } else {
            tokens.push(Token::Param(inner.to_string()));
        }
        last = m.end();
    }
    if last < s.len() {
        tokens.push(Token::Text(s[last..].to_string()));
    }

    let arc: Arc<[Token]> = Arc::from(tokens.into_boxed_slice());
    MEMO.write().unwrap().insert(s.to_string(), arc.clone());
    arc
}

/// Reconstructs the original template text by concatenating each token's
/// delimiters back on.
pub fn reassemble(tokens: &[Token]) -> String {
    let mut out = String::new();
    for t in tokens {
        match t {
            Token::Text(s) => out.push_str(s),
            Token::Input(s) => {
                out.push('<');
                out.push_str(s);
                out.push('>');
            }
            Token::Param(s) => {
                out.push('{');
                out.push_str(s);
                out.push('}');
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_text_input_param() {
        let tokens = tokenize("SELECT * FROM t_<yyyy> WHERE id={id}");
        assert_eq!(
            &*tokens,
            &[
                Token::Text("SELECT * FROM t_".to_string()),
                Token::Input("yyyy".to_string()),
                Token::Text(" WHERE id=".to_string()),
                Token::Param("id".to_string()),
            ]
        );
    }

    #[test]
    fn round_trips_via_reassemble() {
        let s = "a <b> c {d} e";
        let tokens = tokenize(s);
        assert_eq!(reassemble(&tokens), s);
    }

    #[test]
    fn unbalanced_braces_are_literal() {
        let tokens = tokenize("foo <bar baz}");
        assert_eq!(&*tokens, &[Token::Text("foo <bar baz}".to_string())]);
    }

    #[test]
    fn memoizes_identical_strings() {
        let a = tokenize("memo-me <x>");
        let b = tokenize("memo-me <x>");
        assert!(Arc::ptr_eq(&a, &b));
    }
}
