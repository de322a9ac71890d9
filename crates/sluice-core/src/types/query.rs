use super::value::Value;
use serde::{Deserialize, Serialize};
use std::fmt;

/// An immutable statement template together with its bound parameters.
///
/// Parameters are positional and bound in order (`?1`, `?2`, ... or `?`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    sql: String,
    #[serde(default)]
    params: Vec<Value>,
}

impl Query {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    /// Create a query with all parameters bound at once.
    pub fn with_params<I, V>(sql: impl Into<String>, params: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self {
            sql: sql.into(),
            params: params.into_iter().map(Into::into).collect(),
        }
    }

    /// Append one positional parameter.
    pub fn bind(mut self, value: impl Into<Value>) -> Self {
        self.params.push(value.into());
        self
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn params(&self) -> &[Value] {
        &self.params
    }

    /// Key identifying this query in a result cache.
    ///
    /// Two queries share a key only when both the statement text and every
    /// bound parameter are identical.
    pub fn cache_key(&self) -> CacheKey {
        CacheKey {
            sql: self.sql.clone(),
            params: self.params.iter().map(ParamKey::from).collect(),
        }
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.sql)
    }
}

impl From<&str> for Query {
    fn from(sql: &str) -> Self {
        Query::new(sql)
    }
}

impl From<String> for Query {
    fn from(sql: String) -> Self {
        Query::new(sql)
    }
}

/// Hashable identity of a [`Query`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    sql: String,
    params: Vec<ParamKey>,
}

impl CacheKey {
    pub fn sql(&self) -> &str {
        &self.sql
    }
}

// Reals compare by bit pattern so that the key is Eq + Hash.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum ParamKey {
    Null,
    Integer(i64),
    Real(u64),
    Text(String),
    Blob(Vec<u8>),
}

impl From<&Value> for ParamKey {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => ParamKey::Null,
            Value::Integer(v) => ParamKey::Integer(*v),
            Value::Real(v) => ParamKey::Real(v.to_bits()),
            Value::Text(s) => ParamKey::Text(s.clone()),
            Value::Blob(b) => ParamKey::Blob(b.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_appends_in_order() {
        let q = Query::new("SELECT * FROM users WHERE age > ? AND name = ?")
            .bind(25)
            .bind("Ada");
        assert_eq!(q.params(), &[Value::Integer(25), Value::Text("Ada".into())]);
    }

    #[test]
    fn test_cache_key_includes_params() {
        let a = Query::with_params("SELECT * FROM users WHERE id = ?", [1]);
        let b = Query::with_params("SELECT * FROM users WHERE id = ?", [2]);
        let c = Query::with_params("SELECT * FROM users WHERE id = ?", [1]);
        assert_ne!(a.cache_key(), b.cache_key());
        assert_eq!(a.cache_key(), c.cache_key());
    }

    #[test]
    fn test_cache_key_distinguishes_integer_and_real() {
        let a = Query::new("SELECT ?").bind(1);
        let b = Query::new("SELECT ?").bind(1.0);
        assert_ne!(a.cache_key(), b.cache_key());
    }
}
