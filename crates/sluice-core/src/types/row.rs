use super::value::Value;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// One record from a tabular source: an ordered column-name to value mapping.
///
/// Rows produced by the same statement share their column list, so cloning a
/// row only copies the values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    columns: Arc<[String]>,
    values: Vec<Value>,
}

impl Row {
    /// Build a row from a shared column list and the matching values.
    ///
    /// `values` should have one entry per column; a column without a value
    /// reads as absent.
    pub fn new(columns: Arc<[String]>, values: Vec<Value>) -> Self {
        Self { columns, values }
    }

    /// Build a standalone row from `(column, value)` pairs.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let (columns, values): (Vec<String>, Vec<Value>) = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .unzip();
        Self {
            columns: columns.into(),
            values,
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Look up a value by column name. The first matching column wins.
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|c| c == column)
            .and_then(|i| self.values.get(i))
    }

    pub fn get_index(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_by_name_and_index() {
        let row = Row::from_pairs([("id", Value::from(1)), ("name", Value::from("Ada"))]);
        assert_eq!(row.len(), 2);
        assert_eq!(row.get("name"), Some(&Value::Text("Ada".into())));
        assert_eq!(row.get_index(0), Some(&Value::Integer(1)));
        assert!(row.get("email").is_none());
    }

    #[test]
    fn test_iter_preserves_column_order() {
        let row = Row::from_pairs([("b", 2), ("a", 1)]);
        let names: Vec<_> = row.iter().map(|(c, _)| c).collect();
        assert_eq!(names, vec!["b", "a"]);
    }

    #[test]
    fn test_short_row_lookup_is_none() {
        let columns: Arc<[String]> = vec!["id".to_string(), "name".to_string()].into();
        let row = Row::new(columns, vec![Value::from(7)]);
        assert_eq!(row.get("id"), Some(&Value::Integer(7)));
        assert_eq!(row.get("name"), None);
    }
}
