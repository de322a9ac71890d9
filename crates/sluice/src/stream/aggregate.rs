use super::rows::RowStream;
use sluice_core::{Connection, Result, SluiceError, Value};
use std::iter::FusedIterator;

/// Running sum and count over a numeric sequence.
///
/// Constant space regardless of how many values are pushed.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RunningAverage {
    sum: f64,
    count: u64,
}

impl RunningAverage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
    }

    pub fn sum(&self) -> f64 {
        self.sum
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    /// `sum / count`, or `0.0` when nothing was pushed.
    pub fn average(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / self.count as f64
        }
    }
}

impl Extend<f64> for RunningAverage {
    fn extend<I: IntoIterator<Item = f64>>(&mut self, iter: I) {
        for value in iter {
            self.push(value);
        }
    }
}

/// Lazy stream of one column's values, backed by a [`RowStream`].
///
/// Fails with a query error if a row lacks the column; the connection is
/// released at that point.
pub struct ScalarStream<C: Connection> {
    rows: RowStream<C>,
    column: String,
    failed: bool,
}

impl<C: Connection> ScalarStream<C> {
    pub(crate) fn new(rows: RowStream<C>, column: String) -> Self {
        Self {
            rows,
            column,
            failed: false,
        }
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    /// Fold the column into a [`RunningAverage`], skipping NULLs.
    pub fn fold_numeric(self) -> Result<RunningAverage> {
        let column = self.column.clone();
        let mut acc = RunningAverage::new();
        for value in self {
            if let Some(v) = numeric(&value?, &column)? {
                acc.push(v);
            }
        }
        Ok(acc)
    }

    /// Arithmetic mean of the non-NULL values; `0.0` for an empty result.
    pub fn average(self) -> Result<f64> {
        Ok(self.fold_numeric()?.average())
    }

    pub fn sum(self) -> Result<f64> {
        Ok(self.fold_numeric()?.sum())
    }

    /// Number of non-NULL values.
    pub fn count(self) -> Result<u64> {
        let mut count = 0;
        for value in self {
            if !value?.is_null() {
                count += 1;
            }
        }
        Ok(count)
    }
}

impl<C: Connection> Iterator for ScalarStream<C> {
    type Item = Result<Value>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let row = match self.rows.next()? {
            Ok(row) => row,
            Err(e) => return Some(Err(e)),
        };
        match row.get(&self.column) {
            Some(value) => Some(Ok(value.clone())),
            None => {
                self.failed = true;
                self.rows.close();
                Some(Err(SluiceError::query(format!(
                    "column `{}` is not part of the result",
                    self.column
                ))))
            }
        }
    }
}

impl<C: Connection> FusedIterator for ScalarStream<C> {}

/// NULL is skipped; integers and reals convert; anything else is an error.
fn numeric(value: &Value, column: &str) -> Result<Option<f64>> {
    match value {
        Value::Null => Ok(None),
        other => other.as_f64().map(Some).ok_or_else(|| {
            SluiceError::query(format!(
                "column `{}` holds a non-numeric {} value",
                column,
                other.type_name()
            ))
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_running_average_of_nothing_is_zero() {
        let acc = RunningAverage::new();
        assert_eq!(acc.count(), 0);
        assert_eq!(acc.average(), 0.0);
    }

    #[test]
    fn test_running_average() {
        let mut acc = RunningAverage::new();
        acc.extend([1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(acc.count(), 5);
        assert_eq!(acc.sum(), 15.0);
        assert_eq!(acc.average(), 3.0);
    }

    #[test]
    fn test_numeric_conversion() {
        assert_eq!(numeric(&Value::Null, "age").unwrap(), None);
        assert_eq!(numeric(&Value::Integer(4), "age").unwrap(), Some(4.0));
        assert_eq!(numeric(&Value::Real(2.5), "age").unwrap(), Some(2.5));
        assert!(matches!(
            numeric(&Value::Text("x".into()), "age"),
            Err(SluiceError::Query(_))
        ));
    }
}
