//! A small, explicit predicate language pushed down into the parquet scan,
//! standing in for the distilled spec's dynamically-built filter expressions.

use polars::prelude::*;

use crate::error::Result;

/// A scalar comparison value.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    /// A 64-bit integer (also used for timestamps and enum codes).
    Int(i64),
    /// A UTF-8 string.
    Str(String),
}

/// A single column comparison, or the conjunction of two predicates.
#[derive(Debug, Clone)]
pub enum Predicate {
    /// `column <= value`.
    Le(String, Scalar),
    /// `column >= value`.
    Ge(String, Scalar),
    /// `column == value`.
    Eq(String, Scalar),
    /// `column` is one of `values`.
    In(String, Vec<Scalar>),
    /// Both sub-predicates must hold.
    And(Box<Predicate>, Box<Predicate>),
}

impl Predicate {
    /// Combines `self` and `other` with AND.
    pub fn and(self, other: Predicate) -> Predicate {
        Predicate::And(Box::new(self), Box::new(other))
    }

    /// Filters `df` down to the rows matching this predicate. A column named
    /// by the predicate but absent from `df` is treated as "no match" rather
    /// than an error, so a multi-subtype union query can apply one predicate
    /// across tables with differing schemas.
    pub fn apply(&self, df: DataFrame) -> Result<DataFrame> {
        let mask = self.mask(&df)?;
        Ok(df.filter(&mask)?)
    }

    fn mask(&self, df: &DataFrame) -> Result<BooleanChunked> {
        match self {
            Predicate::Le(col, value) => compare(df, col, value, |ord| ord.is_le()),
            Predicate::Ge(col, value) => compare(df, col, value, |ord| ord.is_ge()),
            Predicate::Eq(col, value) => compare(df, col, value, |ord| ord.is_eq()),
            Predicate::In(col, values) => {
                let Ok(series) = df.column(col) else {
                    return Ok(BooleanChunked::full("mask", false, df.height()));
                };
                let mut mask = BooleanChunked::full("mask", false, df.height());
                for value in values {
                    let sub = scalar_eq(series, value)?;
                    mask = &mask | &sub;
                }
                Ok(mask)
            }
            Predicate::And(left, right) => Ok(&left.mask(df)? & &right.mask(df)?),
        }
    }
}

fn compare(
    df: &DataFrame,
    col: &str,
    value: &Scalar,
    keep: impl Fn(std::cmp::Ordering) -> bool,
) -> Result<BooleanChunked> {
    let Ok(series) = df.column(col) else {
        return Ok(BooleanChunked::full("mask", false, df.height()));
    };
    match value {
        Scalar::Int(target) => {
            let ints = series.cast(&DataType::Int64)?;
            let ints = ints.i64()?;
            Ok(ints
                .into_iter()
                .map(|v| v.map(|v| keep(v.cmp(target))).unwrap_or(false))
                .collect())
        }
        Scalar::Str(target) => {
            let strings = series.utf8()?;
            Ok(strings
                .into_iter()
                .map(|v| v.map(|v| keep(v.cmp(target.as_str()))).unwrap_or(false))
                .collect())
        }
    }
}

fn scalar_eq(series: &Series, value: &Scalar) -> Result<BooleanChunked> {
    match value {
        Scalar::Int(target) => {
            let ints = series.cast(&DataType::Int64)?;
            let ints = ints.i64()?;
            Ok(ints.into_iter().map(|v| v == Some(*target)).collect())
        }
        Scalar::Str(target) => {
            let strings = series.utf8()?;
            Ok(strings.into_iter().map(|v| v == Some(target.as_str())).collect())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> DataFrame {
        DataFrame::new(vec![
            Series::new("ts_init", [1i64, 2, 3]),
            Series::new("instrument_id", ["ES.XCME", "CL.XNYM", "ES.XCME"]),
        ])
        .unwrap()
    }

    #[test]
    fn ge_and_le_combine_into_a_range() {
        let predicate = Predicate::Ge("ts_init".into(), Scalar::Int(2)).and(Predicate::Le("ts_init".into(), Scalar::Int(3)));
        let result = predicate.apply(sample()).unwrap();
        assert_eq!(result.height(), 2);
    }

    #[test]
    fn in_predicate_matches_any_listed_value() {
        let predicate = Predicate::In("instrument_id".into(), vec![Scalar::Str("CL.XNYM".into())]);
        let result = predicate.apply(sample()).unwrap();
        assert_eq!(result.height(), 1);
    }

    #[test]
    fn missing_column_yields_no_matches_rather_than_an_error() {
        let predicate = Predicate::Eq("not_a_column".into(), Scalar::Int(1));
        let result = predicate.apply(sample()).unwrap();
        assert_eq!(result.height(), 0);
    }
}
