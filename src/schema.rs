//! Columnar schema descriptors: the single source of truth [`encode`](crate::encode)
//! and [`decode`](crate::decode) project record structs through.

use std::collections::BTreeMap;

use polars::prelude::DataFrame;

use crate::error::{Error, Result};
use crate::fixed_point::MAX_PRECISION;

/// The Arrow-ish primitive type a [`Field`] is stored as in the columnar table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// A fixed-point raw integer column (i64 or i128 depending on the active
    /// precision feature); the corresponding `*_precision` key lives in metadata.
    FixedPointRaw,
    /// An unsigned 64-bit nanosecond timestamp.
    TimestampNanos,
    /// A `u8`-packed enum column.
    EnumU8,
    /// A `u32` column.
    U32,
    /// A `u64` column.
    U64,
    /// A UTF-8 string column.
    Utf8,
    /// A boolean column.
    Bool,
}

/// One column in a [`RecordSchema`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    /// The column name.
    pub name: &'static str,
    /// The column's stored primitive type.
    pub kind: FieldKind,
    /// `true` if the column may contain nulls.
    pub nullable: bool,
}

impl Field {
    /// Constructs a non-nullable field.
    pub const fn new(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            nullable: false,
        }
    }

    /// Constructs a nullable field.
    pub const fn nullable(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            nullable: true,
        }
    }
}

/// Metadata keys reserved by the catalog; decoders ignore any key not listed here.
pub mod metadata_keys {
    /// The instrument this batch's rows belong to, when the batch is single-instrument.
    pub const INSTRUMENT_ID: &str = "instrument_id";
    /// Decimal places backing every price column in this batch.
    pub const PRICE_PRECISION: &str = "price_precision";
    /// Decimal places backing every size column in this batch.
    pub const SIZE_PRECISION: &str = "size_precision";
    /// The canonical `BarType` string, for bar batches only.
    pub const BAR_TYPE: &str = "bar_type";
    /// Reserved, decoder-ignored: a caller-supplied class tag.
    pub const CLASS: &str = "class";
    /// Reserved, decoder-ignored: a caller-supplied pandas dtype hint.
    pub const PANDAS: &str = "pandas";
}

/// A record type's fixed columnar layout plus default metadata.
#[derive(Debug, Clone)]
pub struct RecordSchema {
    /// The table this schema describes, matching [`Record::TYPE_NAME`](crate::record::Record::TYPE_NAME).
    pub type_name: &'static str,
    /// The ordered column list.
    pub fields: Vec<Field>,
    /// Default metadata values, e.g. a fixed `price_precision` for the table.
    pub metadata: BTreeMap<String, String>,
}

impl RecordSchema {
    /// Looks up a field by name.
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Returns the `price_precision` metadata value, if present and valid.
    pub fn price_precision(&self) -> Option<u8> {
        self.metadata
            .get(metadata_keys::PRICE_PRECISION)
            .and_then(|v| v.parse().ok())
            .filter(|p| *p <= MAX_PRECISION)
    }

    /// Returns the `size_precision` metadata value, if present and valid.
    pub fn size_precision(&self) -> Option<u8> {
        self.metadata
            .get(metadata_keys::SIZE_PRECISION)
            .and_then(|v| v.parse().ok())
            .filter(|p| *p <= MAX_PRECISION)
    }

    /// Confirms `df` carries every non-nullable column this schema names,
    /// catching a truncated or mis-encoded partition before a decoder gets to
    /// it and fails with a less legible column-lookup error.
    pub fn validate(&self, df: &DataFrame) -> Result<()> {
        for field in &self.fields {
            if !field.nullable && df.column(field.name).is_err() {
                return Err(Error::schema_mismatch(self.type_name, format!("missing column `{}`", field.name)));
            }
        }
        Ok(())
    }
}

macro_rules! schema {
    ($name:expr, [$($field:expr),+ $(,)?]) => {
        RecordSchema {
            type_name: $name,
            fields: vec![$($field),+],
            metadata: BTreeMap::new(),
        }
    };
}

/// Returns the canonical schema for `type_name`, or `None` if unrecognized.
pub fn schema_for(type_name: &str) -> Option<RecordSchema> {
    use FieldKind::*;
    Some(match type_name {
        "quote_tick" => schema!("quote_tick", [
            Field::new("instrument_id", Utf8),
            Field::new("bid_price", FixedPointRaw),
            Field::new("ask_price", FixedPointRaw),
            Field::new("bid_size", FixedPointRaw),
            Field::new("ask_size", FixedPointRaw),
            Field::new("ts_event", TimestampNanos),
            Field::new("ts_init", TimestampNanos),
        ]),
        "trade_tick" => schema!("trade_tick", [
            Field::new("instrument_id", Utf8),
            Field::new("price", FixedPointRaw),
            Field::new("size", FixedPointRaw),
            Field::new("aggressor_side", EnumU8),
            Field::new("trade_id", Utf8),
            Field::new("ts_event", TimestampNanos),
            Field::new("ts_init", TimestampNanos),
        ]),
        "bar" => schema!("bar", [
            Field::new("open", FixedPointRaw),
            Field::new("high", FixedPointRaw),
            Field::new("low", FixedPointRaw),
            Field::new("close", FixedPointRaw),
            Field::new("volume", FixedPointRaw),
            Field::new("ts_event", TimestampNanos),
            Field::new("ts_init", TimestampNanos),
        ]),
        "order_book_delta" => schema!("order_book_delta", [
            Field::new("instrument_id", Utf8),
            Field::new("action", EnumU8),
            Field::new("side", EnumU8),
            Field::new("price", FixedPointRaw),
            Field::new("size", FixedPointRaw),
            Field::new("order_id", U64),
            Field::new("flags", EnumU8),
            Field::new("sequence", U64),
            Field::new("ts_event", TimestampNanos),
            Field::new("ts_init", TimestampNanos),
        ]),
        "order_book_depth10" => schema!("order_book_depth10", [
            Field::new("instrument_id", Utf8),
            Field::new("flags", EnumU8),
            Field::new("sequence", U64),
            Field::new("ts_event", TimestampNanos),
            Field::new("ts_init", TimestampNanos),
        ]),
        "instrument_status" => schema!("instrument_status", [
            Field::new("instrument_id", Utf8),
            Field::new("action", EnumU8),
            Field::new("reason", EnumU8),
            Field::new("trading_event", EnumU8),
            Field::new("ts_event", TimestampNanos),
            Field::new("ts_init", TimestampNanos),
        ]),
        "instrument_close" => schema!("instrument_close", [
            Field::new("instrument_id", Utf8),
            Field::new("close_price", FixedPointRaw),
            Field::new("close_type", EnumU8),
            Field::new("ts_event", TimestampNanos),
            Field::new("ts_init", TimestampNanos),
        ]),
        "funding_rate_update" => schema!("funding_rate_update", [
            Field::new("instrument_id", Utf8),
            Field::new("rate", FixedPointRaw),
            Field::new("next_funding_ns", TimestampNanos),
            Field::new("ts_event", TimestampNanos),
            Field::new("ts_init", TimestampNanos),
        ]),
        "mark_price_update" => schema!("mark_price_update", [
            Field::new("instrument_id", Utf8),
            Field::new("price", FixedPointRaw),
            Field::new("ts_event", TimestampNanos),
            Field::new("ts_init", TimestampNanos),
        ]),
        "index_price_update" => schema!("index_price_update", [
            Field::new("instrument_id", Utf8),
            Field::new("price", FixedPointRaw),
            Field::new("ts_event", TimestampNanos),
            Field::new("ts_init", TimestampNanos),
        ]),
        "instrument" => schema!("instrument", [
            Field::new("instrument_id", Utf8),
            Field::new("class", EnumU8),
            Field::new("price_precision", EnumU8),
            Field::new("size_precision", EnumU8),
            Field::new("price_increment", FixedPointRaw),
            Field::new("size_increment", FixedPointRaw),
            Field::nullable("min_size", FixedPointRaw),
            Field::nullable("max_size", FixedPointRaw),
            Field::new("kind_json", Utf8),
            Field::new("ts_event", TimestampNanos),
            Field::new("ts_init", TimestampNanos),
        ]),
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_record_type_has_a_schema() {
        for name in [
            "quote_tick",
            "trade_tick",
            "bar",
            "order_book_delta",
            "order_book_depth10",
            "instrument_status",
            "instrument_close",
            "funding_rate_update",
            "mark_price_update",
            "index_price_update",
            "instrument",
        ] {
            assert!(schema_for(name).is_some(), "missing schema for {name}");
        }
    }

    #[test]
    fn unknown_type_has_no_schema() {
        assert!(schema_for("not_a_real_type").is_none());
    }

    #[test]
    fn validate_rejects_a_dataframe_missing_a_required_column() {
        use polars::prelude::*;
        let schema = schema_for("trade_tick").unwrap();
        let df = DataFrame::new(vec![Series::new("instrument_id", ["ES.XCME"])]).unwrap();
        assert!(schema.validate(&df).is_err());
    }

    #[test]
    fn validate_ignores_a_missing_nullable_column() {
        use polars::prelude::*;
        let schema = schema_for("instrument").unwrap();
        let df = DataFrame::new(vec![
            Series::new("instrument_id", ["ES.XCME"]),
            Series::new("class", [1u8]),
            Series::new("price_precision", [2u8]),
            Series::new("size_precision", [0u8]),
            Series::new("price_increment", [1i64]),
            Series::new("size_increment", [1i64]),
            Series::new("kind_json", ["\"CurrencySpot\""]),
            Series::new("ts_event", [1u64]),
            Series::new("ts_init", [1u64]),
        ])
        .unwrap();
        assert!(schema.validate(&df).is_ok());
    }
}
