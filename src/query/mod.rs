//! Typed range queries over a catalog's partitioned Parquet datasets.

mod predicate;

pub use predicate::Predicate;

use std::collections::HashSet;

use polars::prelude::*;

use crate::catalog::{sanitize_key, Catalog, INSTRUMENT_TYPE_NAME};
use crate::decode;
use crate::error::{Error, Result};
use crate::identifiers::{BarType, InstrumentId};
use crate::record_ref::RecordEnum;

/// The result of [`query`]: either the raw columnar table or decoded records,
/// depending on [`QueryOptions::as_records`].
pub enum QueryResult {
    /// The matching rows as a columnar table, instrument-id columns still sanitized.
    Table(DataFrame),
    /// The matching rows decoded into domain records, instrument ids restored
    /// via the catalog's mapping sidecar.
    Records(Vec<RecordEnum>),
}

/// Filters applied to a [`query`] call. `start`/`end` are inclusive bounds on
/// `ts_init`.
#[derive(Default, Clone)]
pub struct QueryOptions {
    /// Restrict to these instruments; empty means every instrument in the dataset.
    pub instrument_ids: Vec<InstrumentId>,
    /// Inclusive lower bound on `ts_init`, nanoseconds.
    pub start: Option<u64>,
    /// Inclusive upper bound on `ts_init`, nanoseconds.
    pub end: Option<u64>,
    /// An additional row filter, pushed down to the scan.
    pub predicate: Option<Predicate>,
    /// If `true`, an empty result is an error rather than an empty table/vec.
    pub raise_on_empty: bool,
    /// Columns to sort the result by, applied after filtering.
    pub sort_columns: Vec<String>,
    /// If `true`, decode rows into [`RecordEnum`] instead of returning a table.
    pub as_records: bool,
}

/// Parses an inclusive `ts_init` bound given either as raw nanoseconds or an
/// RFC 3339 / ISO-8601 timestamp string, e.g. `2024-01-01T00:00:00Z`.
pub fn parse_bound(value: &str) -> Result<u64> {
    if let Ok(nanos) = value.parse::<u64>() {
        return Ok(nanos);
    }
    let parsed = time::OffsetDateTime::parse(value, &time::format_description::well_known::Rfc3339)
        .map_err(|e| Error::parse(value, format!("not a nanosecond count or RFC 3339 timestamp: {e}")))?;
    let nanos = parsed.unix_timestamp_nanos();
    u64::try_from(nanos).map_err(|_| Error::parse(value, "timestamp predates the Unix epoch"))
}

/// Queries `type_name`'s dataset in `catalog`, applying `options`.
///
/// Rows are read and decoded per partition, each against its own recorded
/// price/size precision (see [`Catalog::partition_precision`]), then
/// concatenated; a dataset mixing instruments of different precision decodes
/// correctly rather than all being forced through one catalog-wide default.
pub fn query(catalog: &Catalog, type_name: &str, options: QueryOptions) -> Result<QueryResult> {
    tracing::debug!(type_name, instruments = options.instrument_ids.len(), "running catalog query");
    let mappings = catalog.load_mappings(type_name)?;
    let instrument_mapping = mappings.get("instrument_id");

    let mut groups: Vec<(String, DataFrame)> = Vec::new();

    if type_name == INSTRUMENT_TYPE_NAME {
        let file = catalog.instrument_table_file();
        if catalog.fs().exists(&file)? {
            let bytes = catalog.fs().read(&file)?;
            let mut df = ParquetReader::new(std::io::Cursor::new(bytes))
                .finish()
                .map_err(|e| Error::corrupt_partition(&file, e.to_string()))?;
            df = apply_range(df, options.start, options.end)?;
            if let Some(predicate) = &options.predicate {
                df = predicate.apply(df)?;
            }
            if !options.instrument_ids.is_empty() {
                df = filter_instrument_ids(df, &options.instrument_ids)?;
            }
            if df.height() > 0 {
                groups.push((INSTRUMENT_TYPE_NAME.to_string(), df));
            }
        }
    } else {
        let partitions = catalog.list_partitions(type_name)?;
        let wanted_keys: Option<Vec<String>> = if options.instrument_ids.is_empty() {
            None
        } else {
            Some(
                options
                    .instrument_ids
                    .iter()
                    .map(|id| format!("instrument_id={}", sanitize_key(id.as_str())))
                    .collect(),
            )
        };

        for partition in &partitions {
            if let Some(wanted) = &wanted_keys {
                if !wanted.contains(partition) {
                    continue;
                }
            }
            let mut partition_df: Option<DataFrame> = None;
            for file in catalog.list_partition_files(type_name, partition)? {
                let bytes = catalog.fs().read(&file)?;
                let mut df = ParquetReader::new(std::io::Cursor::new(bytes))
                    .finish()
                    .map_err(|e| Error::corrupt_partition(&file, e.to_string()))?;
                df = apply_range(df, options.start, options.end)?;
                if let Some(predicate) = &options.predicate {
                    df = predicate.apply(df)?;
                }
                if df.height() == 0 {
                    continue;
                }
                partition_df = Some(match partition_df {
                    Some(acc) => acc.vstack(&df)?,
                    None => df,
                });
            }
            if let Some(df) = partition_df {
                groups.push((partition.clone(), df));
            }
        }
    }

    let mut combined = DataFrame::empty();
    for (_, df) in &groups {
        combined = if combined.height() == 0 { df.clone() } else { combined.vstack(df)? };
    }

    if combined.width() > 0 {
        if let Some(schema) = crate::schema::schema_for(type_name) {
            schema.validate(&combined)?;
        }
    }

    if !options.sort_columns.is_empty() {
        combined = combined.sort(&options.sort_columns, false, false)?;
    }

    if combined.height() == 0 && options.raise_on_empty {
        return Err(Error::NotFound(format!("no rows for `{type_name}` matched the query")));
    }

    if !options.as_records {
        return Ok(QueryResult::Table(combined));
    }

    let mut records = Vec::new();
    for (partition, mut df) in groups {
        if let Some(mapping) = instrument_mapping {
            if let Ok(column) = df.column("instrument_id") {
                let restored: Vec<Option<String>> = column
                    .utf8()?
                    .into_iter()
                    .map(|v| v.map(|s| mapping.get(s).cloned().unwrap_or_else(|| s.to_string())))
                    .collect();
                df.replace("instrument_id", Series::new("instrument_id", restored))?;
            }
        }
        let (price_precision, size_precision) = catalog.partition_precision(type_name, &partition)?;
        records.extend(decode_table(
            type_name,
            &df,
            price_precision.unwrap_or_else(default_price_precision),
            size_precision.unwrap_or_else(default_size_precision),
        )?);
    }

    if !options.sort_columns.is_empty() {
        records.sort_by_key(|r| r.ts_init());
    }

    Ok(QueryResult::Records(records))
}

fn apply_range(df: DataFrame, start: Option<u64>, end: Option<u64>) -> Result<DataFrame> {
    if start.is_none() && end.is_none() {
        return Ok(df);
    }
    let ts_init = df.column("ts_init")?.u64()?;
    let mask: BooleanChunked = ts_init
        .into_iter()
        .map(|v| v.map(|ts| ts >= start.unwrap_or(0) && ts <= end.unwrap_or(u64::MAX)))
        .collect();
    Ok(df.filter(&mask)?)
}

/// Filters the unpartitioned instrument table down to `ids`, the row-level
/// equivalent of the partition-key pruning every other table gets for free.
fn filter_instrument_ids(df: DataFrame, ids: &[InstrumentId]) -> Result<DataFrame> {
    let wanted: HashSet<&str> = ids.iter().map(|id| id.as_str()).collect();
    let column = df.column("instrument_id")?.utf8()?;
    let mask: BooleanChunked = column.into_iter().map(|v| v.map(|s| wanted.contains(s))).collect();
    Ok(df.filter(&mask)?)
}

fn decode_table(type_name: &str, df: &DataFrame, price_precision: u8, size_precision: u8) -> Result<Vec<RecordEnum>> {
    match type_name {
        "quote_tick" => Ok(decode::decode_quotes(df, price_precision, size_precision)?
            .into_iter()
            .map(RecordEnum::from)
            .collect()),
        "trade_tick" => Ok(decode::decode_trades(df, price_precision, size_precision)?
            .into_iter()
            .map(RecordEnum::from)
            .collect()),
        "order_book_delta" => Ok(decode::decode_book_deltas(df, price_precision, size_precision)?
            .into_iter()
            .map(RecordEnum::from)
            .collect()),
        "order_book_depth10" => Ok(decode::decode_book_depth10(df, price_precision, size_precision)?
            .into_iter()
            .map(RecordEnum::from)
            .collect()),
        "instrument_status" => Ok(decode::decode_status(df)?.into_iter().map(RecordEnum::from).collect()),
        "instrument_close" => Ok(decode::decode_close(df, price_precision)?
            .into_iter()
            .map(RecordEnum::from)
            .collect()),
        "funding_rate_update" => Ok(decode::decode_funding_rates(df, price_precision)?
            .into_iter()
            .map(RecordEnum::from)
            .collect()),
        "mark_price_update" => Ok(decode::decode_mark_prices(df, price_precision)?
            .into_iter()
            .map(RecordEnum::from)
            .collect()),
        "index_price_update" => Ok(decode::decode_index_prices(df, price_precision)?
            .into_iter()
            .map(RecordEnum::from)
            .collect()),
        "instrument" => Ok(decode::decode_instruments(df)?.into_iter().map(RecordEnum::from).collect()),
        "bar" => Err(Error::schema_mismatch(
            "bar",
            "decoding bars as records requires a `bar_type`; use `decode::decode_bars` directly with the partition's `bar_type` metadata",
        )),
        other => Err(Error::schema_mismatch("record", format!("no decoder registered for `{other}`"))),
    }
}

/// The precision assumed for a partition absent a recorded entry in its
/// catalog sidecar (see [`Catalog::partition_precision`]). Matches the default
/// fixed-point precision of most instruments in this catalog's source venues
/// (2 decimal places).
fn default_price_precision() -> u8 {
    2
}

fn default_size_precision() -> u8 {
    0
}

/// Unions `type_name` and every table in `subtypes`, skipping a subtype whose
/// query fails for a reason plausibly caused by a predicate that does not
/// apply to it (a missing column, most commonly).
pub fn query_union(catalog: &Catalog, subtypes: &[&str], options: QueryOptions) -> Result<DataFrame> {
    let mut frames = Vec::new();
    for type_name in subtypes {
        match query(catalog, type_name, options.clone())? {
            QueryResult::Table(df) if df.height() > 0 => frames.push(df),
            QueryResult::Table(_) => {}
            QueryResult::Records(_) => unreachable!("query_union always requests tables"),
        }
    }
    let mut iter = frames.into_iter();
    let Some(mut acc) = iter.next() else {
        return Ok(DataFrame::empty());
    };
    for df in iter {
        acc = acc.vstack(&df)?;
    }
    Ok(acc)
}

/// Decodes a bar partition, supplying the `bar_type` the table's rows belong
/// to since it is not stored per-row.
pub fn query_bars(catalog: &Catalog, bar_type: &BarType, options: QueryOptions) -> Result<Vec<crate::record::Bar>> {
    let mut options = options;
    options.instrument_ids = vec![bar_type.instrument_id().clone()];
    options.as_records = false;
    let QueryResult::Table(df) = query(catalog, "bar", options)? else {
        unreachable!("as_records was forced to false");
    };
    let partition = format!("instrument_id={}", sanitize_key(bar_type.instrument_id().as_str()));
    let (price_precision, size_precision) = catalog.partition_precision("bar", &partition)?;
    decode::decode_bars(
        &df,
        bar_type.clone(),
        price_precision.unwrap_or_else(default_price_precision),
        size_precision.unwrap_or_else(default_size_precision),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixed_point::{Price, Quantity};
    use crate::ingest::{process_files, IngestOptions, ParserFactory};
    use crate::raw::Parser;
    use crate::record::QuoteTick;
    use std::path::Path;
    use std::sync::Mutex;

    struct OnceParser {
        records: Mutex<Vec<RecordEnum>>,
    }

    impl Parser for OnceParser {
        type Record = RecordEnum;
        fn feed(&mut self, _path: &Path, _bytes: &[u8], is_final: bool) -> Result<Vec<RecordEnum>> {
            if is_final {
                Ok(std::mem::take(&mut *self.records.lock().unwrap()))
            } else {
                Ok(Vec::new())
            }
        }
    }

    struct OnceFactory(Vec<RecordEnum>);
    impl ParserFactory for OnceFactory {
        fn new_parser(&self) -> Box<dyn Parser<Record = RecordEnum>> {
            Box::new(OnceParser { records: Mutex::new(self.0.clone()) })
        }
    }

    fn quote(ts: u64) -> QuoteTick {
        QuoteTick {
            instrument_id: InstrumentId::new("ES.XCME").unwrap(),
            bid_price: Price::from_str_precise("100.00", 2).unwrap(),
            ask_price: Price::from_str_precise("100.25", 2).unwrap(),
            bid_size: Quantity::from_str_precise("10", 0).unwrap(),
            ask_size: Quantity::from_str_precise("10", 0).unwrap(),
            ts_event: ts,
            ts_init: ts,
        }
    }

    #[test]
    fn query_applies_inclusive_ts_init_bounds() {
        let source_dir = tempfile::tempdir().unwrap();
        let catalog_dir = tempfile::tempdir().unwrap();
        let raw_path = source_dir.path().join("a.txt");
        std::fs::write(&raw_path, b"x").unwrap();

        let catalog = Catalog::local(catalog_dir.path());
        let records: Vec<RecordEnum> = (1..=5).map(|ts| RecordEnum::from(quote(ts))).collect();
        let factory = OnceFactory(records);
        let pattern = source_dir.path().join("*.txt");
        process_files(pattern.to_str().unwrap(), &factory, &catalog, IngestOptions::default()).unwrap();

        let options = QueryOptions {
            start: Some(2),
            end: Some(4),
            ..Default::default()
        };
        let QueryResult::Table(df) = query(&catalog, "quote_tick", options).unwrap() else {
            panic!("expected a table");
        };
        assert_eq!(df.height(), 3);
    }

    #[test]
    fn parse_bound_accepts_nanos_and_rfc3339() {
        assert_eq!(parse_bound("12345").unwrap(), 12345);
        assert_eq!(parse_bound("1970-01-01T00:00:01Z").unwrap(), 1_000_000_000);
        assert!(parse_bound("not a timestamp").is_err());
    }

    #[test]
    fn query_raises_on_empty_when_requested() {
        let catalog_dir = tempfile::tempdir().unwrap();
        let catalog = Catalog::local(catalog_dir.path());
        let options = QueryOptions {
            raise_on_empty: true,
            ..Default::default()
        };
        assert!(query(&catalog, "quote_tick", options).is_err());
    }
}
