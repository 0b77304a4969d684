//! Parse raw source files into records, partition them, and append them to a
//! [`Catalog`](crate::catalog::Catalog).

/// Execution strategies for per-file ingestion parallelism.
pub mod executor;

pub use executor::{Distributed, Executor, Synchronous, ThreadPool};

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use polars::prelude::*;

use crate::catalog::{sanitize_key, Catalog, INSTRUMENT_TYPE_NAME};
use crate::decode;
use crate::encode;
use crate::error::{Error, Result};
use crate::raw::{ChunkSource, Compression, NullProgress, Parser};
use crate::record_ref::RecordEnum;

/// Tunable knobs for [`process_files`]; all optional, defaulting to the values
/// documented on each field.
#[derive(Default)]
pub struct IngestOptions {
    /// Bytes per chunk handed to the parser. Defaults to [`crate::raw::DEFAULT_BLOCK_SIZE`].
    pub block_size: Option<usize>,
    /// Compression codec; `None` means infer from each file's extension.
    pub compression: Option<Compression>,
    /// Execution strategy for per-file parallelism; `None` means [`Synchronous`].
    pub executor: Option<Arc<dyn Executor>>,
}

/// Builds a fresh, independently-stateful parser for one input file. Needed
/// because parsers carry byte-carryover state across chunks and so cannot be
/// shared between files running concurrently.
pub trait ParserFactory: Send + Sync {
    /// Constructs a new parser instance.
    fn new_parser(&self) -> Box<dyn Parser<Record = RecordEnum>>;
}

impl<F> ParserFactory for F
where
    F: Fn() -> Box<dyn Parser<Record = RecordEnum>> + Send + Sync,
{
    fn new_parser(&self) -> Box<dyn Parser<Record = RecordEnum>> {
        (self)()
    }
}

/// Parses every file matched by `glob`, partitions the resulting records by
/// `(table, instrument)`, and appends them to `catalog`. Returns the number of
/// rows written per input file. Files already present in the catalog's
/// processed-files ledger are skipped.
pub fn process_files(
    glob: &str,
    parser_factory: &dyn ParserFactory,
    catalog: &Catalog,
    options: IngestOptions,
) -> Result<BTreeMap<PathBuf, usize>> {
    let files = crate::raw::expand_glob(glob)?;
    let processed = catalog.processed_files()?;
    let pending: Vec<PathBuf> = files.into_iter().filter(|f| !processed.contains(f)).collect();
    tracing::info!(glob, pending = pending.len(), "starting ingestion run");

    let executor: Arc<dyn Executor> = options.executor.clone().unwrap_or_else(|| Arc::new(Synchronous));
    let block_size = options.block_size;
    let compression = options.compression;

    let jobs: Vec<Box<dyn FnOnce() -> Result<usize> + Send>> = pending
        .iter()
        .cloned()
        .map(|path| {
            let parser = parser_factory.new_parser();
            let cat = catalog.clone();
            Box::new(move || {
                let rows = ingest_one_file(&path, parser, &cat, block_size, compression)?;
                cat.mark_processed(&path)?;
                Ok(rows)
            }) as Box<dyn FnOnce() -> Result<usize> + Send>
        })
        .collect();

    let results = executor.run(jobs)?;
    pending
        .into_iter()
        .zip(results)
        .map(|(path, result)| result.map(|rows| (path, rows)))
        .collect()
}

fn ingest_one_file(
    path: &Path,
    mut parser: Box<dyn Parser<Record = RecordEnum>>,
    catalog: &Catalog,
    block_size: Option<usize>,
    compression: Option<Compression>,
) -> Result<usize> {
    let mut source = ChunkSource::open(path, compression, block_size)?;
    let mut progress = NullProgress;
    let mut records = Vec::new();
    while let Some(chunk) = source.next_chunk(&mut progress)? {
        records.extend(parser.feed(&chunk.path, &chunk.bytes, chunk.is_final)?);
    }
    tracing::debug!(path = %path.display(), records = records.len(), "parsed raw file");
    write_records(records, catalog)
}

/// Groups `records` by `(table, instrument)`, sorts each group by `ts_init`,
/// encodes it, and appends it to the catalog as a new Parquet partition file.
/// Instrument definitions are routed to [`write_instrument_table`] instead,
/// since that table is unpartitioned.
fn write_records(records: Vec<RecordEnum>, catalog: &Catalog) -> Result<usize> {
    let mut instrument_records = Vec::new();
    let mut groups: BTreeMap<(&'static str, String), Vec<RecordEnum>> = BTreeMap::new();
    for record in records {
        if record.type_name() == INSTRUMENT_TYPE_NAME {
            instrument_records.push(record);
            continue;
        }
        let instrument_key = record
            .instrument_id()
            .map(|id| id.as_str().to_string())
            .unwrap_or_else(|| "_".to_string());
        groups.entry((record.type_name(), instrument_key)).or_default().push(record);
    }

    let mut total = 0;
    if !instrument_records.is_empty() {
        total += write_instrument_table(catalog, instrument_records)?;
    }

    for ((type_name, instrument_key), mut group) in groups {
        group.sort_by_key(RecordEnum::ts_init);
        let rows = group.len();
        let precision = group_precision(&group);
        let df = encode_group(type_name, group)?;
        let partition = format!("instrument_id={}", sanitize_key(&instrument_key));
        catalog.with_partition_lock(type_name, &partition, move || {
            write_partition_file(catalog, type_name, &instrument_key, df)
        })?;
        if let Some((price_precision, size_precision)) = precision {
            catalog.merge_partition_metadata(type_name, &partition, price_precision, size_precision)?;
        }
        total += rows;
    }
    Ok(total)
}

/// Reads the price/size precision a group's records were constructed at, so it
/// can be persisted to the catalog's partition-precision sidecar before the
/// group is consumed by [`encode_group`]. `None` for record types with no
/// price/size fields (e.g. [`RecordEnum::Status`]).
fn group_precision(group: &[RecordEnum]) -> Option<(u8, u8)> {
    group.first().and_then(|record| match record {
        RecordEnum::Quote(r) => Some((r.bid_price.precision(), r.bid_size.precision())),
        RecordEnum::Trade(r) => Some((r.price.precision(), r.size.precision())),
        RecordEnum::Bar(r) => Some((r.open.precision(), r.volume.precision())),
        RecordEnum::BookDelta(r) => Some((r.price.precision(), r.size.precision())),
        RecordEnum::BookDepth10(r) => Some((r.bid_price[0].precision(), r.bid_size[0].precision())),
        RecordEnum::Close(r) => Some((r.close_price.precision(), 0)),
        RecordEnum::MarkPrice(r) => Some((r.price.precision(), 0)),
        RecordEnum::IndexPrice(r) => Some((r.price.precision(), 0)),
        RecordEnum::FundingRate(r) => Some((r.rate.precision(), 0)),
        RecordEnum::Status(_) | RecordEnum::Instrument(_) => None,
    })
}

/// Merges `records` into the single unpartitioned instrument table, keeping
/// the latest row (by `ts_init`/`ts_event` ordering supplied by the caller's
/// insertion order) for any duplicate key. Unlike every other table, there is
/// no per-instrument partitioning: the whole table is one file.
fn write_instrument_table(catalog: &Catalog, records: Vec<RecordEnum>) -> Result<usize> {
    let instruments: Vec<_> = records
        .into_iter()
        .map(|r| match r {
            RecordEnum::Instrument(v) => v,
            _ => unreachable!("instrument_records were filtered by type_name"),
        })
        .collect();
    let rows = instruments.len();

    catalog.with_partition_lock(INSTRUMENT_TYPE_NAME, "_", || {
        let file = catalog.instrument_table_file();
        let mut df = encode::encode_instruments(&instruments)?;

        if catalog.fs().exists(&file)? {
            let bytes = catalog.fs().read(&file)?;
            let existing = ParquetReader::new(std::io::Cursor::new(bytes))
                .finish()
                .map_err(|e| Error::corrupt_partition(&file, e.to_string()))?;
            df = existing.vstack(&df)?;
        }

        let dedup_subset: Vec<String> = df
            .get_column_names()
            .into_iter()
            .filter(|name| !matches!(*name, "ts_init" | "ts_event"))
            .map(str::to_string)
            .collect();
        df = df.unique_stable(Some(&dedup_subset), UniqueKeepStrategy::Last, None)?;
        df = df.sort(["instrument_id"], false, false)?;

        let dir = catalog.make_path(INSTRUMENT_TYPE_NAME);
        let tmp_path = dir.join(".instrument.parquet.tmp");
        let mut buffer = Vec::new();
        ParquetWriter::new(&mut buffer)
            .finish(&mut df)
            .map_err(|e| Error::schema_mismatch(INSTRUMENT_TYPE_NAME, e.to_string()))?;
        catalog.fs().write(&tmp_path, &buffer)?;
        catalog.fs().rename(&tmp_path, &file)
    })?;

    Ok(rows)
}

fn encode_group(type_name: &str, records: Vec<RecordEnum>) -> Result<DataFrame> {
    macro_rules! encode_as {
        ($variant:ident, $encode_fn:path) => {{
            let concrete: Vec<_> = records
                .into_iter()
                .map(|r| match r {
                    RecordEnum::$variant(v) => v,
                    _ => unreachable!("records were grouped by type_name before encoding"),
                })
                .collect();
            $encode_fn(&concrete)
        }};
    }

    match type_name {
        "quote_tick" => encode_as!(Quote, encode::encode_quotes),
        "trade_tick" => encode_as!(Trade, encode::encode_trades),
        "bar" => encode_as!(Bar, encode::encode_bars),
        "order_book_delta" => encode_as!(BookDelta, encode::encode_book_deltas),
        "order_book_depth10" => encode_as!(BookDepth10, encode::encode_book_depth10),
        "instrument_status" => encode_as!(Status, encode::encode_status),
        "instrument_close" => encode_as!(Close, encode::encode_close),
        "funding_rate_update" => encode_as!(FundingRate, encode::encode_funding_rates),
        "mark_price_update" => encode_as!(MarkPrice, encode::encode_mark_prices),
        "index_price_update" => encode_as!(IndexPrice, encode::encode_index_prices),
        "instrument" => encode_as!(Instrument, encode::encode_instruments),
        other => Err(Error::schema_mismatch("record", format!("unknown record type `{other}`"))),
    }
}

fn write_partition_file(catalog: &Catalog, type_name: &str, instrument_key: &str, mut df: DataFrame) -> Result<()> {
    let ts_init = df.column("ts_init")?.u64()?;
    let min_ts = ts_init.min().unwrap_or(0);
    let max_ts = ts_init.max().unwrap_or(0);

    let sanitized = sanitize_key(instrument_key);
    if sanitized != instrument_key {
        catalog.merge_mapping(type_name, "instrument_id", &sanitized, instrument_key)?;
    }

    let partition = format!("instrument_id={sanitized}");
    let dir = catalog.make_path(type_name).join(&partition);
    let existing = catalog.list_partition_files(type_name, &partition)?;
    let mut index = existing.len();
    let mut file_path;
    loop {
        file_path = dir.join(format!("{min_ts}-{max_ts}-{index}.parquet"));
        if !catalog.fs().exists(&file_path)? {
            break;
        }
        index += 1;
    }

    let mut buffer = Vec::new();
    ParquetWriter::new(&mut buffer)
        .finish(&mut df)
        .map_err(|e| Error::schema_mismatch(type_name, e.to_string()))?;

    let tmp_path = dir.join(format!(".{min_ts}-{max_ts}-{index}.parquet.tmp"));
    catalog.fs().write(&tmp_path, &buffer)?;
    catalog.fs().rename(&tmp_path, &file_path)?;
    Ok(())
}

/// Offline repartition: groups `files` by partition, merges + dedups by full-row
/// equality (last-write-wins on duplicates), and rewrites one file per group.
/// Never run as part of normal ingestion.
pub fn validate_and_repartition(catalog: &Catalog, type_name: &str, partition: &str) -> Result<()> {
    let files = catalog.list_partition_files(type_name, partition)?;
    if files.len() <= 1 {
        return Ok(());
    }
    let mut merged: Option<DataFrame> = None;
    for file in &files {
        let bytes = catalog.fs().read(file)?;
        let df = ParquetReader::new(std::io::Cursor::new(bytes))
            .finish()
            .map_err(|e| Error::corrupt_partition(file, e.to_string()))?;
        merged = Some(match merged {
            Some(acc) => acc.vstack(&df)?,
            None => df,
        });
    }
    let mut df = merged.ok_or_else(|| Error::NotFound(partition.to_string()))?;
    df = df.unique_stable(None, UniqueKeepStrategy::Last, None)?;
    df = df.sort(["ts_init"], false, false)?;

    let min_ts = df.column("ts_init")?.u64()?.min().unwrap_or(0);
    let max_ts = df.column("ts_init")?.u64()?.max().unwrap_or(0);
    let dir = catalog.make_path(type_name).join(partition);
    let final_path = dir.join(format!("{min_ts}-{max_ts}-0.parquet"));
    let tmp_path = dir.join(format!(".{min_ts}-{max_ts}-0.parquet.tmp"));

    let mut buffer = Vec::new();
    ParquetWriter::new(&mut buffer)
        .finish(&mut df)
        .map_err(|e| Error::schema_mismatch(type_name, e.to_string()))?;
    catalog.fs().write(&tmp_path, &buffer)?;
    catalog.fs().rename(&tmp_path, &final_path)?;

    for file in files {
        if file != final_path {
            catalog.fs().remove(&file)?;
        }
    }
    Ok(())
}
