//! Append-only writer for live/replayed records, buffering per record type and
//! flushing on a wall-clock interval or on close — the artifact a backtest or
//! live run leaves behind for later catalog ingestion.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use polars::prelude::*;

use crate::encode;
use crate::error::{Error, Result};
use crate::record::{
    Bar, FundingRateUpdate, IndexPriceUpdate, Instrument, InstrumentClose, InstrumentStatus, MarkPriceUpdate,
    OrderBookDelta, OrderBookDepth10, QuoteTick, TradeTick,
};
use crate::record_ref::RecordEnum;

const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_millis(1000);

struct TypedBuffer {
    path: PathBuf,
    rows: Vec<RecordEnum>,
}

impl TypedBuffer {
    fn encode(&self) -> Result<DataFrame> {
        macro_rules! encode_as {
            ($variant:ident, $ty:ty, $encode_fn:path) => {{
                let concrete: Vec<$ty> = self
                    .rows
                    .iter()
                    .map(|r| match r {
                        RecordEnum::$variant(v) => v.clone(),
                        _ => unreachable!("a TypedBuffer only ever holds one record variant"),
                    })
                    .collect();
                $encode_fn(&concrete)
            }};
        }
        let Some(first) = self.rows.first() else {
            return Ok(DataFrame::empty());
        };
        match first {
            RecordEnum::Quote(_) => encode_as!(Quote, QuoteTick, encode::encode_quotes),
            RecordEnum::Trade(_) => encode_as!(Trade, TradeTick, encode::encode_trades),
            RecordEnum::Bar(_) => encode_as!(Bar, Bar, encode::encode_bars),
            RecordEnum::BookDelta(_) => encode_as!(BookDelta, OrderBookDelta, encode::encode_book_deltas),
            RecordEnum::BookDepth10(_) => encode_as!(BookDepth10, OrderBookDepth10, encode::encode_book_depth10),
            RecordEnum::Status(_) => encode_as!(Status, InstrumentStatus, encode::encode_status),
            RecordEnum::Close(_) => encode_as!(Close, InstrumentClose, encode::encode_close),
            RecordEnum::FundingRate(_) => encode_as!(FundingRate, FundingRateUpdate, encode::encode_funding_rates),
            RecordEnum::MarkPrice(_) => encode_as!(MarkPrice, MarkPriceUpdate, encode::encode_mark_prices),
            RecordEnum::IndexPrice(_) => encode_as!(IndexPrice, IndexPriceUpdate, encode::encode_index_prices),
            RecordEnum::Instrument(_) => encode_as!(Instrument, Instrument, encode::encode_instruments),
        }
    }
}

/// A tiny insertion-ordered map: the handful of buffers a run opens never
/// grows large enough to need more than linear lookup, and close() must walk
/// them in the order they were first written to rather than a sorted one.
struct OrderedMap<K, V> {
    entries: Vec<(K, V)>,
}

impl<K: PartialEq, V> OrderedMap<K, V> {
    fn new() -> Self {
        Self { entries: Vec::new() }
    }

    fn get_or_insert_with(&mut self, key: K, default: impl FnOnce() -> V) -> &mut V {
        if let Some(index) = self.entries.iter().position(|(k, _)| *k == key) {
            return &mut self.entries[index].1;
        }
        self.entries.push((key, default()));
        &mut self.entries.last_mut().unwrap().1
    }

    fn values_mut(&mut self) -> impl Iterator<Item = &mut V> {
        self.entries.iter_mut().map(|(_, v)| v)
    }
}

/// A record type not known to this crate's closed [`RecordEnum`], registered
/// dynamically by a caller that needs to stream a bespoke schema (e.g. a
/// strategy's custom signal). Analogous to generating a one-off class at
/// runtime, but resolved to a fixed column list up front.
pub struct UserRecord<T> {
    /// The table name this record type streams under.
    pub type_name: String,
    /// Projects one instance into a single-row table; called once per `write`.
    pub to_row: fn(&T) -> Result<DataFrame>,
}

/// Buffers and periodically flushes one run's worth of records to disk, one
/// file per record type under `run_dir`.
pub struct StreamWriter {
    run_dir: PathBuf,
    flush_interval: Duration,
    buffers: OrderedMap<&'static str, TypedBuffer>,
    user_buffers: OrderedMap<String, (PathBuf, Vec<DataFrame>)>,
    last_flush: Instant,
    closed: bool,
}

impl StreamWriter {
    /// Creates a writer rooted at `run_dir`, flushing every `flush_interval`
    /// (defaulting to 1 second) or on [`StreamWriter::close`].
    pub fn new(run_dir: impl Into<PathBuf>, flush_interval: Option<Duration>) -> Self {
        Self {
            run_dir: run_dir.into(),
            flush_interval: flush_interval.unwrap_or(DEFAULT_FLUSH_INTERVAL),
            buffers: OrderedMap::new(),
            user_buffers: OrderedMap::new(),
            last_flush: Instant::now(),
            closed: false,
        }
    }

    fn buffer_path(&self, type_name: &str) -> PathBuf {
        self.run_dir.join(format!("{type_name}.parquet"))
    }

    /// Appends `record` to its type's buffer, flushing first if the flush
    /// interval has elapsed.
    pub fn write(&mut self, record: RecordEnum) -> Result<()> {
        self.check_flush()?;
        let type_name = record.type_name();
        let path = self.buffer_path(type_name);
        self.buffers
            .get_or_insert_with(type_name, || TypedBuffer { path, rows: Vec::new() })
            .rows
            .push(record);
        Ok(())
    }

    /// Appends one instance of a dynamically-registered [`UserRecord`] type.
    pub fn write_user<T>(&mut self, spec: &UserRecord<T>, value: &T) -> Result<()> {
        self.check_flush()?;
        let path = self.run_dir.join(format!("{}.parquet", spec.type_name));
        let row = (spec.to_row)(value)?;
        self.user_buffers
            .get_or_insert_with(spec.type_name.clone(), || (path, Vec::new()))
            .1
            .push(row);
        Ok(())
    }

    /// Flushes every buffer with at least one row if the configured interval
    /// has elapsed since the last flush; a no-op otherwise.
    pub fn check_flush(&mut self) -> Result<()> {
        if self.last_flush.elapsed() >= self.flush_interval {
            self.flush()?;
        }
        Ok(())
    }

    /// Flushes every buffer immediately, appending to each type's file.
    pub fn flush(&mut self) -> Result<()> {
        for buffer in self.buffers.values_mut() {
            if buffer.rows.is_empty() {
                continue;
            }
            let df = buffer.encode()?;
            append_parquet(&buffer.path, df)?;
            buffer.rows.clear();
        }
        for (path, rows) in self.user_buffers.values_mut() {
            if rows.is_empty() {
                continue;
            }
            let mut iter = rows.drain(..);
            let mut acc = iter.next().unwrap();
            for df in iter {
                acc = acc.vstack(&df)?;
            }
            append_parquet(path, acc)?;
        }
        self.last_flush = Instant::now();
        Ok(())
    }

    /// Flushes all buffers, then marks the writer closed. Safe to call more
    /// than once; a second close is a no-op. Buffers are dropped in the
    /// deterministic order they were first written to.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.flush()?;
        self.closed = true;
        Ok(())
    }
}

impl Drop for StreamWriter {
    fn drop(&mut self) {
        if !self.closed {
            let _ = self.close();
        }
    }
}

fn append_parquet(path: &Path, df: DataFrame) -> Result<()> {
    let mut combined = if path.exists() {
        let bytes = std::fs::read(path).map_err(|e| Error::io(path, e))?;
        let existing = ParquetReader::new(std::io::Cursor::new(bytes))
            .finish()
            .map_err(|e| Error::corrupt_partition(path, e.to_string()))?;
        existing.vstack(&df)?
    } else {
        df
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    }
    let tmp = path.with_extension("parquet.tmp");
    let file = std::fs::File::create(&tmp).map_err(|e| Error::io(&tmp, e))?;
    ParquetWriter::new(file)
        .finish(&mut combined)
        .map_err(|e| Error::corrupt_partition(path, e.to_string()))?;
    std::fs::rename(&tmp, path).map_err(|e| Error::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixed_point::{Price, Quantity};
    use crate::identifiers::InstrumentId;

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
    fn close_flushes_buffered_rows_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = StreamWriter::new(dir.path(), Some(Duration::from_secs(3600)));
        writer.write(RecordEnum::from(quote(1))).unwrap();
        writer.write(RecordEnum::from(quote(2))).unwrap();
        writer.close().unwrap();

        let path = dir.path().join("quote_tick.parquet");
        assert!(path.exists());
        let bytes = std::fs::read(&path).unwrap();
        let df = ParquetReader::new(std::io::Cursor::new(bytes)).finish().unwrap();
        assert_eq!(df.height(), 2);
    }

    #[test]
    fn close_visits_buffers_in_first_write_order_not_sorted_order() {
        let mut buffers: OrderedMap<&'static str, Vec<u64>> = OrderedMap::new();
        buffers.get_or_insert_with("trade_tick", Vec::new).push(1);
        buffers.get_or_insert_with("bar", Vec::new).push(2);
        buffers.get_or_insert_with("quote_tick", Vec::new).push(3);

        let order: Vec<u64> = buffers.values_mut().map(|rows| rows[0]).collect();
        assert_eq!(order, vec![1, 2, 3]);
    }

    #[test]
    fn double_close_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = StreamWriter::new(dir.path(), None);
        writer.write(RecordEnum::from(quote(1))).unwrap();
        writer.close().unwrap();
        writer.close().unwrap();
    }

    #[test]
    fn flush_appends_rather_than_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = StreamWriter::new(dir.path(), Some(Duration::from_secs(3600)));
        writer.write(RecordEnum::from(quote(1))).unwrap();
        writer.flush().unwrap();
        writer.write(RecordEnum::from(quote(2))).unwrap();
        writer.flush().unwrap();

        let path = dir.path().join("quote_tick.parquet");
        let bytes = std::fs::read(&path).unwrap();
        let df = ParquetReader::new(std::io::Cursor::new(bytes)).finish().unwrap();
        assert_eq!(df.height(), 2);
    }
}
