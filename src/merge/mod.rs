//! K-way merge of several per-instrument/per-type catalog streams into a single
//! `ts_init`-ordered sequence of batches, bounded in memory regardless of how
//! many input files are merged.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::path::PathBuf;

use polars::prelude::*;

use crate::catalog::Catalog;
use crate::error::Result;

/// One input to a merge: a catalog type/partition to read, in the order the
/// caller wants tie-breaks to favor it.
#[derive(Debug, Clone)]
pub struct MergeConfig {
    /// The table to read from, e.g. `"quote_tick"`.
    pub type_name: String,
    /// The partition directory name, e.g. `"instrument_id=ES.XCME"`.
    pub partition: String,
}

const DEFAULT_READ_ROWS: usize = 10_000;
const DEFAULT_TARGET_BATCH_BYTES: usize = 100 * 1024 * 1024;

/// One buffered input stream: the remaining files for one [`MergeConfig`], plus
/// rows already read from the current file but not yet emitted.
struct Stream {
    config_index: usize,
    files: Vec<PathBuf>,
    next_file: usize,
    buffer: DataFrame,
    cursor: usize,
    corrupt: bool,
}

impl Stream {
    fn current_ts(&self) -> Option<u64> {
        if self.cursor >= self.buffer.height() {
            return None;
        }
        self.buffer.column("ts_init").ok()?.u64().ok()?.get(self.cursor)
    }

    fn buffer_max_ts(&self) -> Option<u64> {
        if self.cursor >= self.buffer.height() {
            return None;
        }
        let remaining = self.buffer.slice(self.cursor as i64, self.buffer.height() - self.cursor);
        remaining.column("ts_init").ok()?.u64().ok()?.max()
    }

    fn refill(&mut self, catalog: &Catalog, read_rows: usize) -> Result<()> {
        while self.buffer.height() - self.cursor < read_rows && self.next_file < self.files.len() {
            let path = self.files[self.next_file].clone();
            self.next_file += 1;
            let bytes = match catalog.fs().read(&path) {
                Ok(bytes) => bytes,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping unreadable partition file during merge");
                    self.corrupt = true;
                    continue;
                }
            };
            let df = match ParquetReader::new(std::io::Cursor::new(bytes)).finish() {
                Ok(df) => df,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping corrupt partition file during merge");
                    self.corrupt = true;
                    continue;
                }
            };
            self.buffer = if self.cursor == self.buffer.height() {
                self.cursor = 0;
                df
            } else {
                self.buffer.slice(self.cursor as i64, self.buffer.height() - self.cursor).vstack(&df)?
            };
        }
        Ok(())
    }

    fn is_exhausted(&self) -> bool {
        self.cursor >= self.buffer.height() && self.next_file >= self.files.len()
    }
}

#[derive(Eq, PartialEq)]
struct HeapKey {
    ts_init: u64,
    source_index: usize,
    stream_index: usize,
}

impl Ord for HeapKey {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.ts_init, self.source_index).cmp(&(other.ts_init, other.source_index))
    }
}

impl PartialOrd for HeapKey {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// Merges the partitions named by `configs` into a sequence of `ts_init`-sorted
/// batches, pulling at most `read_rows` rows ahead per input and yielding once
/// roughly `target_batch_bytes` has accumulated.
pub fn batch_files(
    catalog: &Catalog,
    configs: &[MergeConfig],
    read_rows: Option<usize>,
    target_batch_bytes: Option<usize>,
) -> Result<MergeIter> {
    let read_rows = read_rows.unwrap_or(DEFAULT_READ_ROWS);
    let target_batch_bytes = target_batch_bytes.unwrap_or(DEFAULT_TARGET_BATCH_BYTES);

    let mut streams = Vec::with_capacity(configs.len());
    for (index, config) in configs.iter().enumerate() {
        let files = catalog.list_partition_files(&config.type_name, &config.partition)?;
        let mut stream = Stream {
            config_index: index,
            files,
            next_file: 0,
            buffer: DataFrame::empty(),
            cursor: 0,
            corrupt: false,
        };
        stream.refill(catalog, read_rows)?;
        streams.push(stream);
    }

    Ok(MergeIter {
        catalog: catalog.clone(),
        streams,
        read_rows,
        target_batch_bytes,
    })
}

/// Lazily produces `ts_init`-ordered, size-bounded batches. See [`batch_files`].
pub struct MergeIter {
    catalog: Catalog,
    streams: Vec<Stream>,
    read_rows: usize,
    target_batch_bytes: usize,
}

impl Iterator for MergeIter {
    type Item = Result<DataFrame>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_batch().transpose()
    }
}

impl MergeIter {
    fn next_batch(&mut self) -> Result<Option<DataFrame>> {
        let mut rows: Vec<DataFrame> = Vec::new();
        let mut accumulated_bytes = 0usize;

        loop {
            for stream in &mut self.streams {
                if stream.corrupt {
                    continue;
                }
                stream.refill(&self.catalog, self.read_rows)?;
            }
            self.streams.retain(|s| !(s.corrupt && s.buffer.height() == s.cursor));

            let min_ts = self
                .streams
                .iter()
                .filter_map(Stream::buffer_max_ts)
                .min();
            let Some(min_ts) = min_ts else {
                break;
            };

            let mut heap: BinaryHeap<Reverse<HeapKey>> = BinaryHeap::new();
            for (stream_index, stream) in self.streams.iter().enumerate() {
                if let Some(ts) = stream.current_ts() {
                    heap.push(Reverse(HeapKey {
                        ts_init: ts,
                        source_index: stream.config_index,
                        stream_index,
                    }));
                }
            }

            let mut emitted_any = false;
            while let Some(Reverse(key)) = heap.peek() {
                if key.ts_init > min_ts {
                    break;
                }
                let Reverse(key) = heap.pop().unwrap();
                let stream = &mut self.streams[key.stream_index];
                let row = stream.buffer.slice(stream.cursor as i64, 1);
                accumulated_bytes += row.estimated_size();
                rows.push(row);
                stream.cursor += 1;
                emitted_any = true;
                if let Some(ts) = stream.current_ts() {
                    heap.push(Reverse(HeapKey {
                        ts_init: ts,
                        source_index: stream.config_index,
                        stream_index: key.stream_index,
                    }));
                }
            }

            if !emitted_any {
                break;
            }
            if accumulated_bytes >= self.target_batch_bytes {
                break;
            }
            if self.streams.iter().all(Stream::is_exhausted) {
                break;
            }
        }

        if rows.is_empty() {
            return Ok(None);
        }
        let mut iter = rows.into_iter();
        let mut acc = iter.next().unwrap();
        for df in iter {
            acc = acc.vstack(&df)?;
        }
        Ok(Some(acc))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixed_point::{Price, Quantity};
    use crate::identifiers::InstrumentId;
    use crate::ingest::{process_files, IngestOptions, ParserFactory};
    use crate::raw::Parser;
    use crate::record::QuoteTick;
    use crate::record_ref::RecordEnum;
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

    fn quote(instrument: &str, ts: u64) -> QuoteTick {
        QuoteTick {
            instrument_id: InstrumentId::new(instrument).unwrap(),
            bid_price: Price::from_str_precise("100.00", 2).unwrap(),
            ask_price: Price::from_str_precise("100.25", 2).unwrap(),
            bid_size: Quantity::from_str_precise("10", 0).unwrap(),
            ask_size: Quantity::from_str_precise("10", 0).unwrap(),
            ts_event: ts,
            ts_init: ts,
        }
    }

    fn ingest(catalog: &Catalog, records: Vec<RecordEnum>) {
        let source_dir = tempfile::tempdir().unwrap();
        let raw_path = source_dir.path().join("a.txt");
        std::fs::write(&raw_path, b"x").unwrap();
        let factory = OnceFactory(records);
        let pattern = source_dir.path().join("*.txt");
        process_files(pattern.to_str().unwrap(), &factory, catalog, IngestOptions::default()).unwrap();
    }

    #[test]
    fn merge_interleaves_two_instruments_by_ts_init() {
        let catalog_dir = tempfile::tempdir().unwrap();
        let catalog = Catalog::local(catalog_dir.path());
        ingest(&catalog, vec![RecordEnum::from(quote("ES.XCME", 1)), RecordEnum::from(quote("ES.XCME", 3))]);
        ingest(&catalog, vec![RecordEnum::from(quote("CL.XNYM", 2)), RecordEnum::from(quote("CL.XNYM", 4))]);

        let configs = vec![
            MergeConfig {
                type_name: "quote_tick".into(),
                partition: "instrument_id=ES.XCME".into(),
            },
            MergeConfig {
                type_name: "quote_tick".into(),
                partition: "instrument_id=CL.XNYM".into(),
            },
        ];
        let batches: Vec<DataFrame> = batch_files(&catalog, &configs, Some(2), None)
            .unwrap()
            .collect::<Result<Vec<_>>>()
            .unwrap();
        let combined = batches.into_iter().reduce(|a, b| a.vstack(&b).unwrap()).unwrap();
        let ts: Vec<u64> = combined.column("ts_init").unwrap().u64().unwrap().into_no_null_iter().collect();
        assert_eq!(ts, vec![1, 2, 3, 4]);
    }
}
