//! Chunked, compression-aware reading of raw market-data files.

mod compression;

pub use compression::Compression;

use std::io::Read;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// The default chunk size used when the caller does not specify one.
pub const DEFAULT_BLOCK_SIZE: usize = 16 * 1024 * 1024;

/// Observes ingestion progress; the default no-op implementation is used when the
/// caller does not care to track progress.
pub trait ProgressSink {
    /// Called after each chunk is read from `path`, with the cumulative byte count
    /// read so far from that file.
    fn on_chunk(&mut self, path: &Path, bytes_read: u64);
}

/// A [`ProgressSink`] that discards all progress notifications.
pub struct NullProgress;

impl ProgressSink for NullProgress {
    fn on_chunk(&mut self, _path: &Path, _bytes_read: u64) {}
}

/// One chunk of raw bytes read from a source file, tagged with the file it came from.
pub struct Chunk {
    /// The file this chunk was read from.
    pub path: PathBuf,
    /// The decompressed bytes.
    pub bytes: Vec<u8>,
    /// `true` if this is the final chunk from `path`.
    pub is_final: bool,
}

/// A lazily-opened, chunked byte source over one file, transparently decompressing
/// according to its [`Compression`].
pub struct ChunkSource {
    path: PathBuf,
    reader: Box<dyn Read + Send>,
    block_size: usize,
    bytes_read: u64,
    done: bool,
}

impl ChunkSource {
    /// Opens `path`, inferring compression from its extension unless `compression`
    /// is given explicitly.
    pub fn open(path: impl Into<PathBuf>, compression: Option<Compression>, block_size: Option<usize>) -> Result<Self> {
        let path = path.into();
        let compression = compression.unwrap_or_else(|| Compression::infer(&path));
        let file = std::fs::File::open(&path).map_err(|e| Error::io(path.clone(), e))?;
        let reader = compression.wrap(Box::new(file))?;
        Ok(Self {
            path,
            reader,
            block_size: block_size.unwrap_or(DEFAULT_BLOCK_SIZE),
            bytes_read: 0,
            done: false,
        })
    }

    /// The file this source reads from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the next chunk, or `None` once the file is exhausted.
    pub fn next_chunk(&mut self, progress: &mut dyn ProgressSink) -> Result<Option<Chunk>> {
        if self.done {
            return Ok(None);
        }
        let mut buf = vec![0u8; self.block_size];
        let mut total = 0;
        while total < buf.len() {
            let n = self
                .reader
                .read(&mut buf[total..])
                .map_err(|e| Error::io(self.path.clone(), e))?;
            if n == 0 {
                break;
            }
            total += n;
        }
        buf.truncate(total);
        self.bytes_read += total as u64;
        let is_final = total < self.block_size;
        self.done = is_final;
        progress.on_chunk(&self.path, self.bytes_read);
        if total == 0 && is_final {
            return Ok(None);
        }
        Ok(Some(Chunk {
            path: self.path.clone(),
            bytes: buf,
            is_final,
        }))
    }
}

/// Expands a glob pattern into a sorted, deterministic file list.
pub fn expand_glob(pattern: &str) -> Result<Vec<PathBuf>> {
    let mut paths: Vec<PathBuf> = glob::glob(pattern)
        .map_err(|e| Error::parse(pattern, e.to_string()))?
        .filter_map(|entry| entry.ok())
        .collect();
    paths.sort();
    Ok(paths)
}

/// A parser converts the raw bytes of one or more chunks into domain records.
/// Implementations own any partial-line/partial-record carryover across chunk
/// boundaries; the reader never splits records on their behalf.
pub trait Parser: Send {
    /// The parser's output record type.
    type Record;

    /// Feeds one chunk's bytes to the parser, returning every complete record
    /// found. Implementations buffer any trailing fragment for the next call.
    fn feed(&mut self, path: &Path, bytes: &[u8], is_final: bool) -> Result<Vec<Self::Record>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    struct LineParser {
        carry: Vec<u8>,
    }

    impl Parser for LineParser {
        type Record = String;

        fn feed(&mut self, _path: &Path, bytes: &[u8], is_final: bool) -> Result<Vec<String>> {
            self.carry.extend_from_slice(bytes);
            let mut records = Vec::new();
            while let Some(pos) = self.carry.iter().position(|&b| b == b'\n') {
                let line = self.carry.drain(..=pos).collect::<Vec<u8>>();
                records.push(String::from_utf8_lossy(&line[..line.len() - 1]).to_string());
            }
            if is_final && !self.carry.is_empty() {
                records.push(String::from_utf8_lossy(&self.carry).to_string());
                self.carry.clear();
            }
            Ok(records)
        }
    }

    #[test]
    fn chunk_source_preserves_line_boundaries_across_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.txt");
        let mut file = std::fs::File::create(&path).unwrap();
        for i in 0..5 {
            writeln!(file, "line-{i}").unwrap();
        }
        drop(file);

        let mut source = ChunkSource::open(&path, Some(Compression::None), Some(8)).unwrap();
        let mut parser = LineParser { carry: Vec::new() };
        let mut progress = NullProgress;
        let mut records = Vec::new();
        while let Some(chunk) = source.next_chunk(&mut progress).unwrap() {
            records.extend(parser.feed(&chunk.path, &chunk.bytes, chunk.is_final).unwrap());
        }
        assert_eq!(records, vec!["line-0", "line-1", "line-2", "line-3", "line-4"]);
    }

    #[test]
    fn expand_glob_is_sorted_and_deterministic() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.csv", "a.csv", "c.csv"] {
            std::fs::write(dir.path().join(name), b"").unwrap();
        }
        let pattern = dir.path().join("*.csv");
        let files = expand_glob(pattern.to_str().unwrap()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap())
            .collect();
        assert_eq!(names, vec!["a.csv", "b.csv", "c.csv"]);
    }
}
