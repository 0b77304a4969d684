//! A historical market-data catalog and deterministic replay engine: ingest
//! raw source files into a partitioned, columnar Parquet catalog, then query
//! or k-way merge back out in `ts_init` order.

#![cfg_attr(docsrs, feature(doc_auto_cfg))]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod catalog;
pub mod decode;
pub mod encode;
pub mod enums;
pub mod error;
pub mod fixed_point;
pub mod flags;
pub mod fs;
pub mod identifiers;
pub mod ingest;
pub mod merge;
pub mod query;
pub mod raw;
pub mod record;
pub mod record_ref;
pub mod schema;
pub mod stream_writer;

pub use crate::catalog::Catalog;
pub use crate::error::{Error, Result};
pub use crate::record_ref::RecordEnum;
