//! report-pipeline: quarterly report PDFs to grounded answers
//!
//! Raw report PDFs land in an object store under `Raw_PDFs/{year}/{quarter}.pdf`.
//! From there the pipeline runs in stages, each one reading the previous stage's
//! artifact by a deterministic key:
//!
//! ```text
//! raw PDF -> convert (markdown in store) -> chunk -> index -> query / summarize
//! ```
//!
//! Parsers, chunking strategies and vector backends are chosen by name, so any
//! `(parser, strategy, backend)` combination can be run. Re-running a stage
//! overwrites its previous output.

pub mod chunking;
pub mod client;
pub mod config;
pub mod conversion;
pub mod error;
pub mod generation;
pub mod index;
pub mod providers;
pub mod registry;
pub mod server;
pub mod storage;
pub mod types;
pub mod workflow;

pub use config::PipelineConfig;
pub use error::{Error, Result};
pub use registry::Registry;
pub use types::{Chunk, ChunkSetKey, ChunkStrategy, ReportPeriod};
