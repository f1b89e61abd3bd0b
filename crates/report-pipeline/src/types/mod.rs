//! Core types for the report pipeline

pub mod api;
pub mod chunk;
pub mod period;

pub use chunk::{Chunk, ChunkSetKey, ChunkStrategy, EmbeddedChunk, ScoredChunk};
pub use period::{ReportPeriod, RAW_PDF_PREFIX};
