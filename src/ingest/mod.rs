//! Ingestion reference producer: walk, normalize, chunk, and store documents.

pub mod chunk;
pub mod normalize;
pub mod pipeline;
pub mod walker;

pub use chunk::{ChunkSpan, chunk_text};
pub use normalize::normalize_text;
pub use pipeline::ingest_path;
pub use walker::collect_files;
