//! Corpus analysis: token estimation, digest parsing, chunking and the
//! map-reduce driver that ties them to a chat backend.

pub mod chunk;
pub mod digest;
pub mod mapreduce;
pub mod tokens;

pub use chunk::{build_chunks, Chunk, ChunkKind};
pub use digest::{parse_digest, parse_digest_detailed, DigestParse, FileRecord, ParseAnomaly};
pub use mapreduce::{
    analyze, choose_strategy, AnalysisEvent, AnalysisSettings, AnalyzeError, Analyzer, Strategy,
};
pub use tokens::estimate_tokens;
