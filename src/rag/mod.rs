pub mod engine;
pub mod query;
pub mod sqlite;
pub mod store;

pub use engine::{AnswerEngine, AnswerResponse, SourceRef};
pub use sqlite::SqliteVectorStore;
pub use store::{ChunkRecord, ScoredChunk, VectorStore};
