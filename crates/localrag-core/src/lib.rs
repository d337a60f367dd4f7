#![deny(unused_variables)]
#![deny(unused_imports)]

pub mod chunker;
pub mod config;
pub mod error;
pub mod loader;
pub mod normalize;
pub mod pipeline;
pub mod title;
pub mod traits;
pub mod types;

pub use chunker::{ChunkConfig, Chunker, TextSpan};
pub use config::{Config, Settings};
pub use error::{Error, Result};
pub use pipeline::{IngestReport, IngestionPipeline};
pub use traits::{Embedder, Loader};
pub use types::{Chunk, Document, RetrievedContext, SearchHit, SourceKind, SourceType};
