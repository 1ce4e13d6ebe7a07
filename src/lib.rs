//! Keeps a dense-vector index of articles in sync with the article store
//! and answers similarity search and recommendation queries against it.

pub mod config;
pub mod context;
pub mod corpus;
pub mod display;
pub mod document;
pub mod error;
pub mod index;
pub mod io;
pub mod jobs;
pub mod models;
pub mod query;
pub mod text;
pub mod vector;

// Explicit exports for better API clarity
pub use config::Settings;
pub use context::PipelineContext;
pub use corpus::{CorpusConnection, CorpusError, CorpusSource, FlagReconciler};
pub use document::{Document, DocumentId, EmbeddedDocument, Hit, RunMode};
pub use error::{PipelineError, PipelineResult};
pub use index::{IndexError, IndexSync, VectorIndex};
pub use jobs::{IndexPipeline, JobCoordinator, RunOutcome, RunReport, Scheduler};
pub use models::{ModelPair, ModelStore, ModelStoreError};
pub use query::{ProfileStore, QueryService};
pub use vector::{VectorDimension, Vectorizer};
