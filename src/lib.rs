/// The main library module for codara
pub mod config;
pub mod error;
pub mod model;
pub mod pipeline;
pub mod services;
pub mod vector;

// Explicit exports for better API clarity
pub use config::Settings;
pub use error::{PipelineError, PipelineResult};
pub use model::{
    CandidateEntry, Classification, ClassificationResult, QuerySignal, SupplyClass,
};
pub use pipeline::{Codifier, QueryUnderstanding, Retrieval, Selection, SelectionStrategy};
pub use services::{ChatClient, Embedder, HttpChatClient, HttpEmbedder, ServiceError};
pub use vector::{
    Catalog, CatalogEntry, MmapVectorStorage, RowId, Similarity, VectorDimension, VectorError,
    VectorIndex, VectorStorageWriter, write_catalog,
};
