/// The main library module for symrank
pub mod config;
pub mod embedding;
pub mod error;
pub mod graph;
pub mod index;
pub mod logging;
pub mod rank;
pub mod registry;
pub mod search;
pub mod similarity;
pub mod types;

// Explicit exports for better API clarity
pub use config::Settings;
pub use embedding::{EmbeddingProvider, RetryPolicy, RetryingProvider, create_symbol_text};
pub use error::{
    IndexError, IndexResult, NotFoundError, ProviderError, RankError, RegistryError,
    RegistryResult, SearchError, SimilarityError, SimilarityResult, StoreError, StoreResult,
};
pub use graph::{ExclusionRules, Subgraph, SymbolGraph};
pub use rank::{RankConfig, RankOutcome, SymbolRank};
pub use registry::{Component, Dependency, DependencyRegistry};
pub use search::{CombinationStrategy, ScoreCombiner, SearchResult, SymbolSearch};
pub use similarity::{EmbeddingStore, SymbolSimilarity, cosine_similarity};
pub use types::{
    Direction, FlowPolicy, Location, Range, ReferenceEdge, RelationKind, Symbol, SymbolId,
    SymbolKind,
};

#[cfg(feature = "fastembed")]
pub use embedding::FastEmbedProvider;
