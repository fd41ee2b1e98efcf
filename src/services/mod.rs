pub mod catalog;
pub mod recommendation;
pub mod resolver;
pub mod snapshot;
pub mod vector_index;

// Re-export public types
pub use catalog::{CatalogStore, LoadReport};
pub use recommendation::RecommendationService;
pub use resolver::NameResolver;
pub use snapshot::{CatalogSnapshot, SnapshotStore};
pub use vector_index::VectorIndex;
