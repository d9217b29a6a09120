pub mod builder;
pub mod serialization;
pub mod store;

// Re-export for easy access
pub use builder::GraphBuilder;
pub use store::{GraphListener, GraphStore};
