pub mod catalog;
pub mod eval;
pub mod fixtures;
pub mod mem;

pub use catalog::{Catalog, CatalogConfig, SetDeclaration};
pub use fixtures::{load_file, load_ndjson, LoadError};
pub use mem::{InMemoryStore, StoredDoc};
