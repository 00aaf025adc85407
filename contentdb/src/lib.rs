pub mod cache;
pub mod document;
pub mod error;
pub mod index;
pub mod options;
pub mod query;
pub mod scanner;
pub mod schema;
pub mod source;
pub mod store;
pub mod validation;

pub use document::Entry;
pub use error::{ContentError, Result};
pub use index::{BuildReport, EntryError, EntryErrorKind, EntryIndex, IndexBuilder};
pub use options::StoreOptions;
pub use query::FieldFilter;
pub use schema::SchemaRegistry;
pub use source::{ContentSource, FsSource, MemorySource};
pub use store::{ContentStore, RebuildTicket};
pub use validation::FieldError;
