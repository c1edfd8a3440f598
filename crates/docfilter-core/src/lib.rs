//! Declarative filter sets compiled into document store searches.
//!
//! A [`FilterSet`] binds raw form input through its [`FieldFilter`]s,
//! composes the resulting clauses into one [`Query`], applies the requested
//! sort and clamps pagination against the live hit count.

pub mod errors;
pub mod filter;
pub mod filterset;
pub mod form;
pub mod model;
pub mod paginate;
pub mod query;
pub mod search;
pub mod sort;
pub mod util;

pub use errors::*;
pub use filter::{FieldFilter, Lookup};
pub use filterset::{BoundFilterSet, FilterSet, FilterSetBuilder, FilterSetConfig, NamedFilter, PaginatedSearch};
pub use form::{BoundForm, FieldParser, FormSpec, StandardParser, ValueKind, Widget, WidgetKind};
pub use model::*;
pub use paginate::{Page, Window, DEFAULT_PAGE_SIZE};
pub use query::*;
pub use search::{Document, IndexDocument, Search, SearchBackend, SearchRequest};
pub use sort::{Direction, NestedSort, SortChoice, SortClause, SortMode, SortSpec};
