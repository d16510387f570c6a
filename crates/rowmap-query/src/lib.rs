//! Filter-spec compilation and SELECT assembly for Rowmap.
//!
//! This crate is the pure, connection-free half of statement building:
//!
//! - [`filter`] compiles a nested, operator-mask-driven [`Filter`] into a
//!   `(sql_fragment, Params)` pair suitable for WHERE or HAVING.
//! - [`select`] assembles full SELECT statements from a `Row` template,
//!   a filter, and [`SelectOptions`].
//!
//! # Example
//!
//! ```
//! use rowmap_query::{compile, Filter};
//! use rowmap_core::Params;
//!
//! let filter = Filter::new()
//!     .push("active", 1i64)
//!     .push("| role", "admin");
//! let (sql, params) = compile(&filter, &Params::new()).unwrap();
//! assert_eq!(sql, "`active` = :active OR `role` = :role");
//! assert_eq!(params.len(), 2);
//! ```

pub mod filter;
pub mod select;

pub use filter::{compile, Entry, Filter, Operand, RAW_SENTINEL};
pub use select::{stringify, ColumnList, OrderTerm, SelectOptions, SortDir};
