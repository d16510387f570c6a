//! Core types for Rowmap.
//!
//! `rowmap-core` is the foundation layer: it defines the value model, the
//! field/row schema structures with dirty tracking, the bound-parameter
//! map, and the `Connection` trait that database bindings implement.
//!
//! # Who uses this crate
//!
//! - `rowmap-query` compiles filter specifications into SQL over `Value`
//!   and `Params`.
//! - `rowmap` (the facade) builds the driver and mapper on `Row`,
//!   `Connection`, and the error taxonomy defined here.
//! - Binding crates (`rowmap-sqlite`) implement `Connection`.
//!
//! Most applications should depend on the `rowmap` facade; reach for
//! `rowmap-core` directly when writing a binding.

pub mod connection;
pub mod error;
pub mod field;
pub mod identifiers;
pub mod params;
pub mod row;
pub mod types;
pub mod value;

pub use connection::{ColumnInfo, Connection, RawRow};
pub use error::{Error, Result};
pub use field::{Adhoc, AdhocExpr, Field};
pub use identifiers::{param_name, quote_ident};
pub use params::Params;
pub use row::Row;
pub use types::{BindKind, SqlType};
pub use value::Value;
