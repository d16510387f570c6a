//! Active-record style data access over plain SQL rows.
//!
//! Rowmap maps tables to [`Row`] templates (schema + one record's data,
//! with per-field dirty tracking), compiles nested filter specifications
//! into parameterized SQL, and wraps it all in a cursor-based [`Mapper`]
//! with lifecycle events.
//!
//! # Layers
//!
//! - [`Driver`]: statement execution, result caching, transactions, and
//!   the CRUD operations (`find`, `first`, `count`, `paginate`, `insert`,
//!   `update`, `delete`, `delete_by_clause`).
//! - [`Mapper`]: a forward cursor over loaded rows with save/delete
//!   semantics, lifecycle events, and `loadBy<Field>` style dynamic
//!   accessors.
//! - [`Filter`] / [`SelectOptions`] (from `rowmap-query`): the query
//!   building blocks.
//!
//! # Example
//!
//! ```no_run
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! use rowmap::prelude::*;
//! use rowmap::testing::MockConnection;
//!
//! # fn main() -> rowmap::Result<()> {
//! let driver = Rc::new(RefCell::new(Driver::with_connection(MockConnection::new())));
//! let mut users = Mapper::new(driver);
//! users.set_name("user", None, None, 0)?;
//! users.load(&Filter::new().push("active", 1i64), &SelectOptions::new(), 0)?;
//! while users.valid() {
//!     let name = users.get("username")?;
//!     println!("{name:?}");
//!     users.next();
//! }
//! # Ok(())
//! # }
//! ```
//!
//! Database bindings implement [`Connection`]; see `rowmap-sqlite` for
//! the SQLite one.

pub mod cache;
pub mod driver;
pub mod events;
pub mod mapper;
pub mod rules;
pub mod testing;

pub use cache::{CacheEntry, CacheStore, MemoryCache};
pub use driver::{is_call_like, is_select_like, Driver, ExecResult, Page};
pub use events::{
    Cancelable, Events, EV_AFTER_DELETE, EV_AFTER_SAVE, EV_BEFORE_DELETE, EV_BEFORE_SAVE, EV_LOAD,
};
pub use mapper::Mapper;
pub use rules::{RecordExists, Unique};

pub use rowmap_core::{
    param_name, quote_ident, Adhoc, AdhocExpr, ColumnInfo, Connection, Error, Field, Params,
    RawRow, Result, Row, SqlType, Value,
};
pub use rowmap_query::{
    compile, stringify, ColumnList, Filter, Operand, OrderTerm, SelectOptions, SortDir,
};

/// The commonly-used surface in one import.
pub mod prelude {
    pub use crate::cache::{CacheStore, MemoryCache};
    pub use crate::driver::{Driver, Page};
    pub use crate::mapper::Mapper;
    pub use rowmap_core::{Connection, Error, Params, Result, Row, Value};
    pub use rowmap_query::{Filter, Operand, SelectOptions};
}
