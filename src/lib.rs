//! Fluent data access: operations are composed through a builder chain started from a
//! [`DataSource`] or a [`TransactionScope`] and closed by a materializer selecting the shape
//! of the result, then executed synchronously or asynchronously.
//!
//! Backends plug in through the [`Provider`] and [`Driver`] traits, see the `conduit-sqlite`,
//! `conduit-postgres`, `conduit-mssql` and `conduit-oledb` crates.
pub use conduit_core::*;
