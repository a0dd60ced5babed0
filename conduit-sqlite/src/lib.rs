mod connection;
mod driver;
mod extract;
mod metadata;
mod provider;
mod sql_writer;

pub use connection::*;
pub use driver::*;
pub use provider::*;
pub use sql_writer::*;
