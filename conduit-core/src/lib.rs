mod appender;
mod as_value;
mod builder;
mod config;
mod data_source;
mod driver;
mod error;
mod executor;
mod materializer;
mod metadata;
mod object_name;
mod operation;
mod provider;
mod query;
mod schema_cache;
mod token;
mod util;
mod value;
mod writer;

pub use ::anyhow::Context as ErrorContext;
pub use appender::*;
pub use as_value::*;
pub use builder::*;
pub use config::*;
pub use data_source::*;
pub use driver::*;
pub use error::*;
pub use executor::*;
pub use materializer::*;
pub use metadata::*;
pub use object_name::*;
pub use operation::*;
pub use provider::*;
pub use query::*;
pub use schema_cache::*;
pub use token::*;
pub use util::*;
pub use value::*;
pub use writer::*;
pub use ::futures::future;
pub use ::tokio_util::sync::CancellationToken;
