mod caching;
mod employee;
mod fixtures;
mod limits;
mod stub;
mod transactions;

pub use employee::Employee;
pub use fixtures::*;
pub use stub::*;

use crate::{caching::caching, employee::employee, limits::limits};
use conduit_core::{DataSource, Executor, Provider, Value};
use log::LevelFilter;
use std::env;
#[cfg(not(feature = "disable-transactions"))]
use transactions::transactions;

/// Use as the parameters of raw SQL without parameters.
pub const NO_PARAMETERS: [(&str, Value); 0] = [];

pub fn init_logs() {
    let mut logger = env_logger::builder();
    logger
        .is_test(true)
        .format_file(true)
        .format_line_number(true);
    if env::var("RUST_LOG").is_err() {
        logger.filter_level(LevelFilter::Warn);
    }
    let _ = logger.try_init();
}

/// Runs the common suite against a provider backed by a real database.
pub async fn execute_tests<P: Provider>(data_source: &DataSource<P>) {
    employee(data_source).await;
    limits(data_source).await;
    caching(data_source).await;
    #[cfg(not(feature = "disable-transactions"))]
    transactions(data_source).await;
}

/// Runs each statement as a non query, then forgets the cached metadata.
pub fn script<P: Provider>(data_source: &DataSource<P>, statements: &[&str]) {
    for statement in statements {
        data_source
            .sql(*statement, NO_PARAMETERS)
            .to_rows_affected()
            .execute()
            .unwrap_or_else(|e| panic!("Could not run `{}`: {:#}", statement, e));
    }
    data_source.reset_metadata();
}

#[macro_export]
macro_rules! silent_logs {
    ($($code:tt)+) => {{
        let level = log::max_level();
        log::set_max_level(log::LevelFilter::Off);
        $($code)+
        log::set_max_level(level);
    }};
}
