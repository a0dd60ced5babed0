use crate::{Error, NameComparison, Result};
use std::time::Duration;
use url::{Url, form_urlencoded};

/// Settings of a data source.
#[derive(Debug, Clone, PartialEq)]
pub struct DataSourceConfig {
    /// Upper bound for each command, `None` waits indefinitely.
    pub command_timeout: Option<Duration>,
    /// Default for operations that do not choose: columns without a matching field fail
    /// materialization.
    pub strict_mapping: bool,
    pub name_comparison: NameComparison,
    /// Results kept by the caching appender.
    pub cache_capacity: usize,
}

impl Default for DataSourceConfig {
    fn default() -> Self {
        Self {
            command_timeout: None,
            strict_mapping: false,
            name_comparison: NameComparison::CaseInsensitive,
            cache_capacity: 256,
        }
    }
}

impl DataSourceConfig {
    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = Some(timeout);
        self
    }

    pub fn with_strict_mapping(mut self, strict: bool) -> Self {
        self.strict_mapping = strict;
        self
    }

    pub fn with_name_comparison(mut self, comparison: NameComparison) -> Self {
        self.name_comparison = comparison;
        self
    }

    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = capacity;
        self
    }

    /// Reads the settings from the query of a connection URL.
    ///
    /// Recognized keys are `timeout` (seconds), `strict` (`true`/`false`), `names`
    /// (`ordinal`/`insensitive`) and `cache` (entries). They are removed from the returned
    /// URL, every other key is left for the provider.
    pub fn from_url(url: &str) -> Result<(Self, Url)> {
        let mut url = Url::parse(url).map_err(|e| {
            let error = Error::Configuration(format!("Invalid connection URL `{}`: {}", url, e));
            log::error!("{:#}", error);
            error
        })?;
        let mut config = Self::default();
        let mut rest = Vec::new();
        for (key, value) in url.query_pairs() {
            match &*key {
                "timeout" => {
                    let seconds = value
                        .parse::<f64>()
                        .ok()
                        .filter(|v| v.is_finite() && *v >= 0.0)
                        .ok_or_else(|| invalid(&key, &value))?;
                    config.command_timeout = if seconds == 0.0 {
                        None
                    } else {
                        Some(Duration::from_secs_f64(seconds))
                    };
                }
                "strict" => {
                    config.strict_mapping = match &*value {
                        "true" | "1" | "yes" => true,
                        "false" | "0" | "no" => false,
                        _ => return Err(invalid(&key, &value)),
                    };
                }
                "names" => {
                    config.name_comparison = match &*value.to_ascii_lowercase() {
                        "ordinal" | "sensitive" => NameComparison::Ordinal,
                        "insensitive" | "case_insensitive" => NameComparison::CaseInsensitive,
                        _ => return Err(invalid(&key, &value)),
                    };
                }
                "cache" => {
                    config.cache_capacity =
                        value.parse::<usize>().map_err(|_| invalid(&key, &value))?;
                }
                _ => rest.push((key.into_owned(), value.into_owned())),
            }
        }
        if rest.is_empty() {
            url.set_query(None);
        } else {
            let query = form_urlencoded::Serializer::new(String::new())
                .extend_pairs(rest)
                .finish();
            url.set_query(Some(&query));
        }
        Ok((config, url))
    }
}

fn invalid(key: &str, value: &str) -> Error {
    let error = Error::Configuration(format!(
        "Invalid value `{}` for the connection option `{}`",
        value, key
    ));
    log::error!("{:#}", error);
    error
}
