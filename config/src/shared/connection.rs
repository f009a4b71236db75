use secrecy::ExposeSecret;
use tokio_postgres::Config as TokioPgConnectOptions;

use crate::shared::{ValidationError, WriterConfig};

/// Application name reported to the server unless the connection string sets one.
pub const DEFAULT_APPLICATION_NAME: &str = "pglog";

/// Host connected to when the connection string names neither `host` nor `hostaddr`.
pub const DEFAULT_HOST: &str = "localhost";

/// Session options applied to every writer connection.
///
/// Values are sent in text format, so the client encoding must match what the
/// encoder produces.
pub struct DefaultPgConnectionOptions;

impl DefaultPgConnectionOptions {
    /// Returns the options as a string suitable for tokio-postgres options parameter.
    ///
    /// Returns a space-separated list of `-c key=value` pairs.
    pub fn to_options_string() -> String {
        "-c client_encoding=UTF8 -c extra_float_digits=3".to_string()
    }
}

impl WriterConfig {
    /// Parses the connection string into tokio-postgres connect options.
    ///
    /// Session defaults from [`DefaultPgConnectionOptions`], the application name and
    /// [`DEFAULT_HOST`] are only applied when the connection string does not already set them.
    pub fn connect_options(&self) -> Result<TokioPgConnectOptions, ValidationError> {
        let mut options: TokioPgConnectOptions = self
            .conninfo
            .expose_secret()
            .parse()
            .map_err(|err: tokio_postgres::Error| {
                ValidationError::InvalidConnInfo(err.to_string())
            })?;

        if options.get_hosts().is_empty() && options.get_hostaddrs().is_empty() {
            options.host(DEFAULT_HOST);
        }

        if options.get_options().is_none() {
            options.options(DefaultPgConnectionOptions::to_options_string());
        }

        if options.get_application_name().is_none() {
            options.application_name(DEFAULT_APPLICATION_NAME);
        }

        Ok(options)
    }
}
