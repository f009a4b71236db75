use std::collections::BTreeMap;
use std::future::Future;

use crate::error::PgLogResult;
use crate::types::{Field, Value};

/// Description of the stream a writer is opened for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriterInfo {
    /// Path of the stream, used as the destination table name.
    pub path: String,
    /// Writer options as passed by the host.
    pub config: BTreeMap<String, String>,
}

impl WriterInfo {
    /// Creates a new [`WriterInfo`].
    pub fn new(path: impl Into<String>, config: BTreeMap<String, String>) -> WriterInfo {
        Self {
            path: path.into(),
            config,
        }
    }

    /// Iterates over the options as borrowed key/value pairs.
    pub fn options(&self) -> impl Iterator<Item = (&str, &str)> {
        self.config.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Trait for backends receiving the records of one log stream.
///
/// The host calls [`WriterBackend::init`] once with the stream's schema, then
/// [`WriterBackend::write`] once per record with values in the same order as the fields. All
/// methods take `&mut self`, so a backend never sees two calls for the same stream at once.
///
/// A failed `init` or `write` is fatal for the stream. The lifecycle methods have no-op default
/// implementations; override them if the backend buffers or owns files.
pub trait WriterBackend {
    /// Returns the name of the backend.
    fn name() -> &'static str;

    /// Prepares the backend for a stream described by `info` and `fields`.
    fn init(
        &mut self,
        info: &WriterInfo,
        fields: &[Field],
    ) -> impl Future<Output = PgLogResult<()>> + Send;

    /// Writes one record.
    fn write(
        &mut self,
        fields: &[Field],
        values: &[Value],
    ) -> impl Future<Output = PgLogResult<()>> + Send;

    /// Flushes buffered records.
    fn flush(&mut self, _network_time: f64) -> impl Future<Output = PgLogResult<()>> + Send {
        async { Ok(()) }
    }

    /// Rotates the output of the stream to `rotated_path`.
    ///
    /// Returning `Ok` reports the rotation as finished.
    fn rotate(
        &mut self,
        _rotated_path: &str,
        _open: f64,
        _close: f64,
        _terminating: bool,
    ) -> impl Future<Output = PgLogResult<()>> + Send {
        async { Ok(()) }
    }

    /// Enables or disables buffering.
    fn set_buffering(&mut self, _enabled: bool) -> impl Future<Output = PgLogResult<()>> + Send {
        async { Ok(()) }
    }

    /// Called periodically by the host, even when no records arrive.
    fn heartbeat(
        &mut self,
        _network_time: f64,
        _current_time: f64,
    ) -> impl Future<Output = PgLogResult<()>> + Send {
        async { Ok(()) }
    }

    /// Called once when the stream ends.
    fn finish(&mut self, _network_time: f64) -> impl Future<Output = PgLogResult<()>> + Send {
        async { Ok(()) }
    }
}
