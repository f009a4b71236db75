//! `pglog_error!` and `bail!`.

/// Creates a [`crate::error::PgLogError`].
///
/// `pglog_error!(kind, "description")` or `pglog_error!(kind, "description", detail)`, where
/// `detail` is anything implementing [`ToString`].
#[macro_export]
macro_rules! pglog_error {
    ($kind:expr, $desc:expr $(,)?) => {
        $crate::error::PgLogError::new($kind, $desc)
    };
    ($kind:expr, $desc:expr, $detail:expr $(,)?) => {
        $crate::error::PgLogError::new($kind, $desc).with_detail($detail.to_string())
    };
}

/// Like [`pglog_error!`], but returns the error from the enclosing function.
#[macro_export]
macro_rules! bail {
    ($($args:tt)+) => {
        return ::core::result::Result::Err($crate::pglog_error!($($args)+))
    };
}
