//! Structured log helpers.
//!
//! Every relay log line carries a `component` field (`hub`, `pipeline`,
//! `store`, `producer`, ...) so logs can be filtered per stage.

/// Log with a `component` field attached.
///
/// ```rust,ignore
/// log_event!(warn, "pipeline", "Envelope rejected", reason = "decrypt");
/// ```
#[macro_export]
macro_rules! log_event {
    (info, $component:expr, $msg:expr $(, $($field:tt)*)?) => {
        tracing::info!(
            component = $component,
            $($($field)*,)?
            $msg
        )
    };

    (warn, $component:expr, $msg:expr $(, $($field:tt)*)?) => {
        tracing::warn!(
            component = $component,
            $($($field)*,)?
            $msg
        )
    };

    (error, $component:expr, $msg:expr $(, $($field:tt)*)?) => {
        tracing::error!(
            component = $component,
            $($($field)*,)?
            $msg
        )
    };

    (debug, $component:expr, $msg:expr $(, $($field:tt)*)?) => {
        tracing::debug!(
            component = $component,
            $($($field)*,)?
            $msg
        )
    };
}

/// Log a connection lifecycle event with standard fields.
#[macro_export]
macro_rules! log_connection_event {
    ($level:ident, $msg:expr, $connection_id:expr, $role:expr $(, $($field:tt)*)?) => {
        tracing::$level!(
            component = "hub",
            connection_id = %$connection_id,
            role = %$role,
            $($($field)*,)?
            $msg
        )
    };
}
