//! Logging macros that tag every event with a `domain` field.
//!
//! Domains used in this crate: `sys` (lifecycle), `pipe` (per-event trigger
//! processing and spool passes), `res` (stores and publishers), `conf`
//! (rule compilation).
//!
//! ```ignore
//! sig_warn!(pipe, trigger = %t.uuid, error = %e, "rule evaluation failed");
//! ```

#[doc(hidden)]
macro_rules! sig_log {
    ($level:ident, $domain:ident, $($field:tt)*) => {
        tracing::$level!(domain = stringify!($domain), $($field)*)
    };
}

#[allow(unused_macros)]
macro_rules! sig_error {
    ($domain:ident, $($rest:tt)*) => {
        sig_log!(error, $domain, $($rest)*)
    };
}

macro_rules! sig_warn {
    ($domain:ident, $($rest:tt)*) => {
        sig_log!(warn, $domain, $($rest)*)
    };
}

macro_rules! sig_info {
    ($domain:ident, $($rest:tt)*) => {
        sig_log!(info, $domain, $($rest)*)
    };
}

macro_rules! sig_debug {
    ($domain:ident, $($rest:tt)*) => {
        sig_log!(debug, $domain, $($rest)*)
    };
}

#[allow(unused_macros)]
macro_rules! sig_trace {
    ($domain:ident, $($rest:tt)*) => {
        sig_log!(trace, $domain, $($rest)*)
    };
}
