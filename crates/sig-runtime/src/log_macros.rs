//! `domain`-tagged logging for the runtime: `sys` for lifecycle and
//! signals, `pipe` for the scheduler loop, `res` for sinks, `conf` for
//! configuration.

macro_rules! sig_log {
    ($level:ident, $domain:ident, $($field:tt)*) => {
        tracing::$level!(domain = stringify!($domain), $($field)*)
    };
}

#[allow(unused_macros)]
macro_rules! sig_error {
    ($domain:ident, $($rest:tt)*) => { sig_log!(error, $domain, $($rest)*) };
}

macro_rules! sig_warn {
    ($domain:ident, $($rest:tt)*) => { sig_log!(warn, $domain, $($rest)*) };
}

macro_rules! sig_info {
    ($domain:ident, $($rest:tt)*) => { sig_log!(info, $domain, $($rest)*) };
}

macro_rules! sig_debug {
    ($domain:ident, $($rest:tt)*) => { sig_log!(debug, $domain, $($rest)*) };
}

macro_rules! sig_trace {
    ($domain:ident, $($rest:tt)*) => { sig_log!(trace, $domain, $($rest)*) };
}
