#[macro_use]
mod log_macros;

pub mod clock;
pub mod error;
pub mod model;
pub mod rule;
pub mod signal;
pub mod spool;
pub mod store;
pub mod trigger;

#[cfg(test)]
pub(crate) mod test_support;
