pub mod ast;
mod checker;
pub mod parse_utils;
mod rule_parser;

pub use checker::{BUILTINS, Builtin, CheckError, check_rule};
pub use rule_parser::parse_rule;

/// Rule-language revision understood by this crate.
pub const RULE_API_VERSION: u32 = 1;

/// Top-level names a rule expression may reference.
pub const RULE_NAMESPACES: [&str; 4] = ["evt", "dev", "component", "service"];
