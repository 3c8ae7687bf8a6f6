//! CLI domain: parse, route, output and presentation only.
//! Store semantics live in [`crate::store`]; the route table only wires them up.

mod output;
mod parse;
mod presentation;
mod route;

pub use output::{exit_code, map_error};
pub use parse::{Cli, Commands};
pub use route::RunContext;
