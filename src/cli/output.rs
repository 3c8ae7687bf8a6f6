//! CLI output: error mapping from store errors to the CLI surface.

use crate::error::ConfError;

/// Map store errors to a string for CLI output.
pub fn map_error(e: &ConfError) -> String {
    match e {
        ConfError::Parse { file, line, message } => format!("{}:{}: {}", file, line, message),
        ConfError::NotFound(path) => format!("{}: not found", path),
        other => other.to_string(),
    }
}

/// Process exit code for a failed command
pub fn exit_code(e: &ConfError) -> i32 {
    match e {
        ConfError::NotFound(_) => 2,
        _ => 1,
    }
}
