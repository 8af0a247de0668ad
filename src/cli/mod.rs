//! CLI subcommands (§6 External interfaces). Each module is thin: parse its
//! own flags (already done by `clap` in `main.rs`), then call straight into
//! the store/orchestrator/audit APIs and format the result. None of these
//! hold business logic of their own.

pub mod discover;
pub mod fix;
pub mod monitor;
pub mod restart;
pub mod retry;
pub mod special;
pub mod start;
pub mod status;
pub mod verify;

use crate::error::{PipelineError, Result};
use uuid::Uuid;

/// Exit codes (§6): 0 success, 1 recoverable (some items failed but the
/// pipeline ran), 2 fatal configuration/store error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    Success = 0,
    Recoverable = 1,
    Fatal = 2,
}

impl ExitCode {
    pub fn code(self) -> i32 {
        self as i32
    }
}

/// Parse a `--file-ids` comma-separated list into UUIDs, rejecting the whole
/// batch if any entry doesn't parse (fail fast rather than silently drop a
/// typo'd id).
pub fn parse_file_ids(csv: &str) -> Result<Vec<Uuid>> {
    csv.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<Uuid>()
                .map_err(|_| PipelineError::Validation(format!("invalid file id: {s}")))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_file_ids_splits_and_trims() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let csv = format!(" {a}, {b} ");
        let parsed = parse_file_ids(&csv).unwrap();
        assert_eq!(parsed, vec![a, b]);
    }

    #[test]
    fn test_parse_file_ids_rejects_garbage() {
        assert!(parse_file_ids("not-a-uuid").is_err());
    }

    #[test]
    fn test_parse_file_ids_empty_string_is_empty_list() {
        assert!(parse_file_ids("").unwrap().is_empty());
    }
}
