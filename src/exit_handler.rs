//! Exit code logic for the crawler process.

use std::process::ExitCode;

/// How the process ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ProcessExit {
    /// Everything requested was done.
    Success,
    /// Some queries or lookups failed, others succeeded.
    Partial,
    /// Nothing succeeded, or the run was stopped (e.g. keys exhausted).
    Failure,
}

impl From<ProcessExit> for ExitCode {
    fn from(exit: ProcessExit) -> Self {
        match exit {
            ProcessExit::Success => ExitCode::SUCCESS,
            ProcessExit::Partial => ExitCode::from(2),
            ProcessExit::Failure => ExitCode::FAILURE,
        }
    }
}

/// Maps completed and failed unit counts to the process exit outcome.
pub(crate) fn determine_exit_outcome(completed: usize, failed: usize) -> ProcessExit {
    if failed == 0 {
        ProcessExit::Success
    } else if completed > 0 {
        ProcessExit::Partial
    } else {
        ProcessExit::Failure
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_outcome_success_when_no_failures() {
        assert_eq!(determine_exit_outcome(3, 0), ProcessExit::Success);
        assert_eq!(determine_exit_outcome(0, 0), ProcessExit::Success);
    }

    #[test]
    fn test_exit_outcome_partial_when_mixed() {
        assert_eq!(determine_exit_outcome(2, 1), ProcessExit::Partial);
    }

    #[test]
    fn test_exit_outcome_failure_when_all_failed() {
        assert_eq!(determine_exit_outcome(0, 2), ProcessExit::Failure);
    }
}
