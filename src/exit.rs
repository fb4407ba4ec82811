//! Process exit codes and the closing pause.

use std::io::{self, BufRead, Write};
use std::process::ExitCode;

use bulkpull_core::PoolStats;

/// Exit outcome of one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ProcessExit {
    /// Every entry was downloaded.
    Success,
    /// No token was given on the command line.
    MissingToken,
    /// The config file could not be loaded.
    Config,
    /// A backend URI is missing or malformed.
    InvalidUri,
    /// The token was malformed or could not be redeemed.
    Token,
    /// The HTTP client or download pool could not be set up.
    Init,
    /// Neither `--to` nor `download_path` is set.
    NoDownloadPath,
    /// The run finished but some entries failed or were blocked.
    Incomplete,
}

impl ProcessExit {
    /// Returns the numeric process exit code.
    pub(crate) fn code(self) -> u8 {
        match self {
            Self::Success => 0,
            Self::MissingToken => 1,
            Self::Config => 3,
            Self::InvalidUri => 4,
            Self::Token => 5,
            Self::Init => 6,
            Self::NoDownloadPath => 7,
            Self::Incomplete => 8,
        }
    }
}

impl From<ProcessExit> for ExitCode {
    fn from(exit: ProcessExit) -> Self {
        ExitCode::from(exit.code())
    }
}

/// Maps final pool statistics to the process exit outcome.
pub(crate) fn determine_exit_outcome(stats: &PoolStats) -> ProcessExit {
    if stats.all_completed() {
        ProcessExit::Success
    } else {
        ProcessExit::Incomplete
    }
}

/// Keeps a console window open until the user presses ENTER.
pub(crate) fn pause_before_exit(immediate_exit: bool) {
    if immediate_exit {
        return;
    }
    print!("Press ENTER to close...");
    let _ = io::stdout().flush();
    let mut line = String::new();
    let _ = io::stdin().lock().read_line(&mut line);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_are_stable() {
        let expected = [
            (ProcessExit::Success, 0),
            (ProcessExit::MissingToken, 1),
            (ProcessExit::Config, 3),
            (ProcessExit::InvalidUri, 4),
            (ProcessExit::Token, 5),
            (ProcessExit::Init, 6),
            (ProcessExit::NoDownloadPath, 7),
            (ProcessExit::Incomplete, 8),
        ];
        for (exit, code) in expected {
            assert_eq!(exit.code(), code, "{exit:?}");
        }
    }

    #[test]
    fn test_exit_outcome_success_when_nothing_processed() {
        assert_eq!(
            determine_exit_outcome(&PoolStats::new()),
            ProcessExit::Success
        );
    }
}
