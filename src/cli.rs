//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;

/// Redeem a bulk download token and pull every file it covers to local disk.
///
/// The token is either a bare token copied from VaultDoor, or an
/// `archivehunter:vaultdownload:<token>` / `archivehunter:bulkdownload:<token>`
/// link handed over by the browser.
#[derive(Parser, Debug)]
#[command(name = "bulkpull")]
#[command(author, version, about)]
pub struct Args {
    /// Download token or archivehunter: URI
    pub token: Option<String>,

    /// Path to a YAML config file (default: bulkpull.yaml next to the executable)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Download path, overriding `download_path` from the config file
    #[arg(long, value_name = "DIR")]
    pub to: Option<String>,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,
}

impl Args {
    /// Returns the default log filter directive for the verbosity flags.
    ///
    /// `--quiet` wins over `-v`; `RUST_LOG` overrides both at subscriber setup.
    #[must_use]
    pub fn default_log_level(&self) -> &'static str {
        if self.quiet {
            return "error";
        }
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}
