//! CLI definitions for Herbie.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Herbie CLI.
#[derive(Parser)]
#[command(name = "herbie")]
#[command(about = "Pseudo-English browser test scripting engine")]
#[command(version)]
pub(crate) struct Cli {
    /// Configuration file path (default: ~/.herbie/config.toml)
    #[arg(short, long, global = true, env = "HERBIE_CONFIG")]
    pub config: Option<PathBuf>,

    /// State file path (default: storage.state_path from the config)
    #[arg(long, global = true, env = "HERBIE_STATE")]
    pub state: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Parse a script and print its command tree as JSON
    Parse {
        /// Script file
        script: PathBuf,

        /// Page URL whose domain selects local keywords
        #[arg(long)]
        url: Option<String>,

        /// Keyword tables JSON to use instead of the state file
        #[arg(long)]
        keywords: Option<PathBuf>,
    },

    /// Run a script against a Chrome page
    Run {
        /// Script file
        script: PathBuf,

        /// Open this URL in a new tab instead of using the first page
        #[arg(long)]
        url: Option<String>,

        /// Zero-based top-level step to start from
        #[arg(long, default_value_t = 0)]
        start_line: usize,

        /// Chrome debugging endpoint (default: browser.cdp_endpoint)
        #[arg(long)]
        endpoint: Option<String>,
    },

    /// Continue the persisted run after its last completed step
    Resume {
        /// Chrome debugging endpoint (default: browser.cdp_endpoint)
        #[arg(long)]
        endpoint: Option<String>,
    },

    /// Ask a running script to halt before its next step
    Stop,

    /// Watch a script's verify statements while a tester uses the page
    Observe {
        /// Script file
        script: PathBuf,

        #[arg(long, default_value = "Usability task")]
        task_name: String,

        #[arg(long, default_value = "anonymous")]
        tester_name: String,

        /// How long to watch before ending the test
        #[arg(long, default_value_t = 60)]
        duration_secs: u64,

        /// Chrome debugging endpoint (default: browser.cdp_endpoint)
        #[arg(long)]
        endpoint: Option<String>,
    },

    /// Keyword table management
    Keywords {
        #[command(subcommand)]
        action: KeywordsAction,
    },
}

#[derive(Subcommand)]
pub(crate) enum KeywordsAction {
    /// Merge keyword tables from a JSON file into the state file
    Import {
        /// `{ "globalKeywords": [..], "localKeywords": { domain: [..] } }`
        file: PathBuf,
    },

    /// Print the stored keyword tables
    List {
        /// Only this registrable domain's local keywords
        #[arg(long)]
        domain: Option<String>,
    },
}
