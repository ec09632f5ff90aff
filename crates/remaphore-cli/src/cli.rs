//! CLI surface (spec §6 / SPEC_FULL §7), translating
//! `original_source/cmd/remaphore/remaphore.go`'s flag set
//! (`-c -C -S -v -o -u -t -r -s -p -d -D`) into long-form `clap` options
//! with the original's short letters kept as aliases.

use clap::Parser;
use std::time::Duration;

/// Command-driven, authenticated fan-out messaging tool for operator fleets.
#[derive(Parser, Debug, Clone)]
#[command(name = "remaphore")]
#[command(about = "Signed, wildcard-addressed pub/sub messaging for operator fleets")]
pub struct Args {
    /// Path to the config file.
    #[arg(short = 'c', long = "config", default_value = "/etc/remaphore/remaphore.conf")]
    pub config_file: String,

    /// Print an example config file and exit.
    #[arg(short = 'C', long = "print-config")]
    pub print_config: bool,

    /// Subject suffix to communicate on (appended to the configured base subject).
    #[arg(short = 'S', long = "subject")]
    pub subject: Option<String>,

    /// Verb to send, or comma-separated verbs to filter for on receive.
    #[arg(short = 'v', long = "verb", default_value = "")]
    pub verb: String,

    /// Exit after one matching message is received.
    #[arg(short = 'o', long = "once")]
    pub once: bool,

    /// UUID to send, or to filter for on receive (implies `--once`).
    #[arg(short = 'u', long = "uuid", default_value = "")]
    pub uuid: String,

    /// Timeout for the operation, e.g. `30s`, `500ms`, `1m`.
    #[arg(short = 't', long = "timeout", value_parser = parse_duration)]
    pub timeout: Option<Duration>,

    /// Request a reply to the sent message.
    #[arg(short = 'r', long = "request-reply")]
    pub request_reply: bool,

    /// Send-and-forget, no reply expected.
    #[arg(short = 's', long = "send-only")]
    pub send_only: bool,

    /// Use this Base58 public key as sender, or match for it on receive.
    #[arg(short = 'p', long = "pubkey")]
    pub pubkey: Option<String>,

    /// Do not filter by destination on receive.
    #[arg(short = 'd', long = "no-filter-dest")]
    pub no_filter_dest: bool,

    /// Destination to send to, or exact-match for on receive.
    #[arg(short = 'D', long = "match-dest", default_value = "")]
    pub match_dest: String,

    /// Remaining words: the message body to send, or the subprocess
    /// command (plus arguments) to run per matching message on receive.
    #[arg(trailing_var_arg = true)]
    pub remainder: Vec<String>,
}

fn parse_duration(s: &str) -> Result<Duration, String> {
    remaphore_core::config_text::parse_duration(s).map_err(|e| e.to_string())
}

impl Args {
    pub fn verbs(&self) -> Vec<String> {
        self.verb
            .split(',')
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn message(&self) -> String {
        self.remainder.join(" ")
    }
}
