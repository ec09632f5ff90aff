//! C8: subprocess executor (spec §4.8).
//!
//! Ported from `original_source/src/subprocess/exec.go`'s `Exec`: the
//! `REMAPHORE_*` environment contract, the `verb payload` trailing args,
//! and the `"<exit-code>,<combined-output>"` return shape are carried over
//! verbatim.

use remaphore_core::message::Message;
use remaphore_core::model::Config;
use remaphore_core::wildcard::match_wildcards;
use std::process::Stdio;
use thiserror::Error;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("failed to launch subprocess: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("subprocess cancelled")]
    Cancelled,
}

/// Run `args[0] args[1..] <verb> <payload>` with the `REMAPHORE_*`
/// environment variables set from `message`, killing the child if `cancel`
/// fires first. Returns `"<exit-code>,<combined-output>"` the way the
/// original does; a non-zero exit code is not itself an error.
pub async fn exec(
    config: &Config,
    args: &[String],
    message: &Message,
    cancel: CancellationToken,
) -> Result<String, ExecError> {
    let mut full_args = args.to_vec();
    full_args.push(message.verb.clone());
    full_args.push(message.payload.clone());

    let dest_matches = match_wildcards(&config.destination, &message.destination);

    let mut cmd = Command::new(&full_args[0]);
    cmd.args(&full_args[1..]);
    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());
    cmd.kill_on_drop(true);

    cmd.env("REMAPHORE_SENDER", bs58::encode(message.sender_public_key).into_string());
    cmd.env("REMAPHORE_VERB", &message.verb);
    cmd.env(
        "REMAPHORE_TIME",
        (message.send_time_nanos / 1_000_000_000).to_string(),
    );
    cmd.env("REMAPHORE_UUID", hex::encode(&message.uuid));
    cmd.env("REMAPHORE_MSG", &message.payload);
    if dest_matches {
        cmd.env("REMAPHORE_DESTMATCH", &config.destination);
    }

    let child = cmd.spawn().map_err(ExecError::Spawn)?;

    let output = tokio::select! {
        _ = cancel.cancelled() => return Err(ExecError::Cancelled),
        result = child.wait_with_output() => result.map_err(ExecError::Spawn)?,
    };

    let exit_code = output.status.code().unwrap_or(-1);
    let mut combined = output.stdout;
    combined.extend_from_slice(&output.stderr);
    let combined = String::from_utf8_lossy(&combined);

    tracing::info!(exit_code, command = %full_args.join(" "), "subprocess exec");

    Ok(format!("{exit_code},{combined}"))
}
