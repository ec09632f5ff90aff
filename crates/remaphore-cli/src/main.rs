//! `remaphore`: the CLI surface around the core/net/exec crates, the
//! analogue of `original_source/cmd/remaphore/remaphore.go`'s `main()`.

mod cli;

use clap::Parser;
use cli::Args;
use remaphore_core::config_text;
use remaphore_core::message::NewMessage;
use remaphore_core::model::Config;
use remaphore_core::MatchPredicate;
use remaphore_net::{receive, send, send_request, Continuation, LocalBus};
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const EXIT_MATCHED: u8 = 0;
const EXIT_NO_TRAFFIC: u8 = 1;
const EXIT_ARG_ERROR: u8 = 2;
const EXIT_RUNTIME_ERROR: u8 = 3;

fn init_logging() {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("remaphore=info".parse().unwrap()))
        .init();
}

fn arg_error(message: impl AsRef<str>) -> ExitCode {
    eprintln!("remaphore: {}", message.as_ref());
    ExitCode::from(EXIT_ARG_ERROR)
}

#[tokio::main]
async fn main() -> ExitCode {
    init_logging();
    let args = Args::parse();

    if args.print_config {
        println!("{}", config_text::serialize(&config_text::example()));
        return ExitCode::from(EXIT_MATCHED);
    }

    if args.request_reply && args.send_only {
        return arg_error("-r and -s are mutually exclusive");
    }
    if args.no_filter_dest && !args.match_dest.is_empty() {
        return arg_error("-d and -D are mutually exclusive");
    }
    let verbs = args.verbs();
    let message = args.message();
    if (args.request_reply || args.send_only) && (message.is_empty() || verbs.is_empty()) {
        return arg_error("-r and -s require both a verb (-v) and a message to send");
    }

    let sender_override = match &args.pubkey {
        Some(encoded) => match decode_pubkey(encoded) {
            Ok(key) => Some(key),
            Err(e) => return arg_error(e),
        },
        None => None,
    };

    let config_text = match std::fs::read_to_string(&args.config_file) {
        Ok(text) => text,
        Err(e) => return arg_error(format!("reading {}: {e}", args.config_file)),
    };
    let config = match config_text::parse(&config_text) {
        Ok(config) => config,
        Err(e) => return arg_error(e.to_string()),
    };

    let transport = LocalBus::new();
    let cancel = CancellationToken::new();
    let ctrl_c_cancel = cancel.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        ctrl_c_cancel.cancel();
    });

    let outcome = if args.send_only {
        run_send_only(&transport, &config, &args, sender_override, &verbs, &message).await
    } else if args.request_reply {
        run_request_reply(
            &transport,
            &config,
            &args,
            sender_override,
            &verbs,
            &message,
            cancel,
        )
        .await
    } else {
        run_receive(&transport, &config, &args, sender_override, &verbs, cancel).await
    };

    match outcome {
        Ok(true) => ExitCode::from(EXIT_MATCHED),
        Ok(false) => ExitCode::from(EXIT_NO_TRAFFIC),
        Err(e) => {
            error!(error = %e, "runtime error");
            ExitCode::from(EXIT_RUNTIME_ERROR)
        }
    }
}

fn decode_pubkey(encoded: &str) -> Result<[u8; 32], String> {
    let decoded = bs58::decode(encoded)
        .into_vec()
        .map_err(|_| "given public key does not parse".to_string())?;
    decoded
        .try_into()
        .map_err(|_| "given public key does not parse".to_string())
}

async fn run_send_only(
    transport: &LocalBus,
    config: &Config,
    args: &Args,
    sender_override: Option<[u8; 32]>,
    verbs: &[String],
    message: &str,
) -> anyhow::Result<bool> {
    let destination = if args.match_dest.is_empty() {
        "**".to_string()
    } else {
        args.match_dest.clone()
    };
    let new = NewMessage {
        sender: sender_override,
        destination,
        request_reply: false,
        uuid: args.uuid.clone().into_bytes(),
        verb: verbs[0].clone(),
        payload: message.to_string(),
    };
    send(transport, config, args.subject.as_deref(), new).await?;
    Ok(true)
}

async fn run_request_reply(
    transport: &LocalBus,
    config: &Config,
    args: &Args,
    sender_override: Option<[u8; 32]>,
    verbs: &[String],
    message: &str,
    cancel: CancellationToken,
) -> anyhow::Result<bool> {
    let destination = if args.match_dest.is_empty() {
        "**".to_string()
    } else {
        args.match_dest.clone()
    };
    let new = NewMessage {
        sender: sender_override,
        destination,
        request_reply: true,
        uuid: args.uuid.clone().into_bytes(),
        verb: verbs[0].clone(),
        payload: message.to_string(),
    };

    let mut received = false;
    let mut random_sep = [0u8; 16];
    use rand::RngCore;
    rand::rngs::OsRng.fill_bytes(&mut random_sep);
    let sep = hex::encode(random_sep);

    let run = send_request(
        transport,
        config,
        args.subject.as_deref(),
        new,
        cancel.clone(),
        |reply| {
            received = true;
            print_reply(config, &reply, &sep);
        },
    );

    match args.timeout {
        Some(timeout) => {
            tokio::select! {
                result = run => result?,
                _ = tokio::time::sleep(timeout) => cancel.cancel(),
            }
        }
        None => run.await?,
    }
    Ok(received)
}

fn print_reply(config: &Config, reply: &remaphore_core::message::Message, sep: &str) {
    let destination = config.peer_destination(&reply.sender_public_key);
    let payload = reply.payload.trim();
    if payload.contains('\n') {
        println!("--> {sep}\n{destination},{payload}\n--< {sep}");
    } else {
        println!("{destination},{payload}");
    }
}

async fn run_receive(
    transport: &LocalBus,
    config: &Config,
    args: &Args,
    sender_override: Option<[u8; 32]>,
    verbs: &[String],
    cancel: CancellationToken,
) -> anyhow::Result<bool> {
    let mut once = args.once;
    let mut predicates = Vec::new();
    if !args.uuid.is_empty() {
        predicates.push(MatchPredicate::UuidEquals(args.uuid.clone().into_bytes()));
        once = true;
    }
    if !verbs.is_empty() {
        predicates.push(MatchPredicate::VerbIn(verbs.to_vec()));
    }
    if let Some(key) = sender_override {
        predicates.push(MatchPredicate::SenderKeyEquals(key));
    }
    if !args.no_filter_dest {
        let explicit = (!args.match_dest.is_empty()).then(|| args.match_dest.clone());
        predicates.push(MatchPredicate::Destination(explicit));
    }

    let command = args.remainder.clone();
    let received = Arc::new(AtomicBool::new(false));

    let run = receive(transport, config, args.subject.as_deref(), &predicates, cancel.clone(), {
        let received = received.clone();
        move |message, reply| {
            let command = command.clone();
            let received = received.clone();
            Box::pin(async move {
                info!("incoming message");
                received.store(true, Ordering::Relaxed);
                let out = if !command.is_empty() {
                    match remaphore_exec::exec(config, &command, &message, CancellationToken::new()).await {
                        Ok(out) => out,
                        Err(e) => {
                            warn!(error = %e, "subprocess failed");
                            String::new()
                        }
                    }
                } else {
                    "NO_DATA".to_string()
                };
                if let Some(reply) = reply {
                    if let Err(e) = reply
                        .reply(NewMessage {
                            sender: None,
                            destination: String::new(),
                            request_reply: false,
                            uuid: vec![],
                            verb: String::new(),
                            payload: out,
                        })
                        .await
                    {
                        warn!(error = %e, "reply failed");
                    }
                }
                if once {
                    Continuation::Stop
                } else {
                    Continuation::Continue
                }
            })
        }
    });

    match args.timeout {
        Some(timeout) => match tokio::time::timeout(timeout, run).await {
            Ok(result) => result?,
            Err(_) => {}
        },
        None => run.await?,
    }

    Ok(received.load(Ordering::Relaxed))
}
