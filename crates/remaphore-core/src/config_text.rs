//! C9: line-oriented config text format (spec §4.9).
//!
//! Ported from `original_source/src/config/parser.go` (`ParseConfig`,
//! `parseIdentity`, `parsePeer`, `parsePermissions`, `validateConfig`) and
//! `src/protocol/config.go`'s `Config.String()` / `NewConfig()`. Not TOML:
//! a `key: value` general section followed by `[identities]`/`[peers]`
//! sections of space-separated records, `#` comments, blank lines ignored.

use crate::model::{Config, Identity, Peer, DEFAULT_ALLOWED_SKEW, DEFAULT_SUBJECT, PUBLIC_KEY_SIZE};
use std::time::Duration;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigTextError {
    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),
    #[error("invalid private key: {0}")]
    InvalidPrivateKey(String),
    #[error("bad format: \"{0}\"")]
    BadFormat(String),
    #[error("not valid permissions: {0}")]
    BadPermissions(String),
    #[error("invalid duration: {0}")]
    BadDuration(String),
    #[error("no transport endpoints configured")]
    NoEndpoints,
    #[error("no transport credentials configured")]
    NoCredentials,
    #[error("no identities configured")]
    NoIdentities,
    #[error("no destination configured")]
    NoDestination,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum State {
    General,
    Identity,
    Peer,
}

fn clean_line(s: &str) -> &str {
    let s = s.trim();
    match s.find('#') {
        Some(p) => s[..p].trim_end(),
        None => s,
    }
}

fn split_value(s: &str) -> Option<(String, String)> {
    let p = s.find(':')?;
    if p == 0 {
        return None;
    }
    let key = clean_line(&s[..p]).to_lowercase();
    let value = clean_line(&s[p + 1..]).to_string();
    Some((key, value))
}

fn parse_permissions(s: &str) -> Result<Vec<String>, ConfigTextError> {
    if s.starts_with('[') && s.ends_with(']') {
        let inner = clean_line(&s[1..s.len() - 1]).to_lowercase();
        Ok(inner
            .split(',')
            .map(clean_line)
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .collect())
    } else {
        Err(ConfigTextError::BadPermissions(s.to_string()))
    }
}

fn parse_identity(line: &str) -> Result<Identity, ConfigTextError> {
    let fields: Vec<&str> = line.splitn(3, ' ').collect();
    if fields.len() != 3 {
        return Err(ConfigTextError::BadFormat(line.to_string()));
    }
    let public_key_vec = bs58::decode(fields[0])
        .into_vec()
        .map_err(|_| ConfigTextError::InvalidPublicKey(fields[0].to_string()))?;
    let public_key: [u8; PUBLIC_KEY_SIZE] = public_key_vec
        .try_into()
        .map_err(|_| ConfigTextError::InvalidPublicKey(fields[0].to_string()))?;
    let private_key_vec = bs58::decode(fields[1])
        .into_vec()
        .map_err(|_| ConfigTextError::InvalidPrivateKey(fields[1].to_string()))?;
    let private_key: [u8; 64] = private_key_vec
        .try_into()
        .map_err(|_| ConfigTextError::InvalidPrivateKey(fields[1].to_string()))?;
    let permissions = parse_permissions(fields[2])?;
    Ok(Identity {
        public_key,
        private_key,
        permissions,
    })
}

fn parse_peer(line: &str) -> Result<Peer, ConfigTextError> {
    let fields: Vec<&str> = line.splitn(3, ' ').collect();
    if fields.len() != 3 {
        return Err(ConfigTextError::BadFormat(line.to_string()));
    }
    let public_key_vec = bs58::decode(fields[1])
        .into_vec()
        .map_err(|_| ConfigTextError::InvalidPublicKey(fields[0].to_string()))?;
    let public_key: [u8; PUBLIC_KEY_SIZE] = public_key_vec
        .try_into()
        .map_err(|_| ConfigTextError::InvalidPublicKey(fields[0].to_string()))?;
    let permissions = parse_permissions(fields[2])?;
    Ok(Peer {
        public_key,
        destination: fields[0].to_string(),
        permissions,
    })
}

/// Parse Go's `time.ParseDuration` format well enough for config values:
/// a sequence of `<number><unit>` terms (`ns`, `us`, `ms`, `s`, `m`, `h`),
/// summed.
pub fn parse_duration(s: &str) -> Result<Duration, ConfigTextError> {
    let mut total = Duration::ZERO;
    let mut rest = s;
    if rest.is_empty() {
        return Err(ConfigTextError::BadDuration(s.to_string()));
    }
    while !rest.is_empty() {
        let digits_end = rest
            .find(|c: char| !c.is_ascii_digit() && c != '.')
            .ok_or_else(|| ConfigTextError::BadDuration(s.to_string()))?;
        if digits_end == 0 {
            return Err(ConfigTextError::BadDuration(s.to_string()));
        }
        let number: f64 = rest[..digits_end]
            .parse()
            .map_err(|_| ConfigTextError::BadDuration(s.to_string()))?;
        rest = &rest[digits_end..];
        let (unit_len, nanos_per_unit) = if rest.starts_with("ns") {
            (2, 1.0)
        } else if rest.starts_with("us") {
            (2, 1_000.0)
        } else if rest.starts_with("ms") {
            (2, 1_000_000.0)
        } else if rest.starts_with('s') {
            (1, 1_000_000_000.0)
        } else if rest.starts_with('m') {
            (1, 60.0 * 1_000_000_000.0)
        } else if rest.starts_with('h') {
            (1, 3_600.0 * 1_000_000_000.0)
        } else {
            return Err(ConfigTextError::BadDuration(s.to_string()));
        };
        total += Duration::from_nanos((number * nanos_per_unit) as u64);
        rest = &rest[unit_len..];
    }
    Ok(total)
}

fn format_duration(d: Duration) -> String {
    if d.subsec_nanos() == 0 {
        format!("{}s", d.as_secs())
    } else {
        format!("{}ms", d.as_millis())
    }
}

/// Parse the config text format into a validated `Config`.
pub fn parse(text: &str) -> Result<Config, ConfigTextError> {
    let mut state = State::General;

    let mut transport_endpoints = Vec::new();
    let mut transport_credentials = String::new();
    let mut base_subject = String::new();
    let mut default_key: Option<[u8; PUBLIC_KEY_SIZE]> = None;
    let mut destination = String::new();
    let mut allowed_clock_skew: Option<Duration> = None;
    let mut identities = Vec::new();
    let mut peers = Vec::new();

    for raw_line in text.lines() {
        let line = clean_line(raw_line);
        if line.is_empty() {
            continue;
        }
        if line.starts_with('[') && line.ends_with(']') {
            let section = clean_line(&line[1..line.len() - 1]).to_lowercase();
            match section.as_str() {
                "identities" => state = State::Identity,
                "peers" => state = State::Peer,
                _ => {}
            }
            continue;
        }
        match state {
            State::General => {
                let Some((key, value)) = split_value(line) else {
                    continue;
                };
                if key.is_empty() || value.is_empty() {
                    continue;
                }
                match key.as_str() {
                    "server" => transport_endpoints.push(value),
                    "credentials" => transport_credentials = value,
                    "subject" => base_subject = value,
                    "destination" => destination = value,
                    "default_identity" => {
                        let decoded = bs58::decode(&value)
                            .into_vec()
                            .map_err(|_| ConfigTextError::InvalidPublicKey(value.clone()))?;
                        let key: [u8; PUBLIC_KEY_SIZE] = decoded
                            .try_into()
                            .map_err(|_| ConfigTextError::InvalidPublicKey(value.clone()))?;
                        default_key = Some(key);
                    }
                    "allow_skew" => allowed_clock_skew = Some(parse_duration(&value)?),
                    _ => {}
                }
            }
            State::Identity => identities.push(parse_identity(line)?),
            State::Peer => peers.push(parse_peer(line)?),
        }
    }

    if transport_endpoints.is_empty() {
        return Err(ConfigTextError::NoEndpoints);
    }
    if transport_credentials.is_empty() {
        return Err(ConfigTextError::NoCredentials);
    }
    if identities.is_empty() {
        return Err(ConfigTextError::NoIdentities);
    }
    if destination.is_empty() {
        return Err(ConfigTextError::NoDestination);
    }
    let allowed_clock_skew = match allowed_clock_skew {
        Some(d) if d != Duration::ZERO => d,
        _ => DEFAULT_ALLOWED_SKEW,
    };
    let base_subject = if base_subject.is_empty() {
        DEFAULT_SUBJECT.to_string()
    } else {
        base_subject
    };
    let default_key = default_key.unwrap_or(identities[0].public_key);

    Ok(Config {
        transport_endpoints,
        transport_credentials,
        base_subject,
        default_key,
        destination,
        allowed_clock_skew,
        identities,
        peers,
    })
}

/// Serialize a `Config` back to the text format (round-trips through `parse`).
pub fn serialize(config: &Config) -> String {
    let mut lines = Vec::new();
    for endpoint in &config.transport_endpoints {
        lines.push(format!("server: {endpoint}"));
    }
    lines.push(format!("credentials: {}", config.transport_credentials));
    lines.push(format!("subject: {}", config.base_subject));
    lines.push(format!(
        "default_identity: {}",
        bs58::encode(config.default_key).into_string()
    ));
    lines.push(format!("destination: {}", config.destination));
    lines.push(format!(
        "allow_skew: {}",
        format_duration(config.allowed_clock_skew)
    ));
    lines.push(String::new());
    lines.push("[identities]".to_string());
    for identity in &config.identities {
        lines.push(format!(
            "{} {} [{}]",
            bs58::encode(identity.public_key).into_string(),
            bs58::encode(identity.private_key).into_string(),
            identity.permissions.join(", ")
        ));
    }
    lines.push(String::new());
    lines.push("[peers]".to_string());
    for peer in &config.peers {
        lines.push(format!(
            "{} {} [{}]",
            peer.destination,
            bs58::encode(peer.public_key).into_string(),
            peer.permissions.join(", ")
        ));
    }
    lines.join("\n")
}

/// A fresh example config with one newly generated identity, the way
/// `original_source`'s `NewConfig()` does — used for `--print-config`.
pub fn example() -> Config {
    let (public_key, private_key) = crate::keys::generate();
    Config {
        transport_endpoints: vec!["nats://natsserver:4222".to_string()],
        transport_credentials: "/path/to/credentials/file".to_string(),
        base_subject: DEFAULT_SUBJECT.to_string(),
        default_key: public_key,
        destination: "all".to_string(),
        allowed_clock_skew: DEFAULT_ALLOWED_SKEW,
        identities: vec![Identity {
            public_key,
            private_key,
            permissions: vec!["ping".to_string()],
        }],
        peers: Vec::new(),
    }
}
