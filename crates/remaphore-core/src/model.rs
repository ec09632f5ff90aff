//! C3: Identity / Peer / Config model (spec §3, §4.3).
//!
//! Field names and query semantics follow `original_source/src/protocol/config.go`
//! (`PrivateKey`, `Peers.Known`, `PotentialReceivers`, `Peers.Remove`, `IsSelf`)
//! directly; an immutable, explicitly-constructed `Config` with no global
//! state (§5) is used throughout.

use crate::wildcard::match_wildcards;
use ed25519_dalek::PUBLIC_KEY_LENGTH;
use std::time::Duration;

/// Ed25519 public key length (32 bytes).
pub const PUBLIC_KEY_SIZE: usize = PUBLIC_KEY_LENGTH;
/// Ed25519 private key length as stored on the wire/in config text: the
/// 32-byte seed followed by the 32-byte public key, matching Go's
/// `crypto/ed25519.PrivateKeySize` convention used by the original
/// implementation's Base58-encoded identity lines.
pub const PRIVATE_KEY_SIZE: usize = 64;

/// The literal permission token that grants all verbs.
pub const PERMISSION_ALL: &str = "*";

/// Default base subject when unspecified.
pub const DEFAULT_SUBJECT: &str = "remaphore";
/// Default allowed clock skew when unspecified.
pub const DEFAULT_ALLOWED_SKEW: Duration = Duration::from_secs(3);

fn has_permission(permissions: &[String], verb: Option<&str>) -> bool {
    let Some(verb) = verb else {
        return true;
    };
    permissions.iter().any(|p| p == PERMISSION_ALL || p == verb)
}

/// Local principal: owns a private key and a permission list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Identity {
    pub public_key: [u8; PUBLIC_KEY_SIZE],
    pub private_key: [u8; PRIVATE_KEY_SIZE],
    pub permissions: Vec<String>,
}

impl Identity {
    pub fn has_permission(&self, verb: Option<&str>) -> bool {
        has_permission(&self.permissions, verb)
    }
}

/// Known remote principal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Peer {
    pub public_key: [u8; PUBLIC_KEY_SIZE],
    pub destination: String,
    pub permissions: Vec<String>,
}

impl Peer {
    pub fn has_permission(&self, verb: Option<&str>) -> bool {
        has_permission(&self.permissions, verb)
    }
}

/// A private, owned list of peers — the return type of `PotentialReceivers`
/// and the type the reply collector mutates as peers answer.
#[derive(Clone, Debug, Default)]
pub struct PeerSet(pub Vec<Peer>);

impl PeerSet {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Remove the first peer with the given public key. Order is not
    /// preserved (matches the original's swap-remove).
    pub fn remove(&mut self, public_key: &[u8; PUBLIC_KEY_SIZE]) {
        if let Some(pos) = self.0.iter().position(|p| &p.public_key == public_key) {
            self.0.swap_remove(pos);
        }
    }
}

/// Process-wide configuration (spec §3 Config).
#[derive(Clone, Debug)]
pub struct Config {
    pub transport_endpoints: Vec<String>,
    pub transport_credentials: String,
    pub base_subject: String,
    pub default_key: [u8; PUBLIC_KEY_SIZE],
    pub destination: String,
    pub allowed_clock_skew: Duration,
    pub identities: Vec<Identity>,
    pub peers: Vec<Peer>,
}

/// Config-construction/validation errors (spec §3 invariants).
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("no transport endpoints configured")]
    NoEndpoints,
    #[error("no transport credentials configured")]
    NoCredentials,
    #[error("no identities configured")]
    NoIdentities,
    #[error("no destination configured")]
    NoDestination,
    #[error("default signing key does not match any identity")]
    DefaultKeyUnresolved,
}

impl Config {
    /// Validate the invariants listed in spec §3.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.transport_endpoints.is_empty() {
            return Err(ConfigError::NoEndpoints);
        }
        if self.transport_credentials.is_empty() {
            return Err(ConfigError::NoCredentials);
        }
        if self.identities.is_empty() {
            return Err(ConfigError::NoIdentities);
        }
        if self.destination.is_empty() {
            return Err(ConfigError::NoDestination);
        }
        if !self
            .identities
            .iter()
            .any(|i| i.public_key == self.default_key)
        {
            return Err(ConfigError::DefaultKeyUnresolved);
        }
        Ok(())
    }

    /// `PrivateKey(pubkey, verb?)`: returns the identity's private key iff
    /// present and permitted for `verb` (or `verb` is `None`).
    pub fn private_key(
        &self,
        public_key: &[u8; PUBLIC_KEY_SIZE],
        verb: Option<&str>,
    ) -> Option<&[u8; PRIVATE_KEY_SIZE]> {
        self.identities
            .iter()
            .find(|i| &i.public_key == public_key)
            .filter(|i| i.has_permission(verb))
            .map(|i| &i.private_key)
    }

    /// `Peers.Known(pubkey, verb?)`.
    pub fn peer_known(&self, public_key: &[u8; PUBLIC_KEY_SIZE], verb: Option<&str>) -> bool {
        self.peers
            .iter()
            .find(|p| &p.public_key == public_key)
            .map(|p| p.has_permission(verb))
            .unwrap_or(false)
    }

    /// `IsSelf(pubkey)`: tests against the default key and all identity keys.
    pub fn is_self(&self, public_key: &[u8; PUBLIC_KEY_SIZE]) -> bool {
        &self.default_key == public_key || self.identities.iter().any(|i| &i.public_key == public_key)
    }

    /// `PotentialReceivers(destination)`: deep copy of all peers whose
    /// configured destination matches `destination` per §4.2. This is the
    /// authoritative "who must answer" set for the reply collector.
    pub fn potential_receivers(&self, destination: &str) -> PeerSet {
        PeerSet(
            self.peers
                .iter()
                .filter(|p| match_wildcards(&p.destination, destination))
                .cloned()
                .collect(),
        )
    }

    /// Destination configured for a known peer, or its Base58 public key
    /// when no configured peer names it (so a reply from an unlisted
    /// sender still prints something identifying rather than a blank).
    pub fn peer_destination(&self, public_key: &[u8; PUBLIC_KEY_SIZE]) -> String {
        self.peers
            .iter()
            .find(|p| &p.public_key == public_key)
            .map(|p| p.destination.clone())
            .unwrap_or_else(|| crate::base58::Base58Bytes::from(&public_key[..]).to_string())
    }
}
