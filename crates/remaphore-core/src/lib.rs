//! Canonical message codec, wildcard matcher, and identity/peer/config
//! model shared by every remaphore crate.

pub mod base58;
pub mod config_text;
pub mod error;
pub mod keys;
pub mod match_;
pub mod message;
pub mod model;
pub mod wildcard;

pub use base58::Base58Bytes;
pub use error::{Error, Result};
pub use match_::{evaluate, MatchPredicate};
pub use message::{Message, NewMessage};
pub use model::{Config, ConfigError, Identity, Peer, PeerSet};
pub use wildcard::match_wildcards;
