//! Error taxonomy for the remaphore wire protocol.

use thiserror::Error;

/// Result type alias using our Error
pub type Result<T> = std::result::Result<T, Error>;

/// Protocol-level error kinds (spec §7).
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum Error {
    /// Wire layout wrong: missing separators, bad hex, too few fields.
    #[error("message format corrupt")]
    Format,

    /// Ed25519 verification failed.
    #[error("signature corrupt")]
    Signature,

    /// Sender unknown or lacks permission for the verb.
    #[error("peer key or permission not known")]
    PeerPermission,

    /// `|now - sendTime| > allowedSkew`.
    #[error("message outside of time window")]
    ClockSkew,

    /// Destination or verb contains the field separator `,`.
    #[error("destination contains forbidden character")]
    DestinationBadChar,

    /// Verb contains the field separator `,`.
    #[error("verb contains forbidden character")]
    VerbBadChar,

    /// No local identity can sign (missing key or insufficient permission).
    #[error("no private key with sender permission found")]
    NoPrivateKey,

    /// A request would go out with nobody expected to reply.
    #[error("no known receivers")]
    NoReceivers,

    /// Config text is malformed.
    #[error("config error: {0}")]
    Config(String),
}
