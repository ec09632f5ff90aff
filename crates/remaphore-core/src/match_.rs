//! C5: match predicates for the passive receive path (spec §4.5).
//!
//! A closed set of predicate kinds, modeled as a tagged enum per the
//! REDESIGN note in spec §9 rather than boxed closures — there are exactly
//! four built-ins and no plugin surface.

use crate::message::normalize_uuid;
use crate::model::{Config, PUBLIC_KEY_SIZE};
use crate::wildcard::match_wildcards;
use crate::message::Message;

/// A single filter evaluated against a decoded message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MatchPredicate {
    /// Matches if the message verb is one of the given literals.
    VerbIn(Vec<String>),
    /// Matches if the message UUID equals the supplied UUID (normalized the
    /// same way `encode` normalizes an outgoing UUID).
    UuidEquals(Vec<u8>),
    /// With `Some(pattern)`, exact string equality against that pattern.
    /// With `None`, apply §4.2 wildcard matching to
    /// `(config.destination, message.destination)`.
    Destination(Option<String>),
    /// Byte equality against a specific sender public key.
    SenderKeyEquals([u8; PUBLIC_KEY_SIZE]),
}

impl MatchPredicate {
    fn matches(&self, config: &Config, message: &Message) -> bool {
        match self {
            MatchPredicate::VerbIn(verbs) => verbs.iter().any(|v| v == &message.verb),
            MatchPredicate::UuidEquals(uuid) => normalize_uuid(uuid) == message.uuid,
            MatchPredicate::Destination(Some(pattern)) => pattern == &message.destination,
            MatchPredicate::Destination(None) => {
                match_wildcards(&config.destination, &message.destination)
            }
            MatchPredicate::SenderKeyEquals(key) => key == &message.sender_public_key,
        }
    }
}

/// Evaluate a conjunction of predicates (all must hold; an empty list
/// always matches).
pub fn evaluate(predicates: &[MatchPredicate], config: &Config, message: &Message) -> bool {
    predicates.iter().all(|p| p.matches(config, message))
}
