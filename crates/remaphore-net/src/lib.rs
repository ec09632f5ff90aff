//! Transport adapter, in-process pub/sub bus, and send/receive engines.

pub mod engine;
pub mod transport;

pub use engine::{receive, send, send_request, Continuation, EngineError, ReplyHandle};
pub use transport::{reply_subject, subject_for, LocalBus, Subscription, Transport, TransportError};
