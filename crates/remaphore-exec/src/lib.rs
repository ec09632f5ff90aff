//! Subprocess executor used by `remaphore-cli`'s receive mode to run an
//! operator-supplied command per matching message.

pub mod exec;

pub use exec::{exec, ExecError};
