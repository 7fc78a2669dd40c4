//! Action handlers, one per action kind
//!
//! Handlers never return errors: every failure ends in a fallback path, a
//! transient notice, or silence. Each returns an outcome enum describing
//! which path was taken, for logging and tests.

pub mod chat;
pub mod dialer;
pub mod messaging;
pub mod picker;

pub use chat::{ChatHandler, ChatOutcome};
pub use dialer::{DialOutcome, DialerHandler};
pub use messaging::{MessagingHandler, MessagingOutcome};
pub use picker::{PickOutcome, PickerHandler};
