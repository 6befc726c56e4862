//! Parley broker core.
//!
//! Action-based chat broker with no I/O. Runtimes feed [`BrokerEvent`]s into
//! [`Broker::process_event`] and execute the returned [`BrokerAction`]s in
//! order, which is what gives per-room FIFO delivery.
//!
//! # Components
//!
//! - [`SessionRegistry`]: identity to live connections, online/offline and
//!   last-seen
//! - [`RoomMembership`]: personal and group rooms to member sessions
//! - [`Dispatcher`]: validation, IDs, routing, and delivery status
//! - [`TypingTracker`]: typing indicators with generation-checked expiry
//! - [`Broker`]: the connection gateway tying the above together
//!
//! Time and randomness come from an [`Environment`], so the same code runs
//! under the production runtime and the deterministic simulation harness.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod broker;
mod config;
mod dispatcher;
pub mod env;
mod error;
mod presence;
mod room;
mod session;

pub use broker::{Broker, BrokerAction, BrokerEvent, LogLevel, TimerKey};
pub use config::{BrokerConfig, ConfigError};
pub use dispatcher::{Dispatch, Dispatcher};
pub use env::Environment;
pub use error::BrokerError;
pub use presence::{TypingIndicator, TypingKey, TypingTracker, TypingTransition};
pub use room::{RoomKey, RoomMembership};
pub use session::{BindOutcome, ConnectionId, Identity, Session, SessionRegistry, Unbound};
