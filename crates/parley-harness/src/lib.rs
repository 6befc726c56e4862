//! Deterministic simulation harness for the parley broker.
//!
//! [`SimEnv`] supplies a virtual clock and seeded RNG; [`SimBroker`] drives a
//! [`parley_core::Broker`] with it, records every pushed event per
//! connection, and fires typing-expiry timers as virtual time advances.
//! Nothing here touches the network or the wall clock, so every run with the
//! same seed and inputs is identical.
//!
//! # Invariant Testing
//!
//! The `invariants` module checks behavioral properties against a
//! [`SystemSnapshot`] of the live broker. Use [`InvariantRegistry::standard()`]
//! for the broker invariants.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod invariants;
pub mod requests;
pub mod sim_broker;
pub mod sim_env;

pub use invariants::{
    Invariant, InvariantRegistry, InvariantResult, MembershipSymmetry, OnlineIffConnected,
    PersonalRoomOwnership, RoomSnapshot, SessionSnapshot, StatusMonotonicity, SystemSnapshot,
    Violation,
};
pub use sim_broker::SimBroker;
pub use sim_env::SimEnv;
