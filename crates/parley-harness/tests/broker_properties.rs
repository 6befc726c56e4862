//! Property-based tests for the broker.
//!
//! Random client workloads are replayed through the simulated runtime and the
//! standard invariants are checked after every step.

use std::{collections::BTreeSet, time::Duration};

use parley_core::{ConnectionId, RoomKey};
use parley_harness::{InvariantRegistry, SimBroker, requests};
use parley_proto::ClientMessage;
use proptest::prelude::*;

const USERS: [&str; 4] = ["u1", "u2", "u3", "u4"];
const GROUPS: [&str; 3] = ["general", "rust", "ops"];

#[derive(Debug, Clone)]
enum Op {
    Connect(usize),
    Disconnect(usize),
    Direct(usize, usize),
    Group(usize, usize),
    TypingStart(usize, usize),
    TypingStop(usize, usize),
    Read(usize, usize),
    Join(usize, usize),
    Leave(usize, usize),
    Advance(u64),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    let user = 0..USERS.len();
    let group = 0..GROUPS.len();
    let slot = 0usize..8;
    prop_oneof![
        3 => user.clone().prop_map(Op::Connect),
        2 => slot.clone().prop_map(Op::Disconnect),
        3 => (slot.clone(), user.clone()).prop_map(|(c, u)| Op::Direct(c, u)),
        3 => (slot.clone(), group.clone()).prop_map(|(c, g)| Op::Group(c, g)),
        2 => (slot.clone(), group.clone()).prop_map(|(c, g)| Op::TypingStart(c, g)),
        1 => (slot.clone(), group.clone()).prop_map(|(c, g)| Op::TypingStop(c, g)),
        1 => (slot.clone(), user).prop_map(|(c, u)| Op::Read(c, u)),
        1 => (slot.clone(), group.clone()).prop_map(|(c, g)| Op::Join(c, g)),
        1 => (slot, group).prop_map(|(c, g)| Op::Leave(c, g)),
        1 => (0u64..5_000).prop_map(Op::Advance),
    ]
}

/// Replays ops against a simulated broker, tracking which connections are
/// still open and which user owns each one.
struct Workload {
    sim: SimBroker,
    open: Vec<(ConnectionId, &'static str)>,
}

impl Workload {
    fn new(seed: u64) -> Self {
        Self { sim: SimBroker::new(seed), open: Vec::new() }
    }

    fn pick(&self, slot: usize) -> Option<ConnectionId> {
        if self.open.is_empty() {
            return None;
        }
        Some(self.open[slot % self.open.len()].0)
    }

    fn apply(&mut self, op: &Op) {
        match *op {
            Op::Connect(user) => {
                let connection = self.sim.connect(USERS[user], USERS[user]);
                self.open.push((connection, USERS[user]));
            },
            Op::Disconnect(slot) => {
                if !self.open.is_empty() {
                    let (connection, _) = self.open.remove(slot % self.open.len());
                    self.sim.disconnect(connection);
                }
            },
            Op::Advance(ms) => self.sim.advance(Duration::from_millis(ms)),
            Op::Direct(slot, user) => self.send(slot, requests::direct(USERS[user], "hi")),
            Op::Group(slot, group) => self.send(slot, requests::group(GROUPS[group], "hey")),
            Op::TypingStart(slot, group) => {
                self.send(slot, requests::typing_start_group(GROUPS[group]));
            },
            Op::TypingStop(slot, group) => {
                self.send(slot, requests::typing_stop_group(GROUPS[group]));
            },
            Op::Read(slot, user) => self.send(slot, requests::read_direct(USERS[user])),
            Op::Join(slot, group) => self.send(slot, requests::join(GROUPS[group])),
            Op::Leave(slot, group) => self.send(slot, requests::leave(GROUPS[group])),
        }
    }

    fn send(&mut self, slot: usize, message: ClientMessage) {
        if let Some(connection) = self.pick(slot) {
            self.sim
                .send(connection, message)
                .unwrap_or_else(|e| panic!("valid request from {connection} rejected: {e}"));
        }
    }

    fn expected_online(&self) -> BTreeSet<&'static str> {
        self.open.iter().map(|(_, user)| *user).collect()
    }
}

proptest! {
    /// Standard invariants hold after every step of an arbitrary workload.
    #[test]
    fn prop_invariants_hold(
        seed in any::<u64>(),
        ops in prop::collection::vec(op_strategy(), 0..60),
    ) {
        let mut workload = Workload::new(seed);
        let invariants = InvariantRegistry::standard();

        for op in &ops {
            workload.apply(op);

            let snapshot = workload.sim.snapshot();
            prop_assert!(
                invariants.check_all(&snapshot).is_ok(),
                "Invariant violated after {:?}", op
            );
        }
    }

    /// The online list is exactly the set of users with an open connection.
    #[test]
    fn prop_online_matches_open_connections(
        seed in any::<u64>(),
        ops in prop::collection::vec(op_strategy(), 0..60),
    ) {
        let mut workload = Workload::new(seed);

        for op in &ops {
            workload.apply(op);

            let online: BTreeSet<_> = workload
                .sim
                .broker()
                .list_online()
                .into_iter()
                .map(|user| user.id)
                .collect();
            let expected: BTreeSet<_> =
                workload.expected_online().into_iter().map(str::to_string).collect();
            prop_assert_eq!(online, expected);
        }
    }

    /// No typing indicator survives a full timeout of silence.
    #[test]
    fn prop_typing_always_expires(
        seed in any::<u64>(),
        ops in prop::collection::vec(op_strategy(), 0..60),
    ) {
        let mut workload = Workload::new(seed);
        for op in &ops {
            workload.apply(op);
        }

        let timeout = workload.sim.broker().config().typing_timeout;
        workload.sim.advance(timeout);

        prop_assert_eq!(workload.sim.pending_timers(), 0);
        for user in USERS {
            for group in GROUPS {
                let room = RoomKey::group(group);
                prop_assert!(workload.sim.broker().typing_indicator(user, &room).is_none());
            }
        }
    }
}
