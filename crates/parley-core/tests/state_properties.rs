//! Property-based tests for the broker's state components.
//!
//! Each component is driven with random operations alongside a trivial
//! model, and must agree with the model after every step.

use std::collections::{BTreeMap, BTreeSet};

use parley_core::{
    BindOutcome, BrokerConfig, ConnectionId, Dispatcher, Identity, RoomKey, RoomMembership,
    SessionRegistry,
};
use parley_proto::{ChatKind, MessageStatus, SendMessage};
use proptest::prelude::*;

const USERS: [&str; 3] = ["u1", "u2", "u3"];

fn room_strategy() -> impl Strategy<Value = RoomKey> {
    prop_oneof![
        (0..USERS.len()).prop_map(|u| RoomKey::personal(USERS[u])),
        prop::sample::select(vec!["general", "rust"]).prop_map(RoomKey::group),
    ]
}

fn status_strategy() -> impl Strategy<Value = MessageStatus> {
    prop::sample::select(vec![
        MessageStatus::Sending,
        MessageStatus::Sent,
        MessageStatus::Delivered,
        MessageStatus::Read,
        MessageStatus::Failed,
    ])
}

proptest! {
    /// Membership agrees with a set of (user, room) pairs and never keeps
    /// empty rooms.
    #[test]
    fn prop_membership_matches_model(
        ops in prop::collection::vec((any::<bool>(), 0..USERS.len(), room_strategy()), 0..80),
    ) {
        let mut rooms = RoomMembership::new();
        let mut model: BTreeSet<(String, RoomKey)> = BTreeSet::new();

        for (join, user, room) in ops {
            let user = USERS[user];
            let entry = (user.to_string(), room.clone());
            if join {
                prop_assert_eq!(rooms.join(user, room.clone()), model.insert(entry));
            } else {
                prop_assert_eq!(rooms.leave(user, &room), model.remove(&entry));
            }

            let expected: Vec<_> =
                model.iter().filter(|(_, r)| *r == room).map(|(u, _)| u.as_str()).collect();
            let actual: Vec<_> = rooms.members_of(&room).collect();
            prop_assert_eq!(actual, expected);

            let distinct: BTreeSet<_> = model.iter().map(|(_, r)| r).collect();
            prop_assert_eq!(rooms.room_count(), distinct.len());
        }
    }

    /// A user is online exactly while at least one connection is bound.
    #[test]
    fn prop_online_iff_bound(
        ops in prop::collection::vec((any::<bool>(), 0u64..6, 0..USERS.len()), 0..80),
    ) {
        let mut registry = SessionRegistry::new();
        let mut bound: BTreeMap<u64, &str> = BTreeMap::new();

        for (step, (bind, connection, user)) in ops.into_iter().enumerate() {
            let now = step as u64;
            if bind {
                let user = USERS[user];
                let was_online = bound.values().any(|u| *u == user);
                let identity = Identity::new(user, user);
                let result = registry.authenticate(ConnectionId(connection), identity, now);

                if bound.contains_key(&connection) {
                    prop_assert!(result.is_err());
                } else {
                    let expected = if was_online {
                        BindOutcome::AlreadyOnline
                    } else {
                        BindOutcome::CameOnline
                    };
                    prop_assert_eq!(result, Ok(expected));
                    bound.insert(connection, user);
                }
            } else {
                let unbound = registry.unbind(ConnectionId(connection), now);
                match bound.remove(&connection) {
                    Some(user) => {
                        let unbound = unbound.unwrap();
                        let still_online = bound.values().any(|u| *u == user);
                        prop_assert_eq!(unbound.went_offline, !still_online);
                    },
                    None => prop_assert!(unbound.is_none()),
                }
            }

            for user in USERS {
                let expected = bound.values().any(|u| *u == user);
                prop_assert_eq!(registry.is_online(user), expected);
            }
            prop_assert_eq!(registry.bound_connections().len(), bound.len());
        }
    }

    /// Stored status only ever moves one legal step forward.
    #[test]
    fn prop_status_never_regresses(targets in prop::collection::vec(status_strategy(), 0..20)) {
        let mut dispatcher = Dispatcher::new(7, &BrokerConfig::default());
        let request = SendMessage {
            sender_id: String::new(),
            receiver_id: Some("u2".into()),
            group_id: None,
            content: "hello".into(),
            kind: ChatKind::Individual,
        };
        let dispatch = dispatcher
            .send(
                &Identity::new("u1", "Alice"),
                ConnectionId(1),
                request,
                0,
                &SessionRegistry::new(),
                &RoomMembership::new(),
            )
            .unwrap();
        let id = dispatch.message.id;

        for next in targets {
            let current = dispatcher.message(&id).unwrap().status;
            let result = dispatcher.advance(&id, next);

            prop_assert_eq!(result.is_ok(), current.can_advance_to(next));
            let after = dispatcher.message(&id).unwrap().status;
            prop_assert!(after.rank() >= current.rank());
        }
    }
}
