//! Property-based invariant tests for `LiveData` dispatch.
//!
//! These tests verify invariants that must hold for any sequence of
//! assignments, dispatches and owner transitions:
//!
//! 1. Version increases by exactly 1 per assignment, equal values included.
//! 2. Each version reaches an observer at most once.
//! 3. Deliveries match a reference model of lifecycle gating.
//! 4. A destroyed owner's observer is removed and never delivered to again.
//! 5. Forever observers survive every sweep.
//! 6. Re-registering an observer is always rejected.

use std::sync::{Arc, Mutex};

use lifebind::{
    Lifecycle, LifecycleState, LiveData, LiveDataError, NEVER_DELIVERED, Observer, START_VERSION,
};
use proptest::prelude::*;

// ── Strategies ────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
enum Op {
    Set(u8),
    Dispatch,
    Activate,
    Deactivate,
    Destroy,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => any::<u8>().prop_map(Op::Set),
        2 => Just(Op::Dispatch),
        2 => Just(Op::Activate),
        2 => Just(Op::Deactivate),
        1 => Just(Op::Destroy),
    ]
}

fn ops_strategy(max_len: usize) -> impl Strategy<Value = Vec<Op>> {
    proptest::collection::vec(op_strategy(), 0..=max_len)
}

/// Records `(version, value)` for every delivery.
fn recording_observer(data: &LiveData<u8>) -> (Arc<Mutex<Vec<(i64, Option<u8>)>>>, Observer<u8>) {
    let log = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&log);
    let handle = data.clone();
    let observer = Observer::new(move |value: Option<&u8>| {
        sink.lock().unwrap().push((handle.version(), value.copied()));
    });
    (log, observer)
}

/// Reference model of one owner-bound observer.
struct Model {
    value: Option<u8>,
    version: i64,
    state: LifecycleState,
    last_version: i64,
    registered: bool,
    deliveries: Vec<(i64, Option<u8>)>,
}

impl Model {
    fn new(state: LifecycleState) -> Self {
        Self {
            value: None,
            version: START_VERSION,
            state,
            last_version: NEVER_DELIVERED,
            registered: true,
            deliveries: Vec::new(),
        }
    }

    fn dispatch(&mut self) {
        if self.state.is_destroyed() {
            self.registered = false;
        }
        if self.registered && self.state.is_active() && self.last_version < self.version {
            self.last_version = self.version;
            self.deliveries.push((self.version, self.value));
        }
    }

    fn apply(&mut self, op: &Op) {
        match op {
            Op::Set(v) => {
                self.value = Some(*v);
                self.version += 1;
                self.dispatch();
            }
            Op::Dispatch => self.dispatch(),
            Op::Activate if !self.state.is_destroyed() => self.state = LifecycleState::Active,
            Op::Deactivate if !self.state.is_destroyed() => self.state = LifecycleState::Inactive,
            Op::Activate | Op::Deactivate => {}
            Op::Destroy => {
                self.state = LifecycleState::Destroyed;
                self.registered = false;
            }
        }
    }
}

fn apply(data: &LiveData<u8>, owner: &Lifecycle, op: &Op) {
    match op {
        Op::Set(v) => data.set(*v),
        Op::Dispatch => data.dispatch(),
        Op::Activate => {
            owner.activate();
        }
        Op::Deactivate => {
            owner.deactivate();
        }
        Op::Destroy => {
            owner.destroy();
        }
    }
}

// 1. Version monotonicity

proptest! {
    #[test]
    fn version_counts_assignments(values in proptest::collection::vec(0u8..4, 0..64)) {
        let data = LiveData::<u8>::empty();
        for (i, v) in values.iter().enumerate() {
            let before = data.version();
            data.set(*v);
            prop_assert_eq!(data.version(), before + 1);
            prop_assert_eq!(data.version(), START_VERSION + i as i64 + 1);
        }
    }
}

// 2. At most once per version

proptest! {
    #[test]
    fn each_version_delivered_at_most_once(ops in ops_strategy(64)) {
        let data = LiveData::<u8>::empty();
        let owner = Lifecycle::with_state(LifecycleState::Active);
        let (log, observer) = recording_observer(&data);
        data.observe_forever_with(&observer).unwrap();

        for op in &ops {
            apply(&data, &owner, op);
        }

        let log = log.lock().unwrap();
        for pair in log.windows(2) {
            prop_assert!(pair[0].0 < pair[1].0, "versions not strictly increasing: {:?}", pair);
        }
    }
}

// 3 + 4. Lifecycle gating matches the model

proptest! {
    #[test]
    fn deliveries_match_lifecycle_model(
        start_active in any::<bool>(),
        ops in ops_strategy(96),
    ) {
        let start = if start_active { LifecycleState::Active } else { LifecycleState::Inactive };
        let data = LiveData::<u8>::empty();
        let owner = Arc::new(Lifecycle::with_state(start));
        let (log, observer) = recording_observer(&data);
        data.observe_with(&owner, &observer).unwrap();

        let mut model = Model::new(start);
        for op in &ops {
            apply(&data, &owner, op);
            model.apply(op);
            prop_assert_eq!(data.contains(&observer), model.registered);
        }

        let delivered = log.lock().unwrap().clone();
        prop_assert_eq!(delivered, model.deliveries);
        prop_assert_eq!(data.version(), model.version);
        prop_assert_eq!(data.get(), model.value);
    }
}

// 5. Forever observers survive sweeps

proptest! {
    #[test]
    fn forever_observers_survive(ops in ops_strategy(64)) {
        let data = LiveData::<u8>::empty();
        let owner = Arc::new(Lifecycle::with_state(LifecycleState::Active));
        let forever = data.observe_forever(|_| {});
        data.observe(&owner, |_| {});

        for op in &ops {
            apply(&data, &owner, op);
        }
        owner.destroy();
        data.dispatch();

        prop_assert!(data.contains(&forever));
        prop_assert_eq!(data.observer_count(), 1);
    }
}

// 6. Registration uniqueness

proptest! {
    #[test]
    fn reregistration_always_rejected(attempts in 1usize..8, bound in proptest::collection::vec(any::<bool>(), 1..8)) {
        let data = LiveData::<u8>::empty();
        let owner = Arc::new(Lifecycle::with_state(LifecycleState::Active));
        let observer = Observer::new(|_| {});
        data.observe_forever_with(&observer).unwrap();

        for i in 0..attempts {
            let result = if bound[i % bound.len()] {
                data.observe_with(&owner, &observer)
            } else {
                data.observe_forever_with(&observer)
            };
            prop_assert_eq!(result, Err(LiveDataError::AlreadyRegistered(observer.id())));
        }
        prop_assert_eq!(data.observer_count(), 1);
    }
}
