/*!
 * Property tests for subscription bookkeeping and per-pass delivery
 */

use irq_event_core::{
    ClientId, CoreConfig, EventCore, EventTime, ModuleId, ModuleSpec, SourceId, SubscriptionMode,
    Timeout,
};
use proptest::prelude::*;
use std::collections::BTreeSet;

const SOURCES: usize = 8;
const CLIENTS: usize = 4;

#[derive(Debug, Clone)]
enum Op {
    Connect(usize, SourceId),
    Disconnect(usize, SourceId),
    DisconnectAll(usize),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..CLIENTS, 0..SOURCES as SourceId).prop_map(|(c, s)| Op::Connect(c, s)),
        (0..CLIENTS, 0..SOURCES as SourceId).prop_map(|(c, s)| Op::Disconnect(c, s)),
        (0..CLIENTS).prop_map(Op::DisconnectAll),
    ]
}

fn setup() -> (EventCore, ModuleId, Vec<ClientId>) {
    let config = CoreConfig {
        clients_max: CLIENTS,
        queue_capacity: 64,
        ..CoreConfig::default()
    };
    let core = EventCore::new(config).unwrap();
    let m = core.install_module(ModuleSpec::new("prop", SOURCES)).unwrap();
    let clients = (0..CLIENTS)
        .map(|pid| core.open(pid as u32, Some(m)).unwrap())
        .collect();
    (core, m, clients)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn subscriber_sets_match_connections(ops in prop::collection::vec(op(), 0..60)) {
        let (core, m, clients) = setup();
        let mut model: Vec<BTreeSet<ClientId>> = vec![BTreeSet::new(); SOURCES];

        for op in ops {
            match op {
                Op::Connect(c, s) => {
                    core.connect(clients[c], None, s, SubscriptionMode::Queued).unwrap();
                    model[s as usize].insert(clients[c]);
                }
                Op::Disconnect(c, s) => {
                    core.disconnect(clients[c], None, s).unwrap();
                    model[s as usize].remove(&clients[c]);
                }
                Op::DisconnectAll(c) => {
                    core.disconnect_all(clients[c]).unwrap();
                    for set in model.iter_mut() {
                        set.remove(&clients[c]);
                    }
                }
            }
        }

        let module = core.module(m).unwrap();
        for (source, expected) in model.iter().enumerate() {
            let actual: BTreeSet<ClientId> =
                module.subscribers(source as SourceId).into_iter().collect();
            prop_assert_eq!(&actual, expected);

            let enabled = module.enabled_mask() & (1 << source) != 0;
            prop_assert_eq!(enabled, !expected.is_empty());
        }

        // Nobody hears a source they are not subscribed to
        core.dispatch(m, u64::MAX, EventTime::from_seconds(1), None).unwrap();
        for client in &clients {
            while let Ok(read) = core.read(*client, Some(Timeout::Immediate)) {
                let source = read.event.connection.source as usize;
                prop_assert!(model[source].contains(client));
            }
        }
    }

    #[test]
    fn pass_delivers_one_event_per_asserted_bit(
        subscribed in prop::collection::btree_set(0..SOURCES as SourceId, 0..=SOURCES),
        mask in 0u64..(1 << SOURCES),
    ) {
        let (core, m, clients) = setup();
        let client = clients[0];
        for &source in &subscribed {
            core.connect(client, None, source, SubscriptionMode::Queued).unwrap();
        }

        core.dispatch(m, mask, EventTime::from_seconds(9), None).unwrap();

        let expected: Vec<SourceId> = subscribed
            .iter()
            .copied()
            .filter(|s| mask & (1 << s) != 0)
            .collect();
        let mut received = Vec::new();
        while let Ok(read) = core.read(client, Some(Timeout::Immediate)) {
            received.push(read.event.connection.source);
        }
        prop_assert_eq!(received, expected);
    }
}
