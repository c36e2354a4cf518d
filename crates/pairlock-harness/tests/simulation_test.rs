//! Full-stack simulations.
//!
//! Every participant runs the real async runtime on its own turmoil host and
//! talks to its peers over simulated TCP. An observer client collects run
//! events until each requester reports that its cycles are done, and the
//! collected log is checked with the same oracles the scenario tests use.

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use pairlock_app::{EventSink, RequesterRuntime, ResponderRuntime, RunEvent, RuntimeConfig};
use pairlock_core::{coordinator::PairingPolicy, group::GroupConfig};
use pairlock_harness::{
    SimEnv, SimTransport,
    scenario::oracle::{
        check_deferred_drained, check_mutual_exclusion, check_pairing_unique,
        check_priority_order, check_responder_exclusive,
    },
    sim_transport::host_name,
};

fn simulate(
    group: GroupConfig,
    config: RuntimeConfig,
    seed: u64,
    max_latency: Duration,
) -> Vec<RunEvent> {
    let mut sim = turmoil::Builder::new()
        .simulation_duration(Duration::from_secs(120))
        .min_message_latency(Duration::from_millis(1))
        .max_message_latency(max_latency)
        .rng_seed(seed)
        .build();

    let (sink, mut rx) = EventSink::channel();

    for id in group.requesters() {
        let sink = sink.clone();
        let config = config.clone();
        sim.host(host_name(id), move || {
            let sink = sink.clone();
            let config = config.clone();
            async move {
                let transport = SimTransport::bind(id).await?;
                let env = SimEnv::with_seed(seed ^ u64::from(id));
                RequesterRuntime::new(group, env, transport, config)?.with_events(sink).run().await?;
                Ok(())
            }
        });
    }

    for id in group.responders() {
        let sink = sink.clone();
        sim.host(host_name(id), move || {
            let sink = sink.clone();
            async move {
                let transport = SimTransport::bind(id).await?;
                ResponderRuntime::new(group, transport)?.with_events(sink).run().await?;
                Ok(())
            }
        });
    }

    let events = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&events);
    let requesters = group.requester_count();
    sim.client("observer", async move {
        let mut done = 0;
        while done < requesters {
            let event = rx.recv().await.ok_or("event channel closed")?;
            if matches!(event, RunEvent::CyclesCompleted { .. }) {
                done += 1;
            }
            log.lock().unwrap().push(event);
        }
        Ok(())
    });

    sim.run().expect("simulation should complete");
    drop(sink);

    events.lock().unwrap().clone()
}

fn check_all(events: &[RunEvent]) {
    check_mutual_exclusion(events).unwrap();
    check_priority_order(events).unwrap();
    check_deferred_drained(events).unwrap();
    check_responder_exclusive(events).unwrap();
    check_pairing_unique(events).unwrap();
}

fn entries(events: &[RunEvent], id: u32) -> usize {
    events.iter().filter(|e| matches!(e, RunEvent::Entered { requester, .. } if *requester == id)).count()
}

#[test]
fn group_completes_cycles_over_simulated_network() {
    let group = GroupConfig::split_evenly(6).unwrap();
    let config = RuntimeConfig::fast().with_max_cycles(3);

    let events = simulate(group, config, 1, Duration::from_millis(5));

    check_all(&events);
    for id in group.requesters() {
        assert_eq!(entries(&events, id), 3, "requester {id}");
    }
}

#[test]
fn high_latency_keeps_invariants() {
    let group = GroupConfig::new(7, 4).unwrap();
    let config = RuntimeConfig::fast().with_max_cycles(2);

    let events = simulate(group, config, 99, Duration::from_millis(50));

    check_all(&events);
    for id in group.requesters() {
        assert_eq!(entries(&events, id), 2, "requester {id}");
    }
}

#[test]
fn record_denied_over_simulated_network() {
    let group = GroupConfig::new(5, 3).unwrap();
    let config = RuntimeConfig::fast()
        .with_max_cycles(4)
        .with_pairing_policy(PairingPolicy::RecordDenied);

    let events = simulate(group, config, 7, Duration::from_millis(10));

    check_all(&events);
    let visits = events.iter().filter(|e| matches!(e, RunEvent::Entered { .. })).count();
    let scans = events
        .iter()
        .filter(|e| matches!(e, RunEvent::Paired { .. } | RunEvent::Unpaired { .. }))
        .count();
    assert_eq!(visits, 12);
    assert_eq!(scans, visits);
}
