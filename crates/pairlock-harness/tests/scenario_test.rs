//! Scenario tests for mutual exclusion and pairing.
//!
//! The scripted tests drive the opening moves by hand to pin down a specific
//! interleaving, then let the scheduler finish the run so the standard
//! oracles see a complete history.

use pairlock_app::RunEvent;
use pairlock_core::{
    clock::RequestStamp,
    coordinator::{PairingPolicy, PairingStatus},
    requester::MutexState,
};
use pairlock_harness::scenario::{Scenario, oracle};
use pairlock_proto::{Body, Message};

#[test]
fn concurrent_requests_enter_in_stamp_order() {
    // Clocks 4, 4, 2 tick to stamps (5, 0), (5, 1), (3, 2).
    let result = Scenario::new("stamp order")
        .participants(6)
        .requesters(3)
        .clock(0, 4)
        .clock(1, 4)
        .clock(2, 2)
        .setup(|world| {
            world.request(0)?;
            world.request(1)?;
            world.request(2)?;
            Ok(())
        })
        .oracle(oracle::all_of(vec![
            oracle::standard(),
            Box::new(|world| {
                let stamps: Vec<_> = world
                    .events()
                    .iter()
                    .filter_map(|event| match event {
                        RunEvent::Requested { stamp, .. } => Some(*stamp),
                        _ => None,
                    })
                    .collect();
                let expected =
                    vec![RequestStamp::new(5, 0), RequestStamp::new(5, 1), RequestStamp::new(3, 2)];
                if stamps != expected {
                    return Err(format!("stamps {stamps:?}"));
                }

                let order = world.entry_order();
                if order != vec![2, 0, 1] {
                    return Err(format!("expected entry order [2, 0, 1], got {order:?}"));
                }
                Ok(())
            }),
        ]))
        .run();

    assert!(result.is_ok(), "scenario failed: {result:?}");
}

#[test]
fn busy_responder_denies_second_requester() {
    // Requesters 0..3, responders 3 and 4.
    let result = Scenario::new("deny while paired")
        .participants(5)
        .requesters(3)
        .setup(|world| {
            world.request(0)?;
            world.deliver_all()?;
            world.begin_pairing(0)?;
            world.deliver_all()?;
            if world.requester(0).map(|r| r.pairing_status()) != Some(PairingStatus::Paired(3)) {
                return Err("requester 0 should be paired with 3".into());
            }

            // PairEnd stays queued on 0 -> 3 while 1 takes its turn.
            world.end_pairing(0)?;
            world.release(0)?;
            world.request(1)?;
            for peer in [0, 2] {
                world.deliver(1, peer)?;
                world.deliver(peer, 1)?;
            }
            if world.requester(1).map(|r| r.state()) != Some(MutexState::Held) {
                return Err("requester 1 should hold the critical section".into());
            }

            world.begin_pairing(1)?;
            world.deliver(1, 3)?;
            world.deliver(3, 1)?;
            let next: Vec<_> = world.pending(1, 4).copied().collect();
            if next != vec![Message::new(1, 4, Body::PairRequest)] {
                return Err(format!("requester 1 should move on to 4, queued {next:?}"));
            }
            Ok(())
        })
        .oracle(oracle::all_of(vec![
            oracle::standard(),
            Box::new(|world| {
                let denied = world
                    .events()
                    .iter()
                    .any(|e| *e == RunEvent::Denied { responder: 3, requester: 1 });
                if !denied {
                    return Err("responder 3 never denied requester 1".into());
                }
                Ok(())
            }),
        ]))
        .run();

    assert!(result.is_ok(), "scenario failed: {result:?}");
}

#[test]
fn requester_skips_responder_it_already_paired_with() {
    let result = Scenario::new("skip previous partner")
        .participants(5)
        .requesters(3)
        .cycles(2)
        .setup(|world| {
            for _ in 0..2 {
                world.request(0)?;
                world.deliver_all()?;
                world.begin_pairing(0)?;
                world.deliver_all()?;
                world.end_pairing(0)?;
                world.release(0)?;
                world.deliver_all()?;
            }
            Ok(())
        })
        .oracle(oracle::all_of(vec![
            oracle::standard(),
            Box::new(|world| {
                let partners: Vec<_> = world
                    .events()
                    .iter()
                    .filter_map(|event| match event {
                        RunEvent::Paired { requester: 0, responder } => Some(*responder),
                        _ => None,
                    })
                    .collect();
                if partners != vec![3, 4] {
                    return Err(format!("requester 0 paired with {partners:?}"));
                }
                Ok(())
            }),
        ]))
        .run();

    assert!(result.is_ok(), "scenario failed: {result:?}");
}

#[test]
fn exhausted_record_leaves_requester_unpaired() {
    let result = Scenario::new("nobody left")
        .participants(3)
        .requesters(2)
        .cycles(3)
        .policy(PairingPolicy::RecordDenied)
        .oracle(oracle::all_of(vec![
            oracle::standard(),
            Box::new(|world| {
                for id in world.group().requesters() {
                    let visits = world
                        .events()
                        .iter()
                        .filter(|e| matches!(e, RunEvent::Entered { requester, .. } if *requester == id))
                        .count();
                    let paired = world
                        .events()
                        .iter()
                        .filter(|e| matches!(e, RunEvent::Paired { requester, .. } if *requester == id))
                        .count();
                    let unpaired = world
                        .events()
                        .iter()
                        .filter(|e| matches!(e, RunEvent::Unpaired { requester } if *requester == id))
                        .count();
                    if paired > 1 || paired + unpaired != visits {
                        return Err(format!(
                            "requester {id}: {visits} visits, {paired} paired, {unpaired} unpaired"
                        ));
                    }
                }
                Ok(())
            }),
        ]))
        .run();

    assert!(result.is_ok(), "scenario failed: {result:?}");
}

#[test]
fn many_seeds_hold_every_invariant() {
    for seed in 0..50 {
        let result = Scenario::new(format!("seed {seed}"))
            .participants(7)
            .requesters(4)
            .cycles(3)
            .seed(seed)
            .oracle(oracle::standard())
            .run();
        assert!(result.is_ok(), "scenario failed: {result:?}");
    }
}
