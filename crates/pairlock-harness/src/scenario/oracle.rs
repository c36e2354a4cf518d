//! Oracles.
//!
//! Each `check_*` function verifies one property over a [`RunEvent`] log and
//! works on any log, whether recorded by the [`World`] or by the async
//! runtimes. The remaining functions build the scenario-facing
//! [`OracleFn`]s.

use std::collections::{BTreeMap, BTreeSet};

use pairlock_app::RunEvent;
use pairlock_core::clock::RequestStamp;
use pairlock_proto::ParticipantId;

use crate::scenario::{OracleFn, World};

/// Critical-section intervals never overlap.
pub fn check_mutual_exclusion(events: &[RunEvent]) -> Result<(), String> {
    let mut holder: Option<ParticipantId> = None;
    for (index, event) in events.iter().enumerate() {
        match event {
            RunEvent::Entered { requester, .. } => {
                if let Some(current) = holder {
                    return Err(format!(
                        "event {index}: requester {requester} entered while {current} held the \
                         critical section"
                    ));
                }
                holder = Some(*requester);
            },
            RunEvent::Exited { requester, .. } => {
                if holder != Some(*requester) {
                    return Err(format!(
                        "event {index}: requester {requester} exited but holder was {holder:?}"
                    ));
                }
                holder = None;
            },
            _ => {},
        }
    }
    Ok(())
}

/// Of all requests outstanding at once, the smallest stamp enters first.
pub fn check_priority_order(events: &[RunEvent]) -> Result<(), String> {
    let mut outstanding: BTreeSet<RequestStamp> = BTreeSet::new();
    for (index, event) in events.iter().enumerate() {
        match event {
            RunEvent::Requested { stamp, .. } => {
                outstanding.insert(*stamp);
            },
            RunEvent::Entered { stamp, .. } => {
                let first = outstanding.first().copied();
                if first != Some(*stamp) {
                    return Err(format!(
                        "event {index}: {stamp} entered ahead of outstanding {first:?}"
                    ));
                }
                outstanding.remove(stamp);
            },
            _ => {},
        }
    }
    Ok(())
}

/// Every deferred peer is answered exactly once, at the next release.
pub fn check_deferred_drained(events: &[RunEvent]) -> Result<(), String> {
    let mut deferred: BTreeMap<ParticipantId, Vec<ParticipantId>> = BTreeMap::new();
    for (index, event) in events.iter().enumerate() {
        match event {
            RunEvent::Deferred { requester, peer } => {
                let queue = deferred.entry(*requester).or_default();
                if queue.contains(peer) {
                    return Err(format!(
                        "event {index}: requester {requester} deferred {peer} twice"
                    ));
                }
                queue.push(*peer);
            },
            RunEvent::Exited { requester, replied } => {
                let expected = deferred.remove(requester).unwrap_or_default();
                if *replied != expected {
                    return Err(format!(
                        "event {index}: requester {requester} replied to {replied:?} on \
                         release, deferred {expected:?}"
                    ));
                }
            },
            _ => {},
        }
    }
    Ok(())
}

/// No responder is accepted by two requesters at the same time.
pub fn check_responder_exclusive(events: &[RunEvent]) -> Result<(), String> {
    let mut partners: BTreeMap<ParticipantId, ParticipantId> = BTreeMap::new();
    for (index, event) in events.iter().enumerate() {
        match event {
            RunEvent::Accepted { responder, partner } => {
                if let Some(existing) = partners.insert(*responder, *partner) {
                    return Err(format!(
                        "event {index}: responder {responder} accepted {partner} while paired \
                         with {existing}"
                    ));
                }
            },
            RunEvent::Freed { responder, partner } => {
                if partners.remove(responder) != Some(*partner) {
                    return Err(format!(
                        "event {index}: responder {responder} freed by {partner} without being \
                         paired to it"
                    ));
                }
            },
            _ => {},
        }
    }
    Ok(())
}

/// No requester pairs with the same responder twice.
pub fn check_pairing_unique(events: &[RunEvent]) -> Result<(), String> {
    let mut seen = BTreeSet::new();
    for (index, event) in events.iter().enumerate() {
        if let RunEvent::Paired { requester, responder } = event
            && !seen.insert((*requester, *responder))
        {
            return Err(format!(
                "event {index}: requester {requester} paired with {responder} again"
            ));
        }
    }
    Ok(())
}

/// Critical-section intervals never overlap.
pub fn mutual_exclusion() -> OracleFn {
    Box::new(|world: &World| check_mutual_exclusion(world.events()))
}

/// Concurrent requests are granted in stamp order.
pub fn priority_order() -> OracleFn {
    Box::new(|world: &World| check_priority_order(world.events()))
}

/// Deferred replies are sent on release and no queue is left behind.
pub fn deferred_drained() -> OracleFn {
    Box::new(|world: &World| {
        check_deferred_drained(world.events())?;
        for id in world.group().requesters() {
            let requester =
                world.requester(id).ok_or_else(|| format!("requester {id} missing"))?;
            if !requester.deferred().is_empty() {
                return Err(format!(
                    "requester {id} still defers {:?} at the end of the run",
                    requester.deferred()
                ));
            }
        }
        Ok(())
    })
}

/// Responders are held by at most one requester and all are free at the end.
pub fn responder_exclusive() -> OracleFn {
    Box::new(|world: &World| {
        check_responder_exclusive(world.events())?;
        for id in world.group().responders() {
            let responder =
                world.responder(id).ok_or_else(|| format!("responder {id} missing"))?;
            if let Some(partner) = responder.partner() {
                return Err(format!("responder {id} still paired with {partner}"));
            }
        }
        Ok(())
    })
}

/// No requester pairs with the same responder twice, and every pairing is
/// in the requester's record.
pub fn pairing_unique() -> OracleFn {
    Box::new(|world: &World| {
        check_pairing_unique(world.events())?;
        for id in world.group().requesters() {
            let requester =
                world.requester(id).ok_or_else(|| format!("requester {id} missing"))?;
            let logged: BTreeSet<_> = world
                .events()
                .iter()
                .filter_map(|event| match event {
                    RunEvent::Paired { requester, responder } if *requester == id => {
                        Some(*responder)
                    },
                    _ => None,
                })
                .collect();
            let recorded: BTreeSet<_> = requester.pairing_record().paired().collect();
            if logged != recorded {
                return Err(format!(
                    "requester {id} paired with {logged:?} but recorded {recorded:?}"
                ));
            }
        }
        Ok(())
    })
}

/// Every requester ran its cycles and the network drained.
pub fn all_cycles_completed() -> OracleFn {
    Box::new(|world: &World| {
        for id in world.group().requesters() {
            if world.cycles(id) != world.target_cycles() {
                return Err(format!(
                    "requester {id} completed {} of {} cycles",
                    world.cycles(id),
                    world.target_cycles()
                ));
            }
        }
        if world.in_flight() != 0 {
            return Err(format!("{} messages still in flight", world.in_flight()));
        }
        Ok(())
    })
}

/// Every oracle in `oracles` must pass; the first failure is reported.
pub fn all_of(oracles: Vec<OracleFn>) -> OracleFn {
    Box::new(move |world: &World| oracles.iter().try_for_each(|oracle| oracle(world)))
}

/// Every built-in oracle.
pub fn standard() -> OracleFn {
    all_of(vec![
        mutual_exclusion(),
        priority_order(),
        deferred_drained(),
        responder_exclusive(),
        pairing_unique(),
        all_cycles_completed(),
    ])
}
