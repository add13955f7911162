//! Property tests over the registry invariants that are naturally
//! universally-quantified (spec §8 "Invariants" and "Binary-semaphore
//! properties"), in the teacher's `quickcheck`/`quickcheck_macros` style.

use std::sync::Arc;

use osal_core::{BinSemRegistry, MutexRegistry};
use osal_port_std::StdPort;
use quickcheck_macros::quickcheck;

fn port() -> Arc<StdPort> {
    Arc::new(StdPort::new())
}

/// GetIdByName after a successful Create always returns the id Create
/// handed back, for any name that fits the limit.
#[quickcheck]
fn id_stable_across_get_id_by_name_round_trip(seed: u8) -> bool {
    let name = format!("n{seed}");
    let reg: MutexRegistry<StdPort, 8> = MutexRegistry::new(port(), 32);
    let id = match reg.create(&name, 0) {
        Ok(id) => id,
        Err(_) => return true, // name too long for this seed space; vacuously fine
    };
    reg.get_id_by_name(&name) == Ok(id)
}

/// Delete always makes the id invalid and the name unreachable, for any
/// sequence of creates that filled part of the table.
#[quickcheck]
fn delete_frees_id_and_name(count: u8) -> bool {
    let count = (count % 8) as usize;
    let reg: MutexRegistry<StdPort, 8> = MutexRegistry::new(port(), 32);
    let mut ids = Vec::new();
    for i in 0..count {
        ids.push(reg.create(&format!("m{i}"), 0).unwrap());
    }
    for (i, id) in ids.iter().enumerate() {
        reg.delete(*id).unwrap();
        if reg.get_id_by_name(&format!("m{i}")).is_ok() {
            return false;
        }
    }
    true
}

/// Concurrently attempted creates with the same name: at most one
/// succeeds, regardless of how many racers there are (spec §8).
#[quickcheck]
fn concurrent_same_name_creates_at_most_one_succeeds(racers: u8) -> bool {
    let racers = (racers % 12).max(2) as usize;
    let reg: Arc<MutexRegistry<StdPort, 16>> = Arc::new(MutexRegistry::new(port(), 32));
    let handles: Vec<_> = (0..racers)
        .map(|_| {
            let reg = Arc::clone(&reg);
            std::thread::spawn(move || reg.create("contested", 0))
        })
        .collect();
    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    results.iter().filter(|r| r.is_ok()).count() == 1
}

/// A binary semaphore's current_value stays in {0,1} under arbitrary
/// Give/Take/Flush sequences, and Take never panics or hangs forever once
/// any Give has happened (the test bounds Take with TimedTake so a
/// property-test failure reports as `false`, not a hang).
#[quickcheck]
fn binary_semaphore_value_stays_binary(ops: Vec<u8>) -> bool {
    let reg: BinSemRegistry<StdPort, 4> = BinSemRegistry::new(port(), 32);
    let s = reg.create("S", 0, 0).unwrap();
    for op in ops.into_iter().take(50) {
        match op % 3 {
            0 => {
                reg.give(s).unwrap();
            }
            1 => {
                let _ = reg.timed_take(s, 1);
            }
            _ => {
                reg.flush(s).unwrap();
            }
        }
        let value = reg.get_info(s).unwrap().current_value;
        if value > 1 {
            return false;
        }
    }
    true
}
