//! Fuzz target for whole-room scenarios
//!
//! Seats a host and up to three guests in the simulated relay, then replays
//! a fuzzer-chosen sequence of taps, round control, renames, leaves,
//! rejoins, connection resets and link cuts.
//!
//! # Invariants
//!
//! Every settled room, after every step:
//! - Has exactly one host
//! - Holds unique connection IDs and names
//! - Shows the same roster to every member
//! - Agrees on round phase and tap counts

#![no_main]

use libfuzzer_sys::fuzz_target;
use tapparty_harness::{Scenario, steps_from_bytes};

fuzz_target!(|data: &[u8]| {
    let Some((&header, rest)) = data.split_first() else {
        return;
    };
    let guests = usize::from(header % 4);
    let steps = steps_from_bytes(rest);

    let Ok(mut scenario) = Scenario::seated(u64::from(header), guests) else {
        return;
    };
    if let Err((index, violations)) = scenario.run(&steps) {
        panic!("step {index} ({:?}) broke the room: {violations:?}", steps[index]);
    }
});
