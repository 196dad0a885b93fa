use rand::Rng;
use tracing::warn;

use crate::constants::moderation::{INFRACTION_ID_ALPHABET, INFRACTION_ID_LEN};

/// Generate one candidate infraction id.
pub fn generate() -> String {
    let mut rng = rand::thread_rng();
    (0..INFRACTION_ID_LEN)
        .map(|_| {
            let idx = rng.gen_range(0..INFRACTION_ID_ALPHABET.len());
            INFRACTION_ID_ALPHABET[idx] as char
        })
        .collect()
}

/// Generate an id not currently in use, retrying while `exists` reports a
/// collision. Collisions are improbable enough that the loop is unbounded;
/// the atomic insert on the store is what actually prevents a duplicate
/// from being persisted under concurrency.
pub fn allocate(mut exists: impl FnMut(&str) -> bool) -> String {
    loop {
        let candidate = generate();
        if !exists(&candidate) {
            return candidate;
        }
        warn!("Infraction id collision on {}, regenerating", candidate);
    }
}
