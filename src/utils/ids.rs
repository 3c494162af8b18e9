//! Identifier and clock helpers shared by messages and sessions.

use std::time::{SystemTime, UNIX_EPOCH};

const ID_SUFFIX_LEN: usize = 9;
const BASE36: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Current wall-clock time in milliseconds since the Unix epoch.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Generate an opaque identifier of the form `<epoch-millis>-<9 base36 chars>`.
///
/// Unique with overwhelming probability inside one process; not meant to be
/// globally unique across machines.
pub fn generate_id() -> String {
    let mut bytes = [0_u8; ID_SUFFIX_LEN];
    if getrandom::fill(&mut bytes).is_err() {
        // No OS entropy available; fall back on the sub-second clock.
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.subsec_nanos())
            .unwrap_or_default();
        for (index, byte) in bytes.iter_mut().enumerate() {
            *byte = (nanos >> ((index % 4) * 8)) as u8 ^ (index as u8).wrapping_mul(31);
        }
    }

    let suffix: String = bytes
        .iter()
        .map(|byte| BASE36[usize::from(*byte) % BASE36.len()] as char)
        .collect();
    format!("{}-{suffix}", now_millis())
}
