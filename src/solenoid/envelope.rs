use std::time::Duration;

use crate::config::EnvelopeConfig;

/// Power to drive a solenoid with, `elapsed` after its note started.
///
/// During the attack the strike power scales linearly with velocity between
/// `min_power` and `max_power`. After `attack_cutoff_s` it steps down to
/// `hold_power`, whatever the velocity.
pub fn power_level(envelope: &EnvelopeConfig, velocity: u8, elapsed: Duration) -> i32 {
    if elapsed.as_secs_f64() >= envelope.attack_cutoff_s {
        return envelope.hold_power;
    }

    let max_velocity = envelope.max_velocity.max(1) as f64;
    let velocity = velocity.min(envelope.max_velocity) as f64;
    let span = (envelope.max_power - envelope.min_power) as f64;

    (envelope.min_power as f64 + span / max_velocity * velocity) as i32
}
