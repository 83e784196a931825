use std::time::{Duration, SystemTime, UNIX_EPOCH};

// Get current timestamp in milliseconds
pub fn get_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_millis() as u64
}

// Wall-clock deadline for a countdown that starts now
pub fn deadline_ms(delay: Duration) -> u64 {
    get_timestamp() + delay.as_millis() as u64
}
