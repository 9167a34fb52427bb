use std::time::Duration;

use super::*;

#[test]
fn short_timeouts_keep_their_millis() {
    assert_eq!(timeout_millis(Duration::from_millis(0)), 0);
    assert_eq!(timeout_millis(Duration::from_millis(50)), 50);
    assert_eq!(timeout_millis(Duration::from_secs(10)), 10_000);
}

#[test]
fn long_timeouts_clamp_to_signed_32_bit_range() {
    let max = u32::try_from(i32::MAX).expect("i32::MAX fits in u32");
    assert_eq!(MAX_TIMEOUT_MS, max);
    assert_eq!(timeout_millis(Duration::from_millis(u64::from(max))), max);
    assert_eq!(timeout_millis(Duration::from_millis(u64::from(max) + 1)), max);
    assert_eq!(timeout_millis(Duration::from_secs(30 * 86_400)), max);
    assert_eq!(timeout_millis(Duration::MAX), max);
}

#[test]
fn deadline_is_created_without_a_runtime() {
    let deadline = Deadline::after(Duration::from_millis(5));
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .expect("runtime");
    runtime.block_on(deadline.elapsed());
}

#[test]
fn huge_timeout_does_not_overflow() {
    let deadline = Deadline::after(Duration::MAX);
    assert!(deadline.0 > tokio::time::Instant::now());
}
