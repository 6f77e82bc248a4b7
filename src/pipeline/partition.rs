/// Worker index owning all events of `event_type`.
///
/// Every event of a given type lands on the same worker, which preserves
/// per-type ordering.
pub fn partition_for(event_type: i32, partitions: usize) -> usize {
    let partitions = partitions.max(1) as i64;
    i64::from(event_type).rem_euclid(partitions) as usize
}
