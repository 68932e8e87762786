/// Usage as a percentage of capacity, rounded UP at two decimals.
///
/// The ceiling is deliberate: the displayed percentage must never
/// under-report usage, so 1/3 becomes 33.34, not 33.33. With
/// `capacity == 0` the result is non-finite; callers detect the
/// no-metric case before calling.
pub fn compute_load(used: f64, capacity: f64) -> f64 {
    (1e4 * used / capacity).ceil() / 100.0
}
