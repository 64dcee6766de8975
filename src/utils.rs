/// Helper function for comparing solver floating-point output against
/// a reference value within a fixed tolerance, since exact equality is
/// never guaranteed.
///
/// ## Example
///
/// ```
/// assert!(gridhard::utils::approx_eq(1.0000001, 1.0, 1e-3));
/// assert!(!gridhard::utils::approx_eq(1.1, 1.0, 1e-3));
/// ```
pub fn approx_eq(a: f64, b: f64, tolerance: f64) -> bool {
    (a - b).abs() <= tolerance
}

/// Helper function for rendering an id set the way the report tables
/// and CSV artifacts print it.
///
/// ## Example
///
/// ```
/// let ids = vec![2, 11];
/// assert_eq!(gridhard::utils::format_ids(&ids), "[2, 11]");
/// ```
pub fn format_ids(ids: &[usize]) -> String {
    format!("{:?}", ids)
}
