use crate::concepts::kernel::KERNEL_INFINITY;
use crate::redistributor::INF;
use std::cmp::min;

/// Adds a cost to a metric, saturating at INF
///
/// # Examples
///
/// ```
/// use xroute::redistributor::INF;
/// assert_eq!(xroute::util::add_metric(10, 5), 15);
/// assert_eq!(xroute::util::add_metric(0xFFF0, 0x20), INF);
/// assert_eq!(xroute::util::add_metric(3, INF), INF);
/// ```
pub fn add_metric(metric: u16, cost: u16) -> u16 {
    min(metric as u32 + cost as u32, INF as u32) as u16
}

/// Default kernel metric encoding, one kernel unit per 256 internal units (rounded up)
///
/// ```
/// use xroute::redistributor::INF;
/// use xroute::util::metric_to_kernel;
/// assert_eq!(metric_to_kernel(0), 0);
/// assert_eq!(metric_to_kernel(1), 1);
/// assert_eq!(metric_to_kernel(256), 1);
/// assert_eq!(metric_to_kernel(257), 2);
/// assert_eq!(metric_to_kernel(INF), 0xFFFF);
/// ```
pub fn metric_to_kernel(metric: u16) -> u32 {
    if metric >= INF {
        KERNEL_INFINITY
    } else {
        min((metric as u32 + 255) / 256, KERNEL_INFINITY)
    }
}
