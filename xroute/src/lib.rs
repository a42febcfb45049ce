//! io-free redistribution of external routes into the kernel forwarding table.
//!
//! The embedding daemon describes itself through [`framework::RedistributionSystem`], feeds
//! advertisements and gateway changes into a [`redistributor::Redistributor`], and drives
//! [`redistributor::Redistributor::check_exports`] and [`redistributor::Redistributor::expire`]
//! from its own timers.

pub mod concepts;
pub mod feedback;
pub mod framework;
pub mod reconcile;
pub mod redistributor;
pub mod util;
