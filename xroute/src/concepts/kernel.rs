use std::fmt::{Display, Formatter};

use crate::concepts::prefix::Prefix;
use crate::framework::RedistributionSystem;
use educe::Educe;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Kernel metric used for unreachable routes
pub const KERNEL_INFINITY: u32 = 0xFFFF;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum KernelOperation {
    Add,
    /// change the metric of an existing entry, the entry is identified by its current metric
    Modify { new_metric: u32 },
    Flush,
}

impl Display for KernelOperation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            KernelOperation::Add => write!(f, "add"),
            KernelOperation::Modify { .. } => write!(f, "modify"),
            KernelOperation::Flush => write!(f, "flush"),
        }
    }
}

/// A forwarding table entry as the kernel sees it
#[derive(Educe)]
#[educe(Clone(bound()), Debug(bound()))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(bound = ""))]
pub struct KernelRoute<T: RedistributionSystem + ?Sized> {
    pub prefix: Prefix,
    pub nexthop: T::NexthopAddress,
    pub interface: T::InterfaceIndex,
    /// kernel encoded metric
    pub metric: u32,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KernelError {
    #[error("route already exists")]
    AlreadyExists,
    #[error("no such route")]
    NotFound,
    #[error("{0}")]
    Other(String),
}
