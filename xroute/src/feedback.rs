use std::fmt::{Display, Formatter};

use educe::Educe;
use thiserror::Error;

use crate::concepts::kernel::{KernelError, KernelOperation};
use crate::concepts::prefix::Prefix;
use crate::concepts::route::XrouteKey;
use crate::framework::RedistributionSystem;

/// Returned to the caller, nothing was changed.
#[derive(Error)]
#[derive(Educe)]
#[educe(Debug(bound()))]
pub enum RedistributionError<T: RedistributionSystem + ?Sized> {
    #[error("ignoring martian prefix {prefix}")]
    MartianPrefix { prefix: Prefix },
    #[error("ignoring route for {prefix} through unknown destination")]
    UnknownGateway { prefix: Prefix },
    /// The table does not grow, the advertisement must be dropped
    #[error("too many {table} entries (capacity {capacity})")]
    TableFull {
        table: &'static str,
        capacity: usize,
    },
    /// Reconciliation could not read the kernel table, export states are unchanged
    #[error("failed to read kernel routes: {source}")]
    KernelQueryFailed { source: KernelError },
    #[error("no external route for {}", .key.prefix)]
    UnknownRoute { key: XrouteKey<T> },
}

/// Although this is an error enum, these should be treated as warnings.
/// The operation that raised them was abandoned, leaving the previous state in place.
#[derive(Error)]
#[derive(Educe)]
#[educe(Debug(bound()), Clone(bound()))]
pub enum RedistributionWarning<T: RedistributionSystem + ?Sized> {
    #[error("kernel {operation} for {prefix} failed: {reason}")]
    KernelOperationFailed {
        operation: KernelOperation,
        prefix: Prefix,
        reason: KernelError,
    },
    /// A route was about to be, or already is, forwarding through a gateway it can no longer reach.
    /// This indicates a caller that did not propagate a gateway change.
    #[error("{context} for {prefix} via {gateway:?}")]
    Blackhole {
        prefix: Prefix,
        gateway: T::Gateway,
        context: BlackholeContext,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlackholeContext {
    Install,
    Uninstall,
    /// an installed route's gateway vanished before its metric could be updated
    Installed,
}

impl Display for BlackholeContext {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            BlackholeContext::Install => write!(f, "attempted to install a blackhole route"),
            BlackholeContext::Uninstall => write!(f, "attempted to uninstall a blackhole route"),
            BlackholeContext::Installed => write!(f, "found installed blackhole route"),
        }
    }
}
