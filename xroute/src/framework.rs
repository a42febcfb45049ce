use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;

use cfg_if::cfg_if;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::concepts::kernel::{KernelError, KernelOperation, KernelRoute};
use crate::concepts::prefix::Prefix;
use crate::concepts::route::GatewayRoute;
use crate::util::metric_to_kernel;

/// Describes the daemon that embeds the redistributor: its identities, and how it talks to the kernel.
pub trait RedistributionSystem {
    /// A routing destination that external routes ride on, MUST be unique
    type Gateway: Identity + RouteData;
    /// An adjacent neighbour
    type Neighbour: Identity + RouteData;
    /// Network address of a neighbour, as given to the kernel
    type NexthopAddress: RouteData;
    /// Outgoing interface, as given to the kernel
    type InterfaceIndex: RouteData;
    /// Mutates and queries the kernel forwarding table
    type Kernel: KernelRoutes<Self>;

    fn config() -> RedistributionParams {
        Default::default()
    }

    /// Prefixes for which this returns true are never redistributed
    fn is_martian(prefix: &Prefix) -> bool {
        prefix.is_martian()
    }
}

cfg_if! {
    if #[cfg(feature = "serde")] {
        pub trait RouteData: Clone + Debug + Serialize + serde::de::DeserializeOwned + Sized {}
        impl<T: Clone + Debug + Serialize + serde::de::DeserializeOwned + Sized> RouteData for T {}
    } else {
        pub trait RouteData: Clone + Debug + Sized {}
        impl<T: Clone + Debug + Sized> RouteData for T {}
    }
}
pub trait Identity: Eq + PartialEq + Hash {}
impl<T: Eq + PartialEq + Hash> Identity for T {}

/// Lookup into the daemon's own route table
pub trait GatewayRoutes<T: RedistributionSystem + ?Sized> {
    /// The currently installed route to `gateway`, if any
    fn find_installed(&self, gateway: &T::Gateway) -> Option<GatewayRoute<T>>;
}

impl<T: RedistributionSystem + ?Sized> GatewayRoutes<T> for HashMap<T::Gateway, GatewayRoute<T>> {
    fn find_installed(&self, gateway: &T::Gateway) -> Option<GatewayRoute<T>> {
        self.get(gateway).cloned()
    }
}

/// The kernel forwarding table. Calls are expected to block until the kernel has answered.
pub trait KernelRoutes<T: RedistributionSystem + ?Sized> {
    /// Adding an entry that already exists should fail with [`KernelError::AlreadyExists`],
    /// flushing one that does not with [`KernelError::NotFound`].
    fn apply(&mut self, operation: KernelOperation, route: &KernelRoute<T>) -> Result<(), KernelError>;

    /// At most `capacity` installed prefixes, including at least every prefix of length `<= max_plen`.
    fn snapshot(&mut self, max_plen: u8, capacity: usize) -> Result<Vec<Prefix>, KernelError>;

    /// Translates an internal metric into the kernel's scale, must be monotonic
    fn kernel_metric(&self, metric: u16) -> u32 {
        metric_to_kernel(metric)
    }
}

/// Redistribution parameters, the defaults are the ones historically used by babel
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
pub struct RedistributionParams {
    /// a challenger must beat the installed route by more than this before it replaces it
    pub hysteresis: u16,
    pub max_xroutes: usize,
    pub max_exports: usize,
    /// largest kernel snapshot requested while reconciling exports
    pub snapshot_capacity: usize,
    /// seconds after which an external route that was not re-advertised is dropped
    pub gc_delay: u64,
    /// seconds after which an external route that was not re-advertised stops being reachable
    pub hold_delay: u64,
}

impl Default for RedistributionParams {
    fn default() -> Self {
        Self {
            hysteresis: 64,
            max_xroutes: 64,
            max_exports: 64,
            snapshot_capacity: 120,
            gc_delay: 180,
            hold_delay: 45,
        }
    }
}
