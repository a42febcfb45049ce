use crate::concepts::prefix::Prefix;
use crate::framework::RedistributionSystem;
use crate::redistributor::INF;
use educe::Educe;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A route learned from outside the protocol, candidate for installation into the kernel
#[derive(Educe)]
#[educe(Clone(bound()), Debug(bound()))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(bound = ""))]
pub struct ExternalRoute<T: RedistributionSystem + ?Sized> {
    pub prefix: Prefix,
    /// the destination whose reachability this route rides on, resolved afresh on every use
    pub gateway: T::Gateway,
    /// the neighbour used to reach the gateway
    pub nexthop: T::Neighbour,
    /// the advertised cost, independent of the path to the gateway
    pub cost: u16,
    /// min(gateway metric + cost, INF), only meaningful against the current gateway route
    pub metric: u16,
    /// seconds timestamp of the last advertisement
    pub last_update: u64,
    /// whether this route is currently in the kernel forwarding table
    pub installed: bool,
}

impl<T: RedistributionSystem + ?Sized> ExternalRoute<T> {
    pub fn key(&self) -> XrouteKey<T> {
        XrouteKey {
            prefix: self.prefix,
            gateway: self.gateway.clone(),
            nexthop: self.nexthop.clone(),
        }
    }

    pub fn matches(&self, key: &XrouteKey<T>) -> bool {
        self.prefix == key.prefix && self.gateway == key.gateway && self.nexthop == key.nexthop
    }

    pub fn is_through(&self, gateway: &T::Gateway, nexthop: &T::Neighbour) -> bool {
        self.gateway == *gateway && self.nexthop == *nexthop
    }

    /// A reachable advertisement whose gateway became unreachable. It keeps its cost but must never be installed.
    pub fn is_degraded(&self) -> bool {
        self.metric >= INF && self.cost < INF
    }
}

/// Identifies an external route, stable across removals of other routes
#[derive(Educe)]
#[educe(Clone(bound()), Debug(bound()), PartialEq(bound()), Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(bound = ""))]
pub struct XrouteKey<T: RedistributionSystem + ?Sized> {
    pub prefix: Prefix,
    pub gateway: T::Gateway,
    pub nexthop: T::Neighbour,
}

impl<T: RedistributionSystem + ?Sized> XrouteKey<T> {
    pub fn new(prefix: Prefix, gateway: T::Gateway, nexthop: T::Neighbour) -> Self {
        Self {
            prefix,
            gateway,
            nexthop,
        }
    }
}

/// The internal route currently selected towards a gateway, as computed by the daemon's own route table
#[derive(Educe)]
#[educe(Clone(bound()), Debug(bound()))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(bound = ""))]
pub struct GatewayRoute<T: RedistributionSystem + ?Sized> {
    /// the gateway this route leads to
    pub dest: T::Gateway,
    pub nexthop: T::Neighbour,
    /// address of the nexthop, handed to the kernel
    pub nexthop_address: T::NexthopAddress,
    /// outgoing interface towards the nexthop
    pub interface: T::InterfaceIndex,
    pub metric: u16,
}
