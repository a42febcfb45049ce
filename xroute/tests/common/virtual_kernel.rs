use std::collections::{BTreeMap, BTreeSet, HashMap};

use xroute::concepts::kernel::{KernelError, KernelOperation, KernelRoute};
use xroute::concepts::prefix::Prefix;
use xroute::concepts::route::{ExternalRoute, GatewayRoute, XrouteKey};
use xroute::framework::{KernelRoutes, RedistributionParams, RedistributionSystem};
use xroute::redistributor::Redistributor;

pub struct VirtualSystem;

impl RedistributionSystem for VirtualSystem {
    type Gateway = String;
    type Neighbour = String;
    type NexthopAddress = String;
    type InterfaceIndex = u32;
    type Kernel = VirtualKernel;
}

/// An in-memory forwarding table that records every operation it is given
#[derive(Default)]
pub struct VirtualKernel {
    /// (prefix, nexthop address) -> kernel metric
    pub table: BTreeMap<(Prefix, String), u32>,
    /// routes put into the kernel by other actors
    pub foreign: BTreeSet<Prefix>,
    pub log: Vec<(KernelOperation, KernelRoute<VirtualSystem>)>,
    /// the next operation fails with this error, after being logged
    pub fail_next: Option<KernelError>,
    pub fail_snapshot: bool,
    pub snapshots: usize,
}

impl VirtualKernel {
    pub fn count(&self, op: fn(&KernelOperation) -> bool) -> usize {
        self.log.iter().filter(|(o, _)| op(o)).count()
    }

    pub fn adds(&self) -> usize {
        self.count(|o| *o == KernelOperation::Add)
    }

    pub fn flushes(&self) -> usize {
        self.count(|o| *o == KernelOperation::Flush)
    }

    pub fn modifies(&self) -> usize {
        self.count(|o| matches!(o, KernelOperation::Modify { .. }))
    }
}

impl KernelRoutes<VirtualSystem> for VirtualKernel {
    fn apply(&mut self, operation: KernelOperation, route: &KernelRoute<VirtualSystem>) -> Result<(), KernelError> {
        self.log.push((operation, route.clone()));
        if let Some(err) = self.fail_next.take() {
            return Err(err);
        }
        let key = (route.prefix, route.nexthop.clone());
        match operation {
            KernelOperation::Add => {
                if self.table.contains_key(&key) {
                    return Err(KernelError::AlreadyExists);
                }
                self.table.insert(key, route.metric);
            }
            KernelOperation::Modify { new_metric } => match self.table.get_mut(&key) {
                Some(metric) if *metric == route.metric => *metric = new_metric,
                _ => return Err(KernelError::NotFound),
            },
            KernelOperation::Flush => {
                if self.table.remove(&key).is_none() {
                    return Err(KernelError::NotFound);
                }
            }
        }
        Ok(())
    }

    fn snapshot(&mut self, max_plen: u8, capacity: usize) -> Result<Vec<Prefix>, KernelError> {
        self.snapshots += 1;
        if self.fail_snapshot {
            return Err(KernelError::Other("netlink dump interrupted".to_string()));
        }
        Ok(self
            .table
            .keys()
            .map(|(prefix, _)| *prefix)
            .chain(self.foreign.iter().copied())
            .filter(|prefix| prefix.plen() <= max_plen)
            .take(capacity)
            .collect())
    }
}

pub fn prefix(s: &str) -> Prefix {
    s.parse().unwrap_or_else(|e| panic!("bad prefix {s}: {e}"))
}

pub fn key(p: &str, gateway: &str, nexthop: &str) -> XrouteKey<VirtualSystem> {
    XrouteKey::new(prefix(p), gateway.to_string(), nexthop.to_string())
}

/// A daemon with its own route table towards gateways, and a redistributor
pub struct VirtualDaemon {
    pub gateways: HashMap<String, GatewayRoute<VirtualSystem>>,
    pub redistributor: Redistributor<VirtualSystem>,
    pub now: u64,
}

impl VirtualDaemon {
    pub fn new() -> Self {
        Self::with_params(Default::default())
    }

    pub fn with_params(params: RedistributionParams) -> Self {
        Self {
            gateways: HashMap::new(),
            redistributor: Redistributor::with_params(VirtualKernel::default(), params),
            now: 0,
        }
    }

    /// Selects a route to `gateway` via `nexthop`, without telling the redistributor
    pub fn set_gateway(&mut self, gateway: &str, nexthop: &str, metric: u16) -> GatewayRoute<VirtualSystem> {
        let route = GatewayRoute {
            dest: gateway.to_string(),
            nexthop: nexthop.to_string(),
            nexthop_address: format!("addr-{nexthop}"),
            interface: 1,
            metric,
        };
        self.gateways.insert(gateway.to_string(), route.clone());
        route
    }

    pub fn remove_gateway(&mut self, gateway: &str) {
        self.gateways.remove(gateway);
    }

    pub fn advertise(&mut self, p: &str, gateway: &str, nexthop: &str, cost: u16) -> ExternalRoute<VirtualSystem> {
        self.redistributor
            .update(&self.gateways, prefix(p), Some(gateway.to_string()), nexthop.to_string(), cost, self.now)
            .unwrap_or_else(|e| panic!("advertisement of {p} rejected: {e}"))
            .clone()
    }

    pub fn route(&self, p: &str, gateway: &str, nexthop: &str) -> &ExternalRoute<VirtualSystem> {
        self.redistributor
            .get(&key(p, gateway, nexthop))
            .unwrap_or_else(|| panic!("No route for {p} via {gateway}/{nexthop}"))
    }

    /// The gateway of the installed route for `p`
    pub fn installed_via(&self, p: &str) -> Option<String> {
        self.redistributor.find_installed(&prefix(p)).map(|x| x.gateway.clone())
    }

    pub fn installed_count(&self, p: &str) -> usize {
        let p = prefix(p);
        self.redistributor
            .xroutes()
            .iter()
            .filter(|x| x.installed && x.prefix == p)
            .count()
    }

    pub fn kernel(&mut self) -> &mut VirtualKernel {
        &mut self.redistributor.kernel
    }
}
