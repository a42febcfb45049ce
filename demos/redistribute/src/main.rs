use std::collections::{BTreeMap, HashMap};
use std::fs;

use log::{info, warn, LevelFilter};
use simplelog::*;
use xroute::concepts::kernel::{KernelError, KernelOperation, KernelRoute};
use xroute::concepts::prefix::Prefix;
use xroute::concepts::route::{GatewayRoute, XrouteKey};
use xroute::framework::{KernelRoutes, RedistributionParams, RedistributionSystem};
use xroute::redistributor::Redistributor;

struct DemoSystem {} // just a type to tell xroute about our identities
impl RedistributionSystem for DemoSystem {
    type Gateway = String; // routers have string names
    type Neighbour = String;
    type NexthopAddress = String;
    type InterfaceIndex = u32;
    type Kernel = PrintingKernel;
}

/// Keeps the forwarding table in memory and prints every change
#[derive(Default)]
struct PrintingKernel {
    table: BTreeMap<Prefix, (String, u32)>,
}

impl KernelRoutes<DemoSystem> for PrintingKernel {
    fn apply(&mut self, operation: KernelOperation, route: &KernelRoute<DemoSystem>) -> Result<(), KernelError> {
        info!("kernel {operation} {} via {} dev {} metric {}", route.prefix, route.nexthop, route.interface, route.metric);
        match operation {
            KernelOperation::Add => {
                if self.table.contains_key(&route.prefix) {
                    return Err(KernelError::AlreadyExists);
                }
                self.table.insert(route.prefix, (route.nexthop.clone(), route.metric));
            }
            KernelOperation::Modify { new_metric } => {
                let entry = self.table.get_mut(&route.prefix).ok_or(KernelError::NotFound)?;
                entry.1 = new_metric;
            }
            KernelOperation::Flush => {
                self.table.remove(&route.prefix).ok_or(KernelError::NotFound)?;
            }
        }
        Ok(())
    }

    fn snapshot(&mut self, max_plen: u8, capacity: usize) -> Result<Vec<Prefix>, KernelError> {
        Ok(self.table.keys().filter(|p| p.plen() <= max_plen).take(capacity).copied().collect())
    }
}

fn gateway(dest: &str, nexthop: &str, metric: u16) -> GatewayRoute<DemoSystem> {
    GatewayRoute {
        dest: dest.to_string(),
        nexthop: nexthop.to_string(),
        nexthop_address: format!("{nexthop}.lan"),
        interface: 2,
        metric,
    }
}

fn load_params() -> anyhow::Result<RedistributionParams> {
    match std::env::args().nth(1) {
        Some(path) => Ok(serde_json::from_str(&fs::read_to_string(path)?)?),
        None => Ok(DemoSystem::config()),
    }
}

fn main() -> anyhow::Result<()> {
    CombinedLogger::init(vec![TermLogger::new(
        LevelFilter::Debug,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )])?;

    let params = load_params()?;
    info!("Starting redistribution demo, hysteresis {}", params.hysteresis);

    // our daemon knows two gateways: alice via bob, and carol directly
    let mut gateways = HashMap::new();
    gateways.insert("alice".to_string(), gateway("alice", "bob", 10));
    gateways.insert("carol".to_string(), gateway("carol", "carol", 20));

    let mut red = Redistributor::<DemoSystem>::with_params(PrintingKernel::default(), params);
    let prefix: Prefix = "10.0.0.0/24".parse()?;

    red.update(&gateways, prefix, Some("alice".to_string()), "bob".to_string(), 5, 0)?;
    red.update(&gateways, prefix, Some("carol".to_string()), "carol".to_string(), 2, 0)?;

    // alice's advertisement gets a lot worse, carol should take over
    red.update_metric(&gateways, &XrouteKey::new(prefix, "alice".to_string(), "bob".to_string()), 100)?;

    // bob goes away, taking every route through him along
    gateways.remove("alice");
    red.flush_for_neighbour(&gateways, &"bob".to_string());

    red.add_export("192.168.0.0/16".parse()?, 0, false)?;
    let changed = red.check_exports()?;
    info!("exports changed: {changed}");

    for warning in red.warnings.drain(..) {
        warn!("{warning}");
    }
    println!("{}", red.dump()?);
    Ok(())
}
