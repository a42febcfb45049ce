use xroute::redistributor::INF;

use crate::common::virtual_kernel::{key, prefix, VirtualDaemon};

mod common;

const P: &str = "10.0.0.0/24";
const Q: &str = "10.0.1.0/24";

/// X (metric 15, installed) and Y (metric 22) for P, Z (metric 31) for P through a third gateway
fn competing() -> VirtualDaemon {
    let mut daemon = VirtualDaemon::new();
    daemon.set_gateway("G", "N", 10);
    daemon.set_gateway("G2", "N2", 20);
    daemon.set_gateway("G3", "N3", 30);
    daemon.advertise(P, "G", "N", 5);
    daemon.advertise(P, "G3", "N3", 1);
    daemon.advertise(P, "G2", "N2", 2);
    daemon
}

#[test]
fn flushing_installed_route_promotes_best() {
    let mut daemon = competing();
    daemon.redistributor.flush(&daemon.gateways, &key(P, "G", "N")).unwrap();

    assert_eq!(daemon.redistributor.xroutes().len(), 2);
    assert_eq!(daemon.installed_via(P).as_deref(), Some("G2"));
    assert_eq!(daemon.installed_count(P), 1);

    let kernel = daemon.kernel();
    assert_eq!(kernel.flushes(), 1);
    assert_eq!(kernel.adds(), 2);
}

#[test]
fn flushing_candidate_leaves_incumbent() {
    let mut daemon = competing();
    daemon.redistributor.flush(&daemon.gateways, &key(P, "G2", "N2")).unwrap();
    assert_eq!(daemon.installed_via(P).as_deref(), Some("G"));
    assert_eq!(daemon.kernel().log.len(), 1);
}

#[test]
fn flushing_last_route_empties_prefix() {
    let mut daemon = VirtualDaemon::new();
    daemon.set_gateway("G", "N", 10);
    daemon.advertise(P, "G", "N", 5);
    daemon.redistributor.flush(&daemon.gateways, &key(P, "G", "N")).unwrap();
    assert!(daemon.redistributor.xroutes().is_empty());
    assert!(daemon.kernel().table.is_empty());
}

#[test]
fn neighbour_departure() {
    let mut daemon = competing();
    daemon.advertise(Q, "G", "N", 5);
    daemon.redistributor.flush_for_neighbour(&daemon.gateways, &"N".to_string());

    let remaining: Vec<_> = daemon.redistributor.xroutes().iter().map(|x| x.gateway.clone()).collect();
    assert_eq!(remaining.len(), 2);
    assert!(!remaining.contains(&"G".to_string()));
    assert_eq!(daemon.installed_via(P).as_deref(), Some("G2"));
    assert_eq!(daemon.installed_via(Q), None);
    assert_eq!(daemon.kernel().table.len(), 1);
}

#[test]
fn retraction_with_exceptions() {
    let mut daemon = competing();
    daemon.advertise(Q, "G", "N", 5);
    daemon.advertise(Q, "G2", "N2", 1);

    daemon
        .redistributor
        .retract(&daemon.gateways, &"G".to_string(), &"N".to_string(), &[prefix(Q)]);

    let x = daemon.route(P, "G", "N");
    assert_eq!(x.metric, INF);
    assert_eq!(x.cost, INF);
    assert!(!x.installed);
    assert_eq!(daemon.installed_via(P).as_deref(), Some("G2"));

    let excepted = daemon.route(Q, "G", "N");
    assert_eq!(excepted.metric, 15);
    assert!(excepted.installed);

    // other gateways are untouched
    assert_eq!(daemon.route(P, "G3", "N3").metric, 31);
    assert_eq!(daemon.route(Q, "G2", "N2").metric, 21);
}

#[test]
fn stale_routes_are_retracted_then_dropped() {
    let mut daemon = VirtualDaemon::new();
    daemon.set_gateway("G", "N", 10);
    daemon.advertise(P, "G", "N", 5);

    daemon.now = 30;
    daemon.redistributor.expire(&daemon.gateways, daemon.now);
    assert_eq!(daemon.route(P, "G", "N").metric, 15);

    daemon.now = 50;
    daemon.redistributor.expire(&daemon.gateways, daemon.now);
    assert_eq!(daemon.route(P, "G", "N").metric, INF);

    daemon.now = 60;
    daemon.advertise(P, "G", "N", 5);
    assert_eq!(daemon.route(P, "G", "N").metric, 15);

    daemon.now = 300;
    daemon.redistributor.expire(&daemon.gateways, daemon.now);
    assert!(daemon.redistributor.xroutes().is_empty());
    assert!(daemon.kernel().table.is_empty());
}

#[test]
fn expiry_promotes_fresh_route() {
    let mut daemon = VirtualDaemon::new();
    daemon.set_gateway("G", "N", 10);
    daemon.set_gateway("G2", "N2", 20);
    daemon.advertise(P, "G", "N", 5);

    daemon.now = 170;
    daemon.advertise(P, "G2", "N2", 2);
    assert_eq!(daemon.installed_via(P).as_deref(), Some("G"));

    daemon.now = 200;
    daemon.redistributor.expire(&daemon.gateways, daemon.now);
    assert_eq!(daemon.redistributor.xroutes().len(), 1);
    let y = daemon.route(P, "G2", "N2");
    assert_eq!(y.metric, 22);
    assert!(y.installed);
}
