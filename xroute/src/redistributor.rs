use crate::concepts::export::LocalExport;
use crate::concepts::kernel::{KernelError, KernelOperation, KernelRoute};
use crate::concepts::prefix::Prefix;
use crate::concepts::route::{ExternalRoute, GatewayRoute, XrouteKey};
use crate::feedback::{BlackholeContext, RedistributionError, RedistributionWarning};
use crate::framework::{GatewayRoutes, KernelRoutes, RedistributionParams, RedistributionSystem};
use crate::util::add_metric;
use log::{debug, error, warn};
#[cfg(feature = "serde")]
use serde::Serialize;

pub const INF: u16 = 0xFFFF;

/// Owns the external route table and the local export table, and keeps the kernel in sync with them.
///
/// Every operation runs to completion synchronously. Gateways and neighbours are only ever
/// stored as identities, and are resolved through the daemon's [`GatewayRoutes`] on each use.
#[cfg_attr(feature = "serde", derive(Serialize), serde(bound = ""))]
pub struct Redistributor<T: RedistributionSystem + ?Sized> {
    pub params: RedistributionParams,
    pub(crate) xroutes: Vec<ExternalRoute<T>>,
    pub(crate) exports: Vec<LocalExport>,
    #[cfg_attr(feature = "serde", serde(skip))]
    pub kernel: T::Kernel,
    /// anomalies that were logged and recovered from, drain these to observe them
    #[cfg_attr(feature = "serde", serde(skip))]
    pub warnings: Vec<RedistributionWarning<T>>,
}

impl<T: RedistributionSystem> Redistributor<T> {
    pub fn new(kernel: T::Kernel) -> Self {
        Self::with_params(kernel, T::config())
    }

    pub fn with_params(kernel: T::Kernel, params: RedistributionParams) -> Self {
        Self {
            xroutes: Vec::with_capacity(params.max_xroutes),
            exports: Vec::with_capacity(params.max_exports),
            params,
            kernel,
            warnings: Vec::new(),
        }
    }

    // region Inspection

    pub fn xroutes(&self) -> &[ExternalRoute<T>] {
        &self.xroutes
    }

    pub fn exports(&self) -> &[LocalExport] {
        &self.exports
    }

    pub fn get(&self, key: &XrouteKey<T>) -> Option<&ExternalRoute<T>> {
        self.position(key).map(|i| &self.xroutes[i])
    }

    /// The external route currently in the kernel for `prefix`
    pub fn find_installed(&self, prefix: &Prefix) -> Option<&ExternalRoute<T>> {
        self.installed_xroute(prefix).map(|i| &self.xroutes[i])
    }

    /// The candidate with the lowest metric among routes whose gateway still resolves through their nexthop
    pub fn find_best(&self, routes: &impl GatewayRoutes<T>, prefix: &Prefix) -> Option<&ExternalRoute<T>> {
        self.best_candidate(routes, prefix).map(|i| &self.xroutes[i])
    }

    #[cfg(feature = "serde")]
    pub fn dump(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    fn position(&self, key: &XrouteKey<T>) -> Option<usize> {
        self.xroutes.iter().position(|x| x.matches(key))
    }

    fn locate(&self, key: &XrouteKey<T>) -> Result<usize, RedistributionError<T>> {
        self.position(key)
            .ok_or_else(|| RedistributionError::UnknownRoute { key: key.clone() })
    }

    fn installed_xroute(&self, prefix: &Prefix) -> Option<usize> {
        self.xroutes
            .iter()
            .position(|x| x.installed && x.prefix == *prefix)
    }

    pub(crate) fn installed_export(&self, prefix: &Prefix) -> Option<usize> {
        self.exports
            .iter()
            .position(|e| e.state.is_installed() && e.prefix == *prefix)
    }

    fn best_candidate(&self, routes: &impl GatewayRoutes<T>, prefix: &Prefix) -> Option<usize> {
        self.xroutes
            .iter()
            .enumerate()
            .filter(|(_, x)| x.prefix == *prefix && !x.is_degraded())
            .filter(|(_, x)| {
                routes
                    .find_installed(&x.gateway)
                    .is_some_and(|gw| gw.nexthop == x.nexthop)
            })
            .min_by_key(|(_, x)| x.metric)
            .map(|(i, _)| i)
    }
    // endregion

    // region Advertisements

    /// Records an advertisement of `prefix` through `gateway` via `nexthop`.
    ///
    /// A new route is immediately considered for installation if its gateway resolves.
    /// A refreshed route only has its metric recomputed.
    pub fn update(
        &mut self,
        routes: &impl GatewayRoutes<T>,
        prefix: Prefix,
        gateway: Option<T::Gateway>,
        nexthop: T::Neighbour,
        cost: u16,
        now: u64,
    ) -> Result<&ExternalRoute<T>, RedistributionError<T>> {
        if T::is_martian(&prefix) {
            let err = RedistributionError::MartianPrefix { prefix };
            warn!("{err}");
            return Err(err);
        }
        let Some(gateway) = gateway else {
            let err = RedistributionError::UnknownGateway { prefix };
            warn!("{err}");
            return Err(err);
        };

        if let Some(i) = self
            .xroutes
            .iter()
            .position(|x| x.prefix == prefix && x.is_through(&gateway, &nexthop))
        {
            self.update_metric_at(routes, i, cost);
            self.xroutes[i].last_update = now;
            return Ok(&self.xroutes[i]);
        }

        if self.xroutes.len() >= self.params.max_xroutes {
            let err = RedistributionError::TableFull {
                table: "xroute",
                capacity: self.params.max_xroutes,
            };
            warn!("{err}");
            return Err(err);
        }

        let gwroute = routes.find_installed(&gateway);
        let metric = gwroute.as_ref().map_or(INF, |gw| add_metric(gw.metric, cost));
        self.xroutes.push(ExternalRoute {
            prefix,
            gateway,
            nexthop,
            cost,
            metric,
            last_update: now,
            installed: false,
        });
        let i = self.xroutes.len() - 1;
        if gwroute.is_some() {
            self.consider_at(routes, i);
        }
        Ok(&self.xroutes[i])
    }

    /// Sets the cost of a route and recomputes its metric against the current gateway route
    pub fn update_metric(
        &mut self,
        routes: &impl GatewayRoutes<T>,
        key: &XrouteKey<T>,
        cost: u16,
    ) -> Result<(), RedistributionError<T>> {
        let i = self.locate(key)?;
        self.update_metric_at(routes, i, cost);
        Ok(())
    }

    /// Forces every finite route through (gateway, nexthop) to INF, except for the prefixes in `except`
    pub fn retract(
        &mut self,
        routes: &impl GatewayRoutes<T>,
        gateway: &T::Gateway,
        nexthop: &T::Neighbour,
        except: &[Prefix],
    ) {
        for i in 0..self.xroutes.len() {
            let xroute = &self.xroutes[i];
            if xroute.cost < INF && xroute.is_through(gateway, nexthop) && !except.contains(&xroute.prefix) {
                self.update_metric_at(routes, i, INF);
            }
        }
    }

    fn update_metric_at(&mut self, routes: &impl GatewayRoutes<T>, i: usize, cost: u16) {
        let gwroute = routes.find_installed(&self.xroutes[i].gateway);
        let old_metric = self.xroutes[i].metric;
        let new_metric = gwroute.as_ref().map_or(INF, |gw| add_metric(gw.metric, cost));

        if self.xroutes[i].cost == cost && old_metric == new_metric {
            return;
        }
        self.xroutes[i].cost = cost;
        let prefix = self.xroutes[i].prefix;

        if self.xroutes[i].installed {
            let Some(gwroute) = gwroute else {
                self.report_blackhole(i, BlackholeContext::Installed);
                return;
            };
            let new_kernel_metric = self.kernel.kernel_metric(new_metric);
            let entry = self.kernel_entry(prefix, gwroute, old_metric);
            let operation = KernelOperation::Modify {
                new_metric: new_kernel_metric,
            };
            if let Err(reason) = self.kernel.apply(operation, &entry) {
                self.report(RedistributionWarning::KernelOperationFailed {
                    operation,
                    prefix,
                    reason,
                });
                return;
            }
        }
        self.xroutes[i].metric = new_metric;

        if new_metric > old_metric {
            // a degraded route may have to yield to a competitor
            if let Some(best) = self.best_candidate(routes, &prefix) {
                self.consider_at(routes, best);
            }
        }
    }
    // endregion

    // region Route Selection

    /// Installs the route if it beats the installed one for its prefix by more than the hysteresis margin
    pub fn consider(&mut self, routes: &impl GatewayRoutes<T>, key: &XrouteKey<T>) -> Result<(), RedistributionError<T>> {
        let i = self.locate(key)?;
        self.consider_at(routes, i);
        Ok(())
    }

    /// Reconsiders every route riding on `changed`, after the daemon selected a new route to its gateway
    pub fn consider_all(&mut self, routes: &impl GatewayRoutes<T>, changed: &GatewayRoute<T>) {
        for i in 0..self.xroutes.len() {
            if self.xroutes[i].is_through(&changed.dest, &changed.nexthop) {
                self.consider_at(routes, i);
            }
        }
    }

    fn consider_at(&mut self, routes: &impl GatewayRoutes<T>, i: usize) {
        if self.xroutes[i].installed {
            return;
        }
        match routes.find_installed(&self.xroutes[i].gateway) {
            Some(gw) if gw.nexthop == self.xroutes[i].nexthop => {}
            // stale, the next consider_all will pick it up
            _ => return,
        }

        let cost = self.xroutes[i].cost;
        self.update_metric_at(routes, i, cost);

        let xroute = &self.xroutes[i];
        if self.installed_export(&xroute.prefix).is_some() {
            debug!("Not installing {}, it is exported locally.", xroute.prefix);
            return;
        }
        let replace = match self.installed_xroute(&xroute.prefix) {
            None => true,
            Some(j) => {
                u32::from(self.xroutes[j].metric)
                    > u32::from(xroute.metric) + u32::from(self.params.hysteresis)
            }
        };
        if replace {
            self.install_at(routes, i);
        }
    }
    // endregion

    // region Kernel

    pub fn install(&mut self, routes: &impl GatewayRoutes<T>, key: &XrouteKey<T>) -> Result<(), RedistributionError<T>> {
        let i = self.locate(key)?;
        self.install_at(routes, i);
        Ok(())
    }

    pub fn uninstall(&mut self, routes: &impl GatewayRoutes<T>, key: &XrouteKey<T>) -> Result<(), RedistributionError<T>> {
        let i = self.locate(key)?;
        self.uninstall_at(routes, i);
        Ok(())
    }

    fn install_at(&mut self, routes: &impl GatewayRoutes<T>, i: usize) {
        let xroute = &self.xroutes[i];
        if xroute.installed {
            return;
        }
        if xroute.is_degraded() {
            debug!("Not installing unreachable route for {}.", xroute.prefix);
            return;
        }
        let prefix = xroute.prefix;
        let metric = xroute.metric;

        let gwroute = match routes.find_installed(&xroute.gateway) {
            Some(gw) if gw.nexthop == xroute.nexthop => gw,
            _ => {
                self.report_blackhole(i, BlackholeContext::Install);
                return;
            }
        };

        if let Some(j) = self.installed_xroute(&prefix) {
            if !self.uninstall_at(routes, j) {
                debug!("Keeping the installed route for {prefix}, it could not be removed.");
                return;
            }
        }

        let entry = self.kernel_entry(prefix, gwroute, metric);
        match self.kernel.apply(KernelOperation::Add, &entry) {
            Ok(()) => {}
            Err(KernelError::AlreadyExists) => debug!("Route for {prefix} is already in the kernel."),
            Err(reason) => {
                self.report(RedistributionWarning::KernelOperationFailed {
                    operation: KernelOperation::Add,
                    prefix,
                    reason,
                });
                return;
            }
        }
        self.xroutes[i].installed = true;
    }

    /// Returns whether the route is no longer installed
    fn uninstall_at(&mut self, routes: &impl GatewayRoutes<T>, i: usize) -> bool {
        let xroute = &self.xroutes[i];
        if !xroute.installed {
            return true;
        }
        let prefix = xroute.prefix;
        let metric = xroute.metric;

        let Some(gwroute) = routes.find_installed(&xroute.gateway) else {
            self.report_blackhole(i, BlackholeContext::Uninstall);
            return false;
        };

        let entry = self.kernel_entry(prefix, gwroute, metric);
        match self.kernel.apply(KernelOperation::Flush, &entry) {
            Ok(()) => {}
            Err(KernelError::NotFound) => debug!("Route for {prefix} was already gone from the kernel."),
            Err(reason) => {
                self.report(RedistributionWarning::KernelOperationFailed {
                    operation: KernelOperation::Flush,
                    prefix,
                    reason,
                });
                return false;
            }
        }
        self.xroutes[i].installed = false;
        true
    }

    fn kernel_entry(&self, prefix: Prefix, gwroute: GatewayRoute<T>, metric: u16) -> KernelRoute<T> {
        KernelRoute {
            prefix,
            nexthop: gwroute.nexthop_address,
            interface: gwroute.interface,
            metric: self.kernel.kernel_metric(metric),
        }
    }
    // endregion

    // region Removal

    /// Removes a route. If it was installed, the best remaining candidate for its prefix takes its place.
    pub fn flush(&mut self, routes: &impl GatewayRoutes<T>, key: &XrouteKey<T>) -> Result<(), RedistributionError<T>> {
        let i = self.locate(key)?;
        self.flush_at(routes, i);
        Ok(())
    }

    pub fn flush_for_neighbour(&mut self, routes: &impl GatewayRoutes<T>, neighbour: &T::Neighbour) {
        let mut i = 0;
        while i < self.xroutes.len() {
            if self.xroutes[i].nexthop == *neighbour {
                self.flush_at(routes, i);
                continue;
            }
            i += 1;
        }
    }

    /// Retracts routes not re-advertised within `hold_delay`, and drops those older than `gc_delay`
    pub fn expire(&mut self, routes: &impl GatewayRoutes<T>, now: u64) {
        let mut i = 0;
        while i < self.xroutes.len() {
            let age = now.saturating_sub(self.xroutes[i].last_update);
            if age > self.params.gc_delay {
                debug!("Dropping stale route for {}.", self.xroutes[i].prefix);
                self.flush_at(routes, i);
                continue;
            }
            if age > self.params.hold_delay && self.xroutes[i].cost < INF {
                self.update_metric_at(routes, i, INF);
            }
            i += 1;
        }
    }

    fn flush_at(&mut self, routes: &impl GatewayRoutes<T>, i: usize) {
        let freed = if self.xroutes[i].installed {
            self.uninstall_at(routes, i);
            Some(self.xroutes[i].prefix)
        } else {
            None
        };

        self.xroutes.swap_remove(i);

        if let Some(prefix) = freed {
            if let Some(best) = self.best_candidate(routes, &prefix) {
                self.install_at(routes, best);
            }
        }
    }
    // endregion

    fn report_blackhole(&mut self, i: usize, context: BlackholeContext) {
        let warning = RedistributionWarning::Blackhole {
            prefix: self.xroutes[i].prefix,
            gateway: self.xroutes[i].gateway.clone(),
            context,
        };
        self.report(warning);
    }

    pub(crate) fn report(&mut self, warning: RedistributionWarning<T>) {
        match &warning {
            RedistributionWarning::Blackhole { .. } => error!("{warning}"),
            RedistributionWarning::KernelOperationFailed { .. } => warn!("{warning}"),
        }
        self.warnings.push(warning);
    }
}
