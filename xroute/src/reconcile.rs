use crate::concepts::export::{ExportState, LocalExport};
use crate::concepts::prefix::Prefix;
use crate::feedback::RedistributionError;
use crate::framework::{KernelRoutes, RedistributionSystem};
use crate::redistributor::Redistributor;
use log::{debug, warn};

impl<T: RedistributionSystem> Redistributor<T> {
    /// Registers a locally originated route.
    ///
    /// A `fixed` export is asserted by means outside of the redistributor and is never reconciled,
    /// otherwise the export starts out absent until [`Redistributor::check_exports`] finds it in the kernel.
    pub fn add_export(&mut self, prefix: Prefix, cost: u16, fixed: bool) -> Result<&LocalExport, RedistributionError<T>> {
        if T::is_martian(&prefix) {
            let err = RedistributionError::MartianPrefix { prefix };
            warn!("{err}");
            return Err(err);
        }

        if let Some(i) = self.exports.iter().position(|e| e.prefix == prefix) {
            let export = &mut self.exports[i];
            export.cost = cost;
            if fixed {
                export.state = ExportState::Fixed;
            } else if export.state.is_fixed() {
                export.state = ExportState::Absent;
            }
            return Ok(&self.exports[i]);
        }

        if self.exports.len() >= self.params.max_exports {
            let err = RedistributionError::TableFull {
                table: "export",
                capacity: self.params.max_exports,
            };
            warn!("{err}");
            return Err(err);
        }

        self.exports.push(LocalExport {
            prefix,
            cost,
            state: if fixed { ExportState::Fixed } else { ExportState::Absent },
        });
        Ok(&self.exports[self.exports.len() - 1])
    }

    /// Returns whether an export for `prefix` existed
    pub fn remove_export(&mut self, prefix: &Prefix) -> bool {
        match self.exports.iter().position(|e| e.prefix == *prefix) {
            Some(i) => {
                self.exports.swap_remove(i);
                true
            }
            None => false,
        }
    }

    /// Re-reads the kernel table and marks every non-fixed export present or absent.
    ///
    /// Returns whether any export changed state.
    pub fn check_exports(&mut self) -> Result<bool, RedistributionError<T>> {
        debug!("Checking kernel routes.");

        let Some(max_plen) = self
            .exports
            .iter()
            .filter(|e| !e.state.is_fixed())
            .map(|e| e.prefix.plen())
            .max()
        else {
            return Ok(false);
        };

        let capacity = self.params.snapshot_capacity;
        let mut snapshot = self
            .kernel
            .snapshot(max_plen, capacity)
            .map_err(|source| {
                let err = RedistributionError::KernelQueryFailed { source };
                warn!("{err}");
                err
            })?;
        snapshot.truncate(capacity);

        let mut changed = false;
        for export in self.exports.iter_mut().filter(|e| !e.state.is_fixed()) {
            let state = if snapshot.contains(&export.prefix) {
                ExportState::Present
            } else {
                ExportState::Absent
            };
            if export.state != state {
                debug!("Export {} is now {:?}.", export.prefix, state);
                export.state = state;
                changed = true;
            }
        }
        Ok(changed)
    }
}
