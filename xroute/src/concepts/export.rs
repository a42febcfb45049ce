use crate::concepts::prefix::Prefix;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Kernel presence of a locally exported route
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ExportState {
    /// not found in the last kernel snapshot
    Absent,
    /// found in the last kernel snapshot
    Present,
    /// asserted by other means, never reconciled
    Fixed,
}

impl ExportState {
    pub fn is_installed(self) -> bool {
        matches!(self, ExportState::Present | ExportState::Fixed)
    }

    pub fn is_fixed(self) -> bool {
        self == ExportState::Fixed
    }
}

/// A route originated by this daemon
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LocalExport {
    pub prefix: Prefix,
    pub cost: u16,
    pub state: ExportState,
}
