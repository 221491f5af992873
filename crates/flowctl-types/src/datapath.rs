//! Datapath identifier with safe parsing and formatting.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A 64-bit OpenFlow datapath identifier.
///
/// The identifier is reported by the switch in its FEATURES_REPLY and is
/// stable for the lifetime of the connection.
///
/// # Examples
///
/// ```
/// use flowctl_types::DatapathId;
///
/// let dpid: DatapathId = "1".parse().unwrap();
/// assert_eq!(dpid.to_string(), "0000000000000001");
///
/// // Hex with a 0x prefix is accepted as well
/// let dpid2: DatapathId = "0x1".parse().unwrap();
/// assert_eq!(dpid, dpid2);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DatapathId(u64);

impl DatapathId {
    /// Creates a datapath id from its raw value.
    pub const fn new(id: u64) -> Self {
        DatapathId(id)
    }

    /// Returns the raw 64-bit value.
    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for DatapathId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

impl FromStr for DatapathId {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let parsed = match trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
        {
            Some(hex) => u64::from_str_radix(hex, 16),
            None => trimmed.parse::<u64>(),
        };

        parsed
            .map(DatapathId)
            .map_err(|_| ParseError::InvalidDatapathId(s.to_string()))
    }
}

impl From<u64> for DatapathId {
    fn from(id: u64) -> Self {
        DatapathId(id)
    }
}

impl From<DatapathId> for u64 {
    fn from(dpid: DatapathId) -> u64 {
        dpid.0
    }
}
