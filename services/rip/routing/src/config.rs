//! Routing table tunables

use crate::error::RouteError;
use rip_wire::Cost;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Costs at or above this are unreachable (RIP uses 16)
pub const DEFAULT_MAX_HOP_COUNT: Cost = 16;

/// Cost of one direct link
pub const DEFAULT_LINK_COST: Cost = 1;

/// What a node does with learned routes when a router link goes down
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkDownPolicy {
    /// Recompute from the remaining neighbor vectors
    #[default]
    Incremental,
    /// Forget everything learned and keep only direct links
    FullReset,
}

/// How an advertised cost is combined with the cost of reaching its sender
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricMode {
    /// Add this node's current best cost to the sender
    #[default]
    Weighted,
    /// Add the fixed link cost (pure hop-count RIP)
    HopCount,
}

impl FromStr for LinkDownPolicy {
    type Err = RouteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "incremental" => Ok(LinkDownPolicy::Incremental),
            "full_reset" | "full-reset" => Ok(LinkDownPolicy::FullReset),
            other => Err(RouteError::InvalidConfig(format!(
                "unknown link-down policy '{}'",
                other
            ))),
        }
    }
}

impl FromStr for MetricMode {
    type Err = RouteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "weighted" => Ok(MetricMode::Weighted),
            "hop_count" | "hop-count" => Ok(MetricMode::HopCount),
            other => Err(RouteError::InvalidConfig(format!(
                "unknown metric mode '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for LinkDownPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkDownPolicy::Incremental => write!(f, "incremental"),
            LinkDownPolicy::FullReset => write!(f, "full_reset"),
        }
    }
}

impl fmt::Display for MetricMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricMode::Weighted => write!(f, "weighted"),
            MetricMode::HopCount => write!(f, "hop_count"),
        }
    }
}

/// Routing table configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableConfig {
    /// Costs at or above this value mean "unreachable"
    pub max_hop_count: Cost,
    /// Cost of every direct link
    pub link_cost: Cost,
    /// Handling of learned routes on router link loss
    pub link_down_policy: LinkDownPolicy,
    /// Cost combination rule for received vectors
    pub metric: MetricMode,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            max_hop_count: DEFAULT_MAX_HOP_COUNT,
            link_cost: DEFAULT_LINK_COST,
            link_down_policy: LinkDownPolicy::default(),
            metric: MetricMode::default(),
        }
    }
}

impl TableConfig {
    /// The cost this node advertises for a poisoned or unreachable route
    pub fn infinity(&self) -> Cost {
        self.max_hop_count
    }

    /// Check if a cost counts as unreachable
    pub fn is_unreachable(&self, cost: Cost) -> bool {
        cost >= self.max_hop_count
    }

    /// Reject configurations where a direct link would already be unreachable
    pub fn validate(&self) -> Result<(), RouteError> {
        if self.link_cost == 0 {
            return Err(RouteError::InvalidConfig(
                "link_cost must be at least 1".to_string(),
            ));
        }
        if self.is_unreachable(self.link_cost) {
            return Err(RouteError::InvalidConfig(format!(
                "link_cost {} must be below max_hop_count {}",
                self.link_cost, self.max_hop_count
            )));
        }
        Ok(())
    }
}
