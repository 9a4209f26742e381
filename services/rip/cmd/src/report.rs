//! What the binary prints once a scenario has run.

use rip_routing::{RouteEntry, RouterState};
use rip_topology::{Network, NetworkError, NodeSnapshot, Topology};
use rip_wire::NodeId;
use serde::Serialize;
use std::fmt;

/// One router's table at the end of a phase
#[derive(Debug, Clone, Serialize)]
pub struct TableReport {
    pub node: NodeId,
    pub state: Option<RouterState>,
    pub routes: Vec<RouteEntry>,
    pub advertisements_sent: u64,
}

impl From<NodeSnapshot> for TableReport {
    fn from(snapshot: NodeSnapshot) -> Self {
        Self {
            node: snapshot.node,
            state: snapshot.state,
            advertisements_sent: snapshot.stats.map(|s| s.advertisements_sent).unwrap_or(0),
            routes: snapshot.routes,
        }
    }
}

/// Routing state after the network settled
#[derive(Debug, Clone, Serialize)]
pub struct PhaseReport {
    pub name: String,
    pub tables: Vec<TableReport>,
    pub mismatches: Vec<String>,
}

impl PhaseReport {
    /// Snapshot every router and check it against `topology`
    pub async fn collect(
        name: impl Into<String>,
        network: &Network,
        topology: &Topology,
    ) -> Result<Self, NetworkError> {
        let tables = network
            .snapshots()
            .await?
            .into_iter()
            .filter(|s| !s.kind.is_host())
            .map(TableReport::from)
            .collect();
        let mismatches = network
            .check_against(topology)
            .await?
            .iter()
            .map(|m| m.to_string())
            .collect();
        Ok(Self {
            name: name.into(),
            tables,
            mismatches,
        })
    }
}

/// A data packet sent between two hosts
#[derive(Debug, Clone, Serialize)]
pub struct DeliveryReport {
    pub src: NodeId,
    pub dst: NodeId,
    pub delivered: bool,
}

/// Everything printed at the end of a run
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub scenario: String,
    pub phases: Vec<PhaseReport>,
    pub deliveries: Vec<DeliveryReport>,
    pub total_advertisements: u64,
    pub frames_sent: u64,
}

impl Report {
    /// Number of routes that disagree with the shortest paths, over all phases
    pub fn mismatch_count(&self) -> usize {
        self.phases.iter().map(|p| p.mismatches.len()).sum()
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "scenario: {}", self.scenario)?;

        for phase in &self.phases {
            writeln!(f, "\n== {} ==", phase.name)?;
            for table in &phase.tables {
                let state = table
                    .state
                    .map(|s| format!("{:?}", s))
                    .unwrap_or_else(|| "-".to_string());
                writeln!(
                    f,
                    "{} ({}, {} advertisements)",
                    table.node, state, table.advertisements_sent
                )?;
                for route in &table.routes {
                    writeln!(
                        f,
                        "  {:<8} cost {:<3} via {}",
                        route.destination.as_str(),
                        route.cost,
                        route.next_hop
                    )?;
                }
            }
            if phase.mismatches.is_empty() {
                writeln!(f, "all routes match shortest paths")?;
            } else {
                for mismatch in &phase.mismatches {
                    writeln!(f, "MISMATCH {}", mismatch)?;
                }
            }
        }

        if !self.deliveries.is_empty() {
            writeln!(f)?;
            for d in &self.deliveries {
                let outcome = if d.delivered { "delivered" } else { "lost" };
                writeln!(f, "data {} -> {}: {}", d.src, d.dst, outcome)?;
            }
        }

        writeln!(f, "\ntotal advertisements: {}", self.total_advertisements)?;
        writeln!(f, "frames sent: {}", self.frames_sent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Report {
        Report {
            scenario: "linear".to_string(),
            phases: vec![PhaseReport {
                name: "converged".to_string(),
                tables: vec![TableReport {
                    node: "s1".into(),
                    state: Some(RouterState::Converged),
                    routes: vec![RouteEntry {
                        destination: "s2".into(),
                        cost: 1,
                        next_hop: "s2".into(),
                    }],
                    advertisements_sent: 3,
                }],
                mismatches: vec![],
            }],
            deliveries: vec![DeliveryReport {
                src: "h1".into(),
                dst: "h2".into(),
                delivered: true,
            }],
            total_advertisements: 7,
            frames_sent: 12,
        }
    }

    #[test]
    fn test_text_report() {
        let text = sample().to_string();
        assert!(text.contains("== converged =="));
        assert!(text.contains("s1 (Converged, 3 advertisements)"));
        assert!(text.contains("  s2       cost 1   via s2"));
        assert!(text.contains("all routes match shortest paths"));
        assert!(text.contains("data h1 -> h2: delivered"));
        assert!(text.contains("total advertisements: 7"));
        assert!(text.ends_with("frames sent: 12\n"));
    }

    #[test]
    fn test_text_report_lists_mismatches() {
        let mut report = sample();
        report.deliveries.clear();
        report.phases[0].mismatches.push("s1 -> s9: expected 2, got unreachable".to_string());

        let text = report.to_string();
        assert!(text.contains("MISMATCH s1 -> s9: expected 2, got unreachable"));
        assert!(!text.contains("all routes match shortest paths"));
        assert!(!text.contains("data "));
    }

    #[test]
    fn test_json_report() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["total_advertisements"], 7);
        assert_eq!(json["phases"][0]["tables"][0]["routes"][0]["next_hop"], "s2");
    }

    #[test]
    fn test_mismatch_count() {
        let mut report = sample();
        assert_eq!(report.mismatch_count(), 0);
        report.phases[0].mismatches.push("s1 -> s9: expected 2, got unreachable".to_string());
        assert_eq!(report.mismatch_count(), 1);
    }
}
