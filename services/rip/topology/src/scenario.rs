//! Canned topologies used by the CLI and the integration tests.

use crate::error::NetworkError;
use crate::graph::Topology;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Named topology generators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scenario {
    /// Routers `s1..sn` in a chain
    Linear,
    /// Three fully meshed routers, one host each
    Triangle,
    /// Ring of routers with one host each, plus a hub linked to every ring router
    Octagon,
}

impl Scenario {
    /// Default size for the scenario
    pub fn default_size(&self) -> usize {
        match self {
            Scenario::Linear => 4,
            Scenario::Triangle => 3,
            Scenario::Octagon => 8,
        }
    }

    /// Build the topology. `size` is ignored by [`Scenario::Triangle`].
    pub fn build(&self, size: usize) -> Result<Topology, NetworkError> {
        match self {
            Scenario::Linear => linear(size),
            Scenario::Triangle => triangle(),
            Scenario::Octagon => octagon(size),
        }
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scenario::Linear => write!(f, "linear"),
            Scenario::Triangle => write!(f, "triangle"),
            Scenario::Octagon => write!(f, "octagon"),
        }
    }
}

impl FromStr for Scenario {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "linear" => Ok(Scenario::Linear),
            "triangle" => Ok(Scenario::Triangle),
            "octagon" => Ok(Scenario::Octagon),
            other => Err(format!("unknown scenario '{}'", other)),
        }
    }
}

fn switch(i: usize) -> String {
    format!("s{}", i)
}

fn host(i: usize) -> String {
    format!("h{}", i)
}

/// `s1 - s2 - ... - sn`
pub fn linear(n: usize) -> Result<Topology, NetworkError> {
    let mut topo = Topology::new();
    for i in 1..=n {
        topo.add_router(switch(i))?;
    }
    for i in 1..n {
        topo.add_link(switch(i), switch(i + 1))?;
    }
    Ok(topo)
}

/// Fully meshed `s1, s2, s3` with host `hi` on `si`
pub fn triangle() -> Result<Topology, NetworkError> {
    let mut topo = Topology::new();
    for i in 1..=3 {
        topo.add_router(switch(i))?;
        topo.add_host(host(i))?;
        topo.add_link(host(i), switch(i))?;
    }
    topo.add_link(switch(1), switch(2))?;
    topo.add_link(switch(2), switch(3))?;
    topo.add_link(switch(1), switch(3))?;
    Ok(topo)
}

/// Ring `s1..sn` with host `hi` on `si`, and hub `s(n+1)` linked to every ring router
pub fn octagon(n: usize) -> Result<Topology, NetworkError> {
    let mut topo = Topology::new();
    for i in 1..=n {
        topo.add_router(switch(i))?;
        topo.add_host(host(i))?;
        topo.add_link(host(i), switch(i))?;
    }
    for i in 1..=n {
        let next = i % n + 1;
        if next != i && !topo.is_linked(&switch(i).into(), &switch(next).into()) {
            topo.add_link(switch(i), switch(next))?;
        }
    }
    let hub = switch(n + 1);
    topo.add_router(hub.clone())?;
    for i in 1..=n {
        topo.add_link(hub.clone(), switch(i))?;
    }
    Ok(topo)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rip_routing::TableConfig;
    use rip_wire::NodeId;

    #[test]
    fn test_parse_scenario() {
        assert_eq!("Octagon".parse::<Scenario>(), Ok(Scenario::Octagon));
        assert_eq!(Scenario::Linear.to_string(), "linear");
        assert!("star".parse::<Scenario>().is_err());
    }

    #[test]
    fn test_linear() {
        let topo = linear(4).unwrap();
        assert_eq!(topo.len(), 4);
        assert_eq!(topo.links().len(), 3);
        let dist = topo.shortest_paths(&NodeId::from("s1"), &TableConfig::default());
        assert_eq!(dist.get(&NodeId::from("s4")), Some(&3));
    }

    #[test]
    fn test_triangle() {
        let topo = triangle().unwrap();
        assert_eq!(topo.routers().count(), 3);
        assert_eq!(topo.hosts().count(), 3);
        assert_eq!(topo.links().len(), 6);
    }

    #[test]
    fn test_octagon() {
        let topo = octagon(8).unwrap();
        assert_eq!(topo.routers().count(), 9);
        assert_eq!(topo.hosts().count(), 8);
        // 8 host links, 8 ring links, 8 hub links
        assert_eq!(topo.links().len(), 24);

        // Opposite sides of the ring are two hops apart through the hub
        let dist = topo.shortest_paths(&NodeId::from("s1"), &TableConfig::default());
        assert_eq!(dist.get(&NodeId::from("s5")), Some(&2));
        assert_eq!(dist.get(&NodeId::from("h5")), Some(&3));
    }

    #[test]
    fn test_small_octagon_has_no_duplicate_links() {
        let topo = octagon(2).unwrap();
        assert_eq!(topo.links().len(), 2 + 1 + 2);
    }
}
