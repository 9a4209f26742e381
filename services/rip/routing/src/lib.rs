//! Distance-vector routing table, poison reverse, and packet dispatch.
//!
//! This crate is the per-node control plane of the RIP router: the
//! [`RoutingTable`] learns reachability from neighbor advertisements and
//! decides what to re-advertise, and the [`Router`] turns inbound messages
//! into table operations and outbound transmissions.
//!
//! Nothing here blocks or owns a runtime. Every operation is a synchronous
//! state mutation followed by zero or more calls into a [`Transport`].

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod advertisement;
pub mod config;
pub mod error;
pub mod router;
pub mod table;

pub use advertisement::*;
pub use config::*;
pub use error::*;
pub use router::*;
pub use table::*;
