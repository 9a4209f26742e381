//! Node identities, distance-vector messages, and frame codec for the RIP router.
//!
//! This crate provides the logical wire protocol shared by every node of the
//! simulated network: the identities routers and hosts are known by, the
//! message kinds they exchange, and the CBOR encoding used while a message is
//! in transit on a link.
//!
//! ## Wire Format
//!
//! ```text
//! +----------------------+----------------------------+
//! | u8 version           | WIRE_VERSION               |
//! +----------------------+----------------------------+
//! | cbor body            | Message, tagged by "kind"  |
//! +----------------------+----------------------------+
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod codec;
pub mod error;
pub mod message;
pub mod node;

pub use codec::{decode, encode, MAX_FRAME_SIZE, WIRE_VERSION};
pub use error::WireError;
pub use message::{DataPacket, DistanceVector, LinkEvent, Message, DEFAULT_DATA_TTL};
pub use node::{Cost, NodeId, NodeKind, PortId};
