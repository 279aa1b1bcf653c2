//! boundary-bridge: tunnels mesh packets between a packet-radio node and an
//! IP backbone over TCP, using byte-stuffed framing.
//!
//! The crate is built around one orchestrator, [`iface::TcpInterface`],
//! composed from three leaves: the [`hdlc`] frame codec, the fixed-capacity
//! [`slots::SlotTable`], and the [`reconnect::Backoff`] controller. The
//! routing layer above is abstracted as [`iface::MeshTransport`].
//!
//! The interface is tick-driven: the host owns the execution context and
//! calls [`iface::TcpInterface::tick`] frequently from a single logical
//! thread. Reliability of the tunnel itself is delegated to TCP; frames are
//! carried transparently, unencrypted, one independent byte stream per
//! connection.

pub mod config;
pub mod error;
pub mod hdlc;
pub mod iface;
pub mod reconnect;
pub mod slots;

pub use config::{BridgeConfig, IfaceMode};
pub use error::BridgeError;
pub use iface::{IfaceStats, MeshTransport, Outbound, TcpInterface};
