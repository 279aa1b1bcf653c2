//! Cross-interface forwarding.
//!
//! The boundary node carries two interfaces and moves every decoded frame
//! from one to the other. This is the minimal routing collaborator the
//! bridge needs; path tables and announce handling belong to the full
//! mesh transport, not here.

use boundary_bridge::{MeshTransport, Outbound, TcpInterface};

/// Frames moved across the boundary, per direction.
#[derive(Debug, Default, Clone, Copy)]
pub struct BridgedCounters {
    pub backbone_to_local: u64,
    pub local_to_backbone: u64,
}

/// Routing collaborator for one side of the boundary node.
///
/// With `repeat` set, a decoded frame is re-broadcast to this side's other
/// connections (the local listener behaves like a shared segment; echo
/// suppression keeps it off the originating link). When a peer interface
/// is present the frame also crosses the boundary.
pub struct CrossLink<'a> {
    pub peer: Option<&'a mut TcpInterface>,
    pub bridged: &'a mut u64,
    pub repeat: bool,
}

impl MeshTransport for CrossLink<'_> {
    fn handle_incoming(&mut self, payload: &[u8], mut outbound: Outbound<'_>) {
        if self.repeat {
            outbound.send(payload);
        }
        if let Some(peer) = self.peer.as_deref_mut() {
            if peer.is_connected() {
                peer.send_outgoing(payload);
                *self.bridged += 1;
            }
        }
    }
}
