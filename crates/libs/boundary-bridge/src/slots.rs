//! Fixed-capacity connection table.
//!
//! One contiguous array of slots, sized once per session. No growth, no
//! allocation churn while serving. A slot owns at most one live connection
//! together with its deframe state and activity clock; the index is stable
//! from admission to release.

use std::io::{ErrorKind, Read};
use std::net::TcpStream;
use std::time::{Duration, Instant};

use socket2::SockRef;

use crate::hdlc::{Deframed, Deframer};

/// Result of draining a slot's receive stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotHealth {
    Alive,
    /// Peer closed the connection or the read failed hard.
    Disconnected,
}

pub struct ClientSlot {
    stream: Option<TcpStream>,
    deframer: Deframer,
    last_activity: Option<Instant>,
}

impl ClientSlot {
    fn new(mtu: usize) -> Self {
        Self { stream: None, deframer: Deframer::new(mtu), last_activity: None }
    }

    /// Read every currently available byte through the deframer, pushing
    /// completed decode events into `events`. Never blocks.
    pub fn drain(&mut self, now: Instant, events: &mut Vec<Deframed>) -> SlotHealth {
        let Some(stream) = self.stream.as_mut() else {
            return SlotHealth::Alive;
        };

        let mut chunk = [0u8; 1024];
        loop {
            match stream.read(&mut chunk) {
                Ok(0) => return SlotHealth::Disconnected,
                Ok(n) => {
                    self.last_activity = Some(now);
                    for &byte in &chunk[..n] {
                        if let Some(event) = self.deframer.push(byte) {
                            events.push(event);
                        }
                    }
                }
                Err(err) if err.kind() == ErrorKind::WouldBlock => return SlotHealth::Alive,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(_) => return SlotHealth::Disconnected,
            }
        }
    }
}

pub struct SlotTable {
    slots: Vec<ClientSlot>,
}

impl SlotTable {
    pub fn new(capacity: usize, mtu: usize) -> Self {
        Self { slots: (0..capacity).map(|_| ClientSlot::new(mtu)).collect() }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn active_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.stream.is_some()).count()
    }

    pub fn is_active(&self, idx: usize) -> bool {
        self.slots.get(idx).is_some_and(|slot| slot.stream.is_some())
    }

    pub fn last_activity(&self, idx: usize) -> Option<Instant> {
        self.slots.get(idx).and_then(|slot| slot.last_activity)
    }

    /// Admit an accepted connection into the first free slot.
    ///
    /// When every slot is occupied the stream is handed back so the caller
    /// can reject it; existing clients are never evicted.
    pub fn try_admit(&mut self, stream: TcpStream, now: Instant) -> Result<usize, TcpStream> {
        let Some(idx) = self.slots.iter().position(|slot| slot.stream.is_none()) else {
            return Err(stream);
        };
        // Defensive: make sure nothing stale occupies the slot we scanned.
        self.release(idx, "stale");
        self.install(idx, stream, now);
        Ok(idx)
    }

    /// Install an outbound connection in slot 0. Client mode keeps at most
    /// one connection, so the index is fixed.
    pub fn assign_single(&mut self, stream: TcpStream, now: Instant) {
        self.release(0, "replaced");
        self.install(0, stream, now);
    }

    fn install(&mut self, idx: usize, stream: TcpStream, now: Instant) {
        if let Err(err) = stream.set_nodelay(true) {
            log::debug!("tcp_bridge: set_nodelay on client {} failed: {}", idx, err);
        }
        if let Err(err) = stream.set_nonblocking(true) {
            log::warn!("tcp_bridge: set_nonblocking on client {} failed: {}", idx, err);
        }

        let slot = &mut self.slots[idx];
        slot.deframer.reset();
        slot.last_activity = Some(now);
        slot.stream = Some(stream);
    }

    /// Forced abortive teardown of the slot's connection. No-op on an idle
    /// slot.
    pub fn release(&mut self, idx: usize, reason: &str) {
        let Some(slot) = self.slots.get_mut(idx) else {
            return;
        };
        if let Some(stream) = slot.stream.take() {
            abort_close(&stream);
            log::debug!("tcp_bridge: client {} released ({})", idx, reason);
        }
        slot.deframer.reset();
        slot.last_activity = None;
    }

    pub fn release_all(&mut self, reason: &str) {
        for idx in 0..self.slots.len() {
            self.release(idx, reason);
        }
    }

    pub fn stream_mut(&mut self, idx: usize) -> Option<&mut TcpStream> {
        self.slots.get_mut(idx).and_then(|slot| slot.stream.as_mut())
    }

    pub fn slot_mut(&mut self, idx: usize) -> Option<&mut ClientSlot> {
        self.slots.get_mut(idx)
    }
}

/// Request immediate resource release instead of a graceful close. A
/// lingering half-closed connection holds a slot's worth of kernel state;
/// on the small hosts this bridge targets those accumulate fast.
pub(crate) fn abort_close(stream: &TcpStream) {
    if let Err(err) = SockRef::from(stream).set_linger(Some(Duration::ZERO)) {
        log::debug!("tcp_bridge: set_linger failed: {}", err);
    }
}
