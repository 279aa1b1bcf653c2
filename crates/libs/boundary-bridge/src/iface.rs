//! The TCP bridge interface.
//!
//! Ties the frame codec, the connection table, and the reconnect controller
//! together behind the two-method capability contract the mesh routing
//! layer sees: the router pushes payloads down with
//! [`TcpInterface::send_outgoing`], and the interface delivers each decoded
//! frame up through [`MeshTransport::handle_incoming`].
//!
//! Everything runs on one cooperative context: the host calls
//! [`TcpInterface::tick`] at a sub-second cadence and serializes it with
//! `send_outgoing`. The interface spawns no tasks and never blocks longer
//! than the configured connect timeout.

use std::io::{ErrorKind, Write};
use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::time::Instant;

use crate::config::{BridgeConfig, IfaceMode, ANNOUNCE_CAP, BITRATE_BPS};
use crate::error::BridgeError;
use crate::hdlc::{self, Deframed};
use crate::reconnect::Backoff;
use crate::slots::{abort_close, SlotHealth, SlotTable};

/// The routing layer above the bridge.
///
/// Called exactly once per decoded frame. The `outbound` handle is valid
/// only for the duration of the call; sending through it broadcasts to
/// every active connection except the one the frame arrived on, so a
/// single hop never bounces a packet straight back to its sender.
pub trait MeshTransport {
    fn handle_incoming(&mut self, payload: &[u8], outbound: Outbound<'_>);
}

/// Send capability handed to the router during one delivery.
///
/// Carries the originating slot index so echo suppression needs no shared
/// state between the inbound and outbound paths.
pub struct Outbound<'a> {
    slots: &'a mut SlotTable,
    stats: &'a mut IfaceStats,
    origin: Option<usize>,
}

impl Outbound<'_> {
    /// Frame `payload` once and write it to every active connection except
    /// the origin of the delivery in progress.
    pub fn send(&mut self, payload: &[u8]) {
        broadcast(self.slots, self.stats, payload, self.origin);
    }
}

/// Operational counters, readable at any time.
#[derive(Debug, Default, Clone, Copy)]
pub struct IfaceStats {
    pub rx_frames: u64,
    pub tx_frames: u64,
    /// Frames that outgrew the MTU before their closing flag and were
    /// discarded whole.
    pub oversize_dropped: u64,
}

pub struct TcpInterface {
    config: BridgeConfig,
    listener: Option<TcpListener>,
    slots: SlotTable,
    backoff: Backoff,
    resolved: Option<SocketAddr>,
    link_up: bool,
    started: bool,
    last_keepalive: Option<Instant>,
    stats: IfaceStats,
}

impl TcpInterface {
    pub fn new(config: BridgeConfig) -> Result<Self, BridgeError> {
        config.validate()?;

        // Client mode keeps at most one outbound connection; only server
        // mode carries the full table.
        let capacity = match config.mode {
            IfaceMode::Server => config.max_clients,
            IfaceMode::Client => 1,
        };

        Ok(Self {
            slots: SlotTable::new(capacity, config.mtu),
            backoff: Backoff::new(config.reconnect_min(), config.reconnect_max()),
            listener: None,
            resolved: None,
            link_up: true,
            started: false,
            last_keepalive: None,
            stats: IfaceStats::default(),
            config,
        })
    }

    /// Bring the interface up. Idempotent.
    ///
    /// Server mode binds its listener immediately; a bind failure is the
    /// only error this interface ever surfaces, and it is fatal to this
    /// call alone. Client mode marks the interface started and makes one
    /// immediate connection attempt.
    pub fn start(&mut self, now: Instant) -> Result<(), BridgeError> {
        if self.started {
            return Ok(());
        }

        match self.config.mode {
            IfaceMode::Server => {
                let port = self.config.listen_port;
                let listener = TcpListener::bind(("0.0.0.0", port))
                    .and_then(|listener| {
                        listener.set_nonblocking(true)?;
                        Ok(listener)
                    })
                    .map_err(|source| BridgeError::Bind { port, source })?;
                log::info!("tcp_bridge: listening on port {}", port);
                self.listener = Some(listener);
                self.started = true;
            }
            IfaceMode::Client => {
                self.started = true;
                self.attempt_connect(now);
            }
        }

        Ok(())
    }

    /// Tear the interface down. Idempotent; callable from any state.
    ///
    /// Every held connection is force-released and the listener dropped
    /// before this returns. The reconnect interval deliberately survives
    /// for the next `start()`.
    pub fn stop(&mut self) {
        self.slots.release_all("shutdown");
        self.listener = None;
        self.started = false;
        self.last_keepalive = None;
    }

    /// One maintenance pass. Non-blocking; call at a sub-second cadence.
    ///
    /// Fixed order: accept pending connections, client-mode reconnect,
    /// keepalive, then per-slot drain and delivery in index order. Later
    /// steps depend on slots the earlier steps may have just created.
    pub fn tick(&mut self, now: Instant, transport: &mut dyn MeshTransport) {
        if !self.started {
            return;
        }

        self.accept_pending(now);

        if self.config.mode == IfaceMode::Client
            && self.slots.active_count() == 0
            && self.backoff.should_attempt(now, self.link_up)
        {
            self.attempt_connect(now);
        }

        self.send_keepalives(now);
        self.service_slots(now, transport);
    }

    /// Broadcast a payload from the routing layer to every active
    /// connection. No-op while stopped or with no connections.
    pub fn send_outgoing(&mut self, payload: &[u8]) {
        if !self.started {
            return;
        }
        broadcast(&mut self.slots, &mut self.stats, payload, None);
    }

    /// Report whether the underlying network is usable at all. While down,
    /// client-mode reconnect attempts are skipped and do not count against
    /// the backoff.
    pub fn set_link_up(&mut self, up: bool) {
        self.link_up = up;
    }

    pub fn client_count(&self) -> usize {
        self.slots.active_count()
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn is_connected(&self) -> bool {
        self.slots.active_count() > 0
    }

    pub fn stats(&self) -> IfaceStats {
        self.stats
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Throughput hint read by the routing layer for path selection.
    pub fn bitrate(&self) -> u64 {
        BITRATE_BPS
    }

    /// Announce-rate cap read by the routing layer.
    pub fn announce_cap(&self) -> f32 {
        ANNOUNCE_CAP
    }

    fn accept_pending(&mut self, now: Instant) {
        let Some(listener) = self.listener.as_ref() else {
            return;
        };

        loop {
            match listener.accept() {
                Ok((stream, peer)) => match self.slots.try_admit(stream, now) {
                    Ok(idx) => {
                        log::info!("tcp_bridge: client {} connected from <{}>", idx, peer);
                    }
                    Err(stream) => {
                        log::warn!("tcp_bridge: max clients reached, rejecting <{}>", peer);
                        abort_close(&stream);
                    }
                },
                Err(err) if err.kind() == ErrorKind::WouldBlock => break,
                Err(err) => {
                    log::debug!("tcp_bridge: accept failed: {}", err);
                    break;
                }
            }
        }
    }

    fn attempt_connect(&mut self, now: Instant) {
        self.backoff.attempt_started(now);

        let host = self.config.target_host.clone();
        let port = self.config.target_port;
        let timeout = self.config.connect_timeout();

        let mut stream = None;

        // Cached address first; a failure invalidates the cache and falls
        // through to fresh resolution.
        if let Some(addr) = self.resolved {
            match TcpStream::connect_timeout(&addr, timeout) {
                Ok(connected) => stream = Some(connected),
                Err(err) => {
                    log::info!(
                        "tcp_bridge: cached address <{}> failed ({}), re-resolving",
                        addr,
                        err
                    );
                    self.resolved = None;
                }
            }
        }

        if stream.is_none() {
            match (host.as_str(), port).to_socket_addrs() {
                Ok(mut addrs) => match addrs.next() {
                    Some(addr) => match TcpStream::connect_timeout(&addr, timeout) {
                        Ok(connected) => {
                            self.resolved = Some(addr);
                            stream = Some(connected);
                        }
                        Err(err) => {
                            log::warn!(
                                "tcp_bridge: connect to <{}:{}> failed: {}",
                                host,
                                port,
                                err
                            );
                        }
                    },
                    None => log::warn!("tcp_bridge: <{}> resolved to no addresses", host),
                },
                Err(err) => log::warn!("tcp_bridge: resolve <{}> failed: {}", host, err),
            }
        }

        match stream {
            Some(stream) => {
                self.slots.assign_single(stream, now);
                self.backoff.on_success();
                log::info!("tcp_bridge: connected to backbone at <{}:{}>", host, port);
            }
            None => {
                self.backoff.on_failure();
                log::warn!(
                    "tcp_bridge: connection attempt {} failed, next retry in {:?}",
                    self.backoff.consecutive_failures(),
                    self.backoff.interval()
                );
            }
        }
    }

    /// Empty frames keep idle links from hitting the read timeout on
    /// either end. Deframers ignore them.
    fn send_keepalives(&mut self, now: Instant) {
        if self.slots.active_count() == 0 {
            return;
        }
        let due = match self.last_keepalive {
            None => true,
            Some(at) => now.duration_since(at) >= self.config.keepalive_interval(),
        };
        if !due {
            return;
        }
        self.last_keepalive = Some(now);

        for idx in 0..self.slots.capacity() {
            let Some(stream) = self.slots.stream_mut(idx) else {
                continue;
            };
            match stream.write(&hdlc::KEEPALIVE) {
                Ok(0) => self.slots.release(idx, "keepalive write failed"),
                Ok(n) if n < hdlc::KEEPALIVE.len() => {
                    log::debug!("tcp_bridge: short keepalive write on client {}", idx);
                }
                Ok(_) => {}
                Err(err) if err.kind() == ErrorKind::WouldBlock => {
                    self.slots.release(idx, "keepalive stalled");
                }
                Err(_) => self.slots.release(idx, "keepalive write error"),
            }
        }
    }

    fn service_slots(&mut self, now: Instant, transport: &mut dyn MeshTransport) {
        let mut events = Vec::new();

        for idx in 0..self.slots.capacity() {
            if !self.slots.is_active(idx) {
                continue;
            }

            // Passive failures are common on radio-adjacent links: a peer
            // that dies silently never reports closed, so an idle slot is
            // recycled once the read timeout elapses.
            if let (Some(timeout), Some(at)) =
                (self.config.read_timeout(), self.slots.last_activity(idx))
            {
                if now.duration_since(at) > timeout {
                    log::info!("tcp_bridge: client {} read timeout", idx);
                    self.slots.release(idx, "timeout");
                    continue;
                }
            }

            events.clear();
            let health = match self.slots.slot_mut(idx) {
                Some(slot) => slot.drain(now, &mut events),
                None => continue,
            };

            for event in events.drain(..) {
                match event {
                    Deframed::Frame(payload) => {
                        self.stats.rx_frames += 1;
                        let outbound = Outbound {
                            slots: &mut self.slots,
                            stats: &mut self.stats,
                            origin: Some(idx),
                        };
                        transport.handle_incoming(&payload, outbound);
                    }
                    Deframed::Oversize => {
                        self.stats.oversize_dropped += 1;
                        log::debug!("tcp_bridge: client {} dropped oversize frame", idx);
                    }
                }
            }

            if health == SlotHealth::Disconnected {
                log::info!("tcp_bridge: client {} disconnected", idx);
                self.slots.release(idx, "disconnected");
            }
        }
    }
}

/// Frame once, write to every active slot except `skip`.
///
/// A write that accepts nothing tears the slot down on the spot; a short
/// write is logged and left to TCP to sort out.
fn broadcast(slots: &mut SlotTable, stats: &mut IfaceStats, payload: &[u8], skip: Option<usize>) {
    if slots.active_count() == 0 {
        return;
    }

    let frame = hdlc::encode(payload);
    let mut sent_any = false;

    for idx in 0..slots.capacity() {
        if skip == Some(idx) {
            continue;
        }
        let Some(stream) = slots.stream_mut(idx) else {
            continue;
        };
        match stream.write(&frame) {
            Ok(0) => {
                log::warn!("tcp_bridge: write failed on client {}, dropping", idx);
                slots.release(idx, "write failed");
            }
            Ok(n) if n < frame.len() => {
                log::warn!(
                    "tcp_bridge: short write on client {} ({} of {} bytes)",
                    idx,
                    n,
                    frame.len()
                );
                sent_any = true;
            }
            Ok(_) => sent_any = true,
            Err(err) if err.kind() == ErrorKind::WouldBlock => {
                log::warn!("tcp_bridge: write stalled on client {}, dropping", idx);
                slots.release(idx, "write stalled");
            }
            Err(err) => {
                log::warn!("tcp_bridge: write error on client {}: {}", idx, err);
                slots.release(idx, "write error");
            }
        }
    }

    if sent_any {
        stats.tx_frames += 1;
    }
}
