//! Minimal repeater node: listens on a port and re-broadcasts every frame
//! to the other connected clients (never back to its sender).
//!
//! Run with `cargo run --example repeater -- 4242`, then point two or more
//! framed TCP peers at it.

use std::time::{Duration, Instant};

use boundary_bridge::{BridgeConfig, MeshTransport, Outbound, TcpInterface};

struct Repeater;

impl MeshTransport for Repeater {
    fn handle_incoming(&mut self, payload: &[u8], mut outbound: Outbound<'_>) {
        outbound.send(payload);
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let port = std::env::args().nth(1).map(|arg| arg.parse::<u16>()).transpose()?.unwrap_or(4242);

    let mut iface = TcpInterface::new(BridgeConfig::server(port))?;
    iface.start(Instant::now())?;

    let mut repeater = Repeater;
    loop {
        iface.tick(Instant::now(), &mut repeater);
        std::thread::sleep(Duration::from_millis(10));
    }
}
