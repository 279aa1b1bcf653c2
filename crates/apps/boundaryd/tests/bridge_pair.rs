//! Frames decoded on one side of the boundary come out the other side.

use std::io::{ErrorKind, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::time::{Duration, Instant};

use boundary_bridge::hdlc::{self, Deframed, Deframer};
use boundary_bridge::{BridgeConfig, TcpInterface};
use boundary_daemon::router::{BridgedCounters, CrossLink};

fn reserve_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind ephemeral port");
    listener.local_addr().expect("ephemeral addr").port()
}

fn read_frames(stream: &mut TcpStream, mtu: usize) -> Vec<Deframed> {
    stream.set_read_timeout(Some(Duration::from_millis(50))).expect("set read timeout");
    let mut bytes = Vec::new();
    let mut buf = [0u8; 4096];
    loop {
        match stream.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => bytes.extend_from_slice(&buf[..n]),
            Err(err) if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => break,
            Err(_) => break,
        }
    }
    let mut deframer = Deframer::new(mtu);
    bytes.iter().filter_map(|&b| deframer.push(b)).collect()
}

#[test]
fn frames_cross_the_boundary_both_ways() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .is_test(true)
        .try_init();

    let lan_port = reserve_port();
    let wan_port = reserve_port();

    // Stand-in backbone: a second server-mode interface with one raw peer.
    let mut lan = TcpInterface::new(BridgeConfig::server(lan_port)).expect("lan config");
    let mut wan = TcpInterface::new(BridgeConfig::server(wan_port)).expect("wan config");
    let mtu = lan.config().mtu;

    let now = Instant::now();
    lan.start(now).expect("lan bind");
    wan.start(now).expect("wan bind");

    let mut lan_peer = TcpStream::connect(("127.0.0.1", lan_port)).expect("lan peer");
    let mut wan_peer = TcpStream::connect(("127.0.0.1", wan_port)).expect("wan peer");

    let mut counters = BridgedCounters::default();
    let tick_both = |lan: &mut TcpInterface, wan: &mut TcpInterface,
                     counters: &mut BridgedCounters| {
        let now = Instant::now();
        let mut link = CrossLink {
            peer: Some(&mut *wan),
            bridged: &mut counters.local_to_backbone,
            repeat: true,
        };
        lan.tick(now, &mut link);
        let mut link = CrossLink {
            peer: Some(&mut *lan),
            bridged: &mut counters.backbone_to_local,
            repeat: false,
        };
        wan.tick(now, &mut link);
    };

    let deadline = Instant::now() + Duration::from_secs(5);
    while (lan.client_count() == 0 || wan.client_count() == 0) && Instant::now() < deadline {
        tick_both(&mut lan, &mut wan, &mut counters);
        std::thread::sleep(Duration::from_millis(5));
    }
    assert_eq!((lan.client_count(), wan.client_count()), (1, 1));

    // LAN -> WAN.
    lan_peer.write_all(&hdlc::encode(b"outbound packet")).expect("write");
    let deadline = Instant::now() + Duration::from_secs(5);
    while counters.local_to_backbone == 0 && Instant::now() < deadline {
        tick_both(&mut lan, &mut wan, &mut counters);
        std::thread::sleep(Duration::from_millis(5));
    }
    assert_eq!(counters.local_to_backbone, 1);
    assert_eq!(
        read_frames(&mut wan_peer, mtu),
        vec![Deframed::Frame(b"outbound packet".to_vec())]
    );

    // WAN -> LAN.
    wan_peer.write_all(&hdlc::encode(b"inbound packet")).expect("write");
    let deadline = Instant::now() + Duration::from_secs(5);
    while counters.backbone_to_local == 0 && Instant::now() < deadline {
        tick_both(&mut lan, &mut wan, &mut counters);
        std::thread::sleep(Duration::from_millis(5));
    }
    assert_eq!(counters.backbone_to_local, 1);
    assert_eq!(
        read_frames(&mut lan_peer, mtu),
        vec![Deframed::Frame(b"inbound packet".to_vec())]
    );

    lan.stop();
    wan.stop();
    assert_eq!(lan.client_count() + wan.client_count(), 0);
}
