use std::io::Write;

use boundary_bridge::IfaceMode;
use boundary_daemon::config::NodeConfig;

const FULL: &str = r#"
poll_ms = 20
status_secs = 30

[backbone]
mode = "client"
target_host = "backbone.example.org"
target_port = 4242
reconnect_min_ms = 5000
reconnect_max_ms = 60000

[local]
mode = "server"
listen_port = 4242
max_clients = 8
read_timeout_ms = 120000
"#;

#[test]
fn parses_full_node_config() {
    let node = NodeConfig::from_toml(FULL).expect("parse");
    assert_eq!(node.poll_ms, 20);
    assert_eq!(node.status_secs, 30);

    let backbone = node.backbone.expect("backbone section");
    assert_eq!(backbone.mode, IfaceMode::Client);
    assert_eq!(backbone.target_host, "backbone.example.org");
    assert_eq!(backbone.target_port, 4242);
    assert_eq!(backbone.reconnect_min_ms, 5_000);
    // Unlisted fields take the firmware defaults.
    assert_eq!(backbone.mtu, 1064);
    assert_eq!(backbone.keepalive_ms, 30_000);

    let local = node.local.expect("local section");
    assert_eq!(local.mode, IfaceMode::Server);
    assert_eq!(local.listen_port, 4242);
    assert_eq!(local.max_clients, 8);
    assert!(local.validate().is_ok());
}

#[test]
fn sections_are_optional() {
    let node = NodeConfig::from_toml("[local]\nmode = \"server\"\n").expect("parse");
    assert!(node.backbone.is_none());
    assert!(node.has_interfaces());
    assert_eq!(node.poll_ms, 10);

    let empty = NodeConfig::from_toml("").expect("parse");
    assert!(!empty.has_interfaces());
}

#[test]
fn unknown_mode_is_rejected() {
    assert!(NodeConfig::from_toml("[local]\nmode = \"p2p\"\n").is_err());
}

#[test]
fn loads_from_disk() {
    let mut file = tempfile::NamedTempFile::new().expect("tempfile");
    file.write_all(FULL.as_bytes()).expect("write");
    let node = NodeConfig::from_path(file.path()).expect("load");
    assert!(node.backbone.is_some());
    assert!(node.local.is_some());
}

#[test]
fn missing_file_is_an_io_error() {
    assert!(NodeConfig::from_path("/nonexistent/boundary.toml").is_err());
}
