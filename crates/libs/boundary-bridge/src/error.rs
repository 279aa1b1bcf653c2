use thiserror::Error;

/// Errors surfaced to the caller.
///
/// Everything network-transient (resolution failures, refused connects, peer
/// loss, oversize frames) is handled inside the interface and shows up only
/// as reduced capacity or counters, never as an error.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// The configuration record is inconsistent.
    #[error("invalid bridge configuration: {0}")]
    Config(String),

    /// Server mode could not bind its listen socket. Fatal to `start()`
    /// only; the caller decides whether to retry.
    #[error("bind failed on port {port}: {source}")]
    Bind {
        port: u16,
        #[source]
        source: std::io::Error,
    },
}
