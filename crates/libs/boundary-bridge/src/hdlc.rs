//! HDLC-like byte-stuffed framing, as carried on Reticulum TCP links.
//!
//! Frames are delimited by [`FLAG`] bytes; payload bytes equal to `FLAG` or
//! [`ESC`] are escaped as `ESC, byte ^ 0x20`. Two adjacent flags form an
//! empty frame, which decoders ignore; the bridge uses that as a keepalive.

pub const FLAG: u8 = 0x7e;
pub const ESC: u8 = 0x7d;
pub const ESC_MASK: u8 = 0x20;

/// Wire bytes of an empty frame. Ignored by every deframer.
pub const KEEPALIVE: [u8; 2] = [FLAG, FLAG];

/// Encode `payload` into a single delimited frame.
///
/// The output is byte-transparent: any payload, including one containing
/// `FLAG`/`ESC` values, round-trips exactly through [`Deframer`].
pub fn encode(payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(payload.len() + payload.len() / 4 + 2);

    out.push(FLAG);
    for &byte in payload {
        match byte {
            FLAG | ESC => {
                out.push(ESC);
                out.push(byte ^ ESC_MASK);
            }
            _ => out.push(byte),
        }
    }
    out.push(FLAG);

    out
}

/// A completed decode event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Deframed {
    /// A well-formed frame, ready for delivery.
    Frame(Vec<u8>),
    /// A frame grew past the MTU before its closing flag and was discarded
    /// whole. Partial payloads are never delivered.
    Oversize,
}

/// Incremental per-connection decoder.
///
/// Fed one byte at a time against the connection's receive stream. Bytes
/// seen before the first flag are pre-sync noise and are discarded.
#[derive(Debug)]
pub struct Deframer {
    mtu: usize,
    in_frame: bool,
    escape: bool,
    truncated: bool,
    buf: Vec<u8>,
}

impl Deframer {
    pub fn new(mtu: usize) -> Self {
        Self { mtu, in_frame: false, escape: false, truncated: false, buf: Vec::with_capacity(mtu) }
    }

    /// Drop any partially decoded frame and resynchronize.
    pub fn reset(&mut self) {
        self.in_frame = false;
        self.escape = false;
        self.truncated = false;
        self.buf.clear();
    }

    /// Consume one received byte; returns an event when a frame closes.
    pub fn push(&mut self, byte: u8) -> Option<Deframed> {
        if byte == FLAG {
            let event = if self.in_frame && self.truncated {
                Some(Deframed::Oversize)
            } else if self.in_frame && !self.buf.is_empty() {
                Some(Deframed::Frame(core::mem::take(&mut self.buf)))
            } else {
                // Empty frame (keepalive) or resync, nothing to deliver.
                None
            };

            self.in_frame = true;
            self.escape = false;
            self.truncated = false;
            self.buf.clear();
            return event;
        }

        if !self.in_frame {
            return None;
        }

        if !self.escape && byte == ESC {
            self.escape = true;
            return None;
        }

        let byte = if self.escape {
            self.escape = false;
            byte ^ ESC_MASK
        } else {
            byte
        };

        if self.buf.len() < self.mtu {
            self.buf.push(byte);
        } else {
            // Keep consuming until the closing flag, then drop the frame.
            self.truncated = true;
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(deframer: &mut Deframer, bytes: &[u8]) -> Vec<Deframed> {
        bytes.iter().filter_map(|&b| deframer.push(b)).collect()
    }

    #[test]
    fn round_trip_plain() {
        let payload = b"the quick brown fox".to_vec();
        let mut deframer = Deframer::new(1064);
        let events = feed(&mut deframer, &encode(&payload));
        assert_eq!(events, vec![Deframed::Frame(payload)]);
    }

    #[test]
    fn round_trip_reserved_bytes() {
        let payload = vec![FLAG, ESC, 0x00, FLAG, 0xff, ESC, ESC];
        let encoded = encode(&payload);
        // Every reserved byte costs one escape byte on the wire.
        assert_eq!(encoded.len(), payload.len() + 5 + 2);

        let mut deframer = Deframer::new(1064);
        let events = feed(&mut deframer, &encoded);
        assert_eq!(events, vec![Deframed::Frame(payload)]);
    }

    #[test]
    fn empty_frames_are_ignored() {
        let mut deframer = Deframer::new(1064);
        assert!(feed(&mut deframer, &[FLAG, FLAG, FLAG, FLAG]).is_empty());

        // A keepalive between two real frames does not disturb decoding.
        let mut stream = encode(b"one");
        stream.extend_from_slice(&KEEPALIVE);
        stream.extend_from_slice(&encode(b"two"));
        let events = feed(&mut deframer, &stream);
        assert_eq!(
            events,
            vec![Deframed::Frame(b"one".to_vec()), Deframed::Frame(b"two".to_vec())]
        );
    }

    #[test]
    fn pre_sync_noise_is_discarded() {
        let mut deframer = Deframer::new(1064);
        let mut stream = vec![0x01, 0x02, ESC, 0x03];
        stream.extend_from_slice(&encode(b"payload"));
        let events = feed(&mut deframer, &stream);
        assert_eq!(events, vec![Deframed::Frame(b"payload".to_vec())]);
    }

    #[test]
    fn oversize_frame_dropped_next_frame_survives() {
        let mut deframer = Deframer::new(8);
        let mut stream = encode(&[0xaa; 9]);
        stream.extend_from_slice(&encode(b"good"));
        let events = feed(&mut deframer, &stream);
        assert_eq!(events, vec![Deframed::Oversize, Deframed::Frame(b"good".to_vec())]);
    }

    #[test]
    fn frame_at_exactly_mtu_is_delivered() {
        let mut deframer = Deframer::new(8);
        let payload = vec![0x55; 8];
        let events = feed(&mut deframer, &encode(&payload));
        assert_eq!(events, vec![Deframed::Frame(payload)]);
    }

    #[test]
    fn escaped_byte_spanning_reads() {
        let mut deframer = Deframer::new(1064);
        // Split an escape sequence across two pushes.
        assert_eq!(deframer.push(FLAG), None);
        assert_eq!(deframer.push(ESC), None);
        assert_eq!(deframer.push(FLAG ^ ESC_MASK), None);
        assert_eq!(deframer.push(FLAG), Some(Deframed::Frame(vec![FLAG])));
    }
}
