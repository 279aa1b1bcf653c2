//! Library side of the boundary daemon: configuration loading and the
//! cross-interface routing glue. The binary lives in `src/bin/boundaryd.rs`.

pub mod config;
pub mod router;
