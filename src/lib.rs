//! uxfs — a FUSE bridge that presents an external controller process as a
//! mountable filesystem (spec §1-§9). The core lives in `bridge`, `table`,
//! `channel`, `buffer`, and `handle`; `fs` is the seam onto `fuse_mt`'s
//! dispatcher, and `cli`/`logging` are the bootstrap/ambient stack.

pub mod bridge;
pub mod buffer;
pub mod channel;
pub mod cli;
pub mod error;
pub mod fs;
pub mod handle;
pub mod logging;
pub mod table;
