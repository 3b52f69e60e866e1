//! Sensor Suite
//!
//! Thin observation loops, one spawned task or thread per sensor. Each emits
//! canonical Events through the pipeline and keeps only the bounded seen-set
//! bookkeeping it needs to avoid re-reporting.

pub mod autorun;
pub mod download;
pub mod filewatch;
pub mod network;
pub mod process;
pub mod process_tree;
pub mod signature;
pub mod usb;
