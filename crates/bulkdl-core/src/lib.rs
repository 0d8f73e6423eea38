//! Parallel resumable bulk transfer engine.
//!
//! Reads a work-item file of pre-signed object URLs, skips what is already
//! on disk, and downloads the rest in fixed-width batches with per-file
//! resume.

pub mod aggregate;
pub mod batch;
pub mod completion;
pub mod config;
pub mod keypath;
pub mod logging;
pub mod manifest;
pub mod partition;
pub mod scheduler;
pub mod storage;
pub mod transfer;
