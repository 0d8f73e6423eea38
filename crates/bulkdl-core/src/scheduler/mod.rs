//! Batch scheduler.
//!
//! Runs batches strictly one after another. Inside a batch every item gets
//! its own blocking transfer task; the coordinator waits for all of them to
//! settle (success or failure) before the next batch starts, so at most
//! `width` transfers are in flight. Worker samples are funneled through one
//! channel into the coordinator, which is the only writer of the aggregator
//! and the completion tally.

mod execute;
mod report;
mod run;
mod status;

pub use report::{FailedItem, RunReport};
pub use run::{run, RunOptions};
pub use status::StatusUpdate;
