pub mod orphan_monitor;
pub mod presence_sweep;
pub mod scheduler;
pub mod transcode_results;
