// Scoring & History Recorder: persists finished sessions and reads them back.
// Storage is pluggable behind `store::HistoryStore` (postgres, redis, memory).

pub mod handlers;
pub mod progress;
pub mod recorder;
pub mod store;
