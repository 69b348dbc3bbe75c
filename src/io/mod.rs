/// CSV export of run results.
pub mod export;
