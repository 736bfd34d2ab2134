use anyhow::Result;

use crate::daemon::collection::event::TrackerEvent;

/// Represents an event processor. Processors own whatever state they mutate, the processing
/// module guarantees events are handed over one at a time.
pub trait EventProcessor {
    fn process_next(&mut self, message: TrackerEvent) -> impl std::future::Future<Output = Result<()>>;

    /// Called once after the last event, before the daemon exits.
    fn finalize(&mut self) -> impl std::future::Future<Output = Result<()>>;
}
