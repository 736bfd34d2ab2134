use anyhow::Result;
use module::EventProcessor;
use tokio::sync::mpsc::Receiver;
use tracing::{debug, error};

use super::collection::event::TrackerEvent;

pub mod module;
pub mod tracker;
pub mod word_count;

/// Single consumer of tracker events. Every event is processed to completion before the next one
/// is received, which is what keeps the tracker the only writer of its state.
pub struct ProcessingModule<Processor> {
    receiver: Receiver<TrackerEvent>,
    processor: Processor,
}

impl<P: EventProcessor> ProcessingModule<P> {
    pub fn new(receiver: Receiver<TrackerEvent>, processor: P) -> Self {
        Self {
            receiver,
            processor,
        }
    }

    /// Runs until every sender is dropped. A failing event is logged and doesn't stop the loop.
    pub async fn run(mut self) -> Result<P> {
        while let Some(event) = self.receiver.recv().await {
            debug!("Processing event {:?}", event);
            if let Err(e) = self.processor.process_next(event.clone()).await {
                error!("Error processing event {:?}: {e:?}", event)
            }
        }

        self.receiver.close();
        self.processor.finalize().await?;
        Ok(self.processor)
    }
}
