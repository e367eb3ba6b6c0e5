//! Filtered event receiver, carried over unchanged from the teacher's
//! `crawl_events::streaming`, retyped to [`Event`].

use std::sync::Arc;

use tokio::sync::broadcast;

use crate::error::EventBusError;

use super::types::Event;

pub struct FilteredReceiver<F>
where
    F: Fn(&Event) -> bool + Send + Sync + 'static,
{
    receiver: broadcast::Receiver<Event>,
    filter: Arc<F>,
}

impl<F> FilteredReceiver<F>
where
    F: Fn(&Event) -> bool + Send + Sync + 'static,
{
    pub fn new(receiver: broadcast::Receiver<Event>, filter: F) -> Self {
        Self {
            receiver,
            filter: Arc::new(filter),
        }
    }

    pub async fn recv(&mut self) -> Result<Event, EventBusError> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => {
                    if (self.filter)(&event) {
                        return Ok(event);
                    }
                }
                Err(broadcast::error::RecvError::Closed) => return Err(EventBusError::Shutdown),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    return Err(EventBusError::ReceiverLagged(skipped));
                }
            }
        }
    }

    pub fn try_recv(&mut self) -> Result<Option<Event>, EventBusError> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if (self.filter)(&event) {
                        return Ok(Some(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return Ok(None),
                Err(broadcast::error::TryRecvError::Closed) => return Err(EventBusError::Shutdown),
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    return Err(EventBusError::ReceiverLagged(skipped));
                }
            }
        }
    }

    pub fn would_receive(&self, event: &Event) -> bool {
        (self.filter)(event)
    }
}
