//! Interval-driven emitters for the `persistState` and `systemInfo`
//! events, shaped after [`crate::system_info::run_sampler`]'s
//! tick-until-cancelled loop.

use std::sync::Arc;
use std::time::Duration;

use crate::cancellation::CancellationToken;
use crate::system_info::SystemStatus;

use super::types::Event;
use super::EventBus;

/// Spawns the two standard background emitters (`persistState` on
/// `persist_state_interval`, `systemInfo` on `system_info_interval`) and
/// returns their join handles so the caller can await them at shutdown.
pub fn spawn_standard_emitters(
    bus: EventBus,
    system_status: Arc<SystemStatus>,
    persist_state_interval: Duration,
    system_info_interval: Duration,
    cancel: CancellationToken,
) -> Vec<tokio::task::JoinHandle<()>> {
    vec![
        tokio::spawn(run_persist_state_emitter(
            bus.clone(),
            persist_state_interval,
            cancel.clone(),
        )),
        tokio::spawn(run_system_info_emitter(
            bus,
            system_status,
            system_info_interval,
            cancel,
        )),
    ]
}

async fn run_persist_state_emitter(bus: EventBus, interval: Duration, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(err) = bus.publish_with_backpressure(Event::persist_state()).await {
                    log::warn!("persistState emit failed: {err}");
                }
            }
            _ = cancel.cancelled() => break,
        }
    }
}

async fn run_system_info_emitter(
    bus: EventBus,
    system_status: Arc<SystemStatus>,
    interval: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let sample = system_status.sample();
                if let Err(err) = bus
                    .publish_with_backpressure(Event::system_info(sample))
                    .await
                {
                    log::warn!("systemInfo emit failed: {err}");
                }
            }
            _ = cancel.cancelled() => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn persist_state_emitter_publishes_on_tick() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_persist_state_emitter(
            bus.clone(),
            Duration::from_millis(10),
            cancel.clone(),
        ));

        let event = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("did not receive an event in time")
            .expect("channel closed");
        assert_eq!(event.name(), "persistState");

        cancel.cancel();
        let _ = handle.await;
    }
}
