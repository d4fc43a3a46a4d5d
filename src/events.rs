use crate::types::{SensorState, ValueSet};
use crossbeam_channel::{Receiver, Sender};
use std::sync::atomic::{AtomicBool, Ordering};

/// Notification raised towards the sensor framework.
#[derive(Debug, Clone, PartialEq)]
pub enum SensorEvent {
    /// A report was decoded; carries a copy of the data-field map.
    DataUpdated(ValueSet),
    StateChanged(SensorState),
}

/// Consumer of sensor notifications.
///
/// Called synchronously from the report-processing path, so implementations
/// must not block.
pub trait EventSink: Send {
    fn emit(&self, event: SensorEvent);
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: SensorEvent) {}
}

/// Forwards events over a bounded channel. A full channel drops the event
/// rather than stalling the report path.
pub struct ChannelSink {
    sender: Sender<SensorEvent>,
    disconnected: AtomicBool,
}

impl ChannelSink {
    pub fn new(capacity: usize) -> (ChannelSink, Receiver<SensorEvent>) {
        let (sender, receiver) = crossbeam_channel::bounded(capacity);
        (
            ChannelSink {
                sender,
                disconnected: AtomicBool::new(false),
            },
            receiver,
        )
    }
}

impl EventSink for ChannelSink {
    fn emit(&self, event: SensorEvent) {
        if let Err(e) = self.sender.try_send(event) {
            match e {
                crossbeam_channel::TrySendError::Full(_) => {
                    log::trace!("Event channel full, dropping event");
                }
                crossbeam_channel::TrySendError::Disconnected(_) => {
                    if !self.disconnected.swap(true, Ordering::Relaxed) {
                        log::info!("Event channel disconnected, events are discarded");
                    }
                }
            }
        }
    }
}
