use serde::Serialize;
use std::sync::{Mutex, PoisonError};
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressUpdate {
    pub percent: f64,
    pub step: String,
    pub eta_seconds: Option<u64>,
}

/// Receives the outcome of each poll tick.
///
/// Callbacks run on the poller's task and must not block; an external
/// [`ProgressPoller::stop`](super::ProgressPoller::stop) waits for a running
/// callback to return. Calling `stop()` from inside a callback is allowed.
pub trait ProgressObserver: Send + Sync {
    fn on_progress(&self, update: &ProgressUpdate);
    fn on_complete(&self);
    fn on_error(&self, message: &str);

    /// Called once after the terminal callback when the session ends on its
    /// own (completion, failure, or giving up). Not called after `stop()`.
    fn on_finished(&self) {}
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PollEvent {
    Progress(ProgressUpdate),
    Completed,
    Error { message: String },
}

/// Forwards every callback into an unbounded channel so a command loop
/// can render events outside the poller task.
///
/// The channel closes once the session finishes, so the receiver sees every
/// event followed by `None`.
pub struct ChannelObserver {
    tx: Mutex<Option<mpsc::UnboundedSender<PollEvent>>>,
}

impl ChannelObserver {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<PollEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                tx: Mutex::new(Some(tx)),
            },
            rx,
        )
    }

    fn send(&self, event: PollEvent) {
        let tx = self.tx.lock().unwrap_or_else(PoisonError::into_inner);
        match tx.as_ref() {
            Some(tx) if tx.send(event).is_ok() => {}
            _ => tracing::debug!("Poll event receiver gone"),
        }
    }
}

impl ProgressObserver for ChannelObserver {
    fn on_progress(&self, update: &ProgressUpdate) {
        self.send(PollEvent::Progress(update.clone()));
    }

    fn on_complete(&self) {
        self.send(PollEvent::Completed);
    }

    fn on_error(&self, message: &str) {
        self.send(PollEvent::Error {
            message: message.to_string(),
        });
    }

    fn on_finished(&self) {
        self.tx.lock().unwrap_or_else(PoisonError::into_inner).take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_observer_forwards_events() {
        let (observer, mut rx) = ChannelObserver::new();

        observer.on_progress(&ProgressUpdate {
            percent: 10.0,
            step: "Loading submissions".to_string(),
            eta_seconds: None,
        });
        observer.on_error("network error");
        observer.on_complete();

        assert!(matches!(rx.try_recv(), Ok(PollEvent::Progress(u)) if u.step == "Loading submissions"));
        assert_eq!(
            rx.try_recv().unwrap(),
            PollEvent::Error {
                message: "network error".to_string()
            }
        );
        assert_eq!(rx.try_recv().unwrap(), PollEvent::Completed);
    }

    #[test]
    fn test_send_after_receiver_dropped_is_silent() {
        let (observer, rx) = ChannelObserver::new();
        drop(rx);
        observer.on_complete();
    }

    #[test]
    fn test_finish_closes_channel() {
        let (observer, mut rx) = ChannelObserver::new();
        observer.on_complete();
        observer.on_finished();
        observer.on_error("late");

        assert_eq!(rx.try_recv().unwrap(), PollEvent::Completed);
        assert_eq!(rx.try_recv(), Err(mpsc::error::TryRecvError::Disconnected));
    }

    #[test]
    fn test_event_json_shape() {
        let json = serde_json::to_value(PollEvent::Progress(ProgressUpdate {
            percent: 25.0,
            step: "Scoring".to_string(),
            eta_seconds: Some(12),
        }))
        .unwrap();

        assert_eq!(json["event"], "progress");
        assert_eq!(json["percent"], 25.0);
        assert_eq!(json["eta_seconds"], 12);

        let json = serde_json::to_value(PollEvent::Error {
            message: "boom".to_string(),
        })
        .unwrap();
        assert_eq!(json, serde_json::json!({"event": "error", "message": "boom"}));
    }
}
