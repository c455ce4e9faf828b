use crate::api::HttpAnalysisClient;
use crate::cli::format::EventRenderer;
use crate::core::notifications;
use crate::core::settings::Settings;
use crate::poller::{ChannelObserver, PollEvent, PollerConfig, ProgressPoller};
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Default)]
pub struct TrackOptions {
    pub json: bool,
    pub open: bool,
    pub interval_ms: Option<u64>,
}

#[derive(Debug, PartialEq)]
enum Outcome {
    Completed,
    Failed(String),
    Interrupted,
}

pub async fn run(settings: &Settings, task_id: &str, options: &TrackOptions) -> Result<()> {
    let client = HttpAnalysisClient::new(&settings.api).context("Failed to build HTTP client")?;
    watch(settings, Arc::new(client), task_id, options).await
}

/// Polls `task_id` until it completes, fails, or the user hits Ctrl-C.
pub async fn watch(
    settings: &Settings,
    client: Arc<HttpAnalysisClient>,
    task_id: &str,
    options: &TrackOptions,
) -> Result<()> {
    let mut config = PollerConfig::from(&settings.polling);
    if let Some(interval_ms) = options.interval_ms {
        config.interval = Duration::from_millis(interval_ms);
    }

    let (observer, mut events) = ChannelObserver::new();
    let poller = ProgressPoller::new(task_id, config, client.clone(), Arc::new(observer))
        .context("Invalid tracking request")?;

    let mut renderer = EventRenderer::new(task_id, options.json);
    if !options.json {
        println!("Tracking analysis of {} (Ctrl-C to stop)", task_id);
    }
    poller.start();
    tracing::debug!(task_id = poller.task_id(), json = options.json, "Tracking");

    let outcome = tokio::select! {
        outcome = follow(&mut events, &mut renderer) => outcome?,
        _ = tokio::signal::ctrl_c() => {
            poller.stop();
            Outcome::Interrupted
        }
    };
    renderer.finish()?;

    match outcome {
        Outcome::Completed => {
            if settings.notifications.enabled {
                if let Err(e) = notifications::send_completion_notification(task_id) {
                    tracing::warn!(error = %e, "Failed to send notification");
                }
            }
            if options.open {
                let url = client.report_url(task_id);
                tracing::info!(%url, "Opening report");
                if let Err(e) = open::that(&url) {
                    tracing::error!(error = %e, "Failed to open browser");
                }
            }
            Ok(())
        }
        Outcome::Failed(message) => {
            if settings.notifications.enabled {
                if let Err(e) = notifications::send_failure_notification(task_id, &message) {
                    tracing::warn!(error = %e, "Failed to send notification");
                }
            }
            anyhow::bail!("Analysis of {} failed: {}", task_id, message)
        }
        Outcome::Interrupted => {
            if !options.json {
                println!("Stopped tracking {}", task_id);
            }
            Ok(())
        }
    }
}

/// Renders events until the poller closes the channel. The last event
/// decides the outcome, so a transient error followed by completion is
/// still a success.
async fn follow(
    events: &mut mpsc::UnboundedReceiver<PollEvent>,
    renderer: &mut EventRenderer,
) -> Result<Outcome> {
    let mut last = None;
    while let Some(event) = events.recv().await {
        renderer.render(&event)?;
        last = Some(event);
    }
    Ok(last.map_or(Outcome::Interrupted, terminal_outcome))
}

fn terminal_outcome(last: PollEvent) -> Outcome {
    match last {
        PollEvent::Completed => Outcome::Completed,
        PollEvent::Error { message } => Outcome::Failed(message),
        PollEvent::Progress(_) => Outcome::Interrupted,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::poller::{ProgressObserver, ProgressUpdate};

    #[test]
    fn test_terminal_outcome() {
        assert_eq!(terminal_outcome(PollEvent::Completed), Outcome::Completed);
        assert_eq!(
            terminal_outcome(PollEvent::Error {
                message: "boom".to_string()
            }),
            Outcome::Failed("boom".to_string())
        );
        assert_eq!(
            terminal_outcome(PollEvent::Progress(ProgressUpdate {
                percent: 10.0,
                step: String::new(),
                eta_seconds: None,
            })),
            Outcome::Interrupted
        );
    }

    #[tokio::test]
    async fn test_transient_error_then_completion_succeeds() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        tx.send(PollEvent::Error {
            message: "network error".to_string(),
        })
        .unwrap();
        tx.send(PollEvent::Completed).unwrap();
        drop(tx);

        let mut renderer = EventRenderer::new("hw-17", true);
        let outcome = follow(&mut rx, &mut renderer).await.unwrap();

        assert_eq!(outcome, Outcome::Completed);
    }

    #[tokio::test]
    async fn test_terminal_error_fails() {
        let (observer, mut rx) = ChannelObserver::new();
        observer.on_progress(&ProgressUpdate {
            percent: 40.0,
            step: "Scoring".to_string(),
            eta_seconds: Some(30),
        });
        observer.on_error("boom");
        observer.on_finished();

        let mut renderer = EventRenderer::new("hw-17", true);
        let outcome = follow(&mut rx, &mut renderer).await.unwrap();

        assert_eq!(outcome, Outcome::Failed("boom".to_string()));
    }
}
