use crate::api::HttpAnalysisClient;
use crate::cli::track::{self, TrackOptions};
use crate::core::models::Priority;
use crate::core::settings::Settings;
use anyhow::{Context, Result};
use serde::Serialize;
use std::sync::Arc;

#[derive(Serialize)]
struct TriggerOutput<'a> {
    task_id: &'a str,
    priority: Priority,
    queued: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<&'a str>,
}

pub async fn run(
    settings: &Settings,
    task_id: &str,
    priority: Priority,
    watch: bool,
    json: bool,
) -> Result<()> {
    let client = Arc::new(
        HttpAnalysisClient::new(&settings.api).context("Failed to build HTTP client")?,
    );

    let outcome = client
        .trigger(task_id, priority)
        .await
        .with_context(|| format!("Failed to queue analysis for {}", task_id))?;

    tracing::info!(task_id, queued = outcome.queued, "Trigger response");

    if json {
        let output = TriggerOutput {
            task_id,
            priority,
            queued: outcome.queued,
            message: outcome.message.as_deref(),
        };
        println!("{}", serde_json::to_string(&output)?);
    } else if outcome.queued {
        println!("Queued analysis of {} ({:?} priority)", task_id, priority);
        if let Some(message) = &outcome.message {
            println!("  {}", message);
        }
    } else {
        println!(
            "Analysis of {} was not queued: {}",
            task_id,
            outcome.message.as_deref().unwrap_or("no reason given")
        );
    }

    if watch && outcome.queued {
        let options = TrackOptions {
            json,
            ..TrackOptions::default()
        };
        track::watch(settings, client, task_id, &options).await?;
    }

    Ok(())
}
