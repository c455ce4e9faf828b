use crate::api::{HttpAnalysisClient, QueueSource};
use crate::cli::format::progress_bar;
use crate::core::models::QueueSnapshot;
use crate::core::settings::Settings;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Serialize)]
struct QueueOutput<'a> {
    queue: &'a QueueSnapshot,
    #[serde(with = "chrono::serde::ts_seconds")]
    fetched_at: DateTime<Utc>,
}

pub async fn run(settings: &Settings, json: bool) -> Result<()> {
    let client = HttpAnalysisClient::new(&settings.api).context("Failed to build HTTP client")?;
    let snapshot = client
        .fetch_queue()
        .await
        .context("Failed to fetch analysis queue")?;

    if json {
        let output = QueueOutput {
            queue: &snapshot,
            fetched_at: Utc::now(),
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        print!("{}", render_text(&snapshot));
    }

    Ok(())
}

fn render_text(snapshot: &QueueSnapshot) -> String {
    if snapshot.is_empty() {
        return "Analysis queue is empty\n".to_string();
    }

    let mut out = String::new();

    if !snapshot.running.is_empty() {
        out.push_str(&format!("Running ({})\n", snapshot.running.len()));
        for task in &snapshot.running {
            out.push_str(&format!(
                "  {:<16} {} {:>5.1}%  {}\n",
                task.task_id,
                progress_bar(task.progress, 16),
                task.progress.clamp(0.0, 100.0),
                task.step
            ));
        }
    }

    if !snapshot.recently_completed.is_empty() {
        out.push_str(&format!(
            "Recently completed ({})\n",
            snapshot.recently_completed.len()
        ));
        for task in &snapshot.recently_completed {
            out.push_str(&format!("  {}\n", task.task_id));
        }
    }

    if !snapshot.recently_failed.is_empty() {
        out.push_str(&format!("Recently failed ({})\n", snapshot.recently_failed.len()));
        for task in &snapshot.recently_failed {
            out.push_str(&format!(
                "  {:<16} {}\n",
                task.task_id,
                task.error.as_deref().unwrap_or("unknown error")
            ));
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::{CompletedTask, FailedTask, RunningTask};

    #[test]
    fn test_render_empty_queue() {
        assert_eq!(
            render_text(&QueueSnapshot::default()),
            "Analysis queue is empty\n"
        );
    }

    #[test]
    fn test_render_all_sections() {
        let snapshot = QueueSnapshot {
            running: vec![RunningTask {
                task_id: "hw-17".to_string(),
                progress: 50.0,
                step: "Clustering errors".to_string(),
            }],
            recently_completed: vec![CompletedTask {
                task_id: "hw-12".to_string(),
            }],
            recently_failed: vec![FailedTask {
                task_id: "hw-9".to_string(),
                error: None,
            }],
        };

        let text = render_text(&snapshot);
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "Running (1)");
        assert!(lines[1].contains("hw-17"));
        assert!(lines[1].contains("[########--------]  50.0%  Clustering errors"));
        assert_eq!(lines[2], "Recently completed (1)");
        assert_eq!(lines[3], "  hw-12");
        assert_eq!(lines[4], "Recently failed (1)");
        assert!(lines[5].ends_with("unknown error"));
    }
}
