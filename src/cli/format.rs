use crate::poller::{PollEvent, ProgressUpdate};
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::io::{IsTerminal, Write};

const BAR_WIDTH: usize = 24;

/// Human readable remaining time, e.g. `45s`, `3m 05s`, `1h 02m`.
pub fn format_eta(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;

    if hours > 0 {
        format!("{}h {:02}m", hours, minutes)
    } else if minutes > 0 {
        format!("{}m {:02}s", minutes, secs)
    } else {
        format!("{}s", secs)
    }
}

pub fn progress_bar(percent: f64, width: usize) -> String {
    let fraction = (percent / 100.0).clamp(0.0, 1.0);
    let filled = ((fraction * width as f64).round() as usize).min(width);
    format!("[{}{}]", "#".repeat(filled), "-".repeat(width - filled))
}

pub fn progress_line(update: &ProgressUpdate) -> String {
    let eta = match update.eta_seconds {
        Some(seconds) => format!("  (about {} left)", format_eta(seconds)),
        None => String::new(),
    };

    format!(
        "{} {:>5.1}%  {}{}",
        progress_bar(update.percent, BAR_WIDTH),
        update.percent.clamp(0.0, 100.0),
        update.step,
        eta
    )
}

#[derive(Serialize)]
struct JsonEvent<'a> {
    task_id: &'a str,
    at: DateTime<Utc>,
    #[serde(flatten)]
    event: &'a PollEvent,
}

/// Writes poll events to stdout, either as text or as JSON lines.
pub struct EventRenderer {
    task_id: String,
    json: bool,
    interactive: bool,
    line_open: bool,
}

impl EventRenderer {
    pub fn new(task_id: &str, json: bool) -> Self {
        Self {
            task_id: task_id.to_string(),
            json,
            interactive: !json && std::io::stdout().is_terminal(),
            line_open: false,
        }
    }

    pub fn render(&mut self, event: &PollEvent) -> Result<()> {
        let mut stdout = std::io::stdout().lock();

        if self.json {
            let line = serde_json::to_string(&JsonEvent {
                task_id: &self.task_id,
                at: Utc::now(),
                event,
            })?;
            writeln!(stdout, "{}", line)?;
            return Ok(());
        }

        match event {
            PollEvent::Progress(update) if self.interactive => {
                // Redraw the same terminal line in place.
                write!(stdout, "\r\x1b[2K{}", progress_line(update))?;
                stdout.flush()?;
                self.line_open = true;
            }
            PollEvent::Progress(update) => {
                writeln!(stdout, "{}", progress_line(update))?;
            }
            PollEvent::Completed => {
                self.close_line(&mut stdout)?;
                writeln!(stdout, "Analysis of {} complete", self.task_id)?;
            }
            PollEvent::Error { message } => {
                self.close_line(&mut stdout)?;
                writeln!(stdout, "Error: {}", message)?;
            }
        }
        Ok(())
    }

    pub fn finish(&mut self) -> Result<()> {
        let mut stdout = std::io::stdout().lock();
        self.close_line(&mut stdout)
    }

    fn close_line(&mut self, out: &mut impl Write) -> Result<()> {
        if self.line_open {
            writeln!(out)?;
            self.line_open = false;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_eta() {
        assert_eq!(format_eta(0), "0s");
        assert_eq!(format_eta(45), "45s");
        assert_eq!(format_eta(185), "3m 05s");
        assert_eq!(format_eta(3720), "1h 02m");
    }

    #[test]
    fn test_progress_bar() {
        assert_eq!(progress_bar(0.0, 4), "[----]");
        assert_eq!(progress_bar(50.0, 4), "[##--]");
        assert_eq!(progress_bar(100.0, 4), "[####]");
        assert_eq!(progress_bar(250.0, 4), "[####]");
        assert_eq!(progress_bar(-10.0, 4), "[----]");
    }

    #[test]
    fn test_progress_line() {
        let line = progress_line(&ProgressUpdate {
            percent: 25.0,
            step: "Scoring answers".to_string(),
            eta_seconds: Some(12),
        });
        assert!(line.ends_with(" 25.0%  Scoring answers  (about 12s left)"));

        let line = progress_line(&ProgressUpdate {
            percent: 0.0,
            step: "Queued".to_string(),
            eta_seconds: None,
        });
        assert!(line.ends_with("  0.0%  Queued"));
    }

    #[test]
    fn test_json_event_shape() {
        let event = PollEvent::Error {
            message: "boom".to_string(),
        };
        let json = serde_json::to_value(JsonEvent {
            task_id: "hw-17",
            at: Utc::now(),
            event: &event,
        })
        .unwrap();

        assert_eq!(json["task_id"], "hw-17");
        assert_eq!(json["event"], "error");
        assert_eq!(json["message"], "boom");
        assert!(json["at"].is_string());
    }
}
