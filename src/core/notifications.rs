use anyhow::Result;
use notify_rust::Notification;

pub fn send_completion_notification(task_id: &str) -> Result<()> {
    Notification::new()
        .summary("Analysis complete")
        .body(&format!("Grading analysis for {} has finished.", task_id))
        .appname("gradewatch")
        .timeout(notify_rust::Timeout::Milliseconds(5000))
        .show()?;

    tracing::info!(task_id, "Sent completion notification");
    Ok(())
}

pub fn send_failure_notification(task_id: &str, message: &str) -> Result<()> {
    Notification::new()
        .summary("Analysis failed")
        .body(&format!("Grading analysis for {} failed: {}", task_id, message))
        .appname("gradewatch")
        .timeout(notify_rust::Timeout::Milliseconds(8000))
        .show()?;

    tracing::info!(task_id, "Sent failure notification");
    Ok(())
}
