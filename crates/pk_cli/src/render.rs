use pk_core::config::Palette;
use pk_core::model::{CheckInFeedback, SubTask, TaskStatus};
use tabled::settings::Style;
use tabled::{Table, Tabled};
use time::{OffsetDateTime, UtcOffset};

#[derive(Tabled)]
struct SubTaskRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Task")]
    task: String,
    #[tabled(rename = "Estimate")]
    estimate: String,
    #[tabled(rename = "Deadline")]
    deadline: String,
    #[tabled(rename = "Status")]
    status: String,
}

pub fn status_label(status: TaskStatus) -> &'static str {
    match status {
        TaskStatus::Pending => "pending",
        TaskStatus::InProgress => "in progress",
        TaskStatus::Completed => "completed",
        TaskStatus::Delayed => "delayed",
    }
}

fn local_offset() -> UtcOffset {
    UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC)
}

/// Deadline relative to today ("due today", "in 3d", "2d late").
pub fn deadline_label(task: &SubTask, now: OffsetDateTime) -> String {
    let deadline = match task.deadline_at() {
        Ok(deadline) => deadline,
        Err(_) if task.deadline.trim().is_empty() => return "-".to_string(),
        Err(_) => return task.deadline.clone(),
    };

    let offset = local_offset();
    let days = (deadline.to_offset(offset).date() - now.to_offset(offset).date()).whole_days();
    match days {
        0 if task.is_overdue(now) => "due today (passed)".to_string(),
        0 => "due today".to_string(),
        1 => "tomorrow".to_string(),
        d if d > 1 => format!("in {d}d"),
        d => format!("{}d late", -d),
    }
}

fn truncate(s: &str, width: usize) -> String {
    if s.chars().count() <= width {
        s.to_string()
    } else {
        let mut out: String = s.chars().take(width.saturating_sub(1)).collect();
        out.push('…');
        out
    }
}

pub fn print_subtasks_plain(tasks: &[SubTask], palette: &Palette, now: OffsetDateTime) {
    if tasks.is_empty() {
        println!("No subtasks available.");
        return;
    }

    let rows: Vec<SubTaskRow> = tasks
        .iter()
        .map(|task| {
            let deadline = deadline_label(task, now);
            SubTaskRow {
                id: task.id.clone(),
                task: truncate(&task.task, 48),
                estimate: task.time_required.clone(),
                deadline: if task.is_overdue(now) {
                    palette.warnize(&deadline)
                } else {
                    deadline
                },
                status: palette.accentize(status_label(task.status)),
            }
        })
        .collect();

    let mut table = Table::new(rows);
    table.with(Style::psql());
    println!("{table}");
}

pub fn print_subtasks_json(tasks: &[SubTask]) {
    println!("{}", serde_json::json!(tasks));
}

pub fn print_subtask_detail(task: &SubTask, palette: &Palette, now: OffsetDateTime) {
    println!("{} ({})", palette.accentize(&task.task), task.id);
    println!("  Goal: {}", if task.goal.is_empty() { "-" } else { &task.goal });
    println!("  Time required: {}", task.time_required);
    println!("  Deadline: {} ({})", task.deadline, deadline_label(task, now));
    println!("  Status: {}", status_label(task.status));
    if let Some(completed_at) = task.completed_at.as_deref() {
        println!("  Completed at: {completed_at}");
    }

    if !task.motivation_tips.is_empty() {
        println!("  Tips:");
        for tip in &task.motivation_tips {
            println!("    - {tip}");
        }
    }
    if !task.checkpoints.is_empty() {
        println!("  Checkpoints:");
        for (index, checkpoint) in task.checkpoints.iter().enumerate() {
            println!("    {}. {checkpoint}", index + 1);
        }
    }
    if !task.check_ins.is_empty() {
        println!("  Check-ins:");
        for entry in &task.check_ins {
            let reason = entry
                .reason
                .as_deref()
                .map(|reason| format!(" - {reason}"))
                .unwrap_or_default();
            println!(
                "    {} {}{}",
                palette.mutedize(&entry.timestamp),
                status_label(entry.status),
                reason
            );
        }
    }
}

pub fn print_feedback(feedback: &CheckInFeedback, palette: &Palette) {
    if let Some(response) = feedback.response.as_deref() {
        println!("{response}");
    }
    for suggestion in &feedback.suggestions {
        println!("  * {suggestion}");
    }
    if let Some(motivation) = feedback.motivation.as_deref() {
        println!("{}", palette.accentize(motivation));
    }
}

pub fn print_error_panel(message: &str, palette: &Palette) {
    println!("{} {message}", palette.warnize("!"));
    println!("{}", palette.mutedize("type `retry` to reload the list"));
}

pub fn print_prompt(task: &SubTask, palette: &Palette, now: OffsetDateTime) {
    println!(
        "{} \"{}\" ({})",
        palette.warnize("Are you working on"),
        task.task,
        deadline_label(task, now)
    );
    println!(
        "{}",
        palette.mutedize("answer: yes | no <reason> | done | skip")
    );
}
