//! Terminal formatting for alarms
//!
//! Handles colored output for the pending list and the ringing prompt.

use chrono::{DateTime, Local};
use colored::*;

use chime_core::date::format_date_human;
use chime_engine::{FiredAlarm, PendingAlarm};

/// Check if stdout is a terminal that should get colors
pub fn supports_color() -> bool {
    use std::io::IsTerminal;
    std::io::stdout().is_terminal()
}

/// Compact countdown: "now", "in 45s", "in 25m", "in 2h 05m", "in 3d 4h"
pub fn format_countdown(until: DateTime<Local>, now: DateTime<Local>) -> String {
    let secs = (until - now).num_seconds();
    if secs <= 0 {
        return "now".to_string();
    }

    let (days, hours, minutes) = (secs / 86_400, secs % 86_400 / 3_600, secs % 3_600 / 60);
    if days > 0 {
        format!("in {}d {}h", days, hours)
    } else if hours > 0 {
        format!("in {}h {:02}m", hours, minutes)
    } else if minutes > 0 {
        format!("in {}m", minutes)
    } else {
        format!("in {}s", secs)
    }
}

/// One line of the pending alarm list
pub fn format_pending(alarm: &PendingAlarm, now: DateTime<Local>, use_color: bool) -> String {
    let due = format_date_human(alarm.task.due(), now.date_naive());
    let when = if alarm.fire_at.date_naive() == now.date_naive() {
        alarm.fire_at.format("%H:%M").to_string()
    } else {
        alarm.fire_at.format("%d/%m %H:%M").to_string()
    };
    let countdown = format_countdown(alarm.fire_at, now);
    let repeat = match alarm.repeat_minutes {
        0 => String::new(),
        m => format!("  repeat {}m", m),
    };

    if use_color {
        let overdue = alarm.task.due() < now.date_naive();
        let due = if overdue {
            format!("(due {})", due).red().bold().to_string()
        } else {
            format!("(due {})", due).normal().to_string()
        };
        format!(
            "{} {}  {} {}{}",
            alarm.task.name().bold(),
            due,
            when.cyan(),
            format!("({})", countdown).yellow(),
            repeat.dimmed()
        )
    } else {
        format!("{} (due {})  {} ({}){}", alarm.task.name(), due, when, countdown, repeat)
    }
}

/// Snooze presets, shortened to "0, 30, 60 ... 720" when long
pub fn format_choices(choices: &[u32]) -> String {
    let join = |items: &[u32]| {
        items
            .iter()
            .map(u32::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    };
    match choices {
        [head @ .., last] if choices.len() > 4 => format!("{} ... {}", join(&head[..3]), last),
        _ => join(choices),
    }
}

/// Banner and question shown while an alarm rings
pub fn format_alarm_prompt(alarm: &FiredAlarm, choices: &[u32], use_color: bool) -> String {
    let enter = match alarm.repeat_minutes {
        0 => "Enter = dismiss".to_string(),
        m => format!("Enter = re-notify in {}m", m),
    };
    let title = format!("Reminder: {}", alarm.task.name());
    let due = format!("Due: {}", alarm.task.due().format("%d/%m/%Y"));
    let help = format!(
        "[{} | <minutes> = re-notify later ({}) | c = cancel alarm]",
        enter,
        format_choices(choices)
    );

    if use_color {
        format!("\n{}\n{}\n{}", title.yellow().bold(), due, help.dimmed())
    } else {
        format!("\n{}\n{}\n{}", title, due, help)
    }
}

/// Summary line after the pending list
pub fn format_summary(count: usize, use_color: bool) -> String {
    let text = match count {
        1 => "1 pending alarm".to_string(),
        n => format!("{} pending alarms", n),
    };
    if use_color { text.dimmed().to_string() } else { text }
}
