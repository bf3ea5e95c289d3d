//! Colored terminal rendering for wscal-core types.

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use owo_colors::OwoColorize;
use wscal_core::sync::{DiffKind, PlannedChange, SyncPlan};
use wscal_core::{CalendarEvent, SupportedColor, SyncSummary};

/// Extension trait for TUI rendering with colors.
pub trait Render {
    fn render(&self) -> String;
}

impl Render for DiffKind {
    fn render(&self) -> String {
        let symbol = self.to_string();
        match self {
            DiffKind::Create => symbol.green().to_string(),
            DiffKind::Update => symbol.yellow().to_string(),
            DiffKind::Adopt => symbol.cyan().to_string(),
            DiffKind::Delete => symbol.red().to_string(),
        }
    }
}

impl Render for SupportedColor {
    /// A colored dot standing in for the event color.
    fn render(&self) -> String {
        let dot = "●";
        match self {
            SupportedColor::Red => dot.red().to_string(),
            SupportedColor::Blue => dot.blue().to_string(),
            SupportedColor::Green => dot.green().to_string(),
            SupportedColor::Yellow => dot.yellow().to_string(),
            SupportedColor::Orange => dot.bright_red().to_string(),
            SupportedColor::Purple => dot.purple().to_string(),
            SupportedColor::Pink => dot.bright_magenta().to_string(),
            SupportedColor::Indigo => dot.bright_blue().to_string(),
            SupportedColor::Cyan => dot.cyan().to_string(),
            SupportedColor::Gray => dot.bright_black().to_string(),
        }
    }
}

impl Render for PlannedChange {
    fn render(&self) -> String {
        let title = match self.kind {
            DiffKind::Create => self.title.green().to_string(),
            DiffKind::Update => self.title.yellow().to_string(),
            DiffKind::Adopt => self.title.cyan().to_string(),
            DiffKind::Delete => self.title.red().to_string(),
        };
        let when = self
            .start_at
            .map(|at| at.format("%Y-%m-%d %H:%M UTC").to_string())
            .unwrap_or_default();

        format!("{} {} {}", self.kind.render(), title, when.dimmed())
    }
}

impl Render for SyncSummary {
    fn render(&self) -> String {
        if !self.success {
            let message = self.message.as_deref().unwrap_or("Sync failed");
            return message.red().to_string();
        }
        if !self.changes_made {
            return "No changes".dimmed().to_string();
        }

        let mut line = format!(
            "{} → {} events ({} added, {} removed)",
            self.before, self.after, self.added, self.removed
        );
        if let Some(message) = &self.message {
            line.push_str(&format!("\n{}", message.yellow()));
        }
        line
    }
}

/// Threshold for compact view (show counts instead of individual changes)
const COMPACT_THRESHOLD: usize = 5;

/// Render a sync plan, using compact view if there are many changes and verbose is false
pub fn render_plan(plan: &SyncPlan, verbose: bool) -> String {
    if plan.is_empty() {
        return "   No changes".dimmed().to_string();
    }

    let changes = plan.changes();
    let mut lines = Vec::new();

    if verbose || changes.len() <= COMPACT_THRESHOLD {
        for change in &changes {
            lines.push(format!("   {}", change.render()));
        }
    } else {
        let (created, updated, deleted) = plan.counts();
        if created > 0 {
            let label = format!("({} new {})", created, pluralize("event", created));
            lines.push(format!("   {} {}", "+".green(), label.green()));
        }
        if updated > 0 {
            let label = format!("({} changed {})", updated, pluralize("event", updated));
            lines.push(format!("   {} {}", "~".yellow(), label.yellow()));
        }
        if deleted > 0 {
            let label = format!("({} deleted {})", deleted, pluralize("event", deleted));
            lines.push(format!("   {} {}", "-".red(), label.red()));
        }
    }

    if plan.skipped > 0 {
        let label = format!("({} unreadable provider {} skipped)", plan.skipped, pluralize("event", plan.skipped));
        lines.push(format!("   {}", label.dimmed()));
    }

    lines.join("\n")
}

fn pluralize(word: &str, count: usize) -> String {
    if count == 1 {
        word.to_string()
    } else {
        format!("{word}s")
    }
}

/// One line per event: time, color, title, lane and lock markers.
pub fn render_event(event: &CalendarEvent, tz: Tz, level: usize, overlaps: bool) -> String {
    let time = format_time(event, tz);
    let mut line = format!("  {} {} {}", time, event.color.render(), event.title);

    if overlaps {
        line.push_str(&format!(" {}", format!("[lane {level}]").yellow()));
    }
    if event.locked {
        line.push_str(&format!(" {}", "locked".dimmed()));
    }
    if event.is_mirrored() {
        line.push_str(&format!(" {}", "synced".dimmed()));
    }
    line.push_str(&format!(" {}", event.id.dimmed()));
    line
}

/// Format the time portion of an event (e.g. "15:00" or "all-day")
fn format_time(event: &CalendarEvent, tz: Tz) -> String {
    if event.is_all_day() {
        return format!("{:>13}", "all-day");
    }
    format!(
        "{} - {}",
        local(event.start_at, tz).format("%H:%M"),
        local(event.end_at, tz).format("%H:%M")
    )
}

fn local(instant: DateTime<Utc>, tz: Tz) -> DateTime<Tz> {
    instant.with_timezone(&tz)
}

/// Format a date as a human-readable label (e.g. "Today", "Tomorrow", "Wed Feb 25")
pub fn format_date_label(date: NaiveDate, today: NaiveDate) -> String {
    match (date - today).num_days() {
        0 => "Today".to_string(),
        1 => "Tomorrow".to_string(),
        -1 => "Yesterday".to_string(),
        _ => date.format("%a %b %-d").to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn date_labels() {
        let today = NaiveDate::from_ymd_opt(2025, 2, 24).unwrap();
        assert_eq!(format_date_label(today, today), "Today");
        assert_eq!(format_date_label(today.succ_opt().unwrap(), today), "Tomorrow");
        assert_eq!(
            format_date_label(NaiveDate::from_ymd_opt(2025, 2, 26).unwrap(), today),
            "Wed Feb 26"
        );
    }

    #[test]
    fn pluralize_counts() {
        assert_eq!(pluralize("event", 1), "event");
        assert_eq!(pluralize("event", 3), "events");
    }
}
