//! Formatted output helpers for CLI commands.
//!
//! Plain left-aligned tables sized to their widest cell, and the few value
//! formats the listings share.

use std::fmt::Write as _;

use chrono::{DateTime, Utc};

/// A left-aligned text table.
#[derive(Debug, Default)]
pub struct Table {
    header: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    /// Creates a table with the given column headers.
    #[must_use]
    pub fn new(header: &[&str]) -> Self {
        Self {
            header: header.iter().map(ToString::to_string).collect(),
            rows: Vec::new(),
        }
    }

    /// Appends a row. Missing cells render empty, extra cells are dropped.
    pub fn row(&mut self, cells: Vec<String>) {
        self.rows.push(cells);
    }

    /// Returns whether no rows were added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Renders the header and rows, two spaces between columns, without
    /// trailing whitespace.
    #[must_use]
    pub fn render(&self) -> String {
        let widths: Vec<usize> = (0..self.header.len())
            .map(|col| {
                std::iter::once(&self.header)
                    .chain(&self.rows)
                    .filter_map(|row| row.get(col))
                    .map(|cell| cell.chars().count())
                    .max()
                    .unwrap_or(0)
            })
            .collect();

        let mut out = String::new();
        for row in std::iter::once(&self.header).chain(&self.rows) {
            let mut line = String::new();
            for (col, width) in widths.iter().enumerate() {
                let cell = row.get(col).map_or("", String::as_str);
                let _ = write!(line, "{cell:<width$}  ");
            }
            out.push_str(line.trim_end());
            out.push('\n');
        }
        out
    }

    /// Writes the table to stdout.
    pub fn print(&self) {
        print_out(&self.render());
    }
}

/// Writes text to stdout as is.
#[allow(clippy::print_stdout)]
pub fn print_out(text: &str) {
    print!("{text}");
}

/// Writes one line to stdout.
#[allow(clippy::print_stdout)]
pub fn print_line(line: &str) {
    println!("{line}");
}

/// Formats an optional pid, `-` when the container has no process.
#[must_use]
pub fn format_pid(pid: Option<i32>) -> String {
    pid.filter(|p| *p > 0)
        .map_or_else(|| "-".to_string(), |p| p.to_string())
}

/// Formats a timestamp relative to `now`, e.g. `5 minutes ago`.
#[must_use]
pub fn format_age(at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let secs = (now - at).num_seconds().max(0);
    let (value, unit) = match secs {
        0..60 => return "just now".to_string(),
        60..3_600 => (secs / 60, "minute"),
        3_600..86_400 => (secs / 3_600, "hour"),
        _ => (secs / 86_400, "day"),
    };
    let plural = if value == 1 { "" } else { "s" };
    format!("{value} {unit}{plural} ago")
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    #[test]
    fn render_pads_to_widest_cell() {
        let mut table = Table::new(&["ID", "NAME"]);
        table.row(vec!["abc".into(), "web".into()]);
        table.row(vec!["a".into(), "database".into()]);
        assert_eq!(
            table.render(),
            "ID   NAME\nabc  web\na    database\n"
        );
    }

    #[test]
    fn render_tolerates_short_rows() {
        let mut table = Table::new(&["A", "B"]);
        table.row(vec!["x".into()]);
        assert_eq!(table.render(), "A  B\nx\n");
    }

    #[test]
    fn format_pid_hides_missing_process() {
        assert_eq!(format_pid(None), "-");
        assert_eq!(format_pid(Some(0)), "-");
        assert_eq!(format_pid(Some(42)), "42");
    }

    #[test]
    fn format_age_picks_largest_unit() {
        let now = Utc::now();
        assert_eq!(format_age(now, now), "just now");
        assert_eq!(format_age(now - Duration::minutes(1), now), "1 minute ago");
        assert_eq!(format_age(now - Duration::hours(5), now), "5 hours ago");
        assert_eq!(format_age(now - Duration::days(3), now), "3 days ago");
        assert_eq!(format_age(now + Duration::days(3), now), "just now");
    }
}
