use colored::Colorize;
use serde_json::{Value, json};

use mflix_insights::DashboardData;

use crate::Section;

/// Print the requested part of the dashboard.
/// If `raw_json` is true, output unformatted JSON suitable for piping.
pub fn print_dashboard(data: &DashboardData, section: Section, raw_json: bool) {
    if raw_json {
        println!("{}", section_json(data, section));
        return;
    }

    let mut blocks = Vec::new();
    if matches!(section, Section::Counts | Section::All) {
        blocks.push(format_counts(data));
    }
    if matches!(section, Section::Genres | Section::All) {
        let rows = data
            .genres
            .iter()
            .map(|g| vec![Cell::Text(g.genre.clone()), Cell::Int(g.count)])
            .collect();
        blocks.push(format_table("Movies per genre", &["Genre", "Movies"], rows));
    }
    if matches!(section, Section::Ratings | Section::All) {
        let rows = data
            .yearly_ratings
            .iter()
            .map(|r| vec![Cell::Int(r.year as u64), Cell::Float(Some(r.avg_rating))])
            .collect();
        blocks.push(format_table(
            "Average IMDb rating by year",
            &["Year", "Avg rating"],
            rows,
        ));
    }
    if matches!(section, Section::TopRated | Section::All) {
        let rows = data
            .top_rated
            .iter()
            .map(|m| vec![Cell::Text(m.title.clone()), Cell::Float(m.rating)])
            .collect();
        blocks.push(format_table("Top rated movies", &["Title", "Rating"], rows));
    }
    if matches!(section, Section::MostCommented | Section::All) {
        let rows = data
            .most_commented
            .iter()
            .map(|m| vec![Cell::Text(m.title.clone()), Cell::Int(m.count)])
            .collect();
        blocks.push(format_table(
            "Most commented movies",
            &["Title", "Comments"],
            rows,
        ));
    }

    println!("{}", blocks.join("\n\n"));
}

fn section_json(data: &DashboardData, section: Section) -> Value {
    let value = match section {
        Section::All => serde_json::to_value(data),
        Section::Counts => serde_json::to_value(data.counts),
        Section::Genres => serde_json::to_value(&data.genres),
        Section::Ratings => serde_json::to_value(&data.yearly_ratings),
        Section::TopRated => serde_json::to_value(&data.top_rated),
        Section::MostCommented => serde_json::to_value(&data.most_commented),
    };
    value.unwrap_or_else(|e| json!({"error": e.to_string()}))
}

fn format_counts(data: &DashboardData) -> String {
    let counts = [
        ("movies", data.counts.movies),
        ("comments", data.counts.comments),
        ("users", data.counts.users),
    ];
    let mut lines = vec![heading("Collections")];
    for (name, n) in counts {
        lines.push(format!(
            "  {:<10}{}",
            name.blue().bold(),
            n.to_string().cyan()
        ));
    }
    lines.join("\n")
}

enum Cell {
    Text(String),
    Int(u64),
    Float(Option<f64>),
}

impl Cell {
    fn plain(&self) -> String {
        match self {
            Cell::Text(s) => s.clone(),
            Cell::Int(n) => n.to_string(),
            Cell::Float(Some(f)) => format!("{f:.2}"),
            Cell::Float(None) => "null".to_string(),
        }
    }

    fn is_numeric(&self) -> bool {
        !matches!(self, Cell::Text(_))
    }

    /// Pad to `width` before colouring; escape codes would throw off the alignment.
    fn render(&self, width: usize) -> String {
        let text = self.plain();
        match self {
            Cell::Text(_) => format!("{text:<width$}").green().to_string(),
            Cell::Float(None) => format!("{text:>width$}").dimmed().to_string(),
            Cell::Int(_) | Cell::Float(Some(_)) => format!("{text:>width$}").cyan().to_string(),
        }
    }
}

fn format_table(title: &str, headers: &[&str], rows: Vec<Vec<Cell>>) -> String {
    let mut lines = vec![heading(title)];
    if rows.is_empty() {
        lines.push(format!("  {}", "(empty)".dimmed()));
        return lines.join("\n");
    }

    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in &rows {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(cell.plain().chars().count());
        }
    }

    let header = headers
        .iter()
        .zip(&widths)
        .enumerate()
        .map(|(i, (h, w))| {
            let numeric = rows[0].get(i).is_some_and(Cell::is_numeric);
            let padded = if numeric {
                format!("{h:>w$}")
            } else {
                format!("{h:<w$}")
            };
            padded.blue().bold().to_string()
        })
        .collect::<Vec<_>>()
        .join("  ");
    lines.push(format!("  {header}"));

    let rule: usize = widths.iter().sum::<usize>() + 2 * (widths.len() - 1);
    lines.push(format!("  {}", "-".repeat(rule).dimmed()));

    for row in &rows {
        let cells = row
            .iter()
            .zip(&widths)
            .map(|(cell, w)| cell.render(*w))
            .collect::<Vec<_>>()
            .join("  ");
        lines.push(format!("  {cells}"));
    }
    lines.join("\n")
}

fn heading(title: &str) -> String {
    title.white().bold().underline().to_string()
}
