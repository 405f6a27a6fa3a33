use crate::counts::PlayCounts;
use std::cmp::Ordering;

pub const DEFAULT_CHART_LEN: usize = 10;
const BAR_WIDTH: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartKind {
    Tracks,
    Playlists,
}

impl ChartKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::Tracks => "Most played tracks",
            Self::Playlists => "Most played playlists",
        }
    }

    pub fn toggle(self) -> Self {
        match self {
            Self::Tracks => Self::Playlists,
            Self::Playlists => Self::Tracks,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankedEntry {
    pub name: String,
    pub plays: u64,
}

/// The `limit` most played entries, most played first; ties go by name.
/// Entries that were never played are left out.
pub fn rank(counts: &PlayCounts, limit: usize) -> Vec<RankedEntry> {
    let mut rows: Vec<RankedEntry> = counts
        .iter()
        .filter(|(_, plays)| *plays > 0)
        .map(|(name, plays)| RankedEntry {
            name: name.to_string(),
            plays,
        })
        .collect();
    rows.sort_by(compare_rows);
    rows.truncate(limit);
    rows
}

fn compare_rows(a: &RankedEntry, b: &RankedEntry) -> Ordering {
    b.plays
        .cmp(&a.plays)
        .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
}

/// One line per entry: rank, name padded to the bar column, a bar scaled to
/// the top entry and the raw count.
pub fn render_chart(kind: ChartKind, rows: &[RankedEntry]) -> String {
    let mut out = format!("{}\n", kind.label());
    if rows.is_empty() {
        out.push_str("  nothing played yet\n");
        return out;
    }

    let top = rows.iter().map(|row| row.plays).max().unwrap_or(1).max(1);
    for (index, row) in rows.iter().enumerate() {
        let filled = ((row.plays * BAR_WIDTH as u64) / top) as usize;
        let bar = "█".repeat(filled.max(1));
        out.push_str(&format!(
            "{:2}. {:<20} {:<20} {} plays\n",
            index + 1,
            truncate(&row.name, 20),
            bar,
            row.plays
        ));
    }
    out
}

fn truncate(name: &str, width: usize) -> String {
    if name.chars().count() <= width {
        return name.to_string();
    }
    let mut short: String = name.chars().take(width.saturating_sub(1)).collect();
    short.push('…');
    short
}
