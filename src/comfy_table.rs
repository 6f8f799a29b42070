use crate::klines::Timeframe;
use crate::scanner::{ScanRecord, ScanResult, ScanStatus};
use chrono::{DateTime, Utc};
use comfy_table::{
    Attribute, Cell, CellAlignment, Color, ContentArrangement, Table, modifiers::UTF8_ROUND_CORNERS,
    presets::UTF8_BORDERS_ONLY,
};

/// Heatmap bucket for a percent change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trend {
    Up,
    Down,
    Flat,
}

impl Trend {
    pub fn of(change_pct: f64) -> Self {
        if change_pct > 0.0 {
            Trend::Up
        } else if change_pct < 0.0 {
            Trend::Down
        } else {
            Trend::Flat
        }
    }

    fn color(self) -> Color {
        match self {
            Trend::Up => Color::Green,
            Trend::Down => Color::Red,
            Trend::Flat => Color::DarkGrey,
        }
    }
}

fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.format("%d-%m-%Y %H:%M:%S").to_string()
}

fn change_cell(record: &ScanRecord, timeframe: Timeframe) -> Cell {
    let change = record.change(timeframe);
    // `*` marks a zero that stands in for a failed or empty fetch
    let marker = if record.is_degraded(timeframe) { "*" } else { "" };
    Cell::new(format!("{:.2} %{}", change, marker))
        .fg(Trend::of(change).color())
        .set_alignment(CellAlignment::Right)
}

pub fn build_table(records: &[ScanRecord]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_BORDERS_ONLY)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Rank").add_attribute(Attribute::Bold),
            Cell::new("Symbol").add_attribute(Attribute::Bold),
            Cell::new("Price ($)")
                .add_attribute(Attribute::Bold)
                .set_alignment(CellAlignment::Right),
            Cell::new("5m %")
                .add_attribute(Attribute::Bold)
                .set_alignment(CellAlignment::Right),
            Cell::new("15m %")
                .add_attribute(Attribute::Bold)
                .set_alignment(CellAlignment::Right),
            Cell::new("1h %")
                .add_attribute(Attribute::Bold)
                .set_alignment(CellAlignment::Right),
        ]);

    for (i, record) in records.iter().enumerate() {
        table.add_row(vec![
            Cell::new(i + 1).fg(Color::DarkGrey),
            Cell::new(&record.inst_id).fg(Color::Cyan),
            Cell::new(format!("$ {:.4}", record.price)).set_alignment(CellAlignment::Right),
            change_cell(record, Timeframe::M5),
            change_cell(record, Timeframe::M15),
            change_cell(record, Timeframe::H1),
        ]);
    }

    table
}

/// Full report for one scan: status line, title and table.
pub fn render(result: &ScanResult) -> String {
    if result.status == ScanStatus::NoInstrumentsFound {
        return "No instruments found. The venue returned no eligible perpetual swaps, try again later."
            .to_string();
    }

    let title = format!("(Data taken at {} UTC)", format_timestamp(result.completed_at));
    let summary = match result.status {
        ScanStatus::Cancelled => format!(
            "Scan cancelled: {} of {} instruments completed.",
            result.len(),
            result.requested
        ),
        _ => format!("Scan complete! {} instruments checked.", result.len()),
    };

    let mut out = format!("\n{}\n{}\n", summary, title);
    if !result.is_empty() {
        out.push_str(&build_table(&result.records).to_string());
        if result.records.iter().any(|r| !r.degraded.is_empty()) {
            out.push_str("\n* no data for this timeframe, shown as 0.00 %");
        }
    }
    out
}
