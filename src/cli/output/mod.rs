pub mod analysis;

use ansi_term::Colour;

use crate::daemon::storage::buckets::DayBuckets;

use analysis::{day_total, peak_buckets, PeakBucket};

const BAR_WIDTH: i64 = 30;

/// What a report prints besides the buckets themselves.
#[derive(Debug, Clone, Copy)]
pub struct ReportLayout {
    pub top: usize,
    /// Only the summary is printed, like a folded panel.
    pub collapsed: bool,
    /// Print every bucket including the empty ones.
    pub show_all: bool,
}

/// One line per bucket: start time, value and a bar proportional to the busiest bucket.
/// Without `show_all` empty buckets are left out.
pub fn render_buckets(buckets: &DayBuckets, show_all: bool) -> Vec<String> {
    let max = buckets
        .values()
        .iter()
        .map(|v| v.abs())
        .max()
        .unwrap_or_default()
        .max(1);

    buckets
        .iter()
        .filter(|(_, value)| show_all || *value != 0)
        .map(|(bucket, value)| {
            let length = (value.abs() * BAR_WIDTH + max - 1) / max;
            let bar = "#".repeat(length as usize);
            let bar = if value < 0 {
                Colour::Red.paint(bar)
            } else {
                Colour::Green.paint(bar)
            };
            format!("{}\t{value:>6}\t{bar}", bucket.label())
        })
        .collect()
}

pub fn format_peaks(peaks: &[PeakBucket]) -> String {
    if peaks.is_empty() {
        return "none".into();
    }
    peaks
        .iter()
        .map(|v| v.label.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn print_report(title: &str, buckets: &DayBuckets, layout: ReportLayout) {
    let peaks = peak_buckets(buckets, layout.top);
    println!(
        "{}\t{:+} words\tpeaks: {}",
        Colour::Cyan.bold().paint(title),
        day_total(buckets),
        format_peaks(&peaks)
    );
    if layout.collapsed && !layout.show_all {
        return;
    }
    for line in render_buckets(buckets, layout.show_all) {
        println!("{line}");
    }
}
