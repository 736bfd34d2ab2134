use std::fmt::Display;

use anyhow::Result;
use chrono::{Local, NaiveDate};
use chrono_english::parse_date_string;
use clap::{CommandFactory, Parser, ValueEnum};

use crate::{
    daemon::storage::entities::{RollingWindow, TrackingState},
    utils::time::date_key,
};

use super::{
    output::{
        analysis::{day_vector, peak_buckets, rolling_average},
        format_peaks, print_report, ReportLayout,
    },
    Args,
};

const DEFAULT_TOP: usize = 3;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum DateStyle {
    Uk,
    Us,
}

impl From<DateStyle> for chrono_english::Dialect {
    fn from(value: DateStyle) -> Self {
        match value {
            DateStyle::Uk => Self::Uk,
            DateStyle::Us => Self::Us,
        }
    }
}

impl Display for DateStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DateStyle::Uk => write!(f, "uk"),
            DateStyle::Us => write!(f, "us"),
        }
    }
}

#[derive(Debug, Parser)]
pub struct DayCommand {
    #[arg(
        long,
        short,
        help = "Day to show. Examples are \"yesterday\", \"2 days ago\", \"15/03/2025\". Defaults to today"
    )]
    date: Option<String>,
    #[arg(long, default_value_t = DateStyle::Uk, help = "Style of dates used during parsing. For Uk it's day/month/year. For Us it's month/day/year")]
    date_style: DateStyle,
    #[arg(short, long, help = "Show every bucket, even when the panel is collapsed")]
    all: bool,
    #[arg(long, default_value_t = DEFAULT_TOP, help = "Number of peak buckets to name")]
    top: usize,
}

#[derive(Debug, Parser)]
pub struct AverageCommand {
    #[arg(long, help = "Days to average over: 7, 14 or 30. Defaults to the configured window")]
    days: Option<RollingWindow>,
    #[arg(short, long, help = "Show every bucket, even when the panel is collapsed")]
    all: bool,
    #[arg(long, default_value_t = DEFAULT_TOP, help = "Number of peak buckets to name")]
    top: usize,
}

#[derive(Debug, Parser)]
pub struct PeaksCommand {
    #[arg(short = 'n', long, default_value_t = DEFAULT_TOP, help = "Number of peak buckets to name")]
    top: usize,
    #[arg(long, help = "Peaks of today instead of the rolling average")]
    today: bool,
    #[arg(long, help = "Days to average over: 7, 14 or 30. Defaults to the configured window")]
    days: Option<RollingWindow>,
}

/// Prints the buckets of a single day.
pub fn process_day_command(
    DayCommand {
        date,
        date_style,
        all,
        top,
    }: DayCommand,
    state: &TrackingState,
) -> Result<()> {
    let date = match date {
        Some(date) => parse_day(&date, date_style)?,
        None => Local::now().date_naive(),
    };

    if !state.days.contains_day(date) {
        println!("No words recorded on {date}");
        return Ok(());
    }
    if !state.days.has_activity_on(date) {
        println!("Notes were saved on {date} but the word count didn't change");
        return Ok(());
    }

    let layout = ReportLayout {
        top,
        collapsed: state.settings.panel_collapsed,
        show_all: all,
    };
    print_report(&date_key(date), &day_vector(&state.days, date), layout);
    Ok(())
}

/// Prints the rolling average ending today.
pub fn process_average_command(
    AverageCommand { days, all, top }: AverageCommand,
    state: &TrackingState,
) -> Result<()> {
    if !state.days.has_any_data() {
        println!("Nothing recorded yet");
        return Ok(());
    }

    let window = days.unwrap_or(state.settings.rolling_window);
    let average = rolling_average(&state.days, Local::now().date_naive(), window.days());
    let layout = ReportLayout {
        top,
        collapsed: state.settings.panel_collapsed,
        show_all: all,
    };
    print_report(&format!("Average over {window}"), &average, layout);
    Ok(())
}

pub fn process_peaks_command(
    PeaksCommand { top, today, days }: PeaksCommand,
    state: &TrackingState,
) -> Result<()> {
    println!("{}", peaks_line(state, Local::now().date_naive(), today, days, top));
    Ok(())
}

fn peaks_line(
    state: &TrackingState,
    today: NaiveDate,
    only_today: bool,
    days: Option<RollingWindow>,
    top: usize,
) -> String {
    let buckets = if only_today {
        day_vector(&state.days, today)
    } else {
        let window = days.unwrap_or(state.settings.rolling_window);
        rolling_average(&state.days, today, window.days())
    };
    format_peaks(&peak_buckets(&buckets, top))
}

fn parse_day(date: &str, date_style: DateStyle) -> Result<NaiveDate> {
    match parse_date_string(date, Local::now(), date_style.into()) {
        Ok(v) => Ok(v.with_timezone(&Local).date_naive()),
        Err(e) => Err(Args::command()
            .error(
                clap::error::ErrorKind::ValueValidation,
                format!("Failed to validate date {date}: {e}"),
            )
            .into()),
    }
}
