use std::{collections::BTreeMap, fmt::Display};

use anyhow::Result;
use chrono::{DateTime, Duration, Local, NaiveDate};
use chrono_english::parse_date_string;
use clap::{CommandFactory, Parser, ValueEnum};
use now::DateTimeNow;

use crate::{
    session::{entities::CompletedSessionEntity, history::{HistoryLedger, HistoryLedgerImpl}},
    utils::{
        paths::AppPaths,
        time::{day_key, format_hms, month_key},
    },
};

use super::Args;

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
pub struct ReportCommand {
    #[arg(
        long = "start",
        short,
        help = "Start of the range. Examples are \"yesterday\", \"1 week ago\", \"15/03/2025\""
    )]
    start_date: Option<String>,
    #[arg(
        long = "end",
        short,
        help = "End of the range. Examples are \"yesterday\", \"1 week ago\", \"15/03/2025\""
    )]
    end_date: Option<String>,
    #[arg(long, default_value_t = DateStyle::Uk, help = "Style of dates used during parsing. For Uk it's day/month/year. For Us it's month/day/year")]
    date_style: DateStyle,
    #[arg(long, help = "Write the report to report.txt instead of printing it")]
    save: bool,
}

/// Full-history report, as the interactive menu shows it.
pub async fn render_report(paths: &AppPaths) -> Result<String> {
    let ledger = HistoryLedgerImpl::new(paths.history_file());
    let entries = ledger.read_all().await?;
    Ok(build_report(&entries, Local::now()))
}

/// Writes the full-history report to `report.txt`, returning the path.
pub async fn save_report(paths: &AppPaths) -> Result<std::path::PathBuf> {
    let path = paths.report_file();
    tokio::fs::write(&path, render_report(paths).await?).await?;
    Ok(path)
}

pub async fn process_report_command(paths: &AppPaths, command: ReportCommand) -> Result<()> {
    let ledger = HistoryLedgerImpl::new(paths.history_file());
    let mut entries = ledger.read_all().await?;

    let (start, end) = parse_range(&command)?;
    if let Some(start) = start {
        entries.retain(|e| e.timestamp.with_timezone(&Local) >= start);
    }
    if let Some(end) = end {
        entries.retain(|e| e.timestamp.with_timezone(&Local) <= end);
    }

    let report = build_report(&entries, Local::now());

    if command.save {
        let path = paths.report_file();
        tokio::fs::write(&path, &report).await?;
        println!("Report saved to: {}", path.display());
    } else {
        println!("{report}");
    }
    Ok(())
}

/// Range arguments are taken at day granularity: the start rounds down to the
/// beginning of its day, the end rounds up to the end of its day.
fn parse_range(command: &ReportCommand) -> Result<(Option<DateTime<Local>>, Option<DateTime<Local>>)> {
    let now = Local::now();
    let dialect: chrono_english::Dialect = command.date_style.into();

    let start = match command.start_date.as_deref().map(|s| parse_date_string(s, now, dialect)) {
        Some(Ok(v)) => Some(v.beginning_of_day()),
        Some(Err(e)) => {
            return Err(Args::command()
                .error(
                    clap::error::ErrorKind::ValueValidation,
                    format!("Failed to parse start date {e}"),
                )
                .into());
        }
        None => None,
    };
    let end = match command.end_date.as_deref().map(|s| parse_date_string(s, now, dialect)) {
        Some(Ok(v)) => Some(v.end_of_day()),
        Some(Err(e)) => {
            return Err(Args::command()
                .error(
                    clap::error::ErrorKind::ValueValidation,
                    format!("Failed to parse end date {e}"),
                )
                .into());
        }
        None => None,
    };
    Ok((start, end))
}

fn hours(duration: Duration) -> f64 {
    duration.num_seconds() as f64 / 3600.
}

/// Builds the report text: monthly summary, daily breakdown for the current
/// month, and overall statistics. `now` decides which month counts as current
/// and stamps the header.
pub fn build_report(entries: &[CompletedSessionEntity], now: DateTime<Local>) -> String {
    const RULE: &str = "============================================================";
    const THIN_RULE: &str = "------------------------------------------------------------";

    if entries.is_empty() {
        return "No tracking history found.".into();
    }

    let mut monthly: BTreeMap<String, Duration> = BTreeMap::new();
    let mut daily: BTreeMap<NaiveDate, Duration> = BTreeMap::new();
    for entry in entries {
        let day = day_key(entry.timestamp);
        *monthly.entry(month_key(day)).or_insert_with(Duration::zero) += entry.duration;
        *daily.entry(day).or_insert_with(Duration::zero) += entry.duration;
    }

    let mut report = Vec::new();
    report.push(RULE.to_string());
    report.push("CODING TIME TRACKER - MONTHLY REPORT".into());
    report.push(RULE.into());
    report.push(format!("\nReport Generated: {}\n", now.format("%Y-%m-%d %H:%M:%S")));

    report.push(THIN_RULE.into());
    report.push("MONTHLY SUMMARY".into());
    report.push(THIN_RULE.into());
    for (month, &duration) in monthly.iter().rev() {
        report.push(format!(
            "{month}: {} ({:.2} hours)",
            format_hms(duration),
            hours(duration)
        ));
    }

    let current_month = month_key(now.date_naive());
    let current_days: Vec<_> = daily
        .iter()
        .filter(|(day, _)| month_key(**day) == current_month)
        .collect();
    if !current_days.is_empty() {
        report.push(format!("\n{THIN_RULE}"));
        report.push(format!("DAILY BREAKDOWN - {current_month}"));
        report.push(THIN_RULE.into());
        for (day, &duration) in current_days.iter().rev() {
            report.push(format!(
                "{day}: {} ({:.2} hours)",
                format_hms(duration),
                hours(duration)
            ));
        }
    }

    let total = monthly
        .values()
        .fold(Duration::zero(), |acc, &v| acc + v);
    let average = total / daily.len() as i32;

    report.push(format!("\n{THIN_RULE}"));
    report.push("STATISTICS".into());
    report.push(THIN_RULE.into());
    report.push(format!(
        "Total Time Tracked: {} ({:.2} hours)",
        format_hms(total),
        hours(total)
    ));
    report.push(format!("Total Sessions: {}", entries.len()));
    report.push(format!("Total Days: {}", daily.len()));
    report.push(format!(
        "Average per Day: {} ({:.2} hours)",
        format_hms(average),
        hours(average)
    ));

    report.push(format!("\n{RULE}"));

    report.join("\n")
}
