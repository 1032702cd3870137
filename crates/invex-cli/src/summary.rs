//! Console and CSV output of batch reports.

use std::path::Path;

use chrono::Local;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

use invex_core::report::{BatchReport, RecordSummary};

/// Spinner shown while a batch runs.
pub fn spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(template) =
        ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")
    {
        pb.set_style(template);
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(120));
    pb
}

pub fn print_report(report: &BatchReport, location: &str) {
    let started = report.started_at.with_timezone(&Local);

    println!();
    println!(
        "{} Processed {} images with {} in {:.1}s (started {})",
        style("✓").green(),
        report.total(),
        report.model,
        report.elapsed().num_milliseconds() as f64 / 1000.0,
        started.format("%Y-%m-%d %H:%M:%S")
    );
    println!(
        "   {} parsed, {} fallback, {} skipped of {} listed",
        style(report.parsed).green(),
        style(report.fallback).yellow(),
        style(report.skipped.len()).red(),
        report.listed
    );
    if let Some(tokens) = report.tokens {
        println!("   {} tokens generated", tokens);
    }

    match &report.output_key {
        Some(key) => println!("   Output: {}/{}", location, key),
        None => println!(
            "{} No images found, nothing was written",
            style("ℹ").blue()
        ),
    }

    let fallbacks: Vec<&RecordSummary> = report
        .records
        .iter()
        .filter(|r| r.reason.is_some())
        .collect();
    if !fallbacks.is_empty() {
        println!();
        println!("{}", style("Unparsed outputs:").yellow());
        for record in fallbacks {
            println!(
                "  - {}: {}",
                record.id,
                record.reason.as_deref().unwrap_or("unknown error")
            );
        }
    }

    if !report.skipped.is_empty() {
        println!();
        println!("{}", style("Skipped objects:").red());
        for skipped in &report.skipped {
            println!("  - {}: {}", skipped.key, skipped.reason);
        }
    }
}

/// Write one CSV row per output record.
pub fn write_summary(path: &Path, records: &[RecordSummary]) -> anyhow::Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;

    wtr.write_record([
        "id",
        "status",
        "invoice_number",
        "total",
        "currency",
        "error",
    ])?;

    for record in records {
        wtr.write_record([
            record.id.as_str(),
            record.status.as_str(),
            record.invoice_number.as_deref().unwrap_or(""),
            record.total.as_deref().unwrap_or(""),
            record.currency.as_deref().unwrap_or(""),
            record.reason.as_deref().unwrap_or(""),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}
