//! Recover command - rebuild JSONL records from saved raw completions.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use clap::Args;
use console::style;
use tracing::info;

use invex_core::report::RecordSummary;
use invex_core::sink::write_jsonl;
use invex_core::{InvoiceValidator, RecordValidator, RecoveryParser, assemble_records};

use crate::summary::write_summary;

/// Arguments for the recover command.
#[derive(Args)]
pub struct RecoverArgs {
    /// File of raw completions: one JSON string or one plain line each
    #[arg(required = true)]
    completions: PathBuf,

    /// File of identifiers, one per line, matching the completions
    #[arg(short, long)]
    ids: Option<PathBuf>,

    /// Output JSONL file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Normalize records to the invoice schema
    #[arg(long)]
    validate: bool,

    /// Characters of raw output shown in diagnostics
    #[arg(long, default_value = "500")]
    preview_chars: usize,

    /// Also write a per-record summary CSV
    #[arg(long)]
    summary: Option<PathBuf>,
}

pub async fn run(args: RecoverArgs) -> anyhow::Result<()> {
    let completions = read_completions(&args.completions)?;
    let ids = match &args.ids {
        Some(path) => read_ids(path)?,
        None => (0..completions.len()).map(|i| i.to_string()).collect(),
    };
    info!(
        "Recovering {} completions from {}",
        completions.len(),
        args.completions.display()
    );

    let parser = RecoveryParser::new().with_preview_chars(args.preview_chars);
    let validator = InvoiceValidator::new();
    let validator = if args.validate {
        Some(&validator as &dyn RecordValidator)
    } else {
        None
    };

    let (records, outcomes) = assemble_records(&parser, validator, &completions, &ids)?;

    match &args.output {
        Some(path) => {
            write_jsonl(&records, fs::File::create(path)?)?;
            eprintln!(
                "{} Wrote {} records to {}",
                style("✓").green(),
                records.len(),
                path.display()
            );
        }
        None => {
            write_jsonl(&records, io::stdout().lock())?;
        }
    }

    let parsed = outcomes.iter().filter(|o| o.is_parsed()).count();
    eprintln!(
        "   {} parsed, {} fallback",
        style(parsed).green(),
        style(outcomes.len() - parsed).yellow()
    );

    if let Some(summary_path) = &args.summary {
        let summaries: Vec<RecordSummary> = records
            .iter()
            .zip(&outcomes)
            .map(|(record, outcome)| RecordSummary::from_record(record, outcome))
            .collect();
        write_summary(summary_path, &summaries)?;
        eprintln!(
            "{} Summary written to {}",
            style("✓").green(),
            summary_path.display()
        );
    }

    Ok(())
}

/// Read completions, decoding lines that are JSON strings.
///
/// An empty completion must be written as `""`; blank lines are skipped.
fn read_completions(path: &Path) -> anyhow::Result<Vec<String>> {
    let content = fs::read_to_string(path)?;
    Ok(non_blank_lines(&content).map(decode_line).collect())
}

fn decode_line(line: &str) -> String {
    match serde_json::from_str::<String>(line) {
        Ok(decoded) => decoded,
        Err(_) => line.to_string(),
    }
}

fn read_ids(path: &Path) -> anyhow::Result<Vec<String>> {
    let content = fs::read_to_string(path)?;
    Ok(non_blank_lines(&content)
        .map(|line| line.trim().to_string())
        .collect())
}

/// Both input files skip blank lines so rows stay aligned.
fn non_blank_lines(content: &str) -> impl Iterator<Item = &str> {
    content.lines().filter(|line| !line.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_line() {
        assert_eq!(decode_line(r#""{\"total\": 1}\nthanks""#), "{\"total\": 1}\nthanks");
        assert_eq!(decode_line("{\"total\": 1}"), "{\"total\": 1}");
        assert_eq!(decode_line("plain text"), "plain text");
    }

    #[test]
    fn test_blank_lines_skipped_in_both_files() {
        let dir = tempfile::tempdir().unwrap();
        let completions = dir.path().join("completions.txt");
        let ids = dir.path().join("ids.txt");
        fs::write(&completions, "{\"total\": 1}\n\n   \n\"\"\n").unwrap();
        fs::write(&ids, "a\n\n   \n b \n").unwrap();

        assert_eq!(
            read_completions(&completions).unwrap(),
            vec!["{\"total\": 1}".to_string(), String::new()]
        );
        assert_eq!(read_ids(&ids).unwrap(), vec!["a", "b"]);
    }
}
