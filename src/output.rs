use std::io::{self, Write};

use serde::Serialize;

use crate::app::{ExportReport, HarvestReport, MergeReport, ProgressEvent, ProgressSink};
use crate::store::StoredEntry;

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Interactive,
    NonInteractive,
}

/// Narrates progress line by line on stdout.
pub struct ConsoleOutput;

impl ConsoleOutput {
    pub fn format_event(event: &ProgressEvent) -> String {
        match event.elapsed {
            Some(elapsed) => format!("{} ({:.1}s)", event.message, elapsed.as_secs_f64()),
            None => event.message.clone(),
        }
    }

    pub fn print_harvest(report: &HarvestReport) {
        println!("Harvest summary");
        for summary in &report.extractors {
            println!(
                "  {:<10} stored {:>6}  known {:>6}  skipped {:>6}",
                summary.source.to_string(),
                summary.stored,
                summary.known,
                summary.skipped
            );
        }
        Self::print_export(&report.export);
    }

    pub fn print_export(report: &ExportReport) {
        println!(
            "{} ontologies in {} and {}",
            report.rows, report.csv_path, report.jsonl_path
        );
    }

    pub fn print_lookup(entry: &StoredEntry) -> io::Result<()> {
        JsonOutput::print_json(entry)
    }
}

impl ProgressSink for ConsoleOutput {
    fn event(&self, event: ProgressEvent) {
        println!("{}", Self::format_event(&event));
    }
}

/// Prints a single JSON document at the end; progress is dropped.
pub struct JsonOutput;

impl JsonOutput {
    pub fn print_harvest(report: &HarvestReport) -> io::Result<()> {
        Self::print_json(report)
    }

    pub fn print_merge(report: &MergeReport) -> io::Result<()> {
        Self::print_json(report)
    }

    pub fn print_export(report: &ExportReport) -> io::Result<()> {
        Self::print_json(report)
    }

    pub fn print_lookup(entry: &StoredEntry) -> io::Result<()> {
        Self::print_json(entry)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

impl ProgressSink for JsonOutput {
    fn event(&self, _event: ProgressEvent) {}
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn elapsed_time_is_appended() {
        assert_eq!(ConsoleOutput::format_event(&ProgressEvent::new("done")), "done");
        assert_eq!(
            ConsoleOutput::format_event(&ProgressEvent::timed(
                "export",
                Duration::from_millis(1500)
            )),
            "export (1.5s)"
        );
    }
}
