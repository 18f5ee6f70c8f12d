use std::io::{self, Write};

use barvault_core::{IngestReport, RunOutcome};
use serde::Serialize;

use crate::cli::OutputFormat;
use crate::commands::{CommandOutput, InspectView};
use crate::error::CliError;

/// Write the command result to stdout. Nothing else may write there, so
/// `--format json` output parses as a single document.
pub fn render(output: &CommandOutput, format: OutputFormat, pretty: bool) -> Result<(), CliError> {
    let stdout = io::stdout();
    render_to(&mut stdout.lock(), output, format, pretty)
}

fn render_to(
    out: &mut impl Write,
    output: &CommandOutput,
    format: OutputFormat,
    pretty: bool,
) -> Result<(), CliError> {
    match (output, format) {
        (CommandOutput::Ingest(report), OutputFormat::Json) => write_json(out, report, pretty),
        (CommandOutput::Inspect(view), OutputFormat::Json) => write_json(out, view, pretty),
        (CommandOutput::Ingest(report), OutputFormat::Table) => {
            Ok(out.write_all(report_text(report).as_bytes())?)
        }
        (CommandOutput::Inspect(view), OutputFormat::Table) => {
            Ok(out.write_all(inspect_text(view).as_bytes())?)
        }
    }
}

fn write_json<T: Serialize>(out: &mut impl Write, value: &T, pretty: bool) -> Result<(), CliError> {
    if pretty {
        serde_json::to_writer_pretty(&mut *out, value)?;
    } else {
        serde_json::to_writer(&mut *out, value)?;
    }
    writeln!(out)?;
    Ok(())
}

fn report_text(report: &IngestReport) -> String {
    let mut text = String::new();
    match report.outcome {
        RunOutcome::Completed => text.push_str("run completed\n"),
        RunOutcome::Aborted { reason } => text.push_str(&format!("run aborted: {reason}\n")),
    }
    text.push_str(&format!("saved: {}\n", report.saved));
    text.push_str(&format!("not saved: {}\n", report.not_saved.len()));
    for entry in &report.not_saved {
        text.push_str(&format!(
            "  {:<8} {:<8} {}\n",
            entry.seed.symbol,
            entry.seed.exchange,
            entry.reason.as_str()
        ));
    }
    text
}

fn inspect_text(view: &InspectView) -> String {
    let mut text = format!(
        "{}\ninstruments: {}\nbars: {}\norphan bars: {}\ncandlestick index: {}\n",
        view.db_path,
        view.counts.instruments,
        view.counts.bars,
        view.counts.orphan_bars,
        if view.candlestick_index { "present" } else { "missing" },
    );
    for entry in &view.instruments {
        text.push_str(&format!(
            "\n{} {} ({})\n",
            entry.instrument.symbol, entry.instrument.exchange, entry.instrument.id
        ));
        for bar in &entry.latest {
            text.push_str(&format!(
                "  {}  o={:.2} h={:.2} l={:.2} c={:.2} v={}\n",
                bar.start, bar.open, bar.high, bar.low, bar.close, bar.volume
            ));
        }
    }
    text
}
