//! Human-readable summary of a finished run, printed to stdout.

use std::fmt::{self, Write};
use std::time::Duration;

use sketches_ddsketch::DDSketch;
use yansi::Paint;

use crate::harness::RunOutcome;

/// Prints the summary of all roles that produced a report.
pub fn print(outcome: &RunOutcome) {
    print!("{}", render(outcome));
}

/// Renders the summary of all roles that produced a report.
pub fn render(outcome: &RunOutcome) -> String {
    let mut out = String::new();
    // Writing into a `String` cannot fail.
    write_summary(&mut out, outcome).ok();
    out
}

fn write_summary(out: &mut String, outcome: &RunOutcome) -> fmt::Result {
    if let Some(writer) = &outcome.writer {
        writeln!(
            out,
            "{} ({} iterations, {} keys{})",
            "## WRITER".bold(),
            writer.iterations.blue(),
            writer.keys_written.blue(),
            cancelled_suffix(writer.cancelled)
        )?;
        if writer.latencies.count() > 0 {
            write_rate(out, writer.iterations, "iterations", writer.elapsed)?;
            write_rate(out, writer.keys_written, "keys", writer.elapsed)?;
            write_percentiles(out, &writer.latencies)?;
        }
        writeln!(out)?;
    }

    if let Some(reader) = &outcome.reader {
        writeln!(
            out,
            "{} ({} reads, {} windows{})",
            "## READER".bold(),
            reader.reads.blue(),
            reader.windows.blue(),
            cancelled_suffix(reader.cancelled)
        )?;
        if reader.anomalies > 0 {
            writeln!(
                out,
                "  {}",
                format!("{} lookups did not find exactly one record", reader.anomalies).yellow()
            )?;
        }
        if reader.latencies.count() > 0 {
            write_rate(out, reader.reads, "reads", reader.elapsed)?;
            write_percentiles(out, &reader.latencies)?;
        }
        writeln!(out)?;
    }

    for error in &outcome.errors {
        writeln!(out, "{}", format!("FAILED: {error:#}").bold().red())?;
    }

    Ok(())
}

fn cancelled_suffix(cancelled: bool) -> &'static str {
    if cancelled { ", cancelled" } else { "" }
}

fn write_rate(out: &mut String, count: u64, unit: &str, elapsed: Duration) -> fmt::Result {
    let secs = elapsed.as_secs_f64();
    if secs > 0.0 {
        let per_sec = count as f64 / secs;
        writeln!(out, "  {:.2} {unit}/s", per_sec.bold())
    } else {
        Ok(())
    }
}

fn quantile(sketch: &DDSketch, q: f64) -> Duration {
    let secs = sketch.quantile(q).ok().flatten().unwrap_or_default();
    Duration::from_secs_f64(secs.max(0.0))
}

fn write_percentiles(out: &mut String, sketch: &DDSketch) -> fmt::Result {
    let avg = sketch.sum().unwrap_or_default() / sketch.count() as f64;
    let avg = Duration::from_secs_f64(avg.max(0.0));
    let p50 = quantile(sketch, 0.5);
    let p90 = quantile(sketch, 0.9);
    let p99 = quantile(sketch, 0.99);
    let p9999 = quantile(sketch, 0.9999);
    writeln!(
        out,
        "  avg: {:.2?}; p50: {p50:.2?}; p90: {p90:.2?}; p99: {p99:.2?}; p99.99: {p9999:.2?}",
        avg.bold()
    )
}
