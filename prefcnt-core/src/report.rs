//! Output formatting - plaintext and JSON.

use serde_json::json;
use std::io::{self, Write};

use crate::lost::{LostTypeReport, ReportStats};
use crate::model::DebugInfo;
use crate::printer::print_node;

/// Write every lost type with the node printer, then a summary line.
pub fn write_plain<W: Write>(
    out: &mut W,
    debug_info: &DebugInfo,
    report: &LostTypeReport,
) -> io::Result<()> {
    for lost in &report.lost {
        let (unit_idx, idx) = lost.location;
        let unit = &debug_info.units()[unit_idx];
        print_node(out, unit, unit.node(idx))?;
    }

    let stats = &report.stats;
    writeln!(
        out,
        "/* lost types: {} of {} in {} unit(s), {} function(s) walked */",
        stats.lost, stats.types, stats.units, stats.functions_walked
    )
}

/// Prints the report in plain text format to stdout.
pub fn print_plain(debug_info: &DebugInfo, report: &LostTypeReport) -> io::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    write_plain(&mut out, debug_info, report)
}

/// Prints the report in JSON format.
///
/// Falls back to printing just the statistics if serialization fails.
pub fn print_json(report: &LostTypeReport) {
    match serde_json::to_string_pretty(report) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("[WARN] JSON serialization failed: {}", e);
            println!("{}", stats_only(&report.stats));
        }
    }
}

/// Report with an empty lost list, built from the counters alone.
fn stats_only(stats: &ReportStats) -> serde_json::Value {
    json!({
        "lost": [],
        "stats": {
            "units": stats.units,
            "types": stats.types,
            "functions_walked": stats.functions_walked,
            "inlined_skipped": stats.inlined_skipped,
            "structs_laid_out": stats.structs_laid_out,
            "refcnt_increments": stats.refcnt_increments,
            "lost": stats.lost,
            "ignored": stats.ignored,
        }
    })
}
