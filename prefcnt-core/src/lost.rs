//! Lost-type sweep: nodes no function root ever reached.
//!
//! Runs after the marker pass over every unit. A node is lost when its
//! `refcnt` is still zero and it has a declaration file; nodes without one are
//! compiler or system synthesized and never reported.

use serde::Serialize;
use std::convert::Infallible;
use std::path::PathBuf;

use crate::layout::Layout;
use crate::model::{DebugInfo, NodeIndex, Tag, TypeId, TypeNode};
use crate::refcnt::UnitStats;

/// A type declared in some source file but never referenced.
#[derive(Debug, Clone, Serialize)]
pub struct LostType {
    pub unit: String,
    pub id: TypeId,
    pub name: Option<String>,
    pub tag: Tag,
    pub decl_file: PathBuf,
    pub decl_line: u32,
    pub size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub layout: Option<Layout>,
    /// Position of the unit and node in the graph, for printing.
    #[serde(skip)]
    pub location: (usize, NodeIndex),
}

/// Totals over the whole run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReportStats {
    pub units: usize,
    pub types: usize,
    pub functions_walked: usize,
    pub inlined_skipped: usize,
    pub structs_laid_out: usize,
    pub refcnt_increments: u64,
    pub lost: usize,
    /// Lost types left out by ignore patterns.
    pub ignored: usize,
}

/// Result of the lost-type sweep.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LostTypeReport {
    pub lost: Vec<LostType>,
    pub stats: ReportStats,
}

/// Whether a type name contains any of the ignore patterns.
pub fn is_ignored(name: &str, ignore: &[String]) -> bool {
    ignore.iter().any(|p| name.contains(p.as_str()))
}

/// Whether a node counts as lost.
pub fn is_lost(node: &TypeNode) -> bool {
    node.refcnt == 0 && node.decl_file.is_some()
}

/// Sweep every node of every unit in provider order.
pub fn find_lost(debug_info: &DebugInfo, totals: &UnitStats, ignore: &[String]) -> LostTypeReport {
    let mut report = LostTypeReport {
        lost: Vec::new(),
        stats: ReportStats {
            units: debug_info.units().len(),
            types: debug_info.type_count(),
            functions_walked: totals.functions_walked,
            inlined_skipped: totals.inlined_skipped,
            structs_laid_out: totals.structs_laid_out,
            refcnt_increments: totals.increments,
            ..ReportStats::default()
        },
    };

    for (unit_idx, unit) in debug_info.units().iter().enumerate() {
        let swept = unit.for_each_type_node(|idx, node| {
            let Some(decl_file) = node.decl_file.as_ref().filter(|_| is_lost(node)) else {
                return Ok(());
            };
            if node.name.as_deref().is_some_and(|name| is_ignored(name, ignore)) {
                report.stats.ignored += 1;
                return Ok(());
            }
            report.lost.push(LostType {
                unit: unit.name().to_string(),
                id: node.id,
                name: node.name.clone(),
                tag: node.tag,
                decl_file: decl_file.clone(),
                decl_line: node.decl_line,
                size: node.size,
                layout: node.layout,
                location: (unit_idx, idx),
            });
            Ok::<_, Infallible>(())
        });
        if let Err(never) = swept {
            match never {}
        }
    }

    report.stats.lost = report.lost.len();
    report
}
