//! Builder pattern API for prefcnt analysis.
//!
//! ```rust,ignore
//! use prefcnt_core::prelude::*;
//!
//! let analysis = Prefcnt::new("vmlinux.json")
//!     .ignore_patterns(["__va_list_tag"])
//!     .analyze()?;
//!
//! for lost in &analysis.report.lost {
//!     println!("lost: {:?} in {}", lost.name, lost.unit);
//! }
//! ```

use std::path::PathBuf;

use tracing::info;

use crate::config::PrefcntConfig;
use crate::dump::DumpFile;
use crate::error::PrefcntResult;
use crate::lost::{find_lost, LostTypeReport};
use crate::model::DebugInfo;
use crate::provider::GraphProvider;
use crate::refcnt::{refcnt_all, RefcntOptions};

/// Builder for configuring a lost-type analysis.
#[derive(Debug, Clone)]
pub struct Prefcnt {
    /// Input graph dump
    input: PathBuf,

    /// Marker tunables
    options: RefcntOptions,

    /// Type name patterns to leave out of the report
    ignored_patterns: Vec<String>,
}

/// Loaded graph with the counters and the lost-type report.
#[derive(Debug)]
pub struct Analysis {
    pub debug_info: DebugInfo,
    pub report: LostTypeReport,
}

impl Prefcnt {
    pub fn new(input: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            options: RefcntOptions::default(),
            ignored_patterns: Vec::new(),
        }
    }

    /// Apply settings from a loaded prefcnt.toml.
    pub fn with_config(mut self, config: &PrefcntConfig) -> Self {
        self.options = config.refcnt_options();
        self.ignored_patterns
            .extend(config.ignore_patterns().iter().cloned());
        self
    }

    pub fn max_unguarded_depth(mut self, depth: usize) -> Self {
        self.options.max_unguarded_depth = depth;
        self
    }

    /// Add patterns for type names to ignore.
    pub fn ignore_patterns(mut self, patterns: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.ignored_patterns.extend(patterns.into_iter().map(Into::into));
        self
    }

    /// Read the input dump and run both passes.
    pub fn analyze(&self) -> PrefcntResult<Analysis> {
        let debug_info = DumpFile::read(&self.input)?;
        self.analyze_graph(debug_info)
    }

    /// Run both passes over a graph supplied by any provider.
    pub fn analyze_graph(&self, mut debug_info: DebugInfo) -> PrefcntResult<Analysis> {
        let totals = refcnt_all(&mut debug_info, self.options)?;
        let report = find_lost(&debug_info, &totals, &self.ignored_patterns);

        info!(
            input = %debug_info.source().display(),
            units = report.stats.units,
            types = report.stats.types,
            lost = report.stats.lost,
            "lost-type analysis complete"
        );

        Ok(Analysis { debug_info, report })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Member, Tag, TranslationUnit, TypeId, TypeNode};

    #[test]
    fn test_builder_applies_config() {
        let config: PrefcntConfig =
            toml::from_str("ignore = [\"x\"]\nmax_unguarded_depth = 9").unwrap();
        let builder = Prefcnt::new("in.json").with_config(&config).ignore_patterns(["y"]);
        assert_eq!(builder.options.max_unguarded_depth, 9);
        assert_eq!(builder.ignored_patterns, vec!["x".to_string(), "y".to_string()]);
    }

    #[test]
    fn test_analyze_graph_from_other_provider() {
        let mut unit = TranslationUnit::new("a.c");
        unit.add_type(TypeNode::new(TypeId(1), Tag::Struct).named("used").declared_at("a.h", 1));
        unit.add_type(TypeNode::new(TypeId(2), Tag::Struct).named("unused").declared_at("a.h", 5));
        unit.add_type(
            TypeNode::new(TypeId(3), Tag::Function)
                .named("main")
                .declared_at("a.c", 9)
                .with_member(Member::new("u", Some(TypeId(1)))),
        );
        let mut debug_info = DebugInfo::new("memory");
        debug_info.push_unit(unit);

        let analysis = Prefcnt::new("unused").analyze_graph(debug_info).unwrap();
        let names: Vec<_> = analysis
            .report
            .lost
            .iter()
            .filter_map(|l| l.name.as_deref())
            .collect();
        assert_eq!(names, vec!["unused"]);
    }
}
