//! Seam between the analysis and whatever produces the debug-info graph.

use std::path::Path;

use crate::error::PrefcntResult;
use crate::model::DebugInfo;

/// Source of a debug-info graph.
///
/// `open` fails when the source is absent or unreadable, `load` when it cannot
/// be turned into a graph. Once loaded, units are enumerated with
/// [`DebugInfo::for_each_translation_unit`], nodes with
/// [`TranslationUnit::for_each_type_node`](crate::model::TranslationUnit::for_each_type_node)
/// and ids resolved with
/// [`TranslationUnit::resolve_type`](crate::model::TranslationUnit::resolve_type).
pub trait GraphProvider: Sized {
    fn open(source: &Path) -> PrefcntResult<Self>;

    fn load(self) -> PrefcntResult<DebugInfo>;

    /// Open and load in one step.
    fn read(source: &Path) -> PrefcntResult<DebugInfo> {
        Self::open(source)?.load()
    }
}
