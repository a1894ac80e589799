//! Structural padding ("holes") in aggregate types.
//!
//! Runs on struct nodes during the first pass. It only annotates the node and
//! its members; reference counts are untouched.

use serde::Serialize;

use crate::model::TypeNode;

/// Padding summary for one aggregate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Layout {
    /// Number of gaps between consecutive members.
    pub nr_holes: u32,
    pub sum_holes: u64,
    pub sum_members: u64,
    /// Bytes after the last member up to the node size.
    pub padding: u64,
}

impl Layout {
    pub fn is_packed(&self) -> bool {
        self.nr_holes == 0 && self.padding == 0
    }
}

/// Compute holes between members and trailing padding, storing the per-member
/// hole on each member and the summary on the node.
///
/// Members that overlap their successor (bitfields, unions) contribute no hole.
pub fn find_holes(node: &mut TypeNode) -> Layout {
    let mut layout = Layout::default();
    let mut end = 0u64;

    let count = node.members.len();
    for i in 0..count {
        let member_end = node.members[i].offset.saturating_add(node.members[i].size);
        end = end.max(member_end);
        layout.sum_members = layout.sum_members.saturating_add(node.members[i].size);

        let hole = match node.members.get(i + 1) {
            Some(next) => next.offset.saturating_sub(member_end),
            None => 0,
        };
        node.members[i].hole = hole;
        if hole > 0 {
            layout.nr_holes += 1;
            layout.sum_holes = layout.sum_holes.saturating_add(hole);
        }
    }

    layout.padding = node.size.saturating_sub(end);
    node.layout = Some(layout);
    layout
}
