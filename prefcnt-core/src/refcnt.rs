//! Reference counting of types reachable from live functions.
//!
//! Every function that is not an inlined definition is a root. From a root the
//! walk follows the underlying type, struct/union members, function
//! parameters, locals and inline expansions, incrementing `refcnt` on every
//! node it enters. Entering the same node along two paths counts twice.
//!
//! Only aggregate members carry a visited flag, and it is never cleared, so
//! each member forwards the walk at most once per run. That flag is what
//! breaks cycles such as `struct a { struct b *b; }; struct b { struct a *a; }`.
//! The remaining edges are unguarded; chains of them are expected to be short
//! and acyclic (qualifier/pointer/typedef chains), and the walk fails with
//! [`PrefcntError::UnguardedChain`] once one grows past `max_unguarded_depth`.
//!
//! The walk runs on an explicit stack. Children are pushed in reverse so they
//! pop in the order a recursive walk would visit them.

#[cfg(feature = "parallel")]
use rayon::prelude::*;
use tracing::debug;

use crate::error::{PrefcntError, PrefcntResult};
use crate::layout::find_holes;
use crate::logging::unit_span;
use crate::model::{DebugInfo, NodeIndex, Tag, TranslationUnit, VariableIndex};

/// Default bound on consecutive unguarded edges.
pub const DEFAULT_MAX_UNGUARDED_DEPTH: usize = 4096;

/// Tunables for the marker pass.
#[derive(Debug, Clone, Copy)]
pub struct RefcntOptions {
    pub max_unguarded_depth: usize,
}

impl Default for RefcntOptions {
    fn default() -> Self {
        Self {
            max_unguarded_depth: DEFAULT_MAX_UNGUARDED_DEPTH,
        }
    }
}

/// Counters collected while walking one translation unit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UnitStats {
    pub types: usize,
    pub functions_walked: usize,
    pub inlined_skipped: usize,
    pub structs_laid_out: usize,
    /// Total `refcnt` increments.
    pub increments: u64,
}

impl UnitStats {
    pub fn merge(&mut self, other: &UnitStats) {
        self.types += other.types;
        self.functions_walked += other.functions_walked;
        self.inlined_skipped += other.inlined_skipped;
        self.structs_laid_out += other.structs_laid_out;
        self.increments += other.increments;
    }
}

/// One pending piece of the walk.
///
/// `depth` counts unguarded edges followed since the root or the last member.
#[derive(Debug, Clone, Copy)]
enum Step {
    Type { node: NodeIndex, depth: usize },
    Member { owner: NodeIndex, slot: usize },
    Parameter { owner: NodeIndex, slot: usize, depth: usize },
    Variable { var: VariableIndex, depth: usize },
    InlineExpansion { owner: NodeIndex, slot: usize, depth: usize },
}

/// Marker bound to one translation unit.
pub struct RefCounter<'u> {
    unit: &'u mut TranslationUnit,
    stack: Vec<Step>,
    options: RefcntOptions,
    increments: u64,
}

impl<'u> RefCounter<'u> {
    pub fn new(unit: &'u mut TranslationUnit) -> Self {
        Self::with_options(unit, RefcntOptions::default())
    }

    pub fn with_options(unit: &'u mut TranslationUnit, options: RefcntOptions) -> Self {
        Self {
            unit,
            stack: Vec::new(),
            options,
            increments: 0,
        }
    }

    /// Number of `refcnt` increments performed so far.
    pub fn increments(&self) -> u64 {
        self.increments
    }

    /// Walk from a function root.
    ///
    /// Inlined definitions are skipped without side effects; they are reached
    /// through the inline expansions of whichever function executes them.
    /// Returns whether the function was walked.
    pub fn mark_function(&mut self, function: NodeIndex) -> PrefcntResult<bool> {
        let node = self.unit.node(function);
        if node.tag != Tag::Function {
            return Err(PrefcntError::invalid_argument(format!(
                "{} in {} is a {}, not a function",
                node.display_name(),
                self.unit.name(),
                node.tag
            )));
        }
        if node.inlined {
            return Ok(false);
        }

        self.mark_type(function)?;
        Ok(true)
    }

    /// Count `node` and everything reachable from it.
    pub fn mark_type(&mut self, node: NodeIndex) -> PrefcntResult<()> {
        self.stack.clear();
        self.stack.push(Step::Type { node, depth: 0 });

        while let Some(step) = self.stack.pop() {
            match step {
                Step::Type { node, depth } => self.enter_type(node, depth)?,
                Step::Member { owner, slot } => self.mark_member(owner, slot),
                Step::Parameter { owner, slot, depth } => self.mark_parameter(owner, slot, depth),
                Step::Variable { var, depth } => self.mark_variable(var, depth),
                Step::InlineExpansion { owner, slot, depth } => {
                    self.mark_inline_expansion(owner, slot, depth)?
                }
            }
        }

        Ok(())
    }

    fn enter_type(&mut self, idx: NodeIndex, depth: usize) -> PrefcntResult<()> {
        if depth > self.options.max_unguarded_depth {
            return Err(PrefcntError::UnguardedChain {
                unit: self.unit.name().to_string(),
                id: self.unit.node(idx).id,
                depth: self.options.max_unguarded_depth,
            });
        }

        self.unit.node_mut(idx).refcnt += 1;
        self.increments += 1;

        let unit = &*self.unit;
        let node = unit.node(idx);
        let next = depth + 1;

        // Reverse of visiting order: inline expansions, locals, members, underlying type.
        for slot in (0..node.inline_expansions.len()).rev() {
            self.stack.push(Step::InlineExpansion { owner: idx, slot, depth: next });
        }
        for &var in node.variables.iter().rev() {
            self.stack.push(Step::Variable { var, depth: next });
        }
        match node.tag {
            Tag::Struct | Tag::Union => {
                for slot in (0..node.members.len()).rev() {
                    self.stack.push(Step::Member { owner: idx, slot });
                }
            }
            Tag::Function => {
                for slot in (0..node.members.len()).rev() {
                    self.stack.push(Step::Parameter { owner: idx, slot, depth: next });
                }
            }
            _ => {}
        }
        if let Some(target) = unit.resolve(node.type_ref) {
            self.stack.push(Step::Type { node: target, depth: next });
        }

        Ok(())
    }

    /// Aggregate field: forwards the walk only the first time it is reached.
    fn mark_member(&mut self, owner: NodeIndex, slot: usize) {
        let member = &mut self.unit.node_mut(owner).members[slot];
        if member.visited {
            return;
        }
        member.visited = true;
        let type_ref = member.type_ref;

        if let Some(target) = self.unit.resolve(type_ref) {
            self.stack.push(Step::Type { node: target, depth: 0 });
        }
    }

    /// Function parameter: no visited flag, re-walked on every visit of its function.
    fn mark_parameter(&mut self, owner: NodeIndex, slot: usize, depth: usize) {
        let type_ref = self.unit.node(owner).members[slot].type_ref;
        if let Some(target) = self.unit.resolve(type_ref) {
            self.stack.push(Step::Type { node: target, depth });
        }
    }

    fn mark_variable(&mut self, var: VariableIndex, depth: usize) {
        let type_ref = self.unit.variable(var).type_ref;
        if let Some(target) = self.unit.resolve(type_ref) {
            self.stack.push(Step::Type { node: target, depth });
        }
    }

    /// An expansion only carries a reference when the producer recorded one,
    /// so a dangling reference is a malformed graph.
    fn mark_inline_expansion(
        &mut self,
        owner: NodeIndex,
        slot: usize,
        depth: usize,
    ) -> PrefcntResult<()> {
        let node = self.unit.node(owner);
        let Some(id) = node.inline_expansions[slot].type_ref else {
            return Ok(());
        };
        let Some(target) = self.unit.resolve_type(id) else {
            return Err(PrefcntError::malformed(
                self.unit.name(),
                format!(
                    "inline expansion in {} refers to unknown type {}",
                    node.display_name(),
                    id
                ),
            ));
        };

        self.stack.push(Step::Type { node: target, depth });
        Ok(())
    }
}

/// First pass over one unit: lay out structs and walk every function root,
/// in provider order.
pub fn refcnt_unit(unit: &mut TranslationUnit, options: RefcntOptions) -> PrefcntResult<UnitStats> {
    let span = unit_span(unit.name());
    let _guard = span.enter();

    let mut stats = UnitStats {
        types: unit.type_count(),
        ..UnitStats::default()
    };

    let indices: Vec<NodeIndex> = unit.node_indices().collect();
    let mut counter = RefCounter::with_options(unit, options);
    for idx in indices {
        let tag = counter.unit.node(idx).tag;
        match tag {
            Tag::Struct => {
                find_holes(counter.unit.node_mut(idx));
                stats.structs_laid_out += 1;
            }
            Tag::Function => {
                if counter.mark_function(idx)? {
                    stats.functions_walked += 1;
                } else {
                    stats.inlined_skipped += 1;
                }
            }
            _ => {}
        }
    }
    stats.increments = counter.increments();

    debug!(
        types = stats.types,
        functions = stats.functions_walked,
        inlined = stats.inlined_skipped,
        increments = stats.increments,
        "reference-counted translation unit"
    );

    Ok(stats)
}

/// First pass over every unit. Units share no references, so with the
/// `parallel` feature each is walked by its own rayon task.
pub fn refcnt_all(debug_info: &mut DebugInfo, options: RefcntOptions) -> PrefcntResult<UnitStats> {
    #[cfg(feature = "parallel")]
    let per_unit: Vec<UnitStats> = debug_info
        .units_mut()
        .par_iter_mut()
        .map(|unit| refcnt_unit(unit, options))
        .collect::<PrefcntResult<_>>()?;

    #[cfg(not(feature = "parallel"))]
    let per_unit: Vec<UnitStats> = {
        let mut per_unit = Vec::with_capacity(debug_info.units().len());
        debug_info.for_each_translation_unit(|unit| {
            per_unit.push(refcnt_unit(unit, options)?);
            Ok::<_, PrefcntError>(())
        })?;
        per_unit
    };

    let mut total = UnitStats::default();
    for stats in &per_unit {
        total.merge(stats);
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{InlineExpansion, Member, TypeId, TypeNode, Variable};

    fn refcnt(unit: &TranslationUnit, id: u64) -> u64 {
        unit.find(TypeId(id)).map(|n| n.refcnt).unwrap()
    }

    /// A <-> B through members, C(function) takes an A.
    fn two_cycle() -> (TranslationUnit, NodeIndex) {
        let mut unit = TranslationUnit::new("cycle.c");
        unit.add_type(
            TypeNode::new(TypeId(1), Tag::Struct)
                .named("a")
                .with_member(Member::new("b", Some(TypeId(2)))),
        );
        unit.add_type(
            TypeNode::new(TypeId(2), Tag::Struct)
                .named("b")
                .with_member(Member::new("a", Some(TypeId(1)))),
        );
        let c = unit.add_type(
            TypeNode::new(TypeId(3), Tag::Function)
                .named("c")
                .with_member(Member::new("arg", Some(TypeId(1)))),
        );
        (unit, c)
    }

    #[test]
    fn test_member_cycle_terminates() {
        let (mut unit, c) = two_cycle();
        assert!(RefCounter::new(&mut unit).mark_function(c).unwrap());

        assert_eq!(refcnt(&unit, 3), 1);
        // Once via c's parameter, once via b's member which is still unvisited.
        assert_eq!(refcnt(&unit, 1), 2);
        assert_eq!(refcnt(&unit, 2), 1);
        assert!(unit.find(TypeId(1)).unwrap().members[0].visited);
        assert!(unit.find(TypeId(2)).unwrap().members[0].visited);
    }

    #[test]
    fn test_void_function_touches_only_itself() {
        let mut unit = TranslationUnit::new("d.c");
        let other = unit.add_type(TypeNode::new(TypeId(1), Tag::Base).named("int"));
        let d = unit.add_type(TypeNode::new(TypeId(2), Tag::Function).named("d"));

        let mut counter = RefCounter::new(&mut unit);
        counter.mark_function(d).unwrap();
        assert_eq!(counter.increments(), 1);

        assert_eq!(unit.node(d).refcnt, 1);
        assert_eq!(unit.node(other).refcnt, 0);
    }

    #[test]
    fn test_inlined_function_is_not_a_root() {
        let mut unit = TranslationUnit::new("inl.c");
        unit.add_type(TypeNode::new(TypeId(1), Tag::Base).named("int"));
        let f = unit.add_type(
            TypeNode::new(TypeId(2), Tag::Function)
                .with_type(TypeId(1))
                .inlined(true),
        );

        assert!(!RefCounter::new(&mut unit).mark_function(f).unwrap());
        assert_eq!(unit.node(f).refcnt, 0);
        assert_eq!(refcnt(&unit, 1), 0);
    }

    #[test]
    fn test_inline_expansion_reaches_inlined_definition() {
        let mut unit = TranslationUnit::new("inl.c");
        unit.add_type(TypeNode::new(TypeId(1), Tag::Base).named("int"));
        unit.add_type(
            TypeNode::new(TypeId(2), Tag::Function)
                .named("helper")
                .with_type(TypeId(1))
                .inlined(true),
        );
        let caller = unit.add_type(
            TypeNode::new(TypeId(3), Tag::Function)
                .named("caller")
                .with_inline_expansion(InlineExpansion::new(Some(TypeId(2)))),
        );

        RefCounter::new(&mut unit).mark_function(caller).unwrap();
        assert_eq!(refcnt(&unit, 3), 1);
        assert_eq!(refcnt(&unit, 2), 1);
        assert_eq!(refcnt(&unit, 1), 1);
    }

    #[test]
    fn test_dangling_inline_expansion_is_malformed() {
        let mut unit = TranslationUnit::new("bad.c");
        let f = unit.add_type(
            TypeNode::new(TypeId(1), Tag::Function)
                .named("f")
                .with_inline_expansion(InlineExpansion::new(Some(TypeId(99)))),
        );

        let err = RefCounter::new(&mut unit).mark_function(f).unwrap_err();
        assert!(matches!(err, PrefcntError::MalformedGraph { .. }));
        assert_eq!(err.unit(), Some("bad.c"));
    }

    #[test]
    fn test_void_inline_expansion_is_fine() {
        let mut unit = TranslationUnit::new("ok.c");
        let f = unit.add_type(
            TypeNode::new(TypeId(1), Tag::Function).with_inline_expansion(InlineExpansion::new(None)),
        );
        RefCounter::new(&mut unit).mark_function(f).unwrap();
        assert_eq!(unit.node(f).refcnt, 1);
    }

    #[test]
    fn test_dangling_member_and_variable_are_ignored() {
        let mut unit = TranslationUnit::new("a.c");
        unit.add_type(
            TypeNode::new(TypeId(1), Tag::Struct).with_member(Member::new("x", Some(TypeId(404)))),
        );
        let f = unit.add_type(
            TypeNode::new(TypeId(2), Tag::Function)
                .with_member(Member::new("s", Some(TypeId(1))))
                .with_member(Member::new("gone", Some(TypeId(405)))),
        );
        unit.add_local(f, Variable::new("tmp", Some(TypeId(406))));

        RefCounter::new(&mut unit).mark_function(f).unwrap();
        assert_eq!(refcnt(&unit, 1), 1);
        assert!(unit.find(TypeId(1)).unwrap().members[0].visited);
    }

    #[test]
    fn test_member_without_type_still_becomes_visited() {
        let mut unit = TranslationUnit::new("a.c");
        let s = unit.add_type(TypeNode::new(TypeId(1), Tag::Union).with_member(Member::new("pad", None)));

        RefCounter::new(&mut unit).mark_type(s).unwrap();
        assert!(unit.node(s).members[0].visited);
    }

    #[test]
    fn test_parameters_are_rewalked_members_are_not() {
        // Two roots both take a `struct s *`; s has an int member.
        let mut unit = TranslationUnit::new("a.c");
        unit.add_type(TypeNode::new(TypeId(1), Tag::Base).named("int"));
        unit.add_type(
            TypeNode::new(TypeId(2), Tag::Struct)
                .named("s")
                .with_member(Member::new("v", Some(TypeId(1)))),
        );
        unit.add_type(TypeNode::new(TypeId(3), Tag::Pointer).with_type(TypeId(2)));
        let f = unit.add_type(
            TypeNode::new(TypeId(4), Tag::Function).with_member(Member::new("p", Some(TypeId(3)))),
        );
        let g = unit.add_type(
            TypeNode::new(TypeId(5), Tag::Function).with_member(Member::new("p", Some(TypeId(3)))),
        );

        let mut counter = RefCounter::new(&mut unit);
        counter.mark_function(f).unwrap();
        counter.mark_function(g).unwrap();

        assert_eq!(refcnt(&unit, 3), 2);
        assert_eq!(refcnt(&unit, 2), 2);
        // Only the first walk through `v` forwards to int.
        assert_eq!(refcnt(&unit, 1), 1);
    }

    #[test]
    fn test_locals_are_counted() {
        let mut unit = TranslationUnit::new("a.c");
        unit.add_type(TypeNode::new(TypeId(1), Tag::Base).named("long"));
        let f = unit.add_type(TypeNode::new(TypeId(2), Tag::Function));
        unit.add_local(f, Variable::new("a", Some(TypeId(1))));
        unit.add_local(f, Variable::new("b", Some(TypeId(1))));

        RefCounter::new(&mut unit).mark_function(f).unwrap();
        assert_eq!(refcnt(&unit, 1), 2);
    }

    #[test]
    fn test_cyclic_underlying_chain_is_bounded() {
        let mut unit = TranslationUnit::new("loop.c");
        unit.add_type(TypeNode::new(TypeId(1), Tag::Typedef).with_type(TypeId(2)));
        unit.add_type(TypeNode::new(TypeId(2), Tag::Const).with_type(TypeId(1)));
        let f = unit.add_type(TypeNode::new(TypeId(3), Tag::Function).with_type(TypeId(1)));

        let options = RefcntOptions { max_unguarded_depth: 32 };
        let err = RefCounter::with_options(&mut unit, options)
            .mark_function(f)
            .unwrap_err();
        assert!(matches!(err, PrefcntError::UnguardedChain { depth: 32, .. }));
    }

    #[test]
    fn test_member_edge_resets_unguarded_depth() {
        // f -> typedef -> struct s { member -> typedef -> int }, bound of 2.
        let mut unit = TranslationUnit::new("a.c");
        unit.add_type(TypeNode::new(TypeId(1), Tag::Base).named("int"));
        unit.add_type(TypeNode::new(TypeId(2), Tag::Typedef).with_type(TypeId(1)));
        unit.add_type(
            TypeNode::new(TypeId(3), Tag::Struct).with_member(Member::new("v", Some(TypeId(2)))),
        );
        unit.add_type(TypeNode::new(TypeId(4), Tag::Typedef).with_type(TypeId(3)));
        let f = unit.add_type(TypeNode::new(TypeId(5), Tag::Function).with_type(TypeId(4)));

        let options = RefcntOptions { max_unguarded_depth: 2 };
        RefCounter::with_options(&mut unit, options).mark_function(f).unwrap();
        assert_eq!(refcnt(&unit, 1), 1);
    }

    #[test]
    fn test_mark_function_rejects_non_function() {
        let mut unit = TranslationUnit::new("a.c");
        let s = unit.add_type(TypeNode::new(TypeId(1), Tag::Struct).named("s"));
        let err = RefCounter::new(&mut unit).mark_function(s).unwrap_err();
        assert!(matches!(err, PrefcntError::InvalidArgument { .. }));
        assert_eq!(unit.node(s).refcnt, 0);
    }

    #[test]
    fn test_root_order_does_not_change_counts() {
        fn build() -> (TranslationUnit, Vec<NodeIndex>) {
            let mut unit = TranslationUnit::new("order.c");
            unit.add_type(TypeNode::new(TypeId(1), Tag::Base).named("int"));
            unit.add_type(
                TypeNode::new(TypeId(2), Tag::Struct)
                    .with_member(Member::new("next", Some(TypeId(4))))
                    .with_member(Member::new("v", Some(TypeId(1)))),
            );
            unit.add_type(
                TypeNode::new(TypeId(3), Tag::Struct).with_member(Member::new("s", Some(TypeId(2)))),
            );
            unit.add_type(TypeNode::new(TypeId(4), Tag::Pointer).with_type(TypeId(3)));
            let f = unit.add_type(
                TypeNode::new(TypeId(5), Tag::Function)
                    .with_type(TypeId(1))
                    .with_member(Member::new("x", Some(TypeId(4)))),
            );
            let g = unit.add_type(
                TypeNode::new(TypeId(6), Tag::Function).with_member(Member::new("y", Some(TypeId(2)))),
            );
            let h = unit.add_type(TypeNode::new(TypeId(7), Tag::Function));
            unit.add_local(h, Variable::new("z", Some(TypeId(3))));
            (unit, vec![f, g, h])
        }

        let counts = |order: &[usize]| {
            let (mut unit, roots) = build();
            let mut counter = RefCounter::new(&mut unit);
            for &i in order {
                counter.mark_function(roots[i]).unwrap();
            }
            unit.type_nodes().map(|(_, n)| n.refcnt).collect::<Vec<_>>()
        };

        let reference = counts(&[0, 1, 2]);
        for order in [[0, 2, 1], [1, 0, 2], [1, 2, 0], [2, 0, 1], [2, 1, 0]] {
            assert_eq!(counts(&order), reference, "order {:?}", order);
        }
    }

    #[test]
    fn test_refcnt_unit_lays_out_structs_and_skips_inlines() {
        let mut unit = TranslationUnit::new("a.c");
        unit.add_type(
            TypeNode::new(TypeId(1), Tag::Struct)
                .with_size(8)
                .with_member(Member::new("c", None).at(0, 1)),
        );
        unit.add_type(TypeNode::new(TypeId(2), Tag::Function));
        unit.add_type(TypeNode::new(TypeId(3), Tag::Function).inlined(true));
        unit.add_type(
            TypeNode::new(TypeId(4), Tag::Union)
                .with_size(8)
                .with_member(Member::new("lo", None).at(0, 4))
                .with_member(Member::new("hi", None).at(4, 4)),
        );

        let stats = refcnt_unit(&mut unit, RefcntOptions::default()).unwrap();
        assert_eq!(stats.types, 4);
        assert_eq!(stats.structs_laid_out, 1);
        assert_eq!(stats.functions_walked, 1);
        assert_eq!(stats.inlined_skipped, 1);
        assert_eq!(stats.increments, 1);
        assert_eq!(unit.find(TypeId(1)).unwrap().layout.map(|l| l.padding), Some(7));

        let union = unit.find(TypeId(4)).unwrap();
        assert!(union.layout.is_none());
        assert!(union.members.iter().all(|m| m.hole == 0));
    }

    #[test]
    fn test_refcnt_all_merges_units() {
        let mut debug_info = DebugInfo::new("prog.json");
        for name in ["a.c", "b.c"] {
            let mut unit = TranslationUnit::new(name);
            unit.add_type(TypeNode::new(TypeId(1), Tag::Function));
            debug_info.push_unit(unit);
        }

        let stats = refcnt_all(&mut debug_info, RefcntOptions::default()).unwrap();
        assert_eq!(stats.functions_walked, 2);
        assert_eq!(stats.increments, 2);
        assert!(debug_info.units().iter().all(|u| u.find(TypeId(1)).unwrap().refcnt == 1));
    }
}
