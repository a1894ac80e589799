//! Arena model of a loaded debug-info graph.
//!
//! Each [`TranslationUnit`] owns its type nodes and variables in flat vectors.
//! Cross references are numeric [`TypeId`]s resolved through the unit's own
//! index; a reference that does not resolve reads as "no reference". Members
//! and inline expansions live inside their owning node, variables inside the
//! unit arena, so the owner of any record is the container it sits in.

use serde::{Deserialize, Serialize};
use std::collections::hash_map::Entry;
use std::collections::{HashMap, TryReserveError};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::layout::Layout;

/// Numeric type identifier as recorded by the producer (a DIE offset in DWARF).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeId(pub u64);

impl TypeId {
    /// Map a raw id to a reference; `0` encodes void.
    pub fn from_raw(raw: u64) -> Option<Self> {
        (raw != 0).then_some(Self(raw))
    }
}

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Position of a type node inside its unit's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeIndex(pub(crate) usize);

impl NodeIndex {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Position of a variable inside its unit's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VariableIndex(pub(crate) usize);

/// Kind of a type node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tag {
    Struct,
    Union,
    #[serde(alias = "subprogram")]
    Function,
    Enum,
    Typedef,
    Pointer,
    Reference,
    Const,
    Volatile,
    Array,
    Base,
    Subroutine,
    #[default]
    #[serde(other)]
    Other,
}

impl Tag {
    /// Struct or union: members are fields, guarded by the visited flag.
    pub fn is_aggregate(self) -> bool {
        matches!(self, Self::Struct | Self::Union)
    }

    pub fn keyword(self) -> &'static str {
        match self {
            Self::Struct => "struct",
            Self::Union => "union",
            Self::Function => "function",
            Self::Enum => "enum",
            Self::Typedef => "typedef",
            Self::Pointer => "pointer",
            Self::Reference => "reference",
            Self::Const => "const",
            Self::Volatile => "volatile",
            Self::Array => "array",
            Self::Base => "base",
            Self::Subroutine => "subroutine",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// A struct/union field or a function parameter.
#[derive(Debug, Clone, Default)]
pub struct Member {
    pub name: Option<String>,
    pub type_ref: Option<TypeId>,
    /// Set the first time the marker walks through this member; never cleared.
    pub visited: bool,
    pub offset: u64,
    pub size: u64,
    /// Bytes of padding between this member and the next, filled by `find_holes`.
    pub hole: u64,
}

impl Member {
    pub fn new(name: impl Into<String>, type_ref: Option<TypeId>) -> Self {
        Self {
            name: Some(name.into()),
            type_ref,
            ..Self::default()
        }
    }

    pub fn at(mut self, offset: u64, size: u64) -> Self {
        self.offset = offset;
        self.size = size;
        self
    }
}

/// A declared variable, global or local.
#[derive(Debug, Clone, Default)]
pub struct Variable {
    pub name: Option<String>,
    pub type_ref: Option<TypeId>,
}

impl Variable {
    pub fn new(name: impl Into<String>, type_ref: Option<TypeId>) -> Self {
        Self {
            name: Some(name.into()),
            type_ref,
        }
    }
}

/// A call site where a function body was inlined.
#[derive(Debug, Clone, Default)]
pub struct InlineExpansion {
    /// The inlined function's node.
    pub type_ref: Option<TypeId>,
    pub low_pc: u64,
    pub size: u64,
}

impl InlineExpansion {
    pub fn new(type_ref: Option<TypeId>) -> Self {
        Self {
            type_ref,
            ..Self::default()
        }
    }
}

/// A type, aggregate or function.
#[derive(Debug, Clone)]
pub struct TypeNode {
    pub id: TypeId,
    pub name: Option<String>,
    pub tag: Tag,
    /// Return type for functions, referenced type for typedef/pointer-like
    /// nodes. `None` is void.
    pub type_ref: Option<TypeId>,
    pub refcnt: u64,
    pub members: Vec<Member>,
    /// Locals, for functions.
    pub variables: Vec<VariableIndex>,
    pub inline_expansions: Vec<InlineExpansion>,
    pub decl_file: Option<PathBuf>,
    pub decl_line: u32,
    /// This function node is the abstract body of an inlined definition.
    pub inlined: bool,
    pub size: u64,
    pub layout: Option<Layout>,
}

impl TypeNode {
    pub fn new(id: TypeId, tag: Tag) -> Self {
        Self {
            id,
            name: None,
            tag,
            type_ref: None,
            refcnt: 0,
            members: Vec::new(),
            variables: Vec::new(),
            inline_expansions: Vec::new(),
            decl_file: None,
            decl_line: 0,
            inlined: false,
            size: 0,
            layout: None,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_type(mut self, type_ref: TypeId) -> Self {
        self.type_ref = Some(type_ref);
        self
    }

    pub fn with_member(mut self, member: Member) -> Self {
        self.members.push(member);
        self
    }

    pub fn with_inline_expansion(mut self, exp: InlineExpansion) -> Self {
        self.inline_expansions.push(exp);
        self
    }

    pub fn declared_at(mut self, file: impl Into<PathBuf>, line: u32) -> Self {
        self.decl_file = Some(file.into());
        self.decl_line = line;
        self
    }

    pub fn with_size(mut self, size: u64) -> Self {
        self.size = size;
        self
    }

    pub fn inlined(mut self, inlined: bool) -> Self {
        self.inlined = inlined;
        self
    }

    /// Name for diagnostics, falling back to the id for anonymous nodes.
    pub fn display_name(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => format!("<anonymous {}>", self.id),
        }
    }
}

/// Debug information for one compiled source file.
#[derive(Debug, Clone, Default)]
pub struct TranslationUnit {
    name: String,
    nodes: Vec<TypeNode>,
    variables: Vec<Variable>,
    globals: Vec<VariableIndex>,
    index: HashMap<TypeId, NodeIndex>,
}

impl TranslationUnit {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Create a unit with room for the given number of nodes and variables,
    /// reporting allocation failure instead of aborting.
    pub fn try_with_capacity(
        name: impl Into<String>,
        types: usize,
        variables: usize,
    ) -> Result<Self, TryReserveError> {
        let mut unit = Self::new(name);
        unit.nodes.try_reserve_exact(types)?;
        unit.index.try_reserve(types)?;
        unit.variables.try_reserve_exact(variables)?;
        Ok(unit)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Add a node to the arena. A node with an id already present replaces it
    /// in the index; the earlier node stays in the arena unreachable by id.
    pub fn add_type(&mut self, node: TypeNode) -> NodeIndex {
        let idx = NodeIndex(self.nodes.len());
        self.index.insert(node.id, idx);
        self.nodes.push(node);
        idx
    }

    /// Add a node, refusing ids that are already taken.
    pub fn try_add_type(&mut self, node: TypeNode) -> Option<NodeIndex> {
        let idx = NodeIndex(self.nodes.len());
        match self.index.entry(node.id) {
            Entry::Occupied(_) => None,
            Entry::Vacant(slot) => {
                slot.insert(idx);
                self.nodes.push(node);
                Some(idx)
            }
        }
    }

    /// Add a local variable owned by `owner`.
    pub fn add_local(&mut self, owner: NodeIndex, variable: Variable) -> VariableIndex {
        let idx = VariableIndex(self.variables.len());
        self.variables.push(variable);
        self.nodes[owner.0].variables.push(idx);
        idx
    }

    pub fn add_global(&mut self, variable: Variable) -> VariableIndex {
        let idx = VariableIndex(self.variables.len());
        self.variables.push(variable);
        self.globals.push(idx);
        idx
    }

    /// Resolve a type id within this unit.
    pub fn resolve_type(&self, id: TypeId) -> Option<NodeIndex> {
        self.index.get(&id).copied()
    }

    /// Resolve an optional reference, folding void and dangling ids together.
    pub fn resolve(&self, type_ref: Option<TypeId>) -> Option<NodeIndex> {
        type_ref.and_then(|id| self.resolve_type(id))
    }

    pub fn node(&self, idx: NodeIndex) -> &TypeNode {
        &self.nodes[idx.0]
    }

    pub fn node_mut(&mut self, idx: NodeIndex) -> &mut TypeNode {
        &mut self.nodes[idx.0]
    }

    /// Look a node up by id.
    pub fn find(&self, id: TypeId) -> Option<&TypeNode> {
        self.resolve_type(id).map(|idx| self.node(idx))
    }

    pub fn variable(&self, idx: VariableIndex) -> &Variable {
        &self.variables[idx.0]
    }

    pub fn globals(&self) -> impl Iterator<Item = &Variable> {
        self.globals.iter().map(|idx| self.variable(*idx))
    }

    /// Type nodes in provider order.
    pub fn type_nodes(&self) -> impl Iterator<Item = (NodeIndex, &TypeNode)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, node)| (NodeIndex(i), node))
    }

    /// Node indices in provider order.
    pub fn node_indices(&self) -> impl Iterator<Item = NodeIndex> {
        (0..self.nodes.len()).map(NodeIndex)
    }

    /// Visit every type node in provider order, stopping at the first error.
    pub fn for_each_type_node<E>(
        &self,
        mut f: impl FnMut(NodeIndex, &TypeNode) -> Result<(), E>,
    ) -> Result<(), E> {
        for (idx, node) in self.type_nodes() {
            f(idx, node)?;
        }
        Ok(())
    }

    pub fn type_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn variable_count(&self) -> usize {
        self.variables.len()
    }
}

/// A loaded debug-info graph: every translation unit of one input.
#[derive(Debug, Clone, Default)]
pub struct DebugInfo {
    source: PathBuf,
    units: Vec<TranslationUnit>,
}

impl DebugInfo {
    pub fn new(source: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            units: Vec::new(),
        }
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn push_unit(&mut self, unit: TranslationUnit) {
        self.units.push(unit);
    }

    pub fn units(&self) -> &[TranslationUnit] {
        &self.units
    }

    pub fn units_mut(&mut self) -> &mut [TranslationUnit] {
        &mut self.units
    }

    /// Visit every translation unit in provider order, stopping at the first error.
    pub fn for_each_translation_unit<E>(
        &mut self,
        mut f: impl FnMut(&mut TranslationUnit) -> Result<(), E>,
    ) -> Result<(), E> {
        for unit in &mut self.units {
            f(unit)?;
        }
        Ok(())
    }

    pub fn type_count(&self) -> usize {
        self.units.iter().map(TranslationUnit::type_count).sum()
    }
}
