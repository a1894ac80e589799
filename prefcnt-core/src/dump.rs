//! Graph provider reading a JSON debug-info graph dump.
//!
//! The dump mirrors the arena model one to one:
//!
//! ```json
//! { "units": [{
//!     "name": "net/core/sock.c",
//!     "types": [{ "id": 42, "name": "sock", "tag": "struct", "size": 16,
//!                 "decl_file": "include/net/sock.h", "decl_line": 120,
//!                 "members": [{ "name": "sk_refcnt", "type": 7, "offset": 0, "size": 4 }] }],
//!     "variables": [{ "name": "sysctl_wmem_max", "type": 7 }] }] }
//! ```
//!
//! Type references of `0` or absent mean void. Ids must be unique per unit.

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{IoResultExt, PrefcntError, PrefcntResult};
use crate::model::{
    DebugInfo, InlineExpansion, Member, Tag, TranslationUnit, TypeId, TypeNode, Variable,
};
use crate::provider::GraphProvider;

#[derive(Debug, Deserialize)]
struct RawGraph {
    #[serde(default)]
    units: Vec<RawUnit>,
}

#[derive(Debug, Deserialize)]
struct RawUnit {
    #[serde(default)]
    name: String,
    #[serde(default)]
    types: Vec<RawType>,
    #[serde(default)]
    variables: Vec<RawVariable>,
}

#[derive(Debug, Deserialize)]
struct RawType {
    id: u64,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    tag: Tag,
    #[serde(default, rename = "type")]
    type_ref: u64,
    #[serde(default)]
    size: u64,
    #[serde(default)]
    decl_file: Option<PathBuf>,
    #[serde(default)]
    decl_line: u32,
    #[serde(default)]
    inlined: bool,
    #[serde(default)]
    members: Vec<RawMember>,
    #[serde(default)]
    variables: Vec<RawVariable>,
    #[serde(default)]
    inline_expansions: Vec<RawInlineExpansion>,
}

#[derive(Debug, Deserialize)]
struct RawMember {
    #[serde(default)]
    name: Option<String>,
    #[serde(default, rename = "type")]
    type_ref: u64,
    #[serde(default)]
    offset: u64,
    #[serde(default)]
    size: u64,
}

#[derive(Debug, Deserialize)]
struct RawVariable {
    #[serde(default)]
    name: Option<String>,
    #[serde(default, rename = "type")]
    type_ref: u64,
}

#[derive(Debug, Deserialize)]
struct RawInlineExpansion {
    #[serde(default, rename = "type")]
    type_ref: u64,
    #[serde(default)]
    low_pc: u64,
    #[serde(default)]
    size: u64,
}

impl From<RawVariable> for Variable {
    fn from(raw: RawVariable) -> Self {
        Self {
            name: raw.name,
            type_ref: TypeId::from_raw(raw.type_ref),
        }
    }
}

/// An opened, not yet parsed, dump file.
#[derive(Debug)]
pub struct DumpFile {
    path: PathBuf,
    contents: Vec<u8>,
}

impl DumpFile {
    /// Wrap dump bytes that did not come from the filesystem.
    pub fn from_bytes(path: impl Into<PathBuf>, contents: impl Into<Vec<u8>>) -> Self {
        Self {
            path: path.into(),
            contents: contents.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl GraphProvider for DumpFile {
    fn open(source: &Path) -> PrefcntResult<Self> {
        let contents = fs::read(source).with_path(source)?;
        Ok(Self::from_bytes(source, contents))
    }

    fn load(self) -> PrefcntResult<DebugInfo> {
        let raw: RawGraph = serde_json::from_slice(&self.contents)
            .map_err(|e| PrefcntError::load(&self.path, e.to_string()))?;

        let mut debug_info = DebugInfo::new(&self.path);
        for raw_unit in raw.units {
            debug_info.push_unit(build_unit(&self.path, raw_unit)?);
        }
        Ok(debug_info)
    }
}

fn build_unit(path: &Path, raw: RawUnit) -> PrefcntResult<TranslationUnit> {
    let locals: usize = raw.types.iter().map(|t| t.variables.len()).sum();
    let mut unit = TranslationUnit::try_with_capacity(
        raw.name,
        raw.types.len(),
        locals + raw.variables.len(),
    )
    .map_err(|_| PrefcntError::Setup)?;

    for raw_type in raw.types {
        let mut node = TypeNode::new(TypeId(raw_type.id), raw_type.tag);
        node.name = raw_type.name;
        node.type_ref = TypeId::from_raw(raw_type.type_ref);
        node.size = raw_type.size;
        node.decl_file = raw_type.decl_file;
        node.decl_line = raw_type.decl_line;
        node.inlined = raw_type.inlined;
        node.members = raw_type
            .members
            .into_iter()
            .map(|m| Member {
                name: m.name,
                type_ref: TypeId::from_raw(m.type_ref),
                offset: m.offset,
                size: m.size,
                ..Member::default()
            })
            .collect();
        node.inline_expansions = raw_type
            .inline_expansions
            .into_iter()
            .map(|e| InlineExpansion {
                type_ref: TypeId::from_raw(e.type_ref),
                low_pc: e.low_pc,
                size: e.size,
            })
            .collect();

        let Some(idx) = unit.try_add_type(node) else {
            return Err(PrefcntError::load(
                path,
                format!("duplicate type id {} in {}", TypeId(raw_type.id), unit.name()),
            ));
        };
        for var in raw_type.variables {
            unit.add_local(idx, var.into());
        }
    }

    for var in raw.variables {
        unit.add_global(var.into());
    }

    Ok(unit)
}
