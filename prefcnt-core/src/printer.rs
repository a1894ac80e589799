//! Pahole-style textual rendition of type nodes.

use std::io::{self, Write};

use crate::model::{Tag, TranslationUnit, TypeId, TypeNode};

const CACHELINE_SIZE: u64 = 64;

/// Pointer/qualifier chains longer than this are elided.
const MAX_NAME_DEPTH: usize = 8;

/// C-like spelling of a type reference.
pub fn type_name(unit: &TranslationUnit, type_ref: Option<TypeId>) -> String {
    spell(unit, type_ref, 0)
}

fn spell(unit: &TranslationUnit, type_ref: Option<TypeId>, depth: usize) -> String {
    let Some(id) = type_ref else {
        return "void".to_string();
    };
    let Some(node) = unit.find(id) else {
        return format!("<type {}>", id);
    };
    if depth >= MAX_NAME_DEPTH {
        return "...".to_string();
    }

    let inner = || spell(unit, node.type_ref, depth + 1);
    match node.tag {
        Tag::Pointer => format!("{} *", inner()),
        Tag::Reference => format!("{} &", inner()),
        Tag::Const => format!("const {}", inner()),
        Tag::Volatile => format!("volatile {}", inner()),
        Tag::Array => format!("{}[]", inner()),
        Tag::Subroutine => format!("{} (*)()", inner()),
        Tag::Struct | Tag::Union | Tag::Enum => {
            format!("{} {}", node.tag, node.name.as_deref().unwrap_or("{...}"))
        }
        _ => node.display_name(),
    }
}

fn write_origin<W: Write>(out: &mut W, node: &TypeNode) -> io::Result<()> {
    match &node.decl_file {
        Some(file) => writeln!(out, " /* {}:{} */", file.display(), node.decl_line),
        None => writeln!(out),
    }
}

fn print_aggregate<W: Write>(out: &mut W, unit: &TranslationUnit, node: &TypeNode) -> io::Result<()> {
    writeln!(out, "{} {} {{", node.tag, node.display_name())?;
    for member in &node.members {
        let decl = format!(
            "{} {};",
            type_name(unit, member.type_ref),
            member.name.as_deref().unwrap_or("")
        );
        writeln!(out, "\t{:<40} /* {:5} {:5} */", decl, member.offset, member.size)?;
        if member.hole > 0 {
            writeln!(out, "\n\t/* XXX {} bytes hole, try to pack */\n", member.hole)?;
        }
    }
    if !node.members.is_empty() {
        writeln!(out)?;
    }

    writeln!(
        out,
        "\t/* size: {}, cachelines: {}, members: {} */",
        node.size,
        node.size.div_ceil(CACHELINE_SIZE),
        node.members.len()
    )?;
    if let Some(layout) = node.layout {
        if layout.nr_holes > 0 {
            writeln!(
                out,
                "\t/* sum members: {}, holes: {}, sum holes: {} */",
                layout.sum_members, layout.nr_holes, layout.sum_holes
            )?;
        }
        if layout.padding > 0 {
            writeln!(out, "\t/* padding: {} */", layout.padding)?;
        }
    }
    write!(out, "}};")?;
    write_origin(out, node)
}

fn print_function<W: Write>(out: &mut W, unit: &TranslationUnit, node: &TypeNode) -> io::Result<()> {
    let params = if node.members.is_empty() {
        "void".to_string()
    } else {
        node.members
            .iter()
            .map(|p| match &p.name {
                Some(name) => format!("{} {}", type_name(unit, p.type_ref), name),
                None => type_name(unit, p.type_ref),
            })
            .collect::<Vec<_>>()
            .join(", ")
    };

    if node.inlined {
        write!(out, "inline ")?;
    }
    write!(
        out,
        "{} {}({});",
        type_name(unit, node.type_ref),
        node.display_name(),
        params
    )?;
    write_origin(out, node)
}

/// Print one node followed by a blank line.
pub fn print_node<W: Write>(out: &mut W, unit: &TranslationUnit, node: &TypeNode) -> io::Result<()> {
    match node.tag {
        Tag::Struct | Tag::Union => print_aggregate(out, unit, node)?,
        Tag::Function => print_function(out, unit, node)?,
        Tag::Typedef => {
            write!(
                out,
                "typedef {} {};",
                type_name(unit, node.type_ref),
                node.display_name()
            )?;
            write_origin(out, node)?;
        }
        tag => {
            write!(out, "{} {}; /* size: {} */", tag, node.display_name(), node.size)?;
            write_origin(out, node)?;
        }
    }
    writeln!(out)
}
