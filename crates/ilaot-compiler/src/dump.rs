//! Human-readable dumps of the marked graph and of emitted output.

use std::fmt::{self, Write as _};

use ilaot_object::{ObjectData, SymbolRef};

use crate::compilation::{Compilation, CompilationOutput};
use crate::graph::MarkReason;

/// Every marked node in node order with the reason it was marked.
pub fn dump_graph(compilation: &Compilation<'_>) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = write_graph(&mut out, compilation);
    out
}

/// Objects in emission order, then externs.
pub fn dump_output(output: &CompilationOutput) -> String {
    let mut out = String::new();
    let _ = write_output(&mut out, output);
    out
}

fn write_graph(out: &mut String, compilation: &Compilation<'_>) -> fmt::Result {
    let name = |node| compilation.name(node);
    for node in compilation.marked_nodes() {
        let reason = match compilation.mark_reason(node) {
            Some(MarkReason::Root(reason)) => format!("root ({reason})"),
            Some(MarkReason::Static(by)) => format!("static {}", name(by)),
            Some(MarkReason::Conditional { owner, condition }) => {
                format!("conditional {} if {}", name(owner), name(condition))
            }
            Some(MarkReason::Dynamic(by)) => format!("dynamic {}", name(by)),
            None => "?".to_owned(),
        };
        writeln!(out, "{} <- {reason}", name(node))?;
    }
    Ok(())
}

fn write_output(out: &mut String, output: &CompilationOutput) -> fmt::Result {
    let symbol_name = |symbol: SymbolRef| output.symbol_name(symbol).unwrap_or("?");
    for object in output.objects() {
        write_object(out, symbol_name(object.symbol), &object.data, symbol_name)?;
    }
    if !output.externs().is_empty() {
        writeln!(out, "externs:")?;
        for &symbol in output.externs() {
            writeln!(out, "  {}", symbol_name(symbol))?;
        }
    }
    Ok(())
}

fn write_object<'a>(
    out: &mut String,
    name: &str,
    data: &ObjectData,
    symbol_name: impl Fn(SymbolRef) -> &'a str,
) -> fmt::Result {
    writeln!(out, "{name} (align {}, {} bytes)", data.alignment(), data.len())?;
    for (row, chunk) in data.bytes().chunks(16).enumerate() {
        let hex: Vec<String> = chunk.iter().map(|b| format!("{b:02x}")).collect();
        writeln!(out, "  {:04x}  {}", row * 16, hex.join(" "))?;
    }
    for reloc in data.relocs() {
        writeln!(
            out,
            "  @{:04x} {} {} {:+}",
            reloc.offset,
            reloc.kind,
            symbol_name(reloc.target),
            reloc.addend
        )?;
    }
    Ok(())
}
