use super::Graph;
use std::fmt::{self, Write};

/// Write `graph` as a Graphviz digraph.
///
/// Every block becomes a box listing its op mnemonics, followed by one
/// declaration per edge. Blocks and edges keep their creation order.
pub fn write_dot(graph: &Graph, out: &mut impl Write) -> fmt::Result {
    writeln!(out, "digraph \"CFG\" {{")?;

    for block in graph.blocks() {
        write!(out, "\t\"{}\" [shape=box, label=\"", block.id())?;
        for instruction in graph.instructions(block.id()) {
            write!(out, "{}\\n", instruction.op.mnemonic())?;
        }
        writeln!(out, "\"];")?;
    }

    for edge in graph.edges() {
        writeln!(out, "\t\"{}\" -> \"{}\";", edge.from, edge.to)?;
    }

    writeln!(out, "}}")
}

pub fn to_dot(graph: &Graph) -> String {
    let mut out = String::new();
    // writing into a String cannot fail
    let _ = write_dot(graph, &mut out);
    out
}
