use super::{BlockId, CfgError, CfgResult, EdgeKind, Graph};
use crate::tac::{Function, Instruction, InstructionId, Label, Op};
use std::collections::HashMap;
use tracing::{debug, info};

/// Maps each label to the block that starts with it.
#[derive(Debug, Default)]
pub struct LabelTable {
    blocks: HashMap<Label, BlockId>,
}

impl LabelTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(&mut self, label: Label, block: BlockId) -> CfgResult<()> {
        self.blocks
            .try_reserve(1)
            .map_err(|e| CfgError::AllocationFailure(e.to_string()))?;

        if self.blocks.insert(label, block).is_some() {
            return Err(CfgError::DuplicateLabel { label });
        }
        Ok(())
    }

    pub fn get(&self, label: Label) -> Option<BlockId> {
        self.blocks.get(&label).copied()
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

fn label_of(id: InstructionId, instruction: &Instruction) -> CfgResult<Label> {
    instruction.label.ok_or(CfgError::MalformedLabelDomain {
        op: instruction.op,
        index: id.index(),
    })
}

struct Partitioner<'f> {
    graph: Graph<'f>,
    labels: LabelTable,
    current: BlockId,
}

impl<'f> Partitioner<'f> {
    fn new(function: &'f Function) -> CfgResult<Self> {
        let mut graph = Graph::new(function);
        let current = graph.add_block()?;

        Ok(Self {
            graph,
            labels: LabelTable::new(),
            current,
        })
    }

    fn split(&mut self, fallthrough: bool) -> CfgResult<()> {
        let next = self.graph.add_block()?;
        if fallthrough {
            self.graph.add_edge(self.current, next, EdgeKind::Fallthrough)?;
        }

        debug!(
            "split {} -> {}{}",
            self.current,
            next,
            if fallthrough { " (fallthrough)" } else { "" }
        );

        self.current = next;
        Ok(())
    }

    fn process(&mut self, id: InstructionId, instruction: &Instruction) -> CfgResult<()> {
        if instruction.op.uses_label() {
            let label = label_of(id, instruction)?;

            if instruction.op == Op::Label {
                if self.graph.block(self.current).is_some_and(|b| !b.is_empty()) {
                    self.split(true)?;
                }

                self.labels.bind(label, self.current)?;
            }
        }

        self.graph.append_instruction(self.current, id)?;

        match instruction.op {
            Op::JumpIf => self.split(true),
            Op::Jump => self.split(false),
            _ => Ok(()),
        }
    }
}

/// First pass: split `function` into basic blocks.
///
/// Returns the graph with all blocks and the fallthrough edges of label
/// splits and conditional jumps, plus the complete label table. Jump edges
/// are added by [`resolve_edges`].
pub fn partition(function: &Function) -> CfgResult<(Graph, LabelTable)> {
    let mut partitioner = Partitioner::new(function)?;

    for (id, instruction) in function.iter() {
        partitioner.process(id, instruction)?;
    }

    Ok((partitioner.graph, partitioner.labels))
}

/// Second pass: add one jump edge per JUMP and JUMP_IF, from its block to the
/// block its label starts.
pub fn resolve_edges(graph: &mut Graph, labels: &LabelTable) -> CfgResult<()> {
    let function = graph.function();
    let mut jumps: Vec<(BlockId, BlockId)> = vec![];

    for block in graph.blocks() {
        for &id in block.instructions() {
            let instruction = function.get(id);
            if !instruction.op.is_jump() {
                continue;
            }

            let label = label_of(id, instruction)?;
            let target = labels.get(label).ok_or(CfgError::UndefinedLabel {
                label,
                block: block.id(),
            })?;

            jumps.try_reserve(1)?;
            jumps.push((block.id(), target));
        }
    }

    for (from, to) in jumps {
        debug!("jump {} -> {}", from, to);
        graph.add_edge(from, to, EdgeKind::Jump)?;
    }

    Ok(())
}

/// Build the control-flow graph of `function`.
pub fn build_graph(function: &Function) -> CfgResult<Graph> {
    let (mut graph, labels) = partition(function)?;
    resolve_edges(&mut graph, &labels)?;

    info!(
        "built CFG for '{}': {} blocks, {} edges, {} labels",
        function.name,
        graph.block_count(),
        graph.edge_count(),
        labels.len()
    );

    Ok(graph)
}
