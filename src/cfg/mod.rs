use crate::tac::{Function, Instruction, InstructionId, Label, Op};
use std::{collections::TryReserveError, fmt};
use thiserror::Error;

pub mod builder;
pub mod dot;

pub use builder::{build_graph, partition, resolve_edges, LabelTable};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CfgError {
    #[error("Allocation failed while building the control-flow graph: {0}")]
    AllocationFailure(String),

    #[error("Jump to undefined label {label} in block {block}")]
    UndefinedLabel { label: Label, block: BlockId },

    #[error("{op} instruction {index} carries no label id")]
    MalformedLabelDomain { op: Op, index: usize },

    #[error("Label {label} is defined more than once")]
    DuplicateLabel { label: Label },

    #[error("Block {block} does not exist in this graph")]
    UnknownBlock { block: BlockId },

    #[error("Instruction {index} does not exist in the function")]
    UnknownInstruction { index: usize },
}

impl From<TryReserveError> for CfgError {
    fn from(error: TryReserveError) -> Self {
        CfgError::AllocationFailure(error.to_string())
    }
}

pub type CfgResult<T> = Result<T, CfgError>;

/// Handle of a basic block, its index in creation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(usize);

impl BlockId {
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "B{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EdgeKind {
    /// Control runs off the end of a block into the next one.
    Fallthrough,
    /// Control transfers through a JUMP or a taken JUMP_IF.
    Jump,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge {
    pub from: BlockId,
    pub to: BlockId,
    pub kind: EdgeKind,
}

/// A run of instructions, referenced by handle into the owning function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicBlock {
    id: BlockId,
    instructions: Vec<InstructionId>,
}

impl BasicBlock {
    pub fn id(&self) -> BlockId {
        self.id
    }

    pub fn instructions(&self) -> &[InstructionId] {
        &self.instructions
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }
}

/// Control-flow graph of one function.
///
/// The graph owns its blocks and edges. Instructions stay owned by the
/// function, which the graph borrows for as long as it lives.
#[derive(Debug)]
pub struct Graph<'f> {
    function: &'f Function,
    blocks: Vec<BasicBlock>,
    edges: Vec<Edge>,
}

impl<'f> Graph<'f> {
    pub fn new(function: &'f Function) -> Self {
        Self {
            function,
            blocks: vec![],
            edges: vec![],
        }
    }

    pub fn function(&self) -> &'f Function {
        self.function
    }

    pub fn add_block(&mut self) -> CfgResult<BlockId> {
        self.blocks.try_reserve(1)?;

        let id = BlockId(self.blocks.len());
        self.blocks.push(BasicBlock {
            id,
            instructions: vec![],
        });
        Ok(id)
    }

    fn check_block(&self, block: BlockId) -> CfgResult<()> {
        if block.0 < self.blocks.len() {
            Ok(())
        } else {
            Err(CfgError::UnknownBlock { block })
        }
    }

    pub fn add_edge(&mut self, from: BlockId, to: BlockId, kind: EdgeKind) -> CfgResult<()> {
        self.check_block(from)?;
        self.check_block(to)?;
        self.edges.try_reserve(1)?;

        self.edges.push(Edge { from, to, kind });
        Ok(())
    }

    pub fn append_instruction(
        &mut self,
        block: BlockId,
        instruction: InstructionId,
    ) -> CfgResult<()> {
        if instruction.index() >= self.function.len() {
            return Err(CfgError::UnknownInstruction {
                index: instruction.index(),
            });
        }

        let instructions = &mut self
            .blocks
            .get_mut(block.0)
            .ok_or(CfgError::UnknownBlock { block })?
            .instructions;
        instructions.try_reserve(1)?;
        instructions.push(instruction);
        Ok(())
    }

    pub fn block(&self, id: BlockId) -> Option<&BasicBlock> {
        self.blocks.get(id.0)
    }

    /// Instruction handles of block `id`; empty if the block does not exist.
    fn instruction_ids(&self, id: BlockId) -> &[InstructionId] {
        self.blocks
            .get(id.0)
            .map(|block| block.instructions.as_slice())
            .unwrap_or_default()
    }

    /// Blocks in creation order.
    pub fn blocks(&self) -> impl Iterator<Item = &BasicBlock> {
        self.blocks.iter()
    }

    /// Edges in creation order.
    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.iter()
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Instructions of block `id` in order. A block that does not exist has none.
    pub fn instructions(&self, id: BlockId) -> impl Iterator<Item = &'f Instruction> + '_ {
        let function = self.function;
        self.instruction_ids(id)
            .iter()
            .map(move |&instruction| function.get(instruction))
    }

    pub fn first_instruction(&self, id: BlockId) -> Option<&'f Instruction> {
        self.instruction_ids(id)
            .first()
            .map(|&instruction| self.function.get(instruction))
    }

    pub fn last_instruction(&self, id: BlockId) -> Option<&'f Instruction> {
        self.instruction_ids(id)
            .last()
            .map(|&instruction| self.function.get(instruction))
    }

    /// Outgoing edges of `id`, in creation order. Scans every edge.
    pub fn successors(&self, id: BlockId) -> impl Iterator<Item = &Edge> {
        self.edges.iter().filter(move |edge| edge.from == id)
    }

    /// Incoming edges of `id`, in creation order. Scans every edge.
    pub fn predecessors(&self, id: BlockId) -> impl Iterator<Item = &Edge> {
        self.edges.iter().filter(move |edge| edge.to == id)
    }

    /// Drop every block and edge. The function and its instructions are untouched.
    pub fn clear(&mut self) {
        self.blocks.clear();
        self.edges.clear();
    }
}

impl<'f> fmt::Display for Graph<'f> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "==== {} ====", self.function.name)?;

        let mut successors: Vec<Vec<&Edge>> = vec![vec![]; self.blocks.len()];
        for edge in &self.edges {
            successors[edge.from.0].push(edge);
        }

        for block in &self.blocks {
            let targets: Vec<String> = successors[block.id.0]
                .iter()
                .map(|edge| match edge.kind {
                    EdgeKind::Fallthrough => format!("{}", edge.to),
                    EdgeKind::Jump => format!("{} (jump)", edge.to),
                })
                .collect();

            writeln!(f, "{}: -> [{}]", block.id, targets.join(", "))?;
            for instruction in self.instructions(block.id) {
                writeln!(f, "    {}", instruction)?;
            }
        }

        Ok(())
    }
}
