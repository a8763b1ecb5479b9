use crate::{
    error::{Error, ErrorType, Result},
    lexer::{lex, TokenType},
};
use std::{fmt, num::NonZeroU64};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Const,

    Assign,

    // Arithmetic operations
    Add,
    Sub,
    Mul,
    Div,

    // Control flow
    Label,
    Jump,
    JumpIf,

    // Function calls
    Call,
    Return,
    Push,
    Pop,
}

impl Op {
    pub fn mnemonic(&self) -> &'static str {
        match self {
            Op::Const => "CONST",
            Op::Assign => "ASSIGN",
            Op::Add => "ADD",
            Op::Sub => "SUB",
            Op::Mul => "MUL",
            Op::Div => "DIV",
            Op::Label => "LABEL",
            Op::Jump => "JUMP",
            Op::JumpIf => "JUMP_IF",
            Op::Call => "CALL",
            Op::Return => "RETURN",
            Op::Push => "PUSH",
            Op::Pop => "POP",
        }
    }

    pub fn is_jump(&self) -> bool {
        matches!(self, Op::Jump | Op::JumpIf)
    }

    pub fn is_arithmetic(&self) -> bool {
        matches!(self, Op::Add | Op::Sub | Op::Mul | Op::Div)
    }

    /// Whether instructions with this op carry a label id.
    pub fn uses_label(&self) -> bool {
        matches!(self, Op::Label | Op::Jump | Op::JumpIf)
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.mnemonic())
    }
}

/// A jump target. Zero is reserved, so a label id is always positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Label(NonZeroU64);

impl Label {
    pub const FIRST: Label = Label(NonZeroU64::MIN);

    pub fn new(id: u64) -> Option<Self> {
        NonZeroU64::new(id).map(Label)
    }

    pub fn id(&self) -> u64 {
        self.0.get()
    }

    /// The following label, or `None` once the id space is used up.
    pub fn next(&self) -> Option<Label> {
        self.0.checked_add(1).map(Label)
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum VariableType {
    #[default]
    Void,
    Int,
    Float,
}

impl fmt::Display for VariableType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VariableType::Void => write!(f, "void"),
            VariableType::Int => write!(f, "int"),
            VariableType::Float => write!(f, "float"),
        }
    }
}

/// An operand slot. A `Void` variable marks the slot as unused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Variable {
    pub ty: VariableType,
    pub id: u64,
}

impl Variable {
    pub fn new(ty: VariableType, id: u64) -> Self {
        Self { ty, id }
    }

    pub fn unused() -> Self {
        Self::default()
    }

    pub fn is_used(&self) -> bool {
        self.ty != VariableType::Void
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_used() {
            write!(f, "v{}", self.id)
        } else {
            write!(f, "unused")
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Constant {
    Int(i64),
    Float(f64),
}

impl Constant {
    pub fn ty(&self) -> VariableType {
        match self {
            Constant::Int(_) => VariableType::Int,
            Constant::Float(_) => VariableType::Float,
        }
    }
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constant::Int(x) => write!(f, "{}", x),
            Constant::Float(x) => write!(f, "{:?}", x),
        }
    }
}

/// Stable handle of an instruction inside the function that owns it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstructionId(usize);

impl InstructionId {
    pub fn index(&self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    pub op: Op,
    pub arg1: Variable,
    pub arg2: Variable,
    pub result: Variable,
    pub constant: Option<Constant>,
    pub label: Option<Label>,
    pub callee: Option<String>,
}

fn type_error(message: String) -> Error {
    Error::new(ErrorType::TypeCheck, message)
}

/// Names must lex back as exactly one identifier, so keywords, variable and
/// label spellings, and anything with whitespace are rejected.
fn expect_identifier(kind: &str, name: &str) -> Result<()> {
    match lex(name).as_deref() {
        Ok([token]) if token.token_type == TokenType::Identifier && token.value == name => Ok(()),
        _ => Err(type_error(format!("{} name '{}' is not a valid identifier", kind, name))),
    }
}

fn expect_same_type(op: Op, lhs: Variable, rhs: Variable) -> Result<()> {
    if !lhs.is_used() || !rhs.is_used() {
        return Err(type_error(format!(
            "Operands of {} must not be unused",
            op.mnemonic()
        )));
    }

    if lhs.ty != rhs.ty {
        return Err(type_error(format!(
            "Operands of {} have different types: {} and {}",
            op.mnemonic(),
            lhs.ty,
            rhs.ty
        )));
    }

    Ok(())
}

impl Instruction {
    /// An instruction with every operand slot unused.
    pub fn new(op: Op) -> Self {
        Self {
            op,
            arg1: Variable::unused(),
            arg2: Variable::unused(),
            result: Variable::unused(),
            constant: None,
            label: None,
            callee: None,
        }
    }

    pub fn constant(result: Variable, value: Constant) -> Result<Self> {
        if let Constant::Float(x) = value {
            if !x.is_finite() {
                return Err(type_error(format!("Float constant {} is not finite", x)));
            }
        }

        if result.ty != value.ty() {
            return Err(type_error(format!(
                "Constant {} cannot be stored in a variable of type {}",
                value, result.ty
            )));
        }

        Ok(Self {
            result,
            constant: Some(value),
            ..Self::new(Op::Const)
        })
    }

    pub fn assign(lhs: Variable, rhs: Variable) -> Result<Self> {
        expect_same_type(Op::Assign, lhs, rhs)?;

        Ok(Self {
            arg1: rhs,
            result: lhs,
            ..Self::new(Op::Assign)
        })
    }

    pub fn arithmetic(op: Op, result: Variable, lhs: Variable, rhs: Variable) -> Result<Self> {
        if !op.is_arithmetic() {
            return Err(type_error(format!("{} is not an arithmetic operation", op.mnemonic())));
        }
        expect_same_type(op, lhs, rhs)?;

        if result.ty != lhs.ty {
            return Err(type_error(format!(
                "Result of {} must have type {}, found {}",
                op.mnemonic(),
                lhs.ty,
                result.ty
            )));
        }

        Ok(Self {
            arg1: lhs,
            arg2: rhs,
            result,
            ..Self::new(op)
        })
    }

    pub fn label(label: Label) -> Self {
        Self {
            label: Some(label),
            ..Self::new(Op::Label)
        }
    }

    pub fn jump(label: Label) -> Self {
        Self {
            label: Some(label),
            ..Self::new(Op::Jump)
        }
    }

    pub fn jump_if(label: Label, condition: Variable) -> Result<Self> {
        if condition.ty != VariableType::Int {
            return Err(type_error(format!(
                "Condition of JUMP_IF must have type int, found {}",
                condition.ty
            )));
        }

        Ok(Self {
            arg1: condition,
            label: Some(label),
            ..Self::new(Op::JumpIf)
        })
    }

    /// A call whose result is discarded when `result` is unused.
    pub fn call(function: &str, result: Variable) -> Result<Self> {
        expect_identifier("Callee", function)?;

        Ok(Self {
            result,
            callee: Some(function.to_string()),
            ..Self::new(Op::Call)
        })
    }

    pub fn ret(value: Variable) -> Self {
        Self {
            arg1: value,
            ..Self::new(Op::Return)
        }
    }

    pub fn push(variable: Variable) -> Result<Self> {
        if !variable.is_used() {
            return Err(type_error("Operand of PUSH must not be unused".to_string()));
        }

        Ok(Self {
            arg1: variable,
            ..Self::new(Op::Push)
        })
    }

    pub fn pop(result: Variable) -> Result<Self> {
        if !result.is_used() {
            return Err(type_error("Result of POP must not be unused".to_string()));
        }

        Ok(Self {
            result,
            ..Self::new(Op::Pop)
        })
    }
}

fn write_label(f: &mut fmt::Formatter<'_>, label: Option<Label>) -> fmt::Result {
    match label {
        Some(label) => write!(f, "{}", label),
        None => write!(f, "L?"),
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.op == Op::Label {
            write_label(f, self.label)?;
            return write!(f, ":");
        }

        if self.result.is_used() {
            write!(f, "{}:{} = ", self.result, self.result.ty)?;
        }

        write!(f, "{}", self.op.mnemonic().to_lowercase())?;

        match self.op {
            Op::Const => {
                if let Some(constant) = self.constant {
                    write!(f, " {}", constant)?;
                }
            }
            Op::Add | Op::Sub | Op::Mul | Op::Div => {
                write!(f, " {}, {}", self.arg1, self.arg2)?;
            }
            Op::Jump => {
                write!(f, " ")?;
                write_label(f, self.label)?;
            }
            Op::JumpIf => {
                write!(f, " ")?;
                write_label(f, self.label)?;
                write!(f, ", {}", self.arg1)?;
            }
            Op::Call => {
                if let Some(callee) = &self.callee {
                    write!(f, " {}", callee)?;
                }
            }
            Op::Return => {
                if self.arg1.is_used() {
                    write!(f, " {}", self.arg1)?;
                }
            }
            Op::Assign | Op::Push => {
                write!(f, " {}", self.arg1)?;
            }
            Op::Label | Op::Pop => {}
        }

        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub name: String,
    instructions: Vec<Instruction>,
}

impl Function {
    pub fn new(name: &str) -> Result<Self> {
        expect_identifier("Function", name)?;

        Ok(Self {
            name: name.to_string(),
            instructions: vec![],
        })
    }

    pub fn push(&mut self, instruction: Instruction) -> InstructionId {
        self.instructions.push(instruction);
        InstructionId(self.instructions.len() - 1)
    }

    pub fn get(&self, id: InstructionId) -> &Instruction {
        &self.instructions[id.0]
    }

    pub fn get_mut(&mut self, id: InstructionId) -> &mut Instruction {
        &mut self.instructions[id.0]
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    /// Iterate over the instructions together with their handles, in order.
    pub fn iter(&self) -> impl Iterator<Item = (InstructionId, &Instruction)> {
        self.instructions
            .iter()
            .enumerate()
            .map(|(index, instruction)| (InstructionId(index), instruction))
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "fn {} {{", self.name)?;

        for instruction in &self.instructions {
            if instruction.op == Op::Label {
                writeln!(f, "{}", instruction)?;
            } else {
                writeln!(f, "    {}", instruction)?;
            }
        }

        writeln!(f, "}}")
    }
}
