use crate::{
    error::{Error, ErrorType, Result},
    tac::{Constant, Function, Instruction, Label, Op, Variable, VariableType},
};

/// Mints fresh variables and labels for one compilation.
///
/// Numbering starts at 1 for both and is private to each generator, so
/// independent generators never see each other's identifiers.
pub struct TacGenerator {
    variable_index: u64,
    next_label: Option<Label>,
}

impl Default for TacGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl TacGenerator {
    pub fn new() -> Self {
        Self {
            variable_index: 1,
            next_label: Some(Label::FIRST),
        }
    }

    pub fn new_variable(&mut self, ty: VariableType) -> Variable {
        self.variable_index += 1;
        Variable::new(ty, self.variable_index - 1)
    }

    pub fn new_label(&mut self) -> Result<Label> {
        let label = self.next_label.ok_or_else(|| {
            Error::new(ErrorType::Generator, "Ran out of label ids".to_string())
        })?;
        self.next_label = label.next();
        Ok(label)
    }

    /// Create a LABEL instruction for a fresh label.
    pub fn gen_label(&mut self) -> Result<Instruction> {
        let label = self.new_label()?;
        Ok(Instruction::label(label))
    }

    pub fn gen_const_int(&mut self, value: i64) -> Instruction {
        Instruction {
            result: self.new_variable(VariableType::Int),
            constant: Some(Constant::Int(value)),
            ..Instruction::new(Op::Const)
        }
    }

    pub fn gen_const_float(&mut self, value: f64) -> Result<Instruction> {
        // checked before minting so a rejected constant does not use up a variable
        if !value.is_finite() {
            return Err(Error::new(
                ErrorType::TypeCheck,
                format!("Float constant {} is not finite", value),
            ));
        }

        Instruction::constant(self.new_variable(VariableType::Float), Constant::Float(value))
    }

    pub fn gen_assign(&mut self, lhs: Variable, rhs: Variable) -> Result<Instruction> {
        Instruction::assign(lhs, rhs)
    }

    pub fn gen_arithmetic(&mut self, op: Op, lhs: Variable, rhs: Variable) -> Result<Instruction> {
        let result = self.new_variable(lhs.ty);
        Instruction::arithmetic(op, result, lhs, rhs)
    }

    pub fn gen_add(&mut self, lhs: Variable, rhs: Variable) -> Result<Instruction> {
        self.gen_arithmetic(Op::Add, lhs, rhs)
    }

    pub fn gen_jump(&mut self, label: Label) -> Instruction {
        Instruction::jump(label)
    }

    pub fn gen_jump_if(&mut self, label: Label, condition: Variable) -> Result<Instruction> {
        Instruction::jump_if(label, condition)
    }

    pub fn gen_call(&mut self, function: &str, result_type: VariableType) -> Result<Instruction> {
        let result = match result_type {
            VariableType::Void => Variable::unused(),
            ty => self.new_variable(ty),
        };
        Instruction::call(function, result)
    }

    pub fn gen_return(&mut self) -> Instruction {
        Instruction::ret(Variable::unused())
    }

    pub fn gen_return_variable(&mut self, value: Variable) -> Instruction {
        Instruction::ret(value)
    }

    pub fn gen_push(&mut self, variable: Variable) -> Result<Instruction> {
        Instruction::push(variable)
    }

    pub fn gen_pop(&mut self, result_type: VariableType) -> Result<Instruction> {
        let result = self.new_variable(result_type);
        Instruction::pop(result)
    }
}

/// The example function: a conditional that joins before a call.
///
/// Its op sequence is
/// `POP CONST CONST ADD ADD JUMP_IF ADD ASSIGN JUMP LABEL ADD ASSIGN LABEL`
/// followed by `PUSH PUSH PUSH CALL RETURN`.
pub fn example_function(generator: &mut TacGenerator) -> Result<Function> {
    let mut function = Function::new("example")?;

    let inst1 = generator.gen_pop(VariableType::Int)?;
    let popped = inst1.result;
    function.push(inst1);

    let c1 = generator.gen_const_int(1);
    let one = c1.result;
    function.push(c1);

    let c2 = generator.gen_const_int(2);
    let two = c2.result;
    function.push(c2);

    let inst2 = generator.gen_add(one, two)?;
    let sum = inst2.result;
    function.push(inst2);

    let inst3 = generator.gen_add(sum, popped)?;
    let total = inst3.result;
    function.push(inst3);

    // both labels are referenced before they are placed
    let else_label = generator.new_label()?;
    let join_label = generator.new_label()?;

    function.push(generator.gen_jump_if(else_label, total)?);

    let inst5 = generator.gen_add(total, one)?;
    let incremented = inst5.result;
    function.push(inst5);
    function.push(generator.gen_assign(total, incremented)?);
    function.push(generator.gen_jump(join_label));

    function.push(Instruction::label(else_label));

    let inst8 = generator.gen_add(total, two)?;
    let doubled = inst8.result;
    function.push(inst8);
    function.push(generator.gen_assign(total, doubled)?);

    function.push(Instruction::label(join_label));

    function.push(generator.gen_push(two)?);
    function.push(generator.gen_push(one)?);
    function.push(generator.gen_push(total)?);

    let inst9 = generator.gen_call("some_function", VariableType::Float)?;
    let returned = inst9.result;
    function.push(inst9);

    function.push(generator.gen_return_variable(returned));

    Ok(function)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variables_are_numbered_from_one() {
        let mut generator = TacGenerator::new();

        let a = generator.new_variable(VariableType::Int);
        let b = generator.new_variable(VariableType::Float);

        assert_eq!(a, Variable::new(VariableType::Int, 1));
        assert_eq!(b, Variable::new(VariableType::Float, 2));
    }

    #[test]
    fn labels_are_numbered_from_one() {
        let mut generator = TacGenerator::new();

        let first = generator.gen_label().unwrap();
        let second = generator.gen_label().unwrap();

        assert_eq!(first.op, Op::Label);
        assert_eq!(first.label.map(|l| l.id()), Some(1));
        assert_eq!(second.label.map(|l| l.id()), Some(2));
    }

    #[test]
    fn generators_do_not_share_counters() {
        let mut first = TacGenerator::new();
        let mut second = TacGenerator::new();

        first.new_variable(VariableType::Int);
        first.new_variable(VariableType::Int);
        first.gen_label().unwrap();

        assert_eq!(second.new_variable(VariableType::Int).id, 1);
        assert_eq!(second.new_label().unwrap().id(), 1);
    }

    #[test]
    fn void_call_has_no_result() {
        let mut generator = TacGenerator::new();

        let call = generator.gen_call("print", VariableType::Void).unwrap();
        assert!(!call.result.is_used());
        assert_eq!(call.callee.as_deref(), Some("print"));

        // no variable was consumed by the void call
        assert_eq!(generator.new_variable(VariableType::Int).id, 1);
    }

    #[test]
    fn constants_get_typed_results() {
        let mut generator = TacGenerator::new();

        let int = generator.gen_const_int(3);
        let float = generator.gen_const_float(0.5).unwrap();

        assert_eq!(int.result, Variable::new(VariableType::Int, 1));
        assert_eq!(float.result, Variable::new(VariableType::Float, 2));
        assert_eq!(float.constant, Some(Constant::Float(0.5)));
        assert!(!generator.gen_return().arg1.is_used());
    }

    #[test]
    fn last_label_id_is_handed_out_once() {
        let mut generator = TacGenerator {
            variable_index: 1,
            next_label: Label::new(u64::MAX),
        };

        assert_eq!(generator.new_label().unwrap().id(), u64::MAX);

        let error = generator.new_label().unwrap_err();
        assert_eq!(error.error_type, ErrorType::Generator);
        assert!(generator.gen_label().is_err());
    }

    #[test]
    fn non_finite_float_constants_are_rejected() {
        let mut generator = TacGenerator::new();

        assert!(generator.gen_const_float(f64::INFINITY).is_err());
        assert!(generator.gen_const_float(f64::NAN).is_err());
        // no variable was consumed by the rejected constants
        assert_eq!(generator.new_variable(VariableType::Int).id, 1);
    }

    #[test]
    fn calls_to_keywords_are_rejected() {
        let mut generator = TacGenerator::new();

        let error = generator.gen_call("int", VariableType::Void).unwrap_err();
        assert_eq!(error.message, "Callee name 'int' is not a valid identifier");
    }

    #[test]
    fn arithmetic_with_non_arithmetic_op_is_rejected() {
        let mut generator = TacGenerator::new();
        let a = generator.new_variable(VariableType::Int);

        assert!(generator.gen_arithmetic(Op::Return, a, a).is_err());
    }

    #[test]
    fn add_of_mixed_types_is_rejected() {
        let mut generator = TacGenerator::new();
        let a = generator.new_variable(VariableType::Int);
        let b = generator.new_variable(VariableType::Float);

        assert!(generator.gen_add(a, b).is_err());
    }

    #[test]
    fn example_function_ops() {
        let mut generator = TacGenerator::new();
        let function = example_function(&mut generator).unwrap();

        let ops: Vec<_> = function.instructions().iter().map(|i| i.op).collect();
        assert_eq!(
            ops,
            vec![
                Op::Pop,
                Op::Const,
                Op::Const,
                Op::Add,
                Op::Add,
                Op::JumpIf,
                Op::Add,
                Op::Assign,
                Op::Jump,
                Op::Label,
                Op::Add,
                Op::Assign,
                Op::Label,
                Op::Push,
                Op::Push,
                Op::Push,
                Op::Call,
                Op::Return,
            ]
        );
        assert_eq!(function.instructions()[5].label.map(|l| l.id()), Some(1));
        assert_eq!(function.instructions()[8].label.map(|l| l.id()), Some(2));
    }
}
