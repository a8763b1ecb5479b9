use std::collections::{HashMap, HashSet};

use crate::{
    error::{Error, ErrorType, Result},
    lexer::{lex, SourceRange, Token, TokenType},
    tac::{Constant, Function, Instruction, Label, Op, Variable, VariableType},
};

/// Names and labels seen so far in the function being parsed.
#[derive(Default)]
struct FunctionScope {
    variables: HashMap<u64, VariableType>,
    labels: HashMap<Label, SourceRange>,
    jumps: Vec<(Label, SourceRange)>,
}

pub struct Parser<'a> {
    tokens: &'a [Token<'a>],
    index: usize,
    function_names: HashSet<&'a str>,
    scope: FunctionScope,
}

fn parser_error(message: String, range: SourceRange) -> Error {
    Error::new_with_range(ErrorType::Parser, message, range)
}

impl<'a> Parser<'a> {
    pub fn new(tokens: &'a [Token<'a>]) -> Self {
        Self {
            tokens,
            index: 0,
            function_names: HashSet::new(),
            scope: FunctionScope::default(),
        }
    }

    pub fn eof(&self) -> bool {
        self.index >= self.tokens.len()
    }

    fn end_range(&self) -> SourceRange {
        self.tokens
            .last()
            .map(|t| t.range)
            .unwrap_or_else(SourceRange::empty)
    }

    fn peeks(&self, i: usize) -> Result<&'a Token<'a>> {
        self.tokens.get(self.index + i).ok_or_else(|| {
            parser_error("Unexpected end of input".to_string(), self.end_range())
        })
    }

    fn peek(&self) -> Result<&'a Token<'a>> {
        self.peeks(0)
    }

    fn consume(&mut self) -> Result<&'a Token<'a>> {
        let token = self.peek()?;
        self.index += 1;
        Ok(token)
    }

    fn consume_assert(&mut self, token_type: TokenType) -> Result<&'a Token<'a>> {
        let token = self.consume()?;
        if token.token_type != token_type {
            return Err(parser_error(
                format!(
                    "Expected token {:?}, but got {:?}",
                    token_type, token.token_type
                ),
                token.range,
            ));
        }
        Ok(token)
    }

    fn parse_id(token: &Token) -> Result<u64> {
        token.value[1..].parse::<u64>().map_err(|_| {
            parser_error(format!("Identifier {} is too large", token.value), token.range)
        })
    }

    fn parse_label(&mut self) -> Result<(Label, SourceRange)> {
        let token = self.consume_assert(TokenType::Label)?;
        let label = Label::new(Self::parse_id(token)?).ok_or_else(|| {
            parser_error("Label id 0 is reserved".to_string(), token.range)
        })?;
        Ok((label, token.range))
    }

    fn parse_type(&mut self) -> Result<VariableType> {
        let token = self.consume()?;
        match token.token_type {
            TokenType::Int => Ok(VariableType::Int),
            TokenType::Float => Ok(VariableType::Float),
            _ => Err(parser_error(
                format!("Expected a type, but got {:?}", token.token_type),
                token.range,
            )),
        }
    }

    /// Parse a reference to a variable defined earlier in the function.
    fn parse_variable_ref(&mut self) -> Result<Variable> {
        let token = self.consume_assert(TokenType::Variable)?;
        let id = Self::parse_id(token)?;

        match self.scope.variables.get(&id) {
            Some(ty) => Ok(Variable::new(*ty, id)),
            None => Err(parser_error(
                format!("Use of undefined variable {}", token.value),
                token.range,
            )),
        }
    }

    fn define_variable(&mut self, token: &Token, ty: VariableType) -> Result<Variable> {
        let id = Self::parse_id(token)?;

        match self.scope.variables.insert(id, ty) {
            Some(previous) if previous != ty => Err(Error::new_with_range(
                ErrorType::TypeCheck,
                format!(
                    "Variable {} redefined with type {}, previously {}",
                    token.value, ty, previous
                ),
                token.range,
            )),
            _ => Ok(Variable::new(ty, id)),
        }
    }

    fn parse_constant(&mut self) -> Result<Constant> {
        let token = self.consume()?;
        match token.token_type {
            TokenType::IntegerLiteral => token
                .value
                .parse::<i64>()
                .map(Constant::Int)
                .map_err(|_| {
                    parser_error(format!("Invalid integer literal {}", token.value), token.range)
                }),
            TokenType::FloatLiteral => token
                .value
                .parse::<f64>()
                .map(Constant::Float)
                .map_err(|_| {
                    parser_error(format!("Invalid float literal {}", token.value), token.range)
                }),
            _ => Err(parser_error(
                format!("Expected a constant, but got {:?}", token.token_type),
                token.range,
            )),
        }
    }

    /// `vN:type = op ...`
    fn parse_definition(&mut self) -> Result<Instruction> {
        let name = self.consume_assert(TokenType::Variable)?;
        self.consume_assert(TokenType::Colon)?;
        let ty = self.parse_type()?;
        self.consume_assert(TokenType::Equals)?;

        let op_token = self.consume()?;
        let start = name.range;

        // operands are resolved before the result is defined, so `v1:int = add v1, v2`
        // only works when v1 already exists
        let instruction = match op_token.token_type {
            TokenType::Const => {
                let value = self.parse_constant()?;
                let result = self.define_variable(name, ty)?;
                Instruction::constant(result, value)
            }
            TokenType::Assign => {
                let rhs = self.parse_variable_ref()?;
                let lhs = self.define_variable(name, ty)?;
                Instruction::assign(lhs, rhs)
            }
            TokenType::Add | TokenType::Sub | TokenType::Mul | TokenType::Div => {
                let op = match op_token.token_type {
                    TokenType::Add => Op::Add,
                    TokenType::Sub => Op::Sub,
                    TokenType::Mul => Op::Mul,
                    _ => Op::Div,
                };
                let lhs = self.parse_variable_ref()?;
                self.consume_assert(TokenType::Comma)?;
                let rhs = self.parse_variable_ref()?;
                let result = self.define_variable(name, ty)?;
                Instruction::arithmetic(op, result, lhs, rhs)
            }
            TokenType::Call => {
                let callee = self.consume_assert(TokenType::Identifier)?;
                let result = self.define_variable(name, ty)?;
                Instruction::call(callee.value, result)
            }
            TokenType::Pop => {
                let result = self.define_variable(name, ty)?;
                Instruction::pop(result)
            }
            _ => {
                return Err(parser_error(
                    format!(
                        "Expected an instruction producing a value, but got {:?}",
                        op_token.token_type
                    ),
                    op_token.range,
                ))
            }
        };

        let end = self.tokens[self.index - 1].range;
        instruction.map_err(|e| e.with_range(start.expand(&end)))
    }

    fn parse_statement(&mut self) -> Result<Instruction> {
        let token = self.peek()?;

        match token.token_type {
            TokenType::Variable => self.parse_definition(),
            TokenType::Label => {
                let (label, range) = self.parse_label()?;
                self.consume_assert(TokenType::Colon)?;

                if self.scope.labels.insert(label, range).is_some() {
                    return Err(parser_error(
                        format!("Label {} is defined more than once", label),
                        range,
                    ));
                }

                Ok(Instruction::label(label))
            }
            TokenType::Jump => {
                self.consume()?;
                let (label, range) = self.parse_label()?;
                self.scope.jumps.push((label, range));
                Ok(Instruction::jump(label))
            }
            TokenType::JumpIf => {
                self.consume()?;
                let (label, range) = self.parse_label()?;
                self.consume_assert(TokenType::Comma)?;
                let condition_token = self.peek()?;
                let condition = self.parse_variable_ref()?;
                self.scope.jumps.push((label, range));
                Instruction::jump_if(label, condition)
                    .map_err(|e| e.with_range(condition_token.range))
            }
            TokenType::Call => {
                self.consume()?;
                let callee = self.consume_assert(TokenType::Identifier)?;
                Instruction::call(callee.value, Variable::unused())
                    .map_err(|e| e.with_range(callee.range))
            }
            TokenType::Return => {
                self.consume()?;

                // `return` followed by a definition returns nothing
                let returns_value = match (self.peeks(0), self.peeks(1)) {
                    (Ok(next), after) => {
                        next.token_type == TokenType::Variable
                            && !matches!(after, Ok(t) if t.token_type == TokenType::Colon)
                    }
                    _ => false,
                };

                if returns_value {
                    Ok(Instruction::ret(self.parse_variable_ref()?))
                } else {
                    Ok(Instruction::ret(Variable::unused()))
                }
            }
            TokenType::Push => {
                self.consume()?;
                let variable = self.parse_variable_ref()?;
                Instruction::push(variable)
            }
            _ => Err(parser_error(
                format!("Expected an instruction, but got {:?}", token.token_type),
                token.range,
            )),
        }
    }

    pub fn parse_function(&mut self) -> Result<Function> {
        self.scope = FunctionScope::default();

        self.consume_assert(TokenType::Fn)?;
        let name = self.consume_assert(TokenType::Identifier)?;
        if !self.function_names.insert(name.value) {
            return Err(parser_error(
                format!("Function '{}' is defined more than once", name.value),
                name.range,
            ));
        }

        self.consume_assert(TokenType::LeftBrace)?;

        let mut function = Function::new(name.value).map_err(|e| e.with_range(name.range))?;
        while self.peek()?.token_type != TokenType::RightBrace {
            function.push(self.parse_statement()?);
        }
        self.consume_assert(TokenType::RightBrace)?;

        for (label, range) in &self.scope.jumps {
            if !self.scope.labels.contains_key(label) {
                return Err(parser_error(
                    format!("Jump to undefined label {}", label),
                    *range,
                ));
            }
        }

        Ok(function)
    }
}

impl<'a> Iterator for Parser<'a> {
    type Item = Result<Function>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.eof() {
            None
        } else {
            Some(self.parse_function())
        }
    }
}

/// Lex and parse every function in `source`.
pub fn parse(source: &str) -> Result<Vec<Function>> {
    let tokens = lex(source)?;
    let parser = Parser::new(&tokens);
    parser.collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::{example_function, TacGenerator};

    fn parse_one(source: &str) -> Function {
        let mut functions = parse(source).unwrap();
        assert_eq!(functions.len(), 1);
        functions.remove(0)
    }

    fn parse_error(source: &str) -> Error {
        parse(source).unwrap_err()
    }

    #[test]
    fn empty_source() {
        assert!(parse("").unwrap().is_empty());
        assert!(parse("// just a comment").unwrap().is_empty());
    }

    #[test]
    fn empty_function() {
        let function = parse_one("fn main { }");

        assert_eq!(function.name, "main");
        assert!(function.is_empty());
    }

    #[test]
    fn definitions() {
        let function = parse_one(
            "fn f {
                v1:int = pop
                v2:int = const 3
                v3:int = div v1, v2
                v3:int = assign v1
                v4:float = call sqrt
            }",
        );

        let ops: Vec<_> = function.instructions().iter().map(|i| i.op).collect();
        assert_eq!(ops, vec![Op::Pop, Op::Const, Op::Div, Op::Assign, Op::Call]);

        let div = &function.instructions()[2];
        assert_eq!(div.result, Variable::new(VariableType::Int, 3));
        assert_eq!(div.arg1, Variable::new(VariableType::Int, 1));
        assert_eq!(div.arg2, Variable::new(VariableType::Int, 2));

        let call = &function.instructions()[4];
        assert_eq!(call.callee.as_deref(), Some("sqrt"));
        assert_eq!(call.result.ty, VariableType::Float);
    }

    #[test]
    fn control_flow() {
        let function = parse_one(
            "fn f {
                v1:int = pop
                jump_if L2, v1
                jump L1
            L1:
                return
            L2:
                return v1
            }",
        );

        let labels: Vec<_> = function
            .instructions()
            .iter()
            .map(|i| (i.op, i.label.map(|l| l.id())))
            .collect();
        assert_eq!(
            labels,
            vec![
                (Op::Pop, None),
                (Op::JumpIf, Some(2)),
                (Op::Jump, Some(1)),
                (Op::Label, Some(1)),
                (Op::Return, None),
                (Op::Label, Some(2)),
                (Op::Return, None),
            ]
        );
        assert!(!function.instructions()[4].arg1.is_used());
        assert!(function.instructions()[6].arg1.is_used());
    }

    #[test]
    fn return_before_definition_returns_nothing() {
        let function = parse_one(
            "fn f {
                v1:int = pop
                return
                v2:int = const 1
            }",
        );

        assert_eq!(function.len(), 3);
        assert!(!function.instructions()[1].arg1.is_used());
    }

    #[test]
    fn several_functions() {
        let functions = parse("fn a { return } fn b { call a }").unwrap();

        let names: Vec<_> = functions.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn printed_function_parses_back() {
        let mut generator = TacGenerator::new();
        let function = example_function(&mut generator).unwrap();

        let reparsed = parse_one(&function.to_string());
        assert_eq!(reparsed, function);
    }

    #[test]
    fn printed_float_constants_parse_back() {
        let mut generator = TacGenerator::new();
        let mut function = Function::new("floats").unwrap();

        for value in [1e300, -2.5e-7, 0.1, -0.0, f64::MAX, f64::MIN_POSITIVE] {
            function.push(generator.gen_const_float(value).unwrap());
        }

        assert_eq!(parse_one(&function.to_string()), function);
    }

    #[test]
    fn overflowing_float_literal() {
        let error = parse_error("fn f { v1:float = const 1e400 }");

        assert_eq!(error.error_type, ErrorType::TypeCheck);
        assert_eq!(error.message, "Float constant inf is not finite");
        assert_eq!(error.range, Some(SourceRange::new(7, 29)));
    }

    #[test]
    fn undefined_variable() {
        let error = parse_error("fn f { push v1 }");

        assert_eq!(error.error_type, ErrorType::Parser);
        assert_eq!(error.message, "Use of undefined variable v1");
        assert_eq!(error.range, Some(SourceRange::new(12, 14)));
    }

    #[test]
    fn undefined_label() {
        let error = parse_error("fn f { jump L7 }");

        assert_eq!(error.message, "Jump to undefined label L7");
        assert_eq!(error.range, Some(SourceRange::new(12, 14)));
    }

    #[test]
    fn duplicate_label() {
        let error = parse_error("fn f { L1: L1: }");

        assert_eq!(error.message, "Label L1 is defined more than once");
    }

    #[test]
    fn label_zero() {
        let error = parse_error("fn f { L0: }");

        assert_eq!(error.message, "Label id 0 is reserved");
    }

    #[test]
    fn type_mismatch() {
        let error = parse_error("fn f { v1:int = pop v2:float = pop v3:int = add v1, v2 }");

        assert_eq!(error.error_type, ErrorType::TypeCheck);
        assert_eq!(error.message, "Operands of ADD have different types: int and float");
    }

    #[test]
    fn float_condition() {
        let error = parse_error("fn f { v1:float = pop jump_if L1, v1 L1: }");

        assert_eq!(error.error_type, ErrorType::TypeCheck);
        assert_eq!(error.message, "Condition of JUMP_IF must have type int, found float");
    }

    #[test]
    fn redefinition_with_other_type() {
        let error = parse_error("fn f { v1:int = pop v1:float = pop }");

        assert_eq!(error.message, "Variable v1 redefined with type float, previously int");
    }

    #[test]
    fn unfinished_function() {
        let error = parse_error("fn f { v1:int = pop");

        assert_eq!(error.message, "Unexpected end of input");
    }

    #[test]
    fn duplicate_function() {
        let error = parse_error("fn f { } fn f { }");

        assert_eq!(error.message, "Function 'f' is defined more than once");
    }
}
