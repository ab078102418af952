use crate::error::{Result, SimError};
use crate::state::StateVector;
use crate::traits::DynamicalSystem;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExpressionError {
    #[error("Expression is empty.")]
    Empty,
    #[error("Unexpected character '{0}'.")]
    UnexpectedChar(char),
    #[error("Invalid number literal '{0}'.")]
    InvalidNumber(String),
    #[error("Unexpected token {0}.")]
    UnexpectedToken(String),
    #[error("Unexpected end of expression.")]
    UnexpectedEnd,
    #[error("Expected ')'.")]
    MissingParen,
    #[error("Unknown variable or parameter: {0}")]
    UnknownSymbol(String),
    #[error("Unknown function: {0}")]
    UnknownFunction(String),
    #[error("Equation {index}: {source}")]
    InEquation {
        index: usize,
        #[source]
        source: Box<ExpressionError>,
    },
}

/// Built-in single-argument functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
    Sin,
    Cos,
    Tan,
    Exp,
    Ln,
    Log10,
    Sqrt,
    Abs,
}

impl Function {
    fn lookup(name: &str) -> Option<Self> {
        let func = match name {
            "sin" => Function::Sin,
            "cos" => Function::Cos,
            "tan" => Function::Tan,
            "exp" => Function::Exp,
            "ln" | "log" => Function::Ln,
            "log10" => Function::Log10,
            "sqrt" => Function::Sqrt,
            "abs" => Function::Abs,
            _ => return None,
        };
        Some(func)
    }

    fn apply(self, a: f64) -> f64 {
        match self {
            Function::Sin => a.sin(),
            Function::Cos => a.cos(),
            Function::Tan => a.tan(),
            Function::Exp => a.exp(),
            Function::Ln => a.ln(),
            Function::Log10 => a.log10(),
            Function::Sqrt => a.sqrt(),
            Function::Abs => a.abs(),
        }
    }
}

/// OpCodes for the Stack-based Virtual Machine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OpCode {
    /// Pushes a constant value onto the stack.
    LoadConst(f64),
    /// Pushes the current time `t`.
    LoadTime,
    /// Pushes the value of a state variable (by index) onto the stack.
    LoadVar(usize),
    /// Pushes the value of a parameter (by index) onto the stack.
    LoadParam(usize),
    /// Pops top two values (b, a), pushes (a + b).
    Add,
    /// Pops top two values (b, a), pushes (a - b).
    Sub,
    /// Pops top two values (b, a), pushes (a * b).
    Mul,
    /// Pops top two values (b, a), pushes (a / b).
    Div,
    /// Pops top two values (b, a), pushes (a ^ b).
    Pow,
    /// Pops top value (a), pushes -a.
    Neg,
    /// Pops top value (a), pushes f(a).
    Call(Function),
}

/// Represents a compiled sequence of operations.
#[derive(Debug, Clone, PartialEq)]
pub struct Bytecode {
    pub ops: Vec<OpCode>,
    max_depth: usize,
}

impl Bytecode {
    fn new(ops: Vec<OpCode>) -> Self {
        let mut depth = 0usize;
        let mut max_depth = 0usize;
        for op in &ops {
            match op {
                OpCode::LoadConst(_)
                | OpCode::LoadTime
                | OpCode::LoadVar(_)
                | OpCode::LoadParam(_) => depth += 1,
                OpCode::Add | OpCode::Sub | OpCode::Mul | OpCode::Div | OpCode::Pow => {
                    depth = depth.saturating_sub(1)
                }
                OpCode::Neg | OpCode::Call(_) => {}
            }
            max_depth = max_depth.max(depth);
        }
        Self { ops, max_depth }
    }
}

/// Stack-based Virtual Machine for evaluating equations.
///
/// Evaluation takes every input explicitly and allocates its own stack, so a
/// single compiled `Bytecode` can be shared between threads.
pub struct VM;

impl VM {
    pub fn execute(bytecode: &Bytecode, t: f64, vars: &[f64], params: &[f64]) -> f64 {
        let mut stack: Vec<f64> = Vec::with_capacity(bytecode.max_depth);

        // Compiled code is balanced, so pops never run dry; NaN marks a bug
        // rather than aborting the run.
        fn pop(stack: &mut Vec<f64>) -> f64 {
            stack.pop().unwrap_or(f64::NAN)
        }

        for op in &bytecode.ops {
            match *op {
                OpCode::LoadConst(val) => stack.push(val),
                OpCode::LoadTime => stack.push(t),
                OpCode::LoadVar(idx) => stack.push(vars.get(idx).copied().unwrap_or(f64::NAN)),
                OpCode::LoadParam(idx) => {
                    stack.push(params.get(idx).copied().unwrap_or(f64::NAN))
                }
                OpCode::Add | OpCode::Sub | OpCode::Mul | OpCode::Div | OpCode::Pow => {
                    let b = pop(&mut stack);
                    let a = pop(&mut stack);
                    stack.push(match op {
                        OpCode::Add => a + b,
                        OpCode::Sub => a - b,
                        OpCode::Mul => a * b,
                        OpCode::Div => a / b,
                        _ => a.powf(b),
                    });
                }
                OpCode::Neg => {
                    let a = pop(&mut stack);
                    stack.push(-a);
                }
                OpCode::Call(func) => {
                    let a = pop(&mut stack);
                    stack.push(func.apply(a));
                }
            }
        }

        pop(&mut stack)
    }
}

// --- AST & Parser ---

/// Abstract Syntax Tree nodes for expressions.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Variable(String),
    Binary(Box<Expr>, char, Box<Expr>),
    Negate(Box<Expr>),
    Call(String, Box<Expr>),
}

const TIME_SYMBOL: &str = "t";

/// Compiles an AST (`Expr`) into `Bytecode`.
/// Resolves variable and parameter names to indices. State variables shadow
/// parameters, which shadow the time symbol `t` and the constants `pi`, `e`.
pub struct Compiler {
    pub var_map: HashMap<String, usize>,
    pub param_map: HashMap<String, usize>,
}

impl Compiler {
    pub fn new(var_names: &[String], param_names: &[String]) -> Self {
        let var_map = var_names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i))
            .collect();
        let param_map = param_names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i))
            .collect();
        Self { var_map, param_map }
    }

    pub fn compile(&self, expr: &Expr) -> std::result::Result<Bytecode, ExpressionError> {
        let mut ops = Vec::new();
        self.compile_recursive(expr, &mut ops)?;
        Ok(Bytecode::new(ops))
    }

    fn compile_recursive(
        &self,
        expr: &Expr,
        ops: &mut Vec<OpCode>,
    ) -> std::result::Result<(), ExpressionError> {
        match expr {
            Expr::Number(n) => ops.push(OpCode::LoadConst(*n)),
            Expr::Variable(name) => ops.push(self.resolve(name)?),
            Expr::Binary(left, op, right) => {
                self.compile_recursive(left, ops)?;
                self.compile_recursive(right, ops)?;
                ops.push(match op {
                    '+' => OpCode::Add,
                    '-' => OpCode::Sub,
                    '*' => OpCode::Mul,
                    '/' => OpCode::Div,
                    '^' => OpCode::Pow,
                    other => return Err(ExpressionError::UnexpectedToken(format!("'{other}'"))),
                });
            }
            Expr::Negate(operand) => {
                self.compile_recursive(operand, ops)?;
                ops.push(OpCode::Neg);
            }
            Expr::Call(func, arg) => {
                let function = Function::lookup(func)
                    .ok_or_else(|| ExpressionError::UnknownFunction(func.clone()))?;
                self.compile_recursive(arg, ops)?;
                ops.push(OpCode::Call(function));
            }
        }
        Ok(())
    }

    fn resolve(&self, name: &str) -> std::result::Result<OpCode, ExpressionError> {
        if let Some(&idx) = self.var_map.get(name) {
            return Ok(OpCode::LoadVar(idx));
        }
        if let Some(&idx) = self.param_map.get(name) {
            return Ok(OpCode::LoadParam(idx));
        }
        match name {
            TIME_SYMBOL => Ok(OpCode::LoadTime),
            "pi" => Ok(OpCode::LoadConst(std::f64::consts::PI)),
            "e" => Ok(OpCode::LoadConst(std::f64::consts::E)),
            _ => Err(ExpressionError::UnknownSymbol(name.to_string())),
        }
    }
}

// --- Simple Parser ---

/// Parses a string expression into an AST.
pub fn parse(input: &str) -> std::result::Result<Expr, ExpressionError> {
    let tokens = tokenize(input)?;
    if tokens.is_empty() {
        return Err(ExpressionError::Empty);
    }
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.parse_expression()?;
    match parser.peek() {
        None => Ok(expr),
        Some(token) => Err(ExpressionError::UnexpectedToken(token.describe())),
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Identifier(String),
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    LParen,
    RParen,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Number(n) => format!("'{n}'"),
            Token::Identifier(name) => format!("'{name}'"),
            Token::Plus => "'+'".to_string(),
            Token::Minus => "'-'".to_string(),
            Token::Star => "'*'".to_string(),
            Token::Slash => "'/'".to_string(),
            Token::Caret => "'^'".to_string(),
            Token::LParen => "'('".to_string(),
            Token::RParen => "')'".to_string(),
        }
    }
}

fn tokenize(input: &str) -> std::result::Result<Vec<Token>, ExpressionError> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
        } else if c.is_ascii_digit() || c == '.' {
            let mut num_str = String::new();
            while let Some(&d) = chars.peek() {
                if d.is_ascii_digit() || d == '.' {
                    num_str.push(d);
                    chars.next();
                } else {
                    break;
                }
            }
            // Exponent part, only when digits follow: "2e-3" but not "2e".
            if matches!(chars.peek(), Some('e') | Some('E')) {
                let mut lookahead = chars.clone();
                let mut exponent = String::new();
                if let Some(e) = lookahead.next() {
                    exponent.push(e);
                }
                if let Some(&sign) = lookahead.peek() {
                    if sign == '+' || sign == '-' {
                        exponent.push(sign);
                        lookahead.next();
                    }
                }
                if lookahead.peek().is_some_and(|d| d.is_ascii_digit()) {
                    while let Some(&d) = lookahead.peek() {
                        if !d.is_ascii_digit() {
                            break;
                        }
                        exponent.push(d);
                        lookahead.next();
                    }
                    num_str.push_str(&exponent);
                    chars = lookahead;
                }
            }
            let value = num_str
                .parse()
                .map_err(|_| ExpressionError::InvalidNumber(num_str.clone()))?;
            tokens.push(Token::Number(value));
        } else if c.is_alphabetic() || c == '_' {
            let mut ident = String::new();
            while let Some(&d) = chars.peek() {
                if d.is_alphanumeric() || d == '_' {
                    ident.push(d);
                    chars.next();
                } else {
                    break;
                }
            }
            tokens.push(Token::Identifier(ident));
        } else {
            let token = match c {
                '+' => Token::Plus,
                '-' => Token::Minus,
                '*' => Token::Star,
                '/' => Token::Slash,
                '^' => Token::Caret,
                '(' => Token::LParen,
                ')' => Token::RParen,
                other => return Err(ExpressionError::UnexpectedChar(other)),
            };
            tokens.push(token);
            chars.next();
        }
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn consume(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn expect_rparen(&mut self) -> std::result::Result<(), ExpressionError> {
        match self.consume() {
            Some(Token::RParen) => Ok(()),
            _ => Err(ExpressionError::MissingParen),
        }
    }

    // expression := term (('+' | '-') term)*
    fn parse_expression(&mut self) -> std::result::Result<Expr, ExpressionError> {
        let mut left = self.parse_term()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => '+',
                Some(Token::Minus) => '-',
                _ => break,
            };
            self.consume();
            let right = self.parse_term()?;
            left = Expr::Binary(Box::new(left), op, Box::new(right));
        }
        Ok(left)
    }

    // term := unary (('*' | '/')? unary)*
    // A primary directly after an operand multiplies it: `2y0`, `3(x + 1)`.
    fn parse_term(&mut self) -> std::result::Result<Expr, ExpressionError> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => '*',
                Some(Token::Slash) => '/',
                Some(Token::Number(_) | Token::Identifier(_) | Token::LParen) => {
                    let right = self.parse_unary()?;
                    left = Expr::Binary(Box::new(left), '*', Box::new(right));
                    continue;
                }
                _ => break,
            };
            self.consume();
            let right = self.parse_unary()?;
            left = Expr::Binary(Box::new(left), op, Box::new(right));
        }
        Ok(left)
    }

    // unary := ('-' | '+') unary | power
    fn parse_unary(&mut self) -> std::result::Result<Expr, ExpressionError> {
        match self.peek() {
            Some(Token::Minus) => {
                self.consume();
                Ok(Expr::Negate(Box::new(self.parse_unary()?)))
            }
            Some(Token::Plus) => {
                self.consume();
                self.parse_unary()
            }
            _ => self.parse_power(),
        }
    }

    // power := primary ('^' unary)?, so -x^2 == -(x^2) and 2^3^2 == 2^(3^2)
    fn parse_power(&mut self) -> std::result::Result<Expr, ExpressionError> {
        let base = self.parse_primary()?;
        if let Some(Token::Caret) = self.peek() {
            self.consume();
            let exponent = self.parse_unary()?;
            return Ok(Expr::Binary(Box::new(base), '^', Box::new(exponent)));
        }
        Ok(base)
    }

    fn parse_primary(&mut self) -> std::result::Result<Expr, ExpressionError> {
        match self.consume() {
            Some(Token::Number(n)) => Ok(Expr::Number(n)),
            Some(Token::Identifier(name)) => {
                if let Some(Token::LParen) = self.peek() {
                    self.consume(); // eat '('
                    let arg = self.parse_expression()?;
                    self.expect_rparen()?;
                    Ok(Expr::Call(name, Box::new(arg)))
                } else {
                    Ok(Expr::Variable(name))
                }
            }
            Some(Token::LParen) => {
                let expr = self.parse_expression()?;
                self.expect_rparen()?;
                Ok(expr)
            }
            Some(token) => Err(ExpressionError::UnexpectedToken(token.describe())),
            None => Err(ExpressionError::UnexpectedEnd),
        }
    }
}

// --- EquationSystem ---

/// Default state variable names, `y0 .. y{n-1}`.
pub fn default_var_names(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("y{i}")).collect()
}

/// A `DynamicalSystem` built from user formulas.
/// Contains one compiled bytecode expression per state variable; every
/// component is evaluated at the same `(t, y)`, in component order.
#[derive(Debug, Clone)]
pub struct EquationSystem {
    pub equations: Vec<Bytecode>,
    pub params: Vec<f64>,
    var_names: Vec<String>,
}

impl EquationSystem {
    pub fn new(equations: Vec<Bytecode>, params: Vec<f64>) -> Self {
        let var_names = default_var_names(equations.len());
        Self {
            equations,
            params,
            var_names,
        }
    }

    /// Parses and compiles one formula per state variable.
    ///
    /// `var_names` defaults to `y0, y1, ...` when `None`. `params` pairs each
    /// parameter name with its value.
    pub fn from_strings<S: AsRef<str>>(
        equations: &[S],
        var_names: Option<&[String]>,
        params: &[(String, f64)],
    ) -> Result<Self> {
        if equations.is_empty() {
            return Err(SimError::EmptySystem);
        }
        let var_names = match var_names {
            Some(names) if names.len() != equations.len() => {
                return Err(SimError::LengthMismatch {
                    left: equations.len(),
                    right: names.len(),
                })
            }
            Some(names) => names.to_vec(),
            None => default_var_names(equations.len()),
        };
        let param_names: Vec<String> = params.iter().map(|(name, _)| name.clone()).collect();
        let param_values: Vec<f64> = params.iter().map(|(_, value)| *value).collect();

        let compiler = Compiler::new(&var_names, &param_names);
        let mut bytecodes = Vec::with_capacity(equations.len());
        for (index, eq_str) in equations.iter().enumerate() {
            let compiled = parse(eq_str.as_ref())
                .and_then(|expr| compiler.compile(&expr))
                .map_err(|source| ExpressionError::InEquation {
                    index,
                    source: Box::new(source),
                })?;
            bytecodes.push(compiled);
        }

        Ok(Self {
            equations: bytecodes,
            params: param_values,
            var_names,
        })
    }

    pub fn var_names(&self) -> &[String] {
        &self.var_names
    }
}

impl DynamicalSystem for EquationSystem {
    fn dimension(&self) -> usize {
        self.equations.len()
    }

    fn derivative(&self, t: f64, y: &StateVector) -> Result<StateVector> {
        if y.len() != self.equations.len() {
            return Err(SimError::LengthMismatch {
                left: self.equations.len(),
                right: y.len(),
            });
        }
        let vars = y.as_slice();
        Ok(self
            .equations
            .iter()
            .map(|eq| VM::execute(eq, t, vars, &self.params))
            .collect::<Vec<_>>()
            .into())
    }
}
