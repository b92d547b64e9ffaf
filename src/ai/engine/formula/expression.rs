//! Expression AST, parser and evaluator of the formula language
//!
//! Expressions can include literals, variables, binary/unary operations,
//! conditionals and function calls. Values are [`Variant`]s, so a formula
//! can produce a number, a string, a list or an action map.
//!
//! ```text
//! if my_units < 3 then recruit('Spearman') else null
//! max(gold - 20, 0) * 100
//! ```

use std::collections::BTreeMap;
use thiserror::Error;

use crate::ai::variant::Variant;

/// Binary operators supported in expressions
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Gt,
    Lt,
    Gte,
    Lte,
    Eq,
    Neq,
    And,
    Or,
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UnaryOp {
    Neg,
    Not,
}

/// Expression AST node
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// A literal value (e.g., 42, 0.5, 'Spearman')
    Literal(Variant),
    /// A variable reference (e.g., "gold")
    Var(String),
    /// A list literal (e.g., [1, 2, 3])
    List(Vec<Expr>),
    BinOp {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    UnaryOp {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    /// if condition then true_expr else false_expr
    Conditional {
        condition: Box<Expr>,
        true_expr: Box<Expr>,
        false_expr: Box<Expr>,
    },
    /// A function call (e.g., min(a, b))
    Function {
        name: String,
        args: Vec<Expr>,
    },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    #[error("Unknown variable: {0}")]
    UnknownVariable(String),
    #[error("Unknown function: {0}")]
    UnknownFunction(String),
    #[error("Division by zero")]
    DivisionByZero,
    #[error("Integer overflow in {0}")]
    Overflow(&'static str),
    #[error("Function {func} expected {expected} args, got {got}")]
    InvalidArgCount { func: String, expected: String, got: usize },
    #[error("Cannot apply {op} to {left} and {right}")]
    TypeMismatch {
        op: String,
        left: &'static str,
        right: &'static str,
    },
}

#[derive(Error, Debug, Clone, PartialEq)]
#[error("Parse error at {position}: {message}")]
pub struct ParseError {
    pub message: String,
    pub position: usize,
}

/// Variables and domain functions visible to an expression
pub trait Bindings {
    fn variable(&self, name: &str) -> Option<Variant>;

    /// Functions beyond the built-in ones; `None` when `name` is unknown
    fn call(&self, _name: &str, _args: &[Variant]) -> Option<Result<Variant, EvalError>> {
        None
    }
}

impl Bindings for BTreeMap<String, Variant> {
    fn variable(&self, name: &str) -> Option<Variant> {
        self.get(name).cloned()
    }
}

// === LEXER ===

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Int(i64),
    Real(f64),
    Str(String),
    Ident(String),
    Op(&'static str),
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
}

const OPERATORS: [&str; 17] = [
    "&&", "||", ">=", "<=", "==", "!=", "+", "-", "*", "/", "%", ">", "<", "!", "=", "and", "or",
];

fn tokenize(input: &str) -> Result<Vec<(usize, Token)>, ParseError> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    let error = |message: String, position: usize| ParseError { message, position };

    while i < chars.len() {
        let c = chars[i];
        let start = i;
        match c {
            c if c.is_whitespace() => {
                i += 1;
                continue;
            }
            '(' => tokens.push((start, Token::LParen)),
            ')' => tokens.push((start, Token::RParen)),
            '[' => tokens.push((start, Token::LBracket)),
            ']' => tokens.push((start, Token::RBracket)),
            ',' => tokens.push((start, Token::Comma)),
            '\'' | '"' => {
                let quote = c;
                i += 1;
                let mut text = String::new();
                while i < chars.len() && chars[i] != quote {
                    text.push(chars[i]);
                    i += 1;
                }
                if i >= chars.len() {
                    return Err(error("unterminated string".into(), start));
                }
                tokens.push((start, Token::Str(text)));
            }
            c if c.is_ascii_digit() || (c == '.' && chars.get(i + 1).map_or(false, |n| n.is_ascii_digit())) => {
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                let token = if text.contains('.') {
                    Token::Real(text.parse().map_err(|_| error(format!("bad number '{}'", text), start))?)
                } else {
                    Token::Int(text.parse().map_err(|_| error(format!("bad number '{}'", text), start))?)
                };
                tokens.push((start, token));
                continue;
            }
            c if c.is_alphabetic() || c == '_' => {
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                tokens.push((start, Token::Ident(word)));
                continue;
            }
            _ => {
                let rest: String = chars[i..chars.len().min(i + 2)].iter().collect();
                let op = OPERATORS
                    .iter()
                    .filter(|op| op.chars().all(|ch| !ch.is_alphabetic()))
                    .find(|op| rest.starts_with(**op))
                    .ok_or_else(|| error(format!("unexpected character '{}'", c), start))?;
                tokens.push((start, Token::Op(op)));
                i += op.len();
                continue;
            }
        }
        i += 1;
    }
    Ok(tokens)
}

// === PARSER ===

struct Parser {
    tokens: Vec<(usize, Token)>,
    pos: usize,
    len: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(_, t)| t)
    }

    fn position(&self) -> usize {
        self.tokens.get(self.pos).map_or(self.len, |(p, _)| *p)
    }

    fn error<T>(&self, message: impl Into<String>) -> Result<T, ParseError> {
        Err(ParseError {
            message: message.into(),
            position: self.position(),
        })
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|(_, t)| t.clone());
        self.pos += 1;
        token
    }

    fn is_keyword(&self, word: &str) -> bool {
        matches!(self.peek(), Some(Token::Ident(w)) if w == word)
    }

    fn is_op(&self, op: &str) -> bool {
        matches!(self.peek(), Some(Token::Op(o)) if *o == op)
    }

    fn expect(&mut self, expected: Token, what: &str) -> Result<(), ParseError> {
        if self.peek() == Some(&expected) {
            self.pos += 1;
            Ok(())
        } else {
            self.error(format!("expected {}", what))
        }
    }

    fn expect_keyword(&mut self, word: &str) -> Result<(), ParseError> {
        if self.is_keyword(word) {
            self.pos += 1;
            Ok(())
        } else {
            self.error(format!("expected '{}'", word))
        }
    }

    fn expression(&mut self) -> Result<Expr, ParseError> {
        if self.is_keyword("if") && self.tokens.get(self.pos + 1).map(|(_, t)| t) != Some(&Token::LParen) {
            self.pos += 1;
            return self.conditional_tail();
        }
        self.or_expr()
    }

    /// After `if`: condition then a else b
    fn conditional_tail(&mut self) -> Result<Expr, ParseError> {
        let condition = self.expression()?;
        self.conditional_branches(condition)
    }

    fn conditional_branches(&mut self, condition: Expr) -> Result<Expr, ParseError> {
        self.expect_keyword("then")?;
        let true_expr = self.expression()?;
        self.expect_keyword("else")?;
        let false_expr = self.expression()?;
        Ok(Expr::Conditional {
            condition: Box::new(condition),
            true_expr: Box::new(true_expr),
            false_expr: Box::new(false_expr),
        })
    }

    fn binary(op: BinOp, left: Expr, right: Expr) -> Expr {
        Expr::BinOp {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    fn or_expr(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.and_expr()?;
        while self.is_op("||") || self.is_keyword("or") {
            self.pos += 1;
            let right = self.and_expr()?;
            left = Self::binary(BinOp::Or, left, right);
        }
        Ok(left)
    }

    fn and_expr(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.not_expr()?;
        while self.is_op("&&") || self.is_keyword("and") {
            self.pos += 1;
            let right = self.not_expr()?;
            left = Self::binary(BinOp::And, left, right);
        }
        Ok(left)
    }

    fn not_expr(&mut self) -> Result<Expr, ParseError> {
        if self.is_keyword("not") {
            self.pos += 1;
            let operand = self.not_expr()?;
            return Ok(Expr::UnaryOp {
                op: UnaryOp::Not,
                operand: Box::new(operand),
            });
        }
        self.comparison()
    }

    fn comparison(&mut self) -> Result<Expr, ParseError> {
        let left = self.additive()?;
        let op = match self.peek() {
            Some(Token::Op(">")) => BinOp::Gt,
            Some(Token::Op("<")) => BinOp::Lt,
            Some(Token::Op(">=")) => BinOp::Gte,
            Some(Token::Op("<=")) => BinOp::Lte,
            Some(Token::Op("==")) | Some(Token::Op("=")) => BinOp::Eq,
            Some(Token::Op("!=")) => BinOp::Neq,
            _ => return Ok(left),
        };
        self.pos += 1;
        let right = self.additive()?;
        Ok(Self::binary(op, left, right))
    }

    fn additive(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.multiplicative()?;
        loop {
            let op = match self.peek() {
                Some(Token::Op("+")) => BinOp::Add,
                Some(Token::Op("-")) => BinOp::Sub,
                _ => return Ok(left),
            };
            self.pos += 1;
            let right = self.multiplicative()?;
            left = Self::binary(op, left, right);
        }
    }

    fn multiplicative(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Op("*")) => BinOp::Mul,
                Some(Token::Op("/")) => BinOp::Div,
                Some(Token::Op("%")) => BinOp::Mod,
                _ => return Ok(left),
            };
            self.pos += 1;
            let right = self.unary()?;
            left = Self::binary(op, left, right);
        }
    }

    fn unary(&mut self) -> Result<Expr, ParseError> {
        let op = match self.peek() {
            Some(Token::Op("-")) => UnaryOp::Neg,
            Some(Token::Op("!")) => UnaryOp::Not,
            _ => return self.primary(),
        };
        self.pos += 1;
        let operand = self.unary()?;
        Ok(Expr::UnaryOp {
            op,
            operand: Box::new(operand),
        })
    }

    fn arguments(&mut self, close: Token, what: &str) -> Result<Vec<Expr>, ParseError> {
        let mut args = Vec::new();
        if self.peek() == Some(&close) {
            self.pos += 1;
            return Ok(args);
        }
        loop {
            args.push(self.expression()?);
            match self.advance() {
                Some(Token::Comma) => continue,
                Some(t) if t == close => return Ok(args),
                _ => {
                    self.pos -= 1;
                    return self.error(format!("expected ',' or {}", what));
                }
            }
        }
    }

    fn primary(&mut self) -> Result<Expr, ParseError> {
        match self.advance() {
            Some(Token::Int(i)) => Ok(Expr::Literal(Variant::Int(i))),
            Some(Token::Real(r)) => Ok(Expr::Literal(Variant::Real(r))),
            Some(Token::Str(s)) => Ok(Expr::Literal(Variant::Str(s))),
            Some(Token::LParen) => {
                let inner = self.expression()?;
                self.expect(Token::RParen, "')'")?;
                Ok(inner)
            }
            Some(Token::LBracket) => Ok(Expr::List(self.arguments(Token::RBracket, "']'")?)),
            Some(Token::Ident(word)) => match word.as_str() {
                "true" => Ok(Expr::Literal(Variant::Bool(true))),
                "false" => Ok(Expr::Literal(Variant::Bool(false))),
                "null" => Ok(Expr::Literal(Variant::Null)),
                _ if self.peek() == Some(&Token::LParen) => {
                    self.pos += 1;
                    let args = self.arguments(Token::RParen, "')'")?;
                    // `if (cond) then a else b` is the keyword form with a parenthesized condition
                    if word == "if" && self.is_keyword("then") && args.len() == 1 {
                        let condition = args.into_iter().next().unwrap_or(Expr::Literal(Variant::Null));
                        return self.conditional_branches(condition);
                    }
                    Ok(Expr::Function { name: word, args })
                }
                _ => Ok(Expr::Var(word)),
            },
            Some(_) => {
                self.pos -= 1;
                self.error("unexpected token")
            }
            None => self.error("unexpected end of expression"),
        }
    }
}

// === EVALUATION ===

fn mismatch(op: &str, left: &Variant, right: &Variant) -> EvalError {
    EvalError::TypeMismatch {
        op: op.to_string(),
        left: left.type_name(),
        right: right.type_name(),
    }
}

fn is_number(v: &Variant) -> bool {
    matches!(v, Variant::Int(_) | Variant::Real(_))
}

fn arithmetic(op: BinOp, left: Variant, right: Variant) -> Result<Variant, EvalError> {
    use Variant::{Int, Real};
    match (op, &left, &right) {
        (BinOp::Add, Variant::Str(_), _) | (BinOp::Add, _, Variant::Str(_)) => {
            let text = |v: &Variant| v.as_str().map_or_else(|| v.to_string(), str::to_string);
            Ok(Variant::Str(text(&left) + &text(&right)))
        }
        (BinOp::Add, Variant::List(a), Variant::List(b)) => Ok(Variant::List(a.iter().chain(b).cloned().collect())),
        (_, Int(a), Int(b)) => {
            let (a, b) = (*a, *b);
            match op {
                BinOp::Add => Ok(Int(a.wrapping_add(b))),
                BinOp::Sub => Ok(Int(a.wrapping_sub(b))),
                BinOp::Mul => Ok(Int(a.wrapping_mul(b))),
                BinOp::Div | BinOp::Mod if b == 0 => Err(EvalError::DivisionByZero),
                BinOp::Div => match (a.checked_rem(b), a.checked_div(b)) {
                    (Some(0), Some(quotient)) => Ok(Int(quotient)),
                    (Some(_), _) => Ok(Real(a as f64 / b as f64)),
                    _ => Err(EvalError::Overflow("division")),
                },
                BinOp::Mod => a.checked_rem(b).map(Int).ok_or(EvalError::Overflow("remainder")),
                _ => Err(mismatch("arithmetic", &left, &right)),
            }
        }
        _ if is_number(&left) && is_number(&right) => {
            let (a, b) = (left.as_real().unwrap_or(0.0), right.as_real().unwrap_or(0.0));
            match op {
                BinOp::Add => Ok(Real(a + b)),
                BinOp::Sub => Ok(Real(a - b)),
                BinOp::Mul => Ok(Real(a * b)),
                BinOp::Div | BinOp::Mod if b == 0.0 => Err(EvalError::DivisionByZero),
                BinOp::Div => Ok(Real(a / b)),
                BinOp::Mod => Ok(Real(a % b)),
                _ => Err(mismatch("arithmetic", &left, &right)),
            }
        }
        _ => Err(mismatch(&format!("{:?}", op), &left, &right)),
    }
}

fn compare(op: BinOp, left: &Variant, right: &Variant) -> Result<Variant, EvalError> {
    let ordering = if is_number(left) && is_number(right) {
        left.as_real()
            .unwrap_or(0.0)
            .partial_cmp(&right.as_real().unwrap_or(0.0))
    } else {
        match (left, right) {
            (Variant::Str(a), Variant::Str(b)) => Some(a.cmp(b)),
            _ if matches!(op, BinOp::Eq | BinOp::Neq) => None,
            _ => return Err(mismatch(&format!("{:?}", op), left, right)),
        }
    };
    let result = match op {
        BinOp::Eq => ordering.map_or(left == right, |o| o.is_eq()),
        BinOp::Neq => !ordering.map_or(left == right, |o| o.is_eq()),
        BinOp::Gt => ordering.map_or(false, |o| o.is_gt()),
        BinOp::Lt => ordering.map_or(false, |o| o.is_lt()),
        BinOp::Gte => ordering.map_or(false, |o| o.is_ge()),
        BinOp::Lte => ordering.map_or(false, |o| o.is_le()),
        _ => false,
    };
    Ok(Variant::Bool(result))
}

fn check_args(func: &str, args: &[Variant], min: usize, max: usize) -> Result<(), EvalError> {
    if args.len() < min || args.len() > max {
        let expected = if min == max {
            min.to_string()
        } else if max == usize::MAX {
            format!("at least {}", min)
        } else {
            format!("{}-{}", min, max)
        };
        return Err(EvalError::InvalidArgCount {
            func: func.to_string(),
            expected,
            got: args.len(),
        });
    }
    Ok(())
}

fn extreme(name: &str, args: Vec<Variant>, want_max: bool) -> Result<Variant, EvalError> {
    check_args(name, &args, 1, usize::MAX)?;
    let items = match args.as_slice() {
        [Variant::List(items)] => items.clone(),
        _ => args,
    };
    let mut best: Option<Variant> = None;
    for item in items {
        if !is_number(&item) {
            return Err(mismatch(name, &item, &item));
        }
        let replace = match &best {
            None => true,
            Some(b) => {
                let (x, y) = (item.as_real().unwrap_or(0.0), b.as_real().unwrap_or(0.0));
                if want_max {
                    x > y
                } else {
                    x < y
                }
            }
        };
        if replace {
            best = Some(item);
        }
    }
    Ok(best.unwrap_or_default())
}

fn builtin(name: &str, args: Vec<Variant>) -> Option<Result<Variant, EvalError>> {
    let result = match name {
        "min" => extreme(name, args, false),
        "max" => extreme(name, args, true),
        "abs" => check_args(name, &args, 1, 1).and_then(|_| match &args[0] {
            Variant::Int(i) => Ok(Variant::Int(i.wrapping_abs())),
            Variant::Real(r) => Ok(Variant::Real(r.abs())),
            other => Err(mismatch(name, other, other)),
        }),
        "floor" | "round" | "ceil" => check_args(name, &args, 1, 1).and_then(|_| {
            let value = args[0].as_real().ok_or_else(|| mismatch(name, &args[0], &args[0]))?;
            let rounded = match name {
                "floor" => value.floor(),
                "ceil" => value.ceil(),
                _ => value.round(),
            };
            Ok(Variant::Int(rounded as i64))
        }),
        "size" => check_args(name, &args, 1, 1).and_then(|_| match &args[0] {
            Variant::List(items) => Ok(Variant::Int(items.len() as i64)),
            Variant::Str(s) => Ok(Variant::Int(s.chars().count() as i64)),
            Variant::Map(m) => Ok(Variant::Int(m.len() as i64)),
            other => Err(mismatch(name, other, other)),
        }),
        _ => return None,
    };
    Some(result)
}

impl Expr {
    pub fn parse(input: &str) -> Result<Expr, ParseError> {
        let tokens = tokenize(input)?;
        let mut parser = Parser {
            tokens,
            pos: 0,
            len: input.len(),
        };
        let expr = parser.expression()?;
        if parser.pos < parser.tokens.len() {
            return parser.error("unexpected trailing input");
        }
        Ok(expr)
    }

    pub fn evaluate(&self, env: &dyn Bindings) -> Result<Variant, EvalError> {
        match self {
            Expr::Literal(value) => Ok(value.clone()),
            Expr::Var(name) => env
                .variable(name)
                .ok_or_else(|| EvalError::UnknownVariable(name.clone())),
            Expr::List(items) => Ok(Variant::List(
                items.iter().map(|e| e.evaluate(env)).collect::<Result<_, _>>()?,
            )),
            Expr::UnaryOp { op, operand } => {
                let value = operand.evaluate(env)?;
                match op {
                    UnaryOp::Not => Ok(Variant::Bool(!value.as_bool())),
                    UnaryOp::Neg => match value {
                        Variant::Int(i) => Ok(Variant::Int(i.wrapping_neg())),
                        Variant::Real(r) => Ok(Variant::Real(-r)),
                        other => Err(mismatch("negation", &other, &other)),
                    },
                }
            }
            Expr::BinOp { op, left, right } => match op {
                BinOp::And => Ok(Variant::Bool(left.evaluate(env)?.as_bool() && right.evaluate(env)?.as_bool())),
                BinOp::Or => Ok(Variant::Bool(left.evaluate(env)?.as_bool() || right.evaluate(env)?.as_bool())),
                BinOp::Gt | BinOp::Lt | BinOp::Gte | BinOp::Lte | BinOp::Eq | BinOp::Neq => {
                    compare(*op, &left.evaluate(env)?, &right.evaluate(env)?)
                }
                _ => arithmetic(*op, left.evaluate(env)?, right.evaluate(env)?),
            },
            Expr::Conditional {
                condition,
                true_expr,
                false_expr,
            } => {
                if condition.evaluate(env)?.as_bool() {
                    true_expr.evaluate(env)
                } else {
                    false_expr.evaluate(env)
                }
            }
            Expr::Function { name, args } if name == "if" => {
                if args.len() < 2 || args.len() > 3 {
                    return Err(EvalError::InvalidArgCount {
                        func: name.clone(),
                        expected: "2-3".into(),
                        got: args.len(),
                    });
                }
                if args[0].evaluate(env)?.as_bool() {
                    args[1].evaluate(env)
                } else {
                    args.get(2).map_or(Ok(Variant::Null), |e| e.evaluate(env))
                }
            }
            Expr::Function { name, args } => {
                let values = args.iter().map(|e| e.evaluate(env)).collect::<Result<Vec<_>, _>>()?;
                if let Some(result) = env.call(name, &values) {
                    return result;
                }
                builtin(name, values).unwrap_or_else(|| Err(EvalError::UnknownFunction(name.clone())))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn var(name: &str) -> Expr {
        Expr::Var(name.to_string())
    }

    fn eval(input: &str, vars: &[(&str, Variant)]) -> Result<Variant, EvalError> {
        let env: BTreeMap<String, Variant> = vars.iter().map(|(k, v)| (k.to_string(), v.clone())).collect();
        Expr::parse(input).unwrap().evaluate(&env)
    }

    #[test]
    fn test_literal_parsing() {
        assert_eq!(Expr::parse("42.5").unwrap(), Expr::Literal(Variant::Real(42.5)));
        assert_eq!(Expr::parse("42").unwrap(), Expr::Literal(Variant::Int(42)));
        assert_eq!(Expr::parse("'Spearman'").unwrap(), Expr::Literal(Variant::Str("Spearman".into())));
    }

    #[test]
    fn test_variable_with_underscore() {
        assert_eq!(Expr::parse("enemy_units").unwrap(), var("enemy_units"));
    }

    #[test]
    fn test_operator_precedence() {
        let result = Expr::parse("a + b * c").unwrap();
        match result {
            Expr::BinOp {
                op: BinOp::Add,
                left,
                right,
            } => {
                assert_eq!(*left, var("a"));
                assert!(matches!(*right, Expr::BinOp { op: BinOp::Mul, .. }));
            }
            other => panic!("Expected Add, got {:?}", other),
        }
    }

    #[test]
    fn test_parentheses_override_precedence() {
        let result = Expr::parse("(a + b) * c").unwrap();
        match result {
            Expr::BinOp {
                op: BinOp::Mul,
                left,
                right,
            } => {
                assert!(matches!(*left, Expr::BinOp { op: BinOp::Add, .. }));
                assert_eq!(*right, var("c"));
            }
            other => panic!("Expected Mul, got {:?}", other),
        }
    }

    #[test]
    fn test_logical_keywords_and_symbols_agree() {
        assert_eq!(Expr::parse("a && b").unwrap(), Expr::parse("a and b").unwrap());
        assert_eq!(Expr::parse("a || b").unwrap(), Expr::parse("a or b").unwrap());
        assert_eq!(Expr::parse("!a").unwrap(), Expr::parse("not a").unwrap());
    }

    #[test]
    fn test_unary_negation() {
        assert_eq!(
            Expr::parse("-x").unwrap(),
            Expr::UnaryOp {
                op: UnaryOp::Neg,
                operand: Box::new(var("x")),
            }
        );
    }

    #[test]
    fn test_conditional_forms() {
        let keyword = Expr::parse("if x > 0 then x else -x").unwrap();
        assert!(matches!(keyword, Expr::Conditional { .. }));
        let parenthesized = Expr::parse("if (x > 0) then x else -x").unwrap();
        assert_eq!(keyword, parenthesized);
        assert_eq!(eval("if x > 0 then x else -x", &[("x", Variant::Int(-4))]), Ok(Variant::Int(4)));
        assert_eq!(eval("if(x > 0, 'up', 'down')", &[("x", Variant::Int(1))]), Ok(Variant::Str("up".into())));
        assert_eq!(eval("if(false, 1)", &[]), Ok(Variant::Null));
    }

    #[test]
    fn test_nested_function_calls() {
        let vars = [("a", Variant::Int(3)), ("b", Variant::Int(7)), ("c", Variant::Int(5))];
        assert_eq!(eval("max(min(a, b), c)", &vars), Ok(Variant::Int(5)));
        assert_eq!(eval("abs(a - b)", &vars), Ok(Variant::Int(4)));
        assert_eq!(eval("max([1, 9, 4])", &[]), Ok(Variant::Int(9)));
    }

    #[test]
    fn test_whitespace_handling() {
        assert_eq!(Expr::parse("  a   +   b  ").unwrap(), Expr::parse("a+b").unwrap());
    }

    #[test]
    fn test_arithmetic_types() {
        assert_eq!(eval("7 / 2", &[]), Ok(Variant::Real(3.5)));
        assert_eq!(eval("8 / 2", &[]), Ok(Variant::Int(4)));
        assert_eq!(eval("7 % 3", &[]), Ok(Variant::Int(1)));
        assert_eq!(eval("1.5 * 2", &[]), Ok(Variant::Real(3.0)));
        assert_eq!(eval("'a' + 1", &[]), Ok(Variant::Str("a1".into())));
        assert_eq!(eval("floor(2.7)", &[]), Ok(Variant::Int(2)));
    }

    #[test]
    fn test_comparisons() {
        assert_eq!(eval("2 == 2.0", &[]), Ok(Variant::Bool(true)));
        assert_eq!(eval("'a' != 'b'", &[]), Ok(Variant::Bool(true)));
        assert_eq!(eval("3 >= 4", &[]), Ok(Variant::Bool(false)));
        assert!(matches!(eval("'a' > 1", &[]), Err(EvalError::TypeMismatch { .. })));
    }

    #[test]
    fn test_eval_errors() {
        assert_eq!(eval("1 / 0", &[]), Err(EvalError::DivisionByZero));
        assert_eq!(eval("missing", &[]), Err(EvalError::UnknownVariable("missing".into())));
        assert_eq!(eval("frobnicate(1)", &[]), Err(EvalError::UnknownFunction("frobnicate".into())));
        assert!(matches!(eval("abs(1, 2)", &[]), Err(EvalError::InvalidArgCount { .. })));
    }

    #[test]
    fn test_integer_overflow_is_an_error() {
        let min = [("m", Variant::Int(i64::MIN))];
        assert_eq!(eval("m % (0 - 1)", &min), Err(EvalError::Overflow("remainder")));
        assert_eq!(eval("m / (0 - 1)", &min), Err(EvalError::Overflow("division")));
        assert_eq!(
            eval("(0 - 9223372036854775807 - 1) % (0 - 1)", &[]),
            Err(EvalError::Overflow("remainder"))
        );
        assert_eq!(eval("m / 2", &min), Ok(Variant::Int(i64::MIN / 2)));
        assert_eq!(eval("7 % (0 - 2)", &[]), Ok(Variant::Int(1)));
    }

    #[test]
    fn test_parse_errors() {
        assert!(Expr::parse("(a + b").is_err());
        assert!(Expr::parse("a +").is_err());
        assert!(Expr::parse("'open").is_err());
        assert!(Expr::parse("a b").is_err());
        assert!(Expr::parse("if x then y").is_err());
    }

    #[test]
    fn test_eval_error_display() {
        let err = EvalError::InvalidArgCount {
            func: "min".to_string(),
            expected: "2".to_string(),
            got: 1,
        };
        assert_eq!(err.to_string(), "Function min expected 2 args, got 1");
    }
}
