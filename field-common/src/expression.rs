//! Scalar expression language used by every emitter and attractor parameter.
//!
//! Expressions are parsed once into an [`Expression`] tree and evaluated many
//! times against a [`Scope`]. The grammar, lowest precedence first:
//!
//! ```text
//! conditional := comparison ("?" conditional ":" conditional)?
//! comparison := additive (("==" | "!=" | "<" | "<=" | ">" | ">=") additive)*
//! additive   := term (("+" | "-") term)*
//! term       := unary (("*" | "/" | "%") unary)*
//! unary      := ("-" | "+") unary | power
//! power      := primary ("^" unary)?
//! primary    := number | name | name "(" args ")" | "(" conditional ")"
//! ```
//!
//! Comparisons yield `1` or `0`, which is what emission gates rely on. A
//! conditional takes its first branch when the condition is non-zero and not
//! NaN; only the taken branch is evaluated.
//!
//! Configuration strings arrive from untrusted links, so the parser caps the
//! token count at [`MAX_TOKENS`] and the nesting of parentheses, signs,
//! exponents and conditionals at [`MAX_DEPTH`]. Together they bound the
//! height of every tree this module builds.

use crate::error::ExpressionError;
use std::f64::consts::{E, PI};
use std::fmt;

/// Names an expression may read from its evaluation scope.
///
/// `r` is resampled for every object on every tick, `R` once per tick and
/// shared by every object in the universe.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Scope {
    /// Tick index.
    pub t: f64,
    /// Index of the object within its own collection.
    pub j: f64,
    /// Number of objects in that collection.
    pub n: f64,
    /// Per-object random value in `[0, 1)`.
    pub r: f64,
    /// Per-tick random value in `[0, 1)`, exposed as `R`.
    pub shared_r: f64,
}

impl Scope {
    /// The part of the scope shared by every object during one tick.
    pub fn shared(tick: u64, shared_r: f64) -> Self {
        Scope {
            t: tick as f64,
            shared_r,
            ..Scope::default()
        }
    }

    /// Specializes a shared scope for the `j`-th of `n` objects.
    pub fn for_item(self, j: usize, n: usize, r: f64) -> Self {
        Scope {
            j: j as f64,
            n: n as f64,
            r,
            ..self
        }
    }

    /// The tick index as an integer. Negative ticks saturate to zero.
    pub fn tick(&self) -> u64 {
        self.t as u64
    }

    /// Looks a scope variable up by the name used in expressions.
    pub fn lookup(&self, name: &str) -> Option<f64> {
        match name {
            "t" => Some(self.t),
            "j" => Some(self.j),
            "n" => Some(self.n),
            "r" => Some(self.r),
            "R" => Some(self.shared_r),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScopeVar {
    T,
    J,
    N,
    R,
    SharedR,
}

impl ScopeVar {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "t" => Some(ScopeVar::T),
            "j" => Some(ScopeVar::J),
            "n" => Some(ScopeVar::N),
            "r" => Some(ScopeVar::R),
            "R" => Some(ScopeVar::SharedR),
            _ => None,
        }
    }

    fn read(self, scope: &Scope) -> f64 {
        match self {
            ScopeVar::T => scope.t,
            ScopeVar::J => scope.j,
            ScopeVar::N => scope.n,
            ScopeVar::R => scope.r,
            ScopeVar::SharedR => scope.shared_r,
        }
    }
}

fn constant(name: &str) -> Option<f64> {
    match name {
        "pi" | "PI" => Some(PI),
        "e" | "E" => Some(E),
        "tau" => Some(2.0 * PI),
        "true" => Some(1.0),
        "false" => Some(0.0),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl BinaryOp {
    fn apply(self, a: f64, b: f64) -> f64 {
        let truth = |cond: bool| if cond { 1.0 } else { 0.0 };
        match self {
            BinaryOp::Add => a + b,
            BinaryOp::Sub => a - b,
            BinaryOp::Mul => a * b,
            BinaryOp::Div => a / b,
            BinaryOp::Mod => floored_mod(a, b),
            BinaryOp::Pow => a.powf(b),
            BinaryOp::Eq => truth(a == b),
            BinaryOp::Ne => truth(a != b),
            BinaryOp::Lt => truth(a < b),
            BinaryOp::Le => truth(a <= b),
            BinaryOp::Gt => truth(a > b),
            BinaryOp::Ge => truth(a >= b),
        }
    }
}

/// Modulo taking the sign of the divisor; `x % 0` is `x`.
fn floored_mod(a: f64, b: f64) -> f64 {
    if b == 0.0 {
        a
    } else {
        a - b * (a / b).floor()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Function {
    Sin,
    Cos,
    Tan,
    Asin,
    Acos,
    Atan,
    Atan2,
    Abs,
    Sqrt,
    Exp,
    Log,
    Floor,
    Ceil,
    Round,
    Sign,
    Pow,
    Min,
    Max,
}

enum Arity {
    Exactly(usize),
    AtLeast(usize),
}

impl Function {
    fn from_name(name: &str) -> Option<Self> {
        let f = match name {
            "sin" => Function::Sin,
            "cos" => Function::Cos,
            "tan" => Function::Tan,
            "asin" => Function::Asin,
            "acos" => Function::Acos,
            "atan" => Function::Atan,
            "atan2" => Function::Atan2,
            "abs" => Function::Abs,
            "sqrt" => Function::Sqrt,
            "exp" => Function::Exp,
            "log" => Function::Log,
            "floor" => Function::Floor,
            "ceil" => Function::Ceil,
            "round" => Function::Round,
            "sign" => Function::Sign,
            "pow" => Function::Pow,
            "min" => Function::Min,
            "max" => Function::Max,
            _ => return None,
        };
        Some(f)
    }

    fn arity(self) -> Arity {
        match self {
            Function::Atan2 | Function::Pow => Arity::Exactly(2),
            Function::Min | Function::Max => Arity::AtLeast(1),
            _ => Arity::Exactly(1),
        }
    }

    fn check_arity(self, name: &str, found: usize) -> Result<(), ExpressionError> {
        let (ok, expected) = match self.arity() {
            Arity::Exactly(k) => (found == k, k.to_string()),
            Arity::AtLeast(k) => (found >= k, format!("at least {}", k)),
        };
        if ok {
            Ok(())
        } else {
            Err(ExpressionError::Arity {
                name: name.to_string(),
                expected,
                found,
            })
        }
    }

    fn apply(self, args: &[f64]) -> f64 {
        let a = args.first().copied().unwrap_or(f64::NAN);
        let b = args.get(1).copied().unwrap_or(f64::NAN);
        match self {
            Function::Sin => a.sin(),
            Function::Cos => a.cos(),
            Function::Tan => a.tan(),
            Function::Asin => a.asin(),
            Function::Acos => a.acos(),
            Function::Atan => a.atan(),
            Function::Atan2 => a.atan2(b),
            Function::Abs => a.abs(),
            Function::Sqrt => a.sqrt(),
            Function::Exp => a.exp(),
            Function::Log => a.ln(),
            Function::Floor => a.floor(),
            Function::Ceil => a.ceil(),
            Function::Round => a.round(),
            Function::Sign => {
                if a > 0.0 {
                    1.0
                } else if a < 0.0 {
                    -1.0
                } else {
                    a
                }
            }
            Function::Pow => a.powf(b),
            Function::Min => args.iter().copied().fold(f64::INFINITY, f64::min),
            Function::Max => args.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Number(f64),
    Var(ScopeVar),
    Undefined(String),
    Neg(Box<Node>),
    Binary(BinaryOp, Box<Node>, Box<Node>),
    Call(Function, Vec<Node>),
    Conditional(Box<Node>, Box<Node>, Box<Node>),
}

impl Node {
    fn eval(&self, scope: &Scope) -> Result<f64, ExpressionError> {
        match self {
            Node::Number(v) => Ok(*v),
            Node::Var(var) => Ok(var.read(scope)),
            Node::Undefined(name) => Err(ExpressionError::UndefinedSymbol(name.clone())),
            Node::Neg(inner) => Ok(-inner.eval(scope)?),
            Node::Binary(op, lhs, rhs) => Ok(op.apply(lhs.eval(scope)?, rhs.eval(scope)?)),
            Node::Call(func, args) => {
                let values = args
                    .iter()
                    .map(|arg| arg.eval(scope))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(func.apply(&values))
            }
            Node::Conditional(cond, then, otherwise) => {
                let c = cond.eval(scope)?;
                if c != 0.0 && !c.is_nan() {
                    then.eval(scope)
                } else {
                    otherwise.eval(scope)
                }
            }
        }
    }
}

/// A parsed expression, ready to be evaluated against any number of scopes.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    root: Node,
}

impl Expression {
    /// Parses `source` into an expression tree.
    ///
    /// Unknown names parse successfully and fail at evaluation time, so an
    /// expression can be typed before the name it refers to exists.
    pub fn parse(source: &str) -> Result<Self, ExpressionError> {
        let tokens = tokenize(source)?;
        let mut parser = Parser {
            tokens,
            pos: 0,
            depth: 0,
        };
        let root = parser.conditional()?;
        match parser.peek() {
            None => Ok(Expression { root }),
            Some(token) => Err(token.unexpected()),
        }
    }

    /// Evaluates against `scope`. NaN results are reported as errors.
    pub fn eval(&self, scope: &Scope) -> Result<f64, ExpressionError> {
        let value = self.root.eval(scope)?;
        if value.is_nan() {
            Err(ExpressionError::NotANumber)
        } else {
            Ok(value)
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum TokenKind {
    Number(f64),
    Name(String),
    Op(&'static str),
    LParen,
    RParen,
    Comma,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Number(v) => write!(f, "{}", v),
            TokenKind::Name(name) => write!(f, "{}", name),
            TokenKind::Op(op) => write!(f, "{}", op),
            TokenKind::LParen => write!(f, "("),
            TokenKind::RParen => write!(f, ")"),
            TokenKind::Comma => write!(f, ","),
        }
    }
}

#[derive(Debug, Clone)]
struct Token {
    kind: TokenKind,
    pos: usize,
}

impl Token {
    fn unexpected(&self) -> ExpressionError {
        ExpressionError::UnexpectedToken {
            found: self.kind.to_string(),
            pos: self.pos,
        }
    }
}

const OPERATORS: [&str; 16] = [
    "==", "!=", "<=", ">=", "<", ">", "+", "-", "*", "/", "%", "^", "?", ":", "(", ")",
];

/// Longest accepted expression, in tokens.
pub const MAX_TOKENS: usize = 1024;

/// Deepest accepted nesting of parentheses, signs, exponents and conditionals.
pub const MAX_DEPTH: usize = 64;

fn tokenize(source: &str) -> Result<Vec<Token>, ExpressionError> {
    let chars: Vec<(usize, char)> = source.char_indices().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let (pos, ch) = chars[i];

        if ch.is_whitespace() {
            i += 1;
            continue;
        }

        if tokens.len() == MAX_TOKENS {
            return Err(ExpressionError::TooLong(MAX_TOKENS));
        }

        if ch.is_ascii_digit() || ch == '.' {
            let start = i;
            while i < chars.len() && (chars[i].1.is_ascii_digit() || chars[i].1 == '.') {
                i += 1;
            }
            // Exponent only when digits follow, so `2e` stays a parse error
            // instead of swallowing the constant `e`.
            if i < chars.len() && (chars[i].1 == 'e' || chars[i].1 == 'E') {
                let mut k = i + 1;
                if k < chars.len() && (chars[k].1 == '+' || chars[k].1 == '-') {
                    k += 1;
                }
                if k < chars.len() && chars[k].1.is_ascii_digit() {
                    i = k;
                    while i < chars.len() && chars[i].1.is_ascii_digit() {
                        i += 1;
                    }
                }
            }
            let text: String = chars[start..i].iter().map(|&(_, c)| c).collect();
            let value = text
                .parse::<f64>()
                .map_err(|_| ExpressionError::InvalidNumber(text.clone()))?;
            tokens.push(Token {
                kind: TokenKind::Number(value),
                pos,
            });
            continue;
        }

        if ch.is_alphabetic() || ch == '_' {
            let start = i;
            while i < chars.len() && (chars[i].1.is_alphanumeric() || chars[i].1 == '_') {
                i += 1;
            }
            let name: String = chars[start..i].iter().map(|&(_, c)| c).collect();
            tokens.push(Token {
                kind: TokenKind::Name(name),
                pos,
            });
            continue;
        }

        if ch == ',' {
            tokens.push(Token {
                kind: TokenKind::Comma,
                pos,
            });
            i += 1;
            continue;
        }

        let rest = &source[pos..];
        let op = OPERATORS
            .iter()
            .find(|op| rest.starts_with(**op))
            .ok_or(ExpressionError::UnexpectedChar { ch, pos })?;
        let kind = match *op {
            "(" => TokenKind::LParen,
            ")" => TokenKind::RParen,
            other => TokenKind::Op(other),
        };
        tokens.push(Token { kind, pos });
        i += op.chars().count();
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    /// Runs `parse` one nesting level deeper.
    fn nested<T>(
        &mut self,
        parse: impl FnOnce(&mut Self) -> Result<T, ExpressionError>,
    ) -> Result<T, ExpressionError> {
        if self.depth == MAX_DEPTH {
            return Err(ExpressionError::TooDeep(MAX_DEPTH));
        }
        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Result<Token, ExpressionError> {
        let token = self
            .tokens
            .get(self.pos)
            .cloned()
            .ok_or(ExpressionError::UnexpectedEnd)?;
        self.pos += 1;
        Ok(token)
    }

    fn eat_op(&mut self, candidates: &[&'static str]) -> Option<&'static str> {
        let op = match self.peek() {
            Some(Token {
                kind: TokenKind::Op(op),
                ..
            }) if candidates.contains(op) => *op,
            _ => return None,
        };
        self.pos += 1;
        Some(op)
    }

    fn expect(&mut self, kind: TokenKind) -> Result<(), ExpressionError> {
        let token = self.next()?;
        if token.kind == kind {
            Ok(())
        } else {
            Err(token.unexpected())
        }
    }

    fn conditional(&mut self) -> Result<Node, ExpressionError> {
        let cond = self.comparison()?;
        if self.eat_op(&["?"]).is_none() {
            return Ok(cond);
        }
        self.nested(|p| {
            let then = p.conditional()?;
            p.expect(TokenKind::Op(":"))?;
            let otherwise = p.conditional()?;
            Ok(Node::Conditional(Box::new(cond), Box::new(then), Box::new(otherwise)))
        })
    }

    fn comparison(&mut self) -> Result<Node, ExpressionError> {
        let mut lhs = self.additive()?;
        while let Some(op) = self.eat_op(&["==", "!=", "<", "<=", ">", ">="]) {
            let op = match op {
                "==" => BinaryOp::Eq,
                "!=" => BinaryOp::Ne,
                "<" => BinaryOp::Lt,
                "<=" => BinaryOp::Le,
                ">" => BinaryOp::Gt,
                _ => BinaryOp::Ge,
            };
            let rhs = self.additive()?;
            lhs = Node::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn additive(&mut self) -> Result<Node, ExpressionError> {
        let mut lhs = self.term()?;
        while let Some(op) = self.eat_op(&["+", "-"]) {
            let op = if op == "+" { BinaryOp::Add } else { BinaryOp::Sub };
            let rhs = self.term()?;
            lhs = Node::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn term(&mut self) -> Result<Node, ExpressionError> {
        let mut lhs = self.unary()?;
        while let Some(op) = self.eat_op(&["*", "/", "%"]) {
            let op = match op {
                "*" => BinaryOp::Mul,
                "/" => BinaryOp::Div,
                _ => BinaryOp::Mod,
            };
            let rhs = self.unary()?;
            lhs = Node::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<Node, ExpressionError> {
        match self.eat_op(&["-", "+"]) {
            Some("-") => Ok(Node::Neg(Box::new(self.nested(Self::unary)?))),
            Some(_) => self.nested(Self::unary),
            None => self.power(),
        }
    }

    fn power(&mut self) -> Result<Node, ExpressionError> {
        let base = self.primary()?;
        if self.eat_op(&["^"]).is_some() {
            let exponent = self.nested(Self::unary)?;
            return Ok(Node::Binary(BinaryOp::Pow, Box::new(base), Box::new(exponent)));
        }
        Ok(base)
    }

    fn primary(&mut self) -> Result<Node, ExpressionError> {
        let token = self.next()?;
        match token.kind {
            TokenKind::Number(v) => Ok(Node::Number(v)),
            TokenKind::LParen => {
                self.nested(|p| {
                    let inner = p.conditional()?;
                    p.expect(TokenKind::RParen)?;
                    Ok(inner)
                })
            }
            TokenKind::Name(name) => {
                if matches!(self.peek().map(|t| &t.kind), Some(TokenKind::LParen)) {
                    self.pos += 1;
                    return self.nested(|p| p.call(name));
                }
                if let Some(var) = ScopeVar::from_name(&name) {
                    Ok(Node::Var(var))
                } else if let Some(value) = constant(&name) {
                    Ok(Node::Number(value))
                } else {
                    Ok(Node::Undefined(name))
                }
            }
            _ => Err(token.unexpected()),
        }
    }

    fn call(&mut self, name: String) -> Result<Node, ExpressionError> {
        let func =
            Function::from_name(&name).ok_or_else(|| ExpressionError::UnknownFunction(name.clone()))?;

        let mut args = Vec::new();
        if matches!(self.peek().map(|t| &t.kind), Some(TokenKind::RParen)) {
            self.pos += 1;
        } else {
            loop {
                args.push(self.conditional()?);
                let token = self.next()?;
                match token.kind {
                    TokenKind::Comma => continue,
                    TokenKind::RParen => break,
                    _ => return Err(token.unexpected()),
                }
            }
        }

        func.check_arity(&name, args.len())?;
        Ok(Node::Call(func, args))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn eval(source: &str, scope: &Scope) -> Result<f64, ExpressionError> {
        Expression::parse(source)?.eval(scope)
    }

    fn eval0(source: &str) -> f64 {
        eval(source, &Scope::default()).unwrap()
    }

    #[test]
    fn arithmetic_precedence() {
        assert_eq!(eval0("1 + 2 * 3"), 7.0);
        assert_eq!(eval0("(1 + 2) * 3"), 9.0);
        assert_eq!(eval0("2 ^ 3 ^ 2"), 512.0);
        assert_eq!(eval0("-2 ^ 2"), -4.0);
        assert_eq!(eval0("2 ^ -1"), 0.5);
        assert_eq!(eval0("10 - 4 - 3"), 3.0);
        assert_eq!(eval0("1.5e2 / 3"), 50.0);
    }

    #[test]
    fn modulo_follows_divisor_sign() {
        assert_eq!(eval0("7 % 3"), 1.0);
        assert_eq!(eval0("-1 % 20"), 19.0);
        assert_eq!(eval0("5 % 0"), 5.0);
    }

    #[test]
    fn comparisons_yield_zero_or_one() {
        let scope = Scope {
            t: 40.0,
            ..Scope::default()
        };
        assert_eq!(eval("t % 20 == 0", &scope).unwrap(), 1.0);
        assert_eq!(eval("t % 20 == 1", &scope).unwrap(), 0.0);
        assert_eq!(eval("t < 41", &scope).unwrap(), 1.0);
        assert_eq!(eval("t >= 41", &scope).unwrap(), 0.0);
        assert_eq!(eval("t % 2 == true", &scope).unwrap(), 0.0);
        assert_eq!(eval0("1 != 2"), 1.0);
    }

    #[test]
    fn functions_and_constants() {
        assert_relative_eq!(eval0("sin(pi / 2)"), 1.0);
        assert_relative_eq!(eval0("cos(pi)"), -1.0);
        assert_relative_eq!(eval0("atan2(1, 1)"), PI / 4.0);
        assert_eq!(eval0("abs(-3)"), 3.0);
        assert_eq!(eval0("sqrt(16)"), 4.0);
        assert_eq!(eval0("min(3, 1, 2)"), 1.0);
        assert_eq!(eval0("max(3, 1, 2)"), 3.0);
        assert_eq!(eval0("round(2.5)"), 3.0);
        assert_eq!(eval0("true + false"), 1.0);
        assert_relative_eq!(eval0("log(e)"), 1.0);
    }

    #[test]
    fn reads_every_scope_name() {
        let scope = Scope {
            t: 1.0,
            j: 2.0,
            n: 3.0,
            r: 0.25,
            shared_r: 0.5,
        };
        assert_eq!(eval("t + j * 10 + n * 100", &scope).unwrap(), 321.0);
        assert_eq!(eval("r + R", &scope).unwrap(), 0.75);
    }

    #[test]
    fn scope_builders() {
        let scope = Scope::shared(12, 0.3).for_item(1, 4, 0.9);
        assert_eq!(scope.lookup("t"), Some(12.0));
        assert_eq!(scope.lookup("j"), Some(1.0));
        assert_eq!(scope.lookup("n"), Some(4.0));
        assert_eq!(scope.lookup("r"), Some(0.9));
        assert_eq!(scope.lookup("R"), Some(0.3));
        assert_eq!(scope.lookup("x"), None);
        assert_eq!(scope.tick(), 12);
    }

    #[test]
    fn parse_errors() {
        assert!(matches!(
            Expression::parse("1 +"),
            Err(ExpressionError::UnexpectedEnd)
        ));
        assert!(matches!(
            Expression::parse("1 $ 2"),
            Err(ExpressionError::UnexpectedChar { ch: '$', pos: 2 })
        ));
        assert!(matches!(
            Expression::parse("foo(1)"),
            Err(ExpressionError::UnknownFunction(_))
        ));
        assert!(matches!(
            Expression::parse("atan2(1)"),
            Err(ExpressionError::Arity { found: 1, .. })
        ));
        assert!(matches!(
            Expression::parse("(1 + 2"),
            Err(ExpressionError::UnexpectedEnd)
        ));
        assert!(Expression::parse("2 3").is_err());
        assert!(Expression::parse("").is_err());
    }

    #[test]
    fn conditionals() {
        let scope = Scope {
            t: 30.0,
            ..Scope::default()
        };
        assert_eq!(eval("t < 20 ? 1 : 2", &scope).unwrap(), 2.0);
        assert_eq!(eval("t > 20 ? t * 2 : 0", &scope).unwrap(), 60.0);
        // Right-associative and lowest precedence.
        assert_eq!(eval0("0 ? 1 : 0 ? 2 : 3"), 3.0);
        assert_eq!(eval0("1 + 1 ? 5 : 6"), 5.0);
        assert_eq!(eval0("max(0 ? 1 : 2, 1)"), 2.0);
        assert_eq!(eval0("(1 ? 2 : 3) * 2"), 4.0);
        // A NaN condition is false, and the branch not taken is never evaluated.
        assert_eq!(eval0("sqrt(-1) ? speed : 7"), 7.0);
        assert_eq!(eval0("1 ? 7 : speed"), 7.0);

        assert!(Expression::parse("1 ? 2").is_err());
        assert!(Expression::parse("1 ? : 2").is_err());
        assert!(Expression::parse("1 : 2").is_err());
    }

    #[test]
    fn implicit_multiplication_is_not_supported() {
        assert!(Expression::parse("2pi").is_err());
        assert!(Expression::parse("2 t").is_err());
        assert!(Expression::parse("2(3)").is_err());
    }

    #[test]
    fn nesting_is_bounded() {
        let parens = |depth: usize| format!("{}1{}", "(".repeat(depth), ")".repeat(depth));
        assert_eq!(eval0(&parens(MAX_DEPTH)), 1.0);
        assert_eq!(
            Expression::parse(&parens(MAX_DEPTH + 1)),
            Err(ExpressionError::TooDeep(MAX_DEPTH))
        );

        let signs = format!("{}1", "-".repeat(100));
        assert_eq!(Expression::parse(&signs), Err(ExpressionError::TooDeep(MAX_DEPTH)));

        let tower = vec!["2"; 100].join("^");
        assert_eq!(Expression::parse(&tower), Err(ExpressionError::TooDeep(MAX_DEPTH)));

        let calls = format!("{}1{}", "abs(".repeat(100), ")".repeat(100));
        assert_eq!(Expression::parse(&calls), Err(ExpressionError::TooDeep(MAX_DEPTH)));

        // Far past the depth limit: rejected without exhausting the stack.
        assert!(Expression::parse(&parens(100_000)).is_err());
    }

    #[test]
    fn length_is_bounded() {
        // 511 operands and 510 operators fit under the token cap.
        let long = vec!["1"; 511].join("+");
        assert_eq!(eval0(&long), 511.0);

        let too_long = vec!["1"; 5000].join("+");
        assert_eq!(
            Expression::parse(&too_long),
            Err(ExpressionError::TooLong(MAX_TOKENS))
        );
        // Whitespace does not count.
        assert_eq!(eval0(&format!("{}1", " ".repeat(5000))), 1.0);
    }

    #[test]
    fn non_ascii_input() {
        assert!(matches!(
            Expression::parse("sin(t) × 2"),
            Err(ExpressionError::UnexpectedChar { ch: '×', .. })
        ));
        // Non-ASCII letters form names, which are undefined.
        assert_eq!(
            eval("π * 2", &Scope::default()),
            Err(ExpressionError::UndefinedSymbol("π".to_string()))
        );
    }

    #[test]
    fn undefined_names_fail_at_evaluation() {
        let expr = Expression::parse("speed * 2").unwrap();
        assert_eq!(
            expr.eval(&Scope::default()),
            Err(ExpressionError::UndefinedSymbol("speed".to_string()))
        );
    }

    #[test]
    fn nan_is_an_error() {
        assert_eq!(
            eval("sqrt(-1)", &Scope::default()),
            Err(ExpressionError::NotANumber)
        );
    }
}
