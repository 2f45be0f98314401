use crate::traits::Scalar;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Binary operators of the expression language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

/// Unary operators of the expression language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    Neg,
}

/// Built-in functions of one argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Func {
    Sin,
    Cos,
    Tan,
    Exp,
    Log,
    Log10,
    Sqrt,
    Abs,
}

impl Func {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "sin" => Some(Func::Sin),
            "cos" => Some(Func::Cos),
            "tan" => Some(Func::Tan),
            "exp" => Some(Func::Exp),
            "log" | "ln" => Some(Func::Log),
            "log10" => Some(Func::Log10),
            "sqrt" => Some(Func::Sqrt),
            "abs" => Some(Func::Abs),
            _ => None,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Func::Sin => "sin",
            Func::Cos => "cos",
            Func::Tan => "tan",
            Func::Exp => "exp",
            Func::Log => "log",
            Func::Log10 => "log10",
            Func::Sqrt => "sqrt",
            Func::Abs => "abs",
        }
    }
}

/// Immutable expression tree for a real-valued function of one variable.
///
/// Built by [`parse`], evaluated by [`Expr::eval`], differentiated by
/// [`Expr::derivative`]. The single free variable is `x`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    Constant(f64),
    Variable,
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Unary(UnaryOp, Box<Expr>),
    Call(Func, Box<Expr>),
}

/// Errors produced while parsing an expression string.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("expression is empty")]
    Empty,
    #[error("unexpected character '{0}'")]
    UnexpectedChar(char),
    #[error("malformed number literal \"{0}\"")]
    MalformedNumber(String),
    #[error("unknown function \"{0}\"")]
    UnknownFunction(String),
    #[error("unknown identifier \"{0}\"")]
    UnknownIdentifier(String),
    #[error("expected ')'")]
    MissingClosingParen,
    #[error("unexpected end of expression")]
    UnexpectedEnd,
    #[error("unexpected token")]
    UnexpectedToken,
    #[error("unexpected trailing input")]
    TrailingInput,
}

/// Errors produced while evaluating an expression at a point.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum EvalError {
    #[error("division by zero")]
    DivisionByZero,
    #[error("logarithm of non-positive value {0}")]
    LogOfNonPositive(f64),
    #[error("square root of negative value {0}")]
    SqrtOfNegative(f64),
    #[error("non-integer power of negative value {base}")]
    NegativeBasePower { base: f64, exponent: f64 },
    #[error("result is not finite")]
    NonFinite,
}

fn num<T: Scalar>(v: f64) -> T {
    T::from_f64(v).unwrap_or_else(T::nan)
}

fn primitive<T: Scalar>(v: T) -> f64 {
    v.to_f64().unwrap_or(f64::NAN)
}

impl Expr {
    /// Evaluates the expression at `x`.
    ///
    /// Generic over [`Scalar`] so the same tree evaluates with plain `f64`
    /// or with [`Dual`](crate::autodiff::Dual) numbers for derivatives.
    pub fn eval<T: Scalar>(&self, x: T) -> Result<T, EvalError> {
        let value = self.eval_node(x)?;
        if value.is_finite() {
            Ok(value)
        } else {
            Err(EvalError::NonFinite)
        }
    }

    fn eval_node<T: Scalar>(&self, x: T) -> Result<T, EvalError> {
        Ok(match self {
            Expr::Constant(c) => num(*c),
            Expr::Variable => x,
            Expr::Binary(op, lhs, rhs) => {
                let a = lhs.eval_node(x)?;
                let b = rhs.eval_node(x)?;
                match op {
                    BinaryOp::Add => a + b,
                    BinaryOp::Sub => a - b,
                    BinaryOp::Mul => a * b,
                    BinaryOp::Div => {
                        if primitive(b) == 0.0 {
                            return Err(EvalError::DivisionByZero);
                        }
                        a / b
                    }
                    BinaryOp::Pow => {
                        let base = primitive(a);
                        let exponent = primitive(b);
                        if base < 0.0 && exponent.fract() != 0.0 {
                            return Err(EvalError::NegativeBasePower { base, exponent });
                        }
                        a.powf(b)
                    }
                }
            }
            Expr::Unary(UnaryOp::Neg, inner) => -inner.eval_node(x)?,
            Expr::Call(func, arg) => {
                let a = arg.eval_node(x)?;
                let v = primitive(a);
                match func {
                    Func::Sin => a.sin(),
                    Func::Cos => a.cos(),
                    Func::Tan => a.tan(),
                    Func::Exp => a.exp(),
                    Func::Log => {
                        if v <= 0.0 {
                            return Err(EvalError::LogOfNonPositive(v));
                        }
                        a.ln()
                    }
                    Func::Log10 => {
                        if v <= 0.0 {
                            return Err(EvalError::LogOfNonPositive(v));
                        }
                        a.log10()
                    }
                    Func::Sqrt => {
                        if v < 0.0 {
                            return Err(EvalError::SqrtOfNegative(v));
                        }
                        a.sqrt()
                    }
                    Func::Abs => a.abs(),
                }
            }
        })
    }

    /// Returns the symbolic derivative d/dx of this expression.
    ///
    /// The result is lightly simplified (constant folding, identity
    /// elimination) so it stays readable for step-by-step display.
    pub fn derivative(&self) -> Expr {
        match self {
            Expr::Constant(_) => Expr::Constant(0.0),
            Expr::Variable => Expr::Constant(1.0),
            Expr::Binary(BinaryOp::Add, a, b) => add(a.derivative(), b.derivative()),
            Expr::Binary(BinaryOp::Sub, a, b) => sub(a.derivative(), b.derivative()),
            Expr::Binary(BinaryOp::Mul, a, b) => add(
                mul(a.derivative(), (**b).clone()),
                mul((**a).clone(), b.derivative()),
            ),
            Expr::Binary(BinaryOp::Div, a, b) => div(
                sub(
                    mul(a.derivative(), (**b).clone()),
                    mul((**a).clone(), b.derivative()),
                ),
                pow((**b).clone(), Expr::Constant(2.0)),
            ),
            Expr::Binary(BinaryOp::Pow, a, b) => match **b {
                // Power rule for a constant exponent.
                Expr::Constant(n) => mul(
                    mul(Expr::Constant(n), pow((**a).clone(), Expr::Constant(n - 1.0))),
                    a.derivative(),
                ),
                // General case: a^b * (b' * ln(a) + b * a' / a).
                _ => mul(
                    self.clone(),
                    add(
                        mul(b.derivative(), call(Func::Log, (**a).clone())),
                        mul((**b).clone(), div(a.derivative(), (**a).clone())),
                    ),
                ),
            },
            Expr::Unary(UnaryOp::Neg, a) => neg(a.derivative()),
            Expr::Call(func, a) => {
                let da = a.derivative();
                let a = (**a).clone();
                match func {
                    Func::Sin => mul(call(Func::Cos, a), da),
                    Func::Cos => neg(mul(call(Func::Sin, a), da)),
                    Func::Tan => div(da, pow(call(Func::Cos, a), Expr::Constant(2.0))),
                    Func::Exp => mul(call(Func::Exp, a), da),
                    Func::Log => div(da, a),
                    Func::Log10 => div(da, mul(a, Expr::Constant(std::f64::consts::LN_10))),
                    Func::Sqrt => div(da, mul(Expr::Constant(2.0), call(Func::Sqrt, a))),
                    Func::Abs => mul(div(a.clone(), call(Func::Abs, a)), da),
                }
            }
        }
    }
}

// Simplifying constructors used by `derivative`.

fn add(a: Expr, b: Expr) -> Expr {
    match (&a, &b) {
        (Expr::Constant(x), Expr::Constant(y)) => Expr::Constant(x + y),
        (Expr::Constant(z), _) if *z == 0.0 => b,
        (_, Expr::Constant(z)) if *z == 0.0 => a,
        _ => Expr::Binary(BinaryOp::Add, Box::new(a), Box::new(b)),
    }
}

fn sub(a: Expr, b: Expr) -> Expr {
    match (&a, &b) {
        (Expr::Constant(x), Expr::Constant(y)) => Expr::Constant(x - y),
        (_, Expr::Constant(z)) if *z == 0.0 => a,
        (Expr::Constant(z), _) if *z == 0.0 => neg(b),
        _ => Expr::Binary(BinaryOp::Sub, Box::new(a), Box::new(b)),
    }
}

fn mul(a: Expr, b: Expr) -> Expr {
    match (&a, &b) {
        (Expr::Constant(x), Expr::Constant(y)) => Expr::Constant(x * y),
        (Expr::Constant(z), _) | (_, Expr::Constant(z)) if *z == 0.0 => Expr::Constant(0.0),
        (Expr::Constant(o), _) if *o == 1.0 => b,
        (_, Expr::Constant(o)) if *o == 1.0 => a,
        _ => Expr::Binary(BinaryOp::Mul, Box::new(a), Box::new(b)),
    }
}

fn div(a: Expr, b: Expr) -> Expr {
    match (&a, &b) {
        (Expr::Constant(z), _) if *z == 0.0 => Expr::Constant(0.0),
        (_, Expr::Constant(o)) if *o == 1.0 => a,
        _ => Expr::Binary(BinaryOp::Div, Box::new(a), Box::new(b)),
    }
}

fn pow(a: Expr, b: Expr) -> Expr {
    match &b {
        Expr::Constant(z) if *z == 0.0 => Expr::Constant(1.0),
        Expr::Constant(o) if *o == 1.0 => a,
        _ => Expr::Binary(BinaryOp::Pow, Box::new(a), Box::new(b)),
    }
}

fn neg(a: Expr) -> Expr {
    match a {
        Expr::Constant(c) => Expr::Constant(-c),
        Expr::Unary(UnaryOp::Neg, inner) => *inner,
        _ => Expr::Unary(UnaryOp::Neg, Box::new(a)),
    }
}

fn call(f: Func, a: Expr) -> Expr {
    Expr::Call(f, Box::new(a))
}

// --- Display ---

impl BinaryOp {
    fn precedence(self) -> u8 {
        match self {
            BinaryOp::Add | BinaryOp::Sub => 1,
            BinaryOp::Mul | BinaryOp::Div => 2,
            BinaryOp::Pow => 3,
        }
    }

    fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Pow => "^",
        }
    }
}

impl Expr {
    fn fmt_prec(&self, f: &mut fmt::Formatter<'_>, parent: u8) -> fmt::Result {
        match self {
            Expr::Constant(c) => {
                if *c < 0.0 && parent > 0 {
                    write!(f, "({c})")
                } else {
                    write!(f, "{c}")
                }
            }
            Expr::Variable => write!(f, "x"),
            Expr::Binary(op, a, b) => {
                let prec = op.precedence();
                let parens = prec < parent;
                if parens {
                    write!(f, "(")?;
                }
                // Pow is right-associative; Sub/Div bind their right child tighter.
                let (lp, rp) = match op {
                    BinaryOp::Pow => (prec + 1, prec),
                    BinaryOp::Sub | BinaryOp::Div => (prec, prec + 1),
                    _ => (prec, prec),
                };
                a.fmt_prec(f, lp)?;
                if *op == BinaryOp::Pow {
                    write!(f, "{}", op.symbol())?;
                } else {
                    write!(f, " {} ", op.symbol())?;
                }
                b.fmt_prec(f, rp)?;
                if parens {
                    write!(f, ")")?;
                }
                Ok(())
            }
            Expr::Unary(UnaryOp::Neg, a) => {
                write!(f, "-")?;
                a.fmt_prec(f, 4)
            }
            Expr::Call(func, a) => {
                write!(f, "{}(", func.name())?;
                a.fmt_prec(f, 0)?;
                write!(f, ")")
            }
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_prec(f, 0)
    }
}

// --- Tokenizer ---

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

fn tokenize(input: &str) -> Result<Vec<Token>, ParseError> {
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
            let value = num_str
                .parse()
                .map_err(|_| ParseError::MalformedNumber(num_str.clone()))?;
            tokens.push(Token::Number(value));
        } else if c.is_alphabetic() {
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
            match c {
                '+' => tokens.push(Token::Plus),
                '-' => tokens.push(Token::Minus),
                '*' => {
                    chars.next();
                    // "**" is accepted as an alias for "^".
                    if chars.peek() == Some(&'*') {
                        chars.next();
                        tokens.push(Token::Caret);
                    } else {
                        tokens.push(Token::Star);
                    }
                    continue;
                }
                '/' => tokens.push(Token::Slash),
                '^' => tokens.push(Token::Caret),
                '(' => tokens.push(Token::LParen),
                ')' => tokens.push(Token::RParen),
                _ => return Err(ParseError::UnexpectedChar(c)),
            }
            chars.next();
        }
    }
    Ok(tokens)
}

// --- Parser ---

/// Parses an expression string into an [`Expr`] tree.
pub fn parse(input: &str) -> Result<Expr, ParseError> {
    let tokens = tokenize(input)?;
    if tokens.is_empty() {
        return Err(ParseError::Empty);
    }
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.parse_sum()?;
    if parser.pos != parser.tokens.len() {
        return Err(ParseError::TrailingInput);
    }
    Ok(expr)
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

    fn parse_sum(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_product()?;

        while let Some(token) = self.peek() {
            let op = match token {
                Token::Plus => BinaryOp::Add,
                Token::Minus => BinaryOp::Sub,
                _ => break,
            };
            self.consume();
            let right = self.parse_product()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_product(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_power()?;

        while let Some(token) = self.peek() {
            let op = match token {
                Token::Star => BinaryOp::Mul,
                Token::Slash => BinaryOp::Div,
                _ => break,
            };
            self.consume();
            let right = self.parse_power()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_power(&mut self) -> Result<Expr, ParseError> {
        let base = self.parse_unary()?;

        if let Some(Token::Caret) = self.peek() {
            self.consume();
            // Right-associative: x^2^3 parses as x^(2^3).
            let exponent = self.parse_power()?;
            return Ok(Expr::Binary(
                BinaryOp::Pow,
                Box::new(base),
                Box::new(exponent),
            ));
        }
        Ok(base)
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        if let Some(Token::Minus) = self.peek() {
            self.consume();
            let inner = self.parse_unary()?;
            return Ok(Expr::Unary(UnaryOp::Neg, Box::new(inner)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        match self.consume() {
            Some(Token::Number(n)) => Ok(Expr::Constant(n)),
            Some(Token::Identifier(name)) => {
                if let Some(Token::LParen) = self.peek() {
                    let func = Func::from_name(&name)
                        .ok_or_else(|| ParseError::UnknownFunction(name.clone()))?;
                    self.consume(); // eat '('
                    let arg = self.parse_sum()?;
                    match self.consume() {
                        Some(Token::RParen) => Ok(Expr::Call(func, Box::new(arg))),
                        _ => Err(ParseError::MissingClosingParen),
                    }
                } else {
                    match name.as_str() {
                        "x" => Ok(Expr::Variable),
                        "pi" => Ok(Expr::Constant(std::f64::consts::PI)),
                        "e" => Ok(Expr::Constant(std::f64::consts::E)),
                        _ => Err(ParseError::UnknownIdentifier(name)),
                    }
                }
            }
            Some(Token::LParen) => {
                let expr = self.parse_sum()?;
                match self.consume() {
                    Some(Token::RParen) => Ok(expr),
                    _ => Err(ParseError::MissingClosingParen),
                }
            }
            Some(_) => Err(ParseError::UnexpectedToken),
            None => Err(ParseError::UnexpectedEnd),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{parse, EvalError, Expr, ParseError};
    use crate::autodiff::Dual;
    use approx::assert_relative_eq;

    #[test]
    fn parses_and_evaluates_arithmetic() {
        let expr = parse("x^2 - 4").expect("parse");
        assert_relative_eq!(expr.eval(3.0).unwrap(), 5.0);
        assert_relative_eq!(expr.eval(-2.0).unwrap(), 0.0);

        let expr = parse("2 * x + 1 / (x + 3)").expect("parse");
        assert_relative_eq!(expr.eval(1.0).unwrap(), 2.25);
    }

    #[test]
    fn python_style_power_is_accepted() {
        let caret = parse("x^3").expect("parse");
        let stars = parse("x**3").expect("parse");
        assert_eq!(caret, stars);
    }

    #[test]
    fn power_is_right_associative() {
        let expr = parse("2^3^2").expect("parse");
        assert_relative_eq!(expr.eval(0.0).unwrap(), 512.0);
    }

    #[test]
    fn named_constants_and_functions() {
        let expr = parse("sin(pi / 2)").expect("parse");
        assert_relative_eq!(expr.eval(0.0).unwrap(), 1.0);

        let expr = parse("log(e)").expect("parse");
        assert_relative_eq!(expr.eval(0.0).unwrap(), 1.0, epsilon = 1e-15);
    }

    #[test]
    fn rejects_malformed_input() {
        assert_eq!(parse(""), Err(ParseError::Empty));
        assert_eq!(parse("   "), Err(ParseError::Empty));
        assert_eq!(parse("x +"), Err(ParseError::UnexpectedEnd));
        assert_eq!(parse("sin(x"), Err(ParseError::MissingClosingParen));
        assert_eq!(
            parse("foo(x)"),
            Err(ParseError::UnknownFunction("foo".to_string()))
        );
        assert_eq!(
            parse("y + 1"),
            Err(ParseError::UnknownIdentifier("y".to_string()))
        );
        assert_eq!(parse("x @ 2"), Err(ParseError::UnexpectedChar('@')));
        assert_eq!(
            parse("1.2.3"),
            Err(ParseError::MalformedNumber("1.2.3".to_string()))
        );
        assert_eq!(parse("x 2"), Err(ParseError::TrailingInput));
    }

    #[test]
    fn reports_domain_failures() {
        let expr = parse("1 / x").expect("parse");
        assert_eq!(expr.eval(0.0), Err(EvalError::DivisionByZero));

        let expr = parse("log(x)").expect("parse");
        assert_eq!(expr.eval(-1.0), Err(EvalError::LogOfNonPositive(-1.0)));

        let expr = parse("sqrt(x)").expect("parse");
        assert_eq!(expr.eval(-4.0), Err(EvalError::SqrtOfNegative(-4.0)));

        let expr = parse("x^0.5").expect("parse");
        assert!(matches!(
            expr.eval(-1.0),
            Err(EvalError::NegativeBasePower { .. })
        ));

        let expr = parse("exp(x)").expect("parse");
        assert_eq!(expr.eval(1e6), Err(EvalError::NonFinite));
    }

    #[test]
    fn symbolic_derivative_of_polynomial() {
        let expr = parse("x^2 - 4").expect("parse");
        let d = expr.derivative();
        assert_relative_eq!(d.eval(3.0).unwrap(), 6.0);
        assert_relative_eq!(d.eval(-1.5).unwrap(), -3.0);
    }

    #[test]
    fn symbolic_derivative_matches_dual_numbers() {
        let cases = ["x^2 * sin(x)", "exp(x) / (x + 2)", "sqrt(x) + log(x)", "tan(x)"];
        for text in cases {
            let expr = parse(text).expect("parse");
            let symbolic = expr.derivative();
            for x in [0.3, 0.7, 1.1, 1.5] {
                let dual = expr.eval(Dual::variable(x)).expect("dual eval");
                let d = symbolic.eval(x).expect("symbolic eval");
                assert_relative_eq!(dual.eps, d, epsilon = 1e-10, max_relative = 1e-10);
            }
        }
    }

    #[test]
    fn derivative_simplifies_constants() {
        let expr = parse("3 * x + 7").expect("parse");
        assert_eq!(expr.derivative(), Expr::Constant(3.0));
    }

    #[test]
    fn display_renders_infix() {
        let expr = parse("x^2 - 4").expect("parse");
        assert_eq!(expr.to_string(), "x^2 - 4");

        let expr = parse("(x + 1) * sin(x)").expect("parse");
        assert_eq!(expr.to_string(), "(x + 1) * sin(x)");

        let expr = parse("x - (x - 1)").expect("parse");
        assert_eq!(expr.to_string(), "x - (x - 1)");
    }
}
