//! Restricted formula evaluator
//!
//! Grammar: numeric literals, variable identifiers, `+ - * /`, unary minus,
//! parentheses, one optional comparison (`== != < <= > >=`, yielding 1.0 or
//! 0.0), and `min`/`max` over two or more arguments. No assignment, no
//! loops, no side effects; evaluation is a pure, terminating function of the
//! formula text and the supplied bindings, which is what makes replay
//! deterministic.

use crate::error::EvaluationError;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
    Comma,
    Lt,
    Le,
    Gt,
    Ge,
    EqEq,
    NotEq,
}

fn tokenize(input: &str) -> Result<Vec<Token>, EvaluationError> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            ' ' | '\t' | '\n' | '\r' => {
                chars.next();
            }
            '+' => {
                chars.next();
                tokens.push(Token::Plus);
            }
            '-' => {
                chars.next();
                tokens.push(Token::Minus);
            }
            '*' => {
                chars.next();
                tokens.push(Token::Star);
            }
            '/' => {
                chars.next();
                tokens.push(Token::Slash);
            }
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            ',' => {
                chars.next();
                tokens.push(Token::Comma);
            }
            '<' => {
                chars.next();
                if chars.peek() == Some(&'=') {
                    chars.next();
                    tokens.push(Token::Le);
                } else {
                    tokens.push(Token::Lt);
                }
            }
            '>' => {
                chars.next();
                if chars.peek() == Some(&'=') {
                    chars.next();
                    tokens.push(Token::Ge);
                } else {
                    tokens.push(Token::Gt);
                }
            }
            '=' => {
                chars.next();
                if chars.peek() == Some(&'=') {
                    chars.next();
                    tokens.push(Token::EqEq);
                } else {
                    return Err(EvaluationError::Malformed {
                        detail: "assignment is not supported; use '=='".to_string(),
                    });
                }
            }
            '!' => {
                chars.next();
                if chars.peek() == Some(&'=') {
                    chars.next();
                    tokens.push(Token::NotEq);
                } else {
                    return Err(EvaluationError::Malformed {
                        detail: "unexpected '!'".to_string(),
                    });
                }
            }
            '0'..='9' | '.' => {
                let mut text = String::new();
                while let Some(&d) = chars.peek() {
                    if d.is_ascii_digit() || d == '.' {
                        text.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let value = text.parse::<f64>().map_err(|_| EvaluationError::Malformed {
                    detail: format!("invalid number '{text}'"),
                })?;
                tokens.push(Token::Number(value));
            }
            c if c.is_alphabetic() || c == '_' => {
                let mut name = String::new();
                while let Some(&d) = chars.peek() {
                    if d.is_alphanumeric() || d == '_' {
                        name.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Ident(name));
            }
            other => {
                return Err(EvaluationError::Malformed {
                    detail: format!("unexpected character '{other}'"),
                })
            }
        }
    }
    Ok(tokens)
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Func {
    Min,
    Max,
}

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Number(f64),
    Var(String),
    Neg(Box<Expr>),
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Call {
        func: Func,
        args: Vec<Expr>,
    },
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn expect(&mut self, token: &Token, context: &str) -> Result<(), EvaluationError> {
        match self.advance() {
            Some(found) if &found == token => Ok(()),
            other => Err(EvaluationError::Malformed {
                detail: format!("expected {context}, found {other:?}"),
            }),
        }
    }

    /// comparison := additive (cmp-op additive)?
    ///
    /// Comparisons do not chain; `a < b < c` is rejected.
    fn comparison(&mut self) -> Result<Expr, EvaluationError> {
        let lhs = self.additive()?;
        let op = match self.peek() {
            Some(Token::Lt) => BinaryOp::Lt,
            Some(Token::Le) => BinaryOp::Le,
            Some(Token::Gt) => BinaryOp::Gt,
            Some(Token::Ge) => BinaryOp::Ge,
            Some(Token::EqEq) => BinaryOp::Eq,
            Some(Token::NotEq) => BinaryOp::Ne,
            _ => return Ok(lhs),
        };
        self.advance();
        let rhs = self.additive()?;
        Ok(Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        })
    }

    fn additive(&mut self) -> Result<Expr, EvaluationError> {
        let mut lhs = self.term()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Sub,
                _ => return Ok(lhs),
            };
            self.advance();
            let rhs = self.term()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
    }

    fn term(&mut self) -> Result<Expr, EvaluationError> {
        let mut lhs = self.factor()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinaryOp::Mul,
                Some(Token::Slash) => BinaryOp::Div,
                _ => return Ok(lhs),
            };
            self.advance();
            let rhs = self.factor()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
    }

    fn factor(&mut self) -> Result<Expr, EvaluationError> {
        match self.advance() {
            Some(Token::Number(n)) => Ok(Expr::Number(n)),
            Some(Token::Minus) => Ok(Expr::Neg(Box::new(self.factor()?))),
            Some(Token::LParen) => {
                let inner = self.comparison()?;
                self.expect(&Token::RParen, "')'")?;
                Ok(inner)
            }
            Some(Token::Ident(name)) => {
                if self.peek() == Some(&Token::LParen) {
                    self.advance();
                    let func = match name.as_str() {
                        "min" => Func::Min,
                        "max" => Func::Max,
                        _ => return Err(EvaluationError::UnknownFunction { name }),
                    };
                    let args = self.arguments()?;
                    if args.len() < 2 {
                        return Err(EvaluationError::ArityMismatch {
                            function: name,
                            minimum: 2,
                            found: args.len(),
                        });
                    }
                    Ok(Expr::Call { func, args })
                } else {
                    Ok(Expr::Var(name))
                }
            }
            other => Err(EvaluationError::Malformed {
                detail: format!("unexpected token {other:?}"),
            }),
        }
    }

    fn arguments(&mut self) -> Result<Vec<Expr>, EvaluationError> {
        let mut args = Vec::new();
        if self.peek() == Some(&Token::RParen) {
            self.advance();
            return Ok(args);
        }
        loop {
            args.push(self.comparison()?);
            match self.advance() {
                Some(Token::Comma) => {}
                Some(Token::RParen) => return Ok(args),
                other => {
                    return Err(EvaluationError::Malformed {
                        detail: format!("expected ',' or ')', found {other:?}"),
                    })
                }
            }
        }
    }
}

fn parse(formula: &str) -> Result<Expr, EvaluationError> {
    let tokens = tokenize(formula)?;
    if tokens.is_empty() {
        return Err(EvaluationError::Malformed {
            detail: "empty formula".to_string(),
        });
    }
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.comparison()?;
    if parser.pos != parser.tokens.len() {
        return Err(EvaluationError::Malformed {
            detail: format!("trailing input after expression: {:?}", parser.peek()),
        });
    }
    Ok(expr)
}

fn eval_expr(expr: &Expr, bindings: &HashMap<String, f64>) -> Result<f64, EvaluationError> {
    match expr {
        Expr::Number(n) => Ok(*n),
        Expr::Var(name) => bindings
            .get(name)
            .copied()
            .ok_or_else(|| EvaluationError::UnknownIdentifier { name: name.clone() }),
        Expr::Neg(inner) => Ok(-eval_expr(inner, bindings)?),
        Expr::Binary { op, lhs, rhs } => {
            let l = eval_expr(lhs, bindings)?;
            let r = eval_expr(rhs, bindings)?;
            match op {
                BinaryOp::Add => Ok(l + r),
                BinaryOp::Sub => Ok(l - r),
                BinaryOp::Mul => Ok(l * r),
                BinaryOp::Div => {
                    if r == 0.0 {
                        Err(EvaluationError::DivisionByZero)
                    } else {
                        Ok(l / r)
                    }
                }
                BinaryOp::Lt => Ok(bool_value(l < r)),
                BinaryOp::Le => Ok(bool_value(l <= r)),
                BinaryOp::Gt => Ok(bool_value(l > r)),
                BinaryOp::Ge => Ok(bool_value(l >= r)),
                BinaryOp::Eq => Ok(bool_value(l == r)),
                BinaryOp::Ne => Ok(bool_value(l != r)),
            }
        }
        Expr::Call { func, args } => {
            // Arity was checked at parse time; arguments fold positionally
            // so the first argument wins any tie.
            let mut result = eval_expr(&args[0], bindings)?;
            for arg in &args[1..] {
                let value = eval_expr(arg, bindings)?;
                result = match func {
                    Func::Min => {
                        if value < result {
                            value
                        } else {
                            result
                        }
                    }
                    Func::Max => {
                        if value > result {
                            value
                        } else {
                            result
                        }
                    }
                };
            }
            Ok(result)
        }
    }
}

fn bool_value(b: bool) -> f64 {
    if b {
        1.0
    } else {
        0.0
    }
}

/// Evaluate a formula against numeric bindings.
///
/// # Errors
/// `EvaluationError` on unknown identifiers or functions, arity violations,
/// division by zero, or formulas outside the restricted grammar.
pub fn evaluate(formula: &str, bindings: &HashMap<String, f64>) -> Result<f64, EvaluationError> {
    let expr = parse(formula)?;
    eval_expr(&expr, bindings)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bindings(entries: &[(&str, f64)]) -> HashMap<String, f64> {
        entries.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn min_over_literals() {
        assert_eq!(evaluate("min(3000,2800)", &HashMap::new()).unwrap(), 2800.0);
    }

    #[test]
    fn min_over_variables() {
        let b = bindings(&[("a", 2800.0), ("b", 3200.0)]);
        assert_eq!(evaluate("min(a,b)", &b).unwrap(), 2800.0);
    }

    #[test]
    fn max_with_many_arguments() {
        let b = bindings(&[("x", 5.0)]);
        assert_eq!(evaluate("max(1, x, 3, 2*x)", &b).unwrap(), 10.0);
    }

    #[test]
    fn arithmetic_precedence() {
        assert_eq!(evaluate("2+3*4", &HashMap::new()).unwrap(), 14.0);
        assert_eq!(evaluate("(2+3)*4", &HashMap::new()).unwrap(), 20.0);
        assert_eq!(evaluate("-2*3", &HashMap::new()).unwrap(), -6.0);
    }

    #[test]
    fn comparisons_yield_zero_or_one() {
        let b = bindings(&[("a", 1.0), ("b", 2.0)]);
        assert_eq!(evaluate("a < b", &b).unwrap(), 1.0);
        assert_eq!(evaluate("a >= b", &b).unwrap(), 0.0);
        assert_eq!(evaluate("a != b", &b).unwrap(), 1.0);
    }

    #[test]
    fn division_by_zero_fails() {
        let b = bindings(&[("a", 1.0), ("b", 0.0)]);
        assert_eq!(evaluate("a/b", &b), Err(EvaluationError::DivisionByZero));
    }

    #[test]
    fn unknown_identifier_fails() {
        assert_eq!(
            evaluate("missing + 1", &HashMap::new()),
            Err(EvaluationError::UnknownIdentifier {
                name: "missing".to_string()
            })
        );
    }

    #[test]
    fn min_requires_two_arguments() {
        assert_eq!(
            evaluate("min(3)", &HashMap::new()),
            Err(EvaluationError::ArityMismatch {
                function: "min".to_string(),
                minimum: 2,
                found: 1
            })
        );
    }

    #[test]
    fn unknown_function_fails() {
        assert_eq!(
            evaluate("sqrt(4, 2)", &HashMap::new()),
            Err(EvaluationError::UnknownFunction {
                name: "sqrt".to_string()
            })
        );
    }

    #[test]
    fn assignment_is_rejected() {
        assert!(matches!(
            evaluate("a = 1", &bindings(&[("a", 0.0)])),
            Err(EvaluationError::Malformed { .. })
        ));
    }

    #[test]
    fn chained_comparison_is_rejected() {
        assert!(matches!(
            evaluate("1 < 2 < 3", &HashMap::new()),
            Err(EvaluationError::Malformed { .. })
        ));
    }

    #[test]
    fn evaluation_is_idempotent() {
        let b = bindings(&[("P_max_send", 3000.0), ("P_max_receive", 2800.0)]);
        let first = evaluate("min(P_max_send,P_max_receive)", &b).unwrap();
        let second = evaluate("min(P_max_send,P_max_receive)", &b).unwrap();
        assert_eq!(first, second);
        assert_eq!(first, 2800.0);
    }
}
