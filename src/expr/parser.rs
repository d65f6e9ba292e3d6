//! Recursive-descent, precedence-climbing parser for arithmetic and
//! relational expressions (spec.md §4.3.1).
//!
//! The climbing loop follows the same `min_prec` threading as
//! `lang::parser::Parser::parse_expr_prec`; the operator table and
//! primary-expression grammar are specific to `fluxcore`'s arithmetic
//! surface.

use crate::error::{ExprError, Pos};
use crate::name::name;

use super::node::{BinOp, Expr, UnOp};
use super::scanner::{Scanner, Tok};

pub struct Parser<'a> {
    scanner: Scanner<'a>,
    cur: Tok,
    cur_pos: Pos,
}

/// Parses a complete arithmetic or relational expression, requiring the
/// input to be fully consumed.
pub fn parse_expr(s: &str) -> Result<Expr, ExprError> {
    let mut p = Parser::new(s)?;
    let e = p.parse_expr_prec(0)?;
    if p.cur != Tok::Eof {
        return Err(ExprError::Parse(p.cur_pos, format!("unexpected trailing token {:?}", p.cur)));
    }
    Ok(e)
}

fn binop_prec(tok: &Tok) -> Option<(BinOp, u8, bool /* right_assoc */)> {
    use Tok::*;
    Some(match tok {
        EqEq => (BinOp::Eq, 0, false),
        Ne => (BinOp::Neq, 0, false),
        Le => (BinOp::Le, 0, false),
        Lt => (BinOp::Lt, 0, false),
        Ge => (BinOp::Ge, 0, false),
        Gt => (BinOp::Gt, 0, false),
        Plus => (BinOp::Add, 1, false),
        Minus => (BinOp::Sub, 1, false),
        Star => (BinOp::Mul, 2, false),
        Slash => (BinOp::Div, 2, false),
        _ => return None,
    })
}

/// Unary function names taking exactly one argument.
fn unary_fn(name: &str) -> Option<UnOp> {
    use UnOp::*;
    Some(match name {
        "abs" => Abs,
        "exp" => Exp,
        "sqrt" => Sqrt,
        "log" => Log,
        "log2" => Log2,
        "log10" => Log10,
        "sqr" => Sqr,
        "sin" => Sin,
        "cos" => Cos,
        _ => return None,
    })
}

/// Binary function names taking exactly two arguments (spec.md §3's
/// `min`/`max`/`diff`, which have no natural infix spelling).
fn binary_fn(name: &str) -> Option<BinOp> {
    use BinOp::*;
    Some(match name {
        "min" => Min,
        "max" => Max,
        "diff" => Diff,
        _ => return None,
    })
}

impl<'a> Parser<'a> {
    pub fn new(src: &'a str) -> Result<Self, ExprError> {
        let mut scanner = Scanner::new(src);
        let (cur, cur_pos) = scanner.next_token()?;
        Ok(Parser { scanner, cur, cur_pos })
    }

    fn advance(&mut self) -> Result<(), ExprError> {
        let (t, p) = self.scanner.next_token()?;
        self.cur = t;
        self.cur_pos = p;
        Ok(())
    }

    fn expect(&mut self, tok: &Tok) -> Result<(), ExprError> {
        if &self.cur == tok {
            self.advance()
        } else {
            Err(ExprError::Parse(self.cur_pos, format!("expected {tok:?}, found {:?}", self.cur)))
        }
    }

    pub fn parse_expr_prec(&mut self, min_prec: u8) -> Result<Expr, ExprError> {
        let mut lhs = self.parse_unary()?;

        loop {
            let Some((op, prec, right_assoc)) = binop_prec(&self.cur) else { break };
            if prec < min_prec {
                break;
            }
            self.advance()?;
            let next_min = if right_assoc { prec } else { prec + 1 };
            let rhs = self.parse_expr_prec(next_min)?;
            lhs = Expr::binary(op, lhs, rhs);
        }

        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr, ExprError> {
        if self.cur == Tok::Minus {
            self.advance()?;
            let operand = self.parse_unary()?;
            return Ok(Expr::unary(UnOp::Neg, operand));
        }
        if self.cur == Tok::Plus {
            self.advance()?;
            return self.parse_unary();
        }
        self.parse_power()
    }

    fn parse_power(&mut self) -> Result<Expr, ExprError> {
        let base = self.parse_primary()?;
        if self.cur == Tok::Caret {
            self.advance()?;
            let exponent = self.parse_unary()?;
            return Ok(Expr::binary(BinOp::Pow, base, exponent));
        }
        Ok(base)
    }

    fn parse_primary(&mut self) -> Result<Expr, ExprError> {
        match self.cur.clone() {
            Tok::Number(v) => {
                self.advance()?;
                Ok(Expr::literal(v))
            }
            Tok::LParen => {
                self.advance()?;
                let inner = self.parse_expr_prec(0)?;
                self.expect(&Tok::RParen)?;
                Ok(inner)
            }
            Tok::Ident(id) => {
                self.advance()?;
                if self.cur == Tok::LParen {
                    return self.parse_call(&id);
                }
                match id.as_str() {
                    "pi" => Ok(Expr::literal(std::f64::consts::PI)),
                    "e" => Ok(Expr::literal(std::f64::consts::E)),
                    _ => Ok(Expr::symbol(name(&id))),
                }
            }
            other => Err(ExprError::Parse(self.cur_pos, format!("expected expression, found {other:?}"))),
        }
    }

    fn parse_call(&mut self, fn_name: &str) -> Result<Expr, ExprError> {
        self.expect(&Tok::LParen)?;

        if let Some(op) = unary_fn(fn_name) {
            let arg = self.parse_expr_prec(0)?;
            self.expect(&Tok::RParen)?;
            return Ok(Expr::unary(op, arg));
        }
        if let Some(op) = binary_fn(fn_name) {
            let lhs = self.parse_expr_prec(0)?;
            self.expect(&Tok::Comma)?;
            let rhs = self.parse_expr_prec(0)?;
            self.expect(&Tok::RParen)?;
            return Ok(Expr::binary(op, lhs, rhs));
        }
        Err(ExprError::Parse(self.cur_pos, format!("unknown function `{fn_name}`")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_arithmetic_precedence() {
        let e = parse_expr("1 + 2 * 3").unwrap();
        assert_eq!(e.to_string(), "1 + 2 * 3");
    }

    #[test]
    fn parses_power_right_associative() {
        let e = parse_expr("2 ^ 3 ^ 2").unwrap();
        // right-assoc: 2 ^ (3 ^ 2)
        assert!(matches!(e, Expr::Binary(BinOp::Pow, _, _, _)));
    }

    #[test]
    fn parses_unary_minus_and_parens() {
        let e = parse_expr("-(x + 1)").unwrap();
        assert!(matches!(e, Expr::Unary(UnOp::Neg, _, _)));
    }

    #[test]
    fn parses_unary_function_calls() {
        let e = parse_expr("sqrt(x)").unwrap();
        assert!(matches!(e, Expr::Unary(UnOp::Sqrt, _, _)));
    }

    #[test]
    fn parses_binary_function_calls() {
        let e = parse_expr("min(x, y)").unwrap();
        assert!(matches!(e, Expr::Binary(BinOp::Min, _, _, _)));
    }

    #[test]
    fn recognizes_named_constants() {
        let e = parse_expr("pi").unwrap();
        assert!(matches!(e, Expr::Literal(v, _) if (v - std::f64::consts::PI).abs() < 1e-12));
    }

    #[test]
    fn reports_parse_error_with_position() {
        let err = parse_expr("1 +").unwrap_err();
        match err {
            ExprError::Parse(pos, _) => assert_eq!(pos, 3),
            other => panic!("expected Parse error, got {other:?}"),
        }
    }

    #[test]
    fn rejects_unknown_function() {
        assert!(parse_expr("frobnicate(x)").is_err());
    }

    #[test]
    fn relational_operator_parses() {
        let e = parse_expr("x <= 3").unwrap();
        assert!(matches!(e, Expr::Binary(BinOp::Le, _, _, _)));
    }
}
