//! Infix and prefix rendering (spec.md §6).

use std::fmt;

use super::node::{BinOp, Expr, UnOp};

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&render_infix(self, 0))
    }
}

fn prec_of(e: &Expr) -> u8 {
    match e {
        Expr::Literal(..) | Expr::Symbol(..) => 5,
        Expr::Unary(UnOp::Neg, ..) => 4,
        Expr::Unary(..) => 5,
        Expr::Binary(op, ..) => match op {
            BinOp::Min | BinOp::Max | BinOp::Diff => 5,
            BinOp::Pow => 3,
            BinOp::Mul | BinOp::Div => 2,
            BinOp::Add | BinOp::Sub => 1,
            _ => 0,
        },
    }
}

fn render_infix(e: &Expr, min_prec: u8) -> String {
    let prec = prec_of(e);
    let body = match e {
        Expr::Literal(v, _) => format!("{v}"),
        Expr::Symbol(s, _) => s.to_string(),
        Expr::Unary(UnOp::Neg, c, _) => format!("-{}", render_infix(c, 4)),
        Expr::Unary(op, c, _) => format!("{}({})", op.name(), render_infix(c, 0)),
        Expr::Binary(op, l, r, _) if matches!(op, BinOp::Min | BinOp::Max | BinOp::Diff) => {
            format!("{}({}, {})", op.name(), render_infix(l, 0), render_infix(r, 0))
        }
        Expr::Binary(op, l, r, _) => {
            let (left_min, right_min) = if *op == BinOp::Pow { (prec + 1, prec) } else { (prec, prec + 1) };
            format!("{} {} {}", render_infix(l, left_min), op.name(), render_infix(r, right_min))
        }
    };
    if prec < min_prec {
        format!("({body})")
    } else {
        body
    }
}

fn render_lisp(e: &Expr) -> String {
    match e {
        Expr::Literal(v, _) => format!("{v}"),
        Expr::Symbol(s, _) => s.to_string(),
        Expr::Unary(op, c, _) => format!("({} {})", op.name(), render_lisp(c)),
        Expr::Binary(op, l, r, _) => format!("({} {} {})", op.name(), render_lisp(l), render_lisp(r)),
    }
}

fn render_source(e: &Expr) -> String {
    match e {
        Expr::Literal(v, _) => format!("Expr::literal({v:?})"),
        Expr::Symbol(s, _) => format!("Expr::symbol(name({:?}))", s.as_ref()),
        Expr::Unary(op, c, _) => format!("Expr::unary(UnOp::{:?}, {})", op, render_source(c)),
        Expr::Binary(op, l, r, _) => format!("Expr::binary(BinOp::{:?}, {}, {})", op, render_source(l), render_source(r)),
    }
}

/// Renders `e` as a fully-parenthesized prefix expression. When
/// `as_source` is set, emits the host language's builder-call spelling
/// instead of Lisp-style `(op a b)` notation.
pub fn to_prefix_string(e: &Expr, as_source: bool) -> String {
    if as_source {
        render_source(e)
    } else {
        render_lisp(e)
    }
}
