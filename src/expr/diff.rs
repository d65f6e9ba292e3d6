//! Symbolic differentiation and `abs`/`min`/`max` smoothing (spec.md
//! §4.3.7, §4.3.8).

use crate::error::ExprError;
use crate::name::Name;

use super::eval::{eval_binary, eval_unary, DepMap};
use super::node::{BinOp, Expr, UnOp};

/// Differentiates `e` with respect to `x`. A symbol not covered by
/// `dep_map` is treated as independent of `x`. `abs`, `min`, and `max`
/// are not differentiable unless first run through [`smoothen`].
pub fn deval(e: &Expr, x: &Name, dep_map: &DepMap) -> Result<Expr, ExprError> {
    let result = match e {
        Expr::Literal(..) => Expr::literal(0.0),

        Expr::Symbol(..) => eval_binary(BinOp::Diff, e.clone(), Expr::symbol(x.clone()), Some(dep_map), false),

        Expr::Unary(op, child, _) => match op {
            UnOp::Neg => eval_unary(UnOp::Neg, deval(child, x, dep_map)?),
            UnOp::Abs => return Err(ExprError::NonDifferentiable("abs".to_string())),
            UnOp::Exp => {
                let dc = deval(child, x, dep_map)?;
                eval_binary(BinOp::Mul, Expr::unary(UnOp::Exp, (**child).clone()), dc, None, false)
            }
            UnOp::Sqrt => {
                let dc = deval(child, x, dep_map)?;
                let denom = eval_binary(
                    BinOp::Mul,
                    Expr::literal(2.0),
                    Expr::unary(UnOp::Sqrt, (**child).clone()),
                    None,
                    false,
                );
                eval_binary(BinOp::Div, dc, denom, None, false)
            }
            UnOp::Log => {
                let dc = deval(child, x, dep_map)?;
                eval_binary(BinOp::Div, dc, (**child).clone(), None, false)
            }
            UnOp::Log2 => {
                let dc = deval(child, x, dep_map)?;
                let denom = eval_binary(
                    BinOp::Mul,
                    (**child).clone(),
                    Expr::literal(std::f64::consts::LN_2),
                    None,
                    false,
                );
                eval_binary(BinOp::Div, dc, denom, None, false)
            }
            UnOp::Log10 => {
                let dc = deval(child, x, dep_map)?;
                let denom = eval_binary(
                    BinOp::Mul,
                    (**child).clone(),
                    Expr::literal(std::f64::consts::LN_10),
                    None,
                    false,
                );
                eval_binary(BinOp::Div, dc, denom, None, false)
            }
            UnOp::Sqr => {
                let dc = deval(child, x, dep_map)?;
                let two_u = eval_binary(BinOp::Mul, Expr::literal(2.0), (**child).clone(), None, false);
                eval_binary(BinOp::Mul, two_u, dc, None, false)
            }
            UnOp::Sin => {
                let dc = deval(child, x, dep_map)?;
                eval_binary(BinOp::Mul, Expr::unary(UnOp::Cos, (**child).clone()), dc, None, false)
            }
            UnOp::Cos => {
                let dc = deval(child, x, dep_map)?;
                let neg_sin = eval_unary(UnOp::Neg, Expr::unary(UnOp::Sin, (**child).clone()));
                eval_binary(BinOp::Mul, neg_sin, dc, None, false)
            }
        },

        Expr::Binary(op, l, r, _) => match op {
            BinOp::Add => {
                let dl = deval(l, x, dep_map)?;
                let dr = deval(r, x, dep_map)?;
                eval_binary(BinOp::Add, dl, dr, None, false)
            }
            BinOp::Sub => {
                let dl = deval(l, x, dep_map)?;
                let dr = deval(r, x, dep_map)?;
                eval_binary(BinOp::Sub, dl, dr, None, false)
            }
            BinOp::Mul => {
                let dl = deval(l, x, dep_map)?;
                let dr = deval(r, x, dep_map)?;
                let t1 = eval_binary(BinOp::Mul, dl, (**r).clone(), None, false);
                let t2 = eval_binary(BinOp::Mul, (**l).clone(), dr, None, false);
                eval_binary(BinOp::Add, t1, t2, None, false)
            }
            BinOp::Div => {
                let dl = deval(l, x, dep_map)?;
                let dr = deval(r, x, dep_map)?;
                let t1 = eval_binary(BinOp::Mul, dl, (**r).clone(), None, false);
                let t2 = eval_binary(BinOp::Mul, (**l).clone(), dr, None, false);
                let numerator = eval_binary(BinOp::Sub, t1, t2, None, false);
                let denom = eval_binary(BinOp::Pow, (**r).clone(), Expr::literal(2.0), None, false);
                eval_binary(BinOp::Div, numerator, denom, None, false)
            }
            BinOp::Pow => {
                let dl = deval(l, x, dep_map)?;
                let dr = deval(r, x, dep_map)?;
                let log_u = Expr::unary(UnOp::Log, (**l).clone());
                let term1 = eval_binary(BinOp::Mul, dr, log_u, None, false);
                let v_over_u = eval_binary(BinOp::Div, (**r).clone(), (**l).clone(), None, false);
                let term2 = eval_binary(BinOp::Mul, v_over_u, dl, None, false);
                let sum = eval_binary(BinOp::Add, term1, term2, None, false);
                let base = eval_binary(BinOp::Pow, (**l).clone(), (**r).clone(), None, false);
                eval_binary(BinOp::Mul, base, sum, None, false)
            }
            BinOp::Min | BinOp::Max => return Err(ExprError::NonDifferentiable(op.name().to_string())),
            BinOp::Diff => eval_binary(BinOp::Diff, e.clone(), Expr::symbol(x.clone()), Some(dep_map), false),
            BinOp::Eq | BinOp::Neq | BinOp::Le | BinOp::Lt | BinOp::Ge | BinOp::Gt => {
                return Err(ExprError::InvalidOperator(op.name().to_string()))
            }
        },
    };
    Ok(result)
}

fn smooth_abs(e: &Expr, alpha: &Expr) -> Expr {
    Expr::unary(UnOp::Sqrt, Expr::binary(BinOp::Add, alpha.clone(), Expr::binary(BinOp::Pow, e.clone(), Expr::literal(2.0))))
}

/// Replaces every `abs`/`min`/`max` node with its smooth approximation,
/// parameterized by `alpha` (spec.md §4.3.8).
pub fn smoothen(e: &Expr, alpha: &Expr) -> Expr {
    match e {
        Expr::Literal(..) | Expr::Symbol(..) => e.clone(),
        Expr::Unary(UnOp::Abs, c, _) => smooth_abs(&smoothen(c, alpha), alpha),
        Expr::Unary(op, c, _) => Expr::unary(*op, smoothen(c, alpha)),
        Expr::Binary(BinOp::Max, l, r, _) => {
            let l2 = smoothen(l, alpha);
            let r2 = smoothen(r, alpha);
            let diff = Expr::binary(BinOp::Sub, l2.clone(), r2.clone());
            let abs_alpha = smooth_abs(&diff, alpha);
            Expr::binary(
                BinOp::Mul,
                Expr::literal(0.5),
                Expr::binary(BinOp::Add, Expr::binary(BinOp::Add, l2, r2), abs_alpha),
            )
        }
        Expr::Binary(BinOp::Min, l, r, _) => {
            let l2 = smoothen(l, alpha);
            let r2 = smoothen(r, alpha);
            let diff = Expr::binary(BinOp::Sub, l2.clone(), r2.clone());
            let abs_alpha = smooth_abs(&diff, alpha);
            Expr::binary(
                BinOp::Sub,
                Expr::binary(BinOp::Mul, Expr::literal(0.5), Expr::binary(BinOp::Add, l2, r2)),
                Expr::binary(BinOp::Mul, Expr::literal(0.5), abs_alpha),
            )
        }
        Expr::Binary(op, l, r, _) => Expr::binary(*op, smoothen(l, alpha), smoothen(r, alpha)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::name::name;
    use std::collections::BTreeMap;

    fn sym(s: &str) -> Expr {
        Expr::symbol(name(s))
    }

    #[test]
    fn derivative_of_self_is_one() {
        let x = name("x");
        let dep_map = DepMap::new();
        let d = deval(&sym("x"), &x, &dep_map).unwrap();
        assert_eq!(d, Expr::literal(1.0));
    }

    #[test]
    fn derivative_of_unrelated_symbol_is_zero() {
        let x = name("x");
        let dep_map = DepMap::new();
        let d = deval(&sym("y"), &x, &dep_map).unwrap();
        assert_eq!(d, Expr::literal(0.0));
    }

    #[test]
    fn product_rule_matches_numeric_derivative() {
        // Property 11: symbolic derivative agrees with a finite-difference
        // check at a sample point.
        let x = name("x");
        let dep_map = DepMap::new();
        let e = Expr::binary(BinOp::Mul, sym("x"), sym("x"));
        let d = deval(&e, &x, &dep_map).unwrap();

        fn eval_at(e: &Expr, xv: f64) -> f64 {
            match e {
                Expr::Literal(v, _) => *v,
                Expr::Unary(UnOp::Neg, c, _) => -eval_at(c, xv),
                Expr::Symbol(s, _) => if s.as_ref() == "x" { xv } else { 0.0 },
                Expr::Binary(op, l, r, _) => {
                    let lv = eval_at(l, xv);
                    let rv = eval_at(r, xv);
                    match op {
                        BinOp::Add => lv + rv,
                        BinOp::Sub => lv - rv,
                        BinOp::Mul => lv * rv,
                        BinOp::Div => lv / rv,
                        _ => 0.0,
                    }
                }
                _ => 0.0,
            }
        }

        let x0 = 3.0;
        let h = 1e-6;
        let numeric = (eval_at(&e, x0 + h) - eval_at(&e, x0 - h)) / (2.0 * h);
        let symbolic = eval_at(&d, x0);
        assert!((numeric - symbolic).abs() < 1e-3);
    }

    #[test]
    fn abs_is_not_differentiable_until_smoothed() {
        let x = name("x");
        let dep_map = DepMap::new();
        let e = Expr::unary(UnOp::Abs, sym("x"));
        assert!(deval(&e, &x, &dep_map).is_err());

        let smoothed = smoothen(&e, &Expr::literal(0.01));
        assert!(deval(&smoothed, &x, &dep_map).is_ok());
    }

    #[test]
    fn composed_derivative_yields_symbolic_diff_node() {
        let x = name("x");
        let mut dep_map = BTreeMap::new();
        let mut deps = std::collections::BTreeSet::new();
        deps.insert(name("x"));
        dep_map.insert(name("u"), deps);

        let d = deval(&sym("u"), &x, &dep_map).unwrap();
        assert!(matches!(d, Expr::Binary(BinOp::Diff, ..)));
    }
}
