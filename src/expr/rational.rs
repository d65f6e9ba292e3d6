//! Continued-fraction rationalization of literal nodes (spec.md §4.3.10).

use super::node::{BinOp, Expr};

/// Best rational approximation of `x` with numerator and denominator
/// bounded in magnitude by `max_magnitude`, via the continued-fraction
/// convergent recurrence.
fn best_rational_approx(x: f64, max_magnitude: i64) -> (i64, i64) {
    if !x.is_finite() || x == 0.0 {
        return (0, 1);
    }
    let sign = if x < 0.0 { -1i64 } else { 1 };
    let mut val = x.abs();
    let (mut p0, mut q0) = (0i64, 1i64);
    let (mut p1, mut q1) = (1i64, 0i64);

    for _ in 0..64 {
        let a_f = val.floor();
        if !a_f.is_finite() || a_f.abs() > i64::MAX as f64 {
            break;
        }
        let a = a_f as i64;
        let (Some(p2), Some(q2)) =
            (a.checked_mul(p1).and_then(|v| v.checked_add(p0)), a.checked_mul(q1).and_then(|v| v.checked_add(q0)))
        else {
            break;
        };
        if p2.abs() > max_magnitude || q2.abs() > max_magnitude {
            break;
        }
        p0 = p1;
        q0 = q1;
        p1 = p2;
        q1 = q2;

        let frac = val - a as f64;
        if frac.abs() < 1e-12 {
            break;
        }
        val = 1.0 / frac;
    }

    if q1 == 0 {
        (sign * p1.max(1), 1)
    } else {
        (sign * p1, q1)
    }
}

/// Replaces every literal node with an explicit `Literal(n) / Literal(d)`
/// subtree, `d == 1` collapsing back to a bare literal (spec.md §4.3.10).
pub fn rationalize(e: &Expr, max_magnitude: i64) -> Expr {
    match e {
        Expr::Literal(v, _) => {
            let (n, d) = best_rational_approx(*v, max_magnitude);
            if d == 1 {
                Expr::literal(n as f64)
            } else {
                Expr::binary(BinOp::Div, Expr::literal(n as f64), Expr::literal(d as f64))
            }
        }
        Expr::Symbol(..) => e.clone(),
        Expr::Unary(op, c, _) => Expr::unary(*op, rationalize(c, max_magnitude)),
        Expr::Binary(op, l, r, _) => Expr::binary(*op, rationalize(l, max_magnitude), rationalize(r, max_magnitude)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn value(e: &Expr) -> f64 {
        match e {
            Expr::Literal(v, _) => *v,
            Expr::Unary(super::super::node::UnOp::Neg, c, _) => -value(c),
            Expr::Binary(BinOp::Div, l, r, _) => value(l) / value(r),
            _ => f64::NAN,
        }
    }

    #[test]
    fn rationalize_preserves_value_within_tolerance() {
        // Property 13.
        let e = Expr::literal(0.333333333333);
        let r = rationalize(&e, 1000);
        assert!((value(&r) - 0.333333333333).abs() < 1e-6);
    }

    #[test]
    fn rationalize_exact_fraction_recovers_numerator_and_denominator() {
        let e = Expr::literal(0.75);
        let r = rationalize(&e, 1000);
        assert_eq!(r, Expr::binary(BinOp::Div, Expr::literal(3.0), Expr::literal(4.0)));
    }

    #[test]
    fn rationalize_leaves_symbols_untouched() {
        let e = Expr::symbol(crate::name::name("x"));
        assert_eq!(rationalize(&e, 1000), e);
    }
}
