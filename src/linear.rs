//! C4: extracting a coefficient map from an expression tree that is (or
//! simplifies to) a linear combination of named variables (spec.md
//! §4.4).

use std::collections::BTreeMap;

use crate::error::ExprError;
use crate::expr::{simplify, BinOp, Expr, UnOp};
use crate::name::{const_one, Name};

/// The coefficient map plus optional relational comparator extracted
/// from an [`Expr`] (spec.md §3, §4.4).
#[derive(Debug, Clone)]
pub struct Linear {
    coeffs: BTreeMap<Name, f64>,
    relation: Option<BinOp>,
    rebuilt: Expr,
}

impl PartialEq for Linear {
    /// Structural equality of the rebuilt expressions (spec.md §4.4).
    fn eq(&self, other: &Self) -> bool {
        self.rebuilt == other.rebuilt
    }
}

fn unwrap_neg(e: &Expr) -> (f64, &Expr) {
    match e {
        Expr::Unary(UnOp::Neg, inner, _) => (-1.0, inner),
        other => (1.0, other),
    }
}

fn add_coeff(map: &mut BTreeMap<Name, f64>, key: Name, delta: f64) {
    *map.entry(key).or_insert(0.0) += delta;
}

fn walk(e: &Expr, sign: f64, map: &mut BTreeMap<Name, f64>) -> Result<(), ExprError> {
    match e {
        Expr::Literal(v, _) => {
            add_coeff(map, const_one(), sign * v);
            Ok(())
        }
        Expr::Symbol(s, _) => {
            add_coeff(map, s.clone(), sign);
            Ok(())
        }
        Expr::Unary(UnOp::Neg, c, _) => walk(c, -sign, map),
        Expr::Unary(..) => Err(ExprError::NonLinear),
        Expr::Binary(BinOp::Add, l, r, _) => {
            walk(l, sign, map)?;
            walk(r, sign, map)
        }
        Expr::Binary(BinOp::Sub, l, r, _) => {
            walk(l, sign, map)?;
            walk(r, -sign, map)
        }
        Expr::Binary(BinOp::Mul, l, r, _) => {
            let (sl, l2) = unwrap_neg(l);
            let (sr, r2) = unwrap_neg(r);
            match (l2, r2) {
                (Expr::Literal(v, _), Expr::Symbol(s, _)) | (Expr::Symbol(s, _), Expr::Literal(v, _)) => {
                    add_coeff(map, s.clone(), sign * sl * sr * v);
                    Ok(())
                }
                _ => Err(ExprError::NonLinear),
            }
        }
        Expr::Binary(BinOp::Div, l, r, _) => {
            let (sl, l2) = unwrap_neg(l);
            let (sr, r2) = unwrap_neg(r);
            match (l2, r2) {
                (Expr::Symbol(s, _), Expr::Literal(v, _)) => {
                    add_coeff(map, s.clone(), sign * sl * sr / v);
                    Ok(())
                }
                (Expr::Literal(v, _), Expr::Symbol(s, _)) => {
                    add_coeff(map, s.clone(), sign * sl * sr * v);
                    Ok(())
                }
                _ => Err(ExprError::NonLinear),
            }
        }
        Expr::Binary(..) => Err(ExprError::NonLinear),
    }
}

fn build_term(coeff: f64, var: &Name) -> (bool, Expr) {
    let positive = coeff >= 0.0;
    let mag = coeff.abs();
    let e = if mag == 1.0 { Expr::symbol(var.clone()) } else { Expr::binary(BinOp::Mul, Expr::literal(mag), Expr::symbol(var.clone())) };
    (positive, e)
}

fn build_sum(terms: Vec<(bool, Expr)>) -> Expr {
    let mut iter = terms.into_iter();
    let Some((sign0, first)) = iter.next() else { return Expr::literal(0.0) };
    let mut acc = if sign0 { first } else { Expr::unary(UnOp::Neg, first) };
    for (sign, t) in iter {
        acc = if sign { Expr::binary(BinOp::Add, acc, t) } else { Expr::binary(BinOp::Sub, acc, t) };
    }
    acc
}

impl Linear {
    /// Extracts the linear combination underlying `e`, per spec.md §4.4's
    /// six construction steps.
    pub fn from_expr(e: &Expr) -> Result<Linear, ExprError> {
        let (body, relation) = match e {
            Expr::Binary(op, l, r, _) if op.is_relational() => {
                (Expr::binary(BinOp::Sub, (**l).clone(), (**r).clone()), Some(*op))
            }
            other => (other.clone(), None),
        };

        let simplified = simplify(&body);

        let mut coeffs = BTreeMap::new();
        walk(&simplified, 1.0, &mut coeffs)?;
        coeffs.entry(const_one()).or_insert(0.0);

        let one = const_one();
        let var_count_pos = coeffs.iter().filter(|entry| entry.0 != &one && *entry.1 > 0.0).count();
        let var_count_neg = coeffs.iter().filter(|entry| entry.0 != &one && *entry.1 < 0.0).count();
        let mut relation = relation;
        if var_count_neg > var_count_pos {
            for v in coeffs.values_mut() {
                *v = -*v;
            }
            relation = relation.map(BinOp::flipped);
        }

        let const_term = *coeffs.get(&one).unwrap_or(&0.0);
        let mut terms: Vec<(bool, Expr)> = coeffs
            .iter()
            .filter(|entry| entry.0 != &one && *entry.1 != 0.0)
            .map(|entry| build_term(*entry.1, entry.0))
            .collect();

        let rebuilt = if let Some(op) = relation {
            let lhs = if terms.is_empty() { Expr::literal(0.0) } else { build_sum(terms) };
            Expr::binary(op, lhs, Expr::literal(-const_term))
        } else {
            if const_term != 0.0 || terms.is_empty() {
                terms.push((const_term >= 0.0, Expr::literal(const_term.abs())));
            }
            build_sum(terms)
        };

        Ok(Linear { coeffs, relation, rebuilt })
    }

    /// The `Name -> coefficient` map; the constant term is keyed by
    /// [`crate::name::const_one`].
    pub fn coeffs(&self) -> &BTreeMap<Name, f64> {
        &self.coeffs
    }

    /// The relational comparator, if `Linear` was built from a relation.
    pub fn relation(&self) -> Option<BinOp> {
        self.relation
    }

    /// The canonical rebuilt expression (spec.md §4.4 step 6).
    pub fn rebuilt(&self) -> &Expr {
        &self.rebuilt
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::name::name;

    fn sym(s: &str) -> Expr {
        Expr::symbol(name(s))
    }

    #[test]
    fn extracts_simple_combination() {
        let e = Expr::binary(
            BinOp::Add,
            Expr::binary(BinOp::Mul, Expr::literal(2.0), sym("x")),
            Expr::binary(BinOp::Mul, Expr::literal(3.0), sym("y")),
        );
        let lin = Linear::from_expr(&e).unwrap();
        assert_eq!(lin.coeffs().get(&name("x")), Some(&2.0));
        assert_eq!(lin.coeffs().get(&name("y")), Some(&3.0));
        assert_eq!(lin.coeffs().get(&const_one()), Some(&0.0));
    }

    #[test]
    fn nonlinear_shape_is_rejected() {
        let e = Expr::binary(BinOp::Mul, sym("x"), sym("y"));
        assert!(matches!(Linear::from_expr(&e), Err(ExprError::NonLinear)));
    }

    #[test]
    fn relation_normalizes_to_expected_coefficients() {
        // Property 15: Linear::from(2x + 3y - 5 = x - y + 1) -> {x:1, y:4, "1":-6}.
        let lhs = Expr::binary(
            BinOp::Sub,
            Expr::binary(
                BinOp::Add,
                Expr::binary(BinOp::Mul, Expr::literal(2.0), sym("x")),
                Expr::binary(BinOp::Mul, Expr::literal(3.0), sym("y")),
            ),
            Expr::literal(5.0),
        );
        let rhs = Expr::binary(BinOp::Add, Expr::binary(BinOp::Sub, sym("x"), sym("y")), Expr::literal(1.0));
        let e = Expr::binary(BinOp::Eq, lhs, rhs);

        let lin = Linear::from_expr(&e).unwrap();
        assert_eq!(lin.coeffs().get(&name("x")), Some(&1.0));
        assert_eq!(lin.coeffs().get(&name("y")), Some(&4.0));
        assert_eq!(lin.coeffs().get(&const_one()), Some(&-6.0));
    }

    #[test]
    fn rebuilt_expression_preserves_value_up_to_recorded_sign() {
        // Property 14.
        let e = Expr::binary(
            BinOp::Sub,
            Expr::binary(BinOp::Mul, Expr::literal(2.0), sym("x")),
            Expr::literal(3.0),
        );
        let lin = Linear::from_expr(&e).unwrap();

        fn eval_at(e: &Expr, xv: f64) -> f64 {
            match e {
                Expr::Literal(v, _) => *v,
                Expr::Unary(UnOp::Neg, c, _) => -eval_at(c, xv),
                Expr::Symbol(..) => xv,
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

        let original = eval_at(&e, 7.0);
        let rebuilt = eval_at(lin.rebuilt(), 7.0);
        assert!((original - rebuilt).abs() < 1e-9);
    }
}
