//! Local evaluation, associative-chain compression, expansion, and
//! simplification (spec.md §4.3.4 – §4.3.6).

use std::collections::{BTreeMap, BTreeSet};

use crate::name::Name;

use super::node::{BinOp, Expr, UnOp};

/// `Name -> {names it depends on}`, supplied by the caller to resolve the
/// symbolic `diff(u, v)` node (spec.md §4.3.4, §4.3.7). A symbol with no
/// entry is treated as independent of everything.
pub type DepMap = BTreeMap<Name, BTreeSet<Name>>;

fn literal_value(e: &Expr) -> Option<f64> {
    match e {
        Expr::Literal(v, _) => Some(*v),
        Expr::Unary(UnOp::Neg, inner, _) => literal_value(inner).map(|v| -v),
        _ => None,
    }
}

fn is_leaf(e: &Expr) -> bool {
    matches!(e, Expr::Literal(..) | Expr::Symbol(..))
}

fn apply_unary(op: UnOp, v: f64) -> f64 {
    use UnOp::*;
    match op {
        Neg => -v,
        Abs => v.abs(),
        Exp => v.exp(),
        Sqrt => v.sqrt(),
        Log => v.ln(),
        Log2 => v.log2(),
        Log10 => v.log10(),
        Sqr => v * v,
        Sin => v.sin(),
        Cos => v.cos(),
    }
}

/// Folds a unary node whose child has already been normalized (spec.md
/// §4.3.4).
pub fn eval_unary(op: UnOp, child: Expr) -> Expr {
    if let Some(v) = literal_value(&child) {
        return Expr::literal(apply_unary(op, v));
    }
    Expr::unary(op, child)
}

fn gcd(a: u64, b: u64) -> u64 {
    if b == 0 {
        a.max(1)
    } else {
        gcd(b, a % b)
    }
}

fn as_i64_exact(v: f64) -> Option<i64> {
    if v.fract() == 0.0 && v.abs() <= i64::MAX as f64 {
        Some(v as i64)
    } else {
        None
    }
}

fn fold_literal_binary(op: BinOp, a: f64, b: f64, force: bool) -> Expr {
    match op {
        BinOp::Add => Expr::literal(a + b),
        BinOp::Sub => Expr::literal(a - b),
        BinOp::Mul => Expr::literal(a * b),
        BinOp::Pow => Expr::literal(a.powf(b)),
        BinOp::Div => {
            if !force {
                if let (Some(ia), Some(ib)) = (as_i64_exact(a), as_i64_exact(b)) {
                    if ib != 0 {
                        let g = gcd(ia.unsigned_abs(), ib.unsigned_abs()) as i64;
                        let (mut n, mut d) = (ia / g, ib / g);
                        if d < 0 {
                            n = -n;
                            d = -d;
                        }
                        return if d == 1 {
                            Expr::literal(n as f64)
                        } else {
                            Expr::binary(BinOp::Div, Expr::literal(n as f64), Expr::literal(d as f64))
                        };
                    }
                }
            }
            Expr::literal(a / b)
        }
        BinOp::Min => Expr::literal(a.min(b)),
        BinOp::Max => Expr::literal(a.max(b)),
        // Relational and Diff never reach here (see eval_binary).
        _ => Expr::literal(a),
    }
}

fn identity_fold(op: BinOp, lhs: &Expr, rhs: &Expr) -> Option<Expr> {
    let lv = literal_value(lhs);
    let rv = literal_value(rhs);
    match op {
        BinOp::Add => {
            if lv == Some(0.0) {
                return Some(rhs.clone());
            }
            if rv == Some(0.0) {
                return Some(lhs.clone());
            }
        }
        BinOp::Sub => {
            if rv == Some(0.0) {
                return Some(lhs.clone());
            }
            if lv == Some(0.0) {
                return Some(Expr::unary(UnOp::Neg, rhs.clone()));
            }
        }
        BinOp::Mul => {
            if lv == Some(0.0) || rv == Some(0.0) {
                return Some(Expr::literal(0.0));
            }
            if lv == Some(1.0) {
                return Some(rhs.clone());
            }
            if rv == Some(1.0) {
                return Some(lhs.clone());
            }
            if lv == Some(-1.0) {
                return Some(Expr::unary(UnOp::Neg, rhs.clone()));
            }
            if rv == Some(-1.0) {
                return Some(Expr::unary(UnOp::Neg, lhs.clone()));
            }
        }
        BinOp::Div => {
            if lv == Some(0.0) {
                return Some(Expr::literal(0.0));
            }
            if rv == Some(0.0) {
                return Some(Expr::literal(f64::INFINITY));
            }
            if rv == Some(1.0) {
                return Some(lhs.clone());
            }
            if rv == Some(-1.0) {
                return Some(Expr::unary(UnOp::Neg, lhs.clone()));
            }
        }
        BinOp::Pow => {
            if rv == Some(0.0) {
                return Some(Expr::literal(1.0));
            }
            if lv == Some(0.0) {
                return Some(Expr::literal(0.0));
            }
            if lv == Some(1.0) {
                return Some(Expr::literal(1.0));
            }
            if rv == Some(1.0) {
                return Some(lhs.clone());
            }
            if rv == Some(-1.0) {
                return Some(Expr::binary(BinOp::Div, Expr::literal(1.0), lhs.clone()));
            }
        }
        _ => {}
    }
    None
}

/// `a / a^2 -> 1/a` when `a` is a leaf (spec.md §4.3.4).
fn canonical_div(lhs: &Expr, rhs: &Expr) -> Option<Expr> {
    if !is_leaf(lhs) {
        return None;
    }
    if let Expr::Binary(BinOp::Pow, base, exp, _) = rhs {
        if **base == *lhs && literal_value(exp) == Some(2.0) {
            return Some(Expr::binary(BinOp::Div, Expr::literal(1.0), lhs.clone()));
        }
    }
    None
}

fn eval_diff(lhs: Expr, rhs: Expr, dep_map: Option<&DepMap>) -> Expr {
    if literal_value(&lhs).is_some() {
        return Expr::literal(0.0);
    }
    if lhs == rhs {
        return Expr::literal(1.0);
    }
    if let (Expr::Symbol(u, _), Expr::Symbol(v, _)) = (&lhs, &rhs) {
        if let Some(map) = dep_map {
            let depends = map.get(u).map(|deps| deps.contains(v)).unwrap_or(false);
            if !depends {
                return Expr::literal(0.0);
            }
        }
    }
    Expr::binary(BinOp::Diff, lhs, rhs)
}

/// Folds a binary node whose children have already been normalized
/// (spec.md §4.3.4). `force` disables rational reduction of literal
/// quotients and always divides in floating point.
pub fn eval_binary(op: BinOp, lhs: Expr, rhs: Expr, dep_map: Option<&DepMap>, force: bool) -> Expr {
    if op == BinOp::Diff {
        return eval_diff(lhs, rhs, dep_map);
    }
    if op.is_relational() {
        return Expr::binary(op, lhs, rhs);
    }
    if let (Some(a), Some(b)) = (literal_value(&lhs), literal_value(&rhs)) {
        return fold_literal_binary(op, a, b, force);
    }
    if let Some(e) = identity_fold(op, &lhs, &rhs) {
        return e;
    }
    if op == BinOp::Div {
        if let Some(e) = canonical_div(&lhs, &rhs) {
            return e;
        }
    }
    Expr::binary(op, lhs, rhs)
}

fn extract_literal_product(items: Vec<Expr>) -> (f64, Vec<Expr>) {
    let mut acc = 1.0;
    let mut rest = Vec::new();
    for item in items {
        if let Some(v) = literal_value(&item) {
            acc *= v;
        } else {
            rest.push(item);
        }
    }
    (acc, rest)
}

fn cancel_pairs(a: &mut Vec<Expr>, b: &mut Vec<Expr>) {
    let mut i = 0;
    while i < a.len() {
        if let Some(j) = b.iter().position(|x| x == &a[i]) {
            b.remove(j);
            a.remove(i);
        } else {
            i += 1;
        }
    }
}

fn build_left_mul_chain(factors: Vec<Expr>) -> Expr {
    let mut iter = factors.into_iter();
    let Some(first) = iter.next() else { return Expr::literal(1.0) };
    iter.fold(first, |acc, f| Expr::binary(BinOp::Mul, acc, f))
}

fn collect_md(e: &Expr, numerator_side: bool, num: &mut Vec<Expr>, den: &mut Vec<Expr>) {
    match e {
        Expr::Binary(BinOp::Mul, l, r, _) => {
            collect_md(l, numerator_side, num, den);
            collect_md(r, numerator_side, num, den);
        }
        Expr::Binary(BinOp::Div, l, r, _) => {
            collect_md(l, numerator_side, num, den);
            collect_md(r, !numerator_side, num, den);
        }
        other => {
            if numerator_side {
                num.push(other.clone());
            } else {
                den.push(other.clone());
            }
        }
    }
}

/// Flattens a `*`/`/` subtree into a numerator and denominator list,
/// combines literal factors, cancels structurally equal pairs, and
/// rebuilds a canonical left-deep chain with factors in total order
/// (spec.md §4.3.5).
pub fn compress_mul_div(e: &Expr) -> Expr {
    if !matches!(e, Expr::Binary(BinOp::Mul, ..) | Expr::Binary(BinOp::Div, ..)) {
        return e.clone();
    }

    let mut num = Vec::new();
    let mut den = Vec::new();
    collect_md(e, true, &mut num, &mut den);

    let (num_lit, mut num_rest) = extract_literal_product(num);
    let (den_lit, mut den_rest) = extract_literal_product(den);

    if num_lit == 0.0 {
        return Expr::literal(0.0);
    }

    cancel_pairs(&mut num_rest, &mut den_rest);

    let mut num_factors = Vec::new();
    if num_lit != 1.0 || num_rest.is_empty() {
        num_factors.push(Expr::literal(num_lit));
    }
    num_factors.extend(num_rest);
    num_factors.sort();
    let numerator = build_left_mul_chain(num_factors);

    if den_rest.is_empty() && den_lit == 1.0 {
        return numerator;
    }

    let mut den_factors = Vec::new();
    if den_lit != 1.0 || den_rest.is_empty() {
        den_factors.push(Expr::literal(den_lit));
    }
    den_factors.extend(den_rest);
    den_factors.sort();
    let denominator = build_left_mul_chain(den_factors);

    Expr::binary(BinOp::Div, numerator, denominator)
}

fn collect_as(e: &Expr, sign: bool, terms: &mut Vec<(bool, Expr)>) {
    match e {
        Expr::Binary(BinOp::Add, l, r, _) => {
            collect_as(l, sign, terms);
            collect_as(r, sign, terms);
        }
        Expr::Binary(BinOp::Sub, l, r, _) => {
            collect_as(l, sign, terms);
            collect_as(r, !sign, terms);
        }
        Expr::Unary(UnOp::Neg, c, _) => collect_as(c, !sign, terms),
        other => terms.push((sign, other.clone())),
    }
}

fn cancel_signed_pairs(terms: &mut Vec<(bool, Expr)>) {
    let mut i = 0;
    while i < terms.len() {
        let found = terms[i + 1..].iter().position(|(s, t)| *s != terms[i].0 && t == &terms[i].1);
        if let Some(offset) = found {
            terms.remove(i + 1 + offset);
            terms.remove(i);
        } else {
            i += 1;
        }
    }
}

fn build_left_add_sub_chain(terms: Vec<(bool, Expr)>) -> Expr {
    let mut iter = terms.into_iter();
    let Some((sign0, first)) = iter.next() else { return Expr::literal(0.0) };
    let mut acc = if sign0 { first } else { Expr::unary(UnOp::Neg, first) };
    for (sign, t) in iter {
        acc = if sign { Expr::binary(BinOp::Add, acc, t) } else { Expr::binary(BinOp::Sub, acc, t) };
    }
    acc
}

/// Flattens a `+`/`-`/unary-minus subtree into signed terms, combines
/// literal terms, cancels opposite-signed structurally equal pairs, and
/// rebuilds a canonical left-deep chain in total order (spec.md §4.3.5).
pub fn compress_add_sub(e: &Expr) -> Expr {
    if !matches!(e, Expr::Binary(BinOp::Add, ..) | Expr::Binary(BinOp::Sub, ..) | Expr::Unary(UnOp::Neg, ..)) {
        return e.clone();
    }

    let mut terms = Vec::new();
    collect_as(e, true, &mut terms);

    let mut lit_sum = 0.0;
    let mut rest = Vec::new();
    for (sign, t) in terms {
        if let Some(v) = literal_value(&t) {
            lit_sum += if sign { v } else { -v };
        } else {
            rest.push((sign, t));
        }
    }

    cancel_signed_pairs(&mut rest);

    let mut all = Vec::new();
    if lit_sum != 0.0 || rest.is_empty() {
        all.push((lit_sum >= 0.0, Expr::literal(lit_sum.abs())));
    }
    all.extend(rest);
    all.sort_by(|a, b| a.1.cmp(&b.1));

    build_left_add_sub_chain(all)
}

fn is_add_sub(e: &Expr) -> bool {
    matches!(e, Expr::Binary(BinOp::Add, ..) | Expr::Binary(BinOp::Sub, ..))
}

fn signed_terms(e: &Expr) -> Vec<(bool, Expr)> {
    match e {
        Expr::Binary(BinOp::Add, l, r, _) => vec![(true, (**l).clone()), (true, (**r).clone())],
        Expr::Binary(BinOp::Sub, l, r, _) => vec![(true, (**l).clone()), (false, (**r).clone())],
        other => vec![(true, other.clone())],
    }
}

fn build_signed_sum(terms: Vec<(bool, Expr)>) -> Expr {
    let mut iter = terms.into_iter();
    let Some((sign0, first)) = iter.next() else { return Expr::literal(0.0) };
    let mut acc = if sign0 { first } else { Expr::unary(UnOp::Neg, first) };
    for (sign, t) in iter {
        acc = if sign { Expr::binary(BinOp::Add, acc, t) } else { Expr::binary(BinOp::Sub, acc, t) };
    }
    acc
}

fn distribute_mul(l: &Expr, r: &Expr) -> Expr {
    let (l_as, r_as) = (is_add_sub(l), is_add_sub(r));
    if l_as && r_as {
        let lt = signed_terms(l);
        let rt = signed_terms(r);
        let mut terms = Vec::new();
        for (ls, le) in &lt {
            for (rs, re) in &rt {
                terms.push((*ls == *rs, Expr::binary(BinOp::Mul, le.clone(), re.clone())));
            }
        }
        return build_signed_sum(terms);
    }
    if l_as {
        let terms =
            signed_terms(l).into_iter().map(|(s, t)| (s, Expr::binary(BinOp::Mul, t, r.clone()))).collect();
        return build_signed_sum(terms);
    }
    if r_as {
        let terms =
            signed_terms(r).into_iter().map(|(s, t)| (s, Expr::binary(BinOp::Mul, l.clone(), t))).collect();
        return build_signed_sum(terms);
    }
    Expr::binary(BinOp::Mul, l.clone(), r.clone())
}

fn as_positive_int_above_one(v: f64) -> Option<u32> {
    if v.fract() == 0.0 && v > 1.0 && v <= u32::MAX as f64 {
        Some(v as u32)
    } else {
        None
    }
}

fn expand_pass(e: &Expr) -> Expr {
    match e {
        Expr::Literal(..) | Expr::Symbol(..) => e.clone(),
        Expr::Unary(op, c, _) => Expr::unary(*op, expand_pass(c)),
        Expr::Binary(BinOp::Mul, l, r, _) => {
            let l2 = expand_pass(l);
            let r2 = expand_pass(r);
            distribute_mul(&l2, &r2)
        }
        Expr::Binary(BinOp::Pow, base, exp, _) => {
            let base2 = expand_pass(base);
            let exp2 = expand_pass(exp);
            if is_add_sub(&base2) {
                if let Some(n) = literal_value(&exp2).and_then(as_positive_int_above_one) {
                    let reduced = Expr::binary(BinOp::Pow, base2.clone(), Expr::literal((n - 1) as f64));
                    return distribute_mul(&base2, &expand_pass(&reduced));
                }
            }
            Expr::binary(BinOp::Pow, base2, exp2)
        }
        Expr::Binary(op, l, r, _) => Expr::binary(*op, expand_pass(l), expand_pass(r)),
    }
}

/// Applies distributivity and binomial expansion to a fixed point
/// (spec.md §4.3.6).
pub fn expand(e: &Expr) -> Expr {
    let mut cur = e.clone();
    loop {
        let next = expand_pass(&cur);
        if next == cur {
            return next;
        }
        cur = next;
    }
}

/// A single bottom-up fold: local evaluation plus chain compression at
/// every node.
pub fn evaluate(e: &Expr) -> Expr {
    match e {
        Expr::Literal(..) | Expr::Symbol(..) => e.clone(),
        Expr::Unary(op, c, _) => {
            let folded = eval_unary(*op, evaluate(c));
            if matches!(folded, Expr::Unary(UnOp::Neg, ..)) {
                compress_add_sub(&folded)
            } else {
                folded
            }
        }
        Expr::Binary(op, l, r, _) => {
            let folded = eval_binary(*op, evaluate(l), evaluate(r), None, false);
            match folded {
                Expr::Binary(BinOp::Mul, ..) | Expr::Binary(BinOp::Div, ..) => compress_mul_div(&folded),
                Expr::Binary(BinOp::Add, ..) | Expr::Binary(BinOp::Sub, ..) => compress_add_sub(&folded),
                other => other,
            }
        }
    }
}

/// `simplify = evaluate -> expand to fixed point -> evaluate twice`
/// (spec.md §4.3.6).
pub fn simplify(e: &Expr) -> Expr {
    let e1 = evaluate(e);
    let e2 = expand(&e1);
    let e3 = evaluate(&e2);
    evaluate(&e3)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::name::name;

    fn sym(s: &str) -> Expr {
        Expr::symbol(name(s))
    }

    #[test]
    fn zero_and_one_identities_fold() {
        let x = sym("x");
        assert_eq!(eval_binary(BinOp::Add, Expr::literal(0.0), x.clone(), None, false), x);
        assert_eq!(eval_binary(BinOp::Mul, Expr::literal(1.0), x.clone(), None, false), x);
        assert_eq!(eval_binary(BinOp::Mul, Expr::literal(0.0), x.clone(), None, false), Expr::literal(0.0));
    }

    #[test]
    fn rational_quotient_reduces_by_gcd() {
        let e = eval_binary(BinOp::Div, Expr::literal(6.0), Expr::literal(4.0), None, false);
        // 6/4 -> 3/2
        assert_eq!(e, Expr::binary(BinOp::Div, Expr::literal(3.0), Expr::literal(2.0)));
    }

    #[test]
    fn force_flag_uses_float_division() {
        let e = eval_binary(BinOp::Div, Expr::literal(6.0), Expr::literal(4.0), None, true);
        assert_eq!(e, Expr::literal(1.5));
    }

    #[test]
    fn compress_add_sub_cancels_opposite_terms() {
        let x = sym("x");
        let e = Expr::binary(BinOp::Sub, Expr::binary(BinOp::Add, x.clone(), sym("y")), x);
        let c = compress_add_sub(&e);
        assert_eq!(c, sym("y"));
    }

    #[test]
    fn compress_mul_div_cancels_common_factor() {
        let x = sym("x");
        let y = sym("y");
        let e = Expr::binary(BinOp::Div, Expr::binary(BinOp::Mul, x.clone(), y.clone()), x);
        let c = compress_mul_div(&e);
        assert_eq!(c, y);
    }

    #[test]
    fn expand_distributes_product_of_sums() {
        let a = sym("a");
        let b = sym("b");
        let c = sym("c");
        let d = sym("d");
        let e = Expr::binary(
            BinOp::Mul,
            Expr::binary(BinOp::Add, a.clone(), b.clone()),
            Expr::binary(BinOp::Add, c.clone(), d.clone()),
        );
        let expanded = expand(&e);
        // Should contain four product terms; spot check via simplify + eval.
        let s = simplify(&expanded);
        // Substituting concrete values should match (a+b)*(c+d).
        fn subst_all(e: &Expr) -> f64 {
            match e {
                Expr::Literal(v, _) => *v,
                Expr::Unary(UnOp::Neg, c, _) => -subst_all(c),
                Expr::Symbol(s, _) => match s.as_ref() {
                    "a" => 2.0,
                    "b" => 3.0,
                    "c" => 5.0,
                    "d" => 7.0,
                    _ => 0.0,
                },
                Expr::Binary(op, l, r, _) => {
                    let lv = subst_all(l);
                    let rv = subst_all(r);
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
        assert!((subst_all(&s) - (2.0 + 3.0) * (5.0 + 7.0)).abs() < 1e-9);
    }

    #[test]
    fn simplify_is_idempotent() {
        // Property 10.
        let x = sym("x");
        let e = Expr::binary(
            BinOp::Add,
            Expr::binary(BinOp::Mul, Expr::literal(2.0), x.clone()),
            Expr::binary(BinOp::Mul, Expr::literal(3.0), x),
        );
        let once = simplify(&e);
        let twice = simplify(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn canonical_division_of_leaf_over_its_square() {
        let x = sym("x");
        let e = eval_binary(BinOp::Div, x.clone(), Expr::binary(BinOp::Pow, x.clone(), Expr::literal(2.0)), None, false);
        assert_eq!(e, Expr::binary(BinOp::Div, Expr::literal(1.0), x));
    }
}
