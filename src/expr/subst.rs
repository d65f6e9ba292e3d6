//! Substitution and free-symbol collection (spec.md §4.3.9, SPEC_FULL.md
//! §4.3).

use std::collections::BTreeSet;

use crate::name::Name;

use super::node::Expr;

/// Deep-copies `e`, replacing every occurrence of symbol `name` with
/// `replacement`. The cache on freshly built nodes along the replaced
/// path starts empty, so no explicit invalidation is needed.
pub fn subst(e: &Expr, name: &Name, replacement: &Expr) -> Expr {
    match e {
        Expr::Literal(..) => e.clone(),
        Expr::Symbol(s, _) => {
            if s == name {
                replacement.clone()
            } else {
                e.clone()
            }
        }
        Expr::Unary(op, c, _) => Expr::unary(*op, subst(c, name, replacement)),
        Expr::Binary(op, l, r, _) => Expr::binary(*op, subst(l, name, replacement), subst(r, name, replacement)),
    }
}

/// The set of symbol names occurring anywhere in `e`.
pub fn free_symbols(e: &Expr) -> BTreeSet<Name> {
    let mut out = BTreeSet::new();
    collect(e, &mut out);
    out
}

fn collect(e: &Expr, out: &mut BTreeSet<Name>) {
    match e {
        Expr::Literal(..) => {}
        Expr::Symbol(s, _) => {
            out.insert(s.clone());
        }
        Expr::Unary(_, c, _) => collect(c, out),
        Expr::Binary(_, l, r, _) => {
            collect(l, out);
            collect(r, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::node::BinOp;
    use crate::name::name;

    #[test]
    fn subst_replaces_every_occurrence() {
        // Property 12.
        let x = name("x");
        let e = Expr::binary(BinOp::Add, Expr::symbol(x.clone()), Expr::binary(BinOp::Mul, Expr::symbol(x), Expr::literal(2.0)));
        let replaced = subst(&e, &name("x"), &Expr::literal(5.0));
        assert!(free_symbols(&replaced).is_empty());
    }

    #[test]
    fn free_symbols_collects_every_distinct_name() {
        let e = Expr::binary(
            BinOp::Add,
            Expr::symbol(name("x")),
            Expr::binary(BinOp::Mul, Expr::symbol(name("y")), Expr::symbol(name("x"))),
        );
        let syms = free_symbols(&e);
        assert_eq!(syms.len(), 2);
        assert!(syms.contains(&name("x")));
        assert!(syms.contains(&name("y")));
    }
}
