//! The `Expr` node type: tag, children, and the cached structural hash.
//!
//! Grounded on `original_source/symbolicmath/ExprTree.h`'s node union
//! (`en_value`/`en_symbol`/`en_op`) and its per-node hash cache, reshaped
//! onto a plain Rust enum since variants here are a closed, tag-dispatched
//! set rather than a C union.

use std::cell::Cell;
use std::cmp::Ordering;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use crate::name::Name;

/// Unary operators (spec.md §3).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum UnOp {
    Neg,
    Abs,
    Exp,
    Sqrt,
    Log,
    Log2,
    Log10,
    Sqr,
    Sin,
    Cos,
}

impl UnOp {
    pub fn name(self) -> &'static str {
        use UnOp::*;
        match self {
            Neg => "neg",
            Abs => "abs",
            Exp => "exp",
            Sqrt => "sqrt",
            Log => "log",
            Log2 => "log2",
            Log10 => "log10",
            Sqr => "sqr",
            Sin => "sin",
            Cos => "cos",
        }
    }
}

/// Binary operators, including the relational set (spec.md §3).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
    Min,
    Max,
    Diff,
    Eq,
    Neq,
    Le,
    Lt,
    Ge,
    Gt,
}

impl BinOp {
    pub fn name(self) -> &'static str {
        use BinOp::*;
        match self {
            Add => "+",
            Sub => "-",
            Mul => "*",
            Div => "/",
            Pow => "^",
            Min => "min",
            Max => "max",
            Diff => "diff",
            Eq => "==",
            Neq => "!=",
            Le => "<=",
            Lt => "<",
            Ge => ">=",
            Gt => ">",
        }
    }

    /// Whether this operator is one of the six relational comparisons.
    pub fn is_relational(self) -> bool {
        use BinOp::*;
        matches!(self, Eq | Neq | Le | Lt | Ge | Gt)
    }

    /// The comparator with `<` and `>` (and `<=`/`>=`) swapped — used when
    /// `Linear` negates a relation's coefficients (spec.md §4.4 step 5).
    pub fn flipped(self) -> BinOp {
        use BinOp::*;
        match self {
            Lt => Gt,
            Gt => Lt,
            Le => Ge,
            Ge => Le,
            other => other,
        }
    }
}

/// A node in an arithmetic/relational expression tree (spec.md §3).
///
/// Ownership is tree-exclusive: a parent owns its children outright, and
/// `Clone` performs a deep copy. There is no interior mutability shared
/// across nodes; the hash cache is private to each node.
#[derive(Debug)]
pub enum Expr {
    Literal(f64, Cell<Option<u64>>),
    Symbol(Name, Cell<Option<u64>>),
    Unary(UnOp, Box<Expr>, Cell<Option<u64>>),
    Binary(BinOp, Box<Expr>, Box<Expr>, Cell<Option<u64>>),
}

const LITERAL_SEED: u64 = 0x9E3779B97F4A7C15;
const SYMBOL_SEED: u64 = 0xC2B2AE3D27D4EB4F;

fn mix(a: u64, b: u64, tag: u64) -> u64 {
    let mut h = DefaultHasher::new();
    a.hash(&mut h);
    b.hash(&mut h);
    tag.hash(&mut h);
    h.finish()
}

impl Expr {
    /// Builds a literal node. A negative value produces a unary-minus node
    /// over the positive magnitude, so every stored `Literal` payload is
    /// non-negative (spec.md §4.3.1).
    pub fn literal(v: f64) -> Expr {
        if v.is_sign_negative() && v != 0.0 {
            Expr::Unary(UnOp::Neg, Box::new(Expr::Literal(-v, Cell::new(None))), Cell::new(None))
        } else {
            Expr::Literal(v, Cell::new(None))
        }
    }

    /// Builds a symbol node.
    pub fn symbol(name: Name) -> Expr {
        Expr::Symbol(name, Cell::new(None))
    }

    /// Builds a unary-operator node.
    pub fn unary(op: UnOp, child: Expr) -> Expr {
        Expr::Unary(op, Box::new(child), Cell::new(None))
    }

    /// Builds a binary-operator node.
    pub fn binary(op: BinOp, lhs: Expr, rhs: Expr) -> Expr {
        Expr::Binary(op, Box::new(lhs), Box::new(rhs), Cell::new(None))
    }

    fn hash_cell(&self) -> &Cell<Option<u64>> {
        match self {
            Expr::Literal(_, c) | Expr::Symbol(_, c) | Expr::Unary(_, _, c) | Expr::Binary(_, _, _, c) => c,
        }
    }

    /// Invalidates this node's cached hash. Callers that replace a child
    /// in place must invalidate along the path from the edit to the root
    /// (spec.md §4.3.2); tree-rebuilding operations that construct fresh
    /// parent nodes do this automatically because a freshly built node
    /// starts with an empty cache.
    pub fn invalidate_hash(&self) {
        self.hash_cell().set(None);
    }

    /// The cached (or freshly computed) structural hash of this node.
    pub fn structural_hash(&self) -> u64 {
        if let Some(h) = self.hash_cell().get() {
            return h;
        }
        let h = match self {
            Expr::Literal(v, _) => mix(LITERAL_SEED, v.to_bits(), 0),
            Expr::Symbol(name, _) => {
                let mut hasher = DefaultHasher::new();
                name.as_bytes().hash(&mut hasher);
                mix(SYMBOL_SEED, hasher.finish(), 1)
            }
            Expr::Unary(op, child, _) => mix(child.structural_hash(), *op as u64, 2),
            Expr::Binary(op, lhs, rhs, _) => {
                mix(lhs.structural_hash(), rhs.structural_hash(), 0x10 + *op as u64)
            }
        };
        self.hash_cell().set(Some(h));
        h
    }
}

impl Clone for Expr {
    fn clone(&self) -> Expr {
        match self {
            Expr::Literal(v, c) => Expr::Literal(*v, Cell::new(c.get())),
            Expr::Symbol(n, c) => Expr::Symbol(n.clone(), Cell::new(c.get())),
            Expr::Unary(op, child, c) => Expr::Unary(*op, child.clone(), Cell::new(c.get())),
            Expr::Binary(op, l, r, c) => Expr::Binary(*op, l.clone(), r.clone(), Cell::new(c.get())),
        }
    }
}

impl PartialEq for Expr {
    /// Structural equality: tag, then recursive comparison of children.
    /// Symbol equality is by name; literal equality is by exact bit
    /// pattern (spec.md §4.3.3) — this does not normalize `NaN`s, which
    /// compare equal to themselves here though `f64::eq` would not.
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Expr::Literal(a, _), Expr::Literal(b, _)) => a.to_bits() == b.to_bits(),
            (Expr::Symbol(a, _), Expr::Symbol(b, _)) => a == b,
            (Expr::Unary(op_a, a, _), Expr::Unary(op_b, b, _)) => op_a == op_b && a == b,
            (Expr::Binary(op_a, la, ra, _), Expr::Binary(op_b, lb, rb, _)) => {
                op_a == op_b && la == lb && ra == rb
            }
            _ => false,
        }
    }
}
impl Eq for Expr {}

/// Rank used by the total order: `Literal < Symbol < Operator` (spec.md
/// §4.3.3).
fn tag_rank(e: &Expr) -> u8 {
    match e {
        Expr::Literal(..) => 0,
        Expr::Symbol(..) => 1,
        Expr::Unary(..) => 2,
        Expr::Binary(..) => 2,
    }
}

impl PartialOrd for Expr {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Expr {
    /// Total order: `Literal < Symbol < Operator`; ties within literals
    /// break by numeric value, within symbols by lexicographic name,
    /// within operators by tag then children (spec.md §4.3.3).
    fn cmp(&self, other: &Self) -> Ordering {
        match tag_rank(self).cmp(&tag_rank(other)) {
            Ordering::Equal => {}
            o => return o,
        }
        match (self, other) {
            (Expr::Literal(a, _), Expr::Literal(b, _)) => {
                a.partial_cmp(b).unwrap_or(Ordering::Equal)
            }
            (Expr::Symbol(a, _), Expr::Symbol(b, _)) => a.cmp(b),
            (Expr::Unary(op_a, a, _), Expr::Unary(op_b, b, _)) => {
                (*op_a as u8).cmp(&(*op_b as u8)).then_with(|| a.cmp(b))
            }
            (Expr::Binary(op_a, la, ra, _), Expr::Binary(op_b, lb, rb, _)) => {
                (*op_a as u8).cmp(&(*op_b as u8)).then_with(|| la.cmp(lb)).then_with(|| ra.cmp(rb))
            }
            (Expr::Unary(..), Expr::Binary(..)) => Ordering::Less,
            (Expr::Binary(..), Expr::Unary(..)) => Ordering::Greater,
            _ => Ordering::Equal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::name::name;

    #[test]
    fn clone_preserves_text_and_hash() {
        // Property 9.
        let e = Expr::binary(BinOp::Add, Expr::symbol(name("x")), Expr::literal(2.0));
        let h = e.structural_hash();
        let cloned = e.clone();
        assert_eq!(cloned.structural_hash(), h);
        assert_eq!(e, cloned);
    }

    #[test]
    fn negative_literal_becomes_unary_minus() {
        let e = Expr::literal(-3.0);
        match e {
            Expr::Unary(UnOp::Neg, inner, _) => {
                assert!(matches!(*inner, Expr::Literal(v, _) if v == 3.0));
            }
            _ => panic!("expected Unary(Neg, Literal(3.0))"),
        }
    }

    #[test]
    fn total_order_ranks_literal_below_symbol_below_operator() {
        let lit = Expr::literal(5.0);
        let sym = Expr::symbol(name("x"));
        let op = Expr::unary(UnOp::Neg, Expr::symbol(name("x")));
        assert!(lit < sym);
        assert!(sym < op);
    }

    #[test]
    fn mutation_invalidates_cached_hash() {
        let e = Expr::unary(UnOp::Neg, Expr::literal(1.0));
        let h1 = e.structural_hash();
        e.invalidate_hash();
        // Recomputation from an invalidated cache still agrees, since the
        // node's content has not actually changed here.
        assert_eq!(e.structural_hash(), h1);
    }
}
