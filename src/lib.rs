//! fluxcore — bit-array, masked-array, and symbolic-expression
//! primitives for metabolic-flux labeling algebra (spec.md §1).
//!
//! - [`bits`] — arbitrary-length two's-complement bit arrays and
//!   combination enumeration (spec.md §4.1).
//! - [`masked`] — dense mask-indexed storage with cumulative transforms
//!   and mass-isotopomer projection (spec.md §4.2).
//! - [`expr`] — arithmetic/relational expression trees: parsing,
//!   evaluation, simplification, differentiation, substitution, and
//!   rendering (spec.md §4.3).
//! - [`linear`] — extracting a `Name -> coefficient` map from an
//!   expression that is a linear combination of named variables
//!   (spec.md §4.4).
//! - [`notation`] — short-notation parsers for MS, MS-MS, MIMS, 1H-NMR,
//!   13C-NMR, and generic cumomer measurement specifications, plus the
//!   [`notation::MGroup`] sum type that ties a parsed notation to its
//!   shared metadata (spec.md §4.5).
//!
//! The core is synchronous, single-threaded, and holds no shared
//! mutable state beyond a per-node structural-hash cache confined to
//! the node it annotates (spec.md §5). Callers intending to share
//! subtrees must clone; there are no global caches or interior
//! mutability shared across threads.

pub mod bits;
pub mod error;
pub mod expr;
pub mod linear;
pub mod masked;
pub mod name;
pub mod notation;

pub use error::{ExprError, SpecError, SpecErrorCode, SpecKind};
pub use linear::Linear;
pub use name::{const_one, name, Name};
