//! Measurement groups (spec.md §9, SPEC_FULL.md §4.5): the short
//! notations parsed in [`super::parsers`] are always attached to a
//! richer per-pool record in the source (`fluxml/MGroup.h`). Rather than
//! the source's inheritance hierarchy, every variant carries its own
//! data plus a shared [`MGroupCommon`].

use crate::bits::BitArray;
use crate::error::{SpecError, SpecErrorCode, SpecKind};

use super::parsers::{
    parse_13cnmr_spec, parse_1hnmr_spec, parse_cumomer_spec, parse_mims_spec, parse_ms_spec,
    parse_msms_spec, NmrType,
};
use super::scanner::{Scanner, Tok};

/// Fields shared by every measurement-group variant. Timestamps, scaling
/// policy, and error model belong to the numerical-simulation layer and
/// are out of scope; only the identifying metadata survives here.
#[derive(Debug, Clone, PartialEq)]
pub struct MGroupCommon {
    pub id: String,
    pub dimension: usize,
    pub spec_strings: Vec<String>,
}

impl MGroupCommon {
    fn new(pool: &str, dimension: usize, spec: &str) -> Self {
        MGroupCommon { id: pool.to_string(), dimension, spec_strings: vec![spec.to_string()] }
    }
}

/// A parsed measurement group, dispatched from its short notation.
#[derive(Debug, Clone, PartialEq)]
pub enum MGroup {
    Ms { common: MGroupCommon, weights: Vec<u64>, mask: Option<BitArray> },
    MsMs { common: MGroupCommon, weight_pairs: Vec<(u64, u64)>, mask1: BitArray, mask2: BitArray },
    Mims { common: MGroupCommon, weight_tuples: Vec<Vec<u64>>, mask: Option<BitArray>, isotope_count: usize },
    Nmr1h { common: MGroupCommon, positions: Vec<u64> },
    Nmr13c { common: MGroupCommon, positions: Vec<u64>, types: Vec<NmrType> },
    Cumomer { common: MGroupCommon, x_mask: BitArray, one_mask: BitArray },
    Emu { common: MGroupCommon, mask: BitArray },
}

impl MGroup {
    pub fn common(&self) -> &MGroupCommon {
        match self {
            MGroup::Ms { common, .. }
            | MGroup::MsMs { common, .. }
            | MGroup::Mims { common, .. }
            | MGroup::Nmr1h { common, .. }
            | MGroup::Nmr13c { common, .. }
            | MGroup::Cumomer { common, .. }
            | MGroup::Emu { common, .. } => common,
        }
    }

    /// Converts an EMU mask into the cumomer `(x_mask, one_mask)` pair
    /// pinned down by the tests: each EMU atom position becomes free
    /// (`x`) in the corresponding cumomer pattern, since an EMU's
    /// mass-weighted aggregate sums over every labeling state of its
    /// member atoms, and positions outside the EMU mask are fixed at 0.
    /// This is the explicit conversion the source's fall-through left
    /// ambiguous (spec.md §9) — `fluxcore` never falls through an EMU
    /// match arm into cumomer handling; callers must invoke this method.
    pub fn emu_to_cumomer_patterns(&self) -> Vec<(BitArray, BitArray)> {
        let MGroup::Emu { mask, .. } = self else { return Vec::new() };
        let one_mask = BitArray::new(mask.len());
        vec![(mask.clone(), one_mask)]
    }
}

/// Classifies `s` by peeking at characteristic substrings, without fully
/// parsing it (spec.md §4.5.7).
pub fn identify_notation(s: &str) -> SpecKind {
    let after_hash = s.splitn(2, '#').nth(1).unwrap_or("");
    if s.contains(':') && s.contains('[') {
        return SpecKind::MsMs;
    }
    let mut sc = Scanner::new(after_hash);
    let first = sc.next_token(SpecKind::Generic).unwrap_or(Tok::Eof);
    match first {
        Tok::Ident(marker) if marker == "M" => {
            let second = sc.next_token(SpecKind::Generic).unwrap_or(Tok::Eof);
            if second == Tok::LParen {
                let arity = count_tuple_arity(&mut sc);
                if arity >= 2 {
                    SpecKind::Mims
                } else {
                    SpecKind::Ms
                }
            } else {
                SpecKind::Ms
            }
        }
        Tok::Ident(marker) if marker == "P" => SpecKind::Nmr1h,
        Tok::Ident(marker) if matches!(marker.as_str(), "S" | "DL" | "DR" | "DD" | "T") => SpecKind::Nmr13c,
        Tok::Int(_) => {
            if after_hash.chars().all(|c| matches!(c, '0' | '1' | 'x' | 'X')) {
                SpecKind::Generic
            } else {
                SpecKind::Nmr1h
            }
        }
        _ => SpecKind::Generic,
    }
}

fn count_tuple_arity(sc: &mut Scanner) -> usize {
    let mut count = 0;
    loop {
        match sc.next_token(SpecKind::Generic) {
            Ok(Tok::Int(_)) => count += 1,
            Ok(Tok::RParen) | Ok(Tok::Eof) | Err(_) => break,
            _ => {}
        }
    }
    count
}

/// Invokes the notation dispatched by [`identify_notation`] and reports
/// the resulting measurement group, including its dimension (spec.md
/// §4.5.7).
pub fn check_spec(s: &str) -> Result<MGroup, SpecError> {
    match identify_notation(s) {
        SpecKind::MsMs => {
            let (pool, weight_pairs, mask1, mask2) = parse_msms_spec(s)?;
            let common = MGroupCommon::new(&pool, weight_pairs.len(), s);
            Ok(MGroup::MsMs { common, weight_pairs, mask1, mask2 })
        }
        SpecKind::Mims => {
            let (pool, weight_tuples, mask, isotope_count) = parse_mims_spec(s)?;
            let common = MGroupCommon::new(&pool, weight_tuples.len(), s);
            Ok(MGroup::Mims { common, weight_tuples, mask, isotope_count })
        }
        SpecKind::Nmr1h => {
            let (pool, positions) = parse_1hnmr_spec(s)?;
            let common = MGroupCommon::new(&pool, positions.len(), s);
            Ok(MGroup::Nmr1h { common, positions })
        }
        SpecKind::Nmr13c => {
            let (pool, positions, types) = parse_13cnmr_spec(s)?;
            let common = MGroupCommon::new(&pool, positions.len(), s);
            Ok(MGroup::Nmr13c { common, positions, types })
        }
        SpecKind::Generic | SpecKind::Ms => {
            if let Ok((pool, weights, mask)) = parse_ms_spec(s) {
                let common = MGroupCommon::new(&pool, weights.len(), s);
                return Ok(MGroup::Ms { common, weights, mask });
            }
            let (pool, x_mask, one_mask) = parse_cumomer_spec(s)?;
            let dimension = x_mask.len();
            let common = MGroupCommon::new(&pool, dimension, s);
            Ok(MGroup::Cumomer { common, x_mask, one_mask })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifies_msms_by_colon_inside_brackets() {
        assert_eq!(identify_notation("glc[1-4:2-3]#M(0,0)"), SpecKind::MsMs);
    }

    #[test]
    fn identifies_mims_by_multi_element_tuples() {
        assert_eq!(identify_notation("glc#M(0,0),(1,0)"), SpecKind::Mims);
    }

    #[test]
    fn identifies_ms_by_single_arity_tuple() {
        assert_eq!(identify_notation("glc#M0,1,2"), SpecKind::Ms);
    }

    #[test]
    fn dispatches_ms_spec_and_reports_dimension() {
        let g = check_spec("glc[1-3]#M0,1,2").unwrap();
        match g {
            MGroup::Ms { common, weights, .. } => {
                assert_eq!(common.id, "glc");
                assert_eq!(common.dimension, 3);
                assert_eq!(weights, vec![0, 1, 2]);
            }
            other => panic!("unexpected group: {other:?}"),
        }
    }

    #[test]
    fn dispatches_cumomer_spec() {
        let g = check_spec("glc#1x0").unwrap();
        assert!(matches!(g, MGroup::Cumomer { .. }));
    }

    #[test]
    fn emu_to_cumomer_conversion_frees_every_emu_position() {
        let mut mask = BitArray::new(3);
        mask.set(0, true);
        mask.set(2, true);
        let common = MGroupCommon::new("glc", 3, "glc[1,3]");
        let emu = MGroup::Emu { common, mask: mask.clone() };

        let patterns = emu.emu_to_cumomer_patterns();
        assert_eq!(patterns.len(), 1);
        let (x_mask, one_mask) = &patterns[0];
        assert_eq!(x_mask, &mask);
        assert_eq!(one_mask.count_ones(), 0);
    }
}
