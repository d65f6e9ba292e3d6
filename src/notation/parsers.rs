//! Short-notation parsers (spec.md §4.5.1 – §4.5.6).

use crate::bits::BitArray;
use crate::error::{SpecError, SpecErrorCode, SpecKind};

use super::scanner::{split_pool_name, Scanner, Tok};

struct Cur<'a> {
    sc: Scanner<'a>,
    cur: Tok,
    kind: SpecKind,
}

fn perr(code: SpecErrorCode, kind: SpecKind, msg: impl Into<String>) -> SpecError {
    SpecError::new(code, kind, msg)
}

impl<'a> Cur<'a> {
    fn new(s: &'a str, kind: SpecKind) -> Result<Self, SpecError> {
        let mut sc = Scanner::new(s);
        let cur = sc.next_token(kind)?;
        Ok(Cur { sc, cur, kind })
    }

    fn advance(&mut self) -> Result<(), SpecError> {
        self.cur = self.sc.next_token(self.kind)?;
        Ok(())
    }

    fn expect(&mut self, t: &Tok) -> Result<(), SpecError> {
        if &self.cur == t {
            self.advance()
        } else {
            Err(perr(SpecErrorCode::ParseError, self.kind, format!("expected {t:?}, found {:?}", self.cur)))
        }
    }

    fn expect_int(&mut self) -> Result<u64, SpecError> {
        if let Tok::Int(v) = self.cur {
            self.advance()?;
            Ok(v)
        } else {
            Err(perr(SpecErrorCode::ParseError, self.kind, format!("expected integer, found {:?}", self.cur)))
        }
    }

    fn expect_ident(&mut self) -> Result<String, SpecError> {
        if let Tok::Ident(ref s) = self.cur {
            let s = s.clone();
            self.advance()?;
            Ok(s)
        } else {
            Err(perr(SpecErrorCode::ParseError, self.kind, format!("expected identifier, found {:?}", self.cur)))
        }
    }

    fn at_eof(&self) -> bool {
        self.cur == Tok::Eof
    }
}

fn parse_range_list(cur: &mut Cur) -> Result<Vec<(u64, u64)>, SpecError> {
    let mut out = Vec::new();
    loop {
        let a = cur.expect_int()?;
        let range = if cur.cur == Tok::Minus {
            cur.advance()?;
            let b = cur.expect_int()?;
            (a, b)
        } else {
            (a, a)
        };
        out.push(range);
        if cur.cur == Tok::Comma {
            cur.advance()?;
            continue;
        }
        break;
    }
    Ok(out)
}

fn ranges_to_mask(ranges: &[(u64, u64)], kind: SpecKind) -> Result<BitArray, SpecError> {
    if ranges.is_empty() {
        return Err(perr(SpecErrorCode::InvalidRange, kind, "empty range"));
    }
    let mut max_pos = 0u64;
    for &(a, b) in ranges {
        if a == 0 || b < a {
            return Err(perr(SpecErrorCode::InvalidRange, kind, format!("invalid range {a}-{b}")));
        }
        max_pos = max_pos.max(b);
    }
    let mut mask = BitArray::new(max_pos as usize);
    for &(a, b) in ranges {
        for p in a..=b {
            let idx = (p - 1) as usize;
            if mask.get(idx) {
                return Err(perr(SpecErrorCode::OverlappingRanges, kind, format!("position {p} set by overlapping ranges")));
            }
            mask.set(idx, true);
        }
    }
    Ok(mask)
}

/// `range := int | int "-" int ("," range)*` (spec.md §4.5.1).
pub fn parse_range_spec(s: &str) -> Result<BitArray, SpecError> {
    let mut cur = Cur::new(s, SpecKind::Generic)?;
    let ranges = parse_range_list(&mut cur)?;
    if !cur.at_eof() {
        return Err(perr(SpecErrorCode::ParseError, SpecKind::Generic, "trailing input after range"));
    }
    ranges_to_mask(&ranges, SpecKind::Generic)
}

/// Parses the optional `"[" range "]"` atom mask that may follow a pool
/// name, returning `None` when absent.
fn parse_optional_mask(cur: &mut Cur, kind: SpecKind) -> Result<Option<BitArray>, SpecError> {
    if cur.cur != Tok::LBracket {
        return Ok(None);
    }
    cur.advance()?;
    let ranges = parse_range_list(cur)?;
    cur.expect(&Tok::RBracket)?;
    Ok(Some(ranges_to_mask(&ranges, kind)?))
}

fn sorted_unique(mut v: Vec<u64>, kind: SpecKind, code: SpecErrorCode, what: &str) -> Result<Vec<u64>, SpecError> {
    v.sort_unstable();
    for w in v.windows(2) {
        if w[0] == w[1] {
            return Err(perr(code, kind, format!("duplicate {what} {}", w[0])));
        }
    }
    Ok(v)
}

/// `pool ( "[" range "]" )? "#" "M" int ("," int)*` (spec.md §4.5.2).
pub fn parse_ms_spec(s: &str) -> Result<(String, Vec<u64>, Option<BitArray>), SpecError> {
    let kind = SpecKind::Ms;
    let (pool, rest) = split_pool_name(s, kind)?;
    let mut cur = Cur::new(rest, kind)?;

    let mask = parse_optional_mask(&mut cur, kind)?;
    cur.expect(&Tok::Hash)?;
    let marker = cur.expect_ident()?;
    if marker != "M" {
        return Err(perr(SpecErrorCode::ParseError, kind, format!("expected `M`, found `{marker}`")));
    }

    let mut weights = vec![cur.expect_int()?];
    while cur.cur == Tok::Comma {
        cur.advance()?;
        weights.push(cur.expect_int()?);
    }
    if !cur.at_eof() {
        return Err(perr(SpecErrorCode::ParseError, kind, "trailing input after MS spec"));
    }
    let weights = sorted_unique(weights, kind, SpecErrorCode::InvalidWeightSpec, "mass")?;

    let atom_count = mask.as_ref().map(|m| m.count_ones() as u64);
    if let Some(n) = atom_count {
        if weights.iter().any(|&w| w > n) {
            return Err(perr(SpecErrorCode::NotEnoughPositions, kind, "mass exceeds atom count"));
        }
    }

    Ok((pool.to_string(), weights, mask))
}

/// `pool "[" range ":" range "]" "#" "M" "(" int "," int ")" (... )*`
/// (spec.md §4.5.3).
pub fn parse_msms_spec(s: &str) -> Result<(String, Vec<(u64, u64)>, BitArray, BitArray), SpecError> {
    let kind = SpecKind::MsMs;
    let (pool, rest) = split_pool_name(s, kind)?;
    let mut cur = Cur::new(rest, kind)?;

    cur.expect(&Tok::LBracket)?;
    let r1 = parse_range_list(&mut cur)?;
    cur.expect(&Tok::Colon)?;
    let r2 = parse_range_list(&mut cur)?;
    cur.expect(&Tok::RBracket)?;

    let mask1 = ranges_to_mask(&r1, kind)?;
    let mask2 = ranges_to_mask(&r2, kind)?;
    let len = mask1.len().max(mask2.len());
    let mut m1 = mask1.clone();
    let mut m2 = mask2.clone();
    m1.resize(len, false);
    m2.resize(len, false);
    for i in 0..len {
        if m2.get(i) && !m1.get(i) {
            return Err(perr(SpecErrorCode::InvalidRange, kind, "second range is not a subset of the first"));
        }
    }

    cur.expect(&Tok::Hash)?;
    let marker = cur.expect_ident()?;
    if marker != "M" {
        return Err(perr(SpecErrorCode::ParseError, kind, format!("expected `M`, found `{marker}`")));
    }

    let mut pairs = vec![parse_pair(&mut cur)?];
    while cur.cur == Tok::Comma {
        cur.advance()?;
        pairs.push(parse_pair(&mut cur)?);
    }
    if !cur.at_eof() {
        return Err(perr(SpecErrorCode::ParseError, kind, "trailing input after MS-MS spec"));
    }

    pairs.sort_unstable();
    for w in pairs.windows(2) {
        if w[0] == w[1] {
            return Err(perr(SpecErrorCode::InvalidWeightSpec, kind, "duplicate mass pair"));
        }
    }

    Ok((pool.to_string(), pairs, m1, m2))
}

fn parse_pair(cur: &mut Cur) -> Result<(u64, u64), SpecError> {
    cur.expect(&Tok::LParen)?;
    let a = cur.expect_int()?;
    cur.expect(&Tok::Comma)?;
    let b = cur.expect_int()?;
    cur.expect(&Tok::RParen)?;
    Ok((a, b))
}

fn parse_tuple(cur: &mut Cur) -> Result<Vec<u64>, SpecError> {
    cur.expect(&Tok::LParen)?;
    let mut v = vec![cur.expect_int()?];
    while cur.cur == Tok::Comma {
        cur.advance()?;
        v.push(cur.expect_int()?);
    }
    cur.expect(&Tok::RParen)?;
    Ok(v)
}

/// `pool ( "[" range "]" )? "#" "M" "(" int ("," int)* ")" (... )*`
/// (spec.md §4.5.4).
pub fn parse_mims_spec(s: &str) -> Result<(String, Vec<Vec<u64>>, Option<BitArray>, usize), SpecError> {
    let kind = SpecKind::Mims;
    let (pool, rest) = split_pool_name(s, kind)?;
    let mut cur = Cur::new(rest, kind)?;

    let mask = parse_optional_mask(&mut cur, kind)?;
    cur.expect(&Tok::Hash)?;
    let marker = cur.expect_ident()?;
    if marker != "M" {
        return Err(perr(SpecErrorCode::ParseError, kind, format!("expected `M`, found `{marker}`")));
    }

    let first = parse_tuple(&mut cur)?;
    let isotope_count = first.len();
    let mut tuples = vec![first];
    while cur.cur == Tok::Comma {
        cur.advance()?;
        let t = parse_tuple(&mut cur)?;
        if t.len() != isotope_count {
            return Err(perr(SpecErrorCode::InvalidWeightSpec, kind, "tuple arity mismatch"));
        }
        tuples.push(t);
    }
    if !cur.at_eof() {
        return Err(perr(SpecErrorCode::ParseError, kind, "trailing input after MIMS spec"));
    }

    Ok((pool.to_string(), tuples, mask, isotope_count))
}

/// `pool "#" "P" int ("," "P"? int)*` with unique, strictly positive
/// positions (spec.md §4.5.5).
pub fn parse_1hnmr_spec(s: &str) -> Result<(String, Vec<u64>), SpecError> {
    let kind = SpecKind::Nmr1h;
    let (pool, rest) = split_pool_name(s, kind)?;
    let mut cur = Cur::new(rest, kind)?;

    cur.expect(&Tok::Hash)?;
    let marker = cur.expect_ident()?;
    if marker != "P" {
        return Err(perr(SpecErrorCode::ParseError, kind, format!("expected `P`, found `{marker}`")));
    }
    let mut positions = vec![cur.expect_int()?];
    while cur.cur == Tok::Comma {
        cur.advance()?;
        if let Tok::Ident(ref id) = cur.cur {
            if id != "P" {
                return Err(perr(SpecErrorCode::ParseError, kind, format!("expected `P`, found `{id}`")));
            }
            cur.advance()?;
        }
        positions.push(cur.expect_int()?);
    }
    if !cur.at_eof() {
        return Err(perr(SpecErrorCode::ParseError, kind, "trailing input after 1H-NMR spec"));
    }
    if positions.iter().any(|&p| p == 0) {
        return Err(perr(SpecErrorCode::InvalidRange, kind, "position must be strictly positive"));
    }
    let positions = sorted_unique(positions, kind, SpecErrorCode::InvalidWeightSpec, "position")?;
    Ok((pool.to_string(), positions))
}

/// 13C-NMR multiplet types (spec.md §4.5.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NmrType {
    S,
    Dl,
    Dr,
    Dd,
    T,
}

fn parse_nmr_type(s: &str, kind: SpecKind) -> Result<NmrType, SpecError> {
    match s {
        "S" => Ok(NmrType::S),
        "DL" => Ok(NmrType::Dl),
        "DR" => Ok(NmrType::Dr),
        "DD" => Ok(NmrType::Dd),
        "T" => Ok(NmrType::T),
        other => Err(perr(SpecErrorCode::ParseError, kind, format!("unknown multiplet type `{other}`"))),
    }
}

/// `pool "#" type int ("," type? int)*` (spec.md §4.5.5). A missing type
/// re-uses the previous lexeme's type.
pub fn parse_13cnmr_spec(s: &str) -> Result<(String, Vec<u64>, Vec<NmrType>), SpecError> {
    let kind = SpecKind::Nmr13c;
    let (pool, rest) = split_pool_name(s, kind)?;
    let mut cur = Cur::new(rest, kind)?;

    cur.expect(&Tok::Hash)?;

    let first_type_name = cur.expect_ident()?;
    let mut last_type = parse_nmr_type(&first_type_name, kind)?;
    let mut entries = vec![(cur.expect_int()?, last_type)];

    while cur.cur == Tok::Comma {
        cur.advance()?;
        if let Tok::Ident(ref id) = cur.cur {
            last_type = parse_nmr_type(id, kind)?;
            cur.advance()?;
        }
        entries.push((cur.expect_int()?, last_type));
    }
    if !cur.at_eof() {
        return Err(perr(SpecErrorCode::ParseError, kind, "trailing input after 13C-NMR spec"));
    }

    for &(pos, ty) in &entries {
        if matches!(ty, NmrType::Dl | NmrType::T) && pos <= 1 {
            return Err(perr(SpecErrorCode::InvalidRange, kind, format!("position {pos} invalid for type {ty:?}")));
        }
    }

    for ty in [NmrType::S, NmrType::Dl, NmrType::Dr, NmrType::Dd, NmrType::T] {
        let mut positions: Vec<u64> = entries.iter().filter(|(_, t)| *t == ty).map(|(p, _)| *p).collect();
        positions.sort_unstable();
        for w in positions.windows(2) {
            if w[0] == w[1] {
                return Err(perr(SpecErrorCode::InvalidWeightSpec, kind, format!("duplicate position {} for type {ty:?}", w[0])));
            }
        }
    }

    let (positions, types): (Vec<u64>, Vec<NmrType>) = entries.into_iter().unzip();
    Ok((pool.to_string(), positions, types))
}

/// `pool "#" pattern`, `pattern` over `{0, 1, x}` one character per atom
/// (spec.md §4.5.6).
pub fn parse_cumomer_spec(s: &str) -> Result<(String, BitArray, BitArray), SpecError> {
    let kind = SpecKind::Generic;
    let (pool, rest) = split_pool_name(s, kind)?;
    let pattern = rest
        .strip_prefix('#')
        .ok_or_else(|| perr(SpecErrorCode::ParseError, kind, "expected `#` before cumomer pattern"))?;
    if pattern.is_empty() {
        return Err(perr(SpecErrorCode::InvalidRange, kind, "empty cumomer pattern"));
    }

    let n = pattern.len();
    let mut one_mask = BitArray::new(n);
    let mut x_mask = BitArray::new(n);
    for (i, c) in pattern.chars().enumerate() {
        match c {
            '1' => one_mask.set(i, true),
            'x' | 'X' => x_mask.set(i, true),
            '0' => {}
            other => return Err(perr(SpecErrorCode::ParseError, kind, format!("invalid pattern character `{other}`"))),
        }
    }

    Ok((pool.to_string(), x_mask, one_mask))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_spec_sets_named_positions() {
        let mask = parse_range_spec("1-3,5").unwrap();
        assert_eq!(mask.count_ones(), 4);
        assert!(mask.get(0) && mask.get(1) && mask.get(2) && mask.get(4));
        assert!(!mask.get(3));
    }

    #[test]
    fn range_spec_rejects_overlap() {
        assert!(parse_range_spec("1-3,2-4").is_err());
    }

    #[test]
    fn range_spec_matches_property_16() {
        let mask = parse_range_spec("1-3,5,7-9").unwrap();
        assert!(mask.len() >= 9);
        for bit in [0, 1, 2, 4, 6, 7, 8] {
            assert!(mask.get(bit), "expected bit {bit} set");
        }
        assert!(!mask.get(3) && !mask.get(5));
    }

    #[test]
    fn ms_spec_matches_property_17() {
        let (pool, weights, mask) = parse_ms_spec("Glu[1-5]#M0,1,2").unwrap();
        assert_eq!(pool, "Glu");
        assert_eq!(weights, vec![0, 1, 2]);
        assert_eq!(mask.unwrap().count_ones(), 5);
    }

    #[test]
    fn msms_spec_matches_property_18() {
        assert!(parse_msms_spec("Glu[1-5:2-6]#M(3,2),(5,3)").is_err());
        let (pool, pairs, _, _) = parse_msms_spec("Glu[1-5:2-4]#M(3,2),(5,3)").unwrap();
        assert_eq!(pool, "Glu");
        assert_eq!(pairs, vec![(3, 2), (5, 3)]);
    }

    #[test]
    fn cumomer_spec_matches_property_19() {
        let (pool, x_mask, one_mask) = parse_cumomer_spec("Glu#1x01").unwrap();
        assert_eq!(pool, "Glu");
        assert!(x_mask.get(1) && x_mask.count_ones() == 1);
        assert!(one_mask.get(0) && one_mask.get(3) && one_mask.count_ones() == 2);
    }

    #[test]
    fn ms_spec_parses_pool_mask_and_weights() {
        let (pool, weights, mask) = parse_ms_spec("glc[1-3]#M0,1,2").unwrap();
        assert_eq!(pool, "glc");
        assert_eq!(weights, vec![0, 1, 2]);
        assert_eq!(mask.unwrap().count_ones(), 3);
    }

    #[test]
    fn ms_spec_without_mask() {
        let (pool, weights, mask) = parse_ms_spec("pyr#M1").unwrap();
        assert_eq!(pool, "pyr");
        assert_eq!(weights, vec![1]);
        assert!(mask.is_none());
    }

    #[test]
    fn ms_spec_mass_exceeding_atom_count_is_rejected() {
        assert!(parse_ms_spec("glc[1-2]#M5").is_err());
    }

    #[test]
    fn msms_spec_requires_subset_ranges() {
        assert!(parse_msms_spec("glc[1-3:1-4]#M(0,0)").is_err());
        let (pool, pairs, m1, m2) = parse_msms_spec("glc[1-4:2-3]#M(0,0),(1,1)").unwrap();
        assert_eq!(pool, "glc");
        assert_eq!(pairs, vec![(0, 0), (1, 1)]);
        assert_eq!(m1.count_ones(), 4);
        assert_eq!(m2.count_ones(), 2);
    }

    #[test]
    fn mims_spec_checks_tuple_arity() {
        let (pool, tuples, _, n) = parse_mims_spec("glc#M(0,0),(1,0)").unwrap();
        assert_eq!(pool, "glc");
        assert_eq!(n, 2);
        assert_eq!(tuples.len(), 2);
        assert!(parse_mims_spec("glc#M(0,0),(1,0,0)").is_err());
    }

    #[test]
    fn nmr1h_spec_parses_positions() {
        let (pool, positions) = parse_1hnmr_spec("ala#P1,P2,3").unwrap();
        assert_eq!(pool, "ala");
        assert_eq!(positions, vec![1, 2, 3]);
    }

    #[test]
    fn nmr13c_spec_reuses_previous_type() {
        let (pool, positions, types) = parse_13cnmr_spec("ala#S2,3,DL4").unwrap();
        assert_eq!(pool, "ala");
        assert_eq!(positions, vec![2, 3, 4]);
        assert_eq!(types, vec![NmrType::S, NmrType::S, NmrType::Dl]);
    }

    #[test]
    fn nmr13c_spec_matches_property_20() {
        let (pool, positions, types) = parse_13cnmr_spec("Ala#S1,DL2,DR3").unwrap();
        assert_eq!(pool, "Ala");
        assert_eq!(positions, vec![1, 2, 3]);
        assert_eq!(types, vec![NmrType::S, NmrType::Dl, NmrType::Dr]);

        let err = parse_13cnmr_spec("Ala#T1").unwrap_err();
        assert_eq!(err.code(), SpecErrorCode::InvalidRange.code());
    }

    #[test]
    fn nmr13c_rejects_dl_at_position_one() {
        assert!(parse_13cnmr_spec("ala#DL1").is_err());
    }

    #[test]
    fn cumomer_spec_splits_fixed_and_free_positions() {
        let (pool, x_mask, one_mask) = parse_cumomer_spec("glc#1x0").unwrap();
        assert_eq!(pool, "glc");
        assert!(one_mask.get(0) && !one_mask.get(1) && !one_mask.get(2));
        assert!(x_mask.get(1) && !x_mask.get(0) && !x_mask.get(2));
    }
}
