//! C5: short-notation parsers for measurement-group specifications
//! (spec.md §4.5), plus the measurement-group sum type that ties a
//! parsed notation to its shared metadata (SPEC_FULL.md §4.5).

mod mgroup;
mod parsers;
mod scanner;

pub use mgroup::{check_spec, identify_notation, MGroup, MGroupCommon};
pub use parsers::{
    parse_13cnmr_spec, parse_1hnmr_spec, parse_cumomer_spec, parse_mims_spec, parse_ms_spec,
    parse_msms_spec, parse_range_spec, NmrType,
};
