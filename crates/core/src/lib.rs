//! Core types shared by every gridrelay crate: A1 cell and range addressing.

pub mod address;

pub use address::{
    format_column, parse_a1, parse_column, parse_range,
    CellAddress, ParseAddressError, RangeAddress,
};
