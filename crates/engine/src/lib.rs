//! Command interpreter and spreadsheet host surface.
//!
//! - [`host`]: the capability surface a mounted spreadsheet provides
//! - [`keymap`]: semantic key → cell location table
//! - [`interpreter`]: applies relay commands to a host
//! - [`workbook`] / [`sheet`]: an in-memory host

pub mod host;
pub mod interpreter;
pub mod keymap;
pub mod sheet;
pub mod workbook;

pub use host::{Capabilities, CellInput, CellRecord, HostError, MergeRegion, SheetRecord, SpreadsheetHost};
pub use interpreter::Interpreter;
pub use keymap::{KeyMap, KeyMapEntry, KeyMapError};
pub use workbook::{CellWrite, Workbook};
