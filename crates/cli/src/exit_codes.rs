//! CLI Exit Code Registry
//!
//! Single source of truth for `gridrelay` exit codes. Scripts rely on them.
//!
//! # Exit Code Ranges
//!
//! | Range   | Domain    | Description                                 |
//! |---------|-----------|---------------------------------------------|
//! | 0       | Universal | Success                                     |
//! | 1       | Universal | General error / some commands failed        |
//! | 2       | Universal | CLI usage error (bad args, bad reference)   |
//! | 3-9     | input     | Reading and parsing local files             |
//! | 10-19   | relay     | Backend client and polling                  |
//! | 20-29   | session   | Persisted session id                        |
//!
//! # Adding New Exit Codes
//!
//! 1. Add the constant in the appropriate range
//! 2. Document what triggers it
//! 3. Update the table above

// =============================================================================
// Universal (0-2)
// =============================================================================

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, unparseable A1 reference.
pub const EXIT_USAGE: u8 = 2;

/// `apply`: at least one command returned `ok: false`.
/// Like `diff(1)`, exit 1 means "not everything matched."
pub const EXIT_APPLY_FAILED: u8 = 1;

// =============================================================================
// Input (3-9)
// =============================================================================

/// Cannot read or write a local file.
pub const EXIT_IO: u8 = 3;

/// Local file is not the expected JSON shape.
pub const EXIT_PARSE: u8 = 4;

// =============================================================================
// Relay (10-19)
// =============================================================================

/// HTTP client could not be constructed (TLS backend, bad config).
pub const EXIT_RELAY_CLIENT: u8 = 10;

/// No candidate backend answered (`run --once`).
pub const EXIT_RELAY_UNAVAILABLE: u8 = 11;

// =============================================================================
// Session (20-29)
// =============================================================================

/// Session file could not be written.
pub const EXIT_SESSION_STORE: u8 = 20;
