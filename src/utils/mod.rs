//! Utility functions and helpers.
//!
//! Common functionality shared by the scanner and the CLI:
//!
//! - [`format`] - Number formatting for summaries
//! - [`progress`] - Progress tracking and display utilities
//! - [`time`] - Timestamp parsing and formatting helpers
//!
//! # Examples
//!
//! ## Parsing timestamps
//!
//! ```no_run
//! use vault_inventory::utils::time::parse_timestamp;
//!
//! let timestamp = parse_timestamp("2025-10-20T10:30:00.000Z").unwrap();
//! println!("Parsed: {}", timestamp);
//! ```

pub mod format;
pub mod progress;
pub mod time;
