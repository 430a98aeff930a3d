//! Vendor wire protocols: command framing and response parsing.
//!
//! Each vendor speaks an undocumented, positional, text-scraped
//! mini-protocol. The framers here reproduce the exact byte framing the
//! firmware expects (this is an interoperability contract, not a style
//! choice) and the parsers pull typed values out of the unstructured text
//! the firmware prints back.

pub mod omi;
pub mod shell;
