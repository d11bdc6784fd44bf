//! `mailtrace`: forensic analysis of a single email message.
//!
//! The library parses an RFC 5322 message, extracts the headers an
//! investigator looks at first, resolves a displayable body, traces the
//! originating IP through the `Received:` chain, geolocates it, searches the
//! body for keywords, and writes a self-contained HTML report.

pub mod config;
pub mod error;
pub mod geo;
pub mod model;
pub mod parser;
pub mod report;
pub mod search;
pub mod session;
pub mod trace;

pub use error::{ForensicError, Result};
pub use session::AnalysisSession;
