//! Message parsing: MIME structure, header extraction, and body resolution.

pub mod body;
pub mod header;
pub mod message;
