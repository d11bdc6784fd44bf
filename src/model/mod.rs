//! Core data model types: raw and parsed messages, extracted evidence.

pub mod evidence;
pub mod message;
