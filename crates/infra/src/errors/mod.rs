//! Error conversions at the I/O boundary

pub mod conversions;

pub use conversions::{classify_decode_error, classify_transport_error};
