//! Core types for rustlambda
//!
//! This crate provides the error taxonomy and the small wire primitives
//! shared by the event codecs and the runtime loop.

pub mod error;
pub mod headers;
pub mod number;
pub mod timestamp;

pub use error::{BoxError, DecodeError, ErrorDocument, ErrorKind, RuntimeError};
pub use headers::MultiValueMap;
pub use number::AwsNumber;
pub use timestamp::TimestampFormat;
