//! Shared body decoding for message-style events

use base64::{engine::general_purpose::STANDARD, Engine as _};
use rustlambda_core::DecodeError;
use serde::de::DeserializeOwned;

/// An event carrying a textual body that may be base64 encoded
///
/// An empty body means "no payload". Decoding a typed payload from it is a
/// decode fault rather than an attempt to parse empty JSON.
pub trait DecodableBody {
    fn body(&self) -> Option<&str>;

    fn is_base64_encoded(&self) -> bool {
        false
    }

    /// Raw body bytes, `None` when the body is absent or empty
    fn body_bytes(&self) -> Result<Option<Vec<u8>>, DecodeError> {
        decode_body_bytes(self.body(), self.is_base64_encoded())
    }

    /// Decode the body as JSON into `T`
    fn decode_body<T: DeserializeOwned>(&self) -> Result<T, DecodeError>
    where
        Self: Sized,
    {
        let bytes = self.body_bytes()?.ok_or(DecodeError::EmptyBody)?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

pub fn decode_body_bytes(
    body: Option<&str>,
    is_base64_encoded: bool,
) -> Result<Option<Vec<u8>>, DecodeError> {
    match body {
        None | Some("") => Ok(None),
        Some(text) if is_base64_encoded => Ok(Some(STANDARD.decode(text)?)),
        Some(text) => Ok(Some(text.as_bytes().to_vec())),
    }
}
