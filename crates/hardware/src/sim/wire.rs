//! Fixed-size frame codec.
//!
//! A message travels as its JSON text padded with spaces to exactly
//! [`MESSAGE_SIZE`] bytes. Anything longer is rejected rather than split, so a
//! component that emits too much in one cycle fails loudly.

use crate::common::WireError;
use crate::common::constants::MESSAGE_SIZE;

use super::message::Message;

/// Encodes `msg` into one padded frame.
///
/// # Errors
///
/// [`WireError::Oversize`] if the text does not fit in a frame.
pub fn encode(msg: &Message) -> Result<Vec<u8>, WireError> {
    let mut frame = serde_json::to_vec(msg).map_err(WireError::Encode)?;
    if frame.len() > MESSAGE_SIZE {
        return Err(WireError::Oversize {
            len: frame.len(),
            cap: MESSAGE_SIZE,
        });
    }
    frame.resize(MESSAGE_SIZE, b' ');
    Ok(frame)
}

/// Decodes one frame produced by [`encode`].
///
/// # Errors
///
/// [`WireError::BadLength`] unless `frame` is exactly one frame long, and
/// [`WireError::Malformed`] if it does not hold exactly one message.
pub fn decode(frame: &[u8]) -> Result<Message, WireError> {
    if frame.len() != MESSAGE_SIZE {
        return Err(WireError::BadLength(frame.len()));
    }
    serde_json::from_slice(frame.trim_ascii_end()).map_err(WireError::Malformed)
}

/// Checks that `msg` fits in a frame without keeping the encoding.
///
/// # Errors
///
/// Same as [`encode`].
pub fn check(msg: &Message) -> Result<(), WireError> {
    encode(msg).map(drop)
}
