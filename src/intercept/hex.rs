//! ASCII-Hex Codec
//!
//! Converts between raw byte buffers and the space-separated two-digit hex
//! text form used by the interactive edit sub-protocol.

use bytes::Bytes;

/// Encode a byte buffer as space-separated two-digit hex tokens
pub fn encode(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{:02x}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Decode whitespace-separated two-digit hex tokens back into bytes.
///
/// Any malformed token fails the whole input; a partial buffer is never
/// returned. Empty input decodes to an empty buffer.
pub fn decode(text: &str) -> Option<Bytes> {
    let mut decoded = Vec::new();
    for token in text.split_whitespace() {
        if token.len() != 2 {
            return None;
        }
        decoded.push(u8::from_str_radix(token, 16).ok()?);
    }
    Some(Bytes::from(decoded))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_arbitrary_bytes() {
        let data = [0x00, 0x01, 0x41, 0x7f, 0x80, 0xff];
        assert_eq!(decode(&encode(&data)).unwrap(), Bytes::copy_from_slice(&data));
    }

    #[test]
    fn empty_input_decodes_to_empty_buffer() {
        assert_eq!(decode("").unwrap(), Bytes::new());
        assert_eq!(decode("   \n ").unwrap(), Bytes::new());
    }

    #[test]
    fn decodes_known_tokens() {
        assert_eq!(decode("50 4f 4e 47").unwrap(), Bytes::from_static(b"PONG"));
    }

    #[test]
    fn tolerates_newlines_between_tokens() {
        assert_eq!(decode("41\n42\t43").unwrap(), Bytes::from_static(b"ABC"));
    }

    #[test]
    fn odd_length_token_fails_whole_input() {
        assert!(decode("4").is_none());
        assert!(decode("41 4 42").is_none());
        assert!(decode("414").is_none());
    }

    #[test]
    fn non_hex_token_fails_whole_input() {
        assert!(decode("zz").is_none());
        assert!(decode("41 zz 42").is_none());
    }
}
