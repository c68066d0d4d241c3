use crate::HashError;

/// ASCII byte to nibble value; 255 marks a non-hex byte.
const HEX_DECODE: [u8; 256] = {
    let mut table = [255u8; 256];
    let mut i = 0usize;
    while i < 256 {
        let c = i as u8;
        table[i] = match c {
            b'0'..=b'9' => c - b'0',
            b'a'..=b'f' => c - b'a' + 10,
            b'A'..=b'F' => c - b'A' + 10,
            _ => 255,
        };
        i += 1;
    }
    table
};

const HEX_ENCODE: &[u8; 16] = b"0123456789abcdef";

/// Hex-encode `bytes` as lowercase into a new `String`.
pub fn hex_to_string(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for &b in bytes {
        out.push(HEX_ENCODE[(b >> 4) as usize] as char);
        out.push(HEX_ENCODE[(b & 0x0f) as usize] as char);
    }
    out
}

/// Decode `hex` into `buf`. The hex string must be exactly `buf.len() * 2`
/// characters; both cases are accepted.
pub fn hex_decode(hex: &str, buf: &mut [u8]) -> Result<(), HashError> {
    let hex = hex.as_bytes();
    if hex.len() != buf.len() * 2 {
        return Err(HashError::InvalidHexLength {
            expected: buf.len() * 2,
            actual: hex.len(),
        });
    }
    for (i, pair) in hex.chunks_exact(2).enumerate() {
        let hi = nibble(pair[0], i * 2)?;
        let lo = nibble(pair[1], i * 2 + 1)?;
        buf[i] = (hi << 4) | lo;
    }
    Ok(())
}

fn nibble(c: u8, position: usize) -> Result<u8, HashError> {
    match HEX_DECODE[c as usize] {
        255 => Err(HashError::InvalidHex {
            position,
            character: c as char,
        }),
        v => Ok(v),
    }
}

/// True when `s` consists only of the digits `0-9a-f`.
///
/// Pack names and trailers are always rendered in lowercase, so this is the
/// check used for names taken from the filesystem.
pub fn is_lower_hex(s: &str) -> bool {
    s.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_is_lowercase() {
        assert_eq!(hex_to_string(&[0xde, 0xad, 0xbe, 0xef, 0x00, 0xff]), "deadbeef00ff");
    }

    #[test]
    fn decode_accepts_both_cases() {
        let mut buf = [0u8; 4];
        hex_decode("DeAdBeEf", &mut buf).unwrap();
        assert_eq!(buf, [0xde, 0xad, 0xbe, 0xef]);
    }

    #[test]
    fn decode_reports_position_of_bad_char() {
        let mut buf = [0u8; 4];
        let err = hex_decode("deadgoof", &mut buf).unwrap_err();
        assert!(matches!(
            err,
            HashError::InvalidHex {
                position: 4,
                character: 'g'
            }
        ));
    }

    #[test]
    fn decode_rejects_wrong_length() {
        let mut buf = [0u8; 2];
        let err = hex_decode("abc", &mut buf).unwrap_err();
        assert!(matches!(
            err,
            HashError::InvalidHexLength {
                expected: 4,
                actual: 3
            }
        ));
    }

    #[test]
    fn lower_hex_check() {
        assert!(is_lower_hex("0123456789abcdef"));
        assert!(!is_lower_hex("ABCDEF"));
        assert!(!is_lower_hex("xyz"));
        assert!(is_lower_hex(""));
    }
}
