//! Golden vectors for the MsgLog wire format.
//!
//! Existing log files are read with these exact encodings, so any change to
//! the codec that breaks a vector breaks compatibility.

use msglog_core::Msg;

/// A varint and its exact encoding.
#[derive(Debug, Clone, Copy)]
pub struct VarintVector {
    /// Decoded value.
    pub value: u64,
    /// Encoded bytes.
    pub encoded: &'static [u8],
}

/// Varint encodings around every width boundary.
pub const VARINT_VECTORS: &[VarintVector] = &[
    VarintVector { value: 0, encoded: &[0x00] },
    VarintVector { value: 1, encoded: &[0x01] },
    VarintVector { value: 0x7F, encoded: &[0x7F] },
    VarintVector { value: 0x80, encoded: &[0xFF, 0x80] },
    VarintVector { value: 0xFF, encoded: &[0xFF, 0xFF] },
    VarintVector { value: 0x100, encoded: &[0xFE, 0x01, 0x00] },
    VarintVector { value: 0xFFFF, encoded: &[0xFE, 0xFF, 0xFF] },
    VarintVector { value: 0x1_0000, encoded: &[0xFD, 0x01, 0x00, 0x00] },
    VarintVector { value: 0xFFFF_FFFF, encoded: &[0xFC, 0xFF, 0xFF, 0xFF, 0xFF] },
    VarintVector { value: 0x1_0000_0000, encoded: &[0xFB, 0x01, 0x00, 0x00, 0x00, 0x00] },
    VarintVector {
        value: 0x0100_0000_0000_0000,
        encoded: &[0xF8, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00],
    },
    VarintVector {
        value: u64::MAX,
        encoded: &[0xF8, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF],
    },
];

/// Inputs whose prefix announces more than eight bytes.
pub const MALFORMED_VARINTS: &[&[u8]] = &[
    &[0xF7, 0, 0, 0, 0, 0, 0, 0, 0, 0],
    &[0xF0],
    &[0x80],
];

/// Inputs that end before the varint does.
pub const TRUNCATED_VARINTS: &[&[u8]] = &[&[], &[0xFF], &[0xFE, 0x01], &[0xF8, 0, 0, 0, 0, 0, 0, 0]];

/// A header and its exact encoding.
pub const HEADER_VECTOR: (Msg, &[u8]) = (
    Msg {
        seq: 1,
        time: 2,
        from: 3,
        pos: 200,
        prev_pos: 100,
        id: 0x1234,
        length: 3,
    },
    &[0x01, 0x02, 0x03, 0xFF, 0xC8, 0x64, 0xFE, 0x12, 0x34, 0x03],
);

#[cfg(test)]
mod tests {
    use super::*;
    use msglog_codec::{decode_uint, encode_uint, CodecError, MAX_VARINT_LEN};

    #[test]
    fn varint_vectors() {
        let mut buf = [0u8; MAX_VARINT_LEN];
        for v in VARINT_VECTORS {
            assert_eq!(encode_uint(v.value, &mut buf), v.encoded, "encode {:#x}", v.value);
            assert_eq!(
                decode_uint(v.encoded).unwrap(),
                (v.value, v.encoded.len()),
                "decode {:#x}",
                v.value
            );
        }
    }

    #[test]
    fn malformed_vectors() {
        for input in MALFORMED_VARINTS {
            assert!(
                matches!(decode_uint(input), Err(CodecError::Malformed { .. })),
                "{input:02x?}"
            );
        }
    }

    #[test]
    fn truncated_vectors() {
        for input in TRUNCATED_VARINTS {
            assert!(matches!(decode_uint(input), Err(CodecError::Truncated)), "{input:02x?}");
        }
    }

    #[test]
    fn header_vector() {
        let (msg, encoded) = HEADER_VECTOR;
        let mut buf = Vec::new();
        msg.write_header(&mut buf).unwrap();
        assert_eq!(buf, encoded);
        assert_eq!(msg.header_size(), encoded.len() as u64);
        assert_eq!(Msg::decode_header(encoded).unwrap(), (msg, encoded.len()));
    }
}
