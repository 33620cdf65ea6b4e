//! Unsigned variable-length integers.
//!
//! Values are written little-endian, base 128: each byte carries 7 bits of the value in its low
//! bits, and the high bit is set on every byte except the last. A `u64` needs at most
//! [`MAX_VARINT_LEN`] bytes. Anything longer, or a 10th byte holding more than the single
//! remaining bit, is rejected instead of being wrapped.
//!
//! This encoding is compact but *not* order-preserving, so the collatable format never uses it
//! inside sortable payloads. It is used for the bookkeeping fields of packed
//! [`Document`][crate::Document] records.

/// Longest possible encoding of a `u64`.
pub const MAX_VARINT_LEN: usize = 10;

/// Number of bytes needed to encode `n`.
pub fn size_of(mut n: u64) -> usize {
    let mut size = 1;
    while n >= 0x80 {
        n >>= 7;
        size += 1;
    }
    size
}

/// Write `n` to the front of `buf`, returning the number of bytes written.
///
/// The caller must provide at least [`size_of(n)`][size_of] bytes. This panics if `buf` is
/// shorter than that.
pub fn put(buf: &mut [u8], mut n: u64) -> usize {
    let mut i = 0;
    while n >= 0x80 {
        buf[i] = (n as u8) | 0x80;
        n >>= 7;
        i += 1;
    }
    buf[i] = n as u8;
    i + 1
}

/// Append `n` to a byte vector.
pub fn write_vec(buf: &mut Vec<u8>, n: u64) {
    let mut tmp = [0u8; MAX_VARINT_LEN];
    let len = put(&mut tmp, n);
    buf.extend_from_slice(&tmp[..len]);
}

/// Decode a varint from the start of `bytes`, returning the value and how many bytes it used.
///
/// Fails if the data ends before a terminating byte shows up, or if the value would overflow 64
/// bits.
pub fn get(bytes: &[u8]) -> Option<(u64, usize)> {
    let mut n = 0u64;
    for (i, &b) in bytes.iter().take(MAX_VARINT_LEN).enumerate() {
        if i == MAX_VARINT_LEN - 1 && b > 1 {
            return None;
        }
        n |= ((b & 0x7F) as u64) << (7 * i);
        if b & 0x80 == 0 {
            return Some((n, i + 1));
        }
    }
    None
}

/// Decode a varint from the front of `input` and advance past it. On failure, `input` is left
/// untouched.
pub fn read_advancing(input: &mut &[u8]) -> Option<u64> {
    let (n, len) = get(*input)?;
    *input = &input[len..];
    Some(n)
}

/// Encode `n` into the front of `out` and advance past it. Returns false, leaving `out`
/// untouched, if there isn't room.
pub fn write_advancing(out: &mut &mut [u8], n: u64) -> bool {
    if out.len() < size_of(n) {
        return false;
    }
    let len = put(&mut **out, n);
    let rest = std::mem::take(out);
    *out = &mut rest[len..];
    true
}

#[cfg(test)]
mod test {
    use super::*;

    fn boundary_cases() -> Vec<u64> {
        let mut cases = vec![0, 1, u64::MAX - 1, u64::MAX];
        for s in 1..64 {
            let edge = 1u64 << s;
            cases.push(edge - 1);
            cases.push(edge);
            cases.push(edge + 1);
        }
        cases
    }

    #[test]
    fn sizes() {
        assert_eq!(size_of(0), 1);
        assert_eq!(size_of(127), 1);
        assert_eq!(size_of(128), 2);
        assert_eq!(size_of((1 << 14) - 1), 2);
        assert_eq!(size_of(1 << 14), 3);
        assert_eq!(size_of(1 << 63), 10);
        assert_eq!(size_of(u64::MAX), 10);
    }

    #[test]
    fn known_bytes() {
        let examples: Vec<(u64, Vec<u8>)> = vec![
            (0, vec![0x00]),
            (1, vec![0x01]),
            (127, vec![0x7f]),
            (128, vec![0x80, 0x01]),
            (300, vec![0xac, 0x02]),
            (16384, vec![0x80, 0x80, 0x01]),
            (
                u64::MAX,
                vec![0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0x01],
            ),
        ];
        for (n, expected) in examples {
            let mut enc = Vec::new();
            write_vec(&mut enc, n);
            assert_eq!(enc, expected, "Encoding of {} didn't match", n);
        }
    }

    #[test]
    fn roundtrip() {
        for case in boundary_cases() {
            let mut buf = [0u8; MAX_VARINT_LEN];
            let len = put(&mut buf, case);
            assert_eq!(len, size_of(case));
            assert_eq!(get(&buf[..len]), Some((case, len)), "Failed on {}", case);
        }
    }

    #[test]
    fn truncated() {
        let mut enc = Vec::new();
        write_vec(&mut enc, 1 << 40);
        for cut in 0..enc.len() {
            assert_eq!(get(&enc[..cut]), None, "Cut at {} should fail", cut);
            let mut input = &enc[..cut];
            assert_eq!(read_advancing(&mut input), None);
            assert_eq!(input.len(), cut, "Failed read shouldn't move the cursor");
        }
    }

    #[test]
    fn overflow() {
        let too_long = [0x80u8; 11];
        assert_eq!(get(&too_long), None);
        let mut ten = [0xffu8; 10];
        ten[9] = 0x01;
        assert_eq!(get(&ten), Some((u64::MAX, 10)));
        ten[9] = 0x02;
        assert_eq!(get(&ten), None, "10th byte above 1 overflows 64 bits");
    }

    #[test]
    fn read_advancing_moves_cursor() {
        let mut enc = Vec::new();
        write_vec(&mut enc, 300);
        write_vec(&mut enc, 5);
        let mut input = &enc[..];
        assert_eq!(read_advancing(&mut input), Some(300));
        assert_eq!(read_advancing(&mut input), Some(5));
        assert!(input.is_empty());
        assert_eq!(read_advancing(&mut input), None);
    }

    #[test]
    fn write_advancing_checks_room() {
        let mut storage = [0u8; 3];
        let mut out = &mut storage[..];
        assert!(write_advancing(&mut out, 300));
        assert_eq!(out.len(), 1);
        assert!(!write_advancing(&mut out, 300), "Only 1 byte left");
        assert_eq!(out.len(), 1, "Failed write shouldn't move the cursor");
        assert!(write_advancing(&mut out, 7));
        assert!(out.is_empty());
        assert_eq!(storage, [0xac, 0x02, 0x07]);
    }
}
