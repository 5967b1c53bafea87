//! UTF-8 validation and code point reading
//!
//! Implements the syntax given in RFC 3629, which is the same as that
//! given in The Unicode Standard. It has the following properties:
//!
//! - All code points U+0000..U+10FFFF may be encoded, except for
//!   U+D800..U+DFFF, which are reserved for UTF-16 surrogate pairs.
//! - Byte sequences longer than 4 bytes are not permitted, as they
//!   exceed the range of Unicode.
//! - The sixty-six Unicode "non-characters" are permitted (namely,
//!   U+FDD0..U+FDEF, U+xxFFFE, and U+xxFFFF).
//!
//! String values enter the tree as Rust strings (always valid) or as
//! raw bytes validated here; the encoder re-validates during escaping
//! as defense in depth.

/// Classify the UTF-8 sequence starting at the first byte of `s`
///
/// Returns the sequence length (1 through 4) when the leading sequence
/// is well-formed, or 0 when it is invalid or clipped by the end of the
/// slice. Rejected forms: continuation-range leads (0x80..=0xC1),
/// overlong 3-byte sequences (lead 0xE0, second byte below 0xA0),
/// UTF-16 surrogates (lead 0xED, second byte above 0x9F), overlong
/// 4-byte sequences (lead 0xF0, second byte below 0x90), code points
/// beyond U+10FFFF (lead 0xF4, second byte above 0x8F), leads >= 0xF5,
/// and any continuation byte not matching `10xxxxxx`.
pub fn sequence_length(s: &[u8]) -> usize {
    let c = match s.first() {
        Some(&c) => c,
        None => return 0,
    };

    if c <= 0x7F {
        // 00..7F
        1
    } else if c <= 0xC1 {
        // 80..C1: continuation byte or overlong 2-byte sequence.
        0
    } else if c <= 0xDF {
        // C2..DF
        if s.len() < 2 || s[1] & 0xC0 != 0x80 {
            return 0;
        }
        2
    } else if c <= 0xEF {
        // E0..EF
        if s.len() < 3 {
            return 0;
        }
        // Disallow overlong 3-byte sequence.
        if c == 0xE0 && s[1] < 0xA0 {
            return 0;
        }
        // Disallow U+D800..U+DFFF.
        if c == 0xED && s[1] > 0x9F {
            return 0;
        }
        if s[1] & 0xC0 != 0x80 || s[2] & 0xC0 != 0x80 {
            return 0;
        }
        3
    } else if c <= 0xF4 {
        // F0..F4
        if s.len() < 4 {
            return 0;
        }
        // Disallow overlong 4-byte sequence.
        if c == 0xF0 && s[1] < 0x90 {
            return 0;
        }
        // Disallow code points beyond U+10FFFF.
        if c == 0xF4 && s[1] > 0x8F {
            return 0;
        }
        if s[1] & 0xC0 != 0x80 || s[2] & 0xC0 != 0x80 || s[3] & 0xC0 != 0x80 {
            return 0;
        }
        4
    } else {
        // F5..FF
        0
    }
}

/// Validate that a whole byte slice is well-formed UTF-8
///
/// Returns false on the first violation; the failing offset is not
/// reported.
pub fn validate(mut s: &[u8]) -> bool {
    while !s.is_empty() {
        let len = sequence_length(s);
        if len == 0 {
            return false;
        }
        s = &s[len..];
    }
    true
}

/// Decode one code point from the front of already-validated input
///
/// Returns the code point and the number of bytes consumed. Input must
/// have been checked with [`validate`] first; on invalid or clipped
/// input this function panics (the memory-unsafe reads of the reference
/// implementation become a bounds-check panic here).
pub fn read_char(s: &[u8]) -> (u32, usize) {
    let c0 = u32::from(s[0]);

    if c0 <= 0x7F {
        // 00..7F
        (c0, 1)
    } else if c0 <= 0xDF {
        // C2..DF (unless input is invalid)
        (((c0 & 0x1F) << 6) | (u32::from(s[1]) & 0x3F), 2)
    } else if c0 <= 0xEF {
        // E0..EF
        (
            ((c0 & 0x0F) << 12) | ((u32::from(s[1]) & 0x3F) << 6) | (u32::from(s[2]) & 0x3F),
            3,
        )
    } else {
        // F0..F4 (unless input is invalid)
        (
            ((c0 & 0x07) << 18)
                | ((u32::from(s[1]) & 0x3F) << 12)
                | ((u32::from(s[2]) & 0x3F) << 6)
                | (u32::from(s[3]) & 0x3F),
            4,
        )
    }
}
