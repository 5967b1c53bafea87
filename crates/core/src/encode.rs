//! JSON encoding of property trees
//!
//! Walks a [`PropertyNode`] tree and writes its JSON text form into a
//! [`StringBuffer`]. Scalars are formatted per the wire contract
//! (numbers with fixed 3-decimal precision, dates as local-time
//! strings), strings are escaped with a `\uXXXX` / surrogate-pair
//! fallback, and containers are emitted in their stored
//! (most-recently-added-first) child order.

use chrono::{Local, TimeZone};

use crate::buffer::StringBuffer;
use crate::error::{Error, Result};
use crate::node::{PropertyNode, PropertyValue};
use crate::utf8;

/// Headroom reserved before each escaped character: enough for two
/// `\uXXXX` escapes and two quotation marks.
const ESCAPE_HEADROOM: usize = 14;

/// Options controlling JSON text output
#[derive(Debug, Clone, Default)]
pub struct EncodeOptions {
    /// Escape every non-ASCII code point as `\uXXXX` instead of copying
    /// the raw UTF-8 bytes through. Off by default.
    pub escape_unicode: bool,
}

/// Encode a property tree as JSON text into `sb`
///
/// Containers are emitted in stored child order. String values are
/// re-validated as UTF-8 and rejected with [`Error::InvalidUtf8`] when
/// malformed; non-finite numbers and out-of-range dates are rejected as
/// [`Error::InvalidParameter`]. Dictionary keys are written raw (they
/// are validated upstream against a charset that needs no escaping).
pub fn encode(node: &PropertyNode, sb: &mut StringBuffer, options: &EncodeOptions) -> Result<()> {
    match node.value() {
        PropertyValue::Bool(v) => {
            sb.put(if *v { b"true" } else { b"false" });
        }
        PropertyValue::Number(v) => {
            if !v.is_finite() {
                return Err(Error::InvalidParameter(format!(
                    "number property is not finite: {}",
                    v
                )));
            }
            sb.put(format!("{:.3}", v).as_bytes());
        }
        PropertyValue::Int(v) => {
            sb.put(format!("{}", v).as_bytes());
        }
        PropertyValue::Date {
            seconds,
            microseconds,
        } => {
            let dt = Local
                .timestamp_opt(*seconds, 0)
                .single()
                .ok_or_else(|| {
                    Error::InvalidParameter(format!("date property out of range: {}", seconds))
                })?;
            // The sub-second field is printed verbatim as a 3-digit
            // group, matching the wire format's producers.
            sb.put(
                format!(
                    "\"{}.{:03}\"",
                    dt.format("%Y-%m-%d %H:%M:%S"),
                    microseconds
                )
                .as_bytes(),
            );
        }
        PropertyValue::String(bytes) => {
            encode_string(bytes, sb, options)?;
        }
        PropertyValue::List(items) => {
            sb.put_char(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    sb.put_char(b',');
                }
                encode(item, sb, options)?;
            }
            sb.put_char(b']');
        }
        PropertyValue::Dict(children) => {
            sb.put_char(b'{');
            for (i, child) in children.iter().enumerate() {
                if i > 0 {
                    sb.put_char(b',');
                }
                let key = child.key().ok_or_else(|| {
                    Error::InvalidParameter("dictionary child without a key".to_string())
                })?;
                sb.put_char(b'"');
                sb.put(key.as_bytes());
                sb.put_char(b'"');
                sb.put_char(b':');
                encode(child, sb, options)?;
            }
            sb.put_char(b'}');
        }
    }
    Ok(())
}

/// Encode a string value: upfront validation, then escaping
fn encode_string(bytes: &[u8], sb: &mut StringBuffer, options: &EncodeOptions) -> Result<()> {
    if !utf8::validate(bytes) {
        return Err(Error::InvalidUtf8);
    }
    escape_into(bytes, sb, options);
    Ok(())
}

/// Write a quoted, escaped JSON string literal
///
/// Assumes `bytes` has passed [`utf8::validate`]; any invalid sequence
/// encountered anyway is degraded to one U+FFFD per invalid byte rather
/// than failing (defense in depth behind the upfront validation).
///
/// Escaping rules: the standard short escapes for `"` `\` and the five
/// control characters; code points whose lead byte is strictly below
/// 0x1F (a preserved quirk - 0x1F itself passes through raw), and all
/// non-ASCII code points when `escape_unicode` is set, become `\uXXXX`
/// with code points above U+FFFF split into a UTF-16 surrogate pair;
/// everything else is copied through verbatim.
pub(crate) fn escape_into(bytes: &[u8], sb: &mut StringBuffer, options: &EncodeOptions) {
    sb.ensure(ESCAPE_HEADROOM);
    sb.put_char(b'"');

    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i];
        match c {
            b'"' => {
                sb.put(b"\\\"");
                i += 1;
            }
            b'\\' => {
                sb.put(b"\\\\");
                i += 1;
            }
            0x08 => {
                sb.put(b"\\b");
                i += 1;
            }
            0x0C => {
                sb.put(b"\\f");
                i += 1;
            }
            b'\n' => {
                sb.put(b"\\n");
                i += 1;
            }
            b'\r' => {
                sb.put(b"\\r");
                i += 1;
            }
            b'\t' => {
                sb.put(b"\\t");
                i += 1;
            }
            _ => {
                let len = utf8::sequence_length(&bytes[i..]);
                if len == 0 {
                    // Invalid sequence: substitute U+FFFD and advance a
                    // single byte.
                    if options.escape_unicode {
                        sb.put(b"\\uFFFD");
                    } else {
                        sb.put(&[0xEF, 0xBF, 0xBD]);
                    }
                    i += 1;
                } else if c < 0x1F || (c >= 0x80 && options.escape_unicode) {
                    let (codepoint, consumed) = utf8::read_char(&bytes[i..]);
                    i += consumed;
                    if codepoint <= 0xFFFF {
                        sb.put(b"\\u");
                        put_hex16(sb, codepoint as u16);
                    } else {
                        let (high, low) = to_surrogate_pair(codepoint);
                        sb.put(b"\\u");
                        put_hex16(sb, high);
                        sb.put(b"\\u");
                        put_hex16(sb, low);
                    }
                } else {
                    sb.put(&bytes[i..i + len]);
                    i += len;
                }
            }
        }
        sb.ensure(ESCAPE_HEADROOM);
    }

    sb.put_char(b'"');
}

/// Write exactly 4 uppercase hex digits
fn put_hex16(sb: &mut StringBuffer, value: u16) {
    const HEX: &[u8; 16] = b"0123456789ABCDEF";
    sb.put(&[
        HEX[(value >> 12) as usize & 0xF],
        HEX[(value >> 8) as usize & 0xF],
        HEX[(value >> 4) as usize & 0xF],
        HEX[value as usize & 0xF],
    ]);
}

/// Construct a UTF-16 surrogate pair for a code point in U+10000..=U+10FFFF
fn to_surrogate_pair(codepoint: u32) -> (u16, u16) {
    let n = codepoint - 0x10000;
    let high = (((n >> 10) & 0x3FF) | 0xD800) as u16;
    let low = ((n & 0x3FF) | 0xDC00) as u16;
    (high, low)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Properties;
    use proptest::prelude::*;

    fn encode_to_string(node: &PropertyNode, options: &EncodeOptions) -> String {
        let mut sb = StringBuffer::new();
        encode(node, &mut sb, options).unwrap();
        String::from_utf8(sb.finish()).unwrap()
    }

    fn default_options() -> EncodeOptions {
        EncodeOptions::default()
    }

    #[test]
    fn test_encode_bool() {
        let t = PropertyNode::new_bool(None, true);
        let f = PropertyNode::new_bool(None, false);
        assert_eq!(encode_to_string(&t, &default_options()), "true");
        assert_eq!(encode_to_string(&f, &default_options()), "false");
    }

    #[test]
    fn test_encode_number_fixed_three_decimals() {
        let n = PropertyNode::new_number(None, 5888.0);
        assert_eq!(encode_to_string(&n, &default_options()), "5888.000");
        let n = PropertyNode::new_number(None, 0.5);
        assert_eq!(encode_to_string(&n, &default_options()), "0.500");
        let n = PropertyNode::new_number(None, -1.23456);
        assert_eq!(encode_to_string(&n, &default_options()), "-1.235");
    }

    #[test]
    fn test_encode_number_rejects_non_finite() {
        let mut sb = StringBuffer::new();
        let n = PropertyNode::new_number(None, f64::NAN);
        assert!(encode(&n, &mut sb, &default_options()).is_err());
        let n = PropertyNode::new_number(None, f64::INFINITY);
        assert!(encode(&n, &mut sb, &default_options()).is_err());
    }

    #[test]
    fn test_encode_int_plain_decimal() {
        let n = PropertyNode::new_int(None, -42);
        assert_eq!(encode_to_string(&n, &default_options()), "-42");
        let n = PropertyNode::new_int(None, i64::MAX);
        assert_eq!(
            encode_to_string(&n, &default_options()),
            i64::MAX.to_string()
        );
    }

    #[test]
    fn test_encode_date_renders_subsecond_field_verbatim() {
        let n = PropertyNode::new_date(None, 0, 500);
        let out = encode_to_string(&n, &default_options());
        // Local-time rendering; only the shape and the sub-second group
        // are stable across zones.
        assert!(out.starts_with('"') && out.ends_with('"'));
        assert!(out.ends_with(".500\""), "got {}", out);
        assert_eq!(out.len(), "\"1970-01-01 00:00:00.500\"".len());
    }

    #[test]
    fn test_encode_string_plain() {
        let n = PropertyNode::new_string(None, "hello");
        assert_eq!(encode_to_string(&n, &default_options()), "\"hello\"");
    }

    #[test]
    fn test_encode_string_standard_escapes() {
        let n = PropertyNode::new_string(None, "a\"b\\c\u{8}\u{c}\n\r\t");
        assert_eq!(
            encode_to_string(&n, &default_options()),
            "\"a\\\"b\\\\c\\b\\f\\n\\r\\t\""
        );
    }

    #[test]
    fn test_encode_string_control_chars_become_u_escapes() {
        let n = PropertyNode::new_string(None, "\u{1}\u{1e}");
        assert_eq!(
            encode_to_string(&n, &default_options()),
            "\"\\u0001\\u001E\""
        );
    }

    #[test]
    fn test_encode_string_u001f_passes_through_raw() {
        // Preserved quirk: the escape threshold is strictly below 0x1F.
        let n = PropertyNode::new_string(None, "\u{1f}");
        assert_eq!(encode_to_string(&n, &default_options()), "\"\u{1f}\"");
    }

    #[test]
    fn test_encode_string_raw_unicode_by_default() {
        let n = PropertyNode::new_string(None, "caf\u{e9} \u{4e2d}\u{6587} \u{1f600}");
        assert_eq!(
            encode_to_string(&n, &default_options()),
            "\"caf\u{e9} \u{4e2d}\u{6587} \u{1f600}\""
        );
    }

    #[test]
    fn test_encode_string_escape_unicode_mode() {
        let options = EncodeOptions {
            escape_unicode: true,
        };
        let n = PropertyNode::new_string(None, "caf\u{e9}");
        assert_eq!(encode_to_string(&n, &options), "\"caf\\u00E9\"");
        let n = PropertyNode::new_string(None, "\u{4e2d}");
        assert_eq!(encode_to_string(&n, &options), "\"\\u4E2D\"");
    }

    #[test]
    fn test_encode_string_surrogate_pair_math() {
        let options = EncodeOptions {
            escape_unicode: true,
        };
        // U+1F600: high = D83D, low = DE00.
        let n = PropertyNode::new_string(None, "\u{1f600}");
        assert_eq!(encode_to_string(&n, &options), "\"\\uD83D\\uDE00\"");
        // U+10000: first pair, D800/DC00.
        let n = PropertyNode::new_string(None, "\u{10000}");
        assert_eq!(encode_to_string(&n, &options), "\"\\uD800\\uDC00\"");
        // U+10FFFF: last pair, DBFF/DFFF.
        let n = PropertyNode::new_string(None, "\u{10ffff}");
        assert_eq!(encode_to_string(&n, &options), "\"\\uDBFF\\uDFFF\"");
    }

    #[test]
    fn test_encode_rejects_invalid_utf8_string() {
        // Bypass the validating constructors to exercise the encoder's
        // own check.
        let node = PropertyNode {
            key: None,
            value: PropertyValue::String(vec![b'a', 0xED, 0xA0, 0x80]),
        };
        let mut sb = StringBuffer::new();
        let err = encode(&node, &mut sb, &default_options()).unwrap_err();
        assert!(matches!(err, Error::InvalidUtf8));
    }

    #[test]
    fn test_escape_into_substitutes_one_replacement_per_invalid_byte() {
        // The defensive path behind the upfront validation: feed invalid
        // bytes straight to the escaper.
        let mut sb = StringBuffer::new();
        escape_into(&[b'x', 0xFF, 0xFE, b'y'], &mut sb, &default_options());
        assert_eq!(sb.as_bytes(), "\"x\u{fffd}\u{fffd}y\"".as_bytes());

        let mut sb = StringBuffer::new();
        let options = EncodeOptions {
            escape_unicode: true,
        };
        escape_into(&[0xFF], &mut sb, &options);
        assert_eq!(sb.as_bytes(), b"\"\\uFFFD\"");
    }

    #[test]
    fn test_escape_into_clipped_sequence_degrades_per_byte() {
        // A clipped 3-byte lead: every remaining byte degrades on its own.
        let mut sb = StringBuffer::new();
        escape_into(&[0xE4, 0xB8], &mut sb, &default_options());
        assert_eq!(sb.as_bytes(), "\"\u{fffd}\u{fffd}\"".as_bytes());
    }

    #[test]
    fn test_encode_list_stored_order() {
        let mut props = Properties::new();
        props.append_list("tags", "a").unwrap();
        props.append_list("tags", "b").unwrap();
        let dict = props.into_node(None);
        assert_eq!(
            encode_to_string(&dict, &default_options()),
            "{\"tags\":[\"b\",\"a\"]}"
        );
    }

    #[test]
    fn test_encode_dict_lifo_order() {
        let mut props = Properties::new();
        props.add_int("first", 1).unwrap();
        props.add_bool("second", true).unwrap();
        props.add_string("third", "v").unwrap();
        let dict = props.into_node(None);
        assert_eq!(
            encode_to_string(&dict, &default_options()),
            "{\"third\":\"v\",\"second\":true,\"first\":1}"
        );
    }

    #[test]
    fn test_encode_nested_containers() {
        let mut inner = Properties::new();
        inner.add_number("price", 5888.0).unwrap();
        let mut outer = Properties::new();
        outer.insert(inner.into_node(Some("properties"))).unwrap();
        let root = outer.into_node(None);
        assert_eq!(
            encode_to_string(&root, &default_options()),
            "{\"properties\":{\"price\":5888.000}}"
        );
    }

    #[test]
    fn test_encoded_output_parses_as_json() {
        let mut props = Properties::new();
        props.add_string("name", "caf\u{e9} \"quoted\"\n").unwrap();
        props.add_number("price", 12.5).unwrap();
        props.add_bool("ok", true).unwrap();
        props.append_list("tags", "x").unwrap();
        let out = encode_to_string(&props.into_node(None), &default_options());

        let parsed: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(parsed["name"], "caf\u{e9} \"quoted\"\n");
        assert_eq!(parsed["price"], 12.5);
        assert_eq!(parsed["ok"], true);
        assert_eq!(parsed["tags"][0], "x");
    }

    proptest! {
        // Round trip: encode, then parse the quoted literal with an
        // independent JSON parser. U+001F is excluded because of the
        // preserved strictly-below-0x1F escape threshold.
        #[test]
        fn prop_string_round_trips_through_escaping(
            s in any::<String>().prop_filter("U+001F passes through raw", |s| !s.contains('\u{1f}'))
        ) {
            let node = PropertyNode::new_string(None, &s);
            let mut sb = StringBuffer::new();
            encode(&node, &mut sb, &EncodeOptions::default()).unwrap();
            let parsed: serde_json::Value = serde_json::from_slice(sb.as_bytes()).unwrap();
            prop_assert_eq!(parsed.as_str(), Some(s.as_str()));
        }

        #[test]
        fn prop_string_round_trips_in_escape_unicode_mode(s in any::<String>().prop_filter("U+001F passes through raw", |s| !s.contains('\u{1f}'))) {
            let options = EncodeOptions { escape_unicode: true };
            let node = PropertyNode::new_string(None, &s);
            let mut sb = StringBuffer::new();
            encode(&node, &mut sb, &options).unwrap();
            // Escape-unicode output is pure ASCII.
            prop_assert!(sb.as_bytes().iter().all(u8::is_ascii));
            let parsed: serde_json::Value = serde_json::from_slice(sb.as_bytes()).unwrap();
            prop_assert_eq!(parsed.as_str(), Some(s.as_str()));
        }
    }
}
