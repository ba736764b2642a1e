//! Property suite for the escaping semantics shared by both backends.
//! The closure backend calls these functions directly; the emitted
//! JavaScript carries helper copies of them, so this is the single place
//! the behavior is pinned down.

use proptest::prelude::*;

use stencil_lang::escape::{encode_id, encode_uri, escape_html};

/// Inverse of the percent encoders, for round-trip checks.
fn percent_decode(text: &str) -> Vec<u8> {
    let bytes = text.as_bytes();
    let mut out = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).unwrap();
            out.push(u8::from_str_radix(hex, 16).unwrap());
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    out
}

proptest! {
    #[test]
    fn html_escaped_output_has_no_specials(s in ".*") {
        let out = escape_html(&s);
        prop_assert!(!out.contains('<'));
        prop_assert!(!out.contains('>'));
        prop_assert!(!out.contains('"'));
        prop_assert!(!out.contains('\''));
    }

    #[test]
    fn html_escape_never_rescans(s in ".*") {
        // every '&' in the output begins exactly one entity
        let out = escape_html(&s);
        for (pos, _) in out.match_indices('&') {
            let tail = &out[pos..];
            prop_assert!(
                ["&amp;", "&lt;", "&gt;", "&quot;", "&#039;"]
                    .iter()
                    .any(|entity| tail.starts_with(entity)),
                "stray ampersand in {:?}",
                out
            );
        }
    }

    #[test]
    fn percent_encoding_round_trips(s in ".*") {
        prop_assert_eq!(percent_decode(&encode_uri(&s)), s.as_bytes().to_vec());
        prop_assert_eq!(percent_decode(&encode_id(&s)), s.as_bytes().to_vec());
    }

    #[test]
    fn percent_encoded_output_is_ascii(s in ".*") {
        prop_assert!(encode_uri(&s).is_ascii());
        prop_assert!(encode_id(&s).is_ascii());
    }

    #[test]
    fn uppercase_hex_only(s in ".*") {
        for out in [encode_uri(&s), encode_id(&s)] {
            for (pos, _) in out.match_indices('%') {
                let hex = &out[pos + 1..pos + 3];
                prop_assert!(hex.chars().all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()));
            }
        }
    }

    #[test]
    fn narrow_set_escapes_at_least_as_much(s in ".*") {
        prop_assert!(encode_id(&s).len() >= encode_uri(&s).len());
    }
}
