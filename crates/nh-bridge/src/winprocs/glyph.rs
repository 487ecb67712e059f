//! Inline glyph escapes.
//!
//! `putmixed` text may embed `\G` followed by eight hex digits: four of
//! context (ignored) and four naming the glyph id. Each escape is replaced
//! by the glyph's display character. A malformed escape is left as is.

const ESCAPE: &str = "\\G";
const HEX_DIGITS: usize = 8;

fn decode_one(hex: &str, glyph_chars: &[char]) -> Option<char> {
    if hex.len() != HEX_DIGITS || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    let glyph = usize::from_str_radix(&hex[4..], 16).ok()?;
    Some(glyph_chars.get(glyph).copied().unwrap_or('?'))
}

/// Replace every `\G` escape in `text`.
pub fn decode_glyph_escapes(text: &str, glyph_chars: &[char]) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(pos) = rest.find(ESCAPE) {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + ESCAPE.len()..];
        let decoded = after.get(..HEX_DIGITS).and_then(|hex| decode_one(hex, glyph_chars));
        match decoded {
            Some(ch) => {
                out.push(ch);
                rest = &after[HEX_DIGITS..];
            }
            None => {
                out.push_str(ESCAPE);
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> Vec<char> {
        let mut t = vec!['.'; 0x200];
        t[0x0155] = '@';
        t[0x0010] = 'd';
        t
    }

    #[test]
    fn test_escape_replaced() {
        let out = decode_glyph_escapes("\\GF0000155 Hero the Stripling", &table());
        assert_eq!(out, "@ Hero the Stripling");
        let out = decode_glyph_escapes("a \\G00000010 and \\G12340155", &table());
        assert_eq!(out, "a d and @");
    }

    #[test]
    fn test_malformed_left_literal() {
        assert_eq!(decode_glyph_escapes("\\G12", &table()), "\\G12");
        assert_eq!(decode_glyph_escapes("\\GZZZZ0155!", &table()), "\\GZZZZ0155!");
        assert_eq!(decode_glyph_escapes("no escapes", &table()), "no escapes");
    }

    #[test]
    fn test_unknown_glyph_is_question_mark() {
        assert_eq!(decode_glyph_escapes("\\G0000ffff", &table()), "?");
    }
}
