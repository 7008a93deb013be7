//! String literal escape sequences

use crate::error::{LiquidError, Span};

/// Replace JSON-style escape sequences in the body of a quoted string.
///
/// Both `\"` and `\'` are accepted whatever the surrounding quote. `\uXXXX`
/// escapes may form a UTF-16 surrogate pair.
pub fn unescape(raw: &str, span: Span) -> Result<String, LiquidError> {
    if !raw.contains('\\') {
        return Ok(raw.to_string());
    }

    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }

        match chars.next() {
            Some('"') => out.push('"'),
            Some('\'') => out.push('\''),
            Some('\\') => out.push('\\'),
            Some('/') => out.push('/'),
            Some('b') => out.push('\u{8}'),
            Some('f') => out.push('\u{c}'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some('u') => out.push(decode_code_point(&mut chars, span)?),
            Some(other) => {
                return Err(LiquidError::syntax(
                    format!("unknown escape sequence '\\{}'", other),
                    span,
                ))
            }
            None => return Err(LiquidError::syntax("incomplete escape sequence", span)),
        }
    }

    Ok(out)
}

fn decode_code_point(chars: &mut std::str::Chars<'_>, span: Span) -> Result<char, LiquidError> {
    let high = hex4(chars, span)?;

    if (0xDC00..=0xDFFF).contains(&high) {
        return Err(LiquidError::syntax("unexpected low surrogate code point", span));
    }

    let code_point = if (0xD800..=0xDBFF).contains(&high) {
        if chars.next() != Some('\\') || chars.next() != Some('u') {
            return Err(LiquidError::syntax("incomplete escape sequence", span));
        }
        let low = hex4(chars, span)?;
        if !(0xDC00..=0xDFFF).contains(&low) {
            return Err(LiquidError::syntax("unexpected code point", span));
        }
        0x10000 + (((high & 0x03FF) << 10) | (low & 0x03FF))
    } else {
        high
    };

    char::from_u32(code_point)
        .ok_or_else(|| LiquidError::syntax("invalid escape sequence", span))
}

fn hex4(chars: &mut std::str::Chars<'_>, span: Span) -> Result<u32, LiquidError> {
    let digits: String = chars.by_ref().take(4).collect();
    if digits.len() != 4 {
        return Err(LiquidError::syntax("incomplete escape sequence", span));
    }
    u32::from_str_radix(&digits, 16)
        .map_err(|_| LiquidError::syntax("invalid escape sequence", span))
}
