//! URL filters

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

use crate::value::Value;

use super::{to_string, FilterArgs, FilterResult};

/// Characters left alone when encoding a query string component
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Percent encode, with spaces as `+`
pub fn url_encode(left: &Value, args: &FilterArgs) -> FilterResult {
    args.expect_at_most(0)?;
    let encoded = utf8_percent_encode(&to_string(left), COMPONENT)
        .to_string()
        .replace("%20", "+");
    Ok(Value::String(encoded))
}

pub fn url_decode(left: &Value, args: &FilterArgs) -> FilterResult {
    args.expect_at_most(0)?;
    let s = to_string(left).replace('+', " ");
    Ok(Value::String(percent_decode_str(&s).decode_utf8_lossy().into_owned()))
}
