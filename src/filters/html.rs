//! HTML filters

use lazy_static::lazy_static;
use regex::Regex;

use crate::value::{html_escape, Value};

use super::{to_string, FilterArgs, FilterResult};

lazy_static! {
    static ref HTML_BLOCKS: Regex =
        Regex::new(r"(?is)<script.*?</script>|<style.*?</style>|<!--.*?-->").expect("valid html block pattern");
    static ref HTML_TAGS: Regex = Regex::new(r"(?s)<.*?>").expect("valid html tag pattern");
    static ref NEWLINES: Regex = Regex::new(r"\r?\n").expect("valid newline pattern");
}

/// Escape HTML special characters, unless the value is already safe
pub fn escape(left: &Value, args: &FilterArgs) -> FilterResult {
    args.expect_at_most(0)?;
    Ok(match left {
        Value::Markup(s) => Value::Markup(s.clone()),
        other => Value::Markup(html_escape(&to_string(other))),
    })
}

/// Escape HTML special characters without escaping existing entities
pub fn escape_once(left: &Value, args: &FilterArgs) -> FilterResult {
    args.expect_at_most(0)?;
    Ok(Value::Markup(html_escape(&unescape(&to_string(left)))))
}

pub fn newline_to_br(left: &Value, args: &FilterArgs) -> FilterResult {
    args.expect_at_most(0)?;
    let s = NEWLINES
        .replace_all(&to_string(left), "<br />\n")
        .into_owned();
    Ok(match left {
        Value::Markup(_) => Value::Markup(s),
        _ => Value::String(s),
    })
}

/// Remove HTML tags, comments and the contents of script and style elements
pub fn strip_html(left: &Value, args: &FilterArgs) -> FilterResult {
    args.expect_at_most(0)?;
    let s = to_string(left);
    let s = HTML_BLOCKS.replace_all(&s, "");
    Ok(Value::String(HTML_TAGS.replace_all(&s, "").into_owned()))
}

fn unescape(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&#34;", "\"")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}
