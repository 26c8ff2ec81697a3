//! Field selector resolution.
//!
//! Test authors address form fields by a logical name without knowing whether
//! the markup carries it as an `id` or a `name` attribute. [`resolve`] builds
//! one compound CSS selector that matches either.

use std::fmt;

use crate::result::{PageError, PageResult};

/// Tag filter matching any element
pub const ANY_TAG: &str = "*";

/// A comma-joined CSS selector list matching a field by `id` or `name`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompoundSelector {
    name: String,
    css: String,
}

impl CompoundSelector {
    /// The logical name this selector was built from (leading `#` removed)
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The CSS selector text
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.css
    }

    /// Parse into a `scraper` selector
    pub fn parse(&self) -> PageResult<scraper::Selector> {
        parse_css(&self.css)
    }
}

impl fmt::Display for CompoundSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.css)
    }
}

/// Build a selector matching `name` as an id or a name attribute on each tag.
///
/// `resolve("user[email]", &["input"])` yields
/// `input#user\[email\], input[name='user[email]']`.
#[must_use]
pub fn resolve(name: &str, tags: &[&str]) -> CompoundSelector {
    let name = name.strip_prefix('#').unwrap_or(name);
    let id = escape_id(name);
    let attr = escape_attr(name);

    let tags: &[&str] = if tags.is_empty() { &[ANY_TAG] } else { tags };
    let css = tags
        .iter()
        .map(|tag| format!("{tag}#{id}, {tag}[name='{attr}']"))
        .collect::<Vec<_>>()
        .join(", ");

    CompoundSelector {
        name: name.to_string(),
        css,
    }
}

/// Parse CSS text, mapping parser failures to [`PageError::InvalidSelector`]
pub fn parse_css(css: &str) -> PageResult<scraper::Selector> {
    scraper::Selector::parse(css).map_err(|e| PageError::InvalidSelector {
        selector: css.to_string(),
        message: e.to_string(),
    })
}

// CSS identifier escaping; a digit leading the name, or following a
// leading `-`, needs the hex form. A lone `-` is escaped too.
fn escape_id(name: &str) -> String {
    if name == "-" {
        return "\\-".to_string();
    }
    let dashed = name.starts_with('-');
    let mut out = String::with_capacity(name.len() + 4);
    for (i, c) in name.chars().enumerate() {
        let leads = i == 0 || (i == 1 && dashed);
        if leads && c.is_ascii_digit() {
            out.push_str(&format!("\\{:x} ", u32::from(c)));
        } else if c.is_ascii_alphanumeric() || c == '_' || c == '-' || !c.is_ascii() {
            out.push(c);
        } else {
            out.push('\\');
            out.push(c);
        }
    }
    out
}

fn escape_attr(name: &str) -> String {
    name.replace('\\', "\\\\").replace('\'', "\\'")
}
