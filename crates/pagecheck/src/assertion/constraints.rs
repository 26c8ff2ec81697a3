//! Page constraints backing the session's `see_*` assertions.

use regex::{Regex, RegexBuilder};
use scraper::ElementRef;

use super::PageConstraint;
use crate::page::{collapse_whitespace, element_text, Page};
use crate::result::PageResult;
use crate::selector::parse_css;

/// Field tags whose value `HasValue` reads
const VALUE_FIELDS: &[&str] = &["input", "textarea"];
/// Controls carrying a selection
const SELECTABLE_FIELDS: &[&str] = &["select", "input[type='radio']"];
/// Checkbox inputs
const CHECKBOX_FIELDS: &[&str] = &["input[type='checkbox']"];

/// Escape text the way templates render it into HTML
#[must_use]
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            _ => out.push(c),
        }
    }
    out
}

/// Case-insensitive pattern matching `text` raw or HTML-escaped
fn source_pattern(text: &str) -> PageResult<Regex> {
    let raw = regex::escape(text);
    let escaped = regex::escape(&escape_html(text));
    let pattern = if raw == escaped {
        raw
    } else {
        format!("{raw}|{escaped}")
    };
    Ok(RegexBuilder::new(&pattern).case_insensitive(true).build()?)
}

fn text_pattern(text: &str) -> PageResult<Regex> {
    let pattern = regex::escape(&collapse_whitespace(text));
    Ok(RegexBuilder::new(&pattern).case_insensitive(true).build()?)
}

/// Page HTML contains the given source
#[derive(Debug, Clone)]
pub struct HasSource {
    source: String,
}

impl HasSource {
    /// Match `source` (raw or escaped) in the page HTML
    #[must_use]
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
        }
    }
}

impl PageConstraint for HasSource {
    fn matches(&self, page: &Page) -> PageResult<bool> {
        Ok(source_pattern(&self.source)?.is_match(&page.html()))
    }

    fn description(&self) -> String {
        format!("contains the HTML [{}]", self.source)
    }

    fn negated_description(&self) -> String {
        format!("does not contain the HTML [{}]", self.source)
    }
}

/// Page text contains the given text
#[derive(Debug, Clone)]
pub struct HasText {
    text: String,
}

impl HasText {
    /// Match `text` against whitespace-collapsed page text
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

impl PageConstraint for HasText {
    fn matches(&self, page: &Page) -> PageResult<bool> {
        Ok(text_pattern(&self.text)?.is_match(&page.text()))
    }

    fn description(&self) -> String {
        format!("contains the text [{}]", self.text)
    }

    fn negated_description(&self) -> String {
        format!("does not contain the text [{}]", self.text)
    }
}

/// Some element matching a selector contains the given source
#[derive(Debug, Clone)]
pub struct HasInElement {
    selector: String,
    source: String,
}

impl HasInElement {
    /// Match `source` inside any element selected by `selector`
    #[must_use]
    pub fn new(selector: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            source: source.into(),
        }
    }
}

impl PageConstraint for HasInElement {
    fn matches(&self, page: &Page) -> PageResult<bool> {
        let pattern = source_pattern(&self.source)?;
        Ok(page
            .select(&self.selector)?
            .iter()
            .any(|el| pattern.is_match(&el.inner_html())))
    }

    fn description(&self) -> String {
        format!("contains [{}] within [{}]", self.source, self.selector)
    }

    fn negated_description(&self) -> String {
        format!("does not contain [{}] within [{}]", self.source, self.selector)
    }
}

/// An element matching a selector exists, optionally with attributes
#[derive(Debug, Clone)]
pub struct HasElement {
    selector: String,
    attributes: Vec<(String, Option<String>)>,
}

impl HasElement {
    /// Any element matching `selector`
    #[must_use]
    pub fn new(selector: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            attributes: Vec::new(),
        }
    }

    /// Require an attribute with an exact value
    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((name.into(), Some(value.into())));
        self
    }

    /// Require an attribute to be present with any value
    #[must_use]
    pub fn with_attribute_present(mut self, name: impl Into<String>) -> Self {
        self.attributes.push((name.into(), None));
        self
    }

    fn has_attributes(&self, element: &ElementRef<'_>) -> bool {
        self.attributes.iter().all(|(name, expected)| {
            match (element.value().attr(name), expected) {
                (Some(actual), Some(expected)) => actual == expected.as_str(),
                (Some(_), None) => true,
                (None, _) => false,
            }
        })
    }

    fn describe_attributes(&self) -> String {
        if self.attributes.is_empty() {
            return String::new();
        }
        let attrs = self
            .attributes
            .iter()
            .map(|(name, value)| match value {
                Some(value) => format!("{name}=\"{value}\""),
                None => name.clone(),
            })
            .collect::<Vec<_>>()
            .join(", ");
        format!(" with the attributes [{attrs}]")
    }
}

impl PageConstraint for HasElement {
    fn matches(&self, page: &Page) -> PageResult<bool> {
        Ok(page
            .select(&self.selector)?
            .iter()
            .any(|el| self.has_attributes(el)))
    }

    fn description(&self) -> String {
        format!(
            "contains an element [{}]{}",
            self.selector,
            self.describe_attributes()
        )
    }

    fn negated_description(&self) -> String {
        format!(
            "does not contain an element [{}]{}",
            self.selector,
            self.describe_attributes()
        )
    }
}

/// An input or textarea holds the given value
#[derive(Debug, Clone)]
pub struct HasValue {
    field: String,
    value: String,
}

impl HasValue {
    /// Field addressed by name or id
    #[must_use]
    pub fn new(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }
}

/// Current value of an input or textarea
#[must_use]
pub fn field_value(element: &ElementRef<'_>) -> String {
    match element.value().name() {
        "textarea" => element.text().collect(),
        _ => element.value().attr("value").unwrap_or_default().to_string(),
    }
}

impl PageConstraint for HasValue {
    fn matches(&self, page: &Page) -> PageResult<bool> {
        let fields = page.resolve(&self.field, VALUE_FIELDS)?;
        Ok(fields.first().is_some_and(|f| field_value(f) == self.value))
    }

    fn description(&self) -> String {
        format!("has the field [{}] with the value [{}]", self.field, self.value)
    }

    fn negated_description(&self) -> String {
        format!(
            "does not have the field [{}] with the value [{}]",
            self.field, self.value
        )
    }
}

/// A select or radio group has the given value selected
#[derive(Debug, Clone)]
pub struct IsSelected {
    field: String,
    value: String,
}

impl IsSelected {
    /// Select or radio group addressed by name or id
    #[must_use]
    pub fn new(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }
}

/// Values currently selected in a select element or radio group
pub fn selected_values(page: &Page, field: &str) -> PageResult<Vec<String>> {
    let elements = page.resolve(field, SELECTABLE_FIELDS)?;
    let option_css = parse_css("option")?;

    let mut selected = Vec::new();
    for element in &elements {
        if element.value().name() == "select" {
            for option in element.select(&option_css) {
                if option.value().attr("selected").is_some() {
                    selected.push(
                        option
                            .value()
                            .attr("value")
                            .map_or_else(|| element_text(&option), str::to_string),
                    );
                }
            }
            // the first select wins; radios form a group
            break;
        }
        if element.value().attr("checked").is_some() {
            selected.push(element.value().attr("value").unwrap_or("on").to_string());
        }
    }
    Ok(selected)
}

impl PageConstraint for IsSelected {
    fn matches(&self, page: &Page) -> PageResult<bool> {
        Ok(selected_values(page, &self.field)?.contains(&self.value))
    }

    fn description(&self) -> String {
        format!("has the value [{}] selected in [{}]", self.value, self.field)
    }

    fn negated_description(&self) -> String {
        format!(
            "does not have the value [{}] selected in [{}]",
            self.value, self.field
        )
    }
}

/// A checkbox is ticked
#[derive(Debug, Clone)]
pub struct IsChecked {
    field: String,
}

impl IsChecked {
    /// Checkbox addressed by name or id
    #[must_use]
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
        }
    }
}

impl PageConstraint for IsChecked {
    fn matches(&self, page: &Page) -> PageResult<bool> {
        let boxes = page.resolve(&self.field, CHECKBOX_FIELDS)?;
        Ok(boxes
            .first()
            .is_some_and(|b| b.value().attr("checked").is_some()))
    }

    fn description(&self) -> String {
        format!("has the checkbox [{}] checked", self.field)
    }

    fn negated_description(&self) -> String {
        format!("does not have the checkbox [{}] checked", self.field)
    }
}

/// A link with the given text (and optionally URL) exists
#[derive(Debug, Clone)]
pub struct HasLink {
    text: String,
    url: Option<String>,
}

impl HasLink {
    /// Link whose text (or image alt) contains `text`
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            url: None,
        }
    }

    /// Also require the link to point at `url`
    #[must_use]
    pub fn to(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    fn describe(&self) -> String {
        match &self.url {
            Some(url) => format!("a link with the text [{}] and the URL [{url}]", self.text),
            None => format!("a link with the text [{}]", self.text),
        }
    }
}

/// Links in scope whose text or image alt contains `text`
pub fn links_with_text<'a>(page: &'a Page, text: &str) -> PageResult<Vec<ElementRef<'a>>> {
    let wanted = collapse_whitespace(text);
    let img_css = parse_css("img[alt]")?;
    Ok(page
        .select("a")?
        .into_iter()
        .filter(|link| {
            element_text(link).contains(&wanted)
                || link.select(&img_css).any(|img| {
                    img.value()
                        .attr("alt")
                        .is_some_and(|alt| collapse_whitespace(alt).contains(&wanted))
                })
        })
        .collect())
}

fn trim_url(url: &str) -> &str {
    url.strip_suffix('/').unwrap_or(url)
}

impl PageConstraint for HasLink {
    fn matches(&self, page: &Page) -> PageResult<bool> {
        let links = links_with_text(page, &self.text)?;
        let Some(url) = &self.url else {
            return Ok(!links.is_empty());
        };

        let expected = page.absolute_url(url)?;
        for link in links {
            let Some(href) = link.value().attr("href") else {
                continue;
            };
            let actual = page.absolute_url(href)?;
            if trim_url(actual.as_str()) == trim_url(expected.as_str()) {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn description(&self) -> String {
        format!("has {}", self.describe())
    }

    fn negated_description(&self) -> String {
        format!("does not have {}", self.describe())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::assertion::PageConstraintExt;
    use crate::result::PageError;
    use url::Url;

    const HTML: &str = r#"
        <html><body>
            <h1>Tom &amp; Jerry</h1>
            <p class="lead">Chasing   since 1940</p>
            <div id="sidebar"><span class="badge">New</span></div>
            <a href="/about/">About us</a>
            <a href="https://example.com/docs"><img src="d.png" alt="Documentation"></a>
            <form>
                <input type="text" name="user[email]" value="tom@example.com">
                <textarea id="bio">Cat</textarea>
                <input type="checkbox" id="terms" name="terms">
                <input type="checkbox" name="newsletter" checked>
                <select name="country">
                    <option value="us">US</option>
                    <option value="fr" selected>France</option>
                </select>
                <input type="radio" name="plan" value="free">
                <input type="radio" name="plan" value="pro" checked>
                <input type="submit" value="Save" disabled>
            </form>
        </body></html>
    "#;

    fn page() -> Page {
        Page::from_html(Url::parse("http://localhost/cartoons").unwrap(), HTML)
    }

    fn passes<C: PageConstraint>(constraint: &C) -> bool {
        constraint.evaluate(&page()).unwrap().passed
    }

    mod content_tests {
        use super::*;

        #[test]
        fn test_source_matches_escaped_text() {
            assert!(passes(&HasSource::new("Tom & Jerry")));
            assert!(passes(&HasSource::new("tom &amp; jerry")));
            assert!(!passes(&HasSource::new("Tom and Jerry")));
        }

        #[test]
        fn test_text_is_case_insensitive_and_collapsed() {
            assert!(passes(&HasText::new("chasing since 1940")));
            assert!(passes(&HasText::new("Tom & Jerry")));
            assert!(passes(&HasText::new("Nibbles").negate()));
        }

        #[test]
        fn test_in_element() {
            assert!(passes(&HasInElement::new("#sidebar", "New")));
            assert!(!passes(&HasInElement::new("#sidebar", "Chasing")));
        }

        #[test]
        fn test_element_with_attributes() {
            assert!(passes(&HasElement::new("input").with_attribute("name", "terms")));
            assert!(passes(
                &HasElement::new("input[type='submit']").with_attribute_present("disabled")
            ));
            assert!(!passes(&HasElement::new("input").with_attribute("name", "password")));
            assert!(passes(&HasElement::new("video").negate()));
        }

        #[test]
        fn test_element_description_lists_attributes() {
            let constraint = HasElement::new("img").with_attribute("alt", "Logo");
            assert_eq!(
                constraint.description(),
                "contains an element [img] with the attributes [alt=\"Logo\"]"
            );
        }
    }

    mod field_tests {
        use super::*;

        #[test]
        fn test_value_by_name_and_id() {
            assert!(passes(&HasValue::new("user[email]", "tom@example.com")));
            assert!(passes(&HasValue::new("#bio", "Cat")));
            assert!(!passes(&HasValue::new("bio", "Dog")));
        }

        #[test]
        fn test_value_missing_field_is_no_match() {
            let err = HasValue::new("password", "x").evaluate(&page()).unwrap_err();
            assert!(matches!(err, PageError::NoMatch { ref filter, .. } if filter == "password"));
        }

        #[test]
        fn test_selected_option_and_radio() {
            assert!(passes(&IsSelected::new("country", "fr")));
            assert!(!passes(&IsSelected::new("country", "us")));
            assert!(passes(&IsSelected::new("plan", "pro")));
            assert!(passes(&IsSelected::new("plan", "free").negate()));
        }

        #[test]
        fn test_checked() {
            assert!(passes(&IsChecked::new("newsletter")));
            assert!(passes(&IsChecked::new("#terms").negate()));
        }

        #[test]
        fn test_unchecked_failure_names_selector() {
            let result = IsChecked::new("#terms").evaluate(&page()).unwrap();
            assert!(!result.passed);
            assert!(result.message.contains("[#terms]"));
        }
    }

    mod link_tests {
        use super::*;

        #[test]
        fn test_link_by_text() {
            assert!(passes(&HasLink::new("About")));
            assert!(passes(&HasLink::new("Contact").negate()));
        }

        #[test]
        fn test_link_by_image_alt() {
            assert!(passes(&HasLink::new("Documentation")));
        }

        #[test]
        fn test_link_url_ignores_trailing_slash() {
            assert!(passes(&HasLink::new("About").to("/about")));
            assert!(passes(&HasLink::new("About").to("http://localhost/about/")));
            assert!(!passes(&HasLink::new("About").to("/team")));
        }

        #[test]
        fn test_escape_html() {
            assert_eq!(escape_html("<a href=\"x\">'&'</a>"), "&lt;a href=&quot;x&quot;&gt;&#039;&amp;&#039;&lt;/a&gt;");
        }
    }
}
