//! Page state: the DOM snapshot of the last settled navigation.
//!
//! A [`Page`] is replaced wholesale on every navigation. Assertions can be
//! narrowed to a sub-tree by pushing selectors onto its [`ScopeStack`]; every
//! query then runs against the elements the innermost scope selected.

use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::client::Response;
use crate::result::{PageError, PageResult};
use crate::selector::{self, parse_css};

/// Stack of narrowing selectors, innermost last
#[derive(Debug, Clone, Default)]
pub struct ScopeStack {
    entries: Vec<(String, Selector)>,
}

impl ScopeStack {
    /// Number of active scopes
    #[must_use]
    pub fn depth(&self) -> usize {
        self.entries.len()
    }

    /// Whether no scope is active
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Selector texts from outermost to innermost
    #[must_use]
    pub fn selectors(&self) -> Vec<&str> {
        self.entries.iter().map(|(css, _)| css.as_str()).collect()
    }

    pub(crate) fn push(&mut self, css: String, selector: Selector) {
        self.entries.push((css, selector));
    }

    pub(crate) fn truncate(&mut self, depth: usize) {
        self.entries.truncate(depth);
    }
}

/// The current page
#[derive(Debug, Clone)]
pub struct Page {
    id: u64,
    uri: Url,
    status: u16,
    headers: Vec<(String, String)>,
    body: String,
    document: Html,
    scopes: ScopeStack,
}

impl Page {
    /// Build page state from a settled response
    #[must_use]
    pub fn from_response(id: u64, uri: Url, response: Response) -> Self {
        let document = Html::parse_document(&response.body);
        Self {
            id,
            uri,
            status: response.status,
            headers: response.headers,
            body: response.body,
            document,
            scopes: ScopeStack::default(),
        }
    }

    /// Parse raw HTML as if it had been served from `uri`
    #[must_use]
    pub fn from_html(uri: Url, html: &str) -> Self {
        Self::from_response(0, uri, Response::html(html))
    }

    /// Navigation sequence number that produced this page
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// URI the page was fetched from (after redirects)
    #[must_use]
    pub fn uri(&self) -> &Url {
        &self.uri
    }

    /// Final status code
    #[must_use]
    pub const fn status(&self) -> u16 {
        self.status
    }

    /// Response headers
    #[must_use]
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Raw response body
    #[must_use]
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Parsed document
    #[must_use]
    pub fn document(&self) -> &Html {
        &self.document
    }

    /// Active narrowing scopes
    #[must_use]
    pub fn scopes(&self) -> &ScopeStack {
        &self.scopes
    }

    /// Narrow subsequent queries to elements matching `css` in the current
    /// scope. Returns the new scope depth.
    pub fn push_scope(&mut self, css: &str) -> PageResult<usize> {
        let selector = parse_css(css)?;
        if self.select_with(&selector).is_empty() {
            return Err(PageError::no_match(css, self.uri.as_str()));
        }
        self.scopes.push(css.to_string(), selector);
        Ok(self.scopes.depth())
    }

    /// Drop scopes above `depth`
    pub fn restore_scope(&mut self, depth: usize) {
        self.scopes.truncate(depth);
    }

    /// Elements the current scope covers; the document root when unscoped
    #[must_use]
    pub fn roots(&self) -> Vec<ElementRef<'_>> {
        let mut roots = vec![self.document.root_element()];
        for (_, selector) in &self.scopes.entries {
            roots = descendants_or_self_matching(&roots, selector);
        }
        roots
    }

    /// Elements in scope matching a parsed selector, scope roots included
    #[must_use]
    pub fn select_with(&self, selector: &Selector) -> Vec<ElementRef<'_>> {
        descendants_or_self_matching(&self.roots(), selector)
    }

    /// Elements in scope matching CSS text
    pub fn select(&self, css: &str) -> PageResult<Vec<ElementRef<'_>>> {
        Ok(self.select_with(&parse_css(css)?))
    }

    /// Elements in scope whose `id` or `name` is `name`, restricted to `tags`.
    ///
    /// Fails with [`PageError::NoMatch`] carrying the raw name when nothing
    /// matches.
    pub fn resolve(&self, name: &str, tags: &[&str]) -> PageResult<Vec<ElementRef<'_>>> {
        let compound = selector::resolve(name, tags);
        let found = self.select_with(&compound.parse()?);
        if found.is_empty() {
            return Err(PageError::no_match(name, self.uri.as_str()));
        }
        Ok(found)
    }

    /// Serialized HTML of the current scope
    #[must_use]
    pub fn html(&self) -> String {
        if self.scopes.is_empty() {
            return self.document.root_element().html();
        }
        self.roots().iter().map(|el| el.html()).collect()
    }

    /// Whitespace-collapsed text of the current scope
    #[must_use]
    pub fn text(&self) -> String {
        let joined = self
            .roots()
            .iter()
            .map(|el| element_text(el))
            .collect::<Vec<_>>()
            .join(" ");
        collapse_whitespace(&joined)
    }

    /// Resolve a possibly relative link against this page's URI
    pub fn absolute_url(&self, href: &str) -> PageResult<Url> {
        self.uri.join(href).map_err(|e| PageError::InvalidUrl {
            url: href.to_string(),
            message: e.to_string(),
        })
    }
}

/// Whitespace-collapsed text content of one element
#[must_use]
pub fn element_text(element: &ElementRef<'_>) -> String {
    collapse_whitespace(&element.text().collect::<String>())
}

/// Collapse runs of whitespace to one space and trim
#[must_use]
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

// Each root is tested itself before its descendants.
fn descendants_or_self_matching<'a>(
    roots: &[ElementRef<'a>],
    selector: &Selector,
) -> Vec<ElementRef<'a>> {
    let mut found: Vec<ElementRef<'a>> = Vec::new();
    for root in roots {
        if selector.matches(root) && !found.contains(root) {
            found.push(*root);
        }
        for element in root.select(selector) {
            if !found.contains(&element) {
                found.push(element);
            }
        }
    }
    found
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const HTML: &str = r#"
        <html><body>
            <h1>Dashboard</h1>
            <div class="card" id="profile">
                <p>Signed in as   <strong>Taylor</strong></p>
                <input name="email" value="taylor@example.com">
            </div>
            <div class="card" id="billing">
                <p>Plan: Pro</p>
            </div>
        </body></html>
    "#;

    fn page() -> Page {
        Page::from_html(Url::parse("http://localhost/home").unwrap(), HTML)
    }

    mod query_tests {
        use super::*;

        #[test]
        fn test_select_counts_elements() {
            assert_eq!(page().select(".card").unwrap().len(), 2);
        }

        #[test]
        fn test_resolve_by_name() {
            let page = page();
            let found = page.resolve("email", &["input"]).unwrap();
            assert_eq!(found[0].value().attr("value"), Some("taylor@example.com"));
        }

        #[test]
        fn test_resolve_no_match_names_filter() {
            let err = page().resolve("password", &["input"]).unwrap_err();
            assert!(matches!(err, PageError::NoMatch { ref filter, .. } if filter == "password"));
        }

        #[test]
        fn test_text_collapses_whitespace() {
            assert!(page().text().contains("Signed in as Taylor"));
        }

        #[test]
        fn test_absolute_url() {
            let url = page().absolute_url("../about?x=1").unwrap();
            assert_eq!(url.as_str(), "http://localhost/about?x=1");
        }
    }

    mod scope_tests {
        use super::*;

        #[test]
        fn test_push_scope_narrows_text() {
            let mut page = page();
            page.push_scope("#billing").unwrap();
            let text = page.text();
            assert!(text.contains("Plan: Pro"));
            assert!(!text.contains("Taylor"));
        }

        #[test]
        fn test_nested_scopes_compose() {
            let mut page = page();
            page.push_scope(".card").unwrap();
            page.push_scope("strong").unwrap();
            assert_eq!(page.text(), "Taylor");
            assert_eq!(page.scopes().selectors(), vec![".card", "strong"]);
        }

        #[test]
        fn test_restore_scope() {
            let mut page = page();
            let depth = page.scopes().depth();
            page.push_scope("#profile").unwrap();
            page.restore_scope(depth);
            assert!(page.scopes().is_empty());
            assert!(page.text().contains("Dashboard"));
        }

        #[test]
        fn test_empty_scope_is_rejected() {
            let mut page = page();
            let err = page.push_scope("#missing").unwrap_err();
            assert!(matches!(err, PageError::NoMatch { .. }));
            assert!(page.scopes().is_empty());
        }

        #[test]
        fn test_scope_root_matches_its_own_query() {
            let mut page = page();
            page.push_scope("#profile").unwrap();
            let cards = page.select(".card").unwrap();
            assert_eq!(cards.len(), 1);
            assert_eq!(cards[0].value().attr("id"), Some("profile"));
        }

        #[test]
        fn test_repeated_scope_keeps_same_elements() {
            let mut page = page();
            page.push_scope(".card").unwrap();
            page.push_scope(".card").unwrap();
            assert_eq!(page.roots().len(), 2);
        }

        #[test]
        fn test_resolve_respects_scope() {
            let mut page = page();
            page.push_scope("#billing").unwrap();
            assert!(page.resolve("email", &["input"]).is_err());
        }
    }
}
