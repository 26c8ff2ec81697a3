//! The page-interaction session.
//!
//! A [`PageSession`] owns the navigator, the current page, pending form
//! input and the assertion reporter. Everything a test does to "the current
//! page" goes through it:
//!
//! ```ignore
//! let mut session = PageSession::new(client, SessionConfig::default())?;
//! session
//!     .visit("/register")?
//!     .type_text("email", "taylor@example.com")?
//!     .check("terms")?
//!     .press("Register")?
//!     .see_page_is("/dashboard")?
//!     .see_text("Welcome, Taylor")?;
//! ```

use std::ops::{Deref, DerefMut};
use std::path::Path;

use tracing::debug;
use url::Url;

use crate::assertion::constraints::{
    links_with_text, HasElement, HasInElement, HasLink, HasSource, HasText, HasValue, IsChecked,
    IsSelected,
};
use crate::assertion::soft::{Reporter, SoftAssertions};
use crate::assertion::{AssertionResult, PageConstraint, PageConstraintExt};
use crate::client::{Method, Response, TestClient};
use crate::config::SessionConfig;
use crate::form::Form;
use crate::input::{normalize_name, InputStore, InputValue, UploadMap};
use crate::navigator::Navigator;
use crate::page::Page;
use crate::result::{PageError, PageResult};
use crate::selector::ANY_TAG;
use crate::upload::{self, Uploads};

/// Drives one test case against the application under test
#[derive(Debug)]
pub struct PageSession<C> {
    navigator: Navigator<C>,
    page: Option<Page>,
    inputs: InputStore,
    reporter: Box<dyn Reporter>,
    response: Option<(Url, Response)>,
}

impl<C: TestClient> PageSession<C> {
    /// Create a session reporting through [`SoftAssertions`] in the
    /// configured mode
    pub fn new(client: C, config: SessionConfig) -> PageResult<Self> {
        let reporter = SoftAssertions::with_mode(config.assertion_mode);
        Ok(Self {
            navigator: Navigator::new(client, config)?,
            page: None,
            inputs: InputStore::new(),
            reporter: Box::new(reporter),
            response: None,
        })
    }

    /// Replace the assertion reporter
    #[must_use]
    pub fn with_reporter(mut self, reporter: Box<dyn Reporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Request/redirect machinery
    #[must_use]
    pub fn navigator(&self) -> &Navigator<C> {
        &self.navigator
    }

    /// Underlying client
    #[must_use]
    pub fn client(&self) -> &C {
        self.navigator.client()
    }

    /// Pending form input
    #[must_use]
    pub fn inputs(&self) -> &InputStore {
        &self.inputs
    }

    /// Drop pending form input
    pub fn clear_inputs(&mut self) -> &mut Self {
        self.inputs.clear();
        self
    }

    /// Current page
    pub fn page(&self) -> PageResult<&Page> {
        self.page.as_ref().ok_or(PageError::NoPage)
    }

    /// URI of the current page
    pub fn current_uri(&self) -> PageResult<&Url> {
        Ok(self.page()?.uri())
    }

    /// Last raw response from [`call`](Self::call), if not yet settled
    #[must_use]
    pub fn response(&self) -> Option<&Response> {
        self.response.as_ref().map(|(_, response)| response)
    }

    // ------------------------------------------------------------------
    // Navigation
    // ------------------------------------------------------------------

    /// GET `uri` and settle on the resulting page
    pub fn visit(&mut self, uri: &str) -> PageResult<&mut Self> {
        self.navigate(Method::Get, uri, Vec::new(), &[], Uploads::new())
    }

    /// Issue a request, follow redirects and replace the current page.
    ///
    /// Pending input is cleared whether or not the navigation succeeds.
    pub fn navigate(
        &mut self,
        method: Method,
        uri: &str,
        params: Vec<(String, String)>,
        cookies: &[(String, String)],
        files: Uploads,
    ) -> PageResult<&mut Self> {
        let outcome = self.navigator.navigate(method, uri, params, cookies, files);
        self.inputs.clear();
        self.response = None;
        self.page = Some(outcome?);
        Ok(self)
    }

    /// Send a single request without following redirects or checking status
    pub fn call(
        &mut self,
        method: Method,
        uri: &str,
        params: Vec<(String, String)>,
    ) -> PageResult<&Response> {
        let url = self.navigator.prepare_url(uri)?;
        let response = self.navigator.call(method, url.as_str(), params)?;
        let (_, response) = self.response.insert((url, response));
        Ok(response)
    }

    /// Settle the response of the last [`call`](Self::call) into a page
    pub fn follow_redirects(&mut self) -> PageResult<&mut Self> {
        let (url, response) = self.response.take().ok_or(PageError::NoPage)?;
        let outcome = self.navigator.settle(url, response);
        self.inputs.clear();
        self.page = Some(outcome?);
        Ok(self)
    }

    // ------------------------------------------------------------------
    // Interaction
    // ------------------------------------------------------------------

    /// Type text into a field
    pub fn type_text(&mut self, element: &str, text: &str) -> PageResult<&mut Self> {
        self.store_input(element, InputValue::from(text))
    }

    /// Tick a checkbox
    pub fn check(&mut self, element: &str) -> PageResult<&mut Self> {
        self.store_input(element, InputValue::Flag(true))
    }

    /// Untick a checkbox
    pub fn uncheck(&mut self, element: &str) -> PageResult<&mut Self> {
        self.store_input(element, InputValue::Flag(false))
    }

    /// Choose an option of a select or radio group
    pub fn select(&mut self, element: &str, option: &str) -> PageResult<&mut Self> {
        self.store_input(element, InputValue::from(option))
    }

    /// Attach a file to a file input
    pub fn attach(&mut self, element: &str, path: impl AsRef<Path>) -> PageResult<&mut Self> {
        self.page()?.resolve(element, &[ANY_TAG])?;
        self.inputs.attach(element, path.as_ref());
        Ok(self)
    }

    fn store_input(&mut self, element: &str, value: InputValue) -> PageResult<&mut Self> {
        self.page()?.resolve(element, &[ANY_TAG])?;
        self.inputs.set(element, value);
        Ok(self)
    }

    /// Follow a link by text, image alt, id or name
    pub fn click(&mut self, name: &str) -> PageResult<&mut Self> {
        let target = {
            let page = self.page()?;
            let mut links = links_with_text(page, name)?;
            if links.is_empty() {
                links = page.resolve(name, &["a"]).unwrap_or_default();
            }
            links
                .iter()
                .find_map(|link| link.value().attr("href"))
                .map(|href| page.absolute_url(href))
                .transpose()?
        };
        let target = target.ok_or_else(|| PageError::LinkNotFound {
            name: name.to_string(),
        })?;

        debug!(link = name, href = %target, "clicking link");
        self.visit(target.as_str())
    }

    /// Submit pending input through the form owning the button `label`
    pub fn press(&mut self, label: &str) -> PageResult<&mut Self> {
        self.submit_form(Some(label), &[], &[])
    }

    /// Submit with extra text fields and files applied over the pending
    /// input. Without a label the first form in scope is submitted.
    pub fn submit_form(
        &mut self,
        label: Option<&str>,
        fields: &[(&str, &str)],
        uploads: &[(&str, &Path)],
    ) -> PageResult<&mut Self> {
        let mut form = self.fill_form(label)?;
        for (name, value) in fields {
            form.set(name, &InputValue::from(*value))?;
        }

        let mut attached = UploadMap::new();
        for (name, path) in uploads {
            let key = normalize_name(name);
            form.set(&key, &InputValue::from(path.to_string_lossy().into_owned()))?;
            attached.insert(key, path.to_path_buf());
        }
        self.submit_with(&form, &attached)
    }

    /// The form owning button `label` (or the first form in scope) with
    /// pending input applied
    pub fn fill_form(&self, label: Option<&str>) -> PageResult<Form> {
        let mut form = Form::locate(self.page()?, label)?;
        form.set_values(self.inputs.inputs())?;
        Ok(form)
    }

    /// Send a prepared form, attaching any uploaded files
    pub fn submit(&mut self, form: &Form) -> PageResult<&mut Self> {
        self.submit_with(form, &UploadMap::new())
    }

    fn submit_with(&mut self, form: &Form, extra: &UploadMap) -> PageResult<&mut Self> {
        let attached: UploadMap = self
            .inputs
            .uploads()
            .iter()
            .chain(extra)
            .filter_map(|(key, path)| form.field_name(key).map(|name| (name.to_string(), path.clone())))
            .collect();
        let files = upload::normalize(&form.files(), &attached);

        debug!(
            method = %form.method(),
            action = %form.action(),
            files = files.len(),
            "submitting form"
        );
        let uri = form.uri();
        self.navigate(form.method(), uri.as_str(), form.body_params(), &[], files)
    }

    // ------------------------------------------------------------------
    // Scoping
    // ------------------------------------------------------------------

    /// Narrow queries to elements matching `selector` until the guard drops
    pub fn within(&mut self, selector: &str) -> PageResult<ScopeGuard<'_, C>> {
        let page = self.page.as_mut().ok_or(PageError::NoPage)?;
        let depth = page.scopes().depth();
        page.push_scope(selector)?;
        let page_id = page.id();
        Ok(ScopeGuard {
            session: self,
            page_id,
            depth,
        })
    }

    /// Run `body` with queries narrowed to `selector`
    pub fn within_scope<R>(
        &mut self,
        selector: &str,
        body: impl FnOnce(&mut Self) -> PageResult<R>,
    ) -> PageResult<R> {
        let mut guard = self.within(selector)?;
        body(&mut *guard)
    }

    // ------------------------------------------------------------------
    // Assertions
    // ------------------------------------------------------------------

    /// Evaluate a constraint against the current page and report it
    pub fn assert_page<P: PageConstraint>(
        &mut self,
        constraint: P,
        message: Option<&str>,
    ) -> PageResult<&mut Self> {
        let result = constraint.evaluate(self.page()?)?.with_context(message);
        self.report(&result)
    }

    fn report(&mut self, result: &AssertionResult) -> PageResult<&mut Self> {
        self.reporter.report(result)?;
        Ok(self)
    }

    /// Page text contains `text`
    pub fn see(&mut self, text: &str) -> PageResult<&mut Self> {
        self.assert_page(HasText::new(text), None)
    }

    /// Page text does not contain `text`
    pub fn dont_see(&mut self, text: &str) -> PageResult<&mut Self> {
        self.assert_page(HasText::new(text).negate(), None)
    }

    /// HTML source contains `source`, raw or escaped
    pub fn see_source(&mut self, source: &str) -> PageResult<&mut Self> {
        self.assert_page(HasSource::new(source), None)
    }

    /// HTML source contains `source` neither raw nor escaped
    pub fn dont_see_source(&mut self, source: &str) -> PageResult<&mut Self> {
        self.assert_page(HasSource::new(source).negate(), None)
    }

    /// Visible text contains `text`
    pub fn see_text(&mut self, text: &str) -> PageResult<&mut Self> {
        self.assert_page(HasText::new(text), None)
    }

    /// Visible text does not contain `text`
    pub fn dont_see_text(&mut self, text: &str) -> PageResult<&mut Self> {
        self.assert_page(HasText::new(text).negate(), None)
    }

    /// An element matching `selector` contains `text`
    pub fn see_in_element(&mut self, selector: &str, text: &str) -> PageResult<&mut Self> {
        self.assert_page(HasInElement::new(selector, text), None)
    }

    /// No element matching `selector` contains `text`
    pub fn dont_see_in_element(&mut self, selector: &str, text: &str) -> PageResult<&mut Self> {
        self.assert_page(HasInElement::new(selector, text).negate(), None)
    }

    /// An element matches `selector` and carries `attributes`
    pub fn see_element(&mut self, selector: &str, attributes: &[(&str, &str)]) -> PageResult<&mut Self> {
        self.assert_page(element_constraint(selector, attributes), None)
    }

    /// No element matches `selector` with `attributes`
    pub fn dont_see_element(
        &mut self,
        selector: &str,
        attributes: &[(&str, &str)],
    ) -> PageResult<&mut Self> {
        self.assert_page(element_constraint(selector, attributes).negate(), None)
    }

    /// A link with `text` exists, optionally pointing at `url`
    pub fn see_link(&mut self, text: &str, url: Option<&str>) -> PageResult<&mut Self> {
        self.assert_page(link_constraint(text, url), None)
    }

    /// No link with `text` (and `url`) exists
    pub fn dont_see_link(&mut self, text: &str, url: Option<&str>) -> PageResult<&mut Self> {
        self.assert_page(link_constraint(text, url).negate(), None)
    }

    /// A field holds `value`
    pub fn see_in_field(&mut self, field: &str, value: &str) -> PageResult<&mut Self> {
        self.assert_page(HasValue::new(field, value), None)
    }

    /// A field does not hold `value`
    pub fn dont_see_in_field(&mut self, field: &str, value: &str) -> PageResult<&mut Self> {
        self.assert_page(HasValue::new(field, value).negate(), None)
    }

    /// A select or radio group has `value` selected
    pub fn see_is_selected(&mut self, field: &str, value: &str) -> PageResult<&mut Self> {
        self.assert_page(IsSelected::new(field, value), None)
    }

    /// A select or radio group does not have `value` selected
    pub fn dont_see_is_selected(&mut self, field: &str, value: &str) -> PageResult<&mut Self> {
        self.assert_page(IsSelected::new(field, value).negate(), None)
    }

    /// A checkbox is ticked
    pub fn see_is_checked(&mut self, field: &str) -> PageResult<&mut Self> {
        self.assert_page(IsChecked::new(field), None)
    }

    /// A checkbox is not ticked
    pub fn dont_see_is_checked(&mut self, field: &str) -> PageResult<&mut Self> {
        self.assert_page(IsChecked::new(field).negate(), None)
    }

    /// The current page was served from `uri`
    pub fn see_page_is(&mut self, uri: &str) -> PageResult<&mut Self> {
        let expected = self.navigator.prepare_url(uri)?;
        let actual = self.page()?.uri().clone();
        let result = if same_page(&actual, &expected) {
            AssertionResult::pass()
        } else {
            AssertionResult::fail(format!(
                "Did not land on expected page [{expected}]; current page is [{actual}]."
            ))
        };
        self.report(&result)
    }

    /// The last response had status `code`
    pub fn see_status_code(&mut self, code: u16) -> PageResult<&mut Self> {
        let status = match &self.response {
            Some((_, response)) => response.status,
            None => self.page()?.status(),
        };
        let result = if status == code {
            AssertionResult::pass()
        } else {
            AssertionResult::fail(format!(
                "Expected status code [{code}], got [{status}]."
            ))
        };
        self.report(&result)
    }

    /// Surface failures held back by the reporter
    pub fn verify(&mut self) -> PageResult<()> {
        self.reporter.finish()
    }
}

fn element_constraint(selector: &str, attributes: &[(&str, &str)]) -> HasElement {
    attributes
        .iter()
        .fold(HasElement::new(selector), |c, (name, value)| c.with_attribute(*name, *value))
}

fn link_constraint(text: &str, url: Option<&str>) -> HasLink {
    match url {
        Some(url) => HasLink::new(text).to(url),
        None => HasLink::new(text),
    }
}

fn same_page(actual: &Url, expected: &Url) -> bool {
    let trim = |u: &Url| u.as_str().trim_end_matches('/').to_string();
    trim(actual) == trim(expected)
}

/// Active `within` scope; restores the previous scope when dropped.
///
/// Derefs to the session so the narrowed page can be driven and asserted
/// on. If the guard outlives the page it narrowed (a navigation happened
/// meanwhile) dropping it leaves the new page alone.
#[derive(Debug)]
pub struct ScopeGuard<'a, C> {
    session: &'a mut PageSession<C>,
    page_id: u64,
    depth: usize,
}

impl<C> Deref for ScopeGuard<'_, C> {
    type Target = PageSession<C>;

    fn deref(&self) -> &Self::Target {
        self.session
    }
}

impl<C> DerefMut for ScopeGuard<'_, C> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.session
    }
}

impl<C> Drop for ScopeGuard<'_, C> {
    fn drop(&mut self) {
        if let Some(page) = self.session.page.as_mut() {
            if page.id() == self.page_id {
                page.restore_scope(self.depth);
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::assertion::soft::AssertionMode;
    use crate::client::MockClient;

    const HOME: &str = r#"
        <html><body>
            <h1>Home</h1>
            <nav id="menu"><a href="/about">About</a><a id="help-link" href="/help">?</a></nav>
            <footer><p>Contact</p></footer>
        </body></html>
    "#;

    fn session() -> PageSession<MockClient> {
        let client = MockClient::new()
            .route(Method::Get, "/", Response::html(HOME))
            .route(Method::Get, "/about", Response::html("<h1>About us</h1>"))
            .route(Method::Get, "/help", Response::html("<h1>Help</h1>"))
            .route(Method::Get, "/old", Response::redirect("/about"));
        PageSession::new(client, SessionConfig::default()).unwrap()
    }

    mod navigation_tests {
        use super::*;

        #[test]
        fn test_page_before_visit_is_error() {
            let session = session();
            assert!(matches!(session.page().unwrap_err(), PageError::NoPage));
        }

        #[test]
        fn test_visit_and_assert_chain() {
            let mut session = session();
            session
                .visit("/")
                .unwrap()
                .see_text("Home")
                .unwrap()
                .see_page_is("/")
                .unwrap()
                .see_status_code(200)
                .unwrap();
        }

        #[test]
        fn test_click_by_text_and_id() {
            let mut session = session();
            session.visit("/").unwrap().click("About").unwrap();
            assert_eq!(session.current_uri().unwrap().path(), "/about");

            session.visit("/").unwrap().click("help-link").unwrap();
            assert_eq!(session.current_uri().unwrap().path(), "/help");
        }

        #[test]
        fn test_click_unknown_link() {
            let mut session = session();
            session.visit("/").unwrap();
            let err = session.click("Pricing").unwrap_err();
            assert!(matches!(err, PageError::LinkNotFound { ref name } if name == "Pricing"));
        }

        #[test]
        fn test_call_then_follow_redirects() {
            let mut session = session();
            let status = session.call(Method::Get, "/old", vec![]).unwrap().status;
            assert_eq!(status, 302);
            session.see_status_code(302).unwrap();

            session.follow_redirects().unwrap().see_page_is("/about").unwrap();
            assert!(session.response().is_none());
        }

        #[test]
        fn test_see_page_is_failure_message() {
            let mut session = session();
            session.visit("/").unwrap();
            let err = session.see_page_is("/about").unwrap_err();
            assert!(err.to_string().contains("/about"));
        }
    }

    mod scope_tests {
        use super::*;

        #[test]
        fn test_within_narrows_until_dropped() {
            let mut session = session();
            session.visit("/").unwrap();
            {
                let mut nav = session.within("#menu").unwrap();
                nav.see_text("About").unwrap().dont_see_text("Contact").unwrap();
            }
            session.see_text("Contact").unwrap();
            assert!(session.page().unwrap().scopes().is_empty());
        }

        #[test]
        fn test_scope_restored_on_early_return() {
            let mut session = session();
            session.visit("/").unwrap();
            let outcome = session.within_scope("footer", |s| {
                s.see_text("Home")?;
                Ok(())
            });
            assert!(outcome.is_err());
            assert!(session.page().unwrap().scopes().is_empty());
        }

        #[test]
        fn test_nested_within() {
            let mut session = session();
            session.visit("/").unwrap();
            session
                .within_scope("body", |s| {
                    s.within_scope("nav", |s| {
                        assert_eq!(s.page()?.scopes().depth(), 2);
                        s.see_link("About", Some("/about"))?;
                        Ok(())
                    })?;
                    assert_eq!(s.page()?.scopes().depth(), 1);
                    Ok(())
                })
                .unwrap();
        }

        #[test]
        fn test_within_missing_selector() {
            let mut session = session();
            session.visit("/").unwrap();
            let err = session.within("#sidebar").map(|_| ()).unwrap_err();
            assert!(matches!(err, PageError::NoMatch { .. }));
        }

        #[test]
        fn test_navigation_inside_scope_keeps_new_page_unscoped() {
            let mut session = session();
            session.visit("/").unwrap();
            {
                let mut guard = session.within("#menu").unwrap();
                guard.click("About").unwrap();
                assert!(guard.page().unwrap().scopes().is_empty());
            }
            session.see_text("About us").unwrap();
        }
    }

    mod reporter_tests {
        use super::*;

        #[test]
        fn test_collect_mode_defers_failures() {
            let client = MockClient::new().route(Method::Get, "/", Response::html(HOME));
            let config = SessionConfig::new().with_assertion_mode(AssertionMode::Collect);
            let mut session = PageSession::new(client, config).unwrap();

            session
                .visit("/")
                .unwrap()
                .see_text("Missing one")
                .unwrap()
                .see_text("Missing two")
                .unwrap();
            let err = session.verify().unwrap_err();
            assert!(matches!(err, PageError::AssertionsFailed { count: 2, .. }));
        }

        #[test]
        fn test_custom_message_prefixes_failure() {
            let mut session = session();
            session.visit("/").unwrap();
            let err = session
                .assert_page(HasText::new("Checkout"), Some("cart should be visible"))
                .unwrap_err();
            assert!(err.to_string().contains("cart should be visible"));
        }
    }
}
