//! HTML form model.
//!
//! A [`Form`] is read out of the DOM together with the button that submits
//! it. Stored inputs are applied to its fields, and it then reports the
//! parameters and declared file fields a browser would send.

use scraper::{ElementRef, Html};
use std::path::Path;
use url::Url;

use crate::client::Method;
use crate::input::InputValue;
use crate::page::{collapse_whitespace, element_text, Page};
use crate::result::{PageError, PageResult};
use crate::selector::parse_css;
use crate::upload::FileDescriptor;

const FIELD_CSS: &str = "input, select, textarea, button";
const BUTTON_CSS: &str =
    "button, input[type='submit'], input[type='button'], input[type='image']";

/// An `<option>` of a select field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectOption {
    /// Submitted value
    pub value: String,
    /// Visible label
    pub label: String,
    /// Whether the option is selected
    pub selected: bool,
}

/// Kind and current state of a form field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    /// Text-like input (text, email, hidden, password, ...)
    Input {
        /// Current value
        value: String,
    },
    /// `<textarea>`
    Textarea {
        /// Current value
        value: String,
    },
    /// Checkbox
    Checkbox {
        /// Value sent when ticked
        value: String,
        /// Ticked state
        checked: bool,
    },
    /// Radio button
    Radio {
        /// Value sent when chosen
        value: String,
        /// Chosen state
        checked: bool,
    },
    /// `<select>`
    Select {
        /// Options in document order
        options: Vec<SelectOption>,
        /// Whether several options may be selected
        multiple: bool,
    },
    /// File input
    File {
        /// Declared upload
        descriptor: FileDescriptor,
    },
    /// Submit control; only sent when it is the pressed button
    Button {
        /// Value sent when pressed
        value: String,
    },
}

/// One named control of a form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormField {
    /// `name` attribute
    pub name: String,
    /// `id` attribute
    pub id: Option<String>,
    /// Disabled controls are never submitted
    pub disabled: bool,
    /// Kind and state
    pub kind: FieldKind,
}

impl FormField {
    fn from_element(element: &ElementRef<'_>) -> Option<Self> {
        let el = element.value();
        let name = el.attr("name")?.to_string();
        let id = el.attr("id").map(str::to_string);
        let disabled = el.attr("disabled").is_some();
        let value = el.attr("value").unwrap_or_default().to_string();

        let kind = match el.name() {
            "textarea" => FieldKind::Textarea {
                value: element.text().collect(),
            },
            "select" => FieldKind::Select {
                options: read_options(element),
                multiple: el.attr("multiple").is_some(),
            },
            "button" => match el.attr("type").map(str::to_ascii_lowercase).as_deref() {
                None | Some("submit") => FieldKind::Button { value },
                _ => return None,
            },
            _ => match el
                .attr("type")
                .unwrap_or("text")
                .to_ascii_lowercase()
                .as_str()
            {
                "checkbox" => FieldKind::Checkbox {
                    value: if value.is_empty() { "on".into() } else { value },
                    checked: el.attr("checked").is_some(),
                },
                "radio" => FieldKind::Radio {
                    value: if value.is_empty() { "on".into() } else { value },
                    checked: el.attr("checked").is_some(),
                },
                "file" => FieldKind::File {
                    descriptor: FileDescriptor::empty(),
                },
                "submit" | "image" => FieldKind::Button { value },
                "button" | "reset" => return None,
                _ => FieldKind::Input { value },
            },
        };

        Some(Self {
            name,
            id,
            disabled,
            kind,
        })
    }

    /// Whether a stored input key addresses this field
    #[must_use]
    pub fn answers_to(&self, key: &str) -> bool {
        self.name == key
            || self.name.strip_suffix("[]") == Some(key)
            || self.id.as_deref() == Some(key)
    }
}

/// A form ready to be filled and submitted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Form {
    method: Method,
    action: Url,
    fields: Vec<FormField>,
    submitter: Option<usize>,
}

impl Form {
    /// Read the form owning the button labelled `label` on `page`.
    ///
    /// Without a label the first form in scope is used.
    pub fn locate(page: &Page, label: Option<&str>) -> PageResult<Self> {
        let not_found = || PageError::FormNotFound {
            button: label.map(str::to_string),
        };

        match label {
            Some(label) => {
                let button = find_button(page, label)?.ok_or_else(not_found)?;
                let form = owning_form(page.document(), &button).ok_or_else(not_found)?;
                Self::from_element(page, &form, Some(&button))
            }
            None => {
                let form = page.select("form")?.into_iter().next().ok_or_else(not_found)?;
                Self::from_element(page, &form, None)
            }
        }
    }

    /// Read a form element, remembering which button submits it
    pub fn from_element(
        page: &Page,
        form: &ElementRef<'_>,
        submitter: Option<&ElementRef<'_>>,
    ) -> PageResult<Self> {
        let attrs = form.value();
        let method = attrs
            .attr("method")
            .and_then(|m| m.parse::<Method>().ok())
            .unwrap_or_default();
        let action = match attrs.attr("action") {
            Some(a) if !a.trim().is_empty() => page.absolute_url(a.trim())?,
            _ => page.uri().clone(),
        };

        let mut elements: Vec<ElementRef<'_>> = form.select(&parse_css(FIELD_CSS)?).collect();
        if let Some(id) = attrs.attr("id") {
            let outside = parse_css(&format!("[form='{}']", id.replace('\'', "\\'")))?;
            for element in page.document().select(&outside) {
                if !elements.contains(&element) {
                    elements.push(element);
                }
            }
        }

        let mut fields = Vec::new();
        let mut submitter_index = None;
        for element in &elements {
            if let Some(field) = FormField::from_element(element) {
                if submitter == Some(element) {
                    submitter_index = Some(fields.len());
                }
                fields.push(field);
            }
        }

        Ok(Self {
            method,
            action,
            fields,
            submitter: submitter_index,
        })
    }

    /// Submission method
    #[must_use]
    pub const fn method(&self) -> Method {
        self.method
    }

    /// Resolved action URL (without GET parameters)
    #[must_use]
    pub fn action(&self) -> &Url {
        &self.action
    }

    /// All named controls
    #[must_use]
    pub fn fields(&self) -> &[FormField] {
        &self.fields
    }

    /// Field addressed by a stored input key
    #[must_use]
    pub fn field(&self, key: &str) -> Option<&FormField> {
        self.fields.iter().find(|f| f.answers_to(key))
    }

    /// Name attribute of the field a key addresses, as written in the markup
    #[must_use]
    pub fn field_name(&self, key: &str) -> Option<&str> {
        self.field(key).map(|f| f.name.as_str())
    }

    /// Apply one stored input to the field(s) it addresses
    pub fn set(&mut self, key: &str, value: &InputValue) -> PageResult<()> {
        let first = self
            .fields
            .iter()
            .position(|f| f.answers_to(key))
            .ok_or_else(|| PageError::UnreachableField {
                name: key.to_string(),
            })?;

        let group_name = self.fields[first].name.clone();
        let group: Vec<usize> = self
            .fields
            .iter()
            .enumerate()
            .filter(|(_, f)| f.name == group_name)
            .map(|(i, _)| i)
            .collect();
        let by_id = self.fields[first].id.as_deref() == Some(key);

        match (self.fields[first].kind.clone(), value) {
            (FieldKind::Checkbox { .. }, InputValue::Flag(on)) => {
                // an id addresses one box, a name the whole group
                let targets = if by_id { vec![first] } else { group };
                for i in targets {
                    if let FieldKind::Checkbox { checked, .. } = &mut self.fields[i].kind {
                        *checked = *on;
                    }
                }
                Ok(())
            }
            (FieldKind::Checkbox { .. }, InputValue::Text(wanted)) => {
                self.choose(key, &group, wanted, false)
            }
            (FieldKind::Radio { .. }, InputValue::Text(wanted)) => {
                self.choose(key, &group, wanted, true)
            }
            (FieldKind::Radio { value: own, .. }, InputValue::Flag(true)) => {
                self.choose(key, &group, &own, true)
            }
            (FieldKind::Radio { .. }, InputValue::Flag(false)) => {
                if let FieldKind::Radio { checked, .. } = &mut self.fields[first].kind {
                    *checked = false;
                }
                Ok(())
            }
            (FieldKind::Select { .. }, value) => self.select_option(first, &value.to_string()),
            (FieldKind::File { .. }, value) => {
                let path = value.to_string();
                self.fields[first].kind = FieldKind::File {
                    descriptor: FileDescriptor::from_path(Path::new(&path)),
                };
                Ok(())
            }
            (FieldKind::Input { .. }, value) => {
                self.fields[first].kind = FieldKind::Input {
                    value: value.to_string(),
                };
                Ok(())
            }
            (FieldKind::Textarea { .. }, value) => {
                self.fields[first].kind = FieldKind::Textarea {
                    value: value.to_string(),
                };
                Ok(())
            }
            (FieldKind::Button { .. }, _) => Ok(()),
        }
    }

    /// Apply stored inputs in order
    pub fn set_values(&mut self, inputs: &[(String, InputValue)]) -> PageResult<()> {
        for (key, value) in inputs {
            self.set(key, value)?;
        }
        Ok(())
    }

    /// Parameters a browser would submit, in document order
    #[must_use]
    pub fn values(&self) -> Vec<(String, String)> {
        let mut values = Vec::new();
        for (index, field) in self.fields.iter().enumerate() {
            if field.disabled {
                continue;
            }
            let name = field.name.clone();
            match &field.kind {
                FieldKind::Input { value } | FieldKind::Textarea { value } => {
                    values.push((name, value.clone()));
                }
                FieldKind::Checkbox { value, checked } | FieldKind::Radio { value, checked } => {
                    if *checked {
                        values.push((name, value.clone()));
                    }
                }
                FieldKind::Select { options, multiple } => {
                    let selected: Vec<&SelectOption> =
                        options.iter().filter(|o| o.selected).collect();
                    if selected.is_empty() && !multiple {
                        if let Some(first) = options.first() {
                            values.push((name, first.value.clone()));
                        }
                    } else {
                        for option in selected {
                            values.push((name.clone(), option.value.clone()));
                        }
                    }
                }
                FieldKind::Button { value } => {
                    if self.submitter == Some(index) {
                        values.push((name, value.clone()));
                    }
                }
                FieldKind::File { .. } => {}
            }
        }
        values
    }

    /// Declared file fields with their descriptors
    #[must_use]
    pub fn files(&self) -> Vec<(String, FileDescriptor)> {
        self.fields
            .iter()
            .filter(|f| !f.disabled)
            .filter_map(|f| match &f.kind {
                FieldKind::File { descriptor } => Some((f.name.clone(), descriptor.clone())),
                _ => None,
            })
            .collect()
    }

    /// Target URL; GET forms carry their values in the query string
    #[must_use]
    pub fn uri(&self) -> Url {
        let mut url = self.action.clone();
        if self.method == Method::Get {
            let values = self.values();
            if !values.is_empty() {
                url.query_pairs_mut().extend_pairs(values);
            }
        }
        url
    }

    /// Parameters to send in the request body (empty for GET forms)
    #[must_use]
    pub fn body_params(&self) -> Vec<(String, String)> {
        if self.method == Method::Get {
            Vec::new()
        } else {
            self.values()
        }
    }

    fn choose(&mut self, key: &str, group: &[usize], wanted: &str, exclusive: bool) -> PageResult<()> {
        let is_wanted = |f: &FormField| match &f.kind {
            FieldKind::Radio { value, .. } | FieldKind::Checkbox { value, .. } => value == wanted,
            _ => false,
        };
        if !group.iter().any(|&i| is_wanted(&self.fields[i])) {
            return Err(PageError::InvalidFieldValue {
                name: key.to_string(),
                value: wanted.to_string(),
                possible: group
                    .iter()
                    .filter_map(|&i| match &self.fields[i].kind {
                        FieldKind::Radio { value, .. } | FieldKind::Checkbox { value, .. } => {
                            Some(value.clone())
                        }
                        _ => None,
                    })
                    .collect(),
            });
        }

        for &i in group {
            let hit = is_wanted(&self.fields[i]);
            if let FieldKind::Radio { checked, .. } | FieldKind::Checkbox { checked, .. } =
                &mut self.fields[i].kind
            {
                if hit {
                    *checked = true;
                } else if exclusive {
                    *checked = false;
                }
            }
        }
        Ok(())
    }

    fn select_option(&mut self, index: usize, wanted: &str) -> PageResult<()> {
        let name = self.fields[index].name.clone();
        let FieldKind::Select { options, multiple } = &mut self.fields[index].kind else {
            return Ok(());
        };

        let position = options
            .iter()
            .position(|o| o.value == wanted)
            .or_else(|| options.iter().position(|o| o.label == wanted));
        let Some(position) = position else {
            return Err(PageError::InvalidFieldValue {
                name,
                value: wanted.to_string(),
                possible: options.iter().map(|o| o.value.clone()).collect(),
            });
        };

        for (i, option) in options.iter_mut().enumerate() {
            if i == position {
                option.selected = true;
            } else if !*multiple {
                option.selected = false;
            }
        }
        Ok(())
    }
}

fn read_options(select: &ElementRef<'_>) -> Vec<SelectOption> {
    let Ok(option_css) = parse_css("option") else {
        return Vec::new();
    };
    select
        .select(&option_css)
        .map(|option| {
            let label = element_text(&option);
            SelectOption {
                value: option
                    .value()
                    .attr("value")
                    .map_or_else(|| label.clone(), str::to_string),
                label,
                selected: option.value().attr("selected").is_some(),
            }
        })
        .collect()
}

fn find_button<'a>(page: &'a Page, label: &str) -> PageResult<Option<ElementRef<'a>>> {
    let wanted = collapse_whitespace(label);
    let buttons = page.select(BUTTON_CSS)?;
    Ok(buttons.into_iter().find(|button| {
        let el = button.value();
        if el.attr("id") == Some(label) || el.attr("name") == Some(label) {
            return true;
        }
        let caption = if el.name() == "button" {
            element_text(button)
        } else if el.attr("type").is_some_and(|t| t.eq_ignore_ascii_case("image")) {
            el.attr("alt").map(collapse_whitespace).unwrap_or_default()
        } else {
            el.attr("value").map(collapse_whitespace).unwrap_or_default()
        };
        // whole words only
        !wanted.is_empty() && format!(" {caption} ").contains(&format!(" {wanted} "))
    }))
}

fn owning_form<'a>(document: &'a Html, button: &ElementRef<'a>) -> Option<ElementRef<'a>> {
    if let Some(form_id) = button.value().attr("form") {
        let css = format!("form[id='{}']", form_id.replace('\'', "\\'"));
        if let Ok(selector) = parse_css(&css) {
            if let Some(form) = document.select(&selector).next() {
                return Some(form);
            }
        }
    }
    button
        .ancestors()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == "form")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::io::Write;

    const SIGNUP: &str = r#"
        <html><body>
        <form method="post" action="/register" id="signup">
            <input type="hidden" name="_token" value="abc123">
            <input type="text" name="user[name]" id="name">
            <input type="email" name="user[email]" value="old@example.com">
            <textarea name="bio">Hello</textarea>
            <input type="checkbox" name="terms" id="terms">
            <input type="checkbox" name="tags[]" value="rust" checked>
            <input type="checkbox" name="tags[]" value="go">
            <input type="radio" name="plan" value="free" checked>
            <input type="radio" name="plan" value="pro">
            <select name="country">
                <option value="us">United States</option>
                <option value="fr">France</option>
            </select>
            <input type="text" name="nickname" disabled value="ghost">
            <input type="file" name="avatar" id="avatar-upload">
            <button type="submit" name="action" value="register">Create account</button>
            <button type="button">Cancel</button>
        </form>
        <input type="text" name="referrer" form="signup" value="ad">
        <form action="/search">
            <input name="q" value="">
            <input type="submit" value="Search">
        </form>
        </body></html>
    "#;

    fn page() -> Page {
        Page::from_html(Url::parse("http://localhost/signup").unwrap(), SIGNUP)
    }

    fn value<'a>(values: &'a [(String, String)], name: &str) -> Vec<&'a str> {
        values
            .iter()
            .filter(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
            .collect()
    }

    mod locate_tests {
        use super::*;

        #[test]
        fn test_locate_by_button_text() {
            let form = Form::locate(&page(), Some("Create account")).unwrap();
            assert_eq!(form.method(), Method::Post);
            assert_eq!(form.action().as_str(), "http://localhost/register");
        }

        #[test]
        fn test_locate_by_input_submit_value() {
            let form = Form::locate(&page(), Some("Search")).unwrap();
            assert_eq!(form.method(), Method::Get);
            assert_eq!(form.action().as_str(), "http://localhost/search");
        }

        #[test]
        fn test_locate_by_button_name() {
            let form = Form::locate(&page(), Some("action")).unwrap();
            assert_eq!(form.method(), Method::Post);
        }

        #[test]
        fn test_locate_without_label_takes_first_form() {
            let form = Form::locate(&page(), None).unwrap();
            assert_eq!(form.action().path(), "/register");
        }

        #[test]
        fn test_missing_button_is_form_not_found() {
            let err = Form::locate(&page(), Some("Delete everything")).unwrap_err();
            assert!(
                matches!(err, PageError::FormNotFound { button: Some(ref b) } if b == "Delete everything")
            );
        }

        #[test]
        fn test_partial_word_label_does_not_match() {
            assert!(matches!(
                Form::locate(&page(), Some("Creat")),
                Err(PageError::FormNotFound { .. })
            ));
        }

        #[test]
        fn test_label_matches_whole_words_of_caption() {
            let page = Page::from_html(
                Url::parse("http://localhost/").unwrap(),
                r#"<form action="/draft"><button>Saved drafts</button></form>
                   <form action="/save"><button>Save now</button></form>"#,
            );
            let form = Form::locate(&page, Some("Save")).unwrap();
            assert_eq!(form.action().path(), "/save");
        }

        #[test]
        fn test_button_outside_form_is_form_not_found() {
            let page = Page::from_html(
                Url::parse("http://localhost/").unwrap(),
                "<button>Orphan</button>",
            );
            assert!(matches!(
                Form::locate(&page, Some("Orphan")),
                Err(PageError::FormNotFound { .. })
            ));
        }

        #[test]
        fn test_no_form_on_page() {
            let page = Page::from_html(Url::parse("http://localhost/").unwrap(), "<p>hi</p>");
            assert!(matches!(
                Form::locate(&page, None),
                Err(PageError::FormNotFound { button: None })
            ));
        }
    }

    mod values_tests {
        use super::*;

        #[test]
        fn test_default_values() {
            let form = Form::locate(&page(), Some("Create account")).unwrap();
            let values = form.values();
            assert_eq!(value(&values, "_token"), vec!["abc123"]);
            assert_eq!(value(&values, "user[email]"), vec!["old@example.com"]);
            assert_eq!(value(&values, "bio"), vec!["Hello"]);
            assert_eq!(value(&values, "tags[]"), vec!["rust"]);
            assert_eq!(value(&values, "plan"), vec!["free"]);
            assert_eq!(value(&values, "country"), vec!["us"]);
            assert_eq!(value(&values, "action"), vec!["register"]);
            assert_eq!(value(&values, "referrer"), vec!["ad"]);
            assert!(value(&values, "terms").is_empty());
            assert!(value(&values, "nickname").is_empty());
            assert!(value(&values, "avatar").is_empty());
        }

        #[test]
        fn test_unpressed_button_not_sent() {
            let form = Form::locate(&page(), None).unwrap();
            assert!(value(&form.values(), "action").is_empty());
        }

        #[test]
        fn test_get_form_puts_values_in_query() {
            let mut form = Form::locate(&page(), Some("Search")).unwrap();
            form.set("q", &InputValue::from("rust forms")).unwrap();
            assert_eq!(form.uri().as_str(), "http://localhost/search?q=rust+forms");
            assert!(form.body_params().is_empty());
        }
    }

    mod set_tests {
        use super::*;

        fn signup() -> Form {
            Form::locate(&page(), Some("Create account")).unwrap()
        }

        #[test]
        fn test_set_text_by_name_and_id() {
            let mut form = signup();
            form.set("user[email]", &"new@example.com".into()).unwrap();
            form.set("name", &"Taylor".into()).unwrap();
            let values = form.values();
            assert_eq!(value(&values, "user[email]"), vec!["new@example.com"]);
            assert_eq!(value(&values, "user[name]"), vec!["Taylor"]);
        }

        #[test]
        fn test_check_and_uncheck() {
            let mut form = signup();
            form.set("terms", &InputValue::Flag(true)).unwrap();
            form.set("tags", &InputValue::Flag(false)).unwrap();
            let values = form.values();
            assert_eq!(value(&values, "terms"), vec!["on"]);
            assert!(value(&values, "tags[]").is_empty());
        }

        #[test]
        fn test_checkbox_group_by_value() {
            let mut form = signup();
            form.set("tags", &"go".into()).unwrap();
            assert_eq!(value(&form.values(), "tags[]"), vec!["rust", "go"]);
        }

        #[test]
        fn test_radio_is_exclusive() {
            let mut form = signup();
            form.set("plan", &"pro".into()).unwrap();
            assert_eq!(value(&form.values(), "plan"), vec!["pro"]);
        }

        #[test]
        fn test_select_by_value_or_label() {
            let mut form = signup();
            form.set("country", &"fr".into()).unwrap();
            assert_eq!(value(&form.values(), "country"), vec!["fr"]);
            form.set("country", &"United States".into()).unwrap();
            assert_eq!(value(&form.values(), "country"), vec!["us"]);
        }

        #[test]
        fn test_invalid_choice_lists_options() {
            let mut form = signup();
            let err = form.set("country", &"de".into()).unwrap_err();
            assert!(
                matches!(err, PageError::InvalidFieldValue { ref possible, .. } if possible == &vec!["us".to_string(), "fr".to_string()])
            );
            assert!(form.set("plan", &"enterprise".into()).is_err());
        }

        #[test]
        fn test_unknown_field_is_unreachable() {
            let mut form = signup();
            assert!(matches!(
                form.set("password", &"x".into()),
                Err(PageError::UnreachableField { .. })
            ));
        }

        #[test]
        fn test_file_field_reads_descriptor() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("me.png");
            fs_write(&path, b"\x89PNG");

            let mut form = signup();
            form.set("avatar-upload", &path.to_string_lossy().into_owned().into())
                .unwrap();
            let files = form.files();
            assert_eq!(files.len(), 1);
            assert_eq!(files[0].0, "avatar");
            assert_eq!(files[0].1.size, 4);
            assert_eq!(files[0].1.mime_type, "image/png");
            assert_eq!(form.field_name("avatar-upload"), Some("avatar"));
        }

        #[test]
        fn test_field_name_keeps_bracket_suffix() {
            let form = signup();
            assert_eq!(form.field_name("tags"), Some("tags[]"));
            assert_eq!(form.field_name("tags[]"), Some("tags[]"));
        }

        fn fs_write(path: &std::path::Path, bytes: &[u8]) {
            let mut file = std::fs::File::create(path).unwrap();
            file.write_all(bytes).unwrap();
        }
    }
}
