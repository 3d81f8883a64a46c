//! Selector-based content extraction.
//!
//! The funnel queries markup only through [`ContentExtractor`], so tests can
//! inject fixed candidate sets. [`HtmlExtractor`] is the `scraper`-backed
//! implementation used for real responses.

use std::collections::BTreeMap;

use scraper::{ElementRef, Html, Selector};
use tracing::warn;
use url::Url;

use crate::error::TransportError;
use crate::transport::{FormFields, Method};

/// Owned snapshot of one matched element.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
    name: String,
    attributes: BTreeMap<String, String>,
    text: String,
    html: String,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn with_html(mut self, html: impl Into<String>) -> Self {
        self.html = html.into();
        self
    }

    /// Lower-case tag name
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    pub fn has_attr(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }

    /// Concatenated text content
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Outer markup, so descendants can be queried on their own
    pub fn html(&self) -> &str {
        &self.html
    }
}

/// Narrow query capability over response bodies.
pub trait ContentExtractor: Send + Sync {
    /// All elements of `body` matching a CSS `selector`, in document order.
    fn select(&self, body: &str, selector: &str) -> Vec<Element>;

    fn attribute<'e>(&self, element: &'e Element, name: &str) -> Option<&'e str> {
        element.attr(name)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlExtractor;

impl ContentExtractor for HtmlExtractor {
    fn select(&self, body: &str, selector: &str) -> Vec<Element> {
        let parsed = match Selector::parse(selector) {
            Ok(parsed) => parsed,
            Err(error) => {
                warn!(selector, ?error, "ignoring invalid selector");
                return Vec::new();
            }
        };

        let document = Html::parse_document(body);
        document.select(&parsed).map(snapshot).collect()
    }
}

fn snapshot(element: ElementRef<'_>) -> Element {
    let value = element.value();
    Element {
        name: value.name().to_ascii_lowercase(),
        attributes: value
            .attrs()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect(),
        text: element.text().collect(),
        html: element.html(),
    }
}

/// Controls a form can submit
const CONTROLS: &str = "input[name], textarea[name], select[name], button[name]";

/// A form located by selector, with the values a browser would submit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Form {
    pub action: Option<String>,
    pub method: Method,
    pub fields: FormFields,
}

impl Form {
    /// Locate the first form matching `form_selector` and collect its
    /// successful controls. Returns `None` when no form matches.
    pub fn extract(extractor: &dyn ContentExtractor, body: &str, form_selector: &str) -> Option<Self> {
        let form = extractor.select(body, form_selector).into_iter().next()?;

        let action = extractor
            .attribute(&form, "action")
            .map(str::trim)
            .filter(|action| !action.is_empty())
            .map(str::to_string);
        let method = match extractor.attribute(&form, "method") {
            Some(method) if method.trim().eq_ignore_ascii_case("post") => Method::Post,
            _ => Method::Get,
        };

        let mut fields = FormFields::new();
        let mut submitter_taken = false;
        for control in extractor.select(form.html(), CONTROLS) {
            if control.has_attr("disabled") {
                continue;
            }
            let Some(name) = extractor.attribute(&control, "name").map(str::to_string) else {
                continue;
            };
            let kind = extractor
                .attribute(&control, "type")
                .unwrap_or(if control.name() == "button" { "submit" } else { "text" })
                .to_ascii_lowercase();
            let value = extractor.attribute(&control, "value");

            match (control.name(), kind.as_str()) {
                ("textarea", _) => fields.push((name, control.text().to_string())),
                ("select", _) => fields.extend(
                    selected_options(extractor, &control)
                        .into_iter()
                        .map(|option| (name.clone(), option)),
                ),
                (_, "submit") => {
                    if !submitter_taken {
                        submitter_taken = true;
                        fields.push((name, value.unwrap_or_default().to_string()));
                    }
                }
                (_, "button" | "reset" | "image" | "file") => {}
                (_, "checkbox" | "radio") => {
                    if control.has_attr("checked") {
                        fields.push((name, value.unwrap_or("on").to_string()));
                    }
                }
                _ => fields.push((name, value.unwrap_or_default().to_string())),
            }
        }

        Some(Self {
            action,
            method,
            fields,
        })
    }

    /// Override existing controls by name and append unknown ones.
    pub fn with_fields<I>(mut self, overrides: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (name, value) in overrides {
            let mut seen = false;
            self.fields.retain_mut(|(existing, current)| {
                if *existing != name {
                    return true;
                }
                if seen {
                    return false;
                }
                seen = true;
                current.clone_from(&value);
                true
            });
            if !seen {
                self.fields.push((name, value));
            }
        }
        self
    }

    pub fn value(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value.as_str())
    }

    /// Submission URL, resolved against the page the form was found on.
    pub fn target(&self, page_url: &Url) -> Result<Url, TransportError> {
        match &self.action {
            Some(action) => page_url
                .join(action)
                .map_err(|_| TransportError::InvalidUrl(action.clone())),
            None => Ok(page_url.clone()),
        }
    }
}

/// Values a `<select>` submits. A single select sends its last selected
/// option, or the first enabled one when none is selected; a `multiple`
/// select sends every selected option.
fn selected_options(extractor: &dyn ContentExtractor, select: &Element) -> Vec<String> {
    let options: Vec<Element> = extractor
        .select(select.html(), "option")
        .into_iter()
        .filter(|option| !option.has_attr("disabled"))
        .collect();
    let value = |option: &Element| match extractor.attribute(option, "value") {
        Some(value) => value.to_string(),
        None => option.text().split_whitespace().collect::<Vec<_>>().join(" "),
    };

    let selected = options.iter().filter(|option| option.has_attr("selected"));
    if select.has_attr("multiple") {
        return selected.map(value).collect();
    }
    selected.last().or(options.first()).map(value).into_iter().collect()
}
