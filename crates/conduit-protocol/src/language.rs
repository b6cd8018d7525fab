//! Message templates for failures reported to peers.
//!
//! Templates are keyed by action-layer error id and contain `{name}`
//! placeholders filled from the error's context. Arrays render as a
//! comma-separated list; strings render without quotes.

use serde_json::{Map, Value};
use std::collections::HashMap;
use tracing::warn;

const ENGLISH: &[(&str, &str)] = &[
    (
        "unsupported_packet_type",
        "Packet type '{got}' is not supported (supported: {supported})",
    ),
    (
        "unsupported_request_mode",
        "Action '{action}' cannot be invoked in {mode} mode (supported: {supported})",
    ),
    (
        "unsupported_request_action",
        "Action '{action}' is not registered",
    ),
    (
        "internal_action_handler_error",
        "Action '{action}' failed while handling the request",
    ),
    (
        "action_handler_timeout",
        "Action '{action}' did not complete within {timeout_ms} ms",
    ),
    (
        "adapter_not_found",
        "Action '{action}' is declared but has no handler",
    ),
    (
        "invalid_argument",
        "Argument for action '{action}' is invalid: {message}",
    ),
];

/// Locale-resolved message templates.
///
/// # Example
///
/// ```
/// use conduit_protocol::LanguageTable;
/// use serde_json::{json, Map};
///
/// let mut context = Map::new();
/// context.insert("action".into(), json!("acme:echo"));
///
/// let table = LanguageTable::english();
/// assert_eq!(
///     table.render("unsupported_request_action", &context).unwrap(),
///     "Action 'acme:echo' is not registered"
/// );
/// ```
#[derive(Debug, Clone)]
pub struct LanguageTable {
    locale: String,
    templates: HashMap<String, String>,
}

impl LanguageTable {
    /// Built-in English table.
    #[must_use]
    pub fn english() -> Self {
        Self {
            locale: "en".to_string(),
            templates: ENGLISH
                .iter()
                .map(|(id, text)| ((*id).to_string(), (*text).to_string()))
                .collect(),
        }
    }

    /// Table for `locale`. Only English ships built in; other locales start
    /// from English and are expected to be filled by overrides.
    #[must_use]
    pub fn for_locale(locale: &str) -> Self {
        let mut table = Self::english();
        if !locale.eq_ignore_ascii_case("en") && !locale.to_ascii_lowercase().starts_with("en-") {
            warn!(locale, "no built-in message table, falling back to English templates");
        }
        table.locale = locale.to_string();
        table
    }

    /// Replaces templates by error id.
    #[must_use]
    pub fn with_overrides<I, K, V>(mut self, overrides: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (id, text) in overrides {
            self.templates.insert(id.into(), text.into());
        }
        self
    }

    /// Locale tag.
    #[must_use]
    pub fn locale(&self) -> &str {
        &self.locale
    }

    /// Renders the template for `id`. `None` if there is no template.
    #[must_use]
    pub fn render(&self, id: &str, context: &Map<String, Value>) -> Option<String> {
        self.templates
            .get(id)
            .map(|template| substitute(template, context))
    }
}

impl Default for LanguageTable {
    fn default() -> Self {
        Self::english()
    }
}

fn substitute(template: &str, context: &Map<String, Value>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        match after.find('}') {
            Some(end) => {
                let key = &after[..end];
                match context.get(key) {
                    Some(value) => out.push_str(&render_value(value)),
                    None => {
                        out.push('{');
                        out.push_str(key);
                        out.push('}');
                    }
                }
                rest = &after[end + 1..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(render_value)
            .collect::<Vec<_>>()
            .join(", "),
        other => other.to_string(),
    }
}
