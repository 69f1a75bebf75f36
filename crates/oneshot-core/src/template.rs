//! Task definition templates.
//!
//! A template is the raw text of a `RegisterTaskDefinition` document in which
//! `{{ name }}` (or `{{ .name }}`) placeholders are replaced from a flat
//! parameter map before the document is parsed.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::{Captures, Regex};

use crate::error::TemplateError;

fn placeholder() -> &'static Regex {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    PLACEHOLDER.get_or_init(|| {
        Regex::new(r"\{\{\s*\.?([A-Za-z_][A-Za-z0-9_.\-]*)\s*\}\}")
            .expect("placeholder pattern is valid")
    })
}

/// Raw specification text plus the parameters used to fill it in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpecificationTemplate {
    pub text: String,
    pub parameters: BTreeMap<String, String>,
}

impl SpecificationTemplate {
    pub fn new(text: impl Into<String>) -> Self {
        SpecificationTemplate {
            text: text.into(),
            parameters: BTreeMap::new(),
        }
    }

    pub fn with_parameters<I, K, V>(mut self, parameters: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.parameters
            .extend(parameters.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Names of every placeholder in the text, in order of appearance.
    pub fn placeholders(&self) -> Vec<&str> {
        placeholder()
            .captures_iter(&self.text)
            .filter_map(|c| c.get(1).map(|m| m.as_str()))
            .collect()
    }

    /// Substitute every placeholder.
    ///
    /// Text without placeholders comes back unchanged. The first placeholder
    /// without a matching parameter fails the whole materialization.
    pub fn materialize(&self) -> Result<String, TemplateError> {
        if let Some(missing) = self
            .placeholders()
            .into_iter()
            .find(|name| !self.parameters.contains_key(*name))
        {
            return Err(TemplateError::UndefinedParameter(missing.to_string()));
        }

        let rendered = placeholder().replace_all(&self.text, |caps: &Captures<'_>| {
            self.parameters
                .get(&caps[1])
                .cloned()
                .unwrap_or_default()
        });
        Ok(rendered.into_owned())
    }
}

/// Split a `KEY=VALUE` argument. The value may itself contain `=`.
pub fn parse_parameter(raw: &str) -> Result<(String, String), TemplateError> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(TemplateError::InvalidParameter(raw.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PLAIN: &str = r#"{"containerDefinitions":[{"name":"app","image":"busybox"}]}"#;

    #[test]
    fn test_no_placeholders_is_identity() {
        let template = SpecificationTemplate::new(PLAIN).with_parameters([("unused", "x")]);
        assert_eq!(template.materialize().unwrap(), PLAIN);
    }

    #[test]
    fn test_all_placeholders_replaced() {
        let template = SpecificationTemplate::new(
            r#"{"image":"{{ image }}:{{.tag}}","command":["{{image}}"]}"#,
        )
        .with_parameters([("image", "nginx"), ("tag", "1.27")]);

        assert_eq!(
            template.materialize().unwrap(),
            r#"{"image":"nginx:1.27","command":["nginx"]}"#
        );
    }

    #[test]
    fn test_unmapped_placeholder_fails() {
        let template =
            SpecificationTemplate::new(r#"{"image":"{{ image }}"}"#).with_parameters([("tag", "1")]);
        assert_eq!(
            template.materialize(),
            Err(TemplateError::UndefinedParameter("image".to_string()))
        );
    }

    #[test]
    fn test_placeholders_listed_in_order() {
        let template = SpecificationTemplate::new("{{a}} {{ b.c }} {{ .d-e }}");
        assert_eq!(template.placeholders(), vec!["a", "b.c", "d-e"]);
    }

    #[test]
    fn test_single_braces_are_untouched() {
        let template = SpecificationTemplate::new(r#"{"env":"{name}"}"#);
        assert_eq!(template.materialize().unwrap(), r#"{"env":"{name}"}"#);
    }

    #[test]
    fn test_parse_parameter() {
        assert_eq!(
            parse_parameter("DB_URL=postgres://u:p@h/db?x=1").unwrap(),
            ("DB_URL".to_string(), "postgres://u:p@h/db?x=1".to_string())
        );
        assert_eq!(
            parse_parameter("EMPTY=").unwrap(),
            ("EMPTY".to_string(), String::new())
        );
        assert!(parse_parameter("novalue").is_err());
        assert!(parse_parameter("=value").is_err());
    }
}
