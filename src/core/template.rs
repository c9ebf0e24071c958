//! JSON templates with `{{field}}` placeholders.
//!
//! Substitution rules:
//! - a string that is exactly `{{field}}` becomes the bound value, whatever its type;
//! - placeholders inside longer strings or object keys take the scalar text of the binding;
//! - an object key that is exactly `{{field}}` bound to an object splices its entries in place.
//!
//! Referencing an unbound field is an error.

use crate::utils::error::{As3Error, Result};
use regex::Regex;
use serde_json::{Map, Value};
use std::path::Path;

pub type Bindings = Map<String, Value>;

const PLACEHOLDER_PATTERN: &str = r"\{\{\s*([A-Za-z_][A-Za-z0-9_]*)\s*\}\}";

#[derive(Debug, Clone)]
pub struct Template {
    name: String,
    root: Value,
    placeholder: Regex,
}

impl Template {
    pub fn parse(name: &str, text: &str) -> Result<Self> {
        let root: Value = serde_json::from_str(text).map_err(|e| {
            As3Error::template(name, format!("template is not valid JSON: {}", e))
        })?;
        let placeholder =
            Regex::new(PLACEHOLDER_PATTERN).map_err(|e| As3Error::template(name, e.to_string()))?;

        Ok(Self {
            name: name.to_string(),
            root,
            placeholder,
        })
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        Self::parse(&path.display().to_string(), &text)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Field names referenced anywhere in the template, in first-seen order.
    pub fn placeholders(&self) -> Vec<String> {
        let mut names = Vec::new();
        self.collect_placeholders(&self.root, &mut names);
        names
    }

    pub fn render(&self, bindings: &Bindings) -> Result<Value> {
        self.render_value(&self.root, bindings)
    }

    fn render_value(&self, value: &Value, bindings: &Bindings) -> Result<Value> {
        match value {
            Value::String(s) => match self.exact_placeholder(s) {
                Some(field) => Ok(self.lookup(field, bindings)?.clone()),
                None => Ok(Value::String(self.interpolate(s, bindings)?)),
            },
            Value::Array(items) => items
                .iter()
                .map(|item| self.render_value(item, bindings))
                .collect::<Result<Vec<_>>>()
                .map(Value::Array),
            Value::Object(entries) => {
                let mut rendered = Map::new();
                for (key, inner) in entries {
                    if let Some(field) = self.exact_placeholder(key) {
                        if let Value::Object(spliced) = self.lookup(field, bindings)? {
                            for (spliced_key, spliced_value) in spliced {
                                self.insert_unique(&mut rendered, spliced_key.clone(), spliced_value.clone())?;
                            }
                            continue;
                        }
                    }
                    let key = self.interpolate(key, bindings)?;
                    let inner = self.render_value(inner, bindings)?;
                    self.insert_unique(&mut rendered, key, inner)?;
                }
                Ok(Value::Object(rendered))
            }
            other => Ok(other.clone()),
        }
    }

    fn interpolate(&self, text: &str, bindings: &Bindings) -> Result<String> {
        let mut out = String::with_capacity(text.len());
        let mut last = 0;

        for caps in self.placeholder.captures_iter(text) {
            let (Some(whole), Some(field)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            out.push_str(&text[last..whole.start()]);
            out.push_str(&self.scalar_text(field.as_str(), bindings)?);
            last = whole.end();
        }
        out.push_str(&text[last..]);

        Ok(out)
    }

    fn exact_placeholder<'t>(&self, text: &'t str) -> Option<&'t str> {
        let caps = self.placeholder.captures(text)?;
        let whole = caps.get(0)?;
        if whole.start() == 0 && whole.end() == text.len() {
            caps.get(1).map(|field| field.as_str())
        } else {
            None
        }
    }

    fn lookup<'b>(&self, field: &str, bindings: &'b Bindings) -> Result<&'b Value> {
        bindings.get(field).ok_or_else(|| {
            As3Error::template(
                format!("{{{{{}}}}}", field),
                format!("template '{}' references unknown field '{}'", self.name, field),
            )
        })
    }

    fn scalar_text(&self, field: &str, bindings: &Bindings) -> Result<String> {
        match self.lookup(field, bindings)? {
            Value::String(s) => Ok(s.clone()),
            Value::Number(n) => Ok(n.to_string()),
            Value::Bool(b) => Ok(b.to_string()),
            other => Err(As3Error::template(
                format!("{{{{{}}}}}", field),
                format!(
                    "field '{}' is {} and cannot be embedded in text",
                    field,
                    kind_of(other)
                ),
            )),
        }
    }

    fn insert_unique(&self, target: &mut Map<String, Value>, key: String, value: Value) -> Result<()> {
        if target.contains_key(&key) {
            return Err(As3Error::template(
                key.clone(),
                format!("template '{}' produces duplicate key '{}'", self.name, key),
            ));
        }
        target.insert(key, value);
        Ok(())
    }

    fn collect_placeholders(&self, value: &Value, names: &mut Vec<String>) {
        let note = |text: &str, names: &mut Vec<String>| {
            for caps in self.placeholder.captures_iter(text) {
                if let Some(field) = caps.get(1) {
                    if !names.iter().any(|n| n == field.as_str()) {
                        names.push(field.as_str().to_string());
                    }
                }
            }
        };

        match value {
            Value::String(s) => note(s, names),
            Value::Array(items) => {
                for item in items {
                    self.collect_placeholders(item, names);
                }
            }
            Value::Object(entries) => {
                for (key, inner) in entries {
                    note(key, names);
                    self.collect_placeholders(inner, names);
                }
            }
            _ => {}
        }
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn bindings(value: Value) -> Bindings {
        match value {
            Value::Object(map) => map,
            _ => panic!("bindings must be an object"),
        }
    }

    #[test]
    fn test_exact_placeholder_keeps_type() {
        let template = Template::parse(
            "t",
            r#"{"port": "{{port}}", "members": "{{members}}", "name": "{{ name }}"}"#,
        )
        .unwrap();
        let out = template
            .render(&bindings(json!({"port": 80, "members": ["10.0.0.1"], "name": "web"})))
            .unwrap();

        assert_eq!(out, json!({"port": 80, "members": ["10.0.0.1"], "name": "web"}));
    }

    #[test]
    fn test_embedded_placeholders_in_values_and_keys() {
        let template =
            Template::parse("t", r#"{"{{name}}_vs": {"destination": "{{ip}}:{{port}}"}}"#).unwrap();
        let out = template
            .render(&bindings(json!({"name": "web", "ip": "10.39.2.1", "port": 80})))
            .unwrap();

        assert_eq!(out, json!({"web_vs": {"destination": "10.39.2.1:80"}}));
    }

    #[test]
    fn test_object_key_splices_entries_in_order() {
        let template =
            Template::parse("t", r#"{"class": "Tenant", "{{apps}}": null, "tail": true}"#).unwrap();
        let out = template
            .render(&bindings(json!({"apps": {"b": 1, "a": 2}})))
            .unwrap();

        let keys: Vec<&String> = out.as_object().unwrap().keys().collect();
        assert_eq!(keys, ["class", "b", "a", "tail"]);
    }

    #[test]
    fn test_unknown_field_is_template_error() {
        let template = Template::parse("app", r#"{"pool": "{{pool_nme}}"}"#).unwrap();
        let err = template.render(&bindings(json!({"pool_name": "web_pool"}))).unwrap_err();

        match err {
            As3Error::TemplateError { placeholder, message } => {
                assert_eq!(placeholder, "{{pool_nme}}");
                assert!(message.contains("pool_nme"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_array_cannot_be_embedded_in_text() {
        let template = Template::parse("t", r#"{"x": "members: {{members}}"}"#).unwrap();
        let err = template
            .render(&bindings(json!({"members": ["10.0.0.1"]})))
            .unwrap_err();
        assert!(matches!(err, As3Error::TemplateError { .. }));
    }

    #[test]
    fn test_duplicate_keys_are_rejected() {
        let template = Template::parse("t", r#"{"{{a}}": 1, "{{b}}": 2}"#).unwrap();
        let err = template
            .render(&bindings(json!({"a": "same", "b": "same"})))
            .unwrap_err();
        assert!(matches!(err, As3Error::TemplateError { .. }));
    }

    #[test]
    fn test_invalid_json_template() {
        assert!(matches!(
            Template::parse("broken", "{\"class\": "),
            Err(As3Error::TemplateError { .. })
        ));
    }

    #[test]
    fn test_placeholders_listed_once() {
        let template =
            Template::parse("t", r#"{"{{name}}": ["{{ip}}", "{{name}}"], "p": "{{ip}}:{{port}}"}"#)
                .unwrap();
        assert_eq!(template.placeholders(), ["name", "ip", "port"]);
    }
}
