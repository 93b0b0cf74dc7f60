use std::collections::BTreeMap;

use ims_core::ImsError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Key for errors not tied to one field.
pub const FORM_KEY: &str = "_form";

/// Messages per field name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldErrors {
    map: BTreeMap<String, Vec<String>>,
}

fn friendly_message(code: &str) -> Option<&'static str> {
    match code {
        "required" => Some("is required"),
        "email" => Some("must be a valid email"),
        "length" => Some("has invalid length"),
        _ => None,
    }
}

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, field: &str, msg: impl Into<String>) {
        self.map.entry(field.to_string()).or_default().push(msg.into());
    }

    pub fn push_form(&mut self, msg: impl Into<String>) {
        self.push(FORM_KEY, msg);
    }

    pub fn get(&self, field: &str) -> &[String] {
        self.map.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn first(&self, field: &str) -> Option<&str> {
        self.get(field).first().map(String::as_str)
    }

    pub fn has(&self, field: &str) -> bool {
        !self.get(field).is_empty()
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.map.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn len(&self) -> usize {
        self.map.values().map(Vec::len).sum()
    }

    pub fn remove(&mut self, field: &str) -> bool {
        self.map.remove(field).is_some()
    }

    pub fn extend(&mut self, other: FieldErrors) {
        for (field, msgs) in other.map {
            self.map.entry(field).or_default().extend(msgs);
        }
    }

    /// Flatten `validator` output. Messages fall back to a short phrase for
    /// known codes, then to the code itself.
    pub fn from_validation(errs: &validator::ValidationErrors) -> Self {
        let mut out = Self::new();
        for (field, errors) in errs.field_errors() {
            for e in errors {
                let msg = e
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .or_else(|| friendly_message(&e.code).map(str::to_string))
                    .unwrap_or_else(|| e.code.to_string());
                out.push(&field, msg);
            }
        }
        out
    }

    /// Read the `errors` object of a 422 reply: `{field: [msg, ..]}` or
    /// `{field: msg}`. Anything else lands under [`FORM_KEY`].
    pub fn from_server(errors: &Value) -> Self {
        let mut out = Self::new();
        match errors {
            Value::Object(map) => {
                for (field, v) in map {
                    match v {
                        Value::Array(items) => {
                            for item in items {
                                out.push(field, value_text(item));
                            }
                        }
                        other => out.push(field, value_text(other)),
                    }
                }
            }
            Value::Null => {}
            other => out.push_form(value_text(other)),
        }
        out
    }

    pub fn to_json(&self) -> Value {
        let map: Map<String, Value> = self
            .map
            .iter()
            .map(|(k, v)| (k.clone(), Value::from(v.clone())))
            .collect();
        Value::Object(map)
    }

    pub fn into_unprocessable(self, message: &str) -> anyhow::Error {
        ImsError::unprocessable(message)
            .with_errors(self.to_json())
            .into_anyhow()
    }
}

fn value_text(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
