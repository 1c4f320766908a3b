//! Declarative extraction: a schema is an ordered list of field rules
//! evaluated against rendered HTML.
//!
//! A schema without a scope produces exactly one [`Record`] for the whole
//! document. A scoped schema produces one record per element matching the
//! scope selector, with field selectors evaluated inside that element.
//! Only a `required` field with no non-empty match is an error.

use std::collections::BTreeMap;

use scraper::{ElementRef, Html, Selector};

use crate::error::FetchError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Capture {
    Text,
    Attribute(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Multiplicity {
    One,
    Many,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldRule {
    pub name: String,
    pub selector: String,
    pub capture: Capture,
    pub multiplicity: Multiplicity,
    pub required: bool,
}

impl FieldRule {
    pub fn text(name: &str, selector: &str) -> Self {
        Self {
            name: name.to_owned(),
            selector: selector.to_owned(),
            capture: Capture::Text,
            multiplicity: Multiplicity::One,
            required: false,
        }
    }

    pub fn attr(name: &str, selector: &str, attribute: &str) -> Self {
        Self {
            capture: Capture::Attribute(attribute.to_owned()),
            ..Self::text(name, selector)
        }
    }

    pub fn many(mut self) -> Self {
        self.multiplicity = Multiplicity::Many;
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schema {
    pub scope: Option<String>,
    pub fields: Vec<FieldRule>,
}

impl Schema {
    pub fn document(fields: Vec<FieldRule>) -> Self {
        Self {
            scope: None,
            fields,
        }
    }

    pub fn scoped(scope: &str, fields: Vec<FieldRule>) -> Self {
        Self {
            scope: Some(scope.to_owned()),
            fields,
        }
    }

    pub fn extract(&self, html: &str) -> Result<Vec<Record>, FetchError> {
        let compiled = self
            .fields
            .iter()
            .map(|rule| Ok((rule, parse_selector(&rule.name, &rule.selector)?)))
            .collect::<Result<Vec<_>, FetchError>>()?;

        let document = Html::parse_document(html);
        match &self.scope {
            None => {
                let record = extract_record(document.root_element(), &compiled)?;
                Ok(vec![record])
            }
            Some(scope) => {
                let scope_selector = parse_selector("<scope>", scope)?;
                document
                    .select(&scope_selector)
                    .map(|element| extract_record(element, &compiled))
                    .collect()
            }
        }
    }
}

/// Captured values keyed by field name. Absent optional fields have no key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    fields: BTreeMap<String, Vec<String>>,
}

impl Record {
    pub fn one(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    pub fn many(&self, name: &str) -> &[String] {
        self.fields.get(name).map(Vec::as_slice).unwrap_or(&[])
    }
}

fn parse_selector(field: &str, selector: &str) -> Result<Selector, FetchError> {
    Selector::parse(selector)
        .map_err(|err| FetchError::extraction(field, format!("invalid selector {selector:?}: {err:?}")))
}

fn extract_record(
    root: ElementRef<'_>,
    rules: &[(&FieldRule, Selector)],
) -> Result<Record, FetchError> {
    let mut record = Record::default();
    for (rule, selector) in rules {
        let mut values = Vec::new();
        for element in root.select(selector) {
            let Some(value) = capture(element, &rule.capture) else {
                continue;
            };
            values.push(value);
            if rule.multiplicity == Multiplicity::One {
                break;
            }
        }

        if values.is_empty() {
            if rule.required {
                return Err(FetchError::extraction(
                    &rule.name,
                    format!("required selector {:?} matched nothing", rule.selector),
                ));
            }
            continue;
        }
        record.fields.insert(rule.name.clone(), values);
    }
    Ok(record)
}

fn capture(element: ElementRef<'_>, capture: &Capture) -> Option<String> {
    let raw = match capture {
        Capture::Text => element.text().collect::<String>(),
        Capture::Attribute(name) => element.value().attr(name)?.to_owned(),
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.to_owned())
}
