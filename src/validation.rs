//! Declarative field rules.
//!
//! Each field carries an ordered rule list. Rules run in order and the first
//! failure is the one reported for that field. An empty value short-circuits:
//! it fails `Required` and otherwise skips the remaining rules.

use std::collections::BTreeMap;
use std::fmt;

use lazy_static::lazy_static;
use regex::Regex;

use crate::images::{sniff_mime, UploadItem};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    Required,
    MinLength(usize),
    ValidEmail,
    /// Outcome of a uniqueness lookup done by the caller.
    Unique { taken: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileRule {
    MimeIn(&'static [&'static str]),
    IsImage,
    MaxSizeKb(usize),
}

/// Field name -> first failing rule's message.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ValidationErrors(BTreeMap<String, String>);

impl ValidationErrors {
    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::default();
        errors.insert(field, message);
        errors
    }

    pub fn insert(&mut self, field: &str, message: impl Into<String>) {
        self.0.entry(field.to_string()).or_insert_with(|| message.into());
    }

    #[cfg(test)]
    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_inner(self) -> BTreeMap<String, String> {
        self.0
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, message) in &self.0 {
            if !first {
                f.write_str("; ")?;
            }
            write!(f, "{}: {}", field, message)?;
            first = false;
        }
        Ok(())
    }
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

#[derive(Debug, Default)]
pub struct Validator {
    errors: ValidationErrors,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Blankness ignores surrounding whitespace; `MinLength` counts the raw value.
    pub fn field(mut self, name: &str, value: Option<&str>, rules: &[Rule]) -> Self {
        let raw = value.unwrap_or_default();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            if rules.contains(&Rule::Required) {
                self.errors
                    .insert(name, format!("The {} field is required.", name));
            }
            return self;
        }

        for rule in rules {
            let failed = match *rule {
                Rule::Required => None,
                Rule::MinLength(min) if raw.chars().count() < min => Some(format!(
                    "The {} field must be at least {} characters in length.",
                    name, min
                )),
                Rule::ValidEmail if !is_valid_email(trimmed) => Some(format!(
                    "The {} field must contain a valid email address.",
                    name
                )),
                Rule::Unique { taken: true } => {
                    Some(format!("The {} field must contain a unique value.", name))
                }
                _ => None,
            };
            if let Some(message) = failed {
                self.errors.insert(name, message);
                break;
            }
        }
        self
    }

    /// File rules are all optional: a missing upload passes.
    pub fn file(mut self, name: &str, upload: Option<&UploadItem>, rules: &[FileRule]) -> Self {
        let Some(upload) = upload.filter(|u| !u.body.is_empty()) else {
            return self;
        };
        let detected = sniff_mime(&upload.body);

        for rule in rules {
            let failed = match *rule {
                FileRule::MimeIn(allowed) if !detected.is_some_and(|m| allowed.contains(&m)) => {
                    Some(format!("The {} field does not have a valid mime type.", name))
                }
                FileRule::IsImage if !detected.is_some_and(|m| m.starts_with("image/")) => {
                    Some(format!("The {} field is not a valid, uploaded image file.", name))
                }
                FileRule::MaxSizeKb(kb) if upload.body.len() > kb * 1024 => {
                    Some(format!("The {} field is too large a file.", name))
                }
                _ => None,
            };
            if let Some(message) = failed {
                self.errors.insert(name, message);
                break;
            }
        }
        self
    }

    pub fn finish(self) -> Result<(), ValidationErrors> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self.errors)
        }
    }
}
