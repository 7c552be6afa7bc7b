//! Contact form: field validation, submission, and reset.
//!
//! ## States
//!
//! ```text
//! Editing ──submit──▶ Validating ──ok──▶ Submitting ──ok──▶ Submitted
//!    ▲                    │                  │
//!    └────── invalid ─────┘                  │
//!    └────── store failed ───────────────────┘
//! ```
//!
//! Any input returns the form to `Editing`.
//!
//! ## Validation
//!
//! - `postCode` and `streetNumber` accept digits only. A keystroke that breaks
//!   the pattern is not applied and leaves a pattern error on that field; the
//!   error blocks submission until the field receives a valid value.
//! - Every field must be non-empty at submission time.
//! - `mobile` is read-only and always holds the configured default.
//!
//! Validation failures never reach the document store. A store failure keeps
//! every field as typed so the user can resubmit.

use crate::config::{DocumentsConfig, FormConfig};
use crate::store::{Document, DocumentStore, StoreError};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;
use tracing::{info, warn};

/// Shown when a digits-only field receives anything else.
pub const DIGITS_MESSAGE: &str = "la valeur doit être un chiffre";
/// Shown when a field is left empty.
pub const EMPTY_FIELDS_MESSAGE: &str = "Tous les champs doivent être remplis.";
/// Shown after a successful submission.
pub const SUCCESS_MESSAGE: &str = "données sauvegardées";
/// Shown when the document store rejects the submission.
pub const SUBMISSION_FAILED_MESSAGE: &str = "Error saving user details. Please try again later.";

#[derive(Error, Debug)]
pub enum FormError {
    #[error("la valeur doit être un chiffre")]
    InvalidDigits { field: Field },
    #[error("{field} is read-only")]
    ReadOnly { field: Field },
    #[error("Tous les champs doivent être remplis.")]
    EmptyFields(Vec<Field>),
    #[error("Error saving user details. Please try again later.")]
    Submission(#[source] StoreError),
}

/// The contact form's fields, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Field {
    HousingName,
    StreetNumber,
    StreetName,
    PostCode,
    Town,
    Country,
    SiteWeb,
    Mobile,
    Name,
    Surname,
}

impl Field {
    pub const ALL: [Field; 10] = [
        Field::HousingName,
        Field::StreetNumber,
        Field::StreetName,
        Field::PostCode,
        Field::Town,
        Field::Country,
        Field::SiteWeb,
        Field::Mobile,
        Field::Name,
        Field::Surname,
    ];

    /// Document key for the field.
    pub fn key(self) -> &'static str {
        match self {
            Field::HousingName => "housingName",
            Field::StreetNumber => "streetNumber",
            Field::StreetName => "streetName",
            Field::PostCode => "postCode",
            Field::Town => "town",
            Field::Country => "country",
            Field::SiteWeb => "siteWeb",
            Field::Mobile => "mobile",
            Field::Name => "name",
            Field::Surname => "surname",
        }
    }

    pub fn from_key(key: &str) -> Option<Field> {
        Field::ALL.into_iter().find(|f| f.key() == key)
    }

    /// Fields restricted to ASCII digits.
    pub fn is_digits_only(self) -> bool {
        matches!(self, Field::PostCode | Field::StreetNumber)
    }

    pub fn is_read_only(self) -> bool {
        self == Field::Mobile
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Digits-only pattern; the empty string matches so a field can be cleared.
fn matches_digits(value: &str) -> bool {
    value.bytes().all(|b| b.is_ascii_digit())
}

/// Current value of every field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactForm {
    values: BTreeMap<Field, String>,
}

impl ContactForm {
    /// Empty form with `mobile` set to `default_mobile`.
    pub fn new(default_mobile: &str) -> Self {
        let values = Field::ALL
            .into_iter()
            .map(|f| {
                let v = if f == Field::Mobile {
                    default_mobile.to_string()
                } else {
                    String::new()
                };
                (f, v)
            })
            .collect();
        Self { values }
    }

    pub fn get(&self, field: Field) -> &str {
        self.values.get(&field).map(String::as_str).unwrap_or("")
    }

    fn set(&mut self, field: Field, value: &str) {
        self.values.insert(field, value.to_string());
    }

    /// Fields whose value is empty, in display order.
    pub fn empty_fields(&self) -> Vec<Field> {
        Field::ALL
            .into_iter()
            .filter(|f| self.get(*f).is_empty())
            .collect()
    }

    pub fn to_document(&self) -> Document {
        self.values
            .iter()
            .map(|(f, v)| (f.key().to_string(), v.clone()))
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormState {
    Editing,
    Validating,
    Submitting,
    Submitted,
}

/// Drives a [`ContactForm`] through input, validation, and submission.
#[derive(Debug)]
pub struct FormManager {
    form: ContactForm,
    default_mobile: String,
    collection: String,
    state: FormState,
    pattern_error: Option<Field>,
    error: Option<String>,
    success: Option<String>,
}

impl FormManager {
    pub fn new(default_mobile: impl Into<String>, collection: impl Into<String>) -> Self {
        let default_mobile = default_mobile.into();
        Self {
            form: ContactForm::new(&default_mobile),
            default_mobile,
            collection: collection.into(),
            state: FormState::Editing,
            pattern_error: None,
            error: None,
            success: None,
        }
    }

    pub fn from_config(form: &FormConfig, documents: &DocumentsConfig) -> Self {
        Self::new(form.default_mobile.clone(), documents.collection.clone())
    }

    pub fn form(&self) -> &ContactForm {
        &self.form
    }

    pub fn state(&self) -> FormState {
        self.state
    }

    /// Field with an unresolved digits-pattern violation, if any.
    pub fn pattern_error(&self) -> Option<Field> {
        self.pattern_error
    }

    /// User-visible error line, if any.
    pub fn error_message(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// User-visible success line, if any.
    pub fn success_message(&self) -> Option<&str> {
        self.success.as_deref()
    }

    /// Apply one keystroke's worth of input to `field`.
    ///
    /// A digits-only field rejects a non-digit value: the previous value is
    /// kept and the field is flagged until it gets a valid value.
    pub fn input(&mut self, field: Field, value: &str) -> Result<(), FormError> {
        self.state = FormState::Editing;
        if field.is_read_only() {
            return Err(FormError::ReadOnly { field });
        }
        if field.is_digits_only() && !matches_digits(value) {
            self.pattern_error = Some(field);
            self.error = Some(DIGITS_MESSAGE.to_string());
            return Err(FormError::InvalidDigits { field });
        }
        if self.pattern_error == Some(field) {
            self.pattern_error = None;
        }
        if self.pattern_error.is_none() {
            self.error = None;
        }
        self.form.set(field, value);
        Ok(())
    }

    /// Validate and append the form to the document store.
    ///
    /// Returns the new document id. On success the form is reset; on any
    /// failure the fields are left as they are.
    pub fn submit(&mut self, store: &impl DocumentStore) -> Result<String, FormError> {
        self.state = FormState::Validating;

        let empty = self.form.empty_fields();
        if !empty.is_empty() {
            self.state = FormState::Editing;
            self.error = Some(EMPTY_FIELDS_MESSAGE.to_string());
            return Err(FormError::EmptyFields(empty));
        }
        if let Some(field) = self.pattern_error {
            self.state = FormState::Editing;
            self.error = Some(DIGITS_MESSAGE.to_string());
            return Err(FormError::InvalidDigits { field });
        }

        self.state = FormState::Submitting;
        match store.append(&self.collection, &self.form.to_document()) {
            Ok(id) => {
                info!(collection = %self.collection, %id, "contact details saved");
                self.form = ContactForm::new(&self.default_mobile);
                self.state = FormState::Submitted;
                self.error = None;
                self.success = Some(SUCCESS_MESSAGE.to_string());
                Ok(id)
            }
            Err(e) => {
                warn!(collection = %self.collection, error = %e, "saving contact details failed");
                self.state = FormState::Editing;
                self.error = Some(SUBMISSION_FAILED_MESSAGE.to_string());
                Err(FormError::Submission(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::tests::MemoryDocumentStore;

    const MOBILE: &str = "+33766797364";

    fn manager() -> FormManager {
        FormManager::new(MOBILE, "user_details")
    }

    fn fill(manager: &mut FormManager) {
        for (field, value) in [
            (Field::HousingName, "Villa Mimosa"),
            (Field::StreetNumber, "12"),
            (Field::StreetName, "rue des Lilas"),
            (Field::PostCode, "06000"),
            (Field::Town, "Nice"),
            (Field::Country, "France"),
            (Field::SiteWeb, "https://example.com/annonce"),
            (Field::Name, "Camille"),
            (Field::Surname, "Martin"),
        ] {
            manager.input(field, value).unwrap();
        }
    }

    #[test]
    fn new_form_has_only_mobile() {
        let m = manager();
        assert_eq!(m.form().get(Field::Mobile), MOBILE);
        assert_eq!(m.form().empty_fields().len(), 9);
        assert_eq!(m.state(), FormState::Editing);
    }

    #[test]
    fn field_keys_round_trip() {
        for field in Field::ALL {
            assert_eq!(Field::from_key(field.key()), Some(field));
        }
        assert_eq!(Field::from_key("phone"), None);
    }

    #[test]
    fn digits_field_rejects_letters_and_keeps_old_value() {
        let mut m = manager();
        m.input(Field::PostCode, "12").unwrap();

        let err = m.input(Field::PostCode, "12a").unwrap_err();

        assert!(matches!(err, FormError::InvalidDigits { field: Field::PostCode }));
        assert_eq!(m.form().get(Field::PostCode), "12");
        assert_eq!(m.pattern_error(), Some(Field::PostCode));
        assert_eq!(m.error_message(), Some(DIGITS_MESSAGE));
    }

    #[test]
    fn digits_field_can_be_cleared() {
        let mut m = manager();
        m.input(Field::StreetNumber, "4").unwrap();
        m.input(Field::StreetNumber, "").unwrap();
        assert_eq!(m.form().get(Field::StreetNumber), "");
    }

    #[test]
    fn free_text_fields_accept_anything() {
        let mut m = manager();
        m.input(Field::Town, "Saint-Étienne 42").unwrap();
        assert_eq!(m.form().get(Field::Town), "Saint-Étienne 42");
    }

    #[test]
    fn mobile_is_read_only() {
        let mut m = manager();
        assert!(matches!(
            m.input(Field::Mobile, "0600000000"),
            Err(FormError::ReadOnly { field: Field::Mobile })
        ));
        assert_eq!(m.form().get(Field::Mobile), MOBILE);
    }

    #[test]
    fn empty_field_never_reaches_store() {
        let store = MemoryDocumentStore::new();
        let mut m = manager();
        fill(&mut m);
        m.input(Field::Town, "").unwrap();

        let err = m.submit(&store).unwrap_err();

        assert!(matches!(err, FormError::EmptyFields(ref f) if f == &vec![Field::Town]));
        assert_eq!(store.append_count(), 0);
        assert_eq!(m.state(), FormState::Editing);
        assert_eq!(m.error_message(), Some(EMPTY_FIELDS_MESSAGE));
    }

    #[test]
    fn active_pattern_error_blocks_submission() {
        let store = MemoryDocumentStore::new();
        let mut m = manager();
        fill(&mut m);
        let _ = m.input(Field::StreetNumber, "12b");
        // Another field's valid input does not clear it
        m.input(Field::Town, "Antibes").unwrap();

        let err = m.submit(&store).unwrap_err();

        assert!(matches!(
            err,
            FormError::InvalidDigits {
                field: Field::StreetNumber
            }
        ));
        assert_eq!(store.append_count(), 0);
    }

    #[test]
    fn successful_submit_appends_and_resets() {
        let store = MemoryDocumentStore::new();
        let mut m = manager();
        fill(&mut m);

        let id = m.submit(&store).unwrap();

        assert_eq!(id, "doc-1");
        let appended = store.appended.lock().unwrap();
        let (collection, doc) = &appended[0];
        assert_eq!(collection, "user_details");
        assert_eq!(doc.len(), 10);
        assert_eq!(doc["postCode"], "06000");
        assert_eq!(doc["mobile"], MOBILE);
        assert_eq!(m.state(), FormState::Submitted);
        assert_eq!(m.success_message(), Some(SUCCESS_MESSAGE));
        assert_eq!(m.form(), &ContactForm::new(MOBILE));
    }

    #[test]
    fn store_failure_keeps_fields() {
        let store = MemoryDocumentStore::failing();
        let mut m = manager();
        fill(&mut m);
        let before = m.form().clone();

        let err = m.submit(&store).unwrap_err();

        assert!(matches!(err, FormError::Submission(_)));
        assert_eq!(m.form(), &before);
        assert_eq!(m.state(), FormState::Editing);
        assert_eq!(m.error_message(), Some(SUBMISSION_FAILED_MESSAGE));
        assert_eq!(m.success_message(), None);
    }

    #[test]
    fn correcting_post_code_allows_resubmission() {
        let store = MemoryDocumentStore::new();
        let mut m = manager();
        fill(&mut m);
        m.input(Field::PostCode, "12").unwrap();
        assert!(m.input(Field::PostCode, "12a").is_err());
        assert!(m.submit(&store).is_err());
        assert_eq!(store.append_count(), 0);

        m.input(Field::PostCode, "12000").unwrap();
        m.submit(&store).unwrap();

        assert_eq!(store.append_count(), 1);
        assert_eq!(store.appended.lock().unwrap()[0].1["postCode"], "12000");
        assert_eq!(m.form().empty_fields().len(), 9);
        assert_eq!(m.form().get(Field::Mobile), MOBILE);
    }

    #[test]
    fn error_messages_match_display() {
        assert_eq!(
            FormError::InvalidDigits {
                field: Field::PostCode
            }
            .to_string(),
            DIGITS_MESSAGE
        );
        assert_eq!(
            FormError::EmptyFields(vec![]).to_string(),
            EMPTY_FIELDS_MESSAGE
        );
    }
}
