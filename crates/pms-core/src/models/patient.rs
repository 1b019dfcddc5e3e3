//! Patient record model: input validation, uniqueness, derived fields.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Upper bound on patient name length, in characters.
pub const MAX_NAME_LEN: usize = 100;

/// Upper bound on the number of allergy entries.
pub const MAX_ALLERGIES: usize = 5;

/// Consumer email providers. A sender from one of these is an Amateur.
const COMMON_DOMAINS: &[&str] = &[
    "gmail.com",
    "yahoo.com",
    "hotmail.com",
    "outlook.com",
    "icloud.com",
    "aol.com",
];

/// Partner company domains. A sender from one of these was referred by a company.
const PARTNER_DOMAINS: &[&str] = &[
    "parco.com.pk",
    "hbl.com",
    "engro.com.pk",
    "lucky-cement.com",
];

fn email_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$").expect("email pattern")
    })
}

/// Record-model errors.
#[derive(Error, Debug, PartialEq)]
pub enum ModelError {
    /// A structural constraint on the input was violated. Reports the first
    /// failing field only.
    #[error("invalid {field}: {reason}")]
    Validation { field: &'static str, reason: String },

    /// Email or phone collides with another stored record.
    #[error("duplicate {field}: {value}")]
    Duplicate { field: &'static str, value: String },

    /// Derived-field computation impossible from the given input.
    #[error("cannot compute bmi: {0}")]
    Computation(String),
}

/// BMI classification bands.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum BmiClass {
    Underweight,
    #[serde(rename = "Normal weight")]
    NormalWeight,
    Overweight,
    Obesity,
}

impl BmiClass {
    /// Classify an already-rounded BMI value.
    pub fn from_bmi(bmi: f64) -> Self {
        if bmi < 18.5 {
            BmiClass::Underweight
        } else if bmi < 25.0 {
            BmiClass::NormalWeight
        } else if bmi < 29.9 {
            BmiClass::Overweight
        } else {
            BmiClass::Obesity
        }
    }
}

/// Referral classification, derived from the email domain.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum Referral {
    /// Legacy rows without a stored classification.
    #[default]
    Unknown,
    Amateur,
    Professional,
    #[serde(rename = "Referred by a company")]
    Company,
}

impl Referral {
    /// Fixed sort rank: Unknown < Amateur < Professional < Company.
    pub fn rank(self) -> u8 {
        match self {
            Referral::Unknown => 0,
            Referral::Amateur => 1,
            Referral::Professional => 2,
            Referral::Company => 3,
        }
    }

    /// Classify by the domain part of an email address. Domains compare
    /// case-insensitively against the two fixed lists.
    pub fn from_email(email: &str) -> Self {
        let domain = match email.rsplit_once('@') {
            Some((_, domain)) => domain.to_ascii_lowercase(),
            None => return Referral::Unknown,
        };
        if COMMON_DOMAINS.contains(&domain.as_str()) {
            Referral::Amateur
        } else if PARTNER_DOMAINS.contains(&domain.as_str()) {
            Referral::Company
        } else {
            Referral::Professional
        }
    }
}

/// Input for creating a patient. Carries only caller-settable fields;
/// derived fields live on [`Patient`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewPatient {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub age: u32,
    /// Height in meters.
    pub height: f64,
    /// Weight in kilograms.
    pub weight: f64,
    #[serde(default)]
    pub allergies: Option<Vec<String>>,
}

impl NewPatient {
    /// Check every structural constraint, reporting the first violation.
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.name.is_empty() {
            return Err(invalid("name", "must not be empty"));
        }
        if self.name.chars().count() > MAX_NAME_LEN {
            return Err(invalid(
                "name",
                format!("must be at most {MAX_NAME_LEN} characters"),
            ));
        }
        if !email_pattern().is_match(&self.email) {
            return Err(invalid("email", format!("not a valid address: {}", self.email)));
        }
        if self.phone.is_empty() {
            return Err(invalid("phone", "must not be empty"));
        }
        if self.age == 0 || self.age > 120 {
            return Err(invalid("age", format!("must be 1-120, got {}", self.age)));
        }
        if self.height <= 0.0 {
            return Err(invalid("height", format!("must be positive, got {}", self.height)));
        }
        if self.weight <= 0.0 {
            return Err(invalid("weight", format!("must be positive, got {}", self.weight)));
        }
        if let Some(allergies) = &self.allergies {
            if allergies.len() > MAX_ALLERGIES {
                return Err(invalid(
                    "allergies",
                    format!("at most {} entries, got {}", MAX_ALLERGIES, allergies.len()),
                ));
            }
        }
        Ok(())
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ModelError {
    ModelError::Validation {
        field,
        reason: reason.into(),
    }
}

/// Partial update for an existing patient. Fields left `None` keep their
/// stored values; derived fields are always recomputed.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PatientUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub age: Option<u32>,
    pub height: Option<f64>,
    pub weight: Option<f64>,
    pub allergies: Option<Vec<String>>,
}

/// A stored patient record: validated input plus derived fields.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Patient {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub age: u32,
    /// Height in meters.
    pub height: f64,
    /// Weight in kilograms.
    pub weight: f64,
    pub allergies: Option<Vec<String>>,
    /// Body mass index, rounded to 2 decimal places.
    pub bmi: f64,
    pub bmi_class: BmiClass,
    #[serde(default)]
    pub referred_by: Referral,
}

impl Patient {
    /// Build a record from validated input, computing all derived fields.
    /// Callers run [`NewPatient::validate`] and [`check_unique`] first.
    pub fn derive(input: NewPatient) -> Result<Self, ModelError> {
        let bmi = compute_bmi(input.height, input.weight)?;
        let bmi_class = BmiClass::from_bmi(bmi);
        let referred_by = Referral::from_email(&input.email);
        Ok(Self {
            name: input.name,
            email: input.email,
            phone: input.phone,
            age: input.age,
            height: input.height,
            weight: input.weight,
            allergies: input.allergies,
            bmi,
            bmi_class,
            referred_by,
        })
    }

    /// Merge an update over this record, producing fresh input for
    /// revalidation and re-derivation.
    pub fn merged_with(&self, update: PatientUpdate) -> NewPatient {
        NewPatient {
            name: update.name.unwrap_or_else(|| self.name.clone()),
            email: update.email.unwrap_or_else(|| self.email.clone()),
            phone: update.phone.unwrap_or_else(|| self.phone.clone()),
            age: update.age.unwrap_or(self.age),
            height: update.height.unwrap_or(self.height),
            weight: update.weight.unwrap_or(self.weight),
            allergies: update.allergies.or_else(|| self.allergies.clone()),
        }
    }
}

/// BMI from height (m) and weight (kg), rounded to 2 decimal places.
/// Fails on non-positive height or weight even though input bounds already
/// forbid them; the ratio must never be computed from such values.
pub fn compute_bmi(height: f64, weight: f64) -> Result<f64, ModelError> {
    if height <= 0.0 || weight <= 0.0 {
        return Err(ModelError::Computation(format!(
            "height and weight must be positive, got {height}m / {weight}kg"
        )));
    }
    Ok((weight / (height * height) * 100.0).round() / 100.0)
}

/// Check email and phone uniqueness against the live record set, as stored
/// (case-sensitive). `exclude` names the record being updated, which may
/// keep its own values.
pub fn check_unique(
    records: &BTreeMap<u64, Patient>,
    email: &str,
    phone: &str,
    exclude: Option<u64>,
) -> Result<(), ModelError> {
    for (id, record) in records {
        if Some(*id) == exclude {
            continue;
        }
        if record.email == email {
            return Err(ModelError::Duplicate {
                field: "email",
                value: email.to_string(),
            });
        }
        if record.phone == phone {
            return Err(ModelError::Duplicate {
                field: "phone",
                value: phone.to_string(),
            });
        }
    }
    Ok(())
}
