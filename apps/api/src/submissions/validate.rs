//! Field rules shared by the application and contact forms.

use chrono::{Datelike, NaiveDate};

use crate::errors::FieldError;

pub const MAX_NAME_CHARS: usize = 50;
pub const MAX_MESSAGE_CHARS: usize = 2000;
const MAX_EMAIL_CHARS: usize = 254;
pub const MIN_AGE: u32 = 15;
pub const MAX_AGE: u32 = 100;

/// Trims a form value; blank becomes `None`.
pub fn clean(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Collects field errors while validating a form.
#[derive(Debug, Default)]
pub struct Checker {
    errors: Vec<FieldError>,
}

impl Checker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail(&mut self, field: &'static str, message: impl Into<String>) {
        self.errors.push(FieldError::new(field, message));
    }

    pub fn required(&mut self, field: &'static str, value: Option<String>) -> Option<String> {
        let value = clean(value);
        if value.is_none() {
            self.fail(field, "is required");
        }
        value
    }

    pub fn max_chars(&mut self, field: &'static str, value: Option<&str>, max: usize) {
        if let Some(value) = value {
            if value.chars().count() > max {
                self.fail(field, format!("must be at most {max} characters"));
            }
        }
    }

    pub fn finish(self) -> Result<(), Vec<FieldError>> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self.errors)
        }
    }
}

pub fn is_valid_email(email: &str) -> bool {
    if email.chars().count() > MAX_EMAIL_CHARS || email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    let labels: Vec<&str> = domain.split('.').collect();
    labels.len() >= 2 && labels.iter().all(|label| !label.is_empty())
}

/// Normalises a Japanese phone number to ASCII digits.
///
/// Full-width digits are folded, separators (hyphens, spaces, parentheses)
/// dropped. Valid numbers are 10 or 11 digits starting with `0`.
pub fn normalize_phone(raw: &str) -> Option<String> {
    let mut digits = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '0'..='9' => digits.push(c),
            '０'..='９' => {
                let offset = c as u32 - '０' as u32;
                digits.push(char::from_digit(offset, 10)?);
            }
            '-' | '‐' | '－' | 'ー' | '−' | ' ' | '　' | '(' | ')' | '（' | '）' => {}
            _ => return None,
        }
    }
    let valid = (10..=11).contains(&digits.len()) && digits.starts_with('0');
    valid.then_some(digits)
}

/// Hiragana, katakana, the long-vowel mark, middle dot and spaces.
pub fn is_kana(value: &str) -> bool {
    value.chars().all(|c| {
        matches!(c,
            '\u{3041}'..='\u{3096}'
            | '\u{30A1}'..='\u{30FA}'
            | 'ー' | '・' | ' ' | '　')
    })
}

pub fn age_on(birth: NaiveDate, today: NaiveDate) -> Option<u32> {
    if birth > today {
        return None;
    }
    let mut age = today.year() - birth.year();
    if (today.month(), today.day()) < (birth.month(), birth.day()) {
        age -= 1;
    }
    u32::try_from(age).ok()
}

/// Parses `YYYY-MM-DD` and checks the applicant's age against [`MIN_AGE`]..=[`MAX_AGE`].
pub fn parse_birth_date(raw: &str, today: NaiveDate) -> Result<(NaiveDate, u32), String> {
    let birth = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| "must be a date in YYYY-MM-DD format".to_string())?;
    let age = age_on(birth, today).ok_or_else(|| "must not be in the future".to_string())?;
    if !(MIN_AGE..=MAX_AGE).contains(&age) {
        return Err(format!("age must be between {MIN_AGE} and {MAX_AGE}"));
    }
    Ok((birth, age))
}
