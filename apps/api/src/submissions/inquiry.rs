//! Contact form.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::errors::FieldError;
use crate::lark::{CardBuilder, HeaderColor, LarkMessage};
use crate::submissions::application::footer;
use crate::submissions::validate::{
    clean, is_valid_email, normalize_phone, Checker, MAX_MESSAGE_CHARS, MAX_NAME_CHARS,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InquiryKind {
    Jobseeker,
    Employer,
    #[default]
    Other,
}

impl InquiryKind {
    pub fn label(self) -> &'static str {
        match self {
            InquiryKind::Jobseeker => "求職者",
            InquiryKind::Employer => "採用企業",
            InquiryKind::Other => "その他",
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InquiryPayload {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company_name: Option<String>,
    #[serde(default)]
    pub kind: InquiryKind,
    pub message: Option<String>,
    pub source: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Inquiry {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub company_name: Option<String>,
    pub kind: InquiryKind,
    pub message: String,
    pub source: Option<String>,
}

impl InquiryPayload {
    pub fn validate(self) -> Result<Inquiry, Vec<FieldError>> {
        let mut check = Checker::new();

        let name = check.required("name", self.name);
        check.max_chars("name", name.as_deref(), MAX_NAME_CHARS);

        let email = check.required("email", self.email);
        if let Some(email) = &email {
            if !is_valid_email(email) {
                check.fail("email", "is not a valid email address");
            }
        }

        let phone = clean(self.phone).and_then(|raw| match normalize_phone(&raw) {
            Some(phone) => Some(phone),
            None => {
                check.fail("phone", "must be a 10 or 11 digit Japanese phone number");
                None
            }
        });

        let message = check.required("message", self.message);
        check.max_chars("message", message.as_deref(), MAX_MESSAGE_CHARS);

        check.finish()?;

        let (Some(name), Some(email), Some(message)) = (name, email, message) else {
            return Err(vec![FieldError::new("name", "is required")]);
        };

        Ok(Inquiry {
            name,
            email,
            phone,
            company_name: clean(self.company_name),
            kind: self.kind,
            message,
            source: clean(self.source),
        })
    }
}

impl Inquiry {
    pub fn to_card(&self, id: Uuid, submitted_at: DateTime<Utc>) -> LarkMessage {
        CardBuilder::new(
            format!("【お問い合わせ】{}", self.kind.label()),
            HeaderColor::Orange,
        )
        .field("氏名", Some(&self.name))
        .field("会社名", self.company_name.as_deref())
        .field("メールアドレス", Some(&self.email))
        .field("電話番号", self.phone.as_deref())
        .long_field("お問い合わせ内容", Some(&self.message))
        .note(footer(id, submitted_at, self.source.as_deref()))
        .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_kind_defaults_to_other() {
        let payload: InquiryPayload = serde_json::from_value(json!({
            "name": "佐藤",
            "email": "sato@example.com",
            "message": "掲載について"
        }))
        .unwrap();
        let inquiry = payload.validate().unwrap();
        assert_eq!(inquiry.kind, InquiryKind::Other);
        assert_eq!(inquiry.phone, None);
    }

    #[test]
    fn test_optional_phone_still_checked() {
        let payload = InquiryPayload {
            name: Some("佐藤".into()),
            email: Some("sato@example.com".into()),
            phone: Some("abc".into()),
            message: Some("hi".into()),
            ..Default::default()
        };
        let errors = payload.validate().unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "phone");
    }

    #[test]
    fn test_employer_card_title() {
        let payload: InquiryPayload = serde_json::from_value(json!({
            "name": "佐藤",
            "email": "sato@example.com",
            "kind": "employer",
            "companyName": "株式会社ライド",
            "message": "求人を掲載したい"
        }))
        .unwrap();
        let card = payload
            .validate()
            .unwrap()
            .to_card(Uuid::nil(), Utc::now());
        let value = serde_json::to_value(card).unwrap();
        assert_eq!(
            value["card"]["header"]["title"]["content"],
            "【お問い合わせ】採用企業"
        );
        assert_eq!(value["card"]["header"]["template"], "orange");
    }
}
