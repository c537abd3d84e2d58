//! Job application form: validation and the notification card.

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::cms::models::Job;
use crate::errors::FieldError;
use crate::lark::{CardBuilder, HeaderColor, LarkMessage};
use crate::submissions::validate::{
    clean, is_kana, is_valid_email, normalize_phone, parse_birth_date, Checker,
    MAX_MESSAGE_CHARS, MAX_NAME_CHARS,
};

/// Raw application form as posted by the site. Every field is optional at
/// this stage so that all problems can be reported at once.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationPayload {
    pub name: Option<String>,
    pub kana: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub birth_date: Option<String>,
    pub gender: Option<String>,
    pub prefecture: Option<String>,
    #[serde(default)]
    pub licenses: Vec<String>,
    pub job_id: Option<String>,
    pub job_title: Option<String>,
    pub company_name: Option<String>,
    pub message: Option<String>,
    pub source: Option<String>,
}

/// A validated application.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    pub name: String,
    pub kana: Option<String>,
    pub email: String,
    pub phone: String,
    pub birth_date: NaiveDate,
    pub age: u32,
    pub gender: Option<String>,
    pub prefecture: Option<String>,
    pub licenses: Vec<String>,
    pub job_id: Option<String>,
    pub job_title: Option<String>,
    pub company_name: Option<String>,
    /// Filled from the CMS when the job is looked up.
    pub job_location: Option<String>,
    pub job_salary: Option<String>,
    pub message: Option<String>,
    pub source: Option<String>,
}

impl ApplicationPayload {
    pub fn validate(self, today: NaiveDate) -> Result<Application, Vec<FieldError>> {
        let mut check = Checker::new();

        let name = check.required("name", self.name);
        check.max_chars("name", name.as_deref(), MAX_NAME_CHARS);

        let kana = clean(self.kana);
        if let Some(kana) = &kana {
            if !is_kana(kana) {
                check.fail("kana", "must be written in hiragana or katakana");
            }
            check.max_chars("kana", Some(kana), MAX_NAME_CHARS);
        }

        let email = check.required("email", self.email);
        if let Some(email) = &email {
            if !is_valid_email(email) {
                check.fail("email", "is not a valid email address");
            }
        }

        let phone = check
            .required("phone", self.phone)
            .and_then(|raw| match normalize_phone(&raw) {
                Some(phone) => Some(phone),
                None => {
                    check.fail("phone", "must be a 10 or 11 digit Japanese phone number");
                    None
                }
            });

        let birth = check
            .required("birthDate", self.birth_date)
            .and_then(|raw| match parse_birth_date(&raw, today) {
                Ok(parsed) => Some(parsed),
                Err(message) => {
                    check.fail("birthDate", message);
                    None
                }
            });

        let message = clean(self.message);
        check.max_chars("message", message.as_deref(), MAX_MESSAGE_CHARS);

        check.finish()?;

        // every required field was checked above
        let (Some(name), Some(email), Some(phone), Some((birth_date, age))) =
            (name, email, phone, birth)
        else {
            return Err(vec![FieldError::new("name", "is required")]);
        };

        Ok(Application {
            name,
            kana,
            email,
            phone,
            birth_date,
            age,
            gender: clean(self.gender),
            prefecture: clean(self.prefecture),
            licenses: self
                .licenses
                .into_iter()
                .filter_map(|l| clean(Some(l)))
                .collect(),
            job_id: clean(self.job_id),
            job_title: clean(self.job_title),
            company_name: clean(self.company_name),
            job_location: None,
            job_salary: None,
            message,
            source: clean(self.source),
        })
    }
}

impl Application {
    /// Whether the job title or company must be looked up from the CMS.
    pub fn needs_job_details(&self) -> bool {
        self.job_id.is_some() && (self.job_title.is_none() || self.company_name.is_none())
    }

    /// Fills missing job details from the CMS entry. Submitted values win.
    pub fn fill_from_job(&mut self, job: &Job) {
        if self.job_title.is_none() {
            self.job_title = Some(job.title.clone());
        }
        if self.company_name.is_none() {
            self.company_name = job.company_name.clone();
        }
        self.job_location = job.location_label();
        self.job_salary = job.salary_label();
    }

    pub fn to_card(&self, id: Uuid, submitted_at: DateTime<Utc>) -> LarkMessage {
        let title = match &self.job_title {
            Some(job) => format!("【応募】{job}"),
            None => "【応募】一般応募".to_string(),
        };
        let birth = format!(
            "{} ({}歳)",
            self.birth_date.format("%Y年%m月%d日"),
            self.age
        );
        let licenses = (!self.licenses.is_empty()).then(|| self.licenses.join("、"));

        CardBuilder::new(title, HeaderColor::Blue)
            .field("氏名", Some(&self.name))
            .field("フリガナ", self.kana.as_deref())
            .field("電話番号", Some(&self.phone))
            .field("メールアドレス", Some(&self.email))
            .field("生年月日", Some(&birth))
            .field("性別", self.gender.as_deref())
            .field("居住地", self.prefecture.as_deref())
            .field("保有免許", licenses.as_deref())
            .divider()
            .field("企業名", self.company_name.as_deref())
            .field("求人名", self.job_title.as_deref())
            .field("求人ID", self.job_id.as_deref())
            .field("勤務地", self.job_location.as_deref())
            .field("給与", self.job_salary.as_deref())
            .long_field("メッセージ", self.message.as_deref())
            .note(footer(id, submitted_at, self.source.as_deref()))
            .build()
    }
}

pub(crate) fn footer(id: Uuid, submitted_at: DateTime<Utc>, source: Option<&str>) -> String {
    let received = match FixedOffset::east_opt(9 * 3600) {
        Some(jst) => submitted_at
            .with_timezone(&jst)
            .format("%Y-%m-%d %H:%M JST")
            .to_string(),
        None => submitted_at.format("%Y-%m-%d %H:%M UTC").to_string(),
    };
    match source {
        Some(source) => format!("受付ID: {id} / {received} / {source}"),
        None => format!("受付ID: {id} / {received}"),
    }
}
