use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::cache::KeyValueStore;
use crate::cache::keys::contact_email_index_key;
use crate::error::AppError;
use crate::utils::is_valid_email;

const MAX_NAME_CHARS: usize = 100;
const MAX_COMPANY_CHARS: usize = 100;
const MIN_MESSAGE_CHARS: usize = 10;
const MAX_MESSAGE_CHARS: usize = 2000;

#[derive(Debug, Deserialize)]
pub struct ContactRequest {
    pub name: String,
    pub email: String,
    pub company: Option<String>,
    pub message: String,
}

fn invalid(message: &str) -> AppError {
    AppError::Validation(message.to_string())
}

impl ContactRequest {
    pub fn validate(mut self) -> Result<Self, AppError> {
        let name_len = self.name.chars().count();
        if name_len == 0 {
            return Err(invalid("Name is required"));
        }
        if name_len > MAX_NAME_CHARS {
            return Err(invalid("Name must be less than 100 characters"));
        }

        self.email = self.email.trim().to_string();
        if !is_valid_email(&self.email) {
            return Err(invalid("Please enter a valid email address"));
        }

        // 空字符串视为未填写
        self.company = self.company.filter(|c| !c.is_empty());
        if self
            .company
            .as_ref()
            .is_some_and(|c| c.chars().count() > MAX_COMPANY_CHARS)
        {
            return Err(invalid("Company name must be less than 100 characters"));
        }

        let message_len = self.message.chars().count();
        if message_len < MIN_MESSAGE_CHARS {
            return Err(invalid("Message must be at least 10 characters"));
        }
        if message_len > MAX_MESSAGE_CHARS {
            return Err(invalid("Message must be less than 2000 characters"));
        }

        Ok(self)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactResponse {
    pub contact_id: String,
}

/// 联系表单提交，以提交 ID 为键保存
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactRecord {
    pub id: String,
    pub name: String,
    pub email: String,
    pub company: Option<String>,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub ip: String,
    pub user_agent: Option<String>,
    pub source: String,
    pub status: String,
}

/// 按邮箱查找提交的索引项
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactIndexEntry {
    pub contact_id: String,
    pub timestamp: DateTime<Utc>,
}

/// 生成提交 ID: `{毫秒时间戳}-{9 位随机字符}`
pub fn new_contact_id(now: DateTime<Utc>) -> String {
    let random = Uuid::new_v4().simple().to_string();
    format!("{}-{}", now.timestamp_millis(), &random[..9])
}

impl ContactRecord {
    pub const SOURCE: &'static str = "contact-page";

    pub fn new(
        req: ContactRequest,
        ip: &str,
        user_agent: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: new_contact_id(now),
            name: req.name,
            email: req.email,
            company: req.company,
            message: req.message,
            timestamp: now,
            ip: ip.to_string(),
            user_agent,
            source: Self::SOURCE.to_string(),
            status: "new".to_string(),
        }
    }

    /// 保存提交，并写入邮箱索引
    pub async fn save(&self, store: &dyn KeyValueStore) -> Result<(), AppError> {
        let json = serde_json::to_string(self)?;
        store.put(&self.id, &json, None).await?;

        let index_key = contact_email_index_key(&self.email, self.timestamp.timestamp_millis());
        let index = ContactIndexEntry {
            contact_id: self.id.clone(),
            timestamp: self.timestamp,
        };
        store
            .put(&index_key, &serde_json::to_string(&index)?, None)
            .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> ContactRequest {
        ContactRequest {
            name: "Ada".into(),
            email: " ada@example.com ".into(),
            company: Some(String::new()),
            message: "Hello there, I'd like a quote.".into(),
        }
    }

    fn rejection(req: ContactRequest) -> String {
        match req.validate() {
            Err(AppError::Validation(message)) => message,
            other => panic!("expected validation error, got {:?}", other.map(|r| r.name)),
        }
    }

    #[test]
    fn valid_request_is_normalized() {
        let req = request().validate().unwrap();
        assert_eq!(req.email, "ada@example.com");
        assert_eq!(req.company, None);
    }

    #[test]
    fn invalid_fields_are_reported() {
        assert_eq!(
            rejection(ContactRequest {
                name: String::new(),
                ..request()
            }),
            "Name is required"
        );
        assert_eq!(
            rejection(ContactRequest {
                name: "x".repeat(101),
                ..request()
            }),
            "Name must be less than 100 characters"
        );
        assert_eq!(
            rejection(ContactRequest {
                company: Some("c".repeat(101)),
                ..request()
            }),
            "Company name must be less than 100 characters"
        );
        assert_eq!(
            rejection(ContactRequest {
                message: "short".into(),
                ..request()
            }),
            "Message must be at least 10 characters"
        );
        assert_eq!(
            rejection(ContactRequest {
                email: "nope".into(),
                ..request()
            }),
            "Please enter a valid email address"
        );
    }

    #[test]
    fn contact_id_has_millis_and_random_suffix() {
        let now = Utc::now();
        let id = new_contact_id(now);
        let (millis, suffix) = id.split_once('-').unwrap();

        assert_eq!(millis, now.timestamp_millis().to_string());
        assert_eq!(suffix.len(), 9);
    }
}
