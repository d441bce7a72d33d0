use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cache::{KeyValueStore, StoreError};
use crate::error::AppError;
use crate::utils::is_valid_email;

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub email: String,
}

impl SignupRequest {
    /// 返回去除首尾空白后的邮箱
    pub fn validate(&self) -> Result<String, AppError> {
        let email = self.email.trim();
        if !is_valid_email(email) {
            return Err(AppError::Validation(
                "Please enter a valid email address".to_string(),
            ));
        }
        Ok(email.to_string())
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupResponse {
    pub email: String,
    pub already_exists: bool,
}

/// 订阅记录，以邮箱为键保存
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupRecord {
    pub email: String,
    pub timestamp: DateTime<Utc>,
    pub ip: String,
    pub user_agent: Option<String>,
    pub source: String,
    pub status: String,
}

impl SignupRecord {
    pub const SOURCE: &'static str = "works-page-signup";

    pub fn new(email: &str, ip: &str, user_agent: Option<String>, now: DateTime<Utc>) -> Self {
        Self {
            email: email.to_string(),
            timestamp: now,
            ip: ip.to_string(),
            user_agent,
            source: Self::SOURCE.to_string(),
            status: "stored".to_string(),
        }
    }

    pub async fn exists(store: &dyn KeyValueStore, email: &str) -> Result<bool, StoreError> {
        Ok(store.get(email).await?.is_some())
    }

    pub async fn save(&self, store: &dyn KeyValueStore) -> Result<(), AppError> {
        let json = serde_json::to_string(self)?;
        store.put(&self.email, &json, None).await?;
        Ok(())
    }
}
