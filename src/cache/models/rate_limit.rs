use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// 调用方附加到限流记录上的任意字段
pub type Metadata = Map<String, Value>;

// 限流器自身的字段，调用方元数据不能覆盖
const RESERVED_FIELDS: [&str; 4] = ["timestamp", "attempts", "windowStart", "windowExpiry"];

/// 限流记录，存放在 `{keyPrefix}:{identifier}` 下
///
/// 简单模式只写入 `timestamp`；递增模式额外维护 `attempts`、`windowStart`
/// 和 `windowExpiry`。
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RateRecord {
    /// 最近一次被接受的操作时间
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attempts: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window_start: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window_expiry: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub metadata: Metadata,
}

impl RateRecord {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            timestamp: now,
            attempts: None,
            window_start: None,
            window_expiry: None,
            metadata: Metadata::new(),
        }
    }

    /// 开启一个新的计数窗口
    pub fn open_window(now: DateTime<Utc>) -> Self {
        Self {
            attempts: Some(0),
            window_start: Some(now),
            ..Self::new(now)
        }
    }

    /// 合并调用方元数据，保留字段会被忽略
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        for (key, value) in metadata {
            if RESERVED_FIELDS.contains(&key.as_str()) {
                tracing::debug!(field = %key, "ignoring reserved rate limit metadata field");
                continue;
            }
            self.metadata.insert(key, value);
        }
        self
    }

    /// 窗口起点；简单模式写入的记录没有 `windowStart`，以 `timestamp` 代替
    pub fn window_start(&self) -> DateTime<Utc> {
        self.window_start.unwrap_or(self.timestamp)
    }

    pub fn decode(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// 封禁记录，存放在 `{blockPrefix}:{identifier}` 下
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BlockRecord {
    pub expires_at: DateTime<Utc>,
    pub reason: String,
}

impl BlockRecord {
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }

    pub fn decode(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn metadata_is_flattened_and_cannot_override_timestamp() {
        let now = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
        let mut metadata = Metadata::new();
        metadata.insert("contactId".into(), json!("123"));
        metadata.insert("timestamp".into(), json!("1999-01-01T00:00:00Z"));

        let record = RateRecord::new(now).with_metadata(metadata);
        let value: Value = serde_json::from_str(&record.encode().unwrap()).unwrap();

        assert_eq!(value["contactId"], "123");
        assert_eq!(value["timestamp"], "2025-03-01T12:00:00Z");
        assert!(value.get("attempts").is_none());
    }

    #[test]
    fn decodes_records_written_by_other_tooling() {
        let raw = r#"{"timestamp":"2025-03-01T12:00:00.000Z","source":"test"}"#;
        let record = RateRecord::decode(raw).unwrap();

        assert_eq!(record.window_start(), Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap());
        assert_eq!(record.metadata["source"], "test");
    }

    #[test]
    fn malformed_records_fail_to_decode() {
        assert!(RateRecord::decode("not json").is_err());
        assert!(RateRecord::decode(r#"{"timestamp":"yesterday"}"#).is_err());
        assert!(BlockRecord::decode(r#"{"reason":"x"}"#).is_err());
    }
}
