use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::clock::{Clock, SharedClock};
use super::error::RateLimitError;
use super::policy::{
    EscalatingPolicy, MissingStore, PolicyTable, RateLimitPolicy, SlidingWindowPolicy,
};
use crate::cache::keys::{block_key, rate_limit_key};
use crate::cache::{BlockRecord, KeyValueStore, Metadata, RateRecord, SharedStore};

/// 一次限流检查的结果
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitDecision {
    pub allowed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_minutes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_attempts: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reset_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_expiry: Option<DateTime<Utc>>,
}

impl RateLimitDecision {
    fn allowed() -> Self {
        Self {
            allowed: true,
            ..Self::default()
        }
    }

    fn throttled(remaining_minutes: u64, custom_message: Option<&str>) -> Self {
        Self {
            allowed: false,
            remaining_minutes: Some(remaining_minutes),
            error_message: Some(wait_message(custom_message, remaining_minutes)),
            ..Self::default()
        }
    }

    fn into_error(self) -> RateLimitError {
        RateLimitError::Exceeded {
            message: self
                .error_message
                .unwrap_or_else(|| "Rate limit exceeded".to_string()),
            retry_after_minutes: self.remaining_minutes,
        }
    }
}

/// 默认等待提示，剩余 1 分钟时使用单数
pub fn wait_message(custom: Option<&str>, remaining_minutes: u64) -> String {
    match custom {
        Some(message) => message.to_string(),
        None => format!(
            "Please wait {} minute{} before trying again.",
            remaining_minutes,
            if remaining_minutes == 1 { "" } else { "s" }
        ),
    }
}

// 两个时间点之间的分钟数，未来的时间戳按 0 计算
fn minutes_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    (to - from).num_milliseconds().max(0) as f64 / 60_000.0
}

fn ceil_minutes(minutes: f64) -> u64 {
    minutes.max(0.0).ceil() as u64
}

/// 基于键值存储的限流器
///
/// 限流器不缓存任何记录，每次检查都重新读取存储。
#[derive(Clone)]
pub struct RateLimiter {
    store: Option<SharedStore>,
    policies: Arc<PolicyTable>,
    clock: SharedClock,
}

impl RateLimiter {
    pub fn new(store: Option<SharedStore>, policies: Arc<PolicyTable>, clock: SharedClock) -> Self {
        Self {
            store,
            policies,
            clock,
        }
    }

    pub fn policies(&self) -> &PolicyTable {
        &self.policies
    }

    fn store(&self, on_missing: MissingStore) -> Result<Option<&dyn KeyValueStore>, RateLimitError> {
        match (&self.store, on_missing) {
            (Some(store), _) => Ok(Some(&**store)),
            (None, MissingStore::Allow) => Ok(None),
            (None, MissingStore::Reject) => Err(RateLimitError::StoreNotConfigured),
        }
    }

    /// 按策略类型检查，递增模式下检查本身会记录一次尝试
    pub async fn check(
        &self,
        identifier: &str,
        policy: &RateLimitPolicy,
    ) -> Result<RateLimitDecision, RateLimitError> {
        match policy {
            RateLimitPolicy::SlidingWindow(policy) => self.check_rate_limit(identifier, policy).await,
            RateLimitPolicy::Escalating(policy) => self.check_escalating(identifier, policy).await,
        }
    }

    /// 检查并记录；被限流时返回 [`RateLimitError::Exceeded`]
    pub async fn enforce(
        &self,
        identifier: &str,
        policy: &RateLimitPolicy,
        metadata: Metadata,
    ) -> Result<(), RateLimitError> {
        match policy {
            RateLimitPolicy::SlidingWindow(policy) => {
                self.enforce_rate_limit(identifier, policy, metadata).await
            }
            RateLimitPolicy::Escalating(policy) => {
                self.enforce_escalating(identifier, policy, metadata).await
            }
        }
    }

    /// 简单模式检查，只读
    pub async fn check_rate_limit(
        &self,
        identifier: &str,
        policy: &SlidingWindowPolicy,
    ) -> Result<RateLimitDecision, RateLimitError> {
        let Some(store) = self.store(policy.missing_store())? else {
            return Ok(RateLimitDecision::allowed());
        };

        let key = rate_limit_key(policy.key_prefix(), identifier);
        let Some(raw) = store.get(&key).await? else {
            return Ok(RateLimitDecision::allowed());
        };

        let record = match RateRecord::decode(&raw) {
            Ok(record) => record,
            Err(e) => {
                warn!(%key, error = %e, "malformed rate limit record, treating as absent");
                return Ok(RateLimitDecision::allowed());
            }
        };

        let elapsed = minutes_between(record.timestamp, self.clock.now());
        if elapsed < policy.window_minutes() {
            let remaining = ceil_minutes(policy.window_minutes() - elapsed);
            debug!(%key, remaining, "rate limit window still open");
            return Ok(RateLimitDecision::throttled(remaining, policy.error_message()));
        }

        Ok(RateLimitDecision::allowed())
    }

    /// 写入 `{timestamp, ...metadata}`，TTL 等于窗口长度，无条件覆盖
    pub async fn update_rate_limit(
        &self,
        identifier: &str,
        policy: &SlidingWindowPolicy,
        metadata: Metadata,
    ) -> Result<(), RateLimitError> {
        let Some(store) = self.store(policy.missing_store())? else {
            return Ok(());
        };

        let key = rate_limit_key(policy.key_prefix(), identifier);
        let record = RateRecord::new(self.clock.now()).with_metadata(metadata);
        store.put(&key, &record.encode()?, Some(policy.ttl())).await?;

        Ok(())
    }

    pub async fn enforce_rate_limit(
        &self,
        identifier: &str,
        policy: &SlidingWindowPolicy,
        metadata: Metadata,
    ) -> Result<(), RateLimitError> {
        let decision = self.check_rate_limit(identifier, policy).await?;
        if !decision.allowed {
            info!(prefix = policy.key_prefix(), "rate limit exceeded");
            return Err(decision.into_error());
        }

        self.update_rate_limit(identifier, policy, metadata).await
    }

    /// 递增模式检查，放行时记录本次尝试
    pub async fn check_escalating(
        &self,
        identifier: &str,
        policy: &EscalatingPolicy,
    ) -> Result<RateLimitDecision, RateLimitError> {
        self.record_attempt(identifier, policy, Metadata::new()).await
    }

    pub async fn enforce_escalating(
        &self,
        identifier: &str,
        policy: &EscalatingPolicy,
        metadata: Metadata,
    ) -> Result<(), RateLimitError> {
        let decision = self.record_attempt(identifier, policy, metadata).await?;
        if !decision.allowed {
            return Err(decision.into_error());
        }
        Ok(())
    }

    async fn record_attempt(
        &self,
        identifier: &str,
        policy: &EscalatingPolicy,
        metadata: Metadata,
    ) -> Result<RateLimitDecision, RateLimitError> {
        let Some(store) = self.store(policy.missing_store())? else {
            return Ok(RateLimitDecision::allowed());
        };
        let now = self.clock.now();

        let blocked_key = block_key(policy.block_prefix(), identifier);
        if let Some(raw) = store.get(&blocked_key).await? {
            match BlockRecord::decode(&raw) {
                Ok(block) if block.is_active(now) => {
                    debug!(key = %blocked_key, expires_at = %block.expires_at, "identifier is blocked");
                    return Ok(blocked(policy, block.expires_at, now));
                }
                Ok(_) => {
                    debug!(key = %blocked_key, "removing expired block record");
                    store.delete(&blocked_key).await?;
                }
                Err(e) => {
                    warn!(key = %blocked_key, error = %e, "malformed block record, removing");
                    store.delete(&blocked_key).await?;
                }
            }
        }

        let key = rate_limit_key(policy.key_prefix(), identifier);
        let window = policy.window();
        let fresh = || (RateRecord::open_window(now), now + window);
        let (mut record, window_expiry) = match store.get(&key).await? {
            Some(raw) => match RateRecord::decode(&raw) {
                Ok(record) => match record.window_start().checked_add_signed(window) {
                    Some(expiry) if now < expiry => (record, expiry),
                    Some(_) => fresh(),
                    None => {
                        warn!(%key, "rate limit window out of range, starting new window");
                        fresh()
                    }
                },
                Err(e) => {
                    warn!(%key, error = %e, "malformed rate limit record, starting new window");
                    fresh()
                }
            },
            None => fresh(),
        };

        let attempts = record.attempts.unwrap_or(0);
        if attempts >= policy.max_attempts() {
            let expires_at = now + policy.block_duration();
            let block = BlockRecord {
                expires_at,
                reason: format!(
                    "exceeded {} attempts within {} minutes",
                    policy.max_attempts(),
                    policy.window_minutes()
                ),
            };
            store
                .put(&blocked_key, &block.encode()?, Some(policy.block_ttl()))
                .await?;
            warn!(key = %blocked_key, %expires_at, attempts, "identifier blocked after repeated attempts");
            return Ok(blocked(policy, expires_at, now));
        }

        let attempts = attempts + 1;
        record.timestamp = now;
        record.attempts = Some(attempts);
        record.window_start = Some(record.window_start());
        record.window_expiry = Some(window_expiry);
        let record = record.with_metadata(metadata);
        store.put(&key, &record.encode()?, Some(policy.window_ttl())).await?;

        Ok(RateLimitDecision {
            allowed: true,
            remaining_attempts: Some(policy.max_attempts() - attempts),
            reset_time: Some(window_expiry),
            ..RateLimitDecision::default()
        })
    }
}

fn blocked(policy: &EscalatingPolicy, expires_at: DateTime<Utc>, now: DateTime<Utc>) -> RateLimitDecision {
    let remaining = ceil_minutes(minutes_between(now, expires_at));
    RateLimitDecision {
        block_expiry: Some(expires_at),
        ..RateLimitDecision::throttled(remaining, policy.error_message())
    }
}
