use std::time::Duration as StdDuration;

use chrono::Duration;
use thiserror::Error;

use crate::cache::keys::DEFAULT_BLOCK_PREFIX;

#[derive(Debug, Error, PartialEq)]
pub enum PolicyError {
    #[error("window must be positive and at most one year in minutes, got {0}")]
    InvalidWindow(f64),
    #[error("max attempts must be greater than zero")]
    InvalidMaxAttempts,
    #[error("block duration must be positive and at most one year in minutes, got {0}")]
    InvalidBlockDuration(f64),
    #[error("key prefix must not be empty")]
    EmptyPrefix,
}

/// 存储未配置时的行为
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingStore {
    /// 拒绝并返回 `StoreNotConfigured`
    Reject,
    /// 直接放行
    Allow,
}

/// 窗口和封禁时长上限（一年），保证与任意当前时间相加不会溢出
pub const MAX_POLICY_MINUTES: f64 = 366.0 * 24.0 * 60.0;

fn valid_minutes(minutes: f64) -> bool {
    minutes.is_finite() && minutes > 0.0 && minutes <= MAX_POLICY_MINUTES
}

fn minutes_to_duration(minutes: f64) -> Duration {
    Duration::milliseconds((minutes * 60_000.0).round() as i64)
}

fn minutes_to_ttl(minutes: f64) -> StdDuration {
    StdDuration::from_millis((minutes * 60_000.0).round() as u64)
}

/// 简单滑动窗口策略：每个窗口内只接受一次操作
#[derive(Debug, Clone, PartialEq)]
pub struct SlidingWindowPolicy {
    window_minutes: f64,
    key_prefix: String,
    error_message: Option<String>,
    on_missing_store: MissingStore,
}

impl SlidingWindowPolicy {
    pub fn new(key_prefix: impl Into<String>, window_minutes: f64) -> Result<Self, PolicyError> {
        let key_prefix = key_prefix.into();
        if key_prefix.is_empty() {
            return Err(PolicyError::EmptyPrefix);
        }
        if !valid_minutes(window_minutes) {
            return Err(PolicyError::InvalidWindow(window_minutes));
        }
        Ok(Self::preset(key_prefix, window_minutes, None))
    }

    fn preset(key_prefix: impl Into<String>, window_minutes: f64, message: Option<&str>) -> Self {
        Self {
            window_minutes,
            key_prefix: key_prefix.into(),
            error_message: message.map(str::to_string),
            on_missing_store: MissingStore::Reject,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }

    pub fn on_missing_store(mut self, behavior: MissingStore) -> Self {
        self.on_missing_store = behavior;
        self
    }

    pub fn window_minutes(&self) -> f64 {
        self.window_minutes
    }

    pub fn key_prefix(&self) -> &str {
        &self.key_prefix
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn missing_store(&self) -> MissingStore {
        self.on_missing_store
    }

    pub fn window(&self) -> Duration {
        minutes_to_duration(self.window_minutes)
    }

    /// 记录在存储中的存活时间，等于窗口长度
    pub fn ttl(&self) -> StdDuration {
        minutes_to_ttl(self.window_minutes)
    }
}

/// 递增封禁策略：窗口内最多 `max_attempts` 次，超出后封禁 `block_duration_minutes`
#[derive(Debug, Clone, PartialEq)]
pub struct EscalatingPolicy {
    max_attempts: u32,
    window_minutes: f64,
    block_duration_minutes: f64,
    key_prefix: String,
    block_prefix: String,
    error_message: Option<String>,
    on_missing_store: MissingStore,
}

impl EscalatingPolicy {
    pub fn new(
        key_prefix: impl Into<String>,
        max_attempts: u32,
        window_minutes: f64,
        block_duration_minutes: f64,
    ) -> Result<Self, PolicyError> {
        let key_prefix = key_prefix.into();
        if key_prefix.is_empty() {
            return Err(PolicyError::EmptyPrefix);
        }
        if max_attempts == 0 {
            return Err(PolicyError::InvalidMaxAttempts);
        }
        if !valid_minutes(window_minutes) {
            return Err(PolicyError::InvalidWindow(window_minutes));
        }
        if !valid_minutes(block_duration_minutes) {
            return Err(PolicyError::InvalidBlockDuration(block_duration_minutes));
        }
        Ok(Self::preset(
            key_prefix,
            max_attempts,
            window_minutes,
            block_duration_minutes,
        ))
    }

    fn preset(
        key_prefix: impl Into<String>,
        max_attempts: u32,
        window_minutes: f64,
        block_duration_minutes: f64,
    ) -> Self {
        Self {
            max_attempts,
            window_minutes,
            block_duration_minutes,
            key_prefix: key_prefix.into(),
            block_prefix: DEFAULT_BLOCK_PREFIX.to_string(),
            error_message: None,
            on_missing_store: MissingStore::Allow,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }

    /// 封禁记录键前缀，默认 `blocked`；多个递增策略需要互相独立时使用
    pub fn with_block_prefix(mut self, prefix: impl Into<String>) -> Result<Self, PolicyError> {
        let prefix = prefix.into();
        if prefix.is_empty() {
            return Err(PolicyError::EmptyPrefix);
        }
        self.block_prefix = prefix;
        Ok(self)
    }

    pub fn on_missing_store(mut self, behavior: MissingStore) -> Self {
        self.on_missing_store = behavior;
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn window_minutes(&self) -> f64 {
        self.window_minutes
    }

    pub fn key_prefix(&self) -> &str {
        &self.key_prefix
    }

    pub fn block_prefix(&self) -> &str {
        &self.block_prefix
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn missing_store(&self) -> MissingStore {
        self.on_missing_store
    }

    pub fn window(&self) -> Duration {
        minutes_to_duration(self.window_minutes)
    }

    pub fn window_ttl(&self) -> StdDuration {
        minutes_to_ttl(self.window_minutes)
    }

    pub fn block_duration(&self) -> Duration {
        minutes_to_duration(self.block_duration_minutes)
    }

    pub fn block_ttl(&self) -> StdDuration {
        minutes_to_ttl(self.block_duration_minutes)
    }
}

/// 带标签的策略，限流器按类型选择判定规则
#[derive(Debug, Clone, PartialEq)]
pub enum RateLimitPolicy {
    SlidingWindow(SlidingWindowPolicy),
    Escalating(EscalatingPolicy),
}

impl From<SlidingWindowPolicy> for RateLimitPolicy {
    fn from(policy: SlidingWindowPolicy) -> Self {
        Self::SlidingWindow(policy)
    }
}

impl From<EscalatingPolicy> for RateLimitPolicy {
    fn from(policy: EscalatingPolicy) -> Self {
        Self::Escalating(policy)
    }
}

pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;
pub const DEFAULT_WINDOW_MINUTES: f64 = 15.0;
pub const DEFAULT_BLOCK_DURATION_MINUTES: f64 = 60.0;

/// 进程启动时确定的限流策略表
#[derive(Debug, Clone, PartialEq)]
pub struct PolicyTable {
    pub contact_email: SlidingWindowPolicy,
    pub contact_ip: SlidingWindowPolicy,
    pub signup_email: SlidingWindowPolicy,
    pub signup_ip: SlidingWindowPolicy,
    /// 全局按 IP 限流使用的递增策略
    pub escalating: EscalatingPolicy,
}

impl PolicyTable {
    pub fn with_escalating(mut self, escalating: EscalatingPolicy) -> Self {
        self.escalating = escalating;
        self
    }
}

impl Default for PolicyTable {
    fn default() -> Self {
        Self {
            contact_email: SlidingWindowPolicy::preset(
                "contact_email_rate_limit",
                5.0,
                Some(
                    "You can only send one message every 5 minutes. Please wait before sending another message.",
                ),
            ),
            contact_ip: SlidingWindowPolicy::preset(
                "contact_ip_rate_limit",
                2.0,
                Some("Too many contact requests from your location. Please wait before trying again."),
            ),
            signup_email: SlidingWindowPolicy::preset(
                "signup_email_rate_limit",
                10.0,
                Some("You can only sign up once every 10 minutes. Please wait before trying again."),
            ),
            signup_ip: SlidingWindowPolicy::preset(
                "signup_ip_rate_limit",
                5.0,
                Some("Too many signup requests from your location. Please wait before trying again."),
            ),
            escalating: EscalatingPolicy::preset(
                "rate_limit",
                DEFAULT_MAX_ATTEMPTS,
                DEFAULT_WINDOW_MINUTES,
                DEFAULT_BLOCK_DURATION_MINUTES,
            ),
        }
    }
}
