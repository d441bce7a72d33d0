use std::sync::Arc;

use cache::{MemoryStore, RedisStore, SharedStore};
use config::{Config, StoreBackend};
use rate_limit::{PolicyTable, RateLimiter, SharedClock};

pub mod cache;
pub mod config;
pub mod error;
pub mod middleware;
pub mod rate_limit;
pub mod router;
pub mod routes;
pub mod utils;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    /// 订阅邮箱及其限流记录
    pub signup_store: Option<SharedStore>,
    /// 联系表单提交及其限流记录
    pub contact_store: Option<SharedStore>,
    /// 全局按 IP 限流记录
    pub rate_limit_store: Option<SharedStore>,
    pub policies: Arc<PolicyTable>,
    pub clock: SharedClock,
}

impl AppState {
    /// 基于给定存储构造限流器，限流记录与表单数据写在同一存储中
    pub fn limiter(&self, store: Option<SharedStore>) -> RateLimiter {
        RateLimiter::new(store, self.policies.clone(), self.clock.clone())
    }

    /// 按配置的存储后端构造应用状态
    pub fn from_config(config: Config, clock: SharedClock) -> Result<Self, redis::RedisError> {
        let (signup_store, contact_store, rate_limit_store) = match config.store_backend {
            StoreBackend::Redis => {
                let redis = Arc::new(redis::Client::open(
                    config.redis_url.as_deref().unwrap_or_default(),
                )?);
                let signup: SharedStore = Arc::new(RedisStore::with_namespace(redis.clone(), "signup"));
                let contact: SharedStore =
                    Arc::new(RedisStore::with_namespace(redis.clone(), "contact"));
                let limits: SharedStore = Arc::new(RedisStore::with_namespace(redis, "limits"));
                (Some(signup), Some(contact), Some(limits))
            }
            StoreBackend::Memory => {
                let signup: SharedStore = Arc::new(MemoryStore::with_clock(clock.clone()));
                let contact: SharedStore = Arc::new(MemoryStore::with_clock(clock.clone()));
                let limits: SharedStore = Arc::new(MemoryStore::with_clock(clock.clone()));
                (Some(signup), Some(contact), Some(limits))
            }
            StoreBackend::Disabled => (None, None, None),
        };

        Ok(Self {
            policies: Arc::new(config.rate_limits.clone()),
            config: Arc::new(config),
            signup_store,
            contact_store,
            rate_limit_store,
            clock,
        })
    }
}
