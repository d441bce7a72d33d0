use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use redis::{AsyncCommands, Client as RedisClient};

use super::{KeyValueStore, StoreError};

/// Redis 键值存储
///
/// 可选的命名空间让多个逻辑存储共用同一个 Redis 实例。
#[derive(Clone)]
pub struct RedisStore {
    redis: Arc<RedisClient>,
    namespace: Option<String>,
}

impl RedisStore {
    pub fn new(redis: Arc<RedisClient>) -> Self {
        Self {
            redis,
            namespace: None,
        }
    }

    pub fn with_namespace(redis: Arc<RedisClient>, namespace: impl Into<String>) -> Self {
        Self {
            redis,
            namespace: Some(namespace.into()),
        }
    }

    fn redis_key(&self, key: &str) -> String {
        match &self.namespace {
            Some(namespace) => format!("{}:{}", namespace, key),
            None => key.to_string(),
        }
    }
}

// SET EX 只接受整秒，向上取整且至少为 1
fn ttl_secs(ttl: Duration) -> u64 {
    (ttl.as_secs_f64().ceil() as u64).max(1)
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.redis.get_multiplexed_async_connection().await?;

        let result: Option<String> = conn.get(self.redis_key(key)).await?;
        Ok(result)
    }

    async fn put(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), StoreError> {
        let mut conn = self.redis.get_multiplexed_async_connection().await?;

        let redis_key = self.redis_key(key);
        match ttl {
            Some(ttl) => {
                let _: () = conn.set_ex(redis_key, value, ttl_secs(ttl)).await?;
            }
            None => {
                let _: () = conn.set(redis_key, value).await?;
            }
        }

        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut conn = self.redis.get_multiplexed_async_connection().await?;

        let _: () = conn.del(self.redis_key(key)).await?;
        Ok(())
    }
}
