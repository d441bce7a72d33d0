// 缓存模块
// 包含键值存储后端、缓存键与持久化的记录格式

pub mod keys;
pub mod models;
pub mod store;

// 重新导出常用类型，方便其他模块使用
pub use models::rate_limit::{BlockRecord, Metadata, RateRecord};
pub use store::{KeyValueStore, MemoryStore, RedisStore, SharedStore, StoreError};
