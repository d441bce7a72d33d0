/// 缓存数据模型
/// 定义持久化到键值存储中的记录结构

// 限流与封禁记录
pub mod rate_limit;

// 重新导出常用类型
pub use rate_limit::{BlockRecord, Metadata, RateRecord};
