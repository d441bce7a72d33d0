/// 联系表单邮箱索引键前缀
const CONTACT_EMAIL_INDEX_PREFIX: &str = "email:";

/// 生成联系表单邮箱索引键: `email:{email}:{millis}`
pub fn contact_email_index_key(email: &str, millis: i64) -> String {
    format!("{}{}:{}", CONTACT_EMAIL_INDEX_PREFIX, email, millis)
}
