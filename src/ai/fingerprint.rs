use serde_json::Value;
use sha2::{Digest, Sha256};

/// 计算请求负载的指纹，作为响应缓存键。
///
/// serde_json 的对象默认用 BTreeMap 存储，序列化时键总是有序，
/// 因此字段顺序不同的同构请求得到相同指纹。
pub fn fingerprint(payload: &Value) -> String {
    let mut hasher = Sha256::new();
    hasher.update(payload.to_string().as_bytes());
    format!("{:x}", hasher.finalize())
}
