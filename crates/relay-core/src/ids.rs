// Short opaque ids for request tagging and generated tool-call ids

/// 8-character id from a v4 UUID, matching the caller-visible log tags.
pub fn short_id() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    id[..8].to_string()
}
