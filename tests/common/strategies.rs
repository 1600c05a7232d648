use proptest::prelude::*;

/// Strategy for generating unit ids such as week or page names
pub fn unit_id_strategy() -> impl Strategy<Value = String> {
    "[A-Za-z][A-Za-z0-9 _-]{0,11}"
}

/// Strategy for generating a discovered unit list with per-unit record counts
pub fn unit_plan_strategy() -> impl Strategy<Value = Vec<(String, u64)>> {
    prop::collection::vec((unit_id_strategy(), 0u64..50), 1..12)
}

/// Strategy for generating record payloads
pub fn record_strategy() -> impl Strategy<Value = serde_json::Value> {
    (
        "[a-z]{1,8}",
        "[A-Za-z0-9 .,!?]{0,40}",
        any::<i64>(),
        any::<bool>(),
    )
        .prop_map(|(unit, title, number, flag)| {
            serde_json::json!({
                "unit": unit,
                "title": title,
                "number": number,
                "nested": {"flag": flag, "items": [number, title]}
            })
        })
}
