use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Treat an explicit JSON `null` the same as a missing field.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// External ids arrive as strings or numbers (`CorpusId`); keep them all as strings.
pub(crate) fn external_ids<'de, D>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<BTreeMap<String, Value>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(raw
        .into_iter()
        .filter_map(|(namespace, value)| {
            let id = match value {
                Value::String(s) => s,
                Value::Number(n) => n.to_string(),
                _ => return None,
            };
            (!id.trim().is_empty()).then_some((namespace, id))
        })
        .collect())
}
