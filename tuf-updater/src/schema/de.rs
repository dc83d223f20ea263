use crate::schema::decoded::{Decoded, Hex};
use crate::schema::key::Key;
use crate::schema::{MetaFile, TargetFile};
use serde::{de::Error as _, Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

const SNAPSHOT_JSON: &str = "snapshot.json";

/// Deserializes a `keys` map, recording in each key the ID it is listed under.
pub(super) fn deserialize_keys<'de, D>(
    deserializer: D,
) -> Result<HashMap<Decoded<Hex>, Key>, D::Error>
where
    D: Deserializer<'de>,
{
    struct Visitor;

    impl<'de> serde::de::Visitor<'de> for Visitor {
        type Value = HashMap<Decoded<Hex>, Key>;

        fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
            formatter.write_str("a map")
        }

        fn visit_map<M>(self, mut access: M) -> Result<Self::Value, M::Error>
        where
            M: serde::de::MapAccess<'de>,
        {
            let mut map = HashMap::new();
            while let Some((keyid, mut key)) = access.next_entry::<Decoded<Hex>, Key>()? {
                key.keyid = keyid.clone();
                if map.insert(keyid, key).is_some() {
                    return Err(M::Error::custom("duplicate key ID in keys map"));
                }
            }
            Ok(map)
        }
    }

    deserializer.deserialize_map(Visitor)
}

/// Deserializes a `targets` map, recording in each target the path it is listed under.
pub(super) fn deserialize_targets<'de, D>(
    deserializer: D,
) -> Result<HashMap<String, TargetFile>, D::Error>
where
    D: Deserializer<'de>,
{
    let mut targets = HashMap::<String, TargetFile>::deserialize(deserializer)?;
    for (path, target) in &mut targets {
        target.path.clone_from(path);
    }
    Ok(targets)
}

/// Serde's internally-tagged structs leave the `_type` field in the flattened extra map; strip it
/// so that it is not serialized twice.
pub(super) fn extra_skip_type<'de, D>(deserializer: D) -> Result<HashMap<String, Value>, D::Error>
where
    D: Deserializer<'de>,
{
    let mut map = HashMap::<String, Value>::deserialize(deserializer)?;
    map.remove("_type");
    Ok(map)
}

/// Timestamp's `meta` object holds exactly one entry, describing `snapshot.json`.
pub(super) mod snapshot_meta {
    use super::*;

    pub(crate) fn serialize<S>(meta: &MetaFile, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = HashMap::new();
        map.insert(SNAPSHOT_JSON, meta);
        map.serialize(serializer)
    }

    pub(crate) fn deserialize<'de, D>(deserializer: D) -> Result<MetaFile, D::Error>
    where
        D: Deserializer<'de>,
    {
        let mut map = HashMap::<String, MetaFile>::deserialize(deserializer)?;
        if map.len() != 1 {
            return Err(D::Error::custom(format!(
                "timestamp meta must only describe {SNAPSHOT_JSON}"
            )));
        }
        map.remove(SNAPSHOT_JSON)
            .ok_or_else(|| D::Error::missing_field(SNAPSHOT_JSON))
    }
}
