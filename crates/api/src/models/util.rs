use serde::{Deserialize, Deserializer, Serializer};

/// Boolean flag carried as `0`/`1` on the wire. `true`/`false` are accepted too.
pub mod serde_flag {
    use super::*;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Int(i64),
        Bool(bool),
    }

    pub fn serialize<S>(value: &bool, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u8(u8::from(*value))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<bool, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Flag::deserialize(deserializer)? {
            Flag::Int(v) => v != 0,
            Flag::Bool(v) => v,
        })
    }
}

/// Repository-relative path with `/` separators, as used in store keys.
pub fn to_unix_path(path: &str) -> String {
    let unix = path.replace('\\', "/");
    unix.trim_start_matches("./").to_string()
}
