pub mod day_hour;
pub mod energy;
pub mod overview;
pub mod status;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

/// Deserialize an optional field, treating a value of the wrong shape as absent.
pub(crate) fn lenient<'de, D, T>(d: D) -> Result<Option<T>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(d)?;
    Ok(serde_json::from_value(value).ok())
}
