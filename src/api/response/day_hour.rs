use super::lenient;
use crate::model::HourlyTotal;
use serde::Deserialize;
use serde_json::{Map, Value};

/// One hourly bucket as sent; absent or malformed fields count as zero.
#[derive(Deserialize)]
struct Bucket {
    #[serde(default, deserialize_with = "lenient")]
    hr: Option<u32>,
    #[serde(default, deserialize_with = "lenient")]
    imp: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    exp: Option<f64>,
}

impl From<Bucket> for HourlyTotal {
    fn from(bucket: Bucket) -> Self {
        HourlyTotal {
            hour: bucket.hr.unwrap_or(0),
            import_value: bucket.imp.unwrap_or(0.0),
            export_value: bucket.exp.unwrap_or(0.0),
        }
    }
}

/// Hourly totals, keyed upstream by device (`U<serial>`). When several keys
/// carry a list, the last one in document order wins.
pub struct GetDayHour {
    pub totals: Vec<HourlyTotal>,
}

impl<'de> serde::Deserialize<'de> for GetDayHour {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let map = Map::<String, Value>::deserialize(d)?;

        let list = map
            .into_iter()
            .filter_map(|(_, v)| match v {
                Value::Array(list) => Some(list),
                _ => None,
            })
            .last()
            .ok_or_else(|| serde::de::Error::missing_field("U<serial>"))?;

        let totals = list
            .into_iter()
            .filter_map(|item| {
                if !item.is_object() {
                    log::warn!("Skipping hourly bucket {}", item);
                    return None;
                }
                serde_json::from_value::<Bucket>(item)
                    .map(HourlyTotal::from)
                    .map_err(|e| log::warn!("Skipping hourly bucket: {}", e))
                    .ok()
            })
            .collect();

        Ok(GetDayHour { totals })
    }
}
