use super::lenient;
use serde::Deserialize;
use serde_json::Value;

/* Diversion device (eddi) */
#[derive(Deserialize)]
pub struct Eddi {
    #[serde(default, deserialize_with = "lenient")]
    pub sno: Option<u64>,
    #[serde(default, deserialize_with = "lenient")]
    pub div: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub che: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub sta: Option<u64>,
    #[serde(default, deserialize_with = "lenient")]
    pub tp1: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub tp2: Option<f64>,
}

/* Harvester (harvi) */
#[derive(Deserialize)]
pub struct Harvi {
    #[serde(default, deserialize_with = "lenient")]
    pub sno: Option<u64>,
    #[serde(default, deserialize_with = "lenient")]
    pub ectp1: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub ectp2: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub ectp3: Option<f64>,
}

pub enum StatusElement {
    Diversion(Vec<Eddi>),
    Harvester(Vec<Harvi>),
    Other,
}

impl<'de> serde::Deserialize<'de> for StatusElement {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(d)?;

        /* Elements carry a single key naming the device family */
        match (value.get("eddi"), value.get("harvi")) {
            (Some(eddi), _) if !eddi.is_null() => serde_json::from_value(eddi.to_owned())
                .map(StatusElement::Diversion)
                .map_err(serde::de::Error::custom),
            (_, Some(harvi)) if !harvi.is_null() => serde_json::from_value(harvi.to_owned())
                .map(StatusElement::Harvester)
                .map_err(serde::de::Error::custom),
            _ => Ok(StatusElement::Other),
        }
    }
}

#[derive(Deserialize)]
#[serde(transparent)]
pub struct GetStatus {
    pub elements: Vec<StatusElement>,
}
