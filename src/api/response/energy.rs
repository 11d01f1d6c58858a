use super::lenient;
use serde::Deserialize;

#[derive(Deserialize)]
pub struct EnergyValue {
    pub date: String,
    #[serde(default, deserialize_with = "lenient")]
    pub value: Option<f64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Energy {
    #[serde(default, deserialize_with = "lenient")]
    pub time_unit: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub unit: Option<String>,
    #[serde(default)]
    pub values: Vec<EnergyValue>,
}

/* A site without history for the window omits `energy` altogether */
#[derive(Deserialize)]
pub struct GetEnergy {
    #[serde(default)]
    pub energy: Option<Energy>,
}
