use super::lenient;
use serde::Deserialize;

#[derive(Deserialize)]
pub struct EnergyData {
    #[serde(default, deserialize_with = "lenient")]
    pub energy: Option<f64>,
}

#[derive(Deserialize)]
pub struct PowerData {
    #[serde(default, deserialize_with = "lenient")]
    pub power: Option<f64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Overview {
    #[serde(default, deserialize_with = "lenient")]
    pub last_update_time: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub life_time_data: Option<EnergyData>,
    #[serde(default, deserialize_with = "lenient")]
    pub last_year_data: Option<EnergyData>,
    #[serde(default, deserialize_with = "lenient")]
    pub last_month_data: Option<EnergyData>,
    #[serde(default, deserialize_with = "lenient")]
    pub last_day_data: Option<EnergyData>,
    #[serde(default, deserialize_with = "lenient")]
    pub current_power: Option<PowerData>,
}

#[derive(Deserialize)]
pub struct GetOverview {
    pub overview: Overview,
}
