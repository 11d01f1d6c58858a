use chrono::{Datelike, Local, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

pub type Wh = f64;
pub type Watts = f64;
pub type KWh = f64;

/// Opaque per-type settings, persisted verbatim.
pub type Settings = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProviderId(String);

impl ProviderId {
    pub fn generate() -> Self {
        ProviderId(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ProviderId {
    fn from(id: &str) -> Self {
        ProviderId(id.to_owned())
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProviderType {
    #[serde(rename = "solarEdge")]
    SolarEdgeV1,
    #[serde(rename = "myEnergi")]
    MyEnergi,
}

impl ProviderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderType::SolarEdgeV1 => "solarEdge",
            ProviderType::MyEnergi => "myEnergi",
        }
    }

    /// Settings keys that must be non-empty before polling may start.
    pub fn required_settings(&self) -> &'static [&'static str] {
        match self {
            ProviderType::SolarEdgeV1 => &[SolarEdgeSettings::API_KEY, SolarEdgeSettings::SITE_ID],
            ProviderType::MyEnergi => &[MyEnergiSettings::DEVICE_ID, MyEnergiSettings::PASSWORD],
        }
    }

    /// Key names written by older releases, paired with their current name.
    fn legacy_settings(&self) -> &'static [(&'static str, &'static str)] {
        match self {
            ProviderType::SolarEdgeV1 => &[
                ("key", SolarEdgeSettings::API_KEY),
                ("site", SolarEdgeSettings::SITE_ID),
            ],
            ProviderType::MyEnergi => &[("device", MyEnergiSettings::DEVICE_ID)],
        }
    }

    pub fn missing_settings(&self, settings: &Settings) -> Vec<&'static str> {
        self.required_settings()
            .iter()
            .copied()
            .filter(|key| settings.get(*key).map_or(true, |v| v.trim().is_empty()))
            .collect()
    }
}

impl fmt::Display for ProviderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderType {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "solarEdge" | "solar-edge" => Ok(ProviderType::SolarEdgeV1),
            "myEnergi" | "my-energi" => Ok(ProviderType::MyEnergi),
            other => Err(crate::Error::UnknownProviderType(other.to_owned())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "StoredInstance")]
pub struct ProviderInstance {
    pub id: ProviderId,
    #[serde(rename = "type")]
    pub provider_type: ProviderType,
    pub settings: Settings,
}

/// Persisted form, which may still use the legacy `credentials` field and
/// legacy key names.
#[derive(Deserialize)]
struct StoredInstance {
    id: ProviderId,
    #[serde(rename = "type")]
    provider_type: ProviderType,
    #[serde(default, alias = "credentials")]
    settings: Settings,
}

impl From<StoredInstance> for ProviderInstance {
    fn from(stored: StoredInstance) -> Self {
        let mut settings = stored.settings;
        for (legacy, current) in stored.provider_type.legacy_settings() {
            if let Some(value) = settings.remove(*legacy) {
                settings.entry((*current).to_owned()).or_insert(value);
            }
        }

        ProviderInstance {
            id: stored.id,
            provider_type: stored.provider_type,
            settings,
        }
    }
}

impl ProviderInstance {
    pub fn new(provider_type: ProviderType) -> Self {
        ProviderInstance {
            id: ProviderId::generate(),
            provider_type,
            settings: Settings::new(),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.provider_type.missing_settings(&self.settings).is_empty()
    }
}

fn non_empty(settings: &Settings, key: &str) -> Option<String> {
    settings
        .get(key)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(String::from)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolarEdgeSettings {
    pub api_key: String,
    pub site_id: String,
}

impl SolarEdgeSettings {
    pub const API_KEY: &'static str = "apiKey";
    pub const SITE_ID: &'static str = "siteId";

    pub fn from_settings(settings: &Settings) -> Option<Self> {
        Some(SolarEdgeSettings {
            api_key: non_empty(settings, Self::API_KEY)?,
            site_id: non_empty(settings, Self::SITE_ID)?,
        })
    }

    pub fn into_settings(self) -> Settings {
        Settings::from([
            (Self::API_KEY.to_owned(), self.api_key),
            (Self::SITE_ID.to_owned(), self.site_id),
        ])
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MyEnergiSettings {
    pub device_id: String,
    pub password: String,
}

impl MyEnergiSettings {
    pub const DEVICE_ID: &'static str = "deviceId";
    pub const PASSWORD: &'static str = "password";

    pub fn from_settings(settings: &Settings) -> Option<Self> {
        Some(MyEnergiSettings {
            device_id: non_empty(settings, Self::DEVICE_ID)?,
            password: non_empty(settings, Self::PASSWORD)?,
        })
    }

    pub fn into_settings(self) -> Settings {
        Settings::from([
            (Self::DEVICE_ID.to_owned(), self.device_id),
            (Self::PASSWORD.to_owned(), self.password),
        ])
    }
}

/// Calendar reference captured once when a provider starts polling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Anchor {
    pub date: NaiveDate,
    /// Local time minus UTC, in minutes.
    pub offset_minutes: i32,
}

impl Anchor {
    pub fn new(date: NaiveDate, offset_minutes: i32) -> Self {
        Anchor {
            date,
            offset_minutes,
        }
    }

    pub fn now() -> Self {
        let now = Local::now();
        Anchor {
            date: now.date_naive(),
            offset_minutes: now.offset().local_minus_utc() / 60,
        }
    }

    pub fn month_start(&self) -> NaiveDate {
        self.date.with_day(1).unwrap_or(self.date)
    }

    pub fn month_end(&self) -> NaiveDate {
        let (year, month) = if self.date.month() == 12 {
            (self.date.year() + 1, 1)
        } else {
            (self.date.year(), self.date.month() + 1)
        };
        NaiveDate::from_ymd_opt(year, month, 1)
            .and_then(|next| next.pred_opt())
            .unwrap_or(self.date)
    }

    /// Day whose hourly buckets overlap the anchor's local day, if any.
    pub fn adjacent_day(&self) -> Option<NaiveDate> {
        match self.offset_minutes {
            0 => None,
            o if o > 0 => self.date.pred_opt(),
            _ => self.date.succ_opt(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnergySample {
    pub date: NaiveDateTime,
    pub value: Option<Wh>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SolarEdgeSnapshot {
    pub current_power: Option<Watts>,
    pub day_energy: Option<Wh>,
    pub month_energy: Option<Wh>,
    pub year_energy: Option<Wh>,
    pub lifetime_energy: Option<Wh>,
    pub last_update: Option<NaiveDateTime>,
    pub samples: Vec<EnergySample>,
}

/// Hourly import/export totals as reported by the device, in joules.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HourlyTotal {
    #[serde(rename = "hr")]
    pub hour: u32,
    #[serde(rename = "imp")]
    pub import_value: f64,
    #[serde(rename = "exp")]
    pub export_value: f64,
}

impl HourlyTotal {
    pub fn import_wh(&self) -> Wh {
        self.import_value / 3600.0
    }

    pub fn export_wh(&self) -> Wh {
        self.export_value / 3600.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, num_derive::FromPrimitive)]
pub enum DiversionStatus {
    Paused = 1,
    Diverting = 3,
    Boost = 4,
    MaxTemperatureReached = 5,
    Stopped = 6,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiversionReading {
    pub serial: Option<u64>,
    pub diverted_power: Option<Watts>,
    pub energy_today: Option<KWh>,
    pub status: Option<DiversionStatus>,
    pub tank_temperatures: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HarvesterReading {
    pub serial: Option<u64>,
    /// Clamp readings; positive is import.
    pub clamp_powers: Vec<Watts>,
}

impl HarvesterReading {
    pub fn grid_power(&self) -> Option<Watts> {
        self.clamp_powers.first().copied()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MyEnergiSnapshot {
    pub diversion: Option<DiversionReading>,
    pub harvester: Option<HarvesterReading>,
    pub totals: Vec<HourlyTotal>,
    pub offset_minutes: i32,
}

impl MyEnergiSnapshot {
    pub fn import_today(&self) -> Wh {
        self.totals.iter().map(HourlyTotal::import_wh).sum()
    }

    pub fn export_today(&self) -> Wh {
        self.totals.iter().map(HourlyTotal::export_wh).sum()
    }

    pub fn hour_labels(&self) -> Vec<i64> {
        self.totals
            .iter()
            .map(|t| crate::reconcile::display_hour(t, self.offset_minutes))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "provider", rename_all = "camelCase")]
pub enum Snapshot {
    SolarEdge(SolarEdgeSnapshot),
    MyEnergi(MyEnergiSnapshot),
}
