//! What a provider shows: its settings form, a loading state or live readings.

use crate::human;
use crate::model::{ProviderInstance, ProviderType, Settings, Snapshot};
use crate::poll::{PollState, ProviderStatus};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Metric {
    pub label: String,
    pub value: String,
}

impl Metric {
    fn new(label: &str, value: String) -> Self {
        Metric {
            label: label.to_owned(),
            value,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "mode", rename_all = "camelCase")]
pub enum ProviderView {
    #[serde(rename_all = "camelCase")]
    SettingsForm {
        provider_type: ProviderType,
        current: Settings,
        missing: Vec<&'static str>,
    },
    Loading {
        state: PollState,
    },
    Live {
        state: PollState,
        metrics: Vec<Metric>,
        snapshot: Snapshot,
    },
}

/// Pick the mode for `instance`. Editing shows the form even while a snapshot
/// is held.
pub fn resolve(instance: &ProviderInstance, status: Option<&ProviderStatus>) -> ProviderView {
    let editing = status.map_or(false, |s| s.editing);

    if editing || !instance.is_configured() {
        return ProviderView::SettingsForm {
            provider_type: instance.provider_type,
            current: instance.settings.clone(),
            missing: instance.provider_type.missing_settings(&instance.settings),
        };
    }

    let state = status.map(|s| s.state.clone()).unwrap_or_default();
    match status.and_then(|s| s.snapshot.clone()) {
        Some(snapshot) => ProviderView::Live {
            state,
            metrics: metrics(&snapshot),
            snapshot,
        },
        None => ProviderView::Loading { state },
    }
}

/// Labelled readings of `snapshot`; absent values are left out.
pub fn metrics(snapshot: &Snapshot) -> Vec<Metric> {
    let mut metrics = Vec::new();

    match snapshot {
        Snapshot::SolarEdge(s) => {
            let powers = [("Current power", s.current_power)];
            let energies = [
                ("Today", s.day_energy),
                ("This month", s.month_energy),
                ("This year", s.year_energy),
                ("Lifetime", s.lifetime_energy),
            ];
            for (label, value) in powers.iter() {
                if let Some(w) = value {
                    metrics.push(Metric::new(label, human::power(*w)));
                }
            }
            for (label, value) in energies.iter() {
                if let Some(wh) = value {
                    metrics.push(Metric::new(label, human::energy(*wh)));
                }
            }
            if let Some(updated) = s.last_update {
                metrics.push(Metric::new("Last update", updated.to_string()));
            }
        }
        Snapshot::MyEnergi(s) => {
            if let Some(harvester) = &s.harvester {
                if let Some(grid) = harvester.grid_power() {
                    metrics.push(Metric::new("Grid", human::power(grid)));
                }
            }
            if let Some(diversion) = &s.diversion {
                if let Some(w) = diversion.diverted_power {
                    metrics.push(Metric::new("Diverted", human::power(w)));
                }
                if let Some(kwh) = diversion.energy_today {
                    metrics.push(Metric::new("Diverted today", human::energy(kwh * 1000.0)));
                }
                if let Some(status) = diversion.status {
                    metrics.push(Metric::new("Diverter", format!("{:?}", status)));
                }
            }
            if !s.totals.is_empty() {
                metrics.push(Metric::new("Imported today", human::energy(s.import_today())));
                metrics.push(Metric::new("Exported today", human::energy(s.export_today())));
            }
        }
    }

    metrics
}
