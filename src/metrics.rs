use myenergy_rs::model::{ProviderInstance, Snapshot};
use myenergy_rs::{BlobStore, Error, Monitor, ProviderStatus};
use prometheus::{Encoder, GaugeVec, TextEncoder};

lazy_static! {
    static ref CURRENT_POWER_GAUGE: GaugeVec = register_gauge_vec!(
        opts!("current_power", "power currently produced by the site (in W)"),
        &["provider_id", "provider_type"],
    )
    .unwrap();
    static ref DAY_ENERGY_GAUGE: GaugeVec = register_gauge_vec!(
        opts!("day_energy", "energy produced in current day (in Wh)"),
        &["provider_id", "provider_type"],
    )
    .unwrap();
    static ref DIVERTED_POWER_GAUGE: GaugeVec = register_gauge_vec!(
        opts!("diverted_power", "power diverted to the tank (in W)"),
        &["provider_id", "provider_type"],
    )
    .unwrap();
    static ref GRID_POWER_GAUGE: GaugeVec = register_gauge_vec!(
        opts!("grid_power", "grid clamp reading, positive is import (in W)"),
        &["provider_id", "provider_type"],
    )
    .unwrap();
    static ref DAY_IMPORT_GAUGE: GaugeVec = register_gauge_vec!(
        opts!("day_import", "energy imported in current day (in Wh)"),
        &["provider_id", "provider_type"],
    )
    .unwrap();
    static ref DAY_EXPORT_GAUGE: GaugeVec = register_gauge_vec!(
        opts!("day_export", "energy exported in current day (in Wh)"),
        &["provider_id", "provider_type"],
    )
    .unwrap();
    static ref POLL_SUCCESS_GAUGE: GaugeVec = register_gauge_vec!(
        opts!("poll_successes", "successful poll cycles since start"),
        &["provider_id", "provider_type"],
    )
    .unwrap();
    static ref POLL_FAILURE_GAUGE: GaugeVec = register_gauge_vec!(
        opts!("poll_failures", "failed poll cycles since start"),
        &["provider_id", "provider_type"],
    )
    .unwrap();
}

fn set(gauge: &GaugeVec, labels: &[&str], value: Option<f64>) {
    if let Some(value) = value {
        gauge.with_label_values(labels).set(value);
    }
}

/// Feed the latest snapshot of `instance` to the gauges.
fn process_status(instance: &ProviderInstance, status: &ProviderStatus) {
    let labels = [instance.id.as_str(), instance.provider_type.as_str()];

    POLL_SUCCESS_GAUGE
        .with_label_values(&labels)
        .set(status.successes as f64);
    POLL_FAILURE_GAUGE
        .with_label_values(&labels)
        .set(status.failures as f64);

    match &status.snapshot {
        Some(Snapshot::SolarEdge(snapshot)) => {
            set(&CURRENT_POWER_GAUGE, &labels, snapshot.current_power);
            set(&DAY_ENERGY_GAUGE, &labels, snapshot.day_energy);
        }
        Some(Snapshot::MyEnergi(snapshot)) => {
            set(
                &DIVERTED_POWER_GAUGE,
                &labels,
                snapshot.diversion.as_ref().and_then(|d| d.diverted_power),
            );
            set(
                &GRID_POWER_GAUGE,
                &labels,
                snapshot.harvester.as_ref().and_then(|h| h.grid_power()),
            );
            if !snapshot.totals.is_empty() {
                DAY_IMPORT_GAUGE
                    .with_label_values(&labels)
                    .set(snapshot.import_today());
                DAY_EXPORT_GAUGE
                    .with_label_values(&labels)
                    .set(snapshot.export_today());
            }
        }
        None => log::debug!("No snapshot yet for {}", instance.id),
    }
}

/// Rebuild all gauges from the current state of `monitor`.
pub fn collect<S: BlobStore>(monitor: &Monitor<S>) {
    for gauge in [
        &*CURRENT_POWER_GAUGE,
        &*DAY_ENERGY_GAUGE,
        &*DIVERTED_POWER_GAUGE,
        &*GRID_POWER_GAUGE,
        &*DAY_IMPORT_GAUGE,
        &*DAY_EXPORT_GAUGE,
        &*POLL_SUCCESS_GAUGE,
        &*POLL_FAILURE_GAUGE,
    ]
    .iter()
    {
        gauge.reset();
    }

    for instance in monitor.providers() {
        if let Some(status) = monitor.status(&instance.id) {
            process_status(&instance, &status);
        }
    }
}

/// Read metrics from Prometheus exporter registry.
pub fn read() -> Result<String, Error> {
    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();

    encoder
        .encode(&metric_families, &mut buffer)
        .or(Err(Error::InternalError))?;
    String::from_utf8(buffer).or(Err(Error::InternalError))
}
