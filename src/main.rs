#[macro_use]
extern crate lazy_static;
#[macro_use]
extern crate prometheus;
#[macro_use]
extern crate rocket;

use config::Config;
use myenergy_rs::model::{ProviderId, ProviderInstance, ProviderType, Settings};
use myenergy_rs::{api, CredentialStore, Error, FileStore, Monitor, PollConfig, ProviderView, RetryPolicy};
use rocket::serde::json::Json;
use rocket::State;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

mod metrics;

const PROXY_URL: &str = "https://energy-proxy.test";

type AppMonitor = Arc<Monitor<FileStore>>;

#[derive(Clone, serde::Deserialize)]
pub struct MyEnergyConfig {
    proxy_url: String,
    storage_dir: String,
    poll_interval_secs: u64,
    retry_attempts: u32,
    retry_delay_secs: u64,
    request_timeout_secs: u64,
}

impl MyEnergyConfig {
    fn poll_config(&self) -> PollConfig {
        PollConfig {
            interval: Duration::from_secs(self.poll_interval_secs),
            retry: RetryPolicy {
                max_attempts: self.retry_attempts,
                initial_delay: Duration::from_secs(self.retry_delay_secs),
            },
            anchor: None,
        }
    }
}

pub fn read_settings() -> Result<MyEnergyConfig, config::ConfigError> {
    let mut settings = Config::default();
    settings
        .set_default("proxy_url", PROXY_URL)?
        .set_default("storage_dir", ".")?
        .set_default("poll_interval_secs", 300i64)?
        .set_default("retry_attempts", 3i64)?
        .set_default("retry_delay_secs", 10i64)?
        .set_default("request_timeout_secs", 10i64)?
        .merge(config::Environment::with_prefix("EM"))?;

    settings.try_into()
}

#[derive(Serialize)]
struct ProviderEntry {
    #[serde(flatten)]
    instance: ProviderInstance,
    view: ProviderView,
}

fn entry(monitor: &AppMonitor, id: &ProviderId) -> Result<Json<ProviderEntry>, Error> {
    let unknown = || Error::UnknownProvider(id.to_string());
    let instance = monitor.provider(id).ok_or_else(unknown)?;
    let view = monitor.view(id).ok_or_else(unknown)?;

    Ok(Json(ProviderEntry { instance, view }))
}

#[get("/providers")]
fn list_route(monitor: &State<AppMonitor>) -> Json<Vec<ProviderEntry>> {
    Json(
        monitor
            .views()
            .into_iter()
            .map(|(instance, view)| ProviderEntry { instance, view })
            .collect(),
    )
}

#[post("/providers/<provider_type>")]
fn add_route(
    monitor: &State<AppMonitor>,
    provider_type: &str,
) -> Result<Json<ProviderEntry>, Error> {
    let provider_type: ProviderType = provider_type.parse()?;
    let instance = monitor.add_provider(provider_type)?;
    entry(monitor, &instance.id)
}

#[get("/providers/<id>")]
fn get_route(monitor: &State<AppMonitor>, id: &str) -> Result<Json<ProviderEntry>, Error> {
    entry(monitor, &ProviderId::from(id))
}

#[delete("/providers/<id>")]
fn remove_route(monitor: &State<AppMonitor>, id: &str) -> Result<(), Error> {
    let id = ProviderId::from(id);
    if monitor.provider(&id).is_none() {
        return Err(Error::UnknownProvider(id.to_string()));
    }
    monitor.remove_provider(&id)
}

#[put("/providers/<id>/settings", data = "<settings>")]
fn settings_route(
    monitor: &State<AppMonitor>,
    id: &str,
    settings: Json<Settings>,
) -> Result<Json<ProviderEntry>, Error> {
    let id = ProviderId::from(id);
    monitor.update_settings(&id, settings.into_inner())?;
    entry(monitor, &id)
}

#[post("/providers/<id>/edit")]
fn edit_route(monitor: &State<AppMonitor>, id: &str) -> Result<Json<ProviderEntry>, Error> {
    let id = ProviderId::from(id);
    monitor.edit_settings(&id)?;
    entry(monitor, &id)
}

#[delete("/providers/<id>/edit")]
fn cancel_edit_route(
    monitor: &State<AppMonitor>,
    id: &str,
) -> Result<Json<ProviderEntry>, Error> {
    let id = ProviderId::from(id);
    monitor.cancel_edit(&id)?;
    entry(monitor, &id)
}

#[get("/metrics")]
fn metrics_route(monitor: &State<AppMonitor>) -> Result<String, Error> {
    metrics::collect(monitor.inner().as_ref());
    metrics::read()
}

#[rocket::main]
async fn main() {
    env_logger::init();

    let settings = match read_settings() {
        Ok(settings) => settings,
        Err(e) => {
            log::error!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    let client = match api::proxy(
        settings.proxy_url.to_owned(),
        Duration::from_secs(settings.request_timeout_secs),
    ) {
        Ok(client) => client,
        Err(e) => {
            log::error!("Unable to build HTTP client: {}", e);
            std::process::exit(1);
        }
    };

    let store = CredentialStore::new(FileStore::new(&settings.storage_dir));
    let monitor: AppMonitor = Arc::new(Monitor::new(store, client, settings.poll_config()));
    monitor.start_all();

    let result = rocket::build()
        .manage(Arc::clone(&monitor))
        .mount(
            "/",
            routes![
                list_route,
                add_route,
                get_route,
                remove_route,
                settings_route,
                edit_route,
                cancel_edit_route,
                metrics_route
            ],
        )
        .launch()
        .await;

    monitor.shutdown();
    if let Err(e) = result {
        log::error!("Server error: {}", e);
    }
}
