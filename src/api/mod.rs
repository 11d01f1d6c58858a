pub mod endpoint;
pub mod error;
pub mod request;
pub mod response;

use crate::model::{
    DiversionReading, EnergySample, HarvesterReading, HourlyTotal, MyEnergiSettings,
    SolarEdgeSettings, SolarEdgeSnapshot,
};
pub use error::Error;
use chrono::{NaiveDate, NaiveDateTime};
use request::ProxyRequest;
use response::day_hour::GetDayHour;
use response::energy::GetEnergy;
use response::overview::GetOverview;
use response::status::{GetStatus, StatusElement};
use serde_json::Value;
use std::time::Duration;

const SAMPLE_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Client of the energy proxy, which forwards each envelope to the named vendor.
#[derive(Debug, Clone)]
pub struct ProxyClient {
    pub proxy_url: String,
    client: reqwest::Client,
}

pub fn proxy(proxy_url: String, timeout: Duration) -> Result<ProxyClient, Error> {
    let client = reqwest::ClientBuilder::new()
        .timeout(timeout)
        .build()
        .or(Err(Error::InternalError))?;

    Ok(ProxyClient { proxy_url, client })
}

/// Map transport and non-2xx errors
fn map_api_err(error: reqwest::Error) -> Error {
    match error.status() {
        Some(http::StatusCode::TOO_MANY_REQUESTS) => Error::RateExceeded(error.to_string()),
        Some(_) => Error::Upstream(error.to_string()),
        None => Error::Transport(error.to_string()),
    }
}

/// Diverter and harvester readings split out of a status response.
#[derive(Debug, Default)]
pub struct DeviceStatus {
    pub diversion: Option<DiversionReading>,
    pub harvester: Option<HarvesterReading>,
}

impl ProxyClient {
    async fn post(&self, request: &ProxyRequest) -> Result<Value, Error> {
        log::trace!(
            "service: {}, endpoint: {}",
            request.service(),
            request.endpoint()
        );

        let text = self
            .client
            .post(self.proxy_url.as_str())
            .json(request)
            .send()
            .await
            .map_err(map_api_err)?
            .error_for_status()
            .map_err(map_api_err)?
            .text()
            .await
            .map_err(|e| Error::Transport(format!("Error reading proxy response: {}", e)))?;

        log::trace!("response_text: {}", text);

        serde_json::from_str::<Value>(&text).map_err(|e| Error::InvalidResponse(text, e.to_string()))
    }

    pub async fn solar_edge_overview(
        &self,
        settings: &SolarEdgeSettings,
    ) -> Result<SolarEdgeSnapshot, Error> {
        let request = ProxyRequest::SolarEdge {
            site: settings.site_id.to_owned(),
            key: settings.api_key.to_owned(),
            endpoint: endpoint::OVERVIEW.to_owned(),
            query: String::new(),
        };

        self.post(&request)
            .await
            .map(serde_json::from_value::<GetOverview>)?
            .map_err(|e| Error::UnexpectedApiResponse(e.to_string()))
            .map(|response| {
                let overview = response.overview;
                SolarEdgeSnapshot {
                    current_power: overview.current_power.and_then(|p| p.power),
                    day_energy: overview.last_day_data.and_then(|d| d.energy),
                    month_energy: overview.last_month_data.and_then(|d| d.energy),
                    year_energy: overview.last_year_data.and_then(|d| d.energy),
                    lifetime_energy: overview.life_time_data.and_then(|d| d.energy),
                    last_update: overview.last_update_time.and_then(|t| {
                        NaiveDateTime::parse_from_str(&t, SAMPLE_DATE_FORMAT).ok()
                    }),
                    samples: Vec::new(),
                }
            })
    }

    /// Daily energy samples between `start` and `end`.
    pub async fn solar_edge_energy(
        &self,
        settings: &SolarEdgeSettings,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<EnergySample>, Error> {
        let request = ProxyRequest::SolarEdge {
            site: settings.site_id.to_owned(),
            key: settings.api_key.to_owned(),
            endpoint: endpoint::ENERGY.to_owned(),
            query: endpoint::energy_query(start, end),
        };

        let response = self
            .post(&request)
            .await
            .map(serde_json::from_value::<GetEnergy>)?
            .map_err(|e| Error::UnexpectedApiResponse(e.to_string()))?;

        let energy = match response.energy {
            Some(energy) => energy,
            None => {
                log::warn!("No energy history returned for site {}", settings.site_id);
                return Ok(Vec::new());
            }
        };

        let samples = energy
            .values
            .into_iter()
            .filter_map(|v| match NaiveDateTime::parse_from_str(&v.date, SAMPLE_DATE_FORMAT) {
                Ok(date) => Some(EnergySample {
                    date,
                    value: v.value,
                }),
                Err(e) => {
                    log::warn!("Skipping energy sample with date {:?}: {}", v.date, e);
                    None
                }
            })
            .collect();
        Ok(samples)
    }

    /// Live readings of the devices behind the hub.
    pub async fn my_energi_status(
        &self,
        settings: &MyEnergiSettings,
    ) -> Result<DeviceStatus, Error> {
        let request = ProxyRequest::MyEnergi {
            device: settings.device_id.to_owned(),
            password: settings.password.to_owned(),
            endpoint: None,
        };

        let response = self
            .post(&request)
            .await
            .map(serde_json::from_value::<GetStatus>)?
            .map_err(|e| Error::UnexpectedApiResponse(e.to_string()))?;

        let mut status = DeviceStatus::default();
        for element in response.elements {
            match element {
                StatusElement::Diversion(eddi) => {
                    if let Some(eddi) = eddi.into_iter().next() {
                        let tank_temperatures = eddi.tp1.into_iter().chain(eddi.tp2).collect();
                        status.diversion = Some(DiversionReading {
                            serial: eddi.sno,
                            diverted_power: eddi.div,
                            energy_today: eddi.che,
                            status: eddi.sta.and_then(num::FromPrimitive::from_u64),
                            tank_temperatures,
                        });
                    }
                }
                StatusElement::Harvester(harvi) => {
                    if let Some(harvi) = harvi.into_iter().next() {
                        let clamp_powers = harvi
                            .ectp1
                            .into_iter()
                            .chain(harvi.ectp2)
                            .chain(harvi.ectp3)
                            .collect();
                        status.harvester = Some(HarvesterReading {
                            serial: harvi.sno,
                            clamp_powers,
                        });
                    }
                }
                StatusElement::Other => {}
            }
        }

        if status.harvester.is_none() {
            log::debug!("No harvester reported by {}", settings.device_id);
        }
        Ok(status)
    }

    /// Hourly import/export totals for `date`, in device-reported buckets.
    pub async fn my_energi_day_hour(
        &self,
        settings: &MyEnergiSettings,
        date: NaiveDate,
    ) -> Result<Vec<HourlyTotal>, Error> {
        let request = ProxyRequest::MyEnergi {
            device: settings.device_id.to_owned(),
            password: settings.password.to_owned(),
            endpoint: Some(endpoint::day_hour(&settings.device_id, date)),
        };

        self.post(&request)
            .await
            .map(serde_json::from_value::<GetDayHour>)?
            .map_err(|e| Error::UnexpectedApiResponse(e.to_string()))
            .map(|response| response.totals)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::model::DiversionStatus;
    use mockito::{Matcher, Server};
    use serde_json::json;

    fn read_resource(filename: &str) -> String {
        let mut d = std::path::PathBuf::from(env!("CARGO_MANIFEST_DIR"));
        d.push(format!("resources/test/{}", filename));
        std::fs::read_to_string(d.as_path()).unwrap()
    }

    fn client(server: &Server) -> ProxyClient {
        proxy(server.url(), Duration::from_secs(5)).unwrap()
    }

    fn solar_edge() -> SolarEdgeSettings {
        SolarEdgeSettings {
            api_key: "k".into(),
            site_id: "s".into(),
        }
    }

    fn my_energi() -> MyEnergiSettings {
        MyEnergiSettings {
            device_id: "10088888".into(),
            password: "p".into(),
        }
    }

    #[tokio::test]
    async fn overview_posts_envelope() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/")
            .match_header("content-type", "application/json")
            .match_body(Matcher::Json(json!({
                "service": "solar-edge",
                "site": "s",
                "key": "k",
                "endpoint": "overview",
                "query": ""
            })))
            .with_status(200)
            .with_body(read_resource("overview.json"))
            .create_async()
            .await;

        let snapshot = client(&server).solar_edge_overview(&solar_edge()).await.unwrap();

        assert_eq!(Some(1532.0), snapshot.current_power);
        assert_eq!(Some(148260.0), snapshot.month_energy);
        assert!(snapshot.last_update.is_some());
        assert!(snapshot.samples.is_empty());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn energy_parses_samples() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/")
            .match_body(Matcher::PartialJson(json!({
                "endpoint": "energy",
                "query": "timeUnit=DAY&endDate=2024-06-30&startDate=2024-06-01"
            })))
            .with_status(200)
            .with_body(read_resource("energy.json"))
            .create_async()
            .await;

        let samples = client(&server)
            .solar_edge_energy(
                &solar_edge(),
                NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
                NaiveDate::from_ymd_opt(2024, 6, 30).unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(5, samples.len());
        assert_eq!(Some(21004.0), samples[1].value);
        assert_eq!(None, samples[4].value);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn status_splits_devices() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/")
            .match_body(Matcher::Json(json!({
                "service": "my-energi",
                "device": "10088888",
                "password": "p"
            })))
            .with_body(read_resource("status.json"))
            .create_async()
            .await;

        let status = client(&server).my_energi_status(&my_energi()).await.unwrap();
        let diversion = status.diversion.unwrap();
        let harvester = status.harvester.unwrap();

        assert_eq!(Some(DiversionStatus::Diverting), diversion.status);
        assert_eq!(vec![55.0, 127.0], diversion.tank_temperatures);
        assert_eq!(Some(-2205.0), harvester.grid_power());
        assert_eq!(3, harvester.clamp_powers.len());
    }

    #[tokio::test]
    async fn day_hour_requests_device_path() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/")
            .match_body(Matcher::PartialJson(json!({
                "endpoint": "/cgi-jdayhour-E10088888-2024-06-15"
            })))
            .with_body(read_resource("day_hour.json"))
            .create_async()
            .await;

        let totals = client(&server)
            .my_energi_day_hour(&my_energi(), NaiveDate::from_ymd_opt(2024, 6, 15).unwrap())
            .await
            .unwrap();

        assert_eq!(24, totals.len());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn server_error_maps_to_upstream() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/")
            .with_status(500)
            .create_async()
            .await;

        let result = client(&server).solar_edge_overview(&solar_edge()).await;
        assert!(matches!(result, Err(Error::Upstream(_))));
    }

    #[tokio::test]
    async fn too_many_requests_maps_to_rate_exceeded() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/")
            .with_status(429)
            .create_async()
            .await;

        let result = client(&server).my_energi_status(&my_energi()).await;
        assert!(matches!(result, Err(Error::RateExceeded(_))));
    }

    #[tokio::test]
    async fn non_json_body_is_invalid_response() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/")
            .with_body(read_resource("invalid_json.json"))
            .create_async()
            .await;

        let result = client(&server).solar_edge_overview(&solar_edge()).await;
        assert!(matches!(result, Err(Error::InvalidResponse(_, _))));
    }

    #[tokio::test]
    async fn unreachable_proxy_is_transport_failure() {
        let client = proxy("http://127.0.0.1:9".to_string(), Duration::from_secs(2)).unwrap();
        let result = client.solar_edge_overview(&solar_edge()).await;
        assert!(matches!(result, Err(Error::Transport(_))));
    }

    #[tokio::test]
    async fn missing_overview_is_unexpected() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/")
            .with_body(read_resource("valid_json.json"))
            .create_async()
            .await;

        let result = client(&server).solar_edge_overview(&solar_edge()).await;
        assert!(matches!(result, Err(Error::UnexpectedApiResponse(_))));
    }
}
