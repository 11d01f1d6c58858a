use crate::api::{Error, ProxyClient};
use crate::model::{
    Anchor, MyEnergiSettings, MyEnergiSnapshot, ProviderInstance, ProviderType,
    SolarEdgeSettings, SolarEdgeSnapshot, Snapshot,
};
use crate::reconcile::reconcile;

/// Validated settings of a provider that is ready to poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollTarget {
    SolarEdge(SolarEdgeSettings),
    MyEnergi(MyEnergiSettings),
}

impl PollTarget {
    /// `None` while any required setting is missing.
    pub fn from_instance(instance: &ProviderInstance) -> Option<Self> {
        match instance.provider_type {
            ProviderType::SolarEdgeV1 => {
                SolarEdgeSettings::from_settings(&instance.settings).map(PollTarget::SolarEdge)
            }
            ProviderType::MyEnergi => {
                MyEnergiSettings::from_settings(&instance.settings).map(PollTarget::MyEnergi)
            }
        }
    }

    /// Run one fetch/parse/merge cycle.
    pub async fn fetch(&self, client: &ProxyClient, anchor: &Anchor) -> Result<Snapshot, Error> {
        match self {
            PollTarget::SolarEdge(settings) => {
                solar_edge(client, settings, anchor).await.map(Snapshot::SolarEdge)
            }
            PollTarget::MyEnergi(settings) => {
                my_energi(client, settings, anchor).await.map(Snapshot::MyEnergi)
            }
        }
    }
}

/// Overview and month history; the history window depends only on the anchor,
/// so both calls are issued together.
async fn solar_edge(
    client: &ProxyClient,
    settings: &SolarEdgeSettings,
    anchor: &Anchor,
) -> Result<SolarEdgeSnapshot, Error> {
    let (mut snapshot, samples) = tokio::try_join!(
        client.solar_edge_overview(settings),
        client.solar_edge_energy(settings, anchor.month_start(), anchor.month_end()),
    )?;

    snapshot.samples = samples;
    Ok(snapshot)
}

async fn my_energi(
    client: &ProxyClient,
    settings: &MyEnergiSettings,
    anchor: &Anchor,
) -> Result<MyEnergiSnapshot, Error> {
    let status = client.my_energi_status(settings).await?;
    let local = client.my_energi_day_hour(settings, anchor.date).await?;

    let adjacent = match anchor.adjacent_day() {
        Some(date) => {
            log::debug!(
                "Offset {}min, reading hourly totals of {} for {}",
                anchor.offset_minutes,
                date,
                settings.device_id
            );
            Some(client.my_energi_day_hour(settings, date).await?)
        }
        None => None,
    };

    Ok(MyEnergiSnapshot {
        diversion: status.diversion,
        harvester: status.harvester,
        totals: reconcile(local, anchor.offset_minutes, adjacent),
        offset_minutes: anchor.offset_minutes,
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::api::proxy;
    use crate::model::{ProviderId, Settings};
    use chrono::NaiveDate;
    use mockito::{Matcher, Server};
    use serde_json::json;
    use std::time::Duration;

    fn read_resource(filename: &str) -> String {
        let mut d = std::path::PathBuf::from(env!("CARGO_MANIFEST_DIR"));
        d.push(format!("resources/test/{}", filename));
        std::fs::read_to_string(d.as_path()).unwrap()
    }

    fn instance(provider_type: ProviderType, pairs: &[(&str, &str)]) -> ProviderInstance {
        ProviderInstance {
            id: ProviderId::from("p"),
            provider_type,
            settings: pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<Settings>(),
        }
    }

    fn energi() -> PollTarget {
        PollTarget::MyEnergi(MyEnergiSettings {
            device_id: "10088888".into(),
            password: "p".into(),
        })
    }

    fn june_15(offset_minutes: i32) -> Anchor {
        Anchor::new(NaiveDate::from_ymd_opt(2024, 6, 15).unwrap(), offset_minutes)
    }

    #[test]
    fn target_requires_every_setting() {
        let partial = instance(ProviderType::SolarEdgeV1, &[("apiKey", "k")]);
        assert_eq!(None, PollTarget::from_instance(&partial));

        let complete = instance(ProviderType::SolarEdgeV1, &[("apiKey", "k"), ("siteId", "s")]);
        assert!(matches!(
            PollTarget::from_instance(&complete),
            Some(PollTarget::SolarEdge(_))
        ));
    }

    #[tokio::test]
    async fn solar_edge_cycle_merges_history() {
        let mut server = Server::new_async().await;
        let _overview = server
            .mock("POST", "/")
            .match_body(Matcher::PartialJson(json!({"endpoint": "overview"})))
            .with_body(read_resource("overview.json"))
            .create_async()
            .await;
        let energy = server
            .mock("POST", "/")
            .match_body(Matcher::PartialJson(json!({
                "endpoint": "energy",
                "query": "timeUnit=DAY&endDate=2024-06-30&startDate=2024-06-01"
            })))
            .with_body(read_resource("energy.json"))
            .create_async()
            .await;

        let client = proxy(server.url(), Duration::from_secs(5)).unwrap();
        let target = PollTarget::SolarEdge(SolarEdgeSettings {
            api_key: "k".into(),
            site_id: "s".into(),
        });

        match target.fetch(&client, &june_15(0)).await.unwrap() {
            Snapshot::SolarEdge(snapshot) => {
                assert_eq!(Some(1532.0), snapshot.current_power);
                assert_eq!(5, snapshot.samples.len());
            }
            other => panic!("unexpected snapshot {:?}", other),
        }
        energy.assert_async().await;
    }

    #[tokio::test]
    async fn my_energi_cycle_without_offset_reads_one_day() {
        let mut server = Server::new_async().await;
        let _status = server
            .mock("POST", "/")
            .match_body(Matcher::Json(json!({
                "service": "my-energi", "device": "10088888", "password": "p"
            })))
            .with_body(read_resource("status_eddi_only.json"))
            .create_async()
            .await;
        let today = server
            .mock("POST", "/")
            .match_body(Matcher::PartialJson(json!({
                "endpoint": "/cgi-jdayhour-E10088888-2024-06-15"
            })))
            .with_body(read_resource("day_hour.json"))
            .expect(1)
            .create_async()
            .await;
        let adjacent = server
            .mock("POST", "/")
            .match_body(Matcher::PartialJson(json!({
                "endpoint": "/cgi-jdayhour-E10088888-2024-06-14"
            })))
            .expect(0)
            .create_async()
            .await;

        let client = proxy(server.url(), Duration::from_secs(5)).unwrap();
        let snapshot = match energi().fetch(&client, &june_15(0)).await.unwrap() {
            Snapshot::MyEnergi(snapshot) => snapshot,
            other => panic!("unexpected snapshot {:?}", other),
        };

        assert!(snapshot.diversion.is_some());
        assert!(snapshot.harvester.is_none());
        assert_eq!(24, snapshot.totals.len());
        today.assert_async().await;
        adjacent.assert_async().await;
    }

    #[tokio::test]
    async fn my_energi_cycle_with_offset_stitches_previous_day() {
        let mut server = Server::new_async().await;
        let _status = server
            .mock("POST", "/")
            .match_body(Matcher::Json(json!({
                "service": "my-energi", "device": "10088888", "password": "p"
            })))
            .with_body(read_resource("status.json"))
            .create_async()
            .await;
        let _today = server
            .mock("POST", "/")
            .match_body(Matcher::PartialJson(json!({
                "endpoint": "/cgi-jdayhour-E10088888-2024-06-15"
            })))
            .with_body(read_resource("day_hour.json"))
            .create_async()
            .await;
        let previous = server
            .mock("POST", "/")
            .match_body(Matcher::PartialJson(json!({
                "endpoint": "/cgi-jdayhour-E10088888-2024-06-14"
            })))
            .with_body(
                json!({"U10088888": [{"hr": 22, "imp": 100}, {"hr": 23, "imp": 200}]}).to_string(),
            )
            .create_async()
            .await;

        let client = proxy(server.url(), Duration::from_secs(5)).unwrap();
        let snapshot = match energi().fetch(&client, &june_15(120)).await.unwrap() {
            Snapshot::MyEnergi(snapshot) => snapshot,
            other => panic!("unexpected snapshot {:?}", other),
        };

        assert_eq!(26, snapshot.totals.len());
        assert_eq!(100.0, snapshot.totals[0].import_value);
        assert_eq!(200.0, snapshot.totals[1].import_value);
        assert_eq!(24, snapshot.hour_labels()[0]);
        assert!(snapshot.harvester.is_some());
        previous.assert_async().await;
    }

    #[tokio::test]
    async fn my_energi_cycle_survives_null_totals() {
        let mut server = Server::new_async().await;
        let _status = server
            .mock("POST", "/")
            .match_body(Matcher::Json(json!({
                "service": "my-energi", "device": "10088888", "password": "p"
            })))
            .with_body(read_resource("status.json"))
            .create_async()
            .await;
        let _today = server
            .mock("POST", "/")
            .match_body(Matcher::PartialJson(json!({
                "endpoint": "/cgi-jdayhour-E10088888-2024-06-15"
            })))
            .with_body(r#"{"U1":[{"hr":0,"imp":3600},{"hr":1,"imp":null,"exp":7200}]}"#)
            .create_async()
            .await;

        let client = proxy(server.url(), Duration::from_secs(5)).unwrap();
        let snapshot = match energi().fetch(&client, &june_15(0)).await.unwrap() {
            Snapshot::MyEnergi(snapshot) => snapshot,
            other => panic!("unexpected snapshot {:?}", other),
        };

        assert!(snapshot.diversion.is_some());
        assert_eq!(2, snapshot.totals.len());
        assert_eq!(1.0, snapshot.import_today());
        assert_eq!(2.0, snapshot.export_today());
    }

    #[tokio::test]
    async fn failed_history_fails_cycle() {
        let mut server = Server::new_async().await;
        let _overview = server
            .mock("POST", "/")
            .match_body(Matcher::PartialJson(json!({"endpoint": "overview"})))
            .with_body(read_resource("overview.json"))
            .create_async()
            .await;
        let _energy = server
            .mock("POST", "/")
            .match_body(Matcher::PartialJson(json!({"endpoint": "energy"})))
            .with_status(503)
            .create_async()
            .await;

        let client = proxy(server.url(), Duration::from_secs(5)).unwrap();
        let target = PollTarget::SolarEdge(SolarEdgeSettings {
            api_key: "k".into(),
            site_id: "s".into(),
        });

        assert!(matches!(
            target.fetch(&client, &june_15(0)).await,
            Err(Error::Upstream(_))
        ));
    }
}
