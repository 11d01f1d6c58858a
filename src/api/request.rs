use serde::Serialize;

/// Envelope posted to the proxy, naming the upstream vendor call to make.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "service")]
pub enum ProxyRequest {
    #[serde(rename = "solar-edge")]
    SolarEdge {
        site: String,
        key: String,
        endpoint: String,
        query: String,
    },
    #[serde(rename = "my-energi")]
    MyEnergi {
        device: String,
        password: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        endpoint: Option<String>,
    },
}

impl ProxyRequest {
    pub fn service(&self) -> &'static str {
        match self {
            ProxyRequest::SolarEdge { .. } => super::endpoint::SOLAR_EDGE,
            ProxyRequest::MyEnergi { .. } => super::endpoint::MY_ENERGI,
        }
    }

    pub fn endpoint(&self) -> &str {
        match self {
            ProxyRequest::SolarEdge { endpoint, .. } => endpoint,
            ProxyRequest::MyEnergi { endpoint, .. } => endpoint.as_deref().unwrap_or("status"),
        }
    }
}
