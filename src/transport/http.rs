/// HTTP delivery of reports to the collector
use log::{error, info};
use std::time::Duration;
use url::Url;

use crate::models::Report;

pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: Url,
}

impl HttpTransport {
    pub fn new(endpoint: Url, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, endpoint))
    }

    pub fn with_client(client: reqwest::Client, endpoint: Url) -> Self {
        HttpTransport { client, endpoint }
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// POST one report as JSON and return the response status code.
    ///
    /// Any status, including 4xx and 5xx, counts as delivered; only
    /// connection-level failures are errors.
    pub async fn send(&self, report: &Report) -> Result<u16, reqwest::Error> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(report)
            .send()
            .await?;

        Ok(response.status().as_u16())
    }

    /// Send every report of a sweep, logging each outcome
    pub async fn deliver(&self, reports: &[Report]) {
        for report in reports {
            match self.send(report).await {
                Ok(code) => info!(
                    "POST -> {} | RSSI: {} | Median: {} | History: {} | Code: {}",
                    report.beacon_name, report.rssi, report.median, report.samples, code
                ),
                Err(e) => error!(
                    "POST -> {} failed | RSSI: {} | Median: {} | History: {} | Error: {}",
                    report.beacon_name, report.rssi, report.median, report.samples, e
                ),
            }
        }
    }
}
