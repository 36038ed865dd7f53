use crate::infrastructure::error::InfraError;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use url::Url;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const CONDITIONS_FORMAT: &str = "format=%C+%t";

#[async_trait]
pub trait WeatherClient: Send + Sync {
    /// Short human-readable conditions for `city`, e.g. `Sunny +21°C`.
    async fn current_conditions(&self, city: &str) -> Result<String, InfraError>;
}

#[derive(Debug, Clone)]
pub struct ReqwestWeatherClient {
    client: Client,
    endpoint: String,
}

impl ReqwestWeatherClient {
    pub fn new(endpoint: impl Into<String>) -> Result<Self, InfraError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("focus-station/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    fn conditions_url(&self, city: &str) -> Result<Url, InfraError> {
        let mut url = Url::parse(&self.endpoint).map_err(|error| {
            InfraError::InvalidConfig(format!("invalid weather endpoint: {error}"))
        })?;
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                InfraError::InvalidConfig("weather endpoint cannot be a base".to_string())
            })?;
            segments.pop_if_empty();
            segments.push(city.trim());
        }
        url.set_query(Some(CONDITIONS_FORMAT));
        Ok(url)
    }
}

#[async_trait]
impl WeatherClient for ReqwestWeatherClient {
    async fn current_conditions(&self, city: &str) -> Result<String, InfraError> {
        let url = self.conditions_url(city)?;
        let response = self.client.get(url).send().await?.error_for_status()?;
        let body = response.text().await?;
        Ok(body.trim().to_string())
    }
}

/// The weather pill text. Never fails: any error becomes a fallback string.
pub async fn describe_weather(client: &dyn WeatherClient, city: &str) -> String {
    match client.current_conditions(city).await {
        Ok(conditions) if !conditions.is_empty() => format!("{city} {conditions}"),
        Ok(_) => format!("{city}: unavailable"),
        Err(error) => {
            tracing::warn!(city, %error, "weather lookup failed");
            format!("{city}: unavailable")
        }
    }
}
