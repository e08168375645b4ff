//! Tool callables for the travel agent: weather, city time, and city facts.
//!
//! Tools take a city name and return plain text. Failures come back as
//! readable text results where possible so the agent can show them as
//! observations instead of aborting the turn.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{AgentError, Result};

/// JSON Schema describing a tool's parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

fn city_parameter_schema() -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "city": {
                "type": "string",
                "description": "The city to look up"
            }
        },
        "required": ["city"]
    })
}

/// A callable the agent can invoke with a city name
#[async_trait]
pub trait Tool: Send + Sync {
    /// Tool name used in LLM tool calls
    fn name(&self) -> &str;

    /// One-line description shown to the LLM
    fn description(&self) -> &str;

    /// Schema advertised to the LLM
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: city_parameter_schema(),
        }
    }

    /// Look up information for a city
    async fn call(&self, city: &str) -> Result<String>;
}

/// Registry of available tools, keyed by name
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool
    pub fn register<T: Tool + 'static>(&mut self, tool: T) {
        self.tools.insert(tool.name().to_string(), Arc::new(tool));
    }

    /// Get a tool by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Check if a tool exists
    pub fn has(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// List registered tool names
    pub fn list(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }

    /// Schemas for all registered tools
    pub fn schemas(&self) -> Vec<ToolSchema> {
        self.tools.values().map(|t| t.schema()).collect()
    }

    /// Invoke a tool by name
    pub async fn call(&self, name: &str, city: &str) -> Result<String> {
        let tool = self
            .get(name)
            .ok_or_else(|| AgentError::ToolNotFound(name.to_string()))?;
        tool.call(city).await
    }
}

/// Build the default travel toolkit over a shared HTTP client
pub fn travel_toolkit(client: reqwest::Client) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(WeatherTool::from_env(client.clone()));
    registry.register(TimeTool::new());
    registry.register(CityFactsTool::new(client));
    registry
}

// ─── Weather ──────────────────────────────────────────────────────────────────

const WEATHERAPI_BASE_URL: &str = "http://api.weatherapi.com/v1";

/// Current weather via weatherapi.com
pub struct WeatherTool {
    client: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
}

#[derive(Deserialize)]
struct WeatherResponse {
    location: WeatherLocation,
    current: WeatherCurrent,
}

#[derive(Deserialize)]
struct WeatherLocation {
    name: String,
    country: String,
}

#[derive(Deserialize)]
struct WeatherCurrent {
    temp_c: f64,
    humidity: i64,
    wind_kph: f64,
    condition: WeatherCondition,
}

#[derive(Deserialize)]
struct WeatherCondition {
    text: String,
}

impl WeatherTool {
    pub fn new(client: reqwest::Client, api_key: Option<String>) -> Self {
        Self {
            client,
            api_key,
            base_url: WEATHERAPI_BASE_URL.to_string(),
        }
    }

    /// Read the API key from `WEATHERAPI_KEY`
    pub fn from_env(client: reqwest::Client) -> Self {
        Self::new(client, std::env::var("WEATHERAPI_KEY").ok())
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }
}

#[async_trait]
impl Tool for WeatherTool {
    fn name(&self) -> &str {
        "weather"
    }

    fn description(&self) -> &str {
        "Get current weather information for a specific city. Input should be a city name."
    }

    async fn call(&self, city: &str) -> Result<String> {
        let api_key = match &self.api_key {
            Some(key) => key,
            None => {
                return Ok(
                    "Weather lookup unavailable: WEATHERAPI_KEY is not set.".to_string()
                )
            }
        };

        let url = format!("{}/current.json", self.base_url);
        let response = self
            .client
            .get(url)
            .query(&[("key", api_key.as_str()), ("q", city)])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(AgentError::Tool(format!(
                "weather API returned {status} for {city}"
            )));
        }

        let data: WeatherResponse = response.json().await?;
        Ok(format!(
            "Currently {:.1}°C and {} in {}, {}. Humidity {}% with wind at {} km/h.",
            data.current.temp_c,
            data.current.condition.text,
            data.location.name,
            data.location.country,
            data.current.humidity,
            data.current.wind_kph,
        ))
    }
}

// ─── City time ────────────────────────────────────────────────────────────────

/// City to IANA timezone table for the supported lookups
const CITY_TIMEZONES: &[(&str, &str)] = &[
    ("new york", "America/New_York"),
    ("london", "Europe/London"),
    ("paris", "Europe/Paris"),
    ("tokyo", "Asia/Tokyo"),
    ("sydney", "Australia/Sydney"),
    ("los angeles", "America/Los_Angeles"),
    ("chicago", "America/Chicago"),
    ("berlin", "Europe/Berlin"),
    ("beijing", "Asia/Shanghai"),
    ("moscow", "Europe/Moscow"),
    ("dubai", "Asia/Dubai"),
    ("singapore", "Asia/Singapore"),
    ("hong kong", "Asia/Hong_Kong"),
    ("toronto", "America/Toronto"),
    ("sao paulo", "America/Sao_Paulo"),
    ("mumbai", "Asia/Kolkata"),
    ("istanbul", "Europe/Istanbul"),
    ("rome", "Europe/Rome"),
    ("madrid", "Europe/Madrid"),
    ("amsterdam", "Europe/Amsterdam"),
];

/// Local time for well-known cities, no network required
#[derive(Default)]
pub struct TimeTool;

impl TimeTool {
    pub fn new() -> Self {
        Self
    }

    fn timezone_for(city: &str) -> Option<Tz> {
        let city = city.to_lowercase();
        CITY_TIMEZONES
            .iter()
            .find(|(name, _)| *name == city)
            .and_then(|(_, tz)| tz.parse().ok())
    }
}

#[async_trait]
impl Tool for TimeTool {
    fn name(&self) -> &str {
        "time"
    }

    fn description(&self) -> &str {
        "Get the current local time for a specific city. Input should be a city name."
    }

    async fn call(&self, city: &str) -> Result<String> {
        match Self::timezone_for(city) {
            Some(tz) => {
                let now = Utc::now().with_timezone(&tz);
                Ok(format!(
                    "The local time in {} is {} ({}, {}).",
                    city,
                    now.format("%Y-%m-%d %H:%M:%S"),
                    now.format("%A"),
                    tz
                ))
            }
            None => {
                let now = Utc::now();
                Ok(format!(
                    "Timezone for {} not found. UTC time is {}.",
                    city,
                    now.format("%Y-%m-%d %H:%M:%S")
                ))
            }
        }
    }
}

// ─── City facts ───────────────────────────────────────────────────────────────

const WIKIPEDIA_BASE_URL: &str = "https://en.wikipedia.org/api/rest_v1";

/// Max characters of the Wikipedia extract forwarded to the agent
const FACTS_EXTRACT_CAP: usize = 1500;

/// City facts from the Wikipedia page-summary API
pub struct CityFactsTool {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Deserialize)]
struct PageSummary {
    title: String,
    extract: String,
}

impl CityFactsTool {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            base_url: WIKIPEDIA_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    async fn fetch_summary(&self, title: &str) -> Result<Option<PageSummary>> {
        let url = format!("{}/page/summary/{}", self.base_url, title.replace(' ', "_"));
        let response = self
            .client
            .get(url)
            .header("User-Agent", "wayfarer/0.1 (travel assistant)")
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            let status = response.status();
            return Err(AgentError::Tool(format!(
                "Wikipedia returned {status} for {title}"
            )));
        }

        Ok(Some(response.json().await?))
    }
}

#[async_trait]
impl Tool for CityFactsTool {
    fn name(&self) -> &str {
        "city_facts"
    }

    fn description(&self) -> &str {
        "Get interesting facts about a specific city. Input should be a city name."
    }

    async fn call(&self, city: &str) -> Result<String> {
        let summary = match self.fetch_summary(city).await? {
            Some(s) => Some(s),
            // Disambiguation-prone titles often resolve with an explicit suffix
            None => self.fetch_summary(&format!("{city} city")).await?,
        };

        let summary = match summary {
            Some(s) => s,
            None => {
                return Ok(format!("Could not find a Wikipedia page for {city}."));
            }
        };

        let mut extract = summary.extract;
        if extract.len() > FACTS_EXTRACT_CAP {
            let mut cut = FACTS_EXTRACT_CAP;
            while !extract.is_char_boundary(cut) {
                cut -= 1;
            }
            extract.truncate(cut);
        }

        Ok(format!("{}: {}", summary.title, extract))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_registry_lookup_and_missing_tool() {
        let registry = travel_toolkit(reqwest::Client::new());

        assert!(registry.has("weather"));
        assert!(registry.has("time"));
        assert!(registry.has("city_facts"));
        assert_eq!(registry.schemas().len(), 3);

        let err = registry.call("flights", "Paris").await.unwrap_err();
        assert!(matches!(err, AgentError::ToolNotFound(_)));
    }

    #[tokio::test]
    async fn test_time_tool_known_city() {
        let tool = TimeTool::new();
        let result = tool.call("Tokyo").await.unwrap();
        assert!(result.contains("Tokyo"));
        assert!(result.contains("Asia/Tokyo"));
    }

    #[tokio::test]
    async fn test_time_tool_unknown_city_reports_utc() {
        let tool = TimeTool::new();
        let result = tool.call("Atlantis").await.unwrap();
        assert!(result.contains("not found"));
        assert!(result.contains("UTC"));
    }

    #[tokio::test]
    async fn test_weather_tool_without_key_degrades() {
        let tool = WeatherTool::new(reqwest::Client::new(), None);
        let result = tool.call("Paris").await.unwrap();
        assert!(result.contains("WEATHERAPI_KEY"));
    }

    #[tokio::test]
    async fn test_weather_tool_formats_conditions() {
        let server = MockServer::start().await;
        let body = serde_json::json!({
            "location": {"name": "Paris", "country": "France"},
            "current": {
                "temp_c": 21.5,
                "humidity": 40,
                "wind_kph": 13.0,
                "condition": {"text": "Sunny"}
            }
        });
        Mock::given(method("GET"))
            .and(path("/current.json"))
            .and(query_param("q", "Paris"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&server)
            .await;

        let tool = WeatherTool::new(reqwest::Client::new(), Some("key".to_string()))
            .with_base_url(server.uri());
        let result = tool.call("Paris").await.unwrap();
        assert!(result.contains("21.5°C"));
        assert!(result.contains("Sunny"));
        assert!(result.contains("Paris, France"));
    }

    #[tokio::test]
    async fn test_city_facts_falls_back_to_suffixed_title() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/page/summary/Springfield"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/page/summary/Springfield_city"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "title": "Springfield",
                "extract": "Springfield is a city."
            })))
            .mount(&server)
            .await;

        let tool = CityFactsTool::new(reqwest::Client::new()).with_base_url(server.uri());
        let result = tool.call("Springfield").await.unwrap();
        assert!(result.contains("Springfield is a city."));
    }

    #[tokio::test]
    async fn test_city_facts_caps_extract_length() {
        let server = MockServer::start().await;
        let long_extract = "x".repeat(4000);
        Mock::given(method("GET"))
            .and(path("/page/summary/Paris"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "title": "Paris",
                "extract": long_extract
            })))
            .mount(&server)
            .await;

        let tool = CityFactsTool::new(reqwest::Client::new()).with_base_url(server.uri());
        let result = tool.call("Paris").await.unwrap();
        assert!(result.len() <= FACTS_EXTRACT_CAP + "Paris: ".len());
    }
}
