/// Weather Tools (US National Weather Service)
///
/// - `get_alerts`: active alerts for a two-letter US state code
/// - `get_forecast`: the next five forecast periods for a coordinate
///
/// Upstream failures are reported as "Unable to fetch ..." so the client
/// sees a readable explanation instead of a transport error.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::core::error::ExecutionError;
use crate::core::protocol::ToolOutput;
use crate::core::schema::{FieldSpec, InputSchema};
use crate::core::tool::{MCPTool, Tool};
use crate::tools::http::UpstreamClient;

/// Number of forecast periods included in a reply.
const FORECAST_PERIODS: usize = 5;

fn field<'a>(value: &'a Value, key: &str) -> &'a str {
    value.get(key).and_then(Value::as_str).unwrap_or("Unknown")
}

/// Render one GeoJSON alert feature.
pub fn format_alert(feature: &Value) -> String {
    let props = feature.get("properties").unwrap_or(&Value::Null);
    format!(
        "Event: {}\nArea: {}\nSeverity: {}\nDescription: {}\nInstructions: {}",
        field(props, "event"),
        field(props, "areaDesc"),
        field(props, "severity"),
        props
            .get("description")
            .and_then(Value::as_str)
            .unwrap_or("No description available"),
        props
            .get("instruction")
            .and_then(Value::as_str)
            .unwrap_or("No specific instructions provided"),
    )
}

/// Render one forecast period.
pub fn format_period(period: &Value) -> String {
    let temperature = period
        .get("temperature")
        .map(|t| t.to_string())
        .unwrap_or_else(|| "?".to_string());
    format!(
        "{}:\nTemperature: {}°{}\nWind: {} {}\nForecast: {}",
        field(period, "name"),
        temperature,
        period
            .get("temperatureUnit")
            .and_then(Value::as_str)
            .unwrap_or(""),
        field(period, "windSpeed"),
        period
            .get("windDirection")
            .and_then(Value::as_str)
            .unwrap_or(""),
        field(period, "detailedForecast"),
    )
}

#[derive(Debug, Deserialize)]
pub struct AlertsArgs {
    state: String,
}

/// Areas the alerts endpoint accepts: the states, DC and the territories.
const STATE_CODES: [&str; 56] = [
    "AL", "AK", "AZ", "AR", "CA", "CO", "CT", "DE", "FL", "GA", "HI", "ID", "IL", "IN", "IA",
    "KS", "KY", "LA", "ME", "MD", "MA", "MI", "MN", "MS", "MO", "MT", "NE", "NV", "NH", "NJ",
    "NM", "NY", "NC", "ND", "OH", "OK", "OR", "PA", "RI", "SC", "SD", "TN", "TX", "UT", "VT",
    "VA", "WA", "WV", "WI", "WY", "DC", "PR", "VI", "GU", "AS", "MP",
];

pub struct GetAlerts {
    tool: MCPTool,
    nws: UpstreamClient,
}

impl GetAlerts {
    pub fn new(nws: UpstreamClient) -> Self {
        Self {
            tool: MCPTool::new(
                "get_alerts",
                "Get active weather alerts for a US state.",
                InputSchema::new().field(
                    FieldSpec::string("state", "Two-letter US state code (e.g. CA, NY)")
                        .one_of(STATE_CODES),
                ),
            ),
            nws,
        }
    }
}

#[async_trait]
impl Tool for GetAlerts {
    type Args = AlertsArgs;

    fn descriptor(&self) -> &MCPTool {
        &self.tool
    }

    async fn execute(&self, args: AlertsArgs) -> Result<ToolOutput, ExecutionError> {
        let state = args.state;
        let data = self
            .nws
            .get(&format!("alerts/active/area/{state}"), &[])
            .await
            .map_err(|e| ExecutionError::failed(format!("Unable to fetch alerts: {e}")))?;

        let features = data
            .get("features")
            .and_then(Value::as_array)
            .ok_or_else(|| {
                ExecutionError::failed(format!(
                    "Unable to fetch alerts: {}",
                    self.nws.missing("features")
                ))
            })?;

        if features.is_empty() {
            return Ok(ToolOutput::text(format!("No active alerts for {state}.")));
        }
        let alerts: Vec<String> = features.iter().map(format_alert).collect();
        Ok(ToolOutput::text(alerts.join("\n---\n")))
    }
}

#[derive(Debug, Deserialize)]
pub struct ForecastArgs {
    latitude: f64,
    longitude: f64,
}

pub struct GetForecast {
    tool: MCPTool,
    nws: UpstreamClient,
}

impl GetForecast {
    pub fn new(nws: UpstreamClient) -> Self {
        Self {
            tool: MCPTool::new(
                "get_forecast",
                "Get the weather forecast for a location.",
                InputSchema::new()
                    .field(
                        FieldSpec::number("latitude", "Latitude of the location")
                            .range(-90.0, 90.0),
                    )
                    .field(
                        FieldSpec::number("longitude", "Longitude of the location")
                            .range(-180.0, 180.0),
                    ),
            ),
            nws,
        }
    }

    async fn forecast_url(&self, args: &ForecastArgs) -> Result<String, ExecutionError> {
        let points = self
            .nws
            .get(
                &format!("points/{:.4},{:.4}", args.latitude, args.longitude),
                &[],
            )
            .await?;
        points
            .pointer("/properties/forecast")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| self.nws.missing("properties.forecast"))
    }
}

#[async_trait]
impl Tool for GetForecast {
    type Args = ForecastArgs;

    fn descriptor(&self) -> &MCPTool {
        &self.tool
    }

    async fn execute(&self, args: ForecastArgs) -> Result<ToolOutput, ExecutionError> {
        let url = self
            .forecast_url(&args)
            .await
            .map_err(|e| {
                ExecutionError::failed(format!(
                    "Unable to fetch forecast data for this location: {e}"
                ))
            })?;
        let forecast = self
            .nws
            .get_url(&url)
            .await
            .map_err(|e| {
                ExecutionError::failed(format!("Unable to fetch detailed forecast: {e}"))
            })?;

        let periods = forecast
            .pointer("/properties/periods")
            .and_then(Value::as_array)
            .ok_or_else(|| {
                ExecutionError::failed(format!(
                    "Unable to fetch detailed forecast: {}",
                    self.nws.missing("properties.periods")
                ))
            })?;

        let rendered: Vec<String> = periods
            .iter()
            .take(FORECAST_PERIODS)
            .map(format_period)
            .collect();
        if rendered.is_empty() {
            return Ok(ToolOutput::text("No forecast periods available for this location."));
        }
        Ok(ToolOutput::text(rendered.join("\n---\n")))
    }
}
