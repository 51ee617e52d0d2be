/// Geocoding Tool (OpenStreetMap Nominatim)

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::core::error::ExecutionError;
use crate::core::protocol::ToolOutput;
use crate::core::schema::{FieldSpec, InputSchema};
use crate::core::tool::{MCPTool, Tool};
use crate::tools::http::UpstreamClient;

#[derive(Debug, Deserialize)]
pub struct GeocodeArgs {
    address: String,
    #[serde(default)]
    limit: Option<u8>,
}

pub struct Geocode {
    tool: MCPTool,
    nominatim: UpstreamClient,
}

impl Geocode {
    pub fn new(nominatim: UpstreamClient) -> Self {
        Self {
            tool: MCPTool::new(
                "geocode",
                "Look up latitude and longitude for an address or place name.",
                InputSchema::new()
                    .field(FieldSpec::string("address", "Address or place name").length(1, 512))
                    .field(
                        FieldSpec::integer("limit", "Maximum number of matches (default 1)")
                            .optional()
                            .range(1.0, 10.0),
                    ),
            ),
            nominatim,
        }
    }
}

/// Render one Nominatim match.
pub fn format_place(place: &Value) -> Option<String> {
    let name = place.get("display_name").and_then(Value::as_str)?;
    let lat = coordinate(place.get("lat")?)?;
    let lon = coordinate(place.get("lon")?)?;
    Some(format!("{name}\nLatitude: {lat}\nLongitude: {lon}"))
}

/// Nominatim returns coordinates as strings; accept numbers too.
fn coordinate(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[async_trait]
impl Tool for Geocode {
    type Args = GeocodeArgs;

    fn descriptor(&self) -> &MCPTool {
        &self.tool
    }

    async fn execute(&self, args: GeocodeArgs) -> Result<ToolOutput, ExecutionError> {
        let limit = args.limit.unwrap_or(1).to_string();
        let results = self
            .nominatim
            .get(
                "search",
                &[("q", args.address.as_str()), ("format", "json"), ("limit", limit.as_str())],
            )
            .await
            .map_err(|e| ExecutionError::failed(format!("Unable to fetch location: {e}")))?;

        let places = results
            .as_array()
            .ok_or_else(|| self.nominatim.missing("results"))?;
        let rendered: Vec<String> = places.iter().filter_map(format_place).collect();
        if rendered.is_empty() {
            return Ok(ToolOutput::text(format!(
                "No location found for '{}'.",
                args.address
            )));
        }
        Ok(ToolOutput::text(rendered.join("\n---\n")))
    }
}
