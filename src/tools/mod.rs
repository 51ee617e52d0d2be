/// Tools Module
///
/// This module contains all tool implementations. Each family exposes its
/// tools as `Tool` implementations; `initialize_tools` builds the registry
/// once at startup.

pub mod bolna;
pub mod calc;
pub mod geocode;
pub mod http;
pub mod weather;

use std::io;

use crate::core::config::Config;
use crate::core::registry::ToolRegistry;
use self::http::UpstreamClient;

/// Build the registry with every tool family.
///
/// Failures here (HTTP client construction, duplicate tool names) are
/// startup errors and end the process.
pub fn initialize_tools(config: &Config) -> io::Result<ToolRegistry> {
    let client = http::build_client(config).map_err(io::Error::other)?;
    let mut registry = ToolRegistry::new();

    calc::register(&mut registry).map_err(io::Error::other)?;

    let nws = UpstreamClient::new(client.clone(), "weather.gov", config.nws_api_url.clone())
        .with_accept("application/geo+json");
    registry
        .register(weather::GetAlerts::new(nws.clone()))
        .map_err(io::Error::other)?;
    registry
        .register(weather::GetForecast::new(nws))
        .map_err(io::Error::other)?;

    let nominatim = UpstreamClient::new(
        client.clone(),
        "nominatim",
        config.nominatim_api_url.clone(),
    );
    registry
        .register(geocode::Geocode::new(nominatim))
        .map_err(io::Error::other)?;

    let bolna = UpstreamClient::new(client, "bolna", config.bolna_api_url.clone())
        .with_bearer(config.bolna_api_key.clone());
    bolna::register(&mut registry, bolna::BolnaApi::new(bolna)).map_err(io::Error::other)?;

    Ok(registry)
}
