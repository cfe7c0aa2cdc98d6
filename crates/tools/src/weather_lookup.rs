//! Weather lookup tool backed by deterministic mock data.
//!
//! Readings are derived from a hash of the location name, so the same city
//! always reports the same weather and tests need no network.

use async_trait::async_trait;
use parley_core::error::ToolError;
use parley_core::tool::{Tool, ToolResult};
use serde::Serialize;

pub const WEATHER_TOOL_ID: &str = "weather_lookup";

const CONDITIONS: [&str; 6] = [
    "sunny",
    "partly cloudy",
    "overcast",
    "light rain",
    "thunderstorms",
    "fog",
];

pub struct WeatherLookupTool;

#[async_trait]
impl Tool for WeatherLookupTool {
    fn name(&self) -> &str {
        WEATHER_TOOL_ID
    }

    fn description(&self) -> &str {
        "Get the current weather for a city: temperature, conditions and humidity."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "location": {
                    "type": "string",
                    "description": "City name, e.g. \"Hangzhou\""
                },
                "units": {
                    "type": "string",
                    "enum": ["celsius", "fahrenheit"],
                    "default": "celsius"
                }
            },
            "required": ["location"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let location = arguments["location"]
            .as_str()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .ok_or_else(|| ToolError::InvalidArguments("'location' is required".into()))?;
        let fahrenheit = arguments["units"].as_str() == Some("fahrenheit");

        let report = WeatherReport::for_location(location, fahrenheit);
        let data = serde_json::to_value(&report).map_err(|e| ToolError::ExecutionFailed {
            tool_name: WEATHER_TOOL_ID.into(),
            reason: e.to_string(),
        })?;

        Ok(ToolResult {
            call_id: String::new(),
            success: true,
            output: report.summary(),
            data: Some(data),
        })
    }
}

#[derive(Debug, Serialize)]
struct WeatherReport {
    location: String,
    temperature: f64,
    unit: &'static str,
    conditions: &'static str,
    humidity: u32,
}

impl WeatherReport {
    fn for_location(location: &str, fahrenheit: bool) -> Self {
        let seed = location
            .to_lowercase()
            .bytes()
            .fold(17u32, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u32));

        let celsius = (seed % 38) as f64 - 3.0;
        let (temperature, unit) = if fahrenheit {
            (celsius * 1.8 + 32.0, "F")
        } else {
            (celsius, "C")
        };

        Self {
            location: location.to_string(),
            temperature: (temperature * 10.0).round() / 10.0,
            unit,
            conditions: CONDITIONS[(seed as usize >> 3) % CONDITIONS.len()],
            humidity: 25 + seed % 70,
        }
    }

    fn summary(&self) -> String {
        format!(
            "{}: {}, {}°{}, humidity {}%",
            self.location, self.conditions, self.temperature, self.unit, self.humidity
        )
    }
}
