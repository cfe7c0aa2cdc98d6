//! Built-in tools for Parley.
//!
//! A system prompt binds at most one of these by id. The registry is built
//! once at start-up and shared read-only.

pub mod coffee_order;
pub mod weather_lookup;

use parley_core::tool::ToolRegistry;
use std::sync::Arc;
use tracing::info;

pub use coffee_order::{COFFEE_TOOL_ID, CoffeeOrderTool};
pub use weather_lookup::{WEATHER_TOOL_ID, WeatherLookupTool};

/// Registry holding every built-in tool.
pub fn default_registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(WeatherLookupTool));
    registry.register(Arc::new(CoffeeOrderTool::new()));
    info!(tools = ?registry.names(), "Tool registry initialized");
    registry
}
