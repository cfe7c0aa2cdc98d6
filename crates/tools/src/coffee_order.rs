//! Coffee-shop demo toolkit: browse the menu, place, check and cancel orders.
//!
//! Orders live in process memory and are numbered from 1.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parley_core::error::ToolError;
use parley_core::tool::{Tool, ToolResult};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;
use tracing::info;

pub const COFFEE_TOOL_ID: &str = "coffee_order";

#[derive(Debug, Clone, Copy, Serialize)]
pub struct MenuItem {
    pub name: &'static str,
    pub price_cents: u32,
}

pub const MENU: [MenuItem; 5] = [
    MenuItem { name: "americano", price_cents: 1800 },
    MenuItem { name: "latte", price_cents: 2400 },
    MenuItem { name: "cappuccino", price_cents: 2400 },
    MenuItem { name: "flat white", price_cents: 2600 },
    MenuItem { name: "mocha", price_cents: 2800 },
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Preparing,
    Cancelled,
}

#[derive(Debug, Clone, Serialize)]
pub struct CoffeeOrder {
    pub id: u64,
    pub item: &'static str,
    pub quantity: u32,
    pub total_cents: u32,
    pub status: OrderStatus,
    pub placed_at: DateTime<Utc>,
}

#[derive(Default)]
pub struct CoffeeOrderTool {
    orders: Mutex<BTreeMap<u64, CoffeeOrder>>,
    next_id: AtomicU64,
}

impl CoffeeOrderTool {
    pub fn new() -> Self {
        Self::default()
    }

    async fn place(&self, item: &str, quantity: u32) -> Result<CoffeeOrder, ToolError> {
        let wanted = item.trim().to_lowercase();
        let menu_item = MENU
            .iter()
            .find(|m| m.name == wanted)
            .ok_or_else(|| ToolError::InvalidArguments(format!("'{item}' is not on the menu")))?;
        if quantity == 0 || quantity > 20 {
            return Err(ToolError::InvalidArguments("quantity must be between 1 and 20".into()));
        }

        let order = CoffeeOrder {
            id: self.next_id.fetch_add(1, Ordering::Relaxed) + 1,
            item: menu_item.name,
            quantity,
            total_cents: menu_item.price_cents * quantity,
            status: OrderStatus::Preparing,
            placed_at: Utc::now(),
        };
        self.orders.lock().await.insert(order.id, order.clone());
        info!(order_id = order.id, item = order.item, quantity, "Coffee order placed");
        Ok(order)
    }

    async fn status(&self, id: u64) -> Result<CoffeeOrder, ToolError> {
        self.orders
            .lock()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| ToolError::InvalidArguments(format!("no order #{id}")))
    }

    async fn cancel(&self, id: u64) -> Result<CoffeeOrder, ToolError> {
        let mut orders = self.orders.lock().await;
        let order = orders
            .get_mut(&id)
            .ok_or_else(|| ToolError::InvalidArguments(format!("no order #{id}")))?;
        if order.status == OrderStatus::Cancelled {
            return Err(ToolError::ExecutionFailed {
                tool_name: COFFEE_TOOL_ID.into(),
                reason: format!("order #{id} is already cancelled"),
            });
        }
        order.status = OrderStatus::Cancelled;
        info!(order_id = id, "Coffee order cancelled");
        Ok(order.clone())
    }
}

fn order_id(arguments: &serde_json::Value) -> Result<u64, ToolError> {
    arguments["order_id"]
        .as_u64()
        .ok_or_else(|| ToolError::InvalidArguments("'order_id' is required".into()))
}

fn price(cents: u32) -> String {
    format!("{}.{:02}", cents / 100, cents % 100)
}

fn to_result(output: String, data: impl Serialize) -> Result<ToolResult, ToolError> {
    let data = serde_json::to_value(data).map_err(|e| ToolError::ExecutionFailed {
        tool_name: COFFEE_TOOL_ID.into(),
        reason: e.to_string(),
    })?;
    Ok(ToolResult {
        call_id: String::new(),
        success: true,
        output,
        data: Some(data),
    })
}

#[async_trait]
impl Tool for CoffeeOrderTool {
    fn name(&self) -> &str {
        COFFEE_TOOL_ID
    }

    fn description(&self) -> &str {
        "Coffee shop assistant. action=menu lists drinks and prices; action=order places an order \
         (item, quantity); action=status and action=cancel take an order_id."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "action": {
                    "type": "string",
                    "enum": ["menu", "order", "status", "cancel"]
                },
                "item": { "type": "string", "description": "Drink name from the menu" },
                "quantity": { "type": "integer", "minimum": 1, "default": 1 },
                "order_id": { "type": "integer" }
            },
            "required": ["action"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        match arguments["action"].as_str().unwrap_or_default() {
            "menu" => {
                let lines: Vec<String> = MENU
                    .iter()
                    .map(|m| format!("{}: {}", m.name, price(m.price_cents)))
                    .collect();
                to_result(lines.join("\n"), MENU)
            }
            "order" => {
                let item = arguments["item"]
                    .as_str()
                    .ok_or_else(|| ToolError::InvalidArguments("'item' is required".into()))?;
                let quantity = arguments["quantity"].as_u64().unwrap_or(1);
                let quantity = u32::try_from(quantity)
                    .map_err(|_| ToolError::InvalidArguments("quantity out of range".into()))?;
                let order = self.place(item, quantity).await?;
                let output = format!(
                    "Order #{} placed: {} x {}, total {}",
                    order.id,
                    order.quantity,
                    order.item,
                    price(order.total_cents)
                );
                to_result(output, order)
            }
            "status" => {
                let order = self.status(order_id(&arguments)?).await?;
                let output = format!("Order #{} is {:?}", order.id, order.status).to_lowercase();
                to_result(output, order)
            }
            "cancel" => {
                let order = self.cancel(order_id(&arguments)?).await?;
                to_result(format!("Order #{} cancelled", order.id), order)
            }
            other => Err(ToolError::InvalidArguments(format!(
                "unknown action '{other}' (expected menu, order, status or cancel)"
            ))),
        }
    }
}
