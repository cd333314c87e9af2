use chrono::{DateTime, Utc};
use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::Number;

/// The only `schema_version` this client reads and writes.
pub const MENU_SCHEMA_VERSION: u32 = 1;

/// Menu data as stored in the `menus.data` column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MenuDocument {
    #[serde(deserialize_with = "integral_version")]
    pub schema_version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub categories: Vec<MenuCategory>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme: Option<MenuTheme>,
}

/// Accepts `1` and `1.0` alike; any non-integral or out-of-range number fails.
fn integral_version<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    let number = Number::deserialize(deserializer)?;
    let version = match number.as_u64() {
        Some(v) => Some(v),
        None => number
            .as_f64()
            .filter(|v| v.fract() == 0.0 && *v >= 0.0 && *v <= f64::from(u32::MAX))
            .map(|v| v as u64),
    };

    version
        .and_then(|v| u32::try_from(v).ok())
        .ok_or_else(|| de::Error::custom(format!("invalid schema_version {}", number)))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MenuCategory {
    pub name: String,
    pub items: Vec<MenuItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MenuItem {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// `None` covers both an absent and a `null` price.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<Price>,
}

impl MenuItem {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            price: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_price(mut self, price: Price) -> Self {
        self.price = Some(price);
        self
    }
}

/// Menus print numeric prices as well as free text ("ask your server").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Price {
    Amount(Number),
    Text(String),
}

impl Price {
    /// Numeric price; `None` for NaN or infinite values, which JSON cannot carry.
    pub fn amount(value: f64) -> Option<Self> {
        Number::from_f64(value).map(Price::Amount)
    }

    pub fn text(value: impl Into<String>) -> Self {
        Price::Text(value.into())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuTheme {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font: Option<String>,
}

/// Full menu record, document plus ownership metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MenuRecord {
    pub id: String,
    pub user_id: String,
    pub data: MenuDocument,
    #[serde(default)]
    pub is_published: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateMenuResponse {
    pub menu_id: String,
    pub data: MenuDocument,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishMenuResponse {
    pub public_url: String,
}
