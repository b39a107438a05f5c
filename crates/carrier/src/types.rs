//! Carrier API request/response types.

use chrono::{DateTime, Utc};
use common::Money;
use serde::{Deserialize, Serialize};

/// Weight assumed for a line item when the catalog does not know one.
pub const DEFAULT_ITEM_WEIGHT_GRAMS: u32 = 200;

/// Carrier connection settings.
#[derive(Debug, Clone)]
pub struct GhnConfig {
    /// API base URL.
    pub base_url: String,
    /// API token header value.
    pub token: String,
    /// Shop identifier header value.
    pub shop_id: String,
    /// TTL for the address master-data cache, in seconds.
    pub cache_ttl_secs: u64,
}

impl Default for GhnConfig {
    fn default() -> Self {
        Self {
            base_url: "https://dev-online-gateway.ghn.vn/shiip/public-api".to_string(),
            token: String::new(),
            shop_id: String::new(),
            cache_ttl_secs: 3600,
        }
    }
}

/// A province in the carrier's address hierarchy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Province {
    #[serde(rename = "ProvinceID")]
    pub province_id: i64,
    #[serde(rename = "ProvinceName")]
    pub province_name: String,
}

/// A district within a province.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct District {
    #[serde(rename = "DistrictID")]
    pub district_id: i64,
    #[serde(rename = "DistrictName")]
    pub district_name: String,
    #[serde(rename = "ProvinceID")]
    pub province_id: i64,
}

/// A ward within a district.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ward {
    #[serde(rename = "WardCode")]
    pub ward_code: String,
    #[serde(rename = "WardName")]
    pub ward_name: String,
    #[serde(rename = "DistrictID")]
    pub district_id: i64,
}

/// Fee quote request.
#[derive(Debug, Clone, Serialize)]
pub struct FeeRequest {
    pub to_district_id: i64,
    pub to_ward_code: String,
    pub weight_grams: u32,
}

/// Fee quote response.
#[derive(Debug, Clone, PartialEq)]
pub struct FeeQuote {
    pub total: Money,
}

/// One item on a carrier order.
#[derive(Debug, Clone, Serialize)]
pub struct CarrierItem {
    pub name: String,
    pub quantity: u32,
    pub weight_grams: u32,
}

/// Carrier order-creation request.
#[derive(Debug, Clone, Serialize)]
pub struct CreateOrderRequest {
    pub to_name: String,
    pub to_phone: String,
    pub to_address: String,
    pub to_district_id: i64,
    pub to_ward_code: String,
    /// Amount to collect on delivery; zero for prepaid orders.
    pub cod_amount: Money,
    pub weight_grams: u32,
    pub items: Vec<CarrierItem>,
    /// Client-side reference carried through for reconciliation.
    pub client_order_code: String,
}

/// Carrier order-creation result.
#[derive(Debug, Clone, PartialEq)]
pub struct CreatedOrder {
    /// The carrier's order code, used as the tracking number.
    pub order_code: String,
    /// Routing sort code.
    pub sort_code: Option<String>,
    /// Total shipping fee charged by the carrier.
    pub fee: Money,
    /// Expected delivery estimate.
    pub expected_delivery: Option<DateTime<Utc>>,
}
