//! Carrier API trait, HTTP client, and in-memory mock.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::Money;
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::cache::TtlCache;
use crate::error::CarrierError;
use crate::status::CarrierStatus;
use crate::types::{
    CreateOrderRequest, CreatedOrder, District, FeeQuote, FeeRequest, GhnConfig, Province, Ward,
};

/// Trait for shipping carrier operations.
#[async_trait]
pub trait CarrierApi: Send + Sync {
    /// All provinces in the carrier's address hierarchy.
    async fn provinces(&self) -> Result<Vec<Province>, CarrierError>;

    /// Districts of a province.
    async fn districts(&self, province_id: i64) -> Result<Vec<District>, CarrierError>;

    /// Wards of a district.
    async fn wards(&self, district_id: i64) -> Result<Vec<Ward>, CarrierError>;

    /// Quotes the shipping fee for a destination and weight.
    async fn calculate_fee(&self, request: &FeeRequest) -> Result<FeeQuote, CarrierError>;

    /// Creates a shipping order and returns the carrier order code.
    async fn create_order(&self, request: &CreateOrderRequest)
    -> Result<CreatedOrder, CarrierError>;

    /// Current status of a carrier order.
    async fn order_status(&self, order_code: &str) -> Result<CarrierStatus, CarrierError>;

    /// Cancels a carrier order.
    async fn cancel_order(&self, order_code: &str) -> Result<(), CarrierError>;

    /// Resolves province/district/ward names to a district id and ward code.
    ///
    /// Name matching is case-insensitive. Unresolvable components fail with
    /// `AddressNotFound` naming the level that missed.
    async fn resolve_address(
        &self,
        province: &str,
        district: &str,
        ward: &str,
    ) -> Result<(i64, String), CarrierError> {
        let provinces = self.provinces().await?;
        let province_id = provinces
            .iter()
            .find(|p| p.province_name.eq_ignore_ascii_case(province))
            .map(|p| p.province_id)
            .ok_or_else(|| CarrierError::AddressNotFound {
                level: "province",
                name: province.to_string(),
            })?;

        let districts = self.districts(province_id).await?;
        let district_id = districts
            .iter()
            .find(|d| d.district_name.eq_ignore_ascii_case(district))
            .map(|d| d.district_id)
            .ok_or_else(|| CarrierError::AddressNotFound {
                level: "district",
                name: district.to_string(),
            })?;

        let wards = self.wards(district_id).await?;
        let ward_code = wards
            .iter()
            .find(|w| w.ward_name.eq_ignore_ascii_case(ward))
            .map(|w| w.ward_code.clone())
            .ok_or_else(|| CarrierError::AddressNotFound {
                level: "ward",
                name: ward.to_string(),
            })?;

        Ok((district_id, ward_code))
    }
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    code: i64,
    message: Option<String>,
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct FeeData {
    total: i64,
}

#[derive(Debug, Deserialize)]
struct CreateOrderData {
    order_code: String,
    sort_code: Option<String>,
    total_fee: Option<i64>,
    expected_delivery_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct OrderDetailData {
    status: String,
}

/// HTTP client for the carrier's public API.
///
/// Address master data is served through the TTL cache; misses and expiries
/// fall through to a live call.
#[derive(Clone)]
pub struct GhnClient {
    http: reqwest::Client,
    config: GhnConfig,
    provinces: TtlCache<Vec<Province>>,
    districts: TtlCache<Vec<District>>,
    wards: TtlCache<Vec<Ward>>,
}

impl GhnClient {
    /// Creates a new carrier client.
    pub fn new(config: GhnConfig) -> Result<Self, CarrierError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        let ttl = Duration::from_secs(config.cache_ttl_secs);

        Ok(Self {
            http,
            config,
            provinces: TtlCache::new(ttl),
            districts: TtlCache::new(ttl),
            wards: TtlCache::new(ttl),
        })
    }

    /// Drops expired address cache entries; returns how many were removed.
    pub async fn sweep_address_cache(&self) -> usize {
        self.provinces.sweep_expired().await
            + self.districts.sweep_expired().await
            + self.wards.sweep_expired().await
    }

    async fn post<T: DeserializeOwned>(
        &self,
        path: &str,
        body: serde_json::Value,
        what: &'static str,
    ) -> Result<T, CarrierError> {
        let url = format!("{}/{}", self.config.base_url, path);
        let response = self
            .http
            .post(&url)
            .header("Token", self.config.token.as_str())
            .header("ShopId", self.config.shop_id.as_str())
            .json(&body)
            .send()
            .await?;

        let envelope: Envelope<T> = response.json().await?;
        if envelope.code != 200 {
            return Err(CarrierError::Api {
                code: envelope.code,
                message: envelope.message.unwrap_or_default(),
            });
        }
        envelope.data.ok_or(CarrierError::MissingData(what))
    }
}

#[async_trait]
impl CarrierApi for GhnClient {
    async fn provinces(&self) -> Result<Vec<Province>, CarrierError> {
        if let Some(cached) = self.provinces.get("provinces").await {
            return Ok(cached);
        }

        let provinces: Vec<Province> = self
            .post("master-data/province", serde_json::json!({}), "provinces")
            .await?;
        self.provinces.insert("provinces", provinces.clone()).await;
        Ok(provinces)
    }

    async fn districts(&self, province_id: i64) -> Result<Vec<District>, CarrierError> {
        let key = format!("districts:{province_id}");
        if let Some(cached) = self.districts.get(&key).await {
            return Ok(cached);
        }

        let districts: Vec<District> = self
            .post(
                "master-data/district",
                serde_json::json!({ "province_id": province_id }),
                "districts",
            )
            .await?;
        self.districts.insert(key, districts.clone()).await;
        Ok(districts)
    }

    async fn wards(&self, district_id: i64) -> Result<Vec<Ward>, CarrierError> {
        let key = format!("wards:{district_id}");
        if let Some(cached) = self.wards.get(&key).await {
            return Ok(cached);
        }

        let wards: Vec<Ward> = self
            .post(
                "master-data/ward",
                serde_json::json!({ "district_id": district_id }),
                "wards",
            )
            .await?;
        self.wards.insert(key, wards.clone()).await;
        Ok(wards)
    }

    #[tracing::instrument(skip(self))]
    async fn calculate_fee(&self, request: &FeeRequest) -> Result<FeeQuote, CarrierError> {
        let data: FeeData = self
            .post(
                "v2/shipping-order/fee",
                serde_json::json!({
                    "to_district_id": request.to_district_id,
                    "to_ward_code": request.to_ward_code,
                    "weight": request.weight_grams,
                    "service_type_id": 2,
                }),
                "fee",
            )
            .await?;

        Ok(FeeQuote {
            total: Money::from_cents(data.total),
        })
    }

    #[tracing::instrument(skip(self, request), fields(client_order_code = %request.client_order_code))]
    async fn create_order(
        &self,
        request: &CreateOrderRequest,
    ) -> Result<CreatedOrder, CarrierError> {
        let items: Vec<serde_json::Value> = request
            .items
            .iter()
            .map(|item| {
                serde_json::json!({
                    "name": item.name,
                    "quantity": item.quantity,
                    "weight": item.weight_grams,
                })
            })
            .collect();

        let data: CreateOrderData = self
            .post(
                "v2/shipping-order/create",
                serde_json::json!({
                    "to_name": request.to_name,
                    "to_phone": request.to_phone,
                    "to_address": request.to_address,
                    "to_district_id": request.to_district_id,
                    "to_ward_code": request.to_ward_code,
                    "cod_amount": request.cod_amount.cents(),
                    "weight": request.weight_grams,
                    "service_type_id": 2,
                    "payment_type_id": 1,
                    "required_note": "KHONGCHOXEMHANG",
                    "client_order_code": request.client_order_code,
                    "items": items,
                }),
                "created order",
            )
            .await?;

        Ok(CreatedOrder {
            order_code: data.order_code,
            sort_code: data.sort_code,
            fee: Money::from_cents(data.total_fee.unwrap_or(0)),
            expected_delivery: data.expected_delivery_time,
        })
    }

    #[tracing::instrument(skip(self))]
    async fn order_status(&self, order_code: &str) -> Result<CarrierStatus, CarrierError> {
        let data: OrderDetailData = self
            .post(
                "v2/shipping-order/detail",
                serde_json::json!({ "order_code": order_code }),
                "order detail",
            )
            .await?;

        Ok(CarrierStatus::parse(&data.status))
    }

    #[tracing::instrument(skip(self))]
    async fn cancel_order(&self, order_code: &str) -> Result<(), CarrierError> {
        let _: serde_json::Value = self
            .post(
                "v2/switch-status/cancel",
                serde_json::json!({ "order_codes": [order_code] }),
                "cancel",
            )
            .await?;
        Ok(())
    }
}

#[derive(Debug)]
struct MockState {
    orders: HashMap<String, CarrierStatus>,
    next_id: u32,
    fee_cents: i64,
    fail_on_create: bool,
    fail_on_fee: bool,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            orders: HashMap::new(),
            next_id: 0,
            fee_cents: 30_000,
            fail_on_create: false,
            fail_on_fee: false,
        }
    }
}

/// In-memory carrier for testing.
///
/// Serves a small fixed address hierarchy and assigns sequential order codes.
#[derive(Debug, Clone, Default)]
pub struct MockCarrier {
    state: Arc<RwLock<MockState>>,
}

impl MockCarrier {
    /// Creates a new mock carrier.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the mock to fail order creation.
    pub fn set_fail_on_create(&self, fail: bool) {
        self.state.write().unwrap().fail_on_create = fail;
    }

    /// Configures the mock to fail fee quoting.
    pub fn set_fail_on_fee(&self, fail: bool) {
        self.state.write().unwrap().fail_on_fee = fail;
    }

    /// Sets the status the mock reports for an order.
    pub fn set_status(&self, order_code: &str, status: CarrierStatus) {
        self.state
            .write()
            .unwrap()
            .orders
            .insert(order_code.to_string(), status);
    }

    /// Returns the number of created orders.
    pub fn order_count(&self) -> usize {
        self.state.read().unwrap().orders.len()
    }
}

#[async_trait]
impl CarrierApi for MockCarrier {
    async fn provinces(&self) -> Result<Vec<Province>, CarrierError> {
        Ok(vec![
            Province {
                province_id: 201,
                province_name: "Hanoi".to_string(),
            },
            Province {
                province_id: 202,
                province_name: "Ho Chi Minh".to_string(),
            },
        ])
    }

    async fn districts(&self, province_id: i64) -> Result<Vec<District>, CarrierError> {
        Ok(match province_id {
            201 => vec![District {
                district_id: 1484,
                district_name: "Hoan Kiem".to_string(),
                province_id: 201,
            }],
            202 => vec![District {
                district_id: 1442,
                district_name: "Quan 1".to_string(),
                province_id: 202,
            }],
            _ => vec![],
        })
    }

    async fn wards(&self, district_id: i64) -> Result<Vec<Ward>, CarrierError> {
        Ok(match district_id {
            1484 => vec![Ward {
                ward_code: "1A0807".to_string(),
                ward_name: "Trang Tien".to_string(),
                district_id: 1484,
            }],
            1442 => vec![Ward {
                ward_code: "21211".to_string(),
                ward_name: "Ben Nghe".to_string(),
                district_id: 1442,
            }],
            _ => vec![],
        })
    }

    async fn calculate_fee(&self, _request: &FeeRequest) -> Result<FeeQuote, CarrierError> {
        let state = self.state.read().unwrap();
        if state.fail_on_fee {
            return Err(CarrierError::Api {
                code: 400,
                message: "fee service unavailable".to_string(),
            });
        }
        Ok(FeeQuote {
            total: Money::from_cents(state.fee_cents),
        })
    }

    async fn create_order(
        &self,
        _request: &CreateOrderRequest,
    ) -> Result<CreatedOrder, CarrierError> {
        let mut state = self.state.write().unwrap();
        if state.fail_on_create {
            return Err(CarrierError::Api {
                code: 500,
                message: "carrier unavailable".to_string(),
            });
        }

        state.next_id += 1;
        let order_code = format!("GHN{:06}", state.next_id);
        state
            .orders
            .insert(order_code.clone(), CarrierStatus::ReadyToPick);

        Ok(CreatedOrder {
            order_code,
            sort_code: Some("19-CT-01".to_string()),
            fee: Money::from_cents(state.fee_cents),
            expected_delivery: None,
        })
    }

    async fn order_status(&self, order_code: &str) -> Result<CarrierStatus, CarrierError> {
        let state = self.state.read().unwrap();
        state
            .orders
            .get(order_code)
            .cloned()
            .ok_or_else(|| CarrierError::OrderNotFound(order_code.to_string()))
    }

    async fn cancel_order(&self, order_code: &str) -> Result<(), CarrierError> {
        let mut state = self.state.write().unwrap();
        match state.orders.get_mut(order_code) {
            Some(status) => {
                *status = CarrierStatus::Cancel;
                Ok(())
            }
            None => Err(CarrierError::OrderNotFound(order_code.to_string())),
        }
    }
}
