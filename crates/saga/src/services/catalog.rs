//! Catalog service trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use common::Money;

use crate::error::SagaError;

/// Current catalog data for a product.
#[derive(Debug, Clone)]
pub struct ProductInfo {
    pub sku: String,
    pub name: String,
    pub price: Money,
    pub stock: u32,
}

/// Trait for catalog lookups and stock mutation.
#[async_trait]
pub trait CatalogService: Send + Sync {
    /// Looks up a product by SKU.
    async fn get_product(&self, sku: &str) -> Result<Option<ProductInfo>, SagaError>;

    /// Decrements stock for the given (sku, quantity) pairs.
    async fn decrement_stock(&self, items: &[(String, u32)]) -> Result<(), SagaError>;
}

#[derive(Debug, Default)]
struct InMemoryCatalogState {
    products: HashMap<String, ProductInfo>,
    fail_on_decrement: bool,
}

/// In-memory catalog for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalogService {
    state: Arc<RwLock<InMemoryCatalogState>>,
}

impl InMemoryCatalogService {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a product.
    pub fn add_product(&self, sku: &str, name: &str, price: Money, stock: u32) {
        self.state.write().unwrap().products.insert(
            sku.to_string(),
            ProductInfo {
                sku: sku.to_string(),
                name: name.to_string(),
                price,
                stock,
            },
        );
    }

    /// Returns the current stock of a product.
    pub fn stock_of(&self, sku: &str) -> Option<u32> {
        self.state
            .read()
            .unwrap()
            .products
            .get(sku)
            .map(|p| p.stock)
    }

    /// Configures the catalog to fail stock decrements.
    pub fn set_fail_on_decrement(&self, fail: bool) {
        self.state.write().unwrap().fail_on_decrement = fail;
    }
}

#[async_trait]
impl CatalogService for InMemoryCatalogService {
    async fn get_product(&self, sku: &str) -> Result<Option<ProductInfo>, SagaError> {
        Ok(self.state.read().unwrap().products.get(sku).cloned())
    }

    async fn decrement_stock(&self, items: &[(String, u32)]) -> Result<(), SagaError> {
        let mut state = self.state.write().unwrap();

        if state.fail_on_decrement {
            return Err(SagaError::Collaborator {
                service: "catalog",
                message: "stock service unavailable".to_string(),
            });
        }

        for (sku, quantity) in items {
            let product =
                state
                    .products
                    .get_mut(sku)
                    .ok_or_else(|| SagaError::UnknownProduct {
                        sku: sku.clone(),
                    })?;
            if product.stock < *quantity {
                return Err(SagaError::InsufficientStock {
                    sku: sku.clone(),
                    requested: *quantity,
                    available: product.stock,
                });
            }
            product.stock -= quantity;
        }
        Ok(())
    }
}
