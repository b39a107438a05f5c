//! Carrier status vocabulary and its mapping to the internal shipping status.

use domain::ShippingStatus;
use serde::{Deserialize, Serialize};

/// The carrier's own status vocabulary, decoded strictly at the boundary.
///
/// Codes outside the known set land in `Unknown` (carrying the raw code), so
/// tracking sync never hard-fails on carrier vocabulary drift.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CarrierStatus {
    ReadyToPick,
    Picking,
    MoneyCollectPicking,
    Picked,
    Storing,
    Transporting,
    Sorting,
    Delivering,
    MoneyCollectDelivering,
    Delivered,
    DeliveryFail,
    WaitingToReturn,
    Return,
    ReturnTransporting,
    ReturnSorting,
    Returned,
    Cancel,
    Lost,
    Damage,
    /// Status code outside the known vocabulary.
    Unknown(String),
}

impl CarrierStatus {
    /// Decodes a carrier status code. Never fails; unmapped codes become
    /// `Unknown`.
    pub fn parse(code: &str) -> Self {
        match code {
            "ready_to_pick" => CarrierStatus::ReadyToPick,
            "picking" => CarrierStatus::Picking,
            "money_collect_picking" => CarrierStatus::MoneyCollectPicking,
            "picked" => CarrierStatus::Picked,
            "storing" => CarrierStatus::Storing,
            "transporting" => CarrierStatus::Transporting,
            "sorting" => CarrierStatus::Sorting,
            "delivering" => CarrierStatus::Delivering,
            "money_collect_delivering" => CarrierStatus::MoneyCollectDelivering,
            "delivered" => CarrierStatus::Delivered,
            "delivery_fail" => CarrierStatus::DeliveryFail,
            "waiting_to_return" => CarrierStatus::WaitingToReturn,
            "return" => CarrierStatus::Return,
            "return_transporting" => CarrierStatus::ReturnTransporting,
            "return_sorting" => CarrierStatus::ReturnSorting,
            "returned" => CarrierStatus::Returned,
            "cancel" => CarrierStatus::Cancel,
            "lost" => CarrierStatus::Lost,
            "damage" => CarrierStatus::Damage,
            other => CarrierStatus::Unknown(other.to_string()),
        }
    }

    /// Returns the carrier wire code for this status.
    pub fn as_code(&self) -> &str {
        match self {
            CarrierStatus::ReadyToPick => "ready_to_pick",
            CarrierStatus::Picking => "picking",
            CarrierStatus::MoneyCollectPicking => "money_collect_picking",
            CarrierStatus::Picked => "picked",
            CarrierStatus::Storing => "storing",
            CarrierStatus::Transporting => "transporting",
            CarrierStatus::Sorting => "sorting",
            CarrierStatus::Delivering => "delivering",
            CarrierStatus::MoneyCollectDelivering => "money_collect_delivering",
            CarrierStatus::Delivered => "delivered",
            CarrierStatus::DeliveryFail => "delivery_fail",
            CarrierStatus::WaitingToReturn => "waiting_to_return",
            CarrierStatus::Return => "return",
            CarrierStatus::ReturnTransporting => "return_transporting",
            CarrierStatus::ReturnSorting => "return_sorting",
            CarrierStatus::Returned => "returned",
            CarrierStatus::Cancel => "cancel",
            CarrierStatus::Lost => "lost",
            CarrierStatus::Damage => "damage",
            CarrierStatus::Unknown(code) => code,
        }
    }

    /// Maps the carrier vocabulary onto the internal shipping status.
    pub fn to_shipping_status(&self) -> ShippingStatus {
        match self {
            CarrierStatus::ReadyToPick
            | CarrierStatus::Picking
            | CarrierStatus::MoneyCollectPicking => ShippingStatus::Pending,
            CarrierStatus::Picked
            | CarrierStatus::Storing
            | CarrierStatus::Transporting
            | CarrierStatus::Sorting => ShippingStatus::Shipped,
            CarrierStatus::Delivering
            | CarrierStatus::MoneyCollectDelivering
            | CarrierStatus::DeliveryFail => ShippingStatus::OutForDelivery,
            CarrierStatus::Delivered => ShippingStatus::Delivered,
            CarrierStatus::WaitingToReturn
            | CarrierStatus::Return
            | CarrierStatus::ReturnTransporting
            | CarrierStatus::ReturnSorting
            | CarrierStatus::Returned => ShippingStatus::Returned,
            CarrierStatus::Cancel => ShippingStatus::Cancelled,
            CarrierStatus::Lost | CarrierStatus::Damage => ShippingStatus::Failed,
            CarrierStatus::Unknown(_) => ShippingStatus::Unknown,
        }
    }
}

impl std::fmt::Display for CarrierStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_codes_roundtrip() {
        for code in [
            "ready_to_pick",
            "picking",
            "picked",
            "storing",
            "transporting",
            "sorting",
            "delivering",
            "delivered",
            "delivery_fail",
            "waiting_to_return",
            "return",
            "returned",
            "cancel",
            "lost",
            "damage",
        ] {
            let status = CarrierStatus::parse(code);
            assert!(!matches!(status, CarrierStatus::Unknown(_)), "{code}");
            assert_eq!(status.as_code(), code);
        }
    }

    #[test]
    fn test_unmapped_code_becomes_unknown() {
        let status = CarrierStatus::parse("teleported");
        assert_eq!(status, CarrierStatus::Unknown("teleported".to_string()));
        assert_eq!(status.to_shipping_status(), ShippingStatus::Unknown);
        assert_eq!(status.as_code(), "teleported");
    }

    #[test]
    fn test_mapping_to_shipping_status() {
        assert_eq!(
            CarrierStatus::ReadyToPick.to_shipping_status(),
            ShippingStatus::Pending
        );
        assert_eq!(
            CarrierStatus::Transporting.to_shipping_status(),
            ShippingStatus::Shipped
        );
        assert_eq!(
            CarrierStatus::Delivering.to_shipping_status(),
            ShippingStatus::OutForDelivery
        );
        assert_eq!(
            CarrierStatus::Delivered.to_shipping_status(),
            ShippingStatus::Delivered
        );
        assert_eq!(
            CarrierStatus::Returned.to_shipping_status(),
            ShippingStatus::Returned
        );
        assert_eq!(
            CarrierStatus::Cancel.to_shipping_status(),
            ShippingStatus::Cancelled
        );
        assert_eq!(
            CarrierStatus::Lost.to_shipping_status(),
            ShippingStatus::Failed
        );
    }
}
