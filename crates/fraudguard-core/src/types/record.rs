//! Raw and validated transaction records

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

/// Geolocation attached to a transaction or profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    /// Latitude in degrees, [-90, 90]
    pub latitude: Option<f64>,

    /// Longitude in degrees, [-180, 180]
    pub longitude: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
}

impl Location {
    /// Return (latitude, longitude) when both coordinates are present
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) => Some((lat, lon)),
            _ => None,
        }
    }
}

/// Raw input record as delivered by the upstream stream.
///
/// Every field is optional so that validation can report precise
/// field-level errors instead of opaque deserialization failures.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawRecord {
    pub transaction_id: Option<String>,
    pub customer_id: Option<String>,
    pub account_id: Option<String>,
    pub transaction_type: Option<String>,
    pub amount: Option<f64>,
    pub currency: Option<String>,
    pub merchant_id: Option<String>,
    pub merchant_category: Option<String>,
    pub location: Option<Location>,
    pub payment_method: Option<String>,
    pub card_present: Option<bool>,
    pub metadata: Option<serde_json::Value>,
    pub timestamp: Option<String>,
}

/// Validated, immutable transaction
///
/// Produced by [`crate::types::RecordValidator`]; the identifier uniquely
/// determines the transaction, so re-delivery of the same identifier must
/// yield identical stored output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub transaction_id: String,
    pub customer_id: String,
    pub account_id: Option<String>,
    pub transaction_type: Option<String>,
    pub amount: f64,
    pub currency: String,
    pub merchant_id: String,
    pub merchant_category: String,
    pub location: Option<Location>,
    pub payment_method: Option<String>,
    pub card_present: Option<bool>,
    pub timestamp: DateTime<FixedOffset>,
}

impl Transaction {
    /// Coordinates of the transaction location, when known
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        self.location.as_ref().and_then(Location::coordinates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_coordinates() {
        let location = Location {
            latitude: Some(40.7),
            longitude: Some(-74.0),
            city: Some("New York".to_string()),
            state: Some("NY".to_string()),
            country: Some("US".to_string()),
        };
        assert_eq!(location.coordinates(), Some((40.7, -74.0)));
    }

    #[test]
    fn test_location_without_coordinates() {
        let location = Location {
            latitude: None,
            longitude: Some(-74.0),
            city: None,
            state: None,
            country: Some("US".to_string()),
        };
        assert_eq!(location.coordinates(), None);
    }

    #[test]
    fn test_raw_record_deserialization() {
        let raw: RawRecord = serde_json::from_value(serde_json::json!({
            "transaction_id": "txn_001",
            "customer_id": "cust_000001",
            "amount": 42.50,
            "currency": "USD",
            "merchant_id": "merch_grocery_0001",
            "merchant_category": "grocery",
            "timestamp": "2024-03-15T12:00:00Z",
            "extra_field": "ignored"
        }))
        .unwrap();

        assert_eq!(raw.transaction_id.as_deref(), Some("txn_001"));
        assert_eq!(raw.amount, Some(42.50));
        assert!(raw.location.is_none());
    }
}
