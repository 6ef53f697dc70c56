use serde::de::{self, Deserializer, Unexpected, Visitor};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Payment state as reported by the QR gateway.
///
/// The gateway only documents `UNPAID` and `PAID`; anything else is kept as
/// `Unknown` so a new gateway state never breaks polling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Unpaid,
    Paid,
    #[serde(other)]
    Unknown,
}

impl PaymentStatus {
    pub fn is_paid(&self) -> bool {
        matches!(self, PaymentStatus::Paid)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Unpaid => "UNPAID",
            PaymentStatus::Paid => "PAID",
            PaymentStatus::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A pending QR payment created by the gateway for one checkout attempt.
///
/// `status` is only ever refreshed from gateway reads, never written locally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentOrder {
    pub order_id: String,
    /// Whole currency units, not minor units.
    #[serde(deserialize_with = "whole_amount")]
    pub amount: u64,
    pub currency: String,
    /// Encoded image payload (usually a base64 data URL), passed through as is.
    pub qr_image: String,
    pub status: PaymentStatus,
}

/// Accepts `5000` as well as `5000.0`. Fractional and negative amounts are rejected.
fn whole_amount<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    struct WholeAmount;

    impl<'de> Visitor<'de> for WholeAmount {
        type Value = u64;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a non-negative whole amount")
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<u64, E> {
            Ok(v)
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<u64, E> {
            u64::try_from(v).map_err(|_| E::invalid_value(Unexpected::Signed(v), &self))
        }

        fn visit_f64<E: de::Error>(self, v: f64) -> Result<u64, E> {
            if v.is_finite() && v >= 0.0 && v.fract() == 0.0 && v <= u64::MAX as f64 {
                Ok(v as u64)
            } else {
                Err(E::invalid_value(Unexpected::Float(v), &self))
            }
        }
    }

    deserializer.deserialize_any(WholeAmount)
}

// Body sent to `POST {base}/orders`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateOrderRequest {
    pub amount: u64,
}

// Body returned by `GET {base}/orders/{id}/status`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: PaymentStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_from_gateway_json() {
        let body = r#"{
            "order_id": "abc123",
            "amount": 5000,
            "currency": "KHR",
            "qr_image": "data:image/png;base64,iVBORw0KGgo=",
            "status": "UNPAID"
        }"#;

        let order: PaymentOrder = serde_json::from_str(body).unwrap();
        assert_eq!(order.order_id, "abc123");
        assert_eq!(order.amount, 5000);
        assert_eq!(order.currency, "KHR");
        assert_eq!(order.status, PaymentStatus::Unpaid);
    }

    #[test]
    fn test_amount_echoed_as_float() {
        let order = |amount: &str| {
            serde_json::from_str::<PaymentOrder>(&format!(
                r#"{{"order_id":"abc123","amount":{},"currency":"KHR","qr_image":"","status":"UNPAID"}}"#,
                amount
            ))
        };

        assert_eq!(order("5000.0").unwrap().amount, 5000);
        assert_eq!(order("5000").unwrap().amount, 5000);
        assert!(order("5000.5").is_err());
        assert!(order("-1").is_err());
        assert!(order("\"5000\"").is_err());
    }

    #[test]
    fn test_unrecognised_status_is_tolerated() {
        let status: StatusResponse = serde_json::from_str(r#"{"status":"EXPIRED"}"#).unwrap();
        assert_eq!(status.status, PaymentStatus::Unknown);
        assert!(!status.status.is_paid());
    }

    #[test]
    fn test_create_request_body() {
        let body = serde_json::to_value(CreateOrderRequest { amount: 5000 }).unwrap();
        assert_eq!(body, serde_json::json!({ "amount": 5000 }));
    }
}
