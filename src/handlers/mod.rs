pub mod checkout;
pub mod error;
pub mod metrics;
