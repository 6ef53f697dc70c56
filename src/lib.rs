//! QR payment checkout service.
//!
//! Creates QR payment orders with an external gateway and polls them until
//! they are paid, on behalf of a storefront checkout page.

pub mod app;
pub mod diagnostics;
pub mod handlers;
pub mod models;
pub mod services;
pub mod utils;
