//! Cart/order lifecycle.
//!
//! A customer's cart is their open order. Adding the first product opens it,
//! attaching a payment instrument closes it for good, and the next add opens a
//! fresh one.

mod service;
mod views;

pub use service::CartService;
pub use views::{Cart, CartLine, CartRemoval, OrderSummary, PaymentTypeInput};
