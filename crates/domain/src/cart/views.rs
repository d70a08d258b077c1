use chrono::NaiveDate;
use common::{LineItemId, Money, ProductId};
use ledger::{Order, Product};
use serde::{Deserialize, Serialize};

/// How a removal addresses the customer's open order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CartRemoval {
    /// A specific line item.
    LineItem(LineItemId),
    /// The oldest line item holding this product.
    Product(ProductId),
    /// Every line item, and the open order itself.
    Empty,
}

/// A line item together with the product it references.
#[derive(Debug, Clone, Serialize)]
pub struct CartLine {
    pub id: LineItemId,
    pub product: Product,
}

/// The customer's open order as shown at the cart endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct Cart {
    #[serde(flatten)]
    pub order: Order,
    #[serde(rename = "lineitems")]
    pub line_items: Vec<CartLine>,
    pub size: usize,
    pub total: Money,
}

/// A closed order with its line items and total.
#[derive(Debug, Clone, Serialize)]
pub struct OrderSummary {
    #[serde(flatten)]
    pub order: Order,
    #[serde(rename = "lineitems")]
    pub line_items: Vec<CartLine>,
    pub total: Money,
}

/// Fields a customer supplies to register a payment instrument.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentTypeInput {
    pub merchant_name: String,
    pub account_number: String,
    pub expiration_date: NaiveDate,
}

/// Sums the current prices of the products on the lines.
pub(crate) fn total_of(lines: &[CartLine]) -> Money {
    lines.iter().map(|line| line.product.price).sum()
}
