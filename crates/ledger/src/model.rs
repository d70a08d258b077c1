//! Records persisted by the ledger.

use chrono::{DateTime, NaiveDate, Utc};
use common::{
    CategoryId, CustomerId, FavoriteId, LineItemId, Money, OrderId, PaymentId, ProductId,
    RatingId, RecommendationId, StoreId,
};
use serde::{Deserialize, Serialize};

/// A registered customer.
///
/// The identity is immutable; only the contact fields in [`ProfileUpdate`]
/// change after registration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub id: CustomerId,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub address: String,
    pub phone_number: String,
    /// Opaque principal handed out by the identity provider.
    #[serde(skip_serializing)]
    pub token: String,
    pub created_at: DateTime<Utc>,
}

impl Customer {
    /// Returns "first last", the name shown for sellers.
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Fields for registering a customer.
#[derive(Debug, Clone, Default)]
pub struct NewCustomer {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub address: String,
    pub phone_number: String,
}

/// Mutable profile fields; `None` leaves the field unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileUpdate {
    pub address: Option<String>,
    pub phone_number: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
}

/// A customer's storefront. A customer owns at most one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Store {
    pub id: StoreId,
    pub owner: CustomerId,
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone)]
pub struct NewStore {
    pub owner: CustomerId,
    pub name: String,
    pub description: String,
}

/// Soft-delete tag of a product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Active,
    /// Soft-deleted: retained for historical orders, hidden from default queries.
    Hidden,
}

/// Which products a query may return with respect to soft deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VisibilityFilter {
    #[default]
    ActiveOnly,
    IncludeHidden,
    HiddenOnly,
}

impl VisibilityFilter {
    /// Returns true if a product with the given visibility passes the filter.
    pub fn admits(&self, visibility: Visibility) -> bool {
        match self {
            VisibilityFilter::ActiveOnly => visibility == Visibility::Active,
            VisibilityFilter::IncludeHidden => true,
            VisibilityFilter::HiddenOnly => visibility == Visibility::Hidden,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub seller: CustomerId,
    pub category: CategoryId,
    pub name: String,
    pub price: Money,
    pub description: String,
    pub quantity: u32,
    pub location: String,
    pub image_path: Option<String>,
    pub created_at: DateTime<Utc>,
    pub visibility: Visibility,
}

/// Fields for listing a new product. Bounds are checked by the catalog
/// before the record reaches the ledger.
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub seller: CustomerId,
    pub category: CategoryId,
    pub name: String,
    pub price: Money,
    pub description: String,
    pub quantity: u32,
    pub location: String,
    pub image_path: Option<String>,
}

/// Lifecycle tag of an order.
///
/// An open order is the customer's cart. Attaching a payment instrument
/// closes it for good; the payment reference only exists on closed orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum OrderStatus {
    Open,
    Closed { payment: PaymentId },
}

impl OrderStatus {
    /// Builds the status from a nullable payment column.
    pub fn from_payment(payment: Option<PaymentId>) -> Self {
        match payment {
            Some(payment) => OrderStatus::Closed { payment },
            None => OrderStatus::Open,
        }
    }
}

/// An order record. The status only moves from open to closed, through the
/// ledger's close operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub customer: CustomerId,
    pub created_at: DateTime<Utc>,
    status: OrderStatus,
}

impl Order {
    /// Creates a fresh open order for a customer.
    pub fn open(customer: CustomerId) -> Self {
        Self {
            id: OrderId::new(),
            customer,
            created_at: Utc::now(),
            status: OrderStatus::Open,
        }
    }

    /// Rebuilds an order read back from storage.
    pub(crate) fn restore(
        id: OrderId,
        customer: CustomerId,
        created_at: DateTime<Utc>,
        status: OrderStatus,
    ) -> Self {
        Self {
            id,
            customer,
            created_at,
            status,
        }
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn is_open(&self) -> bool {
        self.status == OrderStatus::Open
    }

    /// Attaches `payment` to an open order. Returns false, leaving the order
    /// untouched, when it is already closed.
    pub(crate) fn close(&mut self, payment: PaymentId) -> bool {
        if !self.is_open() {
            return false;
        }
        self.status = OrderStatus::Closed { payment };
        true
    }

    /// Returns the payment instrument that closed the order, if any.
    pub fn payment(&self) -> Option<PaymentId> {
        match self.status {
            OrderStatus::Open => None,
            OrderStatus::Closed { payment } => Some(payment),
        }
    }
}

/// One unit of intent to purchase a product. Quantity is expressed by
/// repeating line items, never by a count field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub id: LineItemId,
    pub order: OrderId,
    pub product: ProductId,
    pub created_at: DateTime<Utc>,
}

impl LineItem {
    pub fn new(order: OrderId, product: ProductId) -> Self {
        Self {
            id: LineItemId::new(),
            order,
            product,
            created_at: Utc::now(),
        }
    }
}

/// Addresses a line item in the open order, either directly or by the
/// first line item holding a product.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineItemTarget {
    LineItem(LineItemId),
    Product(ProductId),
}

impl LineItemTarget {
    pub fn matches(&self, item: &LineItem) -> bool {
        match self {
            LineItemTarget::LineItem(id) => item.id == *id,
            LineItemTarget::Product(id) => item.product == *id,
        }
    }
}

/// Outcome of removing a line item from a customer's open order.
#[derive(Debug, Clone, PartialEq)]
pub enum Removal {
    NoOpenOrder,
    NotInCart,
    Removed(LineItem),
}

/// An opaque payment reference owned by a customer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentInstrument {
    pub id: PaymentId,
    pub customer: CustomerId,
    pub merchant_name: String,
    pub account_number: String,
    pub expiration_date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewPayment {
    pub customer: CustomerId,
    pub merchant_name: String,
    pub account_number: String,
    pub expiration_date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rating {
    pub id: RatingId,
    pub customer: CustomerId,
    pub product: ProductId,
    pub score: u8,
    pub text: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Like {
    pub customer: CustomerId,
    pub product: ProductId,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Favorite {
    pub id: FavoriteId,
    pub customer: CustomerId,
    pub store: StoreId,
    pub created_at: DateTime<Utc>,
}

/// Customer `recommender` pointed `recipient` at `product`. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub id: RecommendationId,
    pub recommender: CustomerId,
    pub recipient: CustomerId,
    pub product: ProductId,
    pub created_at: DateTime<Utc>,
}
