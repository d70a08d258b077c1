use async_trait::async_trait;
use common::{CategoryId, CustomerId, OrderId, PaymentId, ProductId, StoreId};

use crate::{
    Category, Customer, Favorite, LineItem, LineItemTarget, NewCustomer, NewPayment, NewProduct,
    NewStore, Order, PaymentInstrument, Product, ProductQuery, ProfileUpdate, Rating,
    Recommendation, Removal, Result, Store, VisibilityFilter,
};

/// Core trait for ledger implementations.
///
/// The ledger is the single source of truth for every record in the
/// marketplace. All implementations must be thread-safe (Send + Sync).
///
/// Operations that touch a customer's open order are atomic units: an
/// implementation must guarantee that a customer never has more than one
/// open order, and that no line item is added to or removed from an order
/// once it has been closed.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    // -- customers --

    /// Registers a customer and issues its opaque token.
    async fn create_customer(&self, customer: NewCustomer) -> Result<Customer>;

    async fn get_customer(&self, id: CustomerId) -> Result<Option<Customer>>;

    /// Resolves the opaque token issued at registration.
    async fn customer_by_token(&self, token: &str) -> Result<Option<Customer>>;

    /// Updates mutable profile fields. Fails with `NotFound` for unknown ids.
    async fn update_profile(&self, id: CustomerId, update: ProfileUpdate) -> Result<Customer>;

    // -- categories and stores --

    async fn create_category(&self, name: &str) -> Result<Category>;

    async fn get_category(&self, id: CategoryId) -> Result<Option<Category>>;

    /// Returns all categories ordered by name.
    async fn list_categories(&self) -> Result<Vec<Category>>;

    /// Opens a store. Fails with `Conflict` if the owner already has one.
    async fn create_store(&self, store: NewStore) -> Result<Store>;

    async fn get_store(&self, id: StoreId) -> Result<Option<Store>>;

    async fn store_for_owner(&self, owner: CustomerId) -> Result<Option<Store>>;

    /// Links a product to a store. Linking twice is a no-op.
    async fn link_store_product(&self, store: StoreId, product: ProductId) -> Result<()>;

    /// Returns the products linked to a store, newest first.
    async fn store_products(
        &self,
        store: StoreId,
        visibility: VisibilityFilter,
    ) -> Result<Vec<Product>>;

    // -- products --

    async fn create_product(&self, product: NewProduct) -> Result<Product>;

    async fn get_product(
        &self,
        id: ProductId,
        visibility: VisibilityFilter,
    ) -> Result<Option<Product>>;

    /// Returns products matching the query, newest first.
    async fn list_products(&self, query: ProductQuery) -> Result<Vec<Product>>;

    /// Hides a product from default queries. Returns false if the product
    /// does not exist or is already hidden.
    async fn soft_delete_product(&self, id: ProductId) -> Result<bool>;

    /// Removes a product for good. Fails with `Conflict` while any line item
    /// references it.
    async fn purge_product(&self, id: ProductId) -> Result<()>;

    // -- cart and orders --

    /// Appends a line item for `product` to the customer's open order,
    /// creating the open order first if the customer has none.
    ///
    /// Lookup-or-create and the append happen as one atomic unit. Fails with
    /// `NotFound` if the product does not exist or is soft-deleted.
    async fn append_to_open_order(
        &self,
        customer: CustomerId,
        product: ProductId,
    ) -> Result<(Order, LineItem)>;

    async fn open_order(&self, customer: CustomerId) -> Result<Option<Order>>;

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>>;

    /// Returns every order of a customer, newest first.
    async fn orders_for_customer(&self, customer: CustomerId) -> Result<Vec<Order>>;

    /// Returns the line items of an order in insertion order.
    async fn line_items(&self, order: OrderId) -> Result<Vec<LineItem>>;

    /// Removes one line item from the customer's open order.
    async fn remove_from_open_order(
        &self,
        customer: CustomerId,
        target: LineItemTarget,
    ) -> Result<Removal>;

    /// Deletes the customer's open order together with its line items.
    /// Returns the deleted order, or None if there was no open order.
    async fn delete_open_order(&self, customer: CustomerId) -> Result<Option<Order>>;

    /// Closes the order if, and only if, it belongs to `customer` and is
    /// still open. This is a conditional update: returns None when the
    /// condition does not hold at the moment of the write.
    async fn close_order(
        &self,
        customer: CustomerId,
        order: OrderId,
        payment: PaymentId,
    ) -> Result<Option<Order>>;

    /// Counts line items for `product` whose order is closed.
    async fn count_sold(&self, product: ProductId) -> Result<u64>;

    /// Returns true if `customer` has a closed order containing `product`.
    async fn has_purchased(&self, customer: CustomerId, product: ProductId) -> Result<bool>;

    // -- payments --

    async fn create_payment(&self, payment: NewPayment) -> Result<PaymentInstrument>;

    async fn get_payment(&self, id: PaymentId) -> Result<Option<PaymentInstrument>>;

    async fn payments_for_customer(&self, customer: CustomerId) -> Result<Vec<PaymentInstrument>>;

    // -- ratings, likes, favorites, recommendations --

    /// Stores a rating. Several ratings from the same customer are allowed.
    async fn insert_rating(
        &self,
        customer: CustomerId,
        product: ProductId,
        score: u8,
        text: Option<String>,
    ) -> Result<Rating>;

    async fn ratings_for_product(&self, product: ProductId) -> Result<Vec<Rating>>;

    /// Inserts a like unless one already exists. Returns true if inserted.
    async fn insert_like(&self, customer: CustomerId, product: ProductId) -> Result<bool>;

    /// Deletes a like. Returns true if one was deleted.
    async fn delete_like(&self, customer: CustomerId, product: ProductId) -> Result<bool>;

    async fn count_likes(&self, product: ProductId) -> Result<u64>;

    async fn is_liked(&self, customer: CustomerId, product: ProductId) -> Result<bool>;

    /// Returns the active products a customer likes.
    async fn liked_products(&self, customer: CustomerId) -> Result<Vec<Product>>;

    /// Inserts a favorite unless one already exists. Returns the new record.
    async fn insert_favorite(
        &self,
        customer: CustomerId,
        store: StoreId,
    ) -> Result<Option<Favorite>>;

    async fn delete_favorite(&self, customer: CustomerId, store: StoreId) -> Result<bool>;

    async fn favorites_for_customer(&self, customer: CustomerId) -> Result<Vec<Favorite>>;

    async fn insert_recommendation(
        &self,
        recommender: CustomerId,
        recipient: CustomerId,
        product: ProductId,
    ) -> Result<Recommendation>;

    /// Recommendations made by `customer`.
    async fn recommendations_by(&self, customer: CustomerId) -> Result<Vec<Recommendation>>;

    /// Recommendations received by `customer`.
    async fn recommendations_for(&self, customer: CustomerId) -> Result<Vec<Recommendation>>;
}

/// Extension trait providing convenience methods for ledgers.
#[async_trait]
pub trait LedgerStoreExt: LedgerStore {
    /// Loads an active product or fails with `NotFound`.
    async fn require_product(&self, id: ProductId) -> Result<Product> {
        self.get_product(id, VisibilityFilter::ActiveOnly)
            .await?
            .ok_or_else(|| crate::LedgerError::not_found("product", id))
    }

    /// Counts the customer's open orders. Never more than one.
    async fn count_open_orders(&self, customer: CustomerId) -> Result<usize> {
        Ok(self
            .orders_for_customer(customer)
            .await?
            .iter()
            .filter(|order| order.is_open())
            .count())
    }
}

// Blanket implementation for all LedgerStore implementations
impl<T: LedgerStore + ?Sized> LedgerStoreExt for T {}
