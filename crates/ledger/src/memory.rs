use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use common::{
    CategoryId, CustomerId, FavoriteId, OrderId, PaymentId, ProductId, RatingId,
    RecommendationId, StoreId,
};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    Category, Customer, Favorite, LedgerError, LineItem, LineItemTarget, Like, NewCustomer,
    NewPayment, NewProduct, NewStore, Order, PaymentInstrument, Product, ProductQuery,
    ProfileUpdate, Rating, Recommendation, Removal, Result, Store, Visibility, VisibilityFilter,
    store::LedgerStore,
};

#[derive(Default)]
struct LedgerState {
    customers: HashMap<CustomerId, Customer>,
    categories: HashMap<CategoryId, Category>,
    stores: HashMap<StoreId, Store>,
    store_products: Vec<(StoreId, ProductId)>,
    /// Insertion order is creation order.
    products: Vec<Product>,
    orders: Vec<Order>,
    line_items: Vec<LineItem>,
    payments: HashMap<PaymentId, PaymentInstrument>,
    ratings: Vec<Rating>,
    likes: Vec<Like>,
    favorites: Vec<Favorite>,
    recommendations: Vec<Recommendation>,
}

impl LedgerState {
    fn open_order(&self, customer: CustomerId) -> Option<&Order> {
        self.orders
            .iter()
            .find(|o| o.customer == customer && o.is_open())
    }

    fn product(&self, id: ProductId, visibility: VisibilityFilter) -> Option<&Product> {
        self.products
            .iter()
            .find(|p| p.id == id && visibility.admits(p.visibility))
    }

    fn is_closed(&self, order: OrderId) -> bool {
        self.orders.iter().any(|o| o.id == order && !o.is_open())
    }
}

/// In-memory ledger implementation for tests and local runs.
///
/// Every operation holds the single state lock for its whole
/// read-modify-write, so a customer's lookup-or-create of the open order
/// and the conditional close can never interleave.
#[derive(Clone, Default)]
pub struct InMemoryLedger {
    state: Arc<RwLock<LedgerState>>,
}

impl InMemoryLedger {
    /// Creates a new empty in-memory ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of orders stored.
    pub async fn order_count(&self) -> usize {
        self.state.read().await.orders.len()
    }

    /// Returns the total number of line items stored.
    pub async fn line_item_count(&self) -> usize {
        self.state.read().await.line_items.len()
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedger {
    async fn create_customer(&self, customer: NewCustomer) -> Result<Customer> {
        let customer = Customer {
            id: CustomerId::new(),
            first_name: customer.first_name,
            last_name: customer.last_name,
            email: customer.email,
            address: customer.address,
            phone_number: customer.phone_number,
            token: Uuid::new_v4().simple().to_string(),
            created_at: Utc::now(),
        };
        self.state
            .write()
            .await
            .customers
            .insert(customer.id, customer.clone());
        Ok(customer)
    }

    async fn get_customer(&self, id: CustomerId) -> Result<Option<Customer>> {
        Ok(self.state.read().await.customers.get(&id).cloned())
    }

    async fn customer_by_token(&self, token: &str) -> Result<Option<Customer>> {
        let state = self.state.read().await;
        Ok(state.customers.values().find(|c| c.token == token).cloned())
    }

    async fn update_profile(&self, id: CustomerId, update: ProfileUpdate) -> Result<Customer> {
        let mut state = self.state.write().await;
        let customer = state
            .customers
            .get_mut(&id)
            .ok_or_else(|| LedgerError::not_found("customer", id))?;
        if let Some(address) = update.address {
            customer.address = address;
        }
        if let Some(phone_number) = update.phone_number {
            customer.phone_number = phone_number;
        }
        Ok(customer.clone())
    }

    async fn create_category(&self, name: &str) -> Result<Category> {
        let category = Category {
            id: CategoryId::new(),
            name: name.to_string(),
        };
        self.state
            .write()
            .await
            .categories
            .insert(category.id, category.clone());
        Ok(category)
    }

    async fn get_category(&self, id: CategoryId) -> Result<Option<Category>> {
        Ok(self.state.read().await.categories.get(&id).cloned())
    }

    async fn list_categories(&self) -> Result<Vec<Category>> {
        let state = self.state.read().await;
        let mut categories: Vec<_> = state.categories.values().cloned().collect();
        categories.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(categories)
    }

    async fn create_store(&self, store: NewStore) -> Result<Store> {
        let mut state = self.state.write().await;
        if state.stores.values().any(|s| s.owner == store.owner) {
            return Err(LedgerError::Conflict(format!(
                "customer {} already owns a store",
                store.owner
            )));
        }
        let store = Store {
            id: StoreId::new(),
            owner: store.owner,
            name: store.name,
            description: store.description,
        };
        state.stores.insert(store.id, store.clone());
        Ok(store)
    }

    async fn get_store(&self, id: StoreId) -> Result<Option<Store>> {
        Ok(self.state.read().await.stores.get(&id).cloned())
    }

    async fn store_for_owner(&self, owner: CustomerId) -> Result<Option<Store>> {
        let state = self.state.read().await;
        Ok(state.stores.values().find(|s| s.owner == owner).cloned())
    }

    async fn link_store_product(&self, store: StoreId, product: ProductId) -> Result<()> {
        let mut state = self.state.write().await;
        if !state.stores.contains_key(&store) {
            return Err(LedgerError::not_found("store", store));
        }
        if state.product(product, VisibilityFilter::IncludeHidden).is_none() {
            return Err(LedgerError::not_found("product", product));
        }
        if !state.store_products.contains(&(store, product)) {
            state.store_products.push((store, product));
        }
        Ok(())
    }

    async fn store_products(
        &self,
        store: StoreId,
        visibility: VisibilityFilter,
    ) -> Result<Vec<Product>> {
        let state = self.state.read().await;
        let linked: HashSet<ProductId> = state
            .store_products
            .iter()
            .filter(|(s, _)| *s == store)
            .map(|(_, p)| *p)
            .collect();
        Ok(state
            .products
            .iter()
            .rev()
            .filter(|p| linked.contains(&p.id) && visibility.admits(p.visibility))
            .cloned()
            .collect())
    }

    async fn create_product(&self, product: NewProduct) -> Result<Product> {
        let mut state = self.state.write().await;
        if !state.categories.contains_key(&product.category) {
            return Err(LedgerError::not_found("category", product.category));
        }
        let product = Product {
            id: ProductId::new(),
            seller: product.seller,
            category: product.category,
            name: product.name,
            price: product.price,
            description: product.description,
            quantity: product.quantity,
            location: product.location,
            image_path: product.image_path,
            created_at: Utc::now(),
            visibility: Visibility::Active,
        };
        state.products.push(product.clone());
        Ok(product)
    }

    async fn get_product(
        &self,
        id: ProductId,
        visibility: VisibilityFilter,
    ) -> Result<Option<Product>> {
        Ok(self.state.read().await.product(id, visibility).cloned())
    }

    async fn list_products(&self, query: ProductQuery) -> Result<Vec<Product>> {
        let state = self.state.read().await;
        let products = state
            .products
            .iter()
            .rev()
            .filter(|p| query.visibility.admits(p.visibility))
            .filter(|p| query.category.is_none_or(|c| p.category == c))
            .filter(|p| query.seller.is_none_or(|s| p.seller == s))
            .take(query.limit.unwrap_or(usize::MAX))
            .cloned()
            .collect();
        Ok(products)
    }

    async fn soft_delete_product(&self, id: ProductId) -> Result<bool> {
        let mut state = self.state.write().await;
        match state
            .products
            .iter_mut()
            .find(|p| p.id == id && p.visibility == Visibility::Active)
        {
            Some(product) => {
                product.visibility = Visibility::Hidden;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn purge_product(&self, id: ProductId) -> Result<()> {
        let mut state = self.state.write().await;
        if state.product(id, VisibilityFilter::IncludeHidden).is_none() {
            return Err(LedgerError::not_found("product", id));
        }
        if state.line_items.iter().any(|item| item.product == id) {
            return Err(LedgerError::Conflict(format!(
                "product {id} is referenced by line items"
            )));
        }
        state.products.retain(|p| p.id != id);
        state.store_products.retain(|(_, p)| *p != id);
        state.likes.retain(|l| l.product != id);
        state.ratings.retain(|r| r.product != id);
        Ok(())
    }

    async fn append_to_open_order(
        &self,
        customer: CustomerId,
        product: ProductId,
    ) -> Result<(Order, LineItem)> {
        let mut state = self.state.write().await;

        if state.product(product, VisibilityFilter::ActiveOnly).is_none() {
            return Err(LedgerError::not_found("product", product));
        }

        let order = match state.open_order(customer) {
            Some(order) => order.clone(),
            None => {
                let order = Order::open(customer);
                tracing::debug!(order_id = %order.id, %customer, "opened new order");
                state.orders.push(order.clone());
                order
            }
        };

        let item = LineItem::new(order.id, product);
        state.line_items.push(item.clone());
        Ok((order, item))
    }

    async fn open_order(&self, customer: CustomerId) -> Result<Option<Order>> {
        Ok(self.state.read().await.open_order(customer).cloned())
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>> {
        let state = self.state.read().await;
        Ok(state.orders.iter().find(|o| o.id == id).cloned())
    }

    async fn orders_for_customer(&self, customer: CustomerId) -> Result<Vec<Order>> {
        let state = self.state.read().await;
        Ok(state
            .orders
            .iter()
            .rev()
            .filter(|o| o.customer == customer)
            .cloned()
            .collect())
    }

    async fn line_items(&self, order: OrderId) -> Result<Vec<LineItem>> {
        let state = self.state.read().await;
        Ok(state
            .line_items
            .iter()
            .filter(|item| item.order == order)
            .cloned()
            .collect())
    }

    async fn remove_from_open_order(
        &self,
        customer: CustomerId,
        target: LineItemTarget,
    ) -> Result<Removal> {
        let mut state = self.state.write().await;
        let Some(order_id) = state.open_order(customer).map(|o| o.id) else {
            return Ok(Removal::NoOpenOrder);
        };

        let position = state
            .line_items
            .iter()
            .position(|item| item.order == order_id && target.matches(item));

        Ok(match position {
            Some(index) => Removal::Removed(state.line_items.remove(index)),
            None => Removal::NotInCart,
        })
    }

    async fn delete_open_order(&self, customer: CustomerId) -> Result<Option<Order>> {
        let mut state = self.state.write().await;
        let Some(index) = state
            .orders
            .iter()
            .position(|o| o.customer == customer && o.is_open())
        else {
            return Ok(None);
        };

        let order = state.orders.remove(index);
        state.line_items.retain(|item| item.order != order.id);
        Ok(Some(order))
    }

    async fn close_order(
        &self,
        customer: CustomerId,
        order: OrderId,
        payment: PaymentId,
    ) -> Result<Option<Order>> {
        let mut state = self.state.write().await;
        let Some(order) = state
            .orders
            .iter_mut()
            .find(|o| o.id == order && o.customer == customer)
        else {
            return Ok(None);
        };

        if order.close(payment) {
            Ok(Some(order.clone()))
        } else {
            Ok(None)
        }
    }

    async fn count_sold(&self, product: ProductId) -> Result<u64> {
        let state = self.state.read().await;
        Ok(state
            .line_items
            .iter()
            .filter(|item| item.product == product && state.is_closed(item.order))
            .count() as u64)
    }

    async fn has_purchased(&self, customer: CustomerId, product: ProductId) -> Result<bool> {
        let state = self.state.read().await;
        let closed: HashSet<OrderId> = state
            .orders
            .iter()
            .filter(|o| o.customer == customer && !o.is_open())
            .map(|o| o.id)
            .collect();
        Ok(state
            .line_items
            .iter()
            .any(|item| item.product == product && closed.contains(&item.order)))
    }

    async fn create_payment(&self, payment: NewPayment) -> Result<PaymentInstrument> {
        let mut state = self.state.write().await;
        if !state.customers.contains_key(&payment.customer) {
            return Err(LedgerError::not_found("customer", payment.customer));
        }
        let payment = PaymentInstrument {
            id: PaymentId::new(),
            customer: payment.customer,
            merchant_name: payment.merchant_name,
            account_number: payment.account_number,
            expiration_date: payment.expiration_date,
            created_at: Utc::now(),
        };
        state.payments.insert(payment.id, payment.clone());
        Ok(payment)
    }

    async fn get_payment(&self, id: PaymentId) -> Result<Option<PaymentInstrument>> {
        Ok(self.state.read().await.payments.get(&id).cloned())
    }

    async fn payments_for_customer(&self, customer: CustomerId) -> Result<Vec<PaymentInstrument>> {
        let state = self.state.read().await;
        let mut payments: Vec<_> = state
            .payments
            .values()
            .filter(|p| p.customer == customer)
            .cloned()
            .collect();
        payments.sort_by_key(|p| p.created_at);
        Ok(payments)
    }

    async fn insert_rating(
        &self,
        customer: CustomerId,
        product: ProductId,
        score: u8,
        text: Option<String>,
    ) -> Result<Rating> {
        let mut state = self.state.write().await;
        if state.product(product, VisibilityFilter::IncludeHidden).is_none() {
            return Err(LedgerError::not_found("product", product));
        }
        let rating = Rating {
            id: RatingId::new(),
            customer,
            product,
            score,
            text,
            created_at: Utc::now(),
        };
        state.ratings.push(rating.clone());
        Ok(rating)
    }

    async fn ratings_for_product(&self, product: ProductId) -> Result<Vec<Rating>> {
        let state = self.state.read().await;
        Ok(state
            .ratings
            .iter()
            .filter(|r| r.product == product)
            .cloned()
            .collect())
    }

    async fn insert_like(&self, customer: CustomerId, product: ProductId) -> Result<bool> {
        let mut state = self.state.write().await;
        if state
            .likes
            .iter()
            .any(|l| l.customer == customer && l.product == product)
        {
            return Ok(false);
        }
        state.likes.push(Like {
            customer,
            product,
            created_at: Utc::now(),
        });
        Ok(true)
    }

    async fn delete_like(&self, customer: CustomerId, product: ProductId) -> Result<bool> {
        let mut state = self.state.write().await;
        let before = state.likes.len();
        state
            .likes
            .retain(|l| !(l.customer == customer && l.product == product));
        Ok(state.likes.len() < before)
    }

    async fn count_likes(&self, product: ProductId) -> Result<u64> {
        let state = self.state.read().await;
        Ok(state.likes.iter().filter(|l| l.product == product).count() as u64)
    }

    async fn is_liked(&self, customer: CustomerId, product: ProductId) -> Result<bool> {
        let state = self.state.read().await;
        Ok(state
            .likes
            .iter()
            .any(|l| l.customer == customer && l.product == product))
    }

    async fn liked_products(&self, customer: CustomerId) -> Result<Vec<Product>> {
        let state = self.state.read().await;
        Ok(state
            .likes
            .iter()
            .filter(|l| l.customer == customer)
            .filter_map(|l| state.product(l.product, VisibilityFilter::ActiveOnly))
            .cloned()
            .collect())
    }

    async fn insert_favorite(
        &self,
        customer: CustomerId,
        store: StoreId,
    ) -> Result<Option<Favorite>> {
        let mut state = self.state.write().await;
        if !state.stores.contains_key(&store) {
            return Err(LedgerError::not_found("store", store));
        }
        if state
            .favorites
            .iter()
            .any(|f| f.customer == customer && f.store == store)
        {
            return Ok(None);
        }
        let favorite = Favorite {
            id: FavoriteId::new(),
            customer,
            store,
            created_at: Utc::now(),
        };
        state.favorites.push(favorite.clone());
        Ok(Some(favorite))
    }

    async fn delete_favorite(&self, customer: CustomerId, store: StoreId) -> Result<bool> {
        let mut state = self.state.write().await;
        let before = state.favorites.len();
        state
            .favorites
            .retain(|f| !(f.customer == customer && f.store == store));
        Ok(state.favorites.len() < before)
    }

    async fn favorites_for_customer(&self, customer: CustomerId) -> Result<Vec<Favorite>> {
        let state = self.state.read().await;
        Ok(state
            .favorites
            .iter()
            .filter(|f| f.customer == customer)
            .cloned()
            .collect())
    }

    async fn insert_recommendation(
        &self,
        recommender: CustomerId,
        recipient: CustomerId,
        product: ProductId,
    ) -> Result<Recommendation> {
        let recommendation = Recommendation {
            id: RecommendationId::new(),
            recommender,
            recipient,
            product,
            created_at: Utc::now(),
        };
        self.state
            .write()
            .await
            .recommendations
            .push(recommendation.clone());
        Ok(recommendation)
    }

    async fn recommendations_by(&self, customer: CustomerId) -> Result<Vec<Recommendation>> {
        let state = self.state.read().await;
        Ok(state
            .recommendations
            .iter()
            .filter(|r| r.recommender == customer)
            .cloned()
            .collect())
    }

    async fn recommendations_for(&self, customer: CustomerId) -> Result<Vec<Recommendation>> {
        let state = self.state.read().await;
        Ok(state
            .recommendations
            .iter()
            .filter(|r| r.recipient == customer)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use common::Money;

    use super::*;
    use crate::store::LedgerStoreExt;

    async fn seed(ledger: &InMemoryLedger) -> (Customer, Product) {
        let customer = ledger
            .create_customer(NewCustomer {
                first_name: "Steve".into(),
                last_name: "Brownlee".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        let category = ledger.create_category("Sporting Goods").await.unwrap();
        let product = ledger
            .create_product(NewProduct {
                seller: customer.id,
                category: category.id,
                name: "Kite".into(),
                price: Money::from_cents(1499),
                description: "It flies high".into(),
                quantity: 60,
                location: "Pittsburgh".into(),
                image_path: None,
            })
            .await
            .unwrap();
        (customer, product)
    }

    #[tokio::test]
    async fn append_creates_open_order_once() {
        let ledger = InMemoryLedger::new();
        let (customer, product) = seed(&ledger).await;

        let (first, _) = ledger
            .append_to_open_order(customer.id, product.id)
            .await
            .unwrap();
        let (second, _) = ledger
            .append_to_open_order(customer.id, product.id)
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(ledger.order_count().await, 1);
        assert_eq!(ledger.line_items(first.id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn append_rejects_unknown_and_hidden_products() {
        let ledger = InMemoryLedger::new();
        let (customer, product) = seed(&ledger).await;

        let result = ledger
            .append_to_open_order(customer.id, ProductId::new())
            .await;
        assert!(matches!(result, Err(LedgerError::NotFound { .. })));

        ledger.soft_delete_product(product.id).await.unwrap();
        let result = ledger.append_to_open_order(customer.id, product.id).await;
        assert!(matches!(result, Err(LedgerError::NotFound { .. })));
        assert_eq!(ledger.order_count().await, 0);
    }

    #[tokio::test]
    async fn remove_by_product_takes_first_match() {
        let ledger = InMemoryLedger::new();
        let (customer, product) = seed(&ledger).await;
        let (order, first) = ledger
            .append_to_open_order(customer.id, product.id)
            .await
            .unwrap();
        ledger
            .append_to_open_order(customer.id, product.id)
            .await
            .unwrap();

        let removal = ledger
            .remove_from_open_order(customer.id, LineItemTarget::Product(product.id))
            .await
            .unwrap();
        assert_eq!(removal, Removal::Removed(first));
        assert_eq!(ledger.line_items(order.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn remove_without_open_order() {
        let ledger = InMemoryLedger::new();
        let (customer, product) = seed(&ledger).await;

        let removal = ledger
            .remove_from_open_order(customer.id, LineItemTarget::Product(product.id))
            .await
            .unwrap();
        assert_eq!(removal, Removal::NoOpenOrder);
    }

    #[tokio::test]
    async fn close_order_is_conditional() {
        let ledger = InMemoryLedger::new();
        let (customer, product) = seed(&ledger).await;
        let (order, _) = ledger
            .append_to_open_order(customer.id, product.id)
            .await
            .unwrap();

        let payment = PaymentId::new();
        let closed = ledger
            .close_order(customer.id, order.id, payment)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(closed.payment(), Some(payment));

        let again = ledger
            .close_order(customer.id, order.id, PaymentId::new())
            .await
            .unwrap();
        assert!(again.is_none());
        let stored = ledger.get_order(order.id).await.unwrap().unwrap();
        assert_eq!(stored.payment(), Some(payment));
    }

    #[tokio::test]
    async fn delete_open_order_cascades_line_items() {
        let ledger = InMemoryLedger::new();
        let (customer, product) = seed(&ledger).await;
        ledger
            .append_to_open_order(customer.id, product.id)
            .await
            .unwrap();

        let deleted = ledger.delete_open_order(customer.id).await.unwrap();
        assert!(deleted.is_some());
        assert_eq!(ledger.order_count().await, 0);
        assert_eq!(ledger.line_item_count().await, 0);
        assert!(ledger.delete_open_order(customer.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn count_sold_ignores_open_orders() {
        let ledger = InMemoryLedger::new();
        let (customer, product) = seed(&ledger).await;
        let (order, _) = ledger
            .append_to_open_order(customer.id, product.id)
            .await
            .unwrap();
        assert_eq!(ledger.count_sold(product.id).await.unwrap(), 0);
        assert!(!ledger.has_purchased(customer.id, product.id).await.unwrap());

        ledger
            .close_order(customer.id, order.id, PaymentId::new())
            .await
            .unwrap();
        assert_eq!(ledger.count_sold(product.id).await.unwrap(), 1);
        assert!(ledger.has_purchased(customer.id, product.id).await.unwrap());
    }

    #[tokio::test]
    async fn purge_refuses_referenced_products() {
        let ledger = InMemoryLedger::new();
        let (customer, product) = seed(&ledger).await;
        ledger
            .append_to_open_order(customer.id, product.id)
            .await
            .unwrap();

        let result = ledger.purge_product(product.id).await;
        assert!(matches!(result, Err(LedgerError::Conflict(_))));
        assert!(ledger.require_product(product.id).await.is_ok());
    }

    #[tokio::test]
    async fn likes_are_unique_per_pair() {
        let ledger = InMemoryLedger::new();
        let (customer, product) = seed(&ledger).await;

        assert!(ledger.insert_like(customer.id, product.id).await.unwrap());
        assert!(!ledger.insert_like(customer.id, product.id).await.unwrap());
        assert_eq!(ledger.count_likes(product.id).await.unwrap(), 1);
        assert!(ledger.delete_like(customer.id, product.id).await.unwrap());
        assert!(!ledger.delete_like(customer.id, product.id).await.unwrap());
    }

    #[tokio::test]
    async fn customer_resolves_by_token() {
        let ledger = InMemoryLedger::new();
        let (customer, _) = seed(&ledger).await;

        let found = ledger.customer_by_token(&customer.token).await.unwrap();
        assert_eq!(found.map(|c| c.id), Some(customer.id));
        assert!(ledger.customer_by_token("nope").await.unwrap().is_none());
    }
}
