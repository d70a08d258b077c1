//! Integration tests for the cart/order lifecycle and the aggregates fed by
//! it.
//!
//! These tests drive the services end to end over the in-memory ledger,
//! including concurrent access to a single customer's cart.

use std::sync::Arc;

use chrono::NaiveDate;
use common::{Money, PaymentId, ProductId};
use domain::{AggregationService, CartRemoval, CartService, DomainError, PaymentTypeInput};
use futures_util::future::join_all;
use ledger::{
    Customer, InMemoryLedger, LedgerStore, LedgerStoreExt, NewCustomer, NewProduct, Product,
};

struct Marketplace {
    store: InMemoryLedger,
    cart: CartService<InMemoryLedger>,
    aggregation: AggregationService<InMemoryLedger>,
}

impl Marketplace {
    fn new() -> Self {
        let store = InMemoryLedger::new();
        Self {
            cart: CartService::new(store.clone()),
            aggregation: AggregationService::new(store.clone()),
            store,
        }
    }

    async fn customer(&self, first_name: &str) -> Customer {
        self.store
            .create_customer(NewCustomer {
                first_name: first_name.to_string(),
                last_name: "Tester".to_string(),
                email: format!("{}@example.com", first_name.to_lowercase()),
                ..Default::default()
            })
            .await
            .unwrap()
    }

    async fn product(&self, seller: &Customer, name: &str, cents: i64) -> Product {
        let category = self.store.create_category("Sporting Goods").await.unwrap();
        self.store
            .create_product(NewProduct {
                seller: seller.id,
                category: category.id,
                name: name.to_string(),
                price: Money::from_cents(cents),
                description: "For testing".to_string(),
                quantity: 100,
                location: "Nashville".to_string(),
                image_path: None,
            })
            .await
            .unwrap()
    }

    async fn payment(&self, customer: &Customer) -> PaymentId {
        self.cart
            .add_payment_type(
                customer,
                PaymentTypeInput {
                    merchant_name: "Visa".to_string(),
                    account_number: "4111111111111111".to_string(),
                    expiration_date: NaiveDate::from_ymd_opt(2030, 12, 31).unwrap(),
                },
            )
            .await
            .unwrap()
            .id
    }
}

mod cart_lifecycle {
    use super::*;

    #[tokio::test]
    async fn add_and_remove_single_product() {
        let market = Marketplace::new();
        let c1 = market.customer("Steve").await;
        let p1 = market.product(&c1, "Kite", 1499).await;

        market.cart.add_to_cart(&c1, p1.id).await.unwrap();
        let cart = market.cart.view_cart(&c1).await.unwrap();
        assert_eq!(cart.size, 1);
        assert_eq!(cart.total, Money::from_cents(1499));
        assert_eq!(cart.total.to_string(), "$14.99");

        market
            .cart
            .remove_from_cart(&c1, CartRemoval::Product(p1.id))
            .await
            .unwrap();
        let cart = market.cart.view_cart(&c1).await.unwrap();
        assert_eq!(cart.size, 0);
        assert!(cart.total.is_zero());
    }

    #[tokio::test]
    async fn checkout_starts_a_new_cycle() {
        let market = Marketplace::new();
        let c1 = market.customer("Steve").await;
        let p1 = market.product(&c1, "Kite", 1499).await;
        let pay1 = market.payment(&c1).await;

        let first = market.cart.add_to_cart(&c1, p1.id).await.unwrap();
        market
            .cart
            .checkout(&c1, first.order, Some(pay1))
            .await
            .unwrap();

        let second = market.cart.add_to_cart(&c1, p1.id).await.unwrap();
        assert_ne!(second.order, first.order);

        let cart = market.cart.view_cart(&c1).await.unwrap();
        assert_eq!(cart.order.id, second.order);
        assert_eq!(cart.size, 1);
        assert_eq!(cart.order.payment(), None);
    }

    #[tokio::test]
    async fn closed_order_rejects_mutation() {
        let market = Marketplace::new();
        let c1 = market.customer("Steve").await;
        let p1 = market.product(&c1, "Kite", 1499).await;
        let pay1 = market.payment(&c1).await;

        let item = market.cart.add_to_cart(&c1, p1.id).await.unwrap();
        market
            .cart
            .checkout(&c1, item.order, Some(pay1))
            .await
            .unwrap();

        let removal = market
            .cart
            .remove_from_cart(&c1, CartRemoval::LineItem(item.id))
            .await;
        assert!(matches!(removal, Err(DomainError::NotFound(_))));

        let empty = market.cart.remove_from_cart(&c1, CartRemoval::Empty).await;
        assert!(matches!(empty, Err(DomainError::NotFound(_))));

        let again = market.cart.checkout(&c1, item.order, Some(pay1)).await;
        assert!(matches!(again, Err(DomainError::NotFound(_))));

        // The closed order still holds its single line item.
        let summary = market.cart.closed_order(&c1, item.order).await.unwrap();
        assert_eq!(summary.line_items.len(), 1);
        assert_eq!(summary.total, Money::from_cents(1499));
    }

    #[tokio::test]
    async fn number_sold_ignores_carts() {
        let market = Marketplace::new();
        let c1 = market.customer("Steve").await;
        let p1 = market.product(&c1, "Kite", 1499).await;
        let pay1 = market.payment(&c1).await;

        let item = market.cart.add_to_cart(&c1, p1.id).await.unwrap();
        assert_eq!(market.aggregation.number_sold(p1.id).await.unwrap(), 0);

        market
            .cart
            .checkout(&c1, item.order, Some(pay1))
            .await
            .unwrap();
        assert_eq!(market.aggregation.number_sold(p1.id).await.unwrap(), 1);

        market.cart.add_to_cart(&c1, p1.id).await.unwrap();
        assert_eq!(market.aggregation.number_sold(p1.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn cart_total_follows_current_prices_of_many_items() {
        let market = Marketplace::new();
        let c1 = market.customer("Steve").await;
        let kite = market.product(&c1, "Kite", 1499).await;
        let ball = market.product(&c1, "Ball", 333).await;

        for product in [kite.id, ball.id, ball.id, ball.id] {
            market.cart.add_to_cart(&c1, product).await.unwrap();
        }

        let cart = market.cart.view_cart(&c1).await.unwrap();
        assert_eq!(cart.size, 4);
        assert_eq!(cart.total, Money::from_cents(1499 + 3 * 333));
    }

    #[tokio::test]
    async fn hidden_product_cannot_be_added() {
        let market = Marketplace::new();
        let c1 = market.customer("Steve").await;
        let p1 = market.product(&c1, "Kite", 1499).await;
        market.store.soft_delete_product(p1.id).await.unwrap();

        let result = market.cart.add_to_cart(&c1, p1.id).await;
        assert!(matches!(result, Err(DomainError::NotFound(_))));

        let result = market.cart.add_to_cart(&c1, ProductId::new()).await;
        assert!(matches!(result, Err(DomainError::NotFound(_))));
    }
}

mod ratings_and_likes {
    use super::*;

    #[tokio::test]
    async fn average_of_two_ratings() {
        let market = Marketplace::new();
        let seller = market.customer("Steve").await;
        let c2 = market.customer("Meg").await;
        let c3 = market.customer("Joe").await;
        let p1 = market.product(&seller, "Kite", 1499).await;

        assert_eq!(market.aggregation.average_rating(p1.id).await.unwrap(), 0.0);

        market
            .aggregation
            .add_rating(p1.id, &c2, 4, Some("Flies well".to_string()))
            .await
            .unwrap();
        market
            .aggregation
            .add_rating(p1.id, &c3, 2, None)
            .await
            .unwrap();

        assert_eq!(market.aggregation.average_rating(p1.id).await.unwrap(), 3.0);
        assert_eq!(market.aggregation.rating_count(p1.id).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn duplicate_like_conflicts() {
        let market = Marketplace::new();
        let seller = market.customer("Steve").await;
        let c2 = market.customer("Meg").await;
        let p1 = market.product(&seller, "Kite", 1499).await;

        market.aggregation.toggle_like(p1.id, &c2, true).await.unwrap();
        let again = market.aggregation.toggle_like(p1.id, &c2, true).await;
        assert!(matches!(again, Err(DomainError::Conflict(_))));

        assert_eq!(market.aggregation.number_of_likes(p1.id).await.unwrap(), 1);
        let liked = market.aggregation.liked_products(&c2).await.unwrap();
        assert_eq!(liked.len(), 1);
        assert!(liked[0].metrics.is_liked);
    }

    #[tokio::test]
    async fn buying_makes_a_product_rateable() {
        let market = Marketplace::new();
        let seller = market.customer("Steve").await;
        let buyer = market.customer("Meg").await;
        let p1 = market.product(&seller, "Kite", 1499).await;
        let pay = market.payment(&buyer).await;

        let item = market.cart.add_to_cart(&buyer, p1.id).await.unwrap();
        assert!(!market.aggregation.can_be_rated(p1.id, buyer.id).await.unwrap());

        market
            .cart
            .checkout(&buyer, item.order, Some(pay))
            .await
            .unwrap();
        assert!(market.aggregation.can_be_rated(p1.id, buyer.id).await.unwrap());
    }
}

mod concurrency {
    use super::*;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_adds_share_one_open_order() {
        let market = Arc::new(Marketplace::new());
        let c1 = market.customer("Steve").await;
        let product = market.product(&c1, "Kite", 1499).await.id;

        let tasks = (0..32).map(|_| {
            let market = Arc::clone(&market);
            let customer = c1.clone();
            tokio::spawn(async move { market.cart.add_to_cart(&customer, product).await })
        });
        let items: Vec<_> = join_all(tasks)
            .await
            .into_iter()
            .map(|joined| joined.unwrap().unwrap())
            .collect();

        let order = items[0].order;
        assert!(items.iter().all(|item| item.order == order));
        assert_eq!(market.store.count_open_orders(c1.id).await.unwrap(), 1);
        assert_eq!(market.store.order_count().await, 1);

        let cart = market.cart.view_cart(&c1).await.unwrap();
        assert_eq!(cart.size, 32);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn checkout_races_with_adds() {
        let market = Arc::new(Marketplace::new());
        let c1 = market.customer("Steve").await;
        let product = market.product(&c1, "Kite", 1499).await.id;
        let pay = market.payment(&c1).await;
        let first = market.cart.add_to_cart(&c1, product).await.unwrap();
        let first_order = first.order;

        let adds = (0..16).map(|_| {
            let market = Arc::clone(&market);
            let customer = c1.clone();
            tokio::spawn(async move { market.cart.add_to_cart(&customer, product).await })
        });
        let checkout = {
            let market = Arc::clone(&market);
            let customer = c1.clone();
            tokio::spawn(async move {
                market
                    .cart
                    .checkout(&customer, first_order, Some(pay))
                    .await
            })
        };

        let added: Vec<_> = join_all(adds)
            .await
            .into_iter()
            .map(|joined| joined.unwrap().unwrap())
            .collect();
        checkout.await.unwrap().unwrap();

        // Every add landed either in the closed order or in the single new one.
        assert!(market.store.count_open_orders(c1.id).await.unwrap() <= 1);
        let closed = market.cart.closed_order(&c1, first.order).await.unwrap();
        let in_closed = added.iter().filter(|i| i.order == first.order).count();
        assert_eq!(closed.line_items.len(), in_closed + 1);

        let later: Vec<_> = added.iter().filter(|i| i.order != first.order).collect();
        if let Some(item) = later.first() {
            assert!(later.iter().all(|i| i.order == item.order));
            let cart = market.cart.view_cart(&c1).await.unwrap();
            assert_eq!(cart.order.id, item.order);
            assert_eq!(cart.size, later.len());
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_checkouts_close_once() {
        let market = Arc::new(Marketplace::new());
        let c1 = market.customer("Steve").await;
        let p1 = market.product(&c1, "Kite", 1499).await;
        let pay = market.payment(&c1).await;
        let order = market.cart.add_to_cart(&c1, p1.id).await.unwrap().order;

        let attempts = (0..8).map(|_| {
            let market = Arc::clone(&market);
            let customer = c1.clone();
            tokio::spawn(async move { market.cart.checkout(&customer, order, Some(pay)).await })
        });
        let results: Vec<_> = join_all(attempts)
            .await
            .into_iter()
            .map(|joined| joined.unwrap())
            .collect();

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(
            results
                .iter()
                .filter(|r| r.is_err())
                .all(|r| matches!(r, Err(DomainError::NotFound(_))))
        );
    }
}
