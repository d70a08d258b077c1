//! Cart service driving the open/closed order lifecycle.

use common::{OrderId, PaymentId, ProductId};
use ledger::{
    Customer, LedgerError, LedgerStore, LineItem, LineItemTarget, NewPayment, Order,
    PaymentInstrument, Removal, VisibilityFilter,
};

use crate::error::{DomainError, Result};

use super::views::{Cart, CartLine, CartRemoval, OrderSummary, PaymentTypeInput, total_of};

/// Service for a customer's cart and closed orders.
///
/// Every operation takes the acting customer explicitly. Each mutation is a
/// single ledger operation, so the one-open-order rule and the immutability
/// of closed orders are upheld by the ledger rather than by read-then-write
/// sequences here.
pub struct CartService<S: LedgerStore> {
    store: S,
}

impl<S: LedgerStore> CartService<S> {
    /// Creates a new cart service over the given ledger.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Returns a reference to the underlying ledger.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Adds one unit of a product to the customer's cart, opening an order
    /// if the customer has none.
    #[tracing::instrument(skip(self, customer), fields(customer_id = %customer.id))]
    pub async fn add_to_cart(
        &self,
        customer: &Customer,
        product_id: ProductId,
    ) -> Result<LineItem> {
        let (order, item) = self
            .store
            .append_to_open_order(customer.id, product_id)
            .await
            .map_err(|e| match e {
                LedgerError::NotFound { .. } => DomainError::not_found("Product not found."),
                other => other.into(),
            })?;

        metrics::counter!("cart_items_added_total").increment(1);
        tracing::debug!(order_id = %order.id, line_item_id = %item.id, "line item added");

        Ok(item)
    }

    /// Removes a line item from the cart, or the whole cart with
    /// [`CartRemoval::Empty`].
    #[tracing::instrument(skip(self, customer), fields(customer_id = %customer.id))]
    pub async fn remove_from_cart(&self, customer: &Customer, removal: CartRemoval) -> Result<()> {
        let target = match removal {
            CartRemoval::Empty => {
                let deleted = self.store.delete_open_order(customer.id).await?;
                return match deleted {
                    Some(order) => {
                        tracing::debug!(order_id = %order.id, "cart emptied");
                        Ok(())
                    }
                    None => Err(no_open_order()),
                };
            }
            CartRemoval::LineItem(id) => LineItemTarget::LineItem(id),
            CartRemoval::Product(id) => LineItemTarget::Product(id),
        };

        match self.store.remove_from_open_order(customer.id, target).await? {
            Removal::Removed(item) => {
                tracing::debug!(line_item_id = %item.id, "line item removed");
                Ok(())
            }
            Removal::NotInCart => Err(DomainError::not_found("Line item not found in cart.")),
            Removal::NoOpenOrder => Err(no_open_order()),
        }
    }

    /// Returns the open order with its line items, size and total.
    #[tracing::instrument(skip(self, customer), fields(customer_id = %customer.id))]
    pub async fn view_cart(&self, customer: &Customer) -> Result<Cart> {
        let order = self
            .store
            .open_order(customer.id)
            .await?
            .ok_or_else(no_open_order)?;

        let line_items = self.lines_of(&order).await?;
        let total = total_of(&line_items);

        Ok(Cart {
            order,
            size: line_items.len(),
            line_items,
            total,
        })
    }

    /// Closes the customer's open order by attaching a payment instrument.
    ///
    /// The order must be the customer's and still open; otherwise the call
    /// fails with `NotFound`. The payment must be present and owned by the
    /// customer; otherwise it fails with `Validation`.
    #[tracing::instrument(skip(self, customer), fields(customer_id = %customer.id))]
    pub async fn checkout(
        &self,
        customer: &Customer,
        order_id: OrderId,
        payment: Option<PaymentId>,
    ) -> Result<Order> {
        self.store
            .get_order(order_id)
            .await?
            .filter(|order| order.customer == customer.id && order.is_open())
            .ok_or_else(order_not_open)?;

        let payment =
            payment.ok_or_else(|| DomainError::validation("Payment type is required."))?;
        let instrument = self
            .store
            .get_payment(payment)
            .await?
            .filter(|instrument| instrument.customer == customer.id)
            .ok_or_else(|| DomainError::validation("Invalid payment type."))?;

        // Conditional close: a concurrent checkout that got there first
        // leaves nothing to update.
        let closed = self
            .store
            .close_order(customer.id, order_id, instrument.id)
            .await?
            .ok_or_else(order_not_open)?;

        metrics::counter!("orders_closed_total").increment(1);
        tracing::info!(order_id = %closed.id, payment_id = %instrument.id, "order closed");

        Ok(closed)
    }

    /// Lists the customer's closed orders with totals, newest first,
    /// optionally restricted to one payment instrument.
    #[tracing::instrument(skip(self, customer), fields(customer_id = %customer.id))]
    pub async fn list_closed_orders(
        &self,
        customer: &Customer,
        payment: Option<PaymentId>,
    ) -> Result<Vec<OrderSummary>> {
        let orders = self.store.orders_for_customer(customer.id).await?;

        let mut summaries = Vec::new();
        for order in orders {
            let Some(paid_with) = order.payment() else {
                continue;
            };
            if payment.is_some_and(|wanted| wanted != paid_with) {
                continue;
            }
            summaries.push(self.summarize(order).await?);
        }

        Ok(summaries)
    }

    /// Returns one of the customer's closed orders.
    #[tracing::instrument(skip(self, customer), fields(customer_id = %customer.id))]
    pub async fn closed_order(&self, customer: &Customer, order_id: OrderId) -> Result<OrderSummary> {
        let order = self
            .store
            .get_order(order_id)
            .await?
            .filter(|order| order.customer == customer.id && !order.is_open())
            .ok_or_else(|| DomainError::not_found("Order not found."))?;

        self.summarize(order).await
    }

    /// Registers a payment instrument the customer can check out with.
    #[tracing::instrument(skip(self, customer, input), fields(customer_id = %customer.id))]
    pub async fn add_payment_type(
        &self,
        customer: &Customer,
        input: PaymentTypeInput,
    ) -> Result<PaymentInstrument> {
        if input.merchant_name.trim().is_empty() {
            return Err(DomainError::validation("Merchant name is required."));
        }
        if input.account_number.trim().is_empty() {
            return Err(DomainError::validation("Account number is required."));
        }

        let payment = self
            .store
            .create_payment(NewPayment {
                customer: customer.id,
                merchant_name: input.merchant_name,
                account_number: input.account_number,
                expiration_date: input.expiration_date,
            })
            .await?;

        tracing::debug!(payment_id = %payment.id, "payment type added");
        Ok(payment)
    }

    /// Lists the customer's payment instruments.
    #[tracing::instrument(skip(self, customer), fields(customer_id = %customer.id))]
    pub async fn payment_types(&self, customer: &Customer) -> Result<Vec<PaymentInstrument>> {
        Ok(self.store.payments_for_customer(customer.id).await?)
    }

    async fn summarize(&self, order: Order) -> Result<OrderSummary> {
        let line_items = self.lines_of(&order).await?;
        let total = total_of(&line_items);
        Ok(OrderSummary {
            order,
            line_items,
            total,
        })
    }

    async fn lines_of(&self, order: &Order) -> Result<Vec<CartLine>> {
        let items = self.store.line_items(order.id).await?;

        let mut lines = Vec::with_capacity(items.len());
        for item in items {
            // Products soft-deleted after being ordered still price the line.
            let product = self
                .store
                .get_product(item.product, VisibilityFilter::IncludeHidden)
                .await?
                .ok_or_else(|| LedgerError::not_found("product", item.product))?;
            lines.push(CartLine {
                id: item.id,
                product,
            });
        }

        Ok(lines)
    }
}

fn no_open_order() -> DomainError {
    DomainError::not_found("No open order found.")
}

fn order_not_open() -> DomainError {
    DomainError::not_found("Order not found or already completed.")
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use common::{LineItemId, Money, ProductId};
    use ledger::{InMemoryLedger, LedgerStoreExt, NewCustomer, NewPayment, NewProduct, Product};

    use super::*;

    async fn setup() -> (CartService<InMemoryLedger>, Customer, Product) {
        let store = InMemoryLedger::new();
        let customer = store
            .create_customer(NewCustomer {
                first_name: "Steve".to_string(),
                last_name: "Brownlee".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();
        let category = store.create_category("Sporting Goods").await.unwrap();
        let product = store
            .create_product(NewProduct {
                seller: customer.id,
                category: category.id,
                name: "Kite".to_string(),
                price: Money::from_cents(1499),
                description: "Flies high".to_string(),
                quantity: 10,
                location: "Pittsburgh".to_string(),
                image_path: None,
            })
            .await
            .unwrap();

        (CartService::new(store), customer, product)
    }

    async fn pay(service: &CartService<InMemoryLedger>, customer: &Customer) -> PaymentId {
        service
            .store()
            .create_payment(NewPayment {
                customer: customer.id,
                merchant_name: "Visa".to_string(),
                account_number: "4111".to_string(),
                expiration_date: NaiveDate::from_ymd_opt(2030, 1, 1).unwrap(),
            })
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn payment_types_require_merchant_and_account() {
        let (service, customer, _) = setup().await;
        let input = PaymentTypeInput {
            merchant_name: "Visa".to_string(),
            account_number: String::new(),
            expiration_date: NaiveDate::from_ymd_opt(2030, 1, 1).unwrap(),
        };
        let result = service.add_payment_type(&customer, input.clone()).await;
        assert!(matches!(result, Err(DomainError::Validation(_))));

        service
            .add_payment_type(
                &customer,
                PaymentTypeInput {
                    account_number: "4111".to_string(),
                    ..input
                },
            )
            .await
            .unwrap();
        assert_eq!(service.payment_types(&customer).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn add_then_view() {
        let (service, customer, product) = setup().await;

        service.add_to_cart(&customer, product.id).await.unwrap();
        service.add_to_cart(&customer, product.id).await.unwrap();

        let cart = service.view_cart(&customer).await.unwrap();
        assert_eq!(cart.size, 2);
        assert_eq!(cart.total, Money::from_cents(2998));
        assert!(cart.order.is_open());
    }

    #[tokio::test]
    async fn add_unknown_product_is_not_found() {
        let (service, customer, _) = setup().await;

        let result = service.add_to_cart(&customer, ProductId::new()).await;
        assert!(matches!(result, Err(DomainError::NotFound(_))));
        assert!(matches!(
            service.view_cart(&customer).await,
            Err(DomainError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn view_without_open_order_is_not_found() {
        let (service, customer, _) = setup().await;
        assert!(matches!(
            service.view_cart(&customer).await,
            Err(DomainError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn remove_by_line_item_and_by_product() {
        let (service, customer, product) = setup().await;
        let first = service.add_to_cart(&customer, product.id).await.unwrap();
        service.add_to_cart(&customer, product.id).await.unwrap();

        service
            .remove_from_cart(&customer, CartRemoval::LineItem(first.id))
            .await
            .unwrap();
        service
            .remove_from_cart(&customer, CartRemoval::Product(product.id))
            .await
            .unwrap();

        let cart = service.view_cart(&customer).await.unwrap();
        assert_eq!(cart.size, 0);
        assert!(cart.total.is_zero());

        let result = service
            .remove_from_cart(&customer, CartRemoval::LineItem(LineItemId::new()))
            .await;
        assert!(matches!(result, Err(DomainError::NotFound(_))));
    }

    #[tokio::test]
    async fn empty_collapses_the_open_order() {
        let (service, customer, product) = setup().await;
        service.add_to_cart(&customer, product.id).await.unwrap();

        service
            .remove_from_cart(&customer, CartRemoval::Empty)
            .await
            .unwrap();

        assert_eq!(service.store().count_open_orders(customer.id).await.unwrap(), 0);
        let again = service.remove_from_cart(&customer, CartRemoval::Empty).await;
        assert!(matches!(again, Err(DomainError::NotFound(_))));
    }

    #[tokio::test]
    async fn checkout_requires_owned_payment() {
        let (service, customer, product) = setup().await;
        let item = service.add_to_cart(&customer, product.id).await.unwrap();

        let missing = service.checkout(&customer, item.order, None).await;
        assert!(matches!(missing, Err(DomainError::Validation(_))));

        let unknown = service
            .checkout(&customer, item.order, Some(PaymentId::new()))
            .await;
        assert!(matches!(unknown, Err(DomainError::Validation(_))));

        let stranger = service
            .store()
            .create_customer(NewCustomer::default())
            .await
            .unwrap();
        let foreign = pay(&service, &stranger).await;
        let result = service.checkout(&customer, item.order, Some(foreign)).await;
        assert!(matches!(result, Err(DomainError::Validation(_))));

        // Still open after the failed attempts.
        assert!(service.view_cart(&customer).await.is_ok());
    }

    #[tokio::test]
    async fn checkout_closes_once() {
        let (service, customer, product) = setup().await;
        let item = service.add_to_cart(&customer, product.id).await.unwrap();
        let payment = pay(&service, &customer).await;

        let closed = service
            .checkout(&customer, item.order, Some(payment))
            .await
            .unwrap();
        assert_eq!(closed.payment(), Some(payment));

        let again = service.checkout(&customer, item.order, Some(payment)).await;
        assert!(matches!(again, Err(DomainError::NotFound(_))));

        let removal = service
            .remove_from_cart(&customer, CartRemoval::LineItem(item.id))
            .await;
        assert!(matches!(removal, Err(DomainError::NotFound(_))));
    }

    #[tokio::test]
    async fn checkout_of_foreign_order_is_not_found() {
        let (service, customer, product) = setup().await;
        let item = service.add_to_cart(&customer, product.id).await.unwrap();

        let stranger = service
            .store()
            .create_customer(NewCustomer::default())
            .await
            .unwrap();
        let payment = pay(&service, &stranger).await;

        let result = service.checkout(&stranger, item.order, Some(payment)).await;
        assert!(matches!(result, Err(DomainError::NotFound(_))));
    }

    #[tokio::test]
    async fn closed_orders_filter_by_payment() {
        let (service, customer, product) = setup().await;
        let visa = pay(&service, &customer).await;
        let amex = pay(&service, &customer).await;

        let first = service.add_to_cart(&customer, product.id).await.unwrap();
        service
            .checkout(&customer, first.order, Some(visa))
            .await
            .unwrap();
        let second = service.add_to_cart(&customer, product.id).await.unwrap();
        service.add_to_cart(&customer, product.id).await.unwrap();
        service
            .checkout(&customer, second.order, Some(amex))
            .await
            .unwrap();
        // Left open; never listed.
        service.add_to_cart(&customer, product.id).await.unwrap();

        let all = service.list_closed_orders(&customer, None).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].order.id, second.order);
        assert_eq!(all[0].total, Money::from_cents(2998));

        let by_visa = service
            .list_closed_orders(&customer, Some(visa))
            .await
            .unwrap();
        assert_eq!(by_visa.len(), 1);
        assert_eq!(by_visa[0].order.id, first.order);

        let summary = service.closed_order(&customer, first.order).await.unwrap();
        assert_eq!(summary.line_items.len(), 1);
    }
}
