use async_trait::async_trait;
use chrono::Utc;
use common::{
    CategoryId, CustomerId, FavoriteId, LineItemId, Money, OrderId, PaymentId, ProductId,
    RatingId, RecommendationId, StoreId,
};
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{
    Category, Customer, Favorite, LedgerError, LineItem, LineItemTarget, NewCustomer, NewPayment,
    NewProduct, NewStore, Order, OrderStatus, PaymentInstrument, Product, ProductQuery,
    ProfileUpdate, Rating, Recommendation, Removal, Result, Store, Visibility, VisibilityFilter,
    store::LedgerStore,
};

const CUSTOMER_COLUMNS: &str =
    "id, first_name, last_name, email, address, phone_number, token, created_at";
const PRODUCT_COLUMNS: &str = "p.id, p.seller_id, p.category_id, p.name, p.price_cents, \
     p.description, p.quantity, p.location, p.image_path, p.created_at, p.hidden";
const ORDER_COLUMNS: &str = "id, customer_id, created_at, payment_id";
const LINE_ITEM_COLUMNS: &str = "id, order_id, product_id, created_at";
const PAYMENT_COLUMNS: &str =
    "id, customer_id, merchant_name, account_number, expiration_date, created_at";
const RECOMMENDATION_COLUMNS: &str =
    "id, recommender_id, recipient_id, product_id, created_at";

/// Attempts at the open-order lookup-or-create before giving up.
const MAX_OPEN_ORDER_ATTEMPTS: usize = 3;

/// PostgreSQL-backed ledger implementation.
///
/// The one-open-order rule is enforced by the partial unique index
/// `one_open_order_per_customer`; lookup-or-create inserts with
/// `ON CONFLICT DO NOTHING` and then locks whichever open order won.
#[derive(Clone)]
pub struct PostgresLedger {
    pool: PgPool,
}

impl PostgresLedger {
    /// Creates a new PostgreSQL ledger.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    fn visibility_clause(visibility: VisibilityFilter) -> &'static str {
        match visibility {
            VisibilityFilter::ActiveOnly => " AND NOT p.hidden",
            VisibilityFilter::IncludeHidden => "",
            VisibilityFilter::HiddenOnly => " AND p.hidden",
        }
    }

    fn row_to_customer(row: PgRow) -> Result<Customer> {
        Ok(Customer {
            id: CustomerId::from_uuid(row.try_get::<Uuid, _>("id")?),
            first_name: row.try_get("first_name")?,
            last_name: row.try_get("last_name")?,
            email: row.try_get("email")?,
            address: row.try_get("address")?,
            phone_number: row.try_get("phone_number")?,
            token: row.try_get("token")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn row_to_store(row: PgRow) -> Result<Store> {
        Ok(Store {
            id: StoreId::from_uuid(row.try_get::<Uuid, _>("id")?),
            owner: CustomerId::from_uuid(row.try_get::<Uuid, _>("owner_id")?),
            name: row.try_get("name")?,
            description: row.try_get("description")?,
        })
    }

    fn row_to_product(row: PgRow) -> Result<Product> {
        let hidden: bool = row.try_get("hidden")?;
        Ok(Product {
            id: ProductId::from_uuid(row.try_get::<Uuid, _>("id")?),
            seller: CustomerId::from_uuid(row.try_get::<Uuid, _>("seller_id")?),
            category: CategoryId::from_uuid(row.try_get::<Uuid, _>("category_id")?),
            name: row.try_get("name")?,
            price: Money::from_cents(row.try_get("price_cents")?),
            description: row.try_get("description")?,
            quantity: row.try_get::<i32, _>("quantity")?.max(0) as u32,
            location: row.try_get("location")?,
            image_path: row.try_get("image_path")?,
            created_at: row.try_get("created_at")?,
            visibility: if hidden {
                Visibility::Hidden
            } else {
                Visibility::Active
            },
        })
    }

    fn row_to_order(row: PgRow) -> Result<Order> {
        let payment: Option<Uuid> = row.try_get("payment_id")?;
        Ok(Order::restore(
            OrderId::from_uuid(row.try_get::<Uuid, _>("id")?),
            CustomerId::from_uuid(row.try_get::<Uuid, _>("customer_id")?),
            row.try_get("created_at")?,
            OrderStatus::from_payment(payment.map(PaymentId::from_uuid)),
        ))
    }

    fn row_to_line_item(row: PgRow) -> Result<LineItem> {
        Ok(LineItem {
            id: LineItemId::from_uuid(row.try_get::<Uuid, _>("id")?),
            order: OrderId::from_uuid(row.try_get::<Uuid, _>("order_id")?),
            product: ProductId::from_uuid(row.try_get::<Uuid, _>("product_id")?),
            created_at: row.try_get("created_at")?,
        })
    }

    fn row_to_payment(row: PgRow) -> Result<PaymentInstrument> {
        Ok(PaymentInstrument {
            id: PaymentId::from_uuid(row.try_get::<Uuid, _>("id")?),
            customer: CustomerId::from_uuid(row.try_get::<Uuid, _>("customer_id")?),
            merchant_name: row.try_get("merchant_name")?,
            account_number: row.try_get("account_number")?,
            expiration_date: row.try_get("expiration_date")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn row_to_rating(row: PgRow) -> Result<Rating> {
        Ok(Rating {
            id: RatingId::from_uuid(row.try_get::<Uuid, _>("id")?),
            customer: CustomerId::from_uuid(row.try_get::<Uuid, _>("customer_id")?),
            product: ProductId::from_uuid(row.try_get::<Uuid, _>("product_id")?),
            score: row.try_get::<i16, _>("score")?.clamp(0, 5) as u8,
            text: row.try_get("rating_text")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn row_to_favorite(row: PgRow) -> Result<Favorite> {
        Ok(Favorite {
            id: FavoriteId::from_uuid(row.try_get::<Uuid, _>("id")?),
            customer: CustomerId::from_uuid(row.try_get::<Uuid, _>("customer_id")?),
            store: StoreId::from_uuid(row.try_get::<Uuid, _>("store_id")?),
            created_at: row.try_get("created_at")?,
        })
    }

    fn row_to_recommendation(row: PgRow) -> Result<Recommendation> {
        Ok(Recommendation {
            id: RecommendationId::from_uuid(row.try_get::<Uuid, _>("id")?),
            recommender: CustomerId::from_uuid(row.try_get::<Uuid, _>("recommender_id")?),
            recipient: CustomerId::from_uuid(row.try_get::<Uuid, _>("recipient_id")?),
            product: ProductId::from_uuid(row.try_get::<Uuid, _>("product_id")?),
            created_at: row.try_get("created_at")?,
        })
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.is_unique_violation())
}

fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation())
}

#[async_trait]
impl LedgerStore for PostgresLedger {
    async fn create_customer(&self, customer: NewCustomer) -> Result<Customer> {
        let row = sqlx::query(&format!(
            "INSERT INTO customers ({CUSTOMER_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             RETURNING {CUSTOMER_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(&customer.first_name)
        .bind(&customer.last_name)
        .bind(&customer.email)
        .bind(&customer.address)
        .bind(&customer.phone_number)
        .bind(Uuid::new_v4().simple().to_string())
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Self::row_to_customer(row)
    }

    async fn get_customer(&self, id: CustomerId) -> Result<Option<Customer>> {
        sqlx::query(&format!(
            "SELECT {CUSTOMER_COLUMNS} FROM customers WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?
        .map(Self::row_to_customer)
        .transpose()
    }

    async fn customer_by_token(&self, token: &str) -> Result<Option<Customer>> {
        sqlx::query(&format!(
            "SELECT {CUSTOMER_COLUMNS} FROM customers WHERE token = $1"
        ))
        .bind(token)
        .fetch_optional(&self.pool)
        .await?
        .map(Self::row_to_customer)
        .transpose()
    }

    async fn update_profile(&self, id: CustomerId, update: ProfileUpdate) -> Result<Customer> {
        let row = sqlx::query(&format!(
            "UPDATE customers SET address = COALESCE($2, address), \
             phone_number = COALESCE($3, phone_number) WHERE id = $1 \
             RETURNING {CUSTOMER_COLUMNS}"
        ))
        .bind(id.as_uuid())
        .bind(update.address)
        .bind(update.phone_number)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| LedgerError::not_found("customer", id))?;

        Self::row_to_customer(row)
    }

    async fn create_category(&self, name: &str) -> Result<Category> {
        let category = Category {
            id: CategoryId::new(),
            name: name.to_string(),
        };
        sqlx::query("INSERT INTO categories (id, name) VALUES ($1, $2)")
            .bind(category.id.as_uuid())
            .bind(&category.name)
            .execute(&self.pool)
            .await?;
        Ok(category)
    }

    async fn get_category(&self, id: CategoryId) -> Result<Option<Category>> {
        let row = sqlx::query("SELECT id, name FROM categories WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(Category {
                id: CategoryId::from_uuid(row.try_get::<Uuid, _>("id")?),
                name: row.try_get("name")?,
            })),
            None => Ok(None),
        }
    }

    async fn list_categories(&self) -> Result<Vec<Category>> {
        let rows = sqlx::query("SELECT id, name FROM categories ORDER BY name ASC")
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter()
            .map(|row| {
                Ok(Category {
                    id: CategoryId::from_uuid(row.try_get::<Uuid, _>("id")?),
                    name: row.try_get("name")?,
                })
            })
            .collect()
    }

    async fn create_store(&self, store: NewStore) -> Result<Store> {
        let owner = store.owner;
        let row = sqlx::query(
            r#"
            INSERT INTO stores (id, owner_id, name, description)
            VALUES ($1, $2, $3, $4)
            RETURNING id, owner_id, name, description
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(owner.as_uuid())
        .bind(&store.name)
        .bind(&store.description)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                return LedgerError::Conflict(format!("customer {owner} already owns a store"));
            }
            if is_foreign_key_violation(&e) {
                return LedgerError::not_found("customer", owner);
            }
            LedgerError::Database(e)
        })?;

        Self::row_to_store(row)
    }

    async fn get_store(&self, id: StoreId) -> Result<Option<Store>> {
        sqlx::query("SELECT id, owner_id, name, description FROM stores WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?
            .map(Self::row_to_store)
            .transpose()
    }

    async fn store_for_owner(&self, owner: CustomerId) -> Result<Option<Store>> {
        sqlx::query("SELECT id, owner_id, name, description FROM stores WHERE owner_id = $1")
            .bind(owner.as_uuid())
            .fetch_optional(&self.pool)
            .await?
            .map(Self::row_to_store)
            .transpose()
    }

    async fn link_store_product(&self, store: StoreId, product: ProductId) -> Result<()> {
        sqlx::query(
            "INSERT INTO store_products (store_id, product_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(store.as_uuid())
        .bind(product.as_uuid())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_foreign_key_violation(&e) {
                return LedgerError::not_found("store or product", format!("{store}/{product}"));
            }
            LedgerError::Database(e)
        })?;
        Ok(())
    }

    async fn store_products(
        &self,
        store: StoreId,
        visibility: VisibilityFilter,
    ) -> Result<Vec<Product>> {
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM products p \
             JOIN store_products sp ON sp.product_id = p.id \
             WHERE sp.store_id = $1{} ORDER BY p.created_at DESC",
            Self::visibility_clause(visibility)
        );
        let rows = sqlx::query(&sql)
            .bind(store.as_uuid())
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(Self::row_to_product).collect()
    }

    async fn create_product(&self, product: NewProduct) -> Result<Product> {
        let category = product.category;
        let row = sqlx::query(&format!(
            "INSERT INTO products AS p (id, seller_id, category_id, name, price_cents, description, \
             quantity, location, image_path, created_at, hidden) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, FALSE) \
             RETURNING {PRODUCT_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(product.seller.as_uuid())
        .bind(category.as_uuid())
        .bind(&product.name)
        .bind(product.price.cents())
        .bind(&product.description)
        .bind(i32::try_from(product.quantity).unwrap_or(i32::MAX))
        .bind(&product.location)
        .bind(&product.image_path)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_foreign_key_violation(&e) {
                return LedgerError::not_found("category", category);
            }
            LedgerError::Database(e)
        })?;

        Self::row_to_product(row)
    }

    async fn get_product(
        &self,
        id: ProductId,
        visibility: VisibilityFilter,
    ) -> Result<Option<Product>> {
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM products p WHERE p.id = $1{}",
            Self::visibility_clause(visibility)
        );
        sqlx::query(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?
            .map(Self::row_to_product)
            .transpose()
    }

    async fn list_products(&self, query: ProductQuery) -> Result<Vec<Product>> {
        let mut sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM products p WHERE 1=1{}",
            Self::visibility_clause(query.visibility)
        );
        let mut param_count = 0;

        // Build dynamic query
        if query.category.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND p.category_id = ${param_count}"));
        }
        if query.seller.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND p.seller_id = ${param_count}"));
        }

        sql.push_str(" ORDER BY p.created_at DESC");

        if query.limit.is_some() {
            param_count += 1;
            sql.push_str(&format!(" LIMIT ${param_count}"));
        }

        let mut sqlx_query = sqlx::query(&sql);

        if let Some(category) = query.category {
            sqlx_query = sqlx_query.bind(category.as_uuid());
        }
        if let Some(seller) = query.seller {
            sqlx_query = sqlx_query.bind(seller.as_uuid());
        }
        if let Some(limit) = query.limit {
            sqlx_query = sqlx_query.bind(limit as i64);
        }

        let rows = sqlx_query.fetch_all(&self.pool).await?;
        rows.into_iter().map(Self::row_to_product).collect()
    }

    async fn soft_delete_product(&self, id: ProductId) -> Result<bool> {
        let result = sqlx::query("UPDATE products SET hidden = TRUE WHERE id = $1 AND NOT hidden")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn purge_product(&self, id: ProductId) -> Result<()> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|e| {
                if is_foreign_key_violation(&e) {
                    return LedgerError::Conflict(format!(
                        "product {id} is referenced by line items"
                    ));
                }
                LedgerError::Database(e)
            })?;

        if result.rows_affected() == 0 {
            return Err(LedgerError::not_found("product", id));
        }
        Ok(())
    }

    async fn append_to_open_order(
        &self,
        customer: CustomerId,
        product: ProductId,
    ) -> Result<(Order, LineItem)> {
        for attempt in 1..=MAX_OPEN_ORDER_ATTEMPTS {
            let mut tx = self.pool.begin().await?;

            let exists: Option<Uuid> =
                sqlx::query_scalar("SELECT id FROM products WHERE id = $1 AND NOT hidden")
                    .bind(product.as_uuid())
                    .fetch_optional(&mut *tx)
                    .await?;
            if exists.is_none() {
                return Err(LedgerError::not_found("product", product));
            }

            // Loses silently against an existing open order.
            let candidate = Order::open(customer);
            sqlx::query(
                r#"
                INSERT INTO orders (id, customer_id, created_at, payment_id)
                VALUES ($1, $2, $3, NULL)
                ON CONFLICT (customer_id) WHERE payment_id IS NULL DO NOTHING
                "#,
            )
            .bind(candidate.id.as_uuid())
            .bind(customer.as_uuid())
            .bind(candidate.created_at)
            .execute(&mut *tx)
            .await?;

            // Row lock blocks a concurrent checkout until the line item is in.
            let row = sqlx::query(&format!(
                "SELECT {ORDER_COLUMNS} FROM orders \
                 WHERE customer_id = $1 AND payment_id IS NULL FOR UPDATE"
            ))
            .bind(customer.as_uuid())
            .fetch_optional(&mut *tx)
            .await?;

            let Some(row) = row else {
                // The open order we collided with was closed before we could lock it.
                metrics::counter!("ledger_open_order_retries_total").increment(1);
                tracing::debug!(attempt, %customer, "open order closed concurrently, retrying");
                continue;
            };
            let order = Self::row_to_order(row)?;

            let item = LineItem::new(order.id, product);
            let row = sqlx::query(&format!(
                "INSERT INTO line_items ({LINE_ITEM_COLUMNS}) VALUES ($1, $2, $3, $4) \
                 RETURNING {LINE_ITEM_COLUMNS}"
            ))
            .bind(item.id.as_uuid())
            .bind(item.order.as_uuid())
            .bind(item.product.as_uuid())
            .bind(item.created_at)
            .fetch_one(&mut *tx)
            .await?;
            let item = Self::row_to_line_item(row)?;

            tx.commit().await?;
            return Ok((order, item));
        }

        Err(LedgerError::Conflict(format!(
            "could not settle an open order for customer {customer}"
        )))
    }

    async fn open_order(&self, customer: CustomerId) -> Result<Option<Order>> {
        sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE customer_id = $1 AND payment_id IS NULL"
        ))
        .bind(customer.as_uuid())
        .fetch_optional(&self.pool)
        .await?
        .map(Self::row_to_order)
        .transpose()
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>> {
        sqlx::query(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?
            .map(Self::row_to_order)
            .transpose()
    }

    async fn orders_for_customer(&self, customer: CustomerId) -> Result<Vec<Order>> {
        let rows = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE customer_id = $1 ORDER BY created_at DESC"
        ))
        .bind(customer.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_order).collect()
    }

    async fn line_items(&self, order: OrderId) -> Result<Vec<LineItem>> {
        let rows = sqlx::query(&format!(
            "SELECT {LINE_ITEM_COLUMNS} FROM line_items WHERE order_id = $1 \
             ORDER BY created_at ASC, id ASC"
        ))
        .bind(order.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_line_item).collect()
    }

    async fn remove_from_open_order(
        &self,
        customer: CustomerId,
        target: LineItemTarget,
    ) -> Result<Removal> {
        let mut tx = self.pool.begin().await?;

        let order_id: Option<Uuid> = sqlx::query_scalar(
            "SELECT id FROM orders WHERE customer_id = $1 AND payment_id IS NULL FOR UPDATE",
        )
        .bind(customer.as_uuid())
        .fetch_optional(&mut *tx)
        .await?;
        let Some(order_id) = order_id else {
            return Ok(Removal::NoOpenOrder);
        };

        let row = match target {
            LineItemTarget::LineItem(id) => {
                sqlx::query(&format!(
                    "DELETE FROM line_items WHERE id = $1 AND order_id = $2 \
                     RETURNING {LINE_ITEM_COLUMNS}"
                ))
                .bind(id.as_uuid())
                .bind(order_id)
                .fetch_optional(&mut *tx)
                .await?
            }
            LineItemTarget::Product(product) => {
                sqlx::query(&format!(
                    "DELETE FROM line_items WHERE id = ( \
                         SELECT id FROM line_items WHERE order_id = $1 AND product_id = $2 \
                         ORDER BY created_at ASC, id ASC LIMIT 1) \
                     RETURNING {LINE_ITEM_COLUMNS}"
                ))
                .bind(order_id)
                .bind(product.as_uuid())
                .fetch_optional(&mut *tx)
                .await?
            }
        };

        tx.commit().await?;
        match row {
            Some(row) => Ok(Removal::Removed(Self::row_to_line_item(row)?)),
            None => Ok(Removal::NotInCart),
        }
    }

    async fn delete_open_order(&self, customer: CustomerId) -> Result<Option<Order>> {
        // Line items go with the order (ON DELETE CASCADE).
        sqlx::query(&format!(
            "DELETE FROM orders WHERE customer_id = $1 AND payment_id IS NULL \
             RETURNING {ORDER_COLUMNS}"
        ))
        .bind(customer.as_uuid())
        .fetch_optional(&self.pool)
        .await?
        .map(Self::row_to_order)
        .transpose()
    }

    async fn close_order(
        &self,
        customer: CustomerId,
        order: OrderId,
        payment: PaymentId,
    ) -> Result<Option<Order>> {
        sqlx::query(&format!(
            "UPDATE orders SET payment_id = $3 \
             WHERE id = $1 AND customer_id = $2 AND payment_id IS NULL \
             RETURNING {ORDER_COLUMNS}"
        ))
        .bind(order.as_uuid())
        .bind(customer.as_uuid())
        .bind(payment.as_uuid())
        .fetch_optional(&self.pool)
        .await?
        .map(Self::row_to_order)
        .transpose()
    }

    async fn count_sold(&self, product: ProductId) -> Result<u64> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM line_items li
            JOIN orders o ON o.id = li.order_id
            WHERE li.product_id = $1 AND o.payment_id IS NOT NULL
            "#,
        )
        .bind(product.as_uuid())
        .fetch_one(&self.pool)
        .await?;
        Ok(count.max(0) as u64)
    }

    async fn has_purchased(&self, customer: CustomerId, product: ProductId) -> Result<bool> {
        let purchased: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM line_items li
                JOIN orders o ON o.id = li.order_id
                WHERE li.product_id = $1 AND o.customer_id = $2 AND o.payment_id IS NOT NULL
            )
            "#,
        )
        .bind(product.as_uuid())
        .bind(customer.as_uuid())
        .fetch_one(&self.pool)
        .await?;
        Ok(purchased)
    }

    async fn create_payment(&self, payment: NewPayment) -> Result<PaymentInstrument> {
        let customer = payment.customer;
        let row = sqlx::query(&format!(
            "INSERT INTO payments ({PAYMENT_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING {PAYMENT_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(customer.as_uuid())
        .bind(&payment.merchant_name)
        .bind(&payment.account_number)
        .bind(payment.expiration_date)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_foreign_key_violation(&e) {
                return LedgerError::not_found("customer", customer);
            }
            LedgerError::Database(e)
        })?;

        Self::row_to_payment(row)
    }

    async fn get_payment(&self, id: PaymentId) -> Result<Option<PaymentInstrument>> {
        sqlx::query(&format!("SELECT {PAYMENT_COLUMNS} FROM payments WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?
            .map(Self::row_to_payment)
            .transpose()
    }

    async fn payments_for_customer(&self, customer: CustomerId) -> Result<Vec<PaymentInstrument>> {
        let rows = sqlx::query(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE customer_id = $1 ORDER BY created_at ASC"
        ))
        .bind(customer.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_payment).collect()
    }

    async fn insert_rating(
        &self,
        customer: CustomerId,
        product: ProductId,
        score: u8,
        text: Option<String>,
    ) -> Result<Rating> {
        let row = sqlx::query(
            r#"
            INSERT INTO ratings (id, customer_id, product_id, score, rating_text, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, customer_id, product_id, score, rating_text, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(customer.as_uuid())
        .bind(product.as_uuid())
        .bind(i16::from(score))
        .bind(text)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_foreign_key_violation(&e) {
                return LedgerError::not_found("product", product);
            }
            LedgerError::Database(e)
        })?;

        Self::row_to_rating(row)
    }

    async fn ratings_for_product(&self, product: ProductId) -> Result<Vec<Rating>> {
        let rows = sqlx::query(
            r#"
            SELECT id, customer_id, product_id, score, rating_text, created_at
            FROM ratings
            WHERE product_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(product.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_rating).collect()
    }

    async fn insert_like(&self, customer: CustomerId, product: ProductId) -> Result<bool> {
        let result = sqlx::query(
            "INSERT INTO likes (customer_id, product_id, created_at) VALUES ($1, $2, $3) \
             ON CONFLICT DO NOTHING",
        )
        .bind(customer.as_uuid())
        .bind(product.as_uuid())
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_foreign_key_violation(&e) {
                return LedgerError::not_found("product", product);
            }
            LedgerError::Database(e)
        })?;
        Ok(result.rows_affected() == 1)
    }

    async fn delete_like(&self, customer: CustomerId, product: ProductId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM likes WHERE customer_id = $1 AND product_id = $2")
            .bind(customer.as_uuid())
            .bind(product.as_uuid())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn count_likes(&self, product: ProductId) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM likes WHERE product_id = $1")
            .bind(product.as_uuid())
            .fetch_one(&self.pool)
            .await?;
        Ok(count.max(0) as u64)
    }

    async fn is_liked(&self, customer: CustomerId, product: ProductId) -> Result<bool> {
        let liked: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM likes WHERE customer_id = $1 AND product_id = $2)",
        )
        .bind(customer.as_uuid())
        .bind(product.as_uuid())
        .fetch_one(&self.pool)
        .await?;
        Ok(liked)
    }

    async fn liked_products(&self, customer: CustomerId) -> Result<Vec<Product>> {
        let rows = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products p \
             JOIN likes l ON l.product_id = p.id \
             WHERE l.customer_id = $1 AND NOT p.hidden ORDER BY l.created_at ASC"
        ))
        .bind(customer.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_product).collect()
    }

    async fn insert_favorite(
        &self,
        customer: CustomerId,
        store: StoreId,
    ) -> Result<Option<Favorite>> {
        sqlx::query(
            r#"
            INSERT INTO favorites (id, customer_id, store_id, created_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (customer_id, store_id) DO NOTHING
            RETURNING id, customer_id, store_id, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(customer.as_uuid())
        .bind(store.as_uuid())
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            if is_foreign_key_violation(&e) {
                return LedgerError::not_found("store", store);
            }
            LedgerError::Database(e)
        })?
        .map(Self::row_to_favorite)
        .transpose()
    }

    async fn delete_favorite(&self, customer: CustomerId, store: StoreId) -> Result<bool> {
        let result =
            sqlx::query("DELETE FROM favorites WHERE customer_id = $1 AND store_id = $2")
                .bind(customer.as_uuid())
                .bind(store.as_uuid())
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn favorites_for_customer(&self, customer: CustomerId) -> Result<Vec<Favorite>> {
        let rows = sqlx::query(
            "SELECT id, customer_id, store_id, created_at FROM favorites \
             WHERE customer_id = $1 ORDER BY created_at ASC",
        )
        .bind(customer.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_favorite).collect()
    }

    async fn insert_recommendation(
        &self,
        recommender: CustomerId,
        recipient: CustomerId,
        product: ProductId,
    ) -> Result<Recommendation> {
        let row = sqlx::query(&format!(
            "INSERT INTO recommendations ({RECOMMENDATION_COLUMNS}) VALUES ($1, $2, $3, $4, $5) \
             RETURNING {RECOMMENDATION_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(recommender.as_uuid())
        .bind(recipient.as_uuid())
        .bind(product.as_uuid())
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_foreign_key_violation(&e) {
                return LedgerError::not_found("customer or product", format!("{recipient}/{product}"));
            }
            LedgerError::Database(e)
        })?;

        Self::row_to_recommendation(row)
    }

    async fn recommendations_by(&self, customer: CustomerId) -> Result<Vec<Recommendation>> {
        let rows = sqlx::query(&format!(
            "SELECT {RECOMMENDATION_COLUMNS} FROM recommendations \
             WHERE recommender_id = $1 ORDER BY created_at ASC"
        ))
        .bind(customer.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_recommendation).collect()
    }

    async fn recommendations_for(&self, customer: CustomerId) -> Result<Vec<Recommendation>> {
        let rows = sqlx::query(&format!(
            "SELECT {RECOMMENDATION_COLUMNS} FROM recommendations \
             WHERE recipient_id = $1 ORDER BY created_at ASC"
        ))
        .bind(customer.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_recommendation).collect()
    }
}
