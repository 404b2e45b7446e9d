use crate::{
    error::{ApiError, ApiResult},
    models::{Address, CartData, Order, OrderLine, OrderStatus, PaymentMethod, Product, User},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row, postgres::PgRow, types::Json};
use std::sync::Arc;
use uuid::Uuid;

/// NewProduct
///
/// Catalog creation input, assembled by the add-product handler after the
/// multipart fields have been coerced and the images pushed to storage.
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub name: String,
    pub description: String,
    pub price: f64,
    pub category: String,
    pub sub_category: String,
    pub sizes: Vec<String>,
    pub images: Vec<String>,
    pub bestseller: bool,
}

/// NewOrder
///
/// Order creation input, snapshotted from the user's cart at placement time.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub user_id: Uuid,
    pub items: Vec<OrderLine>,
    pub amount: f64,
    pub address: Address,
    pub payment_method: PaymentMethod,
}

/// Repository Trait
///
/// Defines the abstract contract for all persistence operations, allowing the
/// handlers to interact with the data layer without knowing the specific
/// implementation (Postgres in production, in-memory in tests).
///
/// **Send + Sync + async_trait** are required to make the trait object
/// (`Arc<dyn Repository>`) safely shareable across Axum's task boundaries.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Users ---
    async fn find_user_by_email(&self, email: &str) -> ApiResult<Option<User>>;
    async fn get_user(&self, id: Uuid) -> ApiResult<Option<User>>;
    async fn create_user(&self, name: &str, email: &str, password_hash: &str) -> ApiResult<User>;

    // --- Cart ---
    // All three mutations are single atomic statements at the storage layer:
    // there is no read-modify-write round trip, so concurrent updates to the
    // same cart cannot lose increments.
    async fn get_cart(&self, user_id: Uuid) -> ApiResult<CartData>;
    /// Increments [item][size] by 1, creating the nested entries as needed.
    async fn add_cart_item(&self, user_id: Uuid, item_id: Uuid, size: &str) -> ApiResult<()>;
    /// Sets [item][size] directly. Fails with `ItemNotInCart` when the entry
    /// was never added; quantity 0 removes it.
    async fn set_cart_item(
        &self,
        user_id: Uuid,
        item_id: Uuid,
        size: &str,
        quantity: i32,
    ) -> ApiResult<()>;
    async fn clear_cart(&self, user_id: Uuid) -> ApiResult<()>;

    // --- Catalog ---
    async fn create_product(&self, new: NewProduct) -> ApiResult<Product>;
    async fn list_products(&self) -> ApiResult<Vec<Product>>;
    async fn get_product(&self, id: Uuid) -> ApiResult<Option<Product>>;
    /// Idempotent-silent: deleting an id that does not exist is a success.
    async fn delete_product(&self, id: Uuid) -> ApiResult<()>;

    // --- Orders ---
    async fn create_order(&self, new: NewOrder) -> ApiResult<Order>;
    async fn get_order(&self, id: Uuid) -> ApiResult<Option<Order>>;
    async fn list_orders(&self) -> ApiResult<Vec<Order>>;
    async fn list_user_orders(&self, user_id: Uuid) -> ApiResult<Vec<Order>>;
    /// Guarded transition: only applies when the row is still in `from`,
    /// returning whether a row was updated.
    async fn update_order_status(
        &self,
        id: Uuid,
        from: OrderStatus,
        to: OrderStatus,
    ) -> ApiResult<bool>;
    /// Records a provider-side checkout session against a Stripe order.
    async fn set_order_session(&self, id: Uuid, session_id: &str) -> ApiResult<()>;
    /// Marks the payment settled and advances the status to `paid`.
    async fn mark_order_paid(&self, id: Uuid) -> ApiResult<()>;
    /// Drops an abandoned order (failed/cancelled checkout).
    async fn delete_order(&self, id: Uuid) -> ApiResult<()>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the
/// application state.
pub type RepositoryState = Arc<dyn Repository>;

/// PostgresRepository
///
/// The concrete implementation of the `Repository` trait, backed by the
/// PostgreSQL database. Cart mappings, order line items, and addresses are
/// stored as JSONB documents.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Maps a `users` row, decoding the embedded JSONB cart document.
fn map_user(row: &PgRow) -> Result<User, sqlx::Error> {
    let Json(cart): Json<CartData> = row.try_get("cart")?;
    Ok(User {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        password_hash: row.try_get("password_hash")?,
        cart,
        created_at: row.try_get("created_at")?,
    })
}

/// Maps an `orders` row, decoding the JSONB items/address documents and the
/// textual status columns.
fn map_order(row: &PgRow) -> Result<Order, sqlx::Error> {
    let Json(items): Json<Vec<OrderLine>> = row.try_get("items")?;
    let Json(address): Json<Address> = row.try_get("address")?;
    let status: String = row.try_get("status")?;
    let payment_method: String = row.try_get("payment_method")?;

    let status = status
        .parse::<OrderStatus>()
        .map_err(|e| sqlx::Error::Decode(e.into()))?;
    let payment_method = payment_method
        .parse::<PaymentMethod>()
        .map_err(|e| sqlx::Error::Decode(e.into()))?;

    Ok(Order {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        items,
        amount: row.try_get("amount")?,
        address,
        payment_method,
        paid: row.try_get("paid")?,
        status,
        session_id: row.try_get("session_id")?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
    })
}

#[async_trait]
impl Repository for PostgresRepository {
    // --- Users ---

    async fn find_user_by_email(&self, email: &str) -> ApiResult<Option<User>> {
        let row = sqlx::query(
            "SELECT id, name, email, password_hash, cart, created_at FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(map_user).transpose().map_err(Into::into)
    }

    async fn get_user(&self, id: Uuid) -> ApiResult<Option<User>> {
        let row = sqlx::query(
            "SELECT id, name, email, password_hash, cart, created_at FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(map_user).transpose().map_err(Into::into)
    }

    /// create_user
    ///
    /// Inserts a fresh account with an empty cart document. The unique index
    /// on `email` is the last line of defense against a duplicate-registration
    /// race; a violation surfaces as `DuplicateIdentity`, not a generic error.
    async fn create_user(&self, name: &str, email: &str, password_hash: &str) -> ApiResult<User> {
        let row = sqlx::query(
            r#"
            INSERT INTO users (id, name, email, password_hash, cart, created_at)
            VALUES ($1, $2, $3, $4, '{}'::jsonb, NOW())
            RETURNING id, name, email, password_hash, cart, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(email)
        .bind(password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if e.as_database_error()
                .is_some_and(|db| db.is_unique_violation())
            {
                ApiError::DuplicateIdentity
            } else {
                ApiError::Database(e)
            }
        })?;

        map_user(&row).map_err(Into::into)
    }

    // --- Cart ---

    async fn get_cart(&self, user_id: Uuid) -> ApiResult<CartData> {
        let row = sqlx::query("SELECT cart FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(ApiError::NotFound("User"))?;

        let Json(cart): Json<CartData> = row.try_get("cart")?;
        Ok(cart)
    }

    /// add_cart_item
    ///
    /// A single conditional JSONB update: the inner `jsonb_set` guarantees the
    /// item object exists, the outer one bumps the size counter. Running the
    /// whole delta inside one UPDATE keeps concurrent adds from clobbering
    /// each other.
    async fn add_cart_item(&self, user_id: Uuid, item_id: Uuid, size: &str) -> ApiResult<()> {
        let affected = sqlx::query(
            r#"
            UPDATE users
            SET cart = jsonb_set(
                jsonb_set(cart, ARRAY[$2], COALESCE(cart -> $2, '{}'::jsonb), true),
                ARRAY[$2, $3],
                to_jsonb(COALESCE((cart #>> ARRAY[$2, $3])::int, 0) + 1),
                true)
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .bind(item_id.to_string())
        .bind(size)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if affected == 0 {
            return Err(ApiError::NotFound("User"));
        }
        Ok(())
    }

    /// set_cart_item
    ///
    /// Unlike `add_cart_item`, this does not create missing structure: setting
    /// a quantity presumes a prior add, and a missing path is an explicit
    /// `ItemNotInCart` failure. Quantity 0 removes the size entry entirely,
    /// and the item object with it when that was its last size, so the stored
    /// document never holds a zero counter or an empty item.
    async fn set_cart_item(
        &self,
        user_id: Uuid,
        item_id: Uuid,
        size: &str,
        quantity: i32,
    ) -> ApiResult<()> {
        let query = if quantity == 0 {
            sqlx::query(
                r#"
                UPDATE users
                SET cart = CASE
                    WHEN (cart #- ARRAY[$2, $3]) -> $2 = '{}'::jsonb
                        THEN (cart #- ARRAY[$2, $3]) - $2
                    ELSE cart #- ARRAY[$2, $3]
                END
                WHERE id = $1 AND cart #> ARRAY[$2, $3] IS NOT NULL
                "#,
            )
            .bind(user_id)
            .bind(item_id.to_string())
            .bind(size)
        } else {
            sqlx::query(
                r#"
                UPDATE users
                SET cart = jsonb_set(cart, ARRAY[$2, $3], to_jsonb($4::int), false)
                WHERE id = $1 AND cart #> ARRAY[$2, $3] IS NOT NULL
                "#,
            )
            .bind(user_id)
            .bind(item_id.to_string())
            .bind(size)
            .bind(quantity)
        };

        let affected = query.execute(&self.pool).await?.rows_affected();

        // The caller passed the user auth gate, so a zero row count means the
        // item/size path was absent, not the user.
        if affected == 0 {
            return Err(ApiError::ItemNotInCart);
        }
        Ok(())
    }

    async fn clear_cart(&self, user_id: Uuid) -> ApiResult<()> {
        sqlx::query("UPDATE users SET cart = '{}'::jsonb WHERE id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // --- Catalog ---

    async fn create_product(&self, new: NewProduct) -> ApiResult<Product> {
        let product = sqlx::query_as::<_, Product>(
            r#"
            INSERT INTO products
                (id, name, description, price, category, sub_category, sizes, images, bestseller, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, NOW())
            RETURNING id, name, description, price, category, sub_category, sizes, images, bestseller, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(new.name)
        .bind(new.description)
        .bind(new.price)
        .bind(new.category)
        .bind(new.sub_category)
        .bind(new.sizes)
        .bind(new.images)
        .bind(new.bestseller)
        .fetch_one(&self.pool)
        .await?;

        Ok(product)
    }

    /// list_products
    ///
    /// The full catalog, newest first. No pagination and no filters.
    async fn list_products(&self) -> ApiResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(
            r#"
            SELECT id, name, description, price, category, sub_category, sizes, images, bestseller, created_at
            FROM products
            ORDER BY created_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(products)
    }

    async fn get_product(&self, id: Uuid) -> ApiResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(
            r#"
            SELECT id, name, description, price, category, sub_category, sizes, images, bestseller, created_at
            FROM products
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    /// delete_product
    ///
    /// Delete-by-id is idempotent-silent: a zero row count is still success.
    async fn delete_product(&self, id: Uuid) -> ApiResult<()> {
        sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // --- Orders ---

    async fn create_order(&self, new: NewOrder) -> ApiResult<Order> {
        let row = sqlx::query(
            r#"
            INSERT INTO orders
                (id, user_id, items, amount, address, payment_method, paid, status, session_id, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, false, $7, NULL, NOW())
            RETURNING id, user_id, items, amount, address, payment_method, paid, status, session_id, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(new.user_id)
        .bind(Json(&new.items))
        .bind(new.amount)
        .bind(Json(&new.address))
        .bind(new.payment_method.as_str())
        .bind(OrderStatus::Placed.as_str())
        .fetch_one(&self.pool)
        .await?;

        map_order(&row).map_err(Into::into)
    }

    async fn get_order(&self, id: Uuid) -> ApiResult<Option<Order>> {
        let row = sqlx::query(
            r#"
            SELECT id, user_id, items, amount, address, payment_method, paid, status, session_id, created_at
            FROM orders
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(map_order).transpose().map_err(Into::into)
    }

    async fn list_orders(&self) -> ApiResult<Vec<Order>> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, items, amount, address, payment_method, paid, status, session_id, created_at
            FROM orders
            ORDER BY created_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(map_order)
            .collect::<Result<Vec<_>, _>>()
            .map_err(Into::into)
    }

    async fn list_user_orders(&self, user_id: Uuid) -> ApiResult<Vec<Order>> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, items, amount, address, payment_method, paid, status, session_id, created_at
            FROM orders
            WHERE user_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(map_order)
            .collect::<Result<Vec<_>, _>>()
            .map_err(Into::into)
    }

    /// update_order_status
    ///
    /// Optimistic transition guard: the row is only touched while it still
    /// holds the status the caller validated against, so two racing admin
    /// updates cannot compose an illegal transition.
    async fn update_order_status(
        &self,
        id: Uuid,
        from: OrderStatus,
        to: OrderStatus,
    ) -> ApiResult<bool> {
        let affected = sqlx::query("UPDATE orders SET status = $3 WHERE id = $1 AND status = $2")
            .bind(id)
            .bind(from.as_str())
            .bind(to.as_str())
            .execute(&self.pool)
            .await?
            .rows_affected();

        Ok(affected > 0)
    }

    async fn set_order_session(&self, id: Uuid, session_id: &str) -> ApiResult<()> {
        sqlx::query("UPDATE orders SET session_id = $2 WHERE id = $1")
            .bind(id)
            .bind(session_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn mark_order_paid(&self, id: Uuid) -> ApiResult<()> {
        sqlx::query("UPDATE orders SET paid = true, status = $2 WHERE id = $1")
            .bind(id)
            .bind(OrderStatus::Paid.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_order(&self, id: Uuid) -> ApiResult<()> {
        sqlx::query("DELETE FROM orders WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
