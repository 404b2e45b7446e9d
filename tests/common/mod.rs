use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use uuid::Uuid;

use storefront_api::{
    AppConfig, AppState, MockPaymentGateway, MockStorageService,
    error::{ApiError, ApiResult},
    models::{CartData, Order, OrderStatus, Product, User},
    repository::{NewOrder, NewProduct, Repository},
    create_router,
};

// --- IN-MEMORY REPOSITORY ---

// Backs the HTTP-level tests without a database. Every trait method mirrors
// the semantics of the Postgres implementation, including the atomic-delta
// cart behavior and the guarded status transition.
#[derive(Default)]
pub struct InMemoryRepository {
    pub users: Mutex<HashMap<Uuid, User>>,
    pub products: Mutex<HashMap<Uuid, Product>>,
    pub orders: Mutex<HashMap<Uuid, Order>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a catalog entry directly, bypassing the multipart admin route.
    pub fn seed_product(&self, name: &str, price: f64, sizes: &[&str]) -> Product {
        let product = Product {
            id: Uuid::new_v4(),
            name: name.to_string(),
            description: format!("{name} description"),
            price,
            category: "Men".to_string(),
            sub_category: "Topwear".to_string(),
            sizes: sizes.iter().map(|s| s.to_string()).collect(),
            images: vec!["http://localhost:9000/mock-bucket/products/seed.png".to_string()],
            bestseller: false,
            created_at: chrono::Utc::now(),
        };
        self.products
            .lock()
            .unwrap()
            .insert(product.id, product.clone());
        product
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    // --- Users ---

    async fn find_user_by_email(&self, email: &str) -> ApiResult<Option<User>> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn get_user(&self, id: Uuid) -> ApiResult<Option<User>> {
        Ok(self.users.lock().unwrap().get(&id).cloned())
    }

    async fn create_user(&self, name: &str, email: &str, password_hash: &str) -> ApiResult<User> {
        let mut users = self.users.lock().unwrap();
        if users.values().any(|u| u.email == email) {
            return Err(ApiError::DuplicateIdentity);
        }
        let user = User {
            id: Uuid::new_v4(),
            name: name.to_string(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            cart: CartData::new(),
            created_at: chrono::Utc::now(),
        };
        users.insert(user.id, user.clone());
        Ok(user)
    }

    // --- Cart ---

    async fn get_cart(&self, user_id: Uuid) -> ApiResult<CartData> {
        self.users
            .lock()
            .unwrap()
            .get(&user_id)
            .map(|u| u.cart.clone())
            .ok_or(ApiError::NotFound("User"))
    }

    async fn add_cart_item(&self, user_id: Uuid, item_id: Uuid, size: &str) -> ApiResult<()> {
        let mut users = self.users.lock().unwrap();
        let user = users.get_mut(&user_id).ok_or(ApiError::NotFound("User"))?;
        *user
            .cart
            .entry(item_id)
            .or_default()
            .entry(size.to_string())
            .or_insert(0) += 1;
        Ok(())
    }

    async fn set_cart_item(
        &self,
        user_id: Uuid,
        item_id: Uuid,
        size: &str,
        quantity: i32,
    ) -> ApiResult<()> {
        let mut users = self.users.lock().unwrap();
        let user = users.get_mut(&user_id).ok_or(ApiError::NotFound("User"))?;

        let sizes = user.cart.get_mut(&item_id).ok_or(ApiError::ItemNotInCart)?;
        if !sizes.contains_key(size) {
            return Err(ApiError::ItemNotInCart);
        }

        if quantity == 0 {
            sizes.remove(size);
            if sizes.is_empty() {
                user.cart.remove(&item_id);
            }
        } else {
            sizes.insert(size.to_string(), quantity);
        }
        Ok(())
    }

    async fn clear_cart(&self, user_id: Uuid) -> ApiResult<()> {
        if let Some(user) = self.users.lock().unwrap().get_mut(&user_id) {
            user.cart.clear();
        }
        Ok(())
    }

    // --- Catalog ---

    async fn create_product(&self, new: NewProduct) -> ApiResult<Product> {
        let product = Product {
            id: Uuid::new_v4(),
            name: new.name,
            description: new.description,
            price: new.price,
            category: new.category,
            sub_category: new.sub_category,
            sizes: new.sizes,
            images: new.images,
            bestseller: new.bestseller,
            created_at: chrono::Utc::now(),
        };
        self.products
            .lock()
            .unwrap()
            .insert(product.id, product.clone());
        Ok(product)
    }

    async fn list_products(&self) -> ApiResult<Vec<Product>> {
        Ok(self.products.lock().unwrap().values().cloned().collect())
    }

    async fn get_product(&self, id: Uuid) -> ApiResult<Option<Product>> {
        Ok(self.products.lock().unwrap().get(&id).cloned())
    }

    async fn delete_product(&self, id: Uuid) -> ApiResult<()> {
        self.products.lock().unwrap().remove(&id);
        Ok(())
    }

    // --- Orders ---

    async fn create_order(&self, new: NewOrder) -> ApiResult<Order> {
        let order = Order {
            id: Uuid::new_v4(),
            user_id: new.user_id,
            items: new.items,
            amount: new.amount,
            address: new.address,
            payment_method: new.payment_method,
            paid: false,
            status: OrderStatus::Placed,
            session_id: None,
            created_at: chrono::Utc::now(),
        };
        self.orders
            .lock()
            .unwrap()
            .insert(order.id, order.clone());
        Ok(order)
    }

    async fn get_order(&self, id: Uuid) -> ApiResult<Option<Order>> {
        Ok(self.orders.lock().unwrap().get(&id).cloned())
    }

    async fn list_orders(&self) -> ApiResult<Vec<Order>> {
        Ok(self.orders.lock().unwrap().values().cloned().collect())
    }

    async fn list_user_orders(&self, user_id: Uuid) -> ApiResult<Vec<Order>> {
        Ok(self
            .orders
            .lock()
            .unwrap()
            .values()
            .filter(|o| o.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn update_order_status(
        &self,
        id: Uuid,
        from: OrderStatus,
        to: OrderStatus,
    ) -> ApiResult<bool> {
        let mut orders = self.orders.lock().unwrap();
        match orders.get_mut(&id) {
            Some(order) if order.status == from => {
                order.status = to;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn set_order_session(&self, id: Uuid, session_id: &str) -> ApiResult<()> {
        if let Some(order) = self.orders.lock().unwrap().get_mut(&id) {
            order.session_id = Some(session_id.to_string());
        }
        Ok(())
    }

    async fn mark_order_paid(&self, id: Uuid) -> ApiResult<()> {
        if let Some(order) = self.orders.lock().unwrap().get_mut(&id) {
            order.paid = true;
            order.status = OrderStatus::Paid;
        }
        Ok(())
    }

    async fn delete_order(&self, id: Uuid) -> ApiResult<()> {
        self.orders.lock().unwrap().remove(&id);
        Ok(())
    }
}

// --- TEST APP ---

pub struct TestApp {
    pub address: String,
    pub repo: Arc<InMemoryRepository>,
    pub config: AppConfig,
}

/// Boots the full router on an ephemeral port with in-memory/mock components.
/// `paid` controls what the payment gateway reports at verification time.
pub async fn spawn_app_with_payment(paid: bool) -> TestApp {
    let repo = Arc::new(InMemoryRepository::new());
    let config = AppConfig::default();

    let payments = MockPaymentGateway {
        should_fail: false,
        paid,
    };

    let state = AppState {
        repo: repo.clone(),
        storage: Arc::new(MockStorageService::new()),
        payments: Arc::new(payments),
        config: config.clone(),
    };
    let router = create_router(state);

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    TestApp {
        address,
        repo,
        config,
    }
}

pub async fn spawn_app() -> TestApp {
    spawn_app_with_payment(true).await
}

impl TestApp {
    /// Registers an account through the API and returns its session token.
    pub async fn register(&self, client: &reqwest::Client, email: &str) -> String {
        let response = client
            .post(format!("{}/api/user/register", self.address))
            .json(&serde_json::json!({
                "name": "Test Shopper",
                "email": email,
                "password": "a-long-enough-password"
            }))
            .send()
            .await
            .expect("register request failed");
        assert!(response.status().is_success());

        let body: serde_json::Value = response.json().await.unwrap();
        body["token"].as_str().expect("token missing").to_string()
    }

    /// Logs in with the configured admin credentials and returns the token.
    pub async fn admin_token(&self, client: &reqwest::Client) -> String {
        let response = client
            .post(format!("{}/api/user/admin", self.address))
            .json(&serde_json::json!({
                "email": self.config.admin_email,
                "password": self.config.admin_password
            }))
            .send()
            .await
            .expect("admin login request failed");
        assert!(response.status().is_success());

        let body: serde_json::Value = response.json().await.unwrap();
        body["token"].as_str().expect("token missing").to_string()
    }
}
