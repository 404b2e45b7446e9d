use crate::{
    AppState,
    auth::{
        AdminUser, AuthUser, ROLE_ADMIN, ROLE_USER, hash_password, issue_token, validate_email,
        validate_password, verify_password,
    },
    error::{ApiError, ApiResult},
    models::{
        AuthResponse, CartAddRequest, CartResponse, CartUpdateRequest, CheckoutResponse,
        LoginRequest, MessageResponse, OrderLine, OrderListResponse, OrderStatus, PaymentMethod,
        PlaceOrderRequest, ProductListResponse, RegisterRequest, RemoveProductRequest,
        SingleProductRequest, SingleProductResponse, UpdateStatusRequest, VerifyStripeRequest,
    },
    payments::DELIVERY_FEE,
    repository::{NewOrder, NewProduct, RepositoryState},
    storage,
};
use axum::{
    Json,
    extract::{Multipart, State},
};
use uuid::Uuid;

// --- Identity & Auth ---

/// register_user
///
/// [Public Route] Creates a customer account and returns a signed session
/// token. Email format and password strength are validated before touching
/// the database; the duplicate check runs first so a re-registration never
/// hashes a password for nothing.
#[utoipa::path(
    post,
    path = "/api/user/register",
    request_body = RegisterRequest,
    responses(
        (status = 200, description = "Registered", body = AuthResponse),
        (status = 400, description = "Invalid email or weak password"),
        (status = 409, description = "Email already registered")
    )
)]
pub async fn register_user(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> ApiResult<Json<AuthResponse>> {
    if state
        .repo
        .find_user_by_email(&payload.email)
        .await?
        .is_some()
    {
        return Err(ApiError::DuplicateIdentity);
    }

    validate_email(&payload.email)?;
    validate_password(&payload.password)?;

    let password_hash = hash_password(&payload.password)?;
    let user = state
        .repo
        .create_user(&payload.name, &payload.email, &password_hash)
        .await?;

    let token = issue_token(&user.id.to_string(), ROLE_USER, &state.config.jwt_secret)?;
    Ok(Json(AuthResponse {
        success: true,
        token,
    }))
}

/// login_user
///
/// [Public Route] Verifies the password against the stored argon2 hash and
/// returns a session token. A missing account and a wrong password are
/// reported distinctly, matching the storefront client's messages.
#[utoipa::path(
    post,
    path = "/api/user/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = AuthResponse),
        (status = 404, description = "No such account"),
        (status = 401, description = "Wrong password")
    )
)]
pub async fn login_user(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> ApiResult<Json<AuthResponse>> {
    let user = state
        .repo
        .find_user_by_email(&payload.email)
        .await?
        .ok_or(ApiError::UserNotFound)?;

    verify_password(&payload.password, &user.password_hash)?;

    let token = issue_token(&user.id.to_string(), ROLE_USER, &state.config.jwt_secret)?;
    Ok(Json(AuthResponse {
        success: true,
        token,
    }))
}

/// admin_login
///
/// [Public Route] Compares the submitted credentials against the pair
/// injected through `AppConfig`. On match the issued token carries a signed
/// `{sub, role: "admin", exp, iat}` claim set; the admin gate verifies
/// signature, expiry, and role, never the literal secrets.
#[utoipa::path(
    post,
    path = "/api/user/admin",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Admin session issued", body = AuthResponse),
        (status = 401, description = "Wrong credentials")
    )
)]
pub async fn admin_login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> ApiResult<Json<AuthResponse>> {
    if payload.email != state.config.admin_email
        || payload.password != state.config.admin_password
    {
        return Err(ApiError::InvalidCredential);
    }

    let token = issue_token(&state.config.admin_email, ROLE_ADMIN, &state.config.jwt_secret)?;
    Ok(Json(AuthResponse {
        success: true,
        token,
    }))
}

// --- Catalog ---

/// Text fields collected from the add-product multipart form. All arrive in
/// string transport encoding and are coerced here.
#[derive(Default)]
struct ProductForm {
    name: Option<String>,
    description: Option<String>,
    price: Option<String>,
    category: Option<String>,
    sub_category: Option<String>,
    sizes: Option<String>,
    bestseller: Option<String>,
}

fn require(field: Option<String>, name: &str) -> ApiResult<String> {
    field.ok_or_else(|| ApiError::Validation(format!("Missing field: {name}")))
}

/// add_product
///
/// [Admin Route] Accepts a multipart form with the catalog fields and up to
/// four image parts. Each image is pushed to the object store under a
/// server-generated random key, and the product row records the resulting
/// URLs. Numeric and boolean fields are coerced from their string encoding
/// (`price`, `bestseller`, and a JSON-encoded `sizes` list).
#[utoipa::path(
    post,
    path = "/api/product/add",
    responses(
        (status = 200, description = "Product added", body = MessageResponse),
        (status = 400, description = "Missing or uncoercible field"),
        (status = 502, description = "Image upload failed")
    )
)]
pub async fn add_product(
    _admin: AdminUser,
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<Json<MessageResponse>> {
    let mut form = ProductForm::default();
    // Staged images: (original filename, content type, bytes). Staging them
    // all before the first upload keeps a half-written product out of the
    // bucket when a later part is malformed.
    let mut staged: Vec<(String, String, Vec<u8>)> = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::Validation(format!("Malformed multipart body: {e}")))?
    {
        let field_name = field.name().unwrap_or_default().to_string();
        match field_name.as_str() {
            "image1" | "image2" | "image3" | "image4" => {
                let filename = field.file_name().unwrap_or("upload.bin").to_string();
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::Validation(format!("Unreadable image part: {e}")))?
                    .to_vec();
                staged.push((filename, content_type, bytes));
            }
            "name" => form.name = Some(read_text(field).await?),
            "description" => form.description = Some(read_text(field).await?),
            "price" => form.price = Some(read_text(field).await?),
            "category" => form.category = Some(read_text(field).await?),
            "subCategory" => form.sub_category = Some(read_text(field).await?),
            "sizes" => form.sizes = Some(read_text(field).await?),
            "bestseller" => form.bestseller = Some(read_text(field).await?),
            // Unknown parts are ignored, matching the tolerant form contract.
            _ => {}
        }
    }

    let name = require(form.name, "name")?;
    let description = require(form.description, "description")?;
    let category = require(form.category, "category")?;
    let sub_category = require(form.sub_category, "subCategory")?;

    let price: f64 = require(form.price, "price")?
        .trim()
        .parse()
        .map_err(|_| ApiError::Validation("price must be a number".into()))?;

    let sizes: Vec<String> = serde_json::from_str(&require(form.sizes, "sizes")?)
        .map_err(|_| ApiError::Validation("sizes must be a JSON array of labels".into()))?;

    let bestseller = form.bestseller.as_deref() == Some("true");

    let mut images = Vec::with_capacity(staged.len());
    for (filename, content_type, bytes) in staged {
        let key = storage::object_key(&filename);
        let url = state
            .storage
            .upload_image(&key, bytes, &content_type)
            .await
            .map_err(ApiError::Upload)?;
        images.push(url);
    }

    state
        .repo
        .create_product(NewProduct {
            name,
            description,
            price,
            category,
            sub_category,
            sizes,
            images,
            bestseller,
        })
        .await?;

    Ok(Json(MessageResponse::ok("Product added successfully")))
}

async fn read_text(field: axum::extract::multipart::Field<'_>) -> ApiResult<String> {
    field
        .text()
        .await
        .map_err(|e| ApiError::Validation(format!("Unreadable form field: {e}")))
}

/// list_products
///
/// [Public Route] Returns the full catalog, unfiltered. No pagination and no
/// query parameters.
#[utoipa::path(
    get,
    path = "/api/product/list",
    responses((status = 200, description = "Full catalog", body = ProductListResponse))
)]
pub async fn list_products(State(state): State<AppState>) -> ApiResult<Json<ProductListResponse>> {
    let products = state.repo.list_products().await?;
    Ok(Json(ProductListResponse {
        success: true,
        products,
    }))
}

/// remove_product
///
/// [Admin Route] Deletes a catalog entry by id. The delete is
/// idempotent-silent: removing an id that does not exist still succeeds.
#[utoipa::path(
    post,
    path = "/api/product/remove",
    request_body = RemoveProductRequest,
    responses((status = 200, description = "Removed (or already gone)", body = MessageResponse))
)]
pub async fn remove_product(
    _admin: AdminUser,
    State(state): State<AppState>,
    Json(payload): Json<RemoveProductRequest>,
) -> ApiResult<Json<MessageResponse>> {
    state.repo.delete_product(payload.id).await?;
    Ok(Json(MessageResponse::ok("Product removed successfully")))
}

/// single_product
///
/// [Public Route] Looks up one catalog entry. A missing id is not an error:
/// the envelope succeeds with a null product.
#[utoipa::path(
    post,
    path = "/api/product/single",
    request_body = SingleProductRequest,
    responses((status = 200, description = "Lookup result", body = SingleProductResponse))
)]
pub async fn single_product(
    State(state): State<AppState>,
    Json(payload): Json<SingleProductRequest>,
) -> ApiResult<Json<SingleProductResponse>> {
    let product = state.repo.get_product(payload.product_id).await?;
    Ok(Json(SingleProductResponse {
        success: true,
        product,
    }))
}

// --- Cart ---

/// get_user_cart
///
/// [Authenticated Route] Returns the caller's embedded cart mapping verbatim.
/// The acting user always comes from the session token, never the body.
#[utoipa::path(
    post,
    path = "/api/cart/get",
    responses((status = 200, description = "Cart contents", body = CartResponse))
)]
pub async fn get_user_cart(
    AuthUser { id }: AuthUser,
    State(state): State<AppState>,
) -> ApiResult<Json<CartResponse>> {
    let cart_data = state.repo.get_cart(id).await?;
    Ok(Json(CartResponse {
        success: true,
        cart_data,
    }))
}

/// add_to_cart
///
/// [Authenticated Route] Increments the quantity at [item][size] by one. The
/// repository applies the delta as a single atomic statement, so concurrent
/// adds from two sessions both land.
#[utoipa::path(
    post,
    path = "/api/cart/add",
    request_body = CartAddRequest,
    responses((status = 200, description = "Added", body = MessageResponse))
)]
pub async fn add_to_cart(
    AuthUser { id }: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CartAddRequest>,
) -> ApiResult<Json<MessageResponse>> {
    state
        .repo
        .add_cart_item(id, payload.item_id, &payload.size)
        .await?;
    Ok(Json(MessageResponse::ok("Added to cart")))
}

/// update_cart
///
/// [Authenticated Route] Sets the quantity at [item][size] directly.
/// Updating an entry that was never added fails with an explicit
/// item-not-in-cart error: update presumes a prior add. Quantity 0 removes
/// the entry.
#[utoipa::path(
    post,
    path = "/api/cart/update",
    request_body = CartUpdateRequest,
    responses(
        (status = 200, description = "Updated", body = MessageResponse),
        (status = 400, description = "Item was never added")
    )
)]
pub async fn update_cart(
    AuthUser { id }: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CartUpdateRequest>,
) -> ApiResult<Json<MessageResponse>> {
    if payload.quantity < 0 {
        return Err(ApiError::Validation("quantity must be >= 0".into()));
    }

    state
        .repo
        .set_cart_item(id, payload.item_id, &payload.size, payload.quantity)
        .await?;
    Ok(Json(MessageResponse::ok("Cart updated")))
}

// --- Orders ---

/// snapshot_cart
///
/// Turns the user's current cart into priced order lines. Name and price are
/// copied from the catalog at this moment; entries whose product has been
/// removed from the catalog since they were added are dropped. An effectively
/// empty cart is a validation failure.
async fn snapshot_cart(repo: &RepositoryState, user_id: Uuid) -> ApiResult<(Vec<OrderLine>, f64)> {
    let cart = repo.get_cart(user_id).await?;

    let mut lines = Vec::new();
    let mut total = 0.0;

    for (item_id, sizes) in cart {
        let Some(product) = repo.get_product(item_id).await? else {
            continue;
        };
        for (size, quantity) in sizes {
            if quantity <= 0 {
                continue;
            }
            total += product.price * f64::from(quantity);
            lines.push(OrderLine {
                product_id: item_id,
                name: product.name.clone(),
                price: product.price,
                size,
                quantity,
            });
        }
    }

    if lines.is_empty() {
        return Err(ApiError::Validation("Cart is empty".into()));
    }

    Ok((lines, total + DELIVERY_FEE))
}

/// place_order
///
/// [Authenticated Route] Cash-on-delivery checkout: snapshots the cart into
/// an order in `placed` status and clears the cart immediately.
#[utoipa::path(
    post,
    path = "/api/order/place",
    request_body = PlaceOrderRequest,
    responses(
        (status = 200, description = "Order placed", body = MessageResponse),
        (status = 400, description = "Cart is empty")
    )
)]
pub async fn place_order(
    AuthUser { id }: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<PlaceOrderRequest>,
) -> ApiResult<Json<MessageResponse>> {
    let (items, amount) = snapshot_cart(&state.repo, id).await?;

    state
        .repo
        .create_order(NewOrder {
            user_id: id,
            items,
            amount,
            address: payload.address,
            payment_method: PaymentMethod::Cod,
        })
        .await?;

    state.repo.clear_cart(id).await?;

    Ok(Json(MessageResponse::ok("Order placed")))
}

/// place_order_stripe
///
/// [Authenticated Route] Stripe checkout: snapshots the cart into an order,
/// creates a provider-side Checkout Session, records the session id on the
/// order, and returns the hosted payment URL. The cart is cleared only once
/// the payment is verified.
#[utoipa::path(
    post,
    path = "/api/order/stripe",
    request_body = PlaceOrderRequest,
    responses(
        (status = 200, description = "Checkout session created", body = CheckoutResponse),
        (status = 400, description = "Cart is empty"),
        (status = 502, description = "Provider call failed")
    )
)]
pub async fn place_order_stripe(
    AuthUser { id }: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<PlaceOrderRequest>,
) -> ApiResult<Json<CheckoutResponse>> {
    let (items, amount) = snapshot_cart(&state.repo, id).await?;

    let order = state
        .repo
        .create_order(NewOrder {
            user_id: id,
            items,
            amount,
            address: payload.address,
            payment_method: PaymentMethod::Stripe,
        })
        .await?;

    let origin = &state.config.frontend_origin;
    let success_url = format!("{origin}/verify?success=true&orderId={}", order.id);
    let cancel_url = format!("{origin}/verify?success=false&orderId={}", order.id);

    let session = state
        .payments
        .create_checkout_session(&order, &success_url, &cancel_url)
        .await?;

    state.repo.set_order_session(order.id, &session.id).await?;

    Ok(Json(CheckoutResponse {
        success: true,
        session_url: session.url,
    }))
}

/// verify_stripe
///
/// [Authenticated Route] Finalizes a Stripe order after the checkout
/// redirect. The client's `success` flag is only a hint: payment is confirmed
/// against the provider before the order is marked paid and the cart cleared.
/// A cancelled checkout deletes the pending order.
#[utoipa::path(
    post,
    path = "/api/order/verifyStripe",
    request_body = VerifyStripeRequest,
    responses(
        (status = 200, description = "Verification outcome", body = MessageResponse),
        (status = 404, description = "Order not found"),
        (status = 502, description = "Provider reported the session unpaid")
    )
)]
pub async fn verify_stripe(
    AuthUser { id }: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<VerifyStripeRequest>,
) -> ApiResult<Json<MessageResponse>> {
    let order = state
        .repo
        .get_order(payload.order_id)
        .await?
        .filter(|order| order.user_id == id)
        .ok_or(ApiError::NotFound("Order"))?;

    if !payload.success {
        // Only a still-pending checkout is abandoned. A replayed cancel after
        // settlement, or one aimed at a COD order, must not destroy the order.
        let pending = order.payment_method == PaymentMethod::Stripe
            && !order.paid
            && order.status == OrderStatus::Placed;
        if !pending {
            return Ok(Json(MessageResponse {
                success: false,
                message: "Order already settled".to_string(),
            }));
        }

        state.repo.delete_order(order.id).await?;
        return Ok(Json(MessageResponse {
            success: false,
            message: "Payment cancelled, order removed".to_string(),
        }));
    }

    let session_id = order
        .session_id
        .as_deref()
        .ok_or(ApiError::Payment("Order has no checkout session".into()))?;

    if !state.payments.session_paid(session_id).await? {
        return Err(ApiError::Payment("Payment not completed".into()));
    }

    state.repo.mark_order_paid(order.id).await?;
    state.repo.clear_cart(id).await?;

    Ok(Json(MessageResponse::ok("Payment verified")))
}

/// all_orders
///
/// [Admin Route] Lists every order in the system, unfiltered.
#[utoipa::path(
    post,
    path = "/api/order/list",
    responses((status = 200, description = "All orders", body = OrderListResponse))
)]
pub async fn all_orders(
    _admin: AdminUser,
    State(state): State<AppState>,
) -> ApiResult<Json<OrderListResponse>> {
    let orders = state.repo.list_orders().await?;
    Ok(Json(OrderListResponse {
        success: true,
        orders,
    }))
}

/// update_status
///
/// [Admin Route] Applies a fulfillment-status transition. The requested
/// transition is validated against the enumerated state machine, and the
/// repository update is guarded on the status the validation saw, so a racing
/// second admin cannot compose an illegal pair of moves.
#[utoipa::path(
    post,
    path = "/api/order/status",
    request_body = UpdateStatusRequest,
    responses(
        (status = 200, description = "Status updated", body = MessageResponse),
        (status = 404, description = "Order not found"),
        (status = 409, description = "Illegal transition")
    )
)]
pub async fn update_status(
    _admin: AdminUser,
    State(state): State<AppState>,
    Json(payload): Json<UpdateStatusRequest>,
) -> ApiResult<Json<MessageResponse>> {
    let order = state
        .repo
        .get_order(payload.order_id)
        .await?
        .ok_or(ApiError::NotFound("Order"))?;

    if !order.status.can_transition(payload.status) {
        return Err(ApiError::IllegalTransition {
            from: order.status.to_string(),
            to: payload.status.to_string(),
        });
    }

    let updated = state
        .repo
        .update_order_status(order.id, order.status, payload.status)
        .await?;

    if !updated {
        // The order moved underneath us between read and write.
        return Err(ApiError::IllegalTransition {
            from: order.status.to_string(),
            to: payload.status.to_string(),
        });
    }

    Ok(Json(MessageResponse::ok("Status updated")))
}

/// user_orders
///
/// [Authenticated Route] Lists the caller's own orders.
#[utoipa::path(
    post,
    path = "/api/order/userorders",
    responses((status = 200, description = "Caller's orders", body = OrderListResponse))
)]
pub async fn user_orders(
    AuthUser { id }: AuthUser,
    State(state): State<AppState>,
) -> ApiResult<Json<OrderListResponse>> {
    let orders = state.repo.list_user_orders(id).await?;
    Ok(Json(OrderListResponse {
        success: true,
        orders,
    }))
}
