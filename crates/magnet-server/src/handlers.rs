//! HTTP Handlers

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use chrono::{DateTime, Utc};
use magnet_core::{
    Address, CheckoutToken, LineItem, NewAddress, Order, OrderItem, OrderStatus, PendingOrder,
};
use magnet_payments::{
    FinalizeRequest, FinalizedOrder, IntentRequest, IntentTicket, PaymentError, SIGNATURE_HEADER,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::instrument;
use uuid::Uuid;

use crate::auth::{AdminUser, AuthUser};
use crate::error::{api_error, error_response, ApiResult};
use crate::extract::{ApiJson, ApiPath};
use crate::state::AppState;

// ============================================================================
// Request / Response Types
// ============================================================================

#[derive(Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub gateway: String,
}

/// Snapshot fields posted by the browser
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingCheckoutRequest {
    pub items: Vec<LineItem>,
    pub total: Decimal,
    #[serde(default)]
    pub shipping_address_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingCheckoutResponse {
    pub token: CheckoutToken,
    pub expires_at: DateTime<Utc>,
}

/// Either the full snapshot, or a pending checkout token standing in for it
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    #[serde(default)]
    pub payment_intent_id: String,
    #[serde(default)]
    pub items: Option<Vec<LineItem>>,
    #[serde(default)]
    pub total: Option<Decimal>,
    #[serde(default)]
    pub shipping_address_id: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub pending_token: Option<CheckoutToken>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OrderDetail {
    pub order: Order,
    pub items: Vec<OrderItem>,
}

#[derive(Debug, Deserialize)]
pub struct StatusUpdateRequest {
    pub status: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WebhookAck {
    pub received: bool,
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".into(),
        version: env!("CARGO_PKG_VERSION").into(),
        gateway: state.gateway.name().into(),
    })
}

/// Open a payment intent for the cart
#[instrument(skip_all, fields(user_id = %user.user_id))]
pub async fn create_payment_intent(
    State(state): State<AppState>,
    user: AuthUser,
    ApiJson(payload): ApiJson<IntentRequest>,
) -> ApiResult<Json<IntentTicket>> {
    let ticket = state
        .issuer
        .issue(payload, &user.user_id)
        .await
        .map_err(api_error)?;
    Ok(Json(ticket))
}

/// Save a pending checkout before the browser leaves for authentication
#[instrument(skip_all, fields(user_id = %user.user_id))]
pub async fn create_pending_checkout(
    State(state): State<AppState>,
    user: AuthUser,
    ApiJson(payload): ApiJson<PendingCheckoutRequest>,
) -> ApiResult<(StatusCode, Json<PendingCheckoutResponse>)> {
    let order = PendingOrder {
        items: payload.items,
        total: payload.total,
        shipping_address_id: payload.shipping_address_id,
        user_id: user.user_id,
    };
    order.cart().validate().map_err(api_error)?;
    if order.shipping_address_id.trim().is_empty() {
        return Err(api_error(PaymentError::Validation(
            "Please select a shipping address.".into(),
        )));
    }

    let record = state
        .pending
        .put(order, state.pending_ttl)
        .await
        .map_err(api_error)?;

    tracing::info!(expires_at = %record.expires_at, "Saved pending checkout");
    Ok((
        StatusCode::CREATED,
        Json(PendingCheckoutResponse {
            token: record.token,
            expires_at: record.expires_at,
        }),
    ))
}

/// Read a pending checkout
#[instrument(skip_all, fields(user_id = %user.user_id))]
pub async fn get_pending_checkout(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(token): ApiPath<String>,
) -> ApiResult<Json<PendingOrder>> {
    let token = CheckoutToken::from_string(token);
    let record = state
        .pending
        .get(&token)
        .await
        .map_err(api_error)?
        .ok_or_else(|| {
            error_response(
                StatusCode::NOT_FOUND,
                "Your checkout session has expired. Please start again.",
                "NOT_FOUND",
            )
        })?;

    if record.order.user_id != user.user_id {
        return Err(api_error(PaymentError::Forbidden("Pending checkout owned by another user".into())));
    }
    Ok(Json(record.order))
}

/// Discard a pending checkout; succeeds if it is already gone
#[instrument(skip_all, fields(user_id = %user.user_id))]
pub async fn delete_pending_checkout(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(token): ApiPath<String>,
) -> ApiResult<StatusCode> {
    let token = CheckoutToken::from_string(token);
    if let Some(record) = state.pending.get(&token).await.map_err(api_error)? {
        if record.order.user_id != user.user_id {
            return Err(api_error(PaymentError::Forbidden(
                "Pending checkout owned by another user".into(),
            )));
        }
        state.pending.take(&token).await.map_err(api_error)?;
    }
    Ok(StatusCode::NO_CONTENT)
}

/// Create the order for a paid intent
#[instrument(skip_all, fields(user_id = %user.user_id, payment_intent_id = %payload.payment_intent_id))]
pub async fn create_order(
    State(state): State<AppState>,
    user: AuthUser,
    ApiJson(payload): ApiJson<CreateOrderRequest>,
) -> ApiResult<(StatusCode, Json<FinalizedOrder>)> {
    if payload
        .user_id
        .as_deref()
        .is_some_and(|id| id != user.user_id)
    {
        return Err(api_error(PaymentError::Forbidden(
            "Order user does not match the signed-in user".into(),
        )));
    }

    let pending_token = payload.pending_token.clone();
    let order = match &pending_token {
        Some(token) => {
            let record = state
                .pending
                .get(token)
                .await
                .map_err(api_error)?
                .ok_or_else(|| {
                    api_error(PaymentError::Validation(
                        "Your checkout session has expired. Please start again.".into(),
                    ))
                })?;
            record.order
        }
        None => PendingOrder {
            items: payload.items.ok_or_else(|| {
                api_error(PaymentError::Validation("Your cart is empty.".into()))
            })?,
            total: payload.total.ok_or_else(|| {
                api_error(PaymentError::Validation("Missing order total.".into()))
            })?,
            shipping_address_id: payload.shipping_address_id.unwrap_or_default(),
            user_id: user.user_id.clone(),
        },
    };

    let result = state
        .finalizer
        .finalize(
            FinalizeRequest {
                order,
                payment_intent_id: payload.payment_intent_id,
            },
            &user.user_id,
        )
        .await
        .map_err(api_error)?;

    if let Some(token) = pending_token {
        // The order is durable now; a failed cleanup only leaves a record to expire.
        if let Err(e) = state.pending.take(&token).await {
            tracing::warn!(error = %e, "Failed to discard pending checkout");
        }
    }

    let status = if result.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(result)))
}

/// Order history for the signed-in user
#[instrument(skip_all, fields(user_id = %user.user_id))]
pub async fn list_orders(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<Json<Vec<Order>>> {
    let orders = state
        .orders
        .orders_for_user(&user.user_id)
        .await
        .map_err(api_error)?;
    Ok(Json(orders))
}

/// One order with its items
#[instrument(skip_all, fields(user_id = %user.user_id, order_id = %id))]
pub async fn get_order(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<OrderDetail>> {
    let order = state
        .orders
        .get_order(id)
        .await
        .map_err(api_error)?
        .filter(|order| order.belongs_to(&user.user_id))
        .ok_or_else(|| api_error(magnet_core::CoreError::OrderNotFound(id)))?;

    let items = state.orders.order_items(id).await.map_err(api_error)?;
    Ok(Json(OrderDetail { order, items }))
}

/// Saved shipping addresses
#[instrument(skip_all, fields(user_id = %user.user_id))]
pub async fn list_addresses(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<Json<Vec<Address>>> {
    let addresses = state
        .addresses
        .addresses_for_user(&user.user_id)
        .await
        .map_err(api_error)?;
    Ok(Json(addresses))
}

/// Add a shipping address
#[instrument(skip_all, fields(user_id = %user.user_id))]
pub async fn add_address(
    State(state): State<AppState>,
    user: AuthUser,
    ApiJson(payload): ApiJson<NewAddress>,
) -> ApiResult<(StatusCode, Json<Address>)> {
    payload.validate().map_err(api_error)?;
    let address = state
        .addresses
        .add_address(payload.into_address(user.user_id))
        .await
        .map_err(api_error)?;
    Ok((StatusCode::CREATED, Json(address)))
}

/// Manual fulfillment status change
#[instrument(skip_all, fields(admin = %admin.user_id, order_id = %id))]
pub async fn update_order_status(
    State(state): State<AppState>,
    admin: AdminUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<StatusUpdateRequest>,
) -> ApiResult<Json<Order>> {
    let status: OrderStatus = payload.status.parse().map_err(|_| {
        api_error(PaymentError::Validation(format!(
            "Unknown order status: {}",
            payload.status
        )))
    })?;

    let (order, transition) = state
        .orders
        .set_status(id, status)
        .await
        .map_err(api_error)?;

    tracing::info!(transition = ?transition, status = %order.status, "Order status changed by admin");
    Ok(Json(order))
}

/// Gateway webhook receiver
#[instrument(skip_all)]
pub async fn payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<WebhookAck>> {
    let verifier = state.webhook.as_ref().ok_or_else(|| {
        api_error(PaymentError::Config("Webhook secret not configured".into()))
    })?;

    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            tracing::warn!("Webhook without signature");
            error_response(
                StatusCode::BAD_REQUEST,
                "Missing Stripe signature",
                "MISSING_SIGNATURE",
            )
        })?;

    let event = verifier.construct_event(&body, signature).map_err(|e| {
        tracing::warn!(error = %e, "Webhook rejected");
        api_error(e)
    })?;

    let outcome = state.reconciler.handle(event).await.map_err(|e| {
        tracing::error!(error = %e, "Webhook processing error");
        api_error(e)
    })?;
    tracing::debug!(outcome = ?outcome, "Webhook processed");

    Ok(Json(WebhookAck { received: true }))
}
