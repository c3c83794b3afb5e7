//! Order Service
//!
//! Creates orders on the order-based gateway and resolves payment status by id.
//! The service validates every request before it reaches the gateway and
//! deduplicates creations that carry an idempotency key.

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::OnceCell;

use crate::error::{PaymentError, Result};

/// Last path segment of the payment endpoint when no id is appended
pub const PAYMENT_PATH_PLACEHOLDER: &str = "get-payment";

const MAX_IDEMPOTENCY_KEY_LEN: usize = 32;

/// Free-form notes attached to an order
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderNotes {
    pub plan: String,
    pub created_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
}

/// An order created on the gateway. Immutable once created.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    /// Amount in the smallest currency unit
    pub amount: u64,
    pub currency: String,
    pub receipt: String,
    pub notes: OrderNotes,
}

/// A payment as reported by the gateway at query time
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub id: String,
    pub amount: u64,
    pub currency: String,
    /// Gateway-defined status, kept opaque
    pub status: String,
    #[serde(default)]
    pub method: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub contact: Option<String>,
    #[serde(default)]
    pub created_at: i64,
}

/// Order as submitted to the gateway
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct NewOrder {
    pub amount: u64,
    pub currency: String,
    pub receipt: String,
    pub notes: OrderNotes,
}

/// Incoming create-order request, before validation
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    #[serde(default)]
    pub amount: Option<i64>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub plan_name: Option<String>,
    #[serde(default)]
    pub idempotency_key: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct ValidatedOrder {
    amount: u64,
    currency: String,
    plan_name: String,
    idempotency_key: Option<String>,
}

impl CreateOrderRequest {
    pub fn new(amount: i64, currency: impl Into<String>, plan_name: impl Into<String>) -> Self {
        Self {
            amount: Some(amount),
            currency: Some(currency.into()),
            plan_name: Some(plan_name.into()),
            idempotency_key: None,
        }
    }

    #[must_use]
    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }

    fn validate(&self) -> Result<ValidatedOrder> {
        let (Some(amount), Some(currency), Some(plan_name)) =
            (self.amount, self.currency.as_deref(), self.plan_name.as_deref())
        else {
            return Err(PaymentError::validation(
                "Missing required fields: amount, currency, planName",
            ));
        };

        let plan_name = plan_name.trim();
        if amount == 0 || currency.is_empty() || plan_name.is_empty() {
            return Err(PaymentError::validation(
                "Missing required fields: amount, currency, planName",
            ));
        }

        let amount = u64::try_from(amount).map_err(|_| {
            PaymentError::validation("amount must be a positive integer in the smallest currency unit")
        })?;

        if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(PaymentError::validation(
                "currency must be a three-letter ISO 4217 code",
            ));
        }

        let idempotency_key = match self.idempotency_key.as_deref() {
            None => None,
            Some(key) if is_valid_idempotency_key(key) => Some(key.to_string()),
            Some(_) => {
                return Err(PaymentError::validation(
                    "idempotencyKey must be 1-32 characters of [A-Za-z0-9_-]",
                ));
            }
        };

        Ok(ValidatedOrder {
            amount,
            currency: currency.to_ascii_uppercase(),
            plan_name: plan_name.to_string(),
            idempotency_key,
        })
    }
}

fn is_valid_idempotency_key(key: &str) -> bool {
    !key.is_empty()
        && key.len() <= MAX_IDEMPOTENCY_KEY_LEN
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Extract the payment id from a request path (its last non-empty segment).
pub fn payment_id_from_path(path: &str) -> &str {
    path.trim_end_matches('/').rsplit('/').next().unwrap_or_default()
}

/// Order-based payment gateway
#[async_trait]
pub trait OrderGateway: Send + Sync {
    /// Create an order
    async fn create_order(&self, order: NewOrder) -> Result<Order>;

    /// Fetch a payment by id (read-only)
    async fn fetch_payment(&self, payment_id: &str) -> Result<Payment>;
}

#[async_trait]
impl<G: OrderGateway + ?Sized> OrderGateway for Arc<G> {
    async fn create_order(&self, order: NewOrder) -> Result<Order> {
        (**self).create_order(order).await
    }

    async fn fetch_payment(&self, payment_id: &str) -> Result<Payment> {
        (**self).fetch_payment(payment_id).await
    }
}

/// Keys remembered at most this long after their order was created
pub const DEFAULT_IDEMPOTENCY_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Upper bound on remembered keys
pub const DEFAULT_IDEMPOTENCY_CAPACITY: usize = 10_000;

struct CacheEntry {
    cell: Arc<OnceCell<Order>>,
    inserted: Instant,
    seq: u64,
}

/// Per-key order cells, bounded by capacity and age.
///
/// A key whose creation failed is dropped so it can be retried. When full,
/// expired entries go first, then the oldest settled one.
pub struct IdempotencyCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
    next_seq: AtomicU64,
    capacity: usize,
    ttl: Duration,
}

impl Default for IdempotencyCache {
    fn default() -> Self {
        Self::with_limits(DEFAULT_IDEMPOTENCY_CAPACITY, DEFAULT_IDEMPOTENCY_TTL)
    }
}

impl IdempotencyCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(capacity: usize, ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            next_seq: AtomicU64::new(0),
            capacity: capacity.max(1),
            ttl,
        }
    }

    fn cell(&self, key: &str) -> Arc<OnceCell<Order>> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(entry) = entries.get(key) {
            if !entry.cell.initialized() || entry.inserted.elapsed() < self.ttl {
                return entry.cell.clone();
            }
        }

        if entries.len() >= self.capacity {
            self.evict(&mut entries);
        }

        let cell = Arc::new(OnceCell::new());
        entries.insert(
            key.to_string(),
            CacheEntry {
                cell: cell.clone(),
                inserted: Instant::now(),
                seq: self.next_seq.fetch_add(1, Ordering::Relaxed),
            },
        );
        cell
    }

    fn evict(&self, entries: &mut HashMap<String, CacheEntry>) {
        let ttl = self.ttl;
        entries.retain(|_, entry| !entry.cell.initialized() || entry.inserted.elapsed() < ttl);

        while entries.len() >= self.capacity {
            let oldest = entries
                .iter()
                .filter(|(_, entry)| entry.cell.initialized())
                .min_by_key(|(_, entry)| entry.seq)
                .map(|(key, _)| key.clone());
            let Some(oldest) = oldest else {
                // Only in-flight creations left
                break;
            };
            tracing::debug!(idempotency_key = %oldest, "Evicting idempotency key");
            entries.remove(&oldest);
        }
    }

    /// Drop `key` after a failed creation, unless another request is still using its cell
    fn release(&self, key: &str, cell: &Arc<OnceCell<Order>>) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let unused = entries.get(key).is_some_and(|entry| {
            Arc::ptr_eq(&entry.cell, cell)
                && !cell.initialized()
                && Arc::strong_count(cell) <= 2
        });
        if unused {
            entries.remove(key);
        }
    }

    /// Order previously created under `key`, if any
    pub fn get(&self, key: &str) -> Option<Order> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries
            .get(key)
            .filter(|entry| entry.inserted.elapsed() < self.ttl)
            .and_then(|entry| entry.cell.get().cloned())
    }

    /// Number of remembered keys, including in-flight ones
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Order service over an order-based gateway
pub struct OrderService<G> {
    gateway: G,
    idempotency: IdempotencyCache,
}

impl<G: OrderGateway> OrderService<G> {
    pub fn new(gateway: G) -> Self {
        Self {
            gateway,
            idempotency: IdempotencyCache::new(),
        }
    }

    /// Use a cache with custom limits
    #[must_use]
    pub fn with_idempotency_cache(mut self, cache: IdempotencyCache) -> Self {
        self.idempotency = cache;
        self
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    pub fn idempotency_cache(&self) -> &IdempotencyCache {
        &self.idempotency
    }

    /// Create an order.
    ///
    /// Requests carrying the same idempotency key resolve to the same order and
    /// reach the gateway once, also when they arrive concurrently.
    pub async fn create_order(&self, request: CreateOrderRequest) -> Result<Order> {
        let validated = request.validate()?;

        let Some(key) = validated.idempotency_key.clone() else {
            return self.submit(&validated).await;
        };

        let cell = self.idempotency.cell(&key);
        let order = match cell.get_or_try_init(|| self.submit(&validated)).await {
            Ok(order) => order,
            Err(e) => {
                self.idempotency.release(&key, &cell);
                return Err(e);
            }
        };

        if order.amount != validated.amount
            || order.currency != validated.currency
            || order.notes.plan != validated.plan_name
        {
            tracing::warn!(idempotency_key = %key, order_id = %order.id, "Idempotency key reused with different order details");
            return Err(PaymentError::validation(
                "idempotencyKey was already used for a different order",
            ));
        }

        Ok(order.clone())
    }

    async fn submit(&self, validated: &ValidatedOrder) -> Result<Order> {
        let now = Utc::now();
        let receipt = match &validated.idempotency_key {
            Some(key) => format!("receipt_{key}"),
            None => format!("receipt_{}", now.timestamp_millis()),
        };

        let new_order = NewOrder {
            amount: validated.amount,
            currency: validated.currency.clone(),
            receipt,
            notes: OrderNotes {
                plan: validated.plan_name.clone(),
                created_at: now.to_rfc3339(),
                idempotency_key: validated.idempotency_key.clone(),
            },
        };

        let order = self.gateway.create_order(new_order).await.inspect_err(|e| {
            tracing::error!(error = %e, plan = %validated.plan_name, "Order creation failed");
        })?;

        tracing::info!(
            order_id = %order.id,
            amount = order.amount,
            currency = %order.currency,
            receipt = %order.receipt,
            "Created order"
        );

        Ok(order)
    }

    /// Resolve a payment by id. Not-found is a gateway error carrying the upstream status.
    pub async fn get_payment(&self, payment_id: &str) -> Result<Payment> {
        let payment_id = payment_id.trim();
        if payment_id.is_empty() || payment_id == PAYMENT_PATH_PLACEHOLDER {
            return Err(PaymentError::validation("Payment ID is required"));
        }

        self.gateway.fetch_payment(payment_id).await
    }
}
