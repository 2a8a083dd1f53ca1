//! Integration test support for the back-office order desk.
//!
//! [`FakeBackend`] is an in-memory [`OrderBackend`] with per-operation call
//! counters, one-shot failure injection and a gate that holds read requests
//! in flight until released.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use backoffice_admin::api::{
    ApiError, ApiResult, AuditEntry, CancelRequest, CreateOrderRequest, Order, OrderBackend,
    OrderLine, OrderListQuery, OrderPage, PaymentConfirmation, PaymentStatusUpdate,
    RefundRequest, StatusUpdate, VoucherValidation,
};
use backoffice_admin::config::AdminConfig;
use backoffice_core::{CustomerId, Money, OrderChannel, OrderId, OrderStatus, PaymentStatus};
use chrono::Utc;
use serde_json::json;
use tokio::sync::Notify;

/// Configuration for tests: local backend URL, no random cache sweeps.
///
/// # Panics
///
/// Panics if the built-in variables fail to load.
#[must_use]
#[allow(clippy::expect_used)]
pub fn test_config() -> AdminConfig {
    let vars = HashMap::from([
        (
            "BACKOFFICE_API_URL".to_string(),
            "http://localhost:8080/api/v1".to_string(),
        ),
        ("CACHE_SWEEP_PROBABILITY".to_string(), "0.0".to_string()),
    ]);
    AdminConfig::from_vars(&vars).expect("test config should load")
}

/// A pending, unpaid order with the given id, no lines and a 100000 total.
#[must_use]
pub fn sample_order(id: i64) -> Order {
    Order {
        id: OrderId::new(id),
        code: format!("HD000000{id:03}"),
        channel: OrderChannel::InStore,
        customer_id: None,
        lines: Vec::new(),
        voucher_codes: Vec::new(),
        payment_method: None,
        subtotal: Money::from(100_000),
        discount_total: Money::ZERO,
        shipping_fee: Money::ZERO,
        grand_total: Money::from(100_000),
        status: OrderStatus::Pending,
        payment_status: PaymentStatus::Unpaid,
        created_at: Utc::now(),
    }
}

#[derive(Default)]
struct Calls {
    list: AtomicUsize,
    get: AtomicUsize,
    create: AtomicUsize,
    update: AtomicUsize,
    voucher: AtomicUsize,
    audit: AtomicUsize,
}

/// In-memory backend.
#[derive(Default)]
pub struct FakeBackend {
    orders: Mutex<BTreeMap<OrderId, Order>>,
    vouchers: Mutex<HashMap<String, Money>>,
    created: Mutex<Vec<CreateOrderRequest>>,
    audit_log: Mutex<Vec<AuditEntry>>,
    next_id: AtomicI64,
    failure: Mutex<Option<ApiError>>,
    calls: Calls,
    gated: AtomicBool,
    gate: Notify,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl FakeBackend {
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_id: AtomicI64::new(1000),
            ..Self::default()
        }
    }

    /// Backend pre-populated with orders.
    #[must_use]
    pub fn with_orders(orders: impl IntoIterator<Item = Order>) -> Self {
        let backend = Self::new();
        lock(&backend.orders).extend(orders.into_iter().map(|o| (o.id, o)));
        backend
    }

    /// Accept a voucher code worth `amount`.
    pub fn add_voucher(&self, code: &str, amount: Money) {
        lock(&self.vouchers).insert(code.to_string(), amount);
    }

    /// Fail the next call of any kind with `error`.
    pub fn fail_next(&self, error: ApiError) {
        *lock(&self.failure) = Some(error);
    }

    /// Hold list, detail and history requests until [`FakeBackend::release`].
    pub fn hold_requests(&self) {
        self.gated.store(true, Ordering::SeqCst);
    }

    /// Let held requests complete.
    pub fn release(&self) {
        self.gated.store(false, Ordering::SeqCst);
        self.gate.notify_one();
    }

    #[must_use]
    pub fn list_calls(&self) -> usize {
        self.calls.list.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn get_calls(&self) -> usize {
        self.calls.get.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn create_calls(&self) -> usize {
        self.calls.create.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn update_calls(&self) -> usize {
        self.calls.update.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn voucher_calls(&self) -> usize {
        self.calls.voucher.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn audit_calls(&self) -> usize {
        self.calls.audit.load(Ordering::SeqCst)
    }

    /// Creation requests received so far.
    #[must_use]
    pub fn created_requests(&self) -> Vec<CreateOrderRequest> {
        lock(&self.created).clone()
    }

    fn take_failure(&self) -> ApiResult<()> {
        lock(&self.failure).take().map_or(Ok(()), Err)
    }

    async fn pass_gate(&self) {
        if self.gated.load(Ordering::SeqCst) {
            self.gate.notified().await;
        }
    }

    /// Apply a write and record it in the audit log with before/after
    /// statuses JSON-encoded, the way the real backend stores them.
    fn modify(
        &self,
        id: OrderId,
        action: &str,
        reason: Option<&str>,
        f: impl FnOnce(&mut Order) -> ApiResult<()>,
    ) -> ApiResult<Order> {
        self.calls.update.fetch_add(1, Ordering::SeqCst);
        self.take_failure()?;
        let mut orders = lock(&self.orders);
        let order = orders
            .get_mut(&id)
            .ok_or_else(|| ApiError::NotFound(format!("order {id}")))?;

        let before = json!({"status": order.status, "payment_status": order.payment_status});
        f(order)?;
        let after = json!({"status": order.status, "payment_status": order.payment_status});

        let mut log = lock(&self.audit_log);
        let entry_id = i64::try_from(log.len()).map_or(i64::MAX, |n| n + 1);
        log.push(AuditEntry {
            id: entry_id,
            order_id: id,
            action: action.to_string(),
            actor: Some("staff".to_string()),
            reason: reason.map(str::to_string),
            changed_at: Utc::now(),
            old_value: Some(before),
            new_value: Some(after),
        });
        Ok(order.clone())
    }
}

impl OrderBackend for FakeBackend {
    async fn list_orders(&self, query: &OrderListQuery) -> ApiResult<OrderPage> {
        self.calls.list.fetch_add(1, Ordering::SeqCst);
        self.pass_gate().await;
        self.take_failure()?;

        let page = query.page.unwrap_or(0);
        let size = query.size.unwrap_or(20);
        let orders = lock(&self.orders);
        let matching: Vec<&Order> = orders
            .values()
            .filter(|o| query.status.is_none_or(|s| o.status == s))
            .filter(|o| query.channel.is_none_or(|c| o.channel == c))
            .collect();

        Ok(OrderPage {
            total_elements: matching.len() as u64,
            content: matching
                .into_iter()
                .skip(page as usize * size as usize)
                .take(size as usize)
                .cloned()
                .collect(),
            page,
            size,
        })
    }

    async fn get_order(&self, id: OrderId) -> ApiResult<Order> {
        self.calls.get.fetch_add(1, Ordering::SeqCst);
        self.pass_gate().await;
        self.take_failure()?;
        lock(&self.orders)
            .get(&id)
            .cloned()
            .ok_or_else(|| ApiError::NotFound(format!("order {id}")))
    }

    async fn create_order(&self, request: &CreateOrderRequest) -> ApiResult<Order> {
        self.calls.create.fetch_add(1, Ordering::SeqCst);
        self.take_failure()?;

        let id = OrderId::new(self.next_id.fetch_add(1, Ordering::SeqCst));
        let order = Order {
            id,
            code: request.code.clone(),
            channel: request.channel,
            customer_id: request.customer_id,
            lines: request
                .lines
                .iter()
                .map(|l| OrderLine {
                    variant_id: l.variant_id,
                    quantity: l.quantity,
                    unit_price: l.unit_price,
                })
                .collect(),
            voucher_codes: request.voucher_codes.clone(),
            payment_method: Some(request.payment_method),
            subtotal: request.subtotal,
            discount_total: request.discount_total,
            shipping_fee: request.shipping_fee,
            grand_total: request.grand_total,
            status: request.status,
            payment_status: request.payment_status,
            created_at: Utc::now(),
        };

        lock(&self.created).push(request.clone());
        lock(&self.orders).insert(id, order.clone());
        Ok(order)
    }

    async fn update_order_status(&self, id: OrderId, update: &StatusUpdate) -> ApiResult<Order> {
        self.modify(id, "UPDATE_STATUS", Some(&update.reason), |o| {
            o.status = update.status;
            Ok(())
        })
    }

    async fn update_payment_status(
        &self,
        id: OrderId,
        update: &PaymentStatusUpdate,
    ) -> ApiResult<Order> {
        self.modify(id, "UPDATE_PAYMENT", update.note.as_deref(), |o| {
            o.payment_status = update.payment_status;
            Ok(())
        })
    }

    async fn cancel_order(&self, id: OrderId, request: &CancelRequest) -> ApiResult<Order> {
        self.modify(id, "CANCEL", Some(&request.reason), |o| {
            if o.status.is_terminal() {
                return Err(ApiError::Rejected {
                    status: 409,
                    message: format!("order {id} is already {}", o.status),
                });
            }
            o.status = OrderStatus::Cancelled;
            Ok(())
        })
    }

    async fn confirm_payment(
        &self,
        id: OrderId,
        confirmation: &PaymentConfirmation,
    ) -> ApiResult<Order> {
        self.modify(id, "CONFIRM_PAYMENT", confirmation.transaction_ref.as_deref(), |o| {
            o.payment_method = Some(confirmation.payment_method);
            o.payment_status = PaymentStatus::Paid;
            Ok(())
        })
    }

    async fn refund_order(&self, id: OrderId, request: &RefundRequest) -> ApiResult<Order> {
        self.modify(id, "REFUND", Some(&request.reason), |o| {
            if request.amount > o.grand_total {
                return Err(ApiError::Rejected {
                    status: 422,
                    message: "refund exceeds order total".to_string(),
                });
            }
            o.payment_status = PaymentStatus::Refunded;
            Ok(())
        })
    }

    async fn order_audit_history(&self, id: OrderId) -> ApiResult<Vec<AuditEntry>> {
        self.calls.audit.fetch_add(1, Ordering::SeqCst);
        self.pass_gate().await;
        self.take_failure()?;
        if !lock(&self.orders).contains_key(&id) {
            return Err(ApiError::NotFound(format!("order {id}")));
        }
        Ok(lock(&self.audit_log)
            .iter()
            .filter(|e| e.order_id == id)
            .cloned()
            .collect())
    }

    async fn validate_voucher(
        &self,
        code: &str,
        _customer_id: Option<CustomerId>,
        _order_total: Money,
    ) -> ApiResult<VoucherValidation> {
        self.calls.voucher.fetch_add(1, Ordering::SeqCst);
        self.take_failure()?;

        Ok(match lock(&self.vouchers).get(code) {
            Some(&amount) => VoucherValidation {
                valid: true,
                discount_amount: amount,
                error: None,
            },
            None => VoucherValidation {
                valid: false,
                discount_amount: Money::ZERO,
                error: Some(format!("voucher {code} does not exist")),
            },
        })
    }
}
