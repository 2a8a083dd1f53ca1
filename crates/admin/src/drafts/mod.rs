//! Draft order manager.
//!
//! Staff can keep several orders open at the counter at once, one per tab.
//! [`DraftManager`] owns those drafts and the single active selection:
//!
//! - Drafts are created on demand, up to a configured maximum
//! - Every edit recomputes totals synchronously
//! - A draft leaves the manager when it is closed or successfully submitted;
//!   a failed submission leaves it untouched so staff can retry
//!
//! Operations on an unknown draft are logged and otherwise ignored.

pub mod model;
pub mod review;
pub mod totals;

pub use model::{
    AddressRef, AppliedDiscount, CustomerRef, DraftOrder, DraftRequirement, DraftUpdate,
    LineItem, OrderTotals,
};
pub use review::{DraftReview, ReviewError};

use backoffice_core::{DraftId, Money, OrderStatus, PaymentMethod, PaymentStatus};
use chrono::Utc;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::api::{ApiError, CreateOrderLine, CreateOrderRequest, Order, OrderBackend};
use crate::config::DraftConfig;
use crate::orders::OrderService;

/// Errors from draft operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DraftError {
    /// The maximum number of open drafts is reached.
    #[error("cannot open more than {max} drafts")]
    CapacityExceeded { max: usize },

    /// The draft is not ready to submit.
    #[error("draft needs {}", join_requirements(.0))]
    Validation(Vec<DraftRequirement>),

    /// The backend refused a voucher code.
    #[error("voucher rejected: {0}")]
    VoucherRejected(String),

    #[error(transparent)]
    Api(#[from] ApiError),
}

fn join_requirements(requirements: &[DraftRequirement]) -> String {
    requirements
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" and ")
}

/// Owns open drafts and the active selection.
#[derive(Debug)]
pub struct DraftManager {
    drafts: Vec<DraftOrder>,
    active: Option<DraftId>,
    /// Sequence number for the next draft code.
    next_seq: u32,
    config: DraftConfig,
}

impl DraftManager {
    #[must_use]
    pub const fn new(config: DraftConfig) -> Self {
        Self {
            drafts: Vec::new(),
            active: None,
            next_seq: 1,
            config,
        }
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Open drafts in creation order.
    #[must_use]
    pub fn drafts(&self) -> &[DraftOrder] {
        &self.drafts
    }

    #[must_use]
    pub fn draft(&self, id: DraftId) -> Option<&DraftOrder> {
        self.drafts.iter().find(|d| d.id == id)
    }

    #[must_use]
    pub const fn active_id(&self) -> Option<DraftId> {
        self.active
    }

    #[must_use]
    pub fn active_draft(&self) -> Option<&DraftOrder> {
        self.active.and_then(|id| self.draft(id))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.drafts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.drafts.is_empty()
    }

    #[must_use]
    pub fn can_create_draft(&self) -> bool {
        self.drafts.len() < self.config.max_open
    }

    fn position(&self, id: DraftId) -> Option<usize> {
        self.drafts.iter().position(|d| d.id == id)
    }

    fn draft_mut(&mut self, id: DraftId) -> Option<&mut DraftOrder> {
        self.drafts.iter_mut().find(|d| d.id == id)
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Open a new empty draft and make it active.
    ///
    /// # Errors
    ///
    /// Returns `DraftError::CapacityExceeded` when the maximum number of
    /// drafts is already open; nothing changes in that case.
    pub fn create_draft(&mut self) -> Result<&DraftOrder, DraftError> {
        if !self.can_create_draft() {
            return Err(DraftError::CapacityExceeded {
                max: self.config.max_open,
            });
        }

        let now = Utc::now();
        let code = format!(
            "{}{:06}{:03}",
            self.config.code_prefix,
            now.timestamp_millis().rem_euclid(1_000_000),
            self.next_seq
        );
        self.next_seq += 1;

        let draft = DraftOrder::new(code, now);
        let id = draft.id;
        info!(draft_id = %id, code = %draft.code, "Draft opened");

        self.drafts.push(draft);
        self.active = Some(id);
        // Always `Some` after the push
        self.drafts.last().ok_or(DraftError::CapacityExceeded {
            max: self.config.max_open,
        })
    }

    /// Close a draft without submitting it.
    ///
    /// When the closed draft was active, the draft before it becomes active
    /// (or the new first draft, or nothing when none remain).
    pub fn close_draft(&mut self, id: DraftId) {
        let Some(index) = self.position(id) else {
            warn!(draft_id = %id, "Close requested for unknown draft");
            return;
        };
        self.remove_at(index);
        info!(draft_id = %id, "Draft closed");
    }

    fn remove_at(&mut self, index: usize) -> DraftOrder {
        let removed = self.drafts.remove(index);
        if self.active == Some(removed.id) {
            self.active = self
                .drafts
                .get(index.saturating_sub(1))
                .map(|d| d.id);
        }
        removed
    }

    /// Make a draft the active one.
    pub fn switch_active(&mut self, id: DraftId) {
        if self.position(id).is_some() {
            self.active = Some(id);
        } else {
            warn!(draft_id = %id, "Switch requested to unknown draft");
        }
    }

    // =========================================================================
    // Editing
    // =========================================================================

    /// Merge a partial edit into the active draft and recompute its totals.
    pub fn update_active_draft(&mut self, update: DraftUpdate) {
        let shipping_fee = self.config.shipping_fee;
        let Some(draft) = self.active.and_then(|id| self.draft_mut(id)) else {
            warn!("Update requested with no active draft");
            return;
        };

        if update.apply(draft) {
            draft.dirty = true;
        }
        refresh_totals(draft, shipping_fee);
    }

    /// Recompute a draft's totals from its current contents.
    pub fn recompute_totals(&mut self, id: DraftId) -> Option<OrderTotals> {
        let shipping_fee = self.config.shipping_fee;
        let Some(draft) = self.draft_mut(id) else {
            warn!(draft_id = %id, "Totals requested for unknown draft");
            return None;
        };
        refresh_totals(draft, shipping_fee);
        Some(draft.totals)
    }

    /// Advisory review of a draft.
    #[must_use]
    pub fn review_draft(&self, id: DraftId) -> Option<DraftReview> {
        self.draft(id).map(review::review)
    }

    // =========================================================================
    // Vouchers
    // =========================================================================

    /// Validate a voucher for the active draft and apply it.
    ///
    /// Returns the amount taken off, or `None` when there is no active draft
    /// or the code is already applied.
    ///
    /// # Errors
    ///
    /// Returns `DraftError::VoucherRejected` when the backend says the code
    /// is not valid, or `DraftError::Api` when validation could not be done.
    /// The draft is unchanged in both cases.
    #[instrument(skip(self, orders))]
    pub async fn apply_voucher<B: OrderBackend>(
        &mut self,
        code: &str,
        orders: &OrderService<B>,
    ) -> Result<Option<Money>, DraftError> {
        let code = code.trim();
        if code.is_empty() {
            return Err(DraftError::VoucherRejected("empty voucher code".to_string()));
        }

        let Some(draft) = self.active_draft() else {
            warn!("Voucher applied with no active draft");
            return Ok(None);
        };
        if draft.has_voucher(code) {
            debug!("Voucher already applied");
            return Ok(None);
        }

        let id = draft.id;
        let customer_id = draft.customer.as_ref().map(|c| c.id);
        let subtotal = draft.totals.subtotal;

        let validation = orders
            .validate_voucher(code, customer_id, subtotal)
            .await?;
        if !validation.valid {
            let reason = validation
                .error
                .unwrap_or_else(|| "voucher is not valid".to_string());
            return Err(DraftError::VoucherRejected(reason));
        }

        let shipping_fee = self.config.shipping_fee;
        let Some(draft) = self.draft_mut(id) else {
            return Ok(None);
        };
        draft.discounts.push(AppliedDiscount {
            code: code.to_string(),
            amount: validation.discount_amount,
        });
        draft.dirty = true;
        refresh_totals(draft, shipping_fee);

        info!(draft_id = %id, amount = %validation.discount_amount, "Voucher applied");
        Ok(Some(validation.discount_amount))
    }

    /// Remove an applied voucher from the active draft.
    ///
    /// Returns whether the voucher was applied.
    pub fn remove_voucher(&mut self, code: &str) -> bool {
        let shipping_fee = self.config.shipping_fee;
        let Some(draft) = self.active.and_then(|id| self.draft_mut(id)) else {
            warn!("Voucher removal with no active draft");
            return false;
        };

        let before = draft.discounts.len();
        draft.discounts.retain(|d| d.code != code);
        if draft.discounts.len() == before {
            return false;
        }
        draft.dirty = true;
        refresh_totals(draft, shipping_fee);
        true
    }

    // =========================================================================
    // Submission
    // =========================================================================

    /// Submit a draft to the backend as a new order.
    ///
    /// On success the draft is removed and the confirmed order returned.
    /// Returns `Ok(None)` for an unknown draft.
    ///
    /// # Errors
    ///
    /// Returns `DraftError::Validation` listing what is missing, or
    /// `DraftError::Api` when the backend refuses the order or cannot be
    /// reached. The draft is kept unchanged on any error.
    #[instrument(skip(self, orders), fields(draft_id = %id))]
    pub async fn submit_draft<B: OrderBackend>(
        &mut self,
        id: DraftId,
        orders: &OrderService<B>,
    ) -> Result<Option<Order>, DraftError> {
        let Some(draft) = self.draft(id) else {
            warn!("Submit requested for unknown draft");
            return Ok(None);
        };

        let request = creation_request(draft).map_err(DraftError::Validation)?;
        let order = match orders.create_order(&request).await {
            Ok(order) => order,
            Err(e) => {
                warn!(error = %e, "Draft submission failed, keeping draft");
                return Err(e.into());
            }
        };

        if let Some(index) = self.position(id) {
            self.remove_at(index);
        }
        info!(order_id = %order.id, code = %order.code, "Draft submitted");
        Ok(Some(order))
    }

    /// Submit the active draft.
    ///
    /// # Errors
    ///
    /// Same as [`DraftManager::submit_draft`].
    pub async fn submit_active_draft<B: OrderBackend>(
        &mut self,
        orders: &OrderService<B>,
    ) -> Result<Option<Order>, DraftError> {
        let Some(id) = self.active else {
            warn!("Submit requested with no active draft");
            return Ok(None);
        };
        self.submit_draft(id, orders).await
    }
}

fn refresh_totals(draft: &mut DraftOrder, shipping_fee: Money) {
    draft.totals = totals::compute(
        &draft.line_items,
        &draft.discounts,
        draft.delivery,
        shipping_fee,
    );
}

/// Build the creation request, or list what the draft is missing.
fn creation_request(draft: &DraftOrder) -> Result<CreateOrderRequest, Vec<DraftRequirement>> {
    let mut missing = Vec::new();
    if draft.line_items.is_empty() {
        missing.push(DraftRequirement::LineItems);
    }
    let Some(payment_method) = draft.payment_method else {
        missing.push(DraftRequirement::PaymentMethod);
        return Err(missing);
    };
    if !missing.is_empty() {
        return Err(missing);
    }

    // Counter sales are handed over on the spot
    let status = if draft.delivery {
        OrderStatus::Pending
    } else {
        OrderStatus::Completed
    };
    let payment_status = if payment_method == PaymentMethod::Cash {
        PaymentStatus::Paid
    } else {
        PaymentStatus::Unpaid
    };
    let address = draft.delivery_address.as_ref().filter(|_| draft.delivery);

    Ok(CreateOrderRequest {
        code: draft.code.clone(),
        channel: draft.channel,
        customer_id: draft.customer.as_ref().map(|c| c.id),
        delivery_address_id: address.map(|a| a.id),
        recipient_name: address.map(|a| a.recipient_name.clone()),
        recipient_phone: address.map(|a| a.recipient_phone.clone()),
        lines: draft
            .line_items
            .iter()
            .map(|item| CreateOrderLine {
                variant_id: item.variant_id,
                quantity: item.quantity.get(),
                unit_price: item.unit_price,
            })
            .collect(),
        voucher_codes: draft.discounts.iter().map(|d| d.code.clone()).collect(),
        payment_method,
        note: draft.note.clone(),
        subtotal: draft.totals.subtotal,
        discount_total: draft.totals.discount_total,
        shipping_fee: draft.totals.shipping_fee,
        grand_total: draft.totals.grand_total,
        status,
        payment_status,
    })
}
