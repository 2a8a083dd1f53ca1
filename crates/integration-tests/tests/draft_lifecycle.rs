//! Integration tests for draft orders from first edit to submission.

use std::num::NonZeroU32;

use backoffice_admin::api::ApiError;
use backoffice_admin::drafts::{
    AddressRef, CustomerRef, DraftError, DraftRequirement, DraftUpdate, LineItem,
};
use backoffice_admin::orders::detail_key;
use backoffice_admin::{AppError, AppState};
use backoffice_core::{
    AddressId, CustomerId, Money, OrderChannel, OrderStatus, PaymentMethod, PaymentStatus,
    VariantId,
};
use backoffice_integration_tests::{FakeBackend, test_config};

fn state() -> AppState<FakeBackend> {
    AppState::with_backend(test_config(), FakeBackend::new())
}

fn shirts(quantity: u32) -> LineItem {
    LineItem {
        variant_id: VariantId::new(11),
        name: "Linen shirt / M".to_string(),
        quantity: NonZeroU32::new(quantity).unwrap(),
        unit_price: Money::from(100_000),
    }
}

fn delivery_update() -> DraftUpdate {
    DraftUpdate {
        channel: Some(OrderChannel::Online),
        customer: Some(Some(CustomerRef {
            id: CustomerId::new(3),
            name: "Nguyen Van A".to_string(),
            phone: Some("0901234567".to_string()),
        })),
        delivery_address: Some(Some(AddressRef {
            id: AddressId::new(8),
            recipient_name: "Nguyen Van A".to_string(),
            recipient_phone: "0901234567".to_string(),
            summary: "12 Hang Bac, Hoan Kiem".to_string(),
        })),
        delivery: Some(true),
        line_items: Some(vec![shirts(2)]),
        payment_method: Some(Some(PaymentMethod::CashOnDelivery)),
        ..DraftUpdate::default()
    }
}

// =============================================================================
// Submission
// =============================================================================

#[tokio::test]
async fn test_delivery_order_with_voucher_is_submitted() {
    let state = state();
    state
        .orders()
        .backend()
        .add_voucher("SALE20K", Money::from(20_000));

    let mut drafts = state.drafts().await;
    let id = drafts.create_draft().unwrap().id;
    drafts.update_active_draft(delivery_update());

    let applied = drafts
        .apply_voucher("SALE20K", state.orders())
        .await
        .unwrap();
    assert_eq!(applied, Some(Money::from(20_000)));

    let totals = drafts.draft(id).unwrap().totals;
    assert_eq!(totals.subtotal, Money::from(200_000));
    assert_eq!(totals.discount_total, Money::from(20_000));
    assert_eq!(totals.shipping_fee, Money::from(30_000));
    assert_eq!(totals.grand_total, Money::from(210_000));
    assert!(drafts.review_draft(id).unwrap().is_clean());

    let order = drafts
        .submit_draft(id, state.orders())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(order.grand_total, Money::from(210_000));
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.payment_status, PaymentStatus::Unpaid);
    assert!(drafts.draft(id).is_none());
    assert!(drafts.active_id().is_none());

    let request = &state.orders().backend().created_requests()[0];
    assert_eq!(request.voucher_codes, vec!["SALE20K".to_string()]);
    assert_eq!(request.delivery_address_id, Some(AddressId::new(8)));
    assert_eq!(request.recipient_phone.as_deref(), Some("0901234567"));

    // The new order is cached, so reading it back does not hit the backend
    assert!(state.cache().contains(detail_key(order.id).as_str()));
    drop(drafts);
    state.orders().get_order(order.id).await.unwrap();
    assert_eq!(state.orders().backend().get_calls(), 0);
}

#[tokio::test]
async fn test_counter_sale_is_completed_and_paid() {
    let state = state();
    let mut drafts = state.drafts().await;
    drafts.create_draft().unwrap();
    drafts.update_active_draft(DraftUpdate {
        line_items: Some(vec![shirts(1)]),
        payment_method: Some(Some(PaymentMethod::Cash)),
        ..DraftUpdate::default()
    });
    drop(drafts);

    let order = state.submit_active_draft().await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Completed);
    assert_eq!(order.payment_status, PaymentStatus::Paid);
    assert_eq!(order.shipping_fee, Money::ZERO);
    assert!(state.drafts().await.is_empty());
}

#[tokio::test]
async fn test_failed_submission_keeps_draft_unchanged() {
    let state = state();
    let mut drafts = state.drafts().await;
    let id = drafts.create_draft().unwrap().id;
    drafts.update_active_draft(delivery_update());
    let before = drafts.draft(id).unwrap().clone();

    state
        .orders()
        .backend()
        .fail_next(ApiError::Timeout("30s".to_string()));
    let result = drafts.submit_draft(id, state.orders()).await;

    assert_eq!(
        result,
        Err(DraftError::Api(ApiError::Timeout("30s".to_string())))
    );
    assert_eq!(drafts.draft(id), Some(&before));
    assert_eq!(drafts.active_id(), Some(id));

    // Retrying succeeds once the backend recovers
    let order = drafts.submit_draft(id, state.orders()).await.unwrap();
    assert!(order.is_some());
    assert!(drafts.is_empty());
}

#[tokio::test]
async fn test_incomplete_draft_is_not_sent() {
    let state = state();
    let mut drafts = state.drafts().await;
    let id = drafts.create_draft().unwrap().id;

    let result = drafts.submit_draft(id, state.orders()).await;
    assert_eq!(
        result,
        Err(DraftError::Validation(vec![
            DraftRequirement::LineItems,
            DraftRequirement::PaymentMethod,
        ]))
    );
    assert_eq!(state.orders().backend().create_calls(), 0);
    assert_eq!(drafts.len(), 1);
}

#[tokio::test]
async fn test_submit_without_active_draft_reports_nothing() {
    let state = state();
    assert_eq!(state.submit_active_draft().await.unwrap(), None);
}

#[tokio::test]
async fn test_app_state_surfaces_draft_errors() {
    let state = state();
    state.drafts().await.create_draft().unwrap();

    let err = state.submit_active_draft().await.unwrap_err();
    assert!(matches!(err, AppError::Draft(DraftError::Validation(_))));
    assert!(!err.is_server_side());
}

// =============================================================================
// Vouchers
// =============================================================================

#[tokio::test]
async fn test_rejected_voucher_leaves_draft_unchanged() {
    let state = state();
    let mut drafts = state.drafts().await;
    let id = drafts.create_draft().unwrap().id;
    drafts.update_active_draft(DraftUpdate {
        line_items: Some(vec![shirts(1)]),
        ..DraftUpdate::default()
    });

    let result = drafts.apply_voucher("NOPE", state.orders()).await;
    assert_eq!(
        result,
        Err(DraftError::VoucherRejected(
            "voucher NOPE does not exist".to_string()
        ))
    );
    assert!(drafts.draft(id).unwrap().discounts.is_empty());
    assert_eq!(
        drafts.draft(id).unwrap().totals.grand_total,
        Money::from(100_000)
    );
}

#[tokio::test]
async fn test_voucher_applied_once() {
    let state = state();
    state
        .orders()
        .backend()
        .add_voucher("TET2026", Money::from(15_000));

    let mut drafts = state.drafts().await;
    drafts.create_draft().unwrap();
    drafts.update_active_draft(DraftUpdate {
        line_items: Some(vec![shirts(1)]),
        ..DraftUpdate::default()
    });

    assert!(
        drafts
            .apply_voucher("TET2026", state.orders())
            .await
            .unwrap()
            .is_some()
    );
    assert_eq!(
        drafts.apply_voucher(" TET2026 ", state.orders()).await,
        Ok(None)
    );
    assert_eq!(state.orders().backend().voucher_calls(), 1);
    assert_eq!(
        drafts.active_draft().unwrap().totals.grand_total,
        Money::from(85_000)
    );

    assert!(drafts.remove_voucher("TET2026"));
    assert_eq!(
        drafts.active_draft().unwrap().totals.grand_total,
        Money::from(100_000)
    );
}

// =============================================================================
// Tabs
// =============================================================================

#[tokio::test]
async fn test_tabs_are_independent() {
    let state = state();
    let mut drafts = state.drafts().await;
    let first = drafts.create_draft().unwrap().id;
    let second = drafts.create_draft().unwrap().id;

    drafts.update_active_draft(DraftUpdate {
        line_items: Some(vec![shirts(3)]),
        ..DraftUpdate::default()
    });
    drafts.switch_active(first);
    drafts.update_active_draft(DraftUpdate {
        line_items: Some(vec![shirts(1)]),
        ..DraftUpdate::default()
    });

    assert_eq!(
        drafts.draft(first).unwrap().totals.subtotal,
        Money::from(100_000)
    );
    assert_eq!(
        drafts.draft(second).unwrap().totals.subtotal,
        Money::from(300_000)
    );
    assert_ne!(
        drafts.draft(first).unwrap().code,
        drafts.draft(second).unwrap().code
    );
}

#[tokio::test]
async fn test_capacity_from_config() {
    let state = state();
    let mut drafts = state.drafts().await;
    for _ in 0..10 {
        drafts.create_draft().unwrap();
    }
    assert_eq!(
        drafts.create_draft().unwrap_err(),
        DraftError::CapacityExceeded { max: 10 }
    );
    assert_eq!(drafts.len(), 10);
}
