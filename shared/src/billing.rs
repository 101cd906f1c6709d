use crate::accounts::{load_account, load_account_item, save_account};
use crate::activity::record_activity;
use crate::auth::AuthorizationContext;
use crate::errors::ApiError;
use crate::request::{parse_body, required};
use crate::store::{decode_items, id_key};
use crate::team::require_manager;
use crate::types::{CheckoutRequest, Plan, RedirectUrl, SubscriptionSummary};
use crate::AppState;

/// GET /billing/plans
///
/// Active plans, cheapest first.
pub async fn list_plans(state: &AppState) -> Result<Vec<Plan>, ApiError> {
    let items = state.store.scan(&state.config.plans_table).await?;
    let mut plans: Vec<Plan> = decode_items(&items, Plan::from_item)
        .into_iter()
        .filter(|p| p.active)
        .collect();
    plans.sort_by(|a, b| {
        a.price_monthly
            .cmp(&b.price_monthly)
            .then_with(|| a.name.cmp(&b.name))
    });
    Ok(plans)
}

async fn load_plan(state: &AppState, plan_id: &str) -> Result<Plan, ApiError> {
    let item = state
        .store
        .get_item(&state.config.plans_table, id_key(plan_id))
        .await
        .map_err(|e| e.or_missing("Plan"))?;
    Ok(Plan::from_item(&item)?)
}

/// GET /billing/subscription
pub async fn get_subscription(
    state: &AppState,
    ctx: &AuthorizationContext,
) -> Result<SubscriptionSummary, ApiError> {
    let account = load_account(state, ctx).await?;

    let Some(subscription_id) = account.stripe_subscription_id.as_deref() else {
        return Ok(SubscriptionSummary {
            plan_id: account.plan_id,
            status: "none".to_string(),
            current_period_end: None,
            cancel_at_period_end: false,
        });
    };

    let live = state.payments.get_subscription(subscription_id).await?;
    Ok(SubscriptionSummary {
        plan_id: account.plan_id,
        status: live.status,
        current_period_end: live.current_period_end,
        cancel_at_period_end: live.cancel_at_period_end,
    })
}

/// POST /billing/checkout
pub async fn create_checkout(
    state: &AppState,
    ctx: &AuthorizationContext,
    body: &[u8],
) -> Result<RedirectUrl, ApiError> {
    let req: CheckoutRequest = parse_body(body)?;
    let plan_id = required(req.plan_id, "planId")?;

    let caller = require_manager(state, ctx).await?;
    let plan = load_plan(state, &plan_id).await?;
    let price_id = match (&plan.stripe_price_id, plan.active) {
        (Some(price), true) => price.clone(),
        _ => return Err(ApiError::not_found("Plan not found")),
    };

    let (mut account, stored) = load_account_item(state, ctx).await?;
    let customer_id = match account.stripe_customer_id.clone() {
        Some(id) => id,
        None => {
            let email = account.billing_email.clone().unwrap_or(caller.email);
            let id = state
                .payments
                .create_customer(&email, &account.id)
                .await?;
            account.stripe_customer_id = Some(id.clone());
            save_account(state, stored, &account).await?;
            tracing::info!(account_id = %ctx.account_id, "Created payments customer");
            id
        }
    };

    let base = state.config.frontend_url.trim_end_matches('/');
    let url = state
        .payments
        .create_checkout_session(
            &customer_id,
            &price_id,
            &account.id,
            &format!("{}/billing?checkout=success", base),
            &format!("{}/billing?checkout=cancelled", base),
        )
        .await?;

    Ok(RedirectUrl { url })
}

/// POST /billing/portal
pub async fn create_portal_session(
    state: &AppState,
    ctx: &AuthorizationContext,
) -> Result<RedirectUrl, ApiError> {
    require_manager(state, ctx).await?;
    let account = load_account(state, ctx).await?;
    let customer_id = account
        .stripe_customer_id
        .ok_or_else(|| ApiError::validation("No billing account exists yet"))?;

    let return_url = format!("{}/billing", state.config.frontend_url.trim_end_matches('/'));
    let url = state
        .payments
        .create_portal_session(&customer_id, &return_url)
        .await?;
    Ok(RedirectUrl { url })
}

/// DELETE /billing/subscription
pub async fn cancel_subscription(
    state: &AppState,
    ctx: &AuthorizationContext,
) -> Result<SubscriptionSummary, ApiError> {
    require_manager(state, ctx).await?;
    let account = load_account(state, ctx).await?;
    let subscription_id = account
        .stripe_subscription_id
        .as_deref()
        .ok_or_else(|| ApiError::validation("No active subscription"))?;

    let cancelled = state.payments.cancel_subscription(subscription_id).await?;
    tracing::info!(account_id = %ctx.account_id, "Subscription set to cancel");
    record_activity(
        state,
        ctx,
        "subscription.cancelled",
        "Cancelled subscription at period end",
        Some(ctx.account_key().as_str()),
    )
    .await;

    Ok(SubscriptionSummary {
        plan_id: account.plan_id,
        status: cancelled.status,
        current_period_end: cancelled.current_period_end,
        cancel_at_period_end: cancelled.cancel_at_period_end,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logos::MockLogoStorage;
    use crate::payments::MockPaymentsProvider;
    use crate::store::{str_attr, Item, ItemBuilder, MockKeyValueStore};
    use crate::team::tests::{store_with_users, user_item};
    use crate::testing;
    use crate::types::Subscription;

    fn plan_item(id: &str, name: &str, price: i64, active: bool) -> Item {
        ItemBuilder::new()
            .s("id", id)
            .s("name", name)
            .n("priceMonthly", price)
            .b("active", active)
            .s("stripePriceId", format!("price_{}", id))
            .build()
    }

    fn account(customer: Option<&str>, subscription: Option<&str>) -> Item {
        ItemBuilder::new()
            .s("id", "account:a1")
            .s("name", "Acme")
            .s("ownerId", "user:owner")
            .s("planId", "pro")
            .opt_s("stripeCustomerId", customer)
            .opt_s("stripeSubscriptionId", subscription)
            .s("createdAt", "2024-01-01T00:00:00Z")
            .build()
    }

    fn store_with_account(item: Item) -> MockKeyValueStore {
        let mut store = store_with_users(vec![
            user_item("owner", "a1", "owner", "owner@acme.io"),
            user_item("member", "a1", "member", "member@acme.io"),
        ]);
        store
            .expect_get_item()
            .withf(|table, _| table == "cloudkeep-accounts")
            .returning(move |_, _| Ok(item.clone()));
        store
    }

    fn ctx(user: &str) -> AuthorizationContext {
        AuthorizationContext::new(&format!("user:{}", user), "account:a1")
    }

    #[tokio::test]
    async fn test_list_plans_active_and_sorted() {
        let mut store = MockKeyValueStore::new();
        store
            .expect_scan()
            .withf(|table| table == "cloudkeep-plans")
            .returning(|_| {
                Ok(vec![
                    plan_item("business", "Business", 4900, true),
                    plan_item("legacy", "Legacy", 500, false),
                    plan_item("starter", "Starter", 900, true),
                    plan_item("basic", "Basic", 900, true),
                ])
            });
        let state = testing::state(store);

        let plans = list_plans(&state).await.unwrap();
        let ids: Vec<_> = plans.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["basic", "starter", "business"]);
        let body = serde_json::to_value(&plans[0]).unwrap();
        assert!(body.get("stripePriceId").is_none());
    }

    #[tokio::test]
    async fn test_subscription_without_stripe_is_none() {
        let state = testing::state(store_with_account(account(None, None)));
        let summary = get_subscription(&state, &ctx("member")).await.unwrap();
        assert_eq!(summary.status, "none");
        assert_eq!(summary.plan_id.as_deref(), Some("pro"));
    }

    #[tokio::test]
    async fn test_subscription_reads_live_status() {
        let mut payments = MockPaymentsProvider::new();
        payments
            .expect_get_subscription()
            .withf(|id| id == "sub_1")
            .returning(|id| {
                Ok(Subscription {
                    id: id.to_string(),
                    status: "active".to_string(),
                    current_period_end: Some(1_700_000_000),
                    cancel_at_period_end: false,
                })
            });
        let state = testing::state_with(
            store_with_account(account(Some("cus_1"), Some("sub_1"))),
            payments,
            MockLogoStorage::new(),
        );

        let summary = get_subscription(&state, &ctx("member")).await.unwrap();
        assert_eq!(summary.status, "active");
        assert_eq!(summary.current_period_end, Some(1_700_000_000));
    }

    #[tokio::test]
    async fn test_checkout_creates_customer_once() {
        let mut store = store_with_account(account(None, None));
        store
            .expect_get_item()
            .withf(|table, key| {
                table == "cloudkeep-plans" && str_attr(key, "id").as_deref() == Some("pro")
            })
            .returning(|_, _| Ok(plan_item("pro", "Pro", 1900, true)));
        store
            .expect_put_item()
            .withf(|table, item| {
                table == "cloudkeep-accounts"
                    && str_attr(item, "stripeCustomerId").as_deref() == Some("cus_new")
            })
            .times(1)
            .returning(|_, _| Ok(()));

        let mut payments = MockPaymentsProvider::new();
        payments
            .expect_create_customer()
            .withf(|email, account| email == "owner@acme.io" && account == "a1")
            .times(1)
            .returning(|_, _| Ok("cus_new".to_string()));
        payments
            .expect_create_checkout_session()
            .withf(|customer, price, account, success, _| {
                customer == "cus_new"
                    && price == "price_pro"
                    && account == "a1"
                    && success == "http://localhost:3000/billing?checkout=success"
            })
            .times(1)
            .returning(|_, _, _, _, _| Ok("https://checkout.stripe.com/c/1".to_string()));
        let state = testing::state_with(store, payments, MockLogoStorage::new());

        let redirect = create_checkout(&state, &ctx("owner"), br#"{"planId":"pro"}"#)
            .await
            .unwrap();
        assert_eq!(redirect.url, "https://checkout.stripe.com/c/1");
    }

    #[tokio::test]
    async fn test_checkout_inactive_plan_is_404() {
        let mut store = store_with_account(account(Some("cus_1"), None));
        store
            .expect_get_item()
            .withf(|table, _| table == "cloudkeep-plans")
            .returning(|_, _| Ok(plan_item("legacy", "Legacy", 500, false)));
        let state = testing::state(store);

        let err = create_checkout(&state, &ctx("owner"), br#"{"planId":"legacy"}"#)
            .await
            .unwrap_err();
        assert_eq!(err.status(), 404);
    }

    #[tokio::test]
    async fn test_checkout_member_is_denied() {
        let state = testing::state(store_with_account(account(None, None)));
        let err = create_checkout(&state, &ctx("member"), br#"{"planId":"pro"}"#)
            .await
            .unwrap_err();
        assert_eq!(err.status(), 403);
    }

    #[tokio::test]
    async fn test_portal_needs_customer() {
        let state = testing::state(store_with_account(account(None, None)));
        let err = create_portal_session(&state, &ctx("owner")).await.unwrap_err();
        assert_eq!(err.status(), 400);
    }

    #[tokio::test]
    async fn test_cancel_without_subscription_is_400() {
        let state = testing::state(store_with_account(account(Some("cus_1"), None)));
        let err = cancel_subscription(&state, &ctx("owner")).await.unwrap_err();
        assert_eq!(err.status(), 400);
    }

    #[tokio::test]
    async fn test_cancel_subscription() {
        let mut store = store_with_account(account(Some("cus_1"), Some("sub_1")));
        store
            .expect_put_item()
            .withf(|table, _| table == "cloudkeep-activity")
            .times(1)
            .returning(|_, _| Ok(()));
        let mut payments = MockPaymentsProvider::new();
        payments
            .expect_cancel_subscription()
            .withf(|id| id == "sub_1")
            .times(1)
            .returning(|id| {
                Ok(Subscription {
                    id: id.to_string(),
                    status: "active".to_string(),
                    current_period_end: Some(1_700_000_000),
                    cancel_at_period_end: true,
                })
            });
        let state = testing::state_with(store, payments, MockLogoStorage::new());

        let summary = cancel_subscription(&state, &ctx("owner")).await.unwrap();
        assert!(summary.cancel_at_period_end);
    }
}
