use crate::activity::record_activity;
use crate::auth::AuthorizationContext;
use crate::errors::ApiError;
use crate::request::{parse_body, required};
use crate::store::{id_key, merge_item, Item};
use crate::team::require_manager;
use crate::types::{Account, UpdateAccountRequest};
use crate::AppState;

/// The caller's own account record, with its raw stored item.
pub async fn load_account_item(
    state: &AppState,
    ctx: &AuthorizationContext,
) -> Result<(Account, Item), ApiError> {
    let item = state
        .store
        .get_item(&state.config.accounts_table, id_key(&ctx.account_key()))
        .await
        .map_err(|e| e.or_missing("Account"))?;
    Ok((Account::from_item(&item)?, item))
}

/// Load the caller's own account record.
pub async fn load_account(
    state: &AppState,
    ctx: &AuthorizationContext,
) -> Result<Account, ApiError> {
    Ok(load_account_item(state, ctx).await?.0)
}

/// Write `account` over the item it was loaded from.
pub async fn save_account(
    state: &AppState,
    stored: Item,
    account: &Account,
) -> Result<(), ApiError> {
    state
        .store
        .put_item(
            &state.config.accounts_table,
            merge_item(stored, account.to_item()),
        )
        .await?;
    Ok(())
}

/// GET /account
pub async fn get_account(
    state: &AppState,
    ctx: &AuthorizationContext,
) -> Result<Account, ApiError> {
    load_account(state, ctx).await
}

/// PATCH /account
pub async fn update_account(
    state: &AppState,
    ctx: &AuthorizationContext,
    body: &[u8],
) -> Result<Account, ApiError> {
    let req: UpdateAccountRequest = parse_body(body)?;
    let name = req.name.map(|n| required(Some(n), "name")).transpose()?;
    let billing_email = req
        .billing_email
        .map(|e| required(Some(e), "billingEmail"))
        .transpose()?;
    if let Some(email) = &billing_email {
        if !email.contains('@') {
            return Err(ApiError::validation("billingEmail is not a valid address"));
        }
    }

    require_manager(state, ctx).await?;
    let (mut account, stored) = load_account_item(state, ctx).await?;

    let mut changed = Vec::new();
    if let Some(name) = name {
        account.name = name;
        changed.push("name");
    }
    if let Some(email) = billing_email {
        account.billing_email = Some(email);
        changed.push("billing email");
    }
    if changed.is_empty() {
        return Ok(account);
    }

    save_account(state, stored, &account).await?;
    tracing::info!(account_id = %ctx.account_id, "Account updated");
    record_activity(
        state,
        ctx,
        "account.updated",
        &format!("Updated account {}", changed.join(" and ")),
        Some(ctx.account_key().as_str()),
    )
    .await;

    Ok(account)
}
