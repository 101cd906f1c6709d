use crate::activity::record_activity;
use crate::auth::AuthorizationContext;
use crate::errors::ApiError;
use crate::ids::{EntityId, EntityKind};
use crate::request::{parse_body, required};
use crate::store::{decode_items, id_key, merge_item, values, Item, ACCOUNT_INDEX};
use crate::types::{InviteMemberRequest, Role, UpdateMeRequest, UpdateMemberRoleRequest, User};
use crate::AppState;

/// A user of the caller's account, with its raw stored item.
async fn fetch_user(
    state: &AppState,
    ctx: &AuthorizationContext,
    key: &str,
    what: &str,
) -> Result<(User, Item), ApiError> {
    let item = state
        .store
        .get_item(&state.config.users_table, id_key(key))
        .await
        .map_err(|e| e.or_missing(what))?;
    let user = User::from_item(&item)?;
    ctx.ensure_account_access(&user.account_id)?;
    Ok((user, item))
}

/// The calling user's record. It must belong to the caller's account.
pub async fn load_caller(state: &AppState, ctx: &AuthorizationContext) -> Result<User, ApiError> {
    Ok(fetch_user(state, ctx, &ctx.user_key(), "User").await?.0)
}

/// The calling user, if they are an owner or admin of the account.
pub async fn require_manager(
    state: &AppState,
    ctx: &AuthorizationContext,
) -> Result<User, ApiError> {
    let user = load_caller(state, ctx).await?;
    if !user.role.can_manage() {
        tracing::warn!(user_id = %ctx.user_id, "Member tried a manager-only action");
        return Err(ApiError::AccessDenied(
            "Only account owners and admins can do this".to_string(),
        ));
    }
    Ok(user)
}

async fn load_member(
    state: &AppState,
    ctx: &AuthorizationContext,
    member_id: &str,
) -> Result<(User, Item), ApiError> {
    let member = EntityId::new(EntityKind::User, member_id);
    fetch_user(state, ctx, &member.key(), "Member").await
}

async fn save(state: &AppState, stored: Item, user: &User) -> Result<(), ApiError> {
    state
        .store
        .put_item(&state.config.users_table, merge_item(stored, user.to_item()))
        .await?;
    Ok(())
}

fn parse_role(raw: Option<String>) -> Result<Role, ApiError> {
    let role = match raw {
        None => return Ok(Role::Member),
        Some(r) => Role::parse(r.trim())
            .ok_or_else(|| ApiError::validation("role must be one of admin, member"))?,
    };
    if role == Role::Owner {
        return Err(ApiError::validation("The owner role cannot be granted"));
    }
    Ok(role)
}

/// GET /me
pub async fn get_me(state: &AppState, ctx: &AuthorizationContext) -> Result<User, ApiError> {
    load_caller(state, ctx).await
}

/// PATCH /me
pub async fn update_me(
    state: &AppState,
    ctx: &AuthorizationContext,
    body: &[u8],
) -> Result<User, ApiError> {
    let req: UpdateMeRequest = parse_body(body)?;
    let (mut user, stored) = fetch_user(state, ctx, &ctx.user_key(), "User").await?;

    if let Some(name) = req.name {
        user.name = Some(required(Some(name), "name")?);
        save(state, stored, &user).await?;
    }
    Ok(user)
}

/// GET /team
pub async fn list_members(
    state: &AppState,
    ctx: &AuthorizationContext,
) -> Result<Vec<User>, ApiError> {
    let items = state
        .store
        .query_index(
            &state.config.users_table,
            ACCOUNT_INDEX,
            "accountId = :accountId",
            values(":accountId", &ctx.account_key()),
        )
        .await?;

    let mut members = decode_items(&items, User::from_item);
    members.sort_by(|a, b| a.created_at.cmp(&b.created_at));
    Ok(members)
}

/// POST /team
pub async fn invite_member(
    state: &AppState,
    ctx: &AuthorizationContext,
    body: &[u8],
) -> Result<User, ApiError> {
    let req: InviteMemberRequest = parse_body(body)?;
    let email = required(req.email, "email")?.to_lowercase();
    if !email.contains('@') {
        return Err(ApiError::validation("email is not a valid address"));
    }
    let role = parse_role(req.role)?;

    let inviter = require_manager(state, ctx).await?;

    let members = list_members(state, ctx).await?;
    if members.iter().any(|m| m.email.eq_ignore_ascii_case(&email)) {
        return Err(ApiError::validation(format!(
            "{} is already a member of this account",
            email
        )));
    }

    let id = EntityId::generate(EntityKind::User);
    let user = User {
        id: id.external().to_string(),
        account_id: EntityKind::Account.external(&ctx.account_id),
        email,
        name: req.name.filter(|n| !n.trim().is_empty()),
        role,
        status: "invited".to_string(),
        invited_by: Some(inviter.id),
        created_at: chrono::Utc::now().to_rfc3339(),
    };
    save(state, Item::new(), &user).await?;

    tracing::info!(account_id = %ctx.account_id, member = %id, "Member invited");
    record_activity(
        state,
        ctx,
        "member.invited",
        &format!("Invited {}", user.email),
        Some(id.key().as_str()),
    )
    .await;

    Ok(user)
}

/// PATCH /team/{id}
pub async fn update_member_role(
    state: &AppState,
    ctx: &AuthorizationContext,
    member_id: &str,
    body: &[u8],
) -> Result<User, ApiError> {
    let req: UpdateMemberRoleRequest = parse_body(body)?;
    let role = parse_role(Some(required(req.role, "role")?))?;

    require_manager(state, ctx).await?;
    let (mut member, stored) = load_member(state, ctx, member_id).await?;
    if member.role == Role::Owner {
        return Err(ApiError::validation(
            "The account owner's role cannot be changed",
        ));
    }

    member.role = role;
    save(state, stored, &member).await?;

    record_activity(
        state,
        ctx,
        "member.role_changed",
        &format!("Changed {} to {}", member.email, role.as_str()),
        Some(EntityKind::User.key(&member.id).as_str()),
    )
    .await;

    Ok(member)
}

/// DELETE /team/{id}
pub async fn remove_member(
    state: &AppState,
    ctx: &AuthorizationContext,
    member_id: &str,
) -> Result<(), ApiError> {
    let caller = require_manager(state, ctx).await?;
    let (member, _) = load_member(state, ctx, member_id).await?;

    if member.id == caller.id {
        return Err(ApiError::validation("You cannot remove yourself"));
    }
    if member.role == Role::Owner {
        return Err(ApiError::validation("The account owner cannot be removed"));
    }

    let key = EntityKind::User.key(&member.id);
    state
        .store
        .delete_item(&state.config.users_table, id_key(&key))
        .await?;

    record_activity(
        state,
        ctx,
        "member.removed",
        &format!("Removed {}", member.email),
        Some(key.as_str()),
    )
    .await;

    Ok(())
}
