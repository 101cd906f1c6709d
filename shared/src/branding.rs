use crate::activity::record_activity;
use crate::auth::AuthorizationContext;
use crate::errors::{ApiError, StoreError};
use crate::ids::EntityKind;
use crate::request::{parse_body, required};
use crate::store::id_key;
use crate::team::require_manager;
use crate::types::{
    Branding, DnsInstructions, DnsRecord, LogoUpload, LogoUploadRequest, UpdateBrandingRequest,
};
use crate::AppState;

const DNS_TTL: u32 = 300;

/// Accepted logo content types and the extension stored with each.
const LOGO_TYPES: [(&str, &str); 3] = [
    ("image/png", "png"),
    ("image/jpeg", "jpg"),
    ("image/svg+xml", "svg"),
];

async fn load_branding(state: &AppState, ctx: &AuthorizationContext) -> Result<Branding, ApiError> {
    match state
        .store
        .get_item(&state.config.branding_table, id_key(&ctx.account_key()))
        .await
    {
        Ok(item) => Ok(Branding::from_item(&item)?),
        Err(StoreError::NotFound) => Ok(Branding {
            account_id: EntityKind::Account.external(&ctx.account_id),
            ..Default::default()
        }),
        Err(e) => Err(e.into()),
    }
}

async fn save_branding(state: &AppState, branding: &mut Branding) -> Result<(), ApiError> {
    branding.updated_at = Some(chrono::Utc::now().to_rfc3339());
    state
        .store
        .put_item(&state.config.branding_table, branding.to_item())
        .await?;
    Ok(())
}

/// `#RRGGBB`, hex digits in either case.
fn is_hex_color(value: &str) -> bool {
    value.len() == 7
        && value.starts_with('#')
        && value[1..].chars().all(|c| c.is_ascii_hexdigit())
}

/// Lower-cased hostname with at least two labels.
fn normalize_domain(raw: &str) -> Result<String, ApiError> {
    let domain = raw.trim().trim_end_matches('.').to_ascii_lowercase();
    let invalid = || ApiError::validation(format!("{} is not a valid domain", raw.trim()));

    if domain.len() > 253 {
        return Err(invalid());
    }
    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 {
        return Err(invalid());
    }
    for label in &labels {
        let ok = !label.is_empty()
            && label.len() <= 63
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
        if !ok {
            return Err(invalid());
        }
    }
    if labels
        .last()
        .is_some_and(|tld| tld.chars().all(|c| c.is_ascii_digit()))
    {
        return Err(invalid());
    }
    Ok(domain)
}

/// GET /branding
pub async fn get_branding(
    state: &AppState,
    ctx: &AuthorizationContext,
) -> Result<Branding, ApiError> {
    load_branding(state, ctx).await
}

/// PUT /branding
///
/// Empty strings clear a field. A new custom domain starts out `pending`.
pub async fn update_branding(
    state: &AppState,
    ctx: &AuthorizationContext,
    body: &[u8],
) -> Result<Branding, ApiError> {
    let req: UpdateBrandingRequest = parse_body(body)?;

    let primary_color = match req.primary_color.as_deref().map(str::trim) {
        Some("") => Some(None),
        Some(c) if is_hex_color(c) => Some(Some(c.to_ascii_uppercase())),
        Some(_) => {
            return Err(ApiError::validation(
                "primaryColor must be a hex color like #1A2B3C",
            ))
        }
        None => None,
    };
    let custom_domain = match req.custom_domain.as_deref().map(str::trim) {
        Some("") => Some(None),
        Some(d) => Some(Some(normalize_domain(d)?)),
        None => None,
    };

    require_manager(state, ctx).await?;
    let mut branding = load_branding(state, ctx).await?;

    if let Some(name) = req.company_name {
        branding.company_name = Some(name.trim().to_string()).filter(|n| !n.is_empty());
    }
    if let Some(color) = primary_color {
        branding.primary_color = color;
    }
    if let Some(domain) = custom_domain {
        if domain != branding.custom_domain {
            branding.domain_status = domain.as_ref().map(|_| "pending".to_string());
            branding.custom_domain = domain;
        }
    }

    save_branding(state, &mut branding).await?;
    record_activity(
        state,
        ctx,
        "branding.updated",
        "Updated branding",
        Some(ctx.account_key().as_str()),
    )
    .await;

    Ok(branding)
}

/// POST /branding/logo
pub async fn create_logo_upload(
    state: &AppState,
    ctx: &AuthorizationContext,
    body: &[u8],
) -> Result<LogoUpload, ApiError> {
    let req: LogoUploadRequest = parse_body(body)?;
    let content_type = required(req.content_type, "contentType")?.to_ascii_lowercase();
    let extension = LOGO_TYPES
        .iter()
        .find(|(ty, _)| *ty == content_type)
        .map(|(_, ext)| *ext)
        .ok_or_else(|| {
            ApiError::validation("contentType must be image/png, image/jpeg or image/svg+xml")
        })?;

    require_manager(state, ctx).await?;
    let mut branding = load_branding(state, ctx).await?;

    let logo_key = format!(
        "logos/{}/{}.{}",
        EntityKind::Account.external(&ctx.account_id),
        uuid::Uuid::new_v4(),
        extension
    );
    let upload_url = state.logos.presign_upload(&logo_key, &content_type).await?;

    let previous = branding.logo_key.replace(logo_key.clone());
    save_branding(state, &mut branding).await?;
    if let Some(old) = previous {
        if let Err(e) = state.logos.delete(&old).await {
            tracing::warn!(logo_key = %old, error = %e, "Failed to delete previous logo");
        }
    }
    tracing::info!(account_id = %ctx.account_id, logo_key = %logo_key, "Logo upload issued");

    Ok(LogoUpload {
        upload_url,
        logo_key,
        method: "PUT".to_string(),
        content_type,
    })
}

/// DELETE /branding/logo
pub async fn delete_logo(
    state: &AppState,
    ctx: &AuthorizationContext,
) -> Result<Branding, ApiError> {
    require_manager(state, ctx).await?;
    let mut branding = load_branding(state, ctx).await?;

    let Some(key) = branding.logo_key.take() else {
        return Ok(branding);
    };
    state.logos.delete(&key).await?;
    save_branding(state, &mut branding).await?;

    record_activity(
        state,
        ctx,
        "branding.logo_deleted",
        "Removed logo",
        Some(ctx.account_key().as_str()),
    )
    .await;

    Ok(branding)
}

/// GET /branding/dns
pub async fn dns_instructions(
    state: &AppState,
    ctx: &AuthorizationContext,
) -> Result<DnsInstructions, ApiError> {
    let branding = load_branding(state, ctx).await?;
    let domain = branding
        .custom_domain
        .ok_or_else(|| ApiError::validation("No custom domain is configured"))?;
    let target = state.config.custom_domain_target.clone();

    Ok(DnsInstructions {
        instructions: vec![
            "Sign in to the DNS provider that hosts your domain.".to_string(),
            format!("Create a CNAME record for {} pointing to {}.", domain, target),
            "Changes can take up to 48 hours to propagate.".to_string(),
        ],
        records: vec![DnsRecord {
            record_type: "CNAME".to_string(),
            name: domain.clone(),
            value: target,
            ttl: DNS_TTL,
        }],
        status: branding
            .domain_status
            .unwrap_or_else(|| "pending".to_string()),
        domain,
    })
}
