use crate::errors::ApiError;
use crate::ids::EntityKind;
use crate::store::{decode_items, id_key, values};
use crate::types::{Platform, PlatformDetail, PlatformSource};
use crate::AppState;

pub const PLATFORM_INDEX: &str = "platformId-index";

/// GET /platforms
pub async fn list_platforms(state: &AppState) -> Result<Vec<Platform>, ApiError> {
    let items = state.store.scan(&state.config.platforms_table).await?;
    let mut platforms: Vec<Platform> = decode_items(&items, Platform::from_item)
        .into_iter()
        .filter(|p| p.enabled)
        .collect();
    platforms.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(platforms)
}

/// An enabled platform. Disabled ones are reported as missing.
pub async fn load_platform(state: &AppState, platform_id: &str) -> Result<Platform, ApiError> {
    let item = state
        .store
        .get_item(
            &state.config.platforms_table,
            id_key(&EntityKind::Platform.key(platform_id)),
        )
        .await
        .map_err(|e| e.or_missing("Platform"))?;
    let platform = Platform::from_item(&item)?;
    if !platform.enabled {
        return Err(ApiError::not_found("Platform not found"));
    }
    Ok(platform)
}

pub async fn list_sources(
    state: &AppState,
    platform_id: &str,
) -> Result<Vec<PlatformSource>, ApiError> {
    let items = state
        .store
        .query_index(
            &state.config.platform_sources_table,
            PLATFORM_INDEX,
            "platformId = :platformId",
            values(":platformId", &EntityKind::Platform.key(platform_id)),
        )
        .await?;
    let mut sources = decode_items(&items, PlatformSource::from_item);
    sources.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(sources)
}

/// GET /platforms/{id}
pub async fn get_platform(state: &AppState, platform_id: &str) -> Result<PlatformDetail, ApiError> {
    let platform = load_platform(state, platform_id).await?;
    let sources = list_sources(state, &platform.id).await?;
    Ok(PlatformDetail { platform, sources })
}
