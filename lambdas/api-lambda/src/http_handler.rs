use cloudkeep_shared::auth::AuthorizationContext;
use cloudkeep_shared::errors::ApiError;
use cloudkeep_shared::request::parse_limit;
use cloudkeep_shared::{
    accounts, activity, billing, branding, clients, connections, files, jobs, platforms,
    response, team, AppState,
};
use lambda_http::{
    http::{Method, StatusCode},
    Body, Error, Request, RequestExt, Response,
};
use std::sync::Arc;

/// Main Lambda handler - resolves the caller and routes to the shared handlers
pub(crate) async fn function_handler(
    event: Request,
    state: Arc<AppState>,
) -> Result<Response<Body>, Error> {
    let method = event.method().clone();
    let path = event.uri().path().to_string();
    tracing::info!(%method, %path, "API request");

    // Handle CORS preflight
    if method == Method::OPTIONS {
        return response::preflight();
    }

    let parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    // Platform catalogue is public
    match (&method, parts.as_slice()) {
        (&Method::GET, ["platforms"]) => {
            return response::from_result(StatusCode::OK, platforms::list_platforms(&state).await)
        }
        (&Method::GET, ["platforms", platform_id]) => {
            return response::from_result(
                StatusCode::OK,
                platforms::get_platform(&state, platform_id).await,
            )
        }
        _ => {}
    }

    // Everything else needs a caller, checked before any storage access
    let ctx = match AuthorizationContext::from_request(&event, state.config.allow_identity_headers)
        .require()
    {
        Ok(ctx) => ctx,
        Err(e) => {
            tracing::warn!(%method, %path, "Rejected request without authorizer context");
            return response::error(&e);
        }
    };

    route(&state, &ctx, &event, &method, &parts).await
}

async fn route(
    state: &AppState,
    ctx: &AuthorizationContext,
    event: &Request,
    method: &Method,
    parts: &[&str],
) -> Result<Response<Body>, Error> {
    let body: &[u8] = event.body().as_ref();
    let ok = StatusCode::OK;
    let created = StatusCode::CREATED;

    match (method, parts) {
        // --- ACCOUNT ---
        (&Method::GET, ["account"]) => {
            response::from_result(ok, accounts::get_account(state, ctx).await)
        }
        (&Method::PATCH, ["account"]) => {
            response::from_result(ok, accounts::update_account(state, ctx, body).await)
        }

        // --- USERS / TEAM ---
        (&Method::GET, ["me"]) => response::from_result(ok, team::get_me(state, ctx).await),
        (&Method::PATCH, ["me"]) => {
            response::from_result(ok, team::update_me(state, ctx, body).await)
        }
        (&Method::GET, ["team"]) => {
            response::from_result(ok, team::list_members(state, ctx).await)
        }
        (&Method::POST, ["team"]) => {
            response::from_result(created, team::invite_member(state, ctx, body).await)
        }
        (&Method::PATCH, ["team", member_id]) => response::from_result(
            ok,
            team::update_member_role(state, ctx, member_id, body).await,
        ),
        (&Method::DELETE, ["team", member_id]) => {
            deleted(team::remove_member(state, ctx, member_id).await, "Member removed")
        }

        // --- CLIENTS ---
        (&Method::GET, ["clients"]) => {
            response::from_result(ok, clients::list_clients(state, ctx).await)
        }
        (&Method::POST, ["clients"]) => {
            response::from_result(created, clients::create_client(state, ctx, body).await)
        }
        (&Method::DELETE, ["clients", client_id]) => {
            deleted(clients::delete_client(state, ctx, client_id).await, "Client deleted")
        }

        // --- BILLING ---
        (&Method::GET, ["billing", "plans"]) => {
            response::from_result(ok, billing::list_plans(state).await)
        }
        (&Method::GET, ["billing", "subscription"]) => {
            response::from_result(ok, billing::get_subscription(state, ctx).await)
        }
        (&Method::DELETE, ["billing", "subscription"]) => {
            response::from_result(ok, billing::cancel_subscription(state, ctx).await)
        }
        (&Method::POST, ["billing", "checkout"]) => {
            response::from_result(ok, billing::create_checkout(state, ctx, body).await)
        }
        (&Method::POST, ["billing", "portal"]) => {
            response::from_result(ok, billing::create_portal_session(state, ctx).await)
        }

        // --- BRANDING ---
        (&Method::GET, ["branding"]) => {
            response::from_result(ok, branding::get_branding(state, ctx).await)
        }
        (&Method::PUT, ["branding"]) => {
            response::from_result(ok, branding::update_branding(state, ctx, body).await)
        }
        (&Method::POST, ["branding", "logo"]) => {
            response::from_result(ok, branding::create_logo_upload(state, ctx, body).await)
        }
        (&Method::DELETE, ["branding", "logo"]) => {
            response::from_result(ok, branding::delete_logo(state, ctx).await)
        }
        (&Method::GET, ["branding", "dns"]) => {
            response::from_result(ok, branding::dns_instructions(state, ctx).await)
        }

        // --- CONNECTIONS ---
        (&Method::GET, ["connections"]) => {
            response::from_result(ok, connections::list_connections(state, ctx).await)
        }
        (&Method::POST, ["connections"]) => response::from_result(
            created,
            connections::create_connection(state, ctx, body).await,
        ),
        (&Method::GET, ["connections", connection_id]) => response::from_result(
            ok,
            connections::get_connection(state, ctx, connection_id).await,
        ),
        (&Method::PATCH, ["connections", connection_id]) => response::from_result(
            ok,
            connections::update_connection(state, ctx, connection_id, body).await,
        ),
        (&Method::DELETE, ["connections", connection_id]) => deleted(
            connections::delete_connection(state, ctx, connection_id).await,
            "Connection deleted",
        ),
        (&Method::GET, ["connections", connection_id, "files"]) => {
            let limit = match parse_limit(
                query_param(event, "limit"),
                files::DEFAULT_LIMIT,
                files::MAX_LIMIT,
            ) {
                Ok(limit) => limit,
                Err(e) => return response::error(&e),
            };
            let prefix = query_param(event, "path").filter(|p| !p.is_empty());
            response::from_result(
                ok,
                files::list_files(state, ctx, connection_id, prefix, limit).await,
            )
        }
        (&Method::GET, ["connections", connection_id, "jobs"]) => {
            response::from_result(ok, jobs::list_jobs(state, ctx, connection_id).await)
        }

        // --- DATA ---
        (&Method::GET, ["files", file_id]) => {
            response::from_result(ok, files::get_file(state, ctx, file_id).await)
        }
        (&Method::GET, ["activity"]) => {
            let limit = match parse_limit(
                query_param(event, "limit"),
                activity::DEFAULT_LIMIT,
                activity::MAX_LIMIT,
            ) {
                Ok(limit) => limit,
                Err(e) => return response::error(&e),
            };
            let activity_type = query_param(event, "type").filter(|t| !t.is_empty());
            response::from_result(
                ok,
                activity::list_activity(state, ctx, activity_type, limit).await,
            )
        }

        _ => {
            tracing::info!(%method, parts = ?parts, "No route matched");
            response::not_found()
        }
    }
}

fn query_param<'a>(event: &'a Request, name: &str) -> Option<&'a str> {
    event
        .query_string_parameters_ref()
        .and_then(|params| params.first(name))
}

fn deleted(result: Result<(), ApiError>, msg: &str) -> Result<Response<Body>, Error> {
    match result {
        Ok(()) => response::message(msg),
        Err(e) => response::error(&e),
    }
}
