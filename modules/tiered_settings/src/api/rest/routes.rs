//! Route registration for the admin API

use super::handlers::{self, AdminState};
use crate::config::Config;
use crate::contract::SettingsGroup;
use crate::domain::SettingsRegistry;
use axum::{
    body::Bytes,
    extract::Path,
    http::Method,
    response::Response,
    routing::any,
    Extension, Router,
};
use std::sync::Arc;

/// Admin routes for the settings root `S`, mounted at `config.admin_prefix`.
///
/// The prefix itself (with or without a trailing slash) serves the overview.
/// Any deeper path dispatches on its last non-empty segment, so
/// `{prefix}/anything/json` is the same resource as `{prefix}/json`.
pub fn admin_router<S: SettingsGroup>(registry: Arc<SettingsRegistry>, config: Config) -> Router {
    let state = AdminState::<S>::new(registry, config);
    let prefix = state.prefix().to_string();

    let mut router = Router::new()
        .route(&format!("{}/", prefix), any(overview_handler::<S>))
        .route(&format!("{}/{{*rest}}", prefix), any(resource_handler::<S>));
    if !prefix.is_empty() {
        router = router.route(&prefix, any(overview_handler::<S>));
    }

    tracing::debug!(prefix = %prefix, "Registering tiered settings admin routes");
    router.layer(Extension(state))
}

// ===== Handler wrappers that extract state from Extension =====

async fn overview_handler<S: SettingsGroup>(
    Extension(state): Extension<AdminState<S>>,
    method: Method,
) -> Response {
    handlers::handle_resource(&state, method, "", &[]).await
}

async fn resource_handler<S: SettingsGroup>(
    Extension(state): Extension<AdminState<S>>,
    method: Method,
    Path(rest): Path<String>,
    body: Bytes,
) -> Response {
    handlers::handle_resource(&state, method, last_segment(&rest), &body).await
}

fn last_segment(path: &str) -> &str {
    path.rsplit('/').find(|segment| !segment.is_empty()).unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::last_segment;

    #[test]
    fn test_last_segment() {
        assert_eq!(last_segment("json"), "json");
        assert_eq!(last_segment("nested/path/json"), "json");
        assert_eq!(last_segment("set/"), "set");
        assert_eq!(last_segment("//"), "");
    }
}
