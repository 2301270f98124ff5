//! HTTP request handlers - thin layer over the registered settings and their store
//!
//! Every request is routed by the last segment of its path under the admin prefix:
//! `json`, `set`, `clear` and `js` are resources, anything else renders the overview.

use super::dto::*;
use super::error::{map_domain_error, Problem};
use super::mapper::setting_dto;
use crate::config::Config;
use crate::contract::{Dimension, SettingsError, SettingsGroup};
use crate::domain::validation::{data_center_label, parse_data_center, require_setting_name};
use crate::domain::{SettingsRegistry, SettingsWithStore};
use axum::{
    http::{header, Method, StatusCode},
    response::{Html, IntoResponse, Response},
    Json,
};
use std::collections::BTreeMap;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{info, warn};

const SETTINGS_HTML: &str = include_str!("assets/settings.html");
const SETTINGS_JS: &str = include_str!("assets/settings.js");

/// Shared state of the admin routes for the settings root `S`.
pub struct AdminState<S: SettingsGroup> {
    registry: Arc<SettingsRegistry>,
    config: Arc<Config>,
    prefix: Arc<str>,
    _settings: PhantomData<fn() -> S>,
}

impl<S: SettingsGroup> Clone for AdminState<S> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
            config: Arc::clone(&self.config),
            prefix: Arc::clone(&self.prefix),
            _settings: PhantomData,
        }
    }
}

impl<S: SettingsGroup> AdminState<S> {
    pub fn new(registry: Arc<SettingsRegistry>, config: Config) -> Self {
        let prefix = Arc::from(config.normalized_prefix());
        Self {
            registry,
            config: Arc::new(config),
            prefix,
            _settings: PhantomData,
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    fn entry(&self) -> Result<Arc<SettingsWithStore<S>>, SettingsError> {
        self.registry.require::<S>()
    }

    /// Run a store call under the configured timeout.
    async fn bounded<T>(
        &self,
        operation: &'static str,
        call: impl Future<Output = Result<T, SettingsError>>,
    ) -> Result<T, SettingsError> {
        tokio::time::timeout(self.config.store_timeout, call)
            .await
            .map_err(|_| SettingsError::StoreTimeout { operation })?
    }
}

/// Dispatch one admin request.
pub async fn handle_resource<S: SettingsGroup>(
    state: &AdminState<S>,
    method: Method,
    segment: &str,
    body: &[u8],
) -> Response {
    let resource = segment.to_ascii_lowercase();
    let result = match resource.as_str() {
        "json" if method == Method::GET => settings_document(state).await.map(IntoResponse::into_response),
        "set" if method == Method::POST => set_override(state, body).await.map(IntoResponse::into_response),
        "clear" if method == Method::POST => clear_override(state, body).await.map(IntoResponse::into_response),
        "js" if method == Method::GET => Ok(script()),
        "json" | "set" | "clear" | "js" => Err(Problem::not_found()),
        _ if method == Method::GET => overview(state),
        _ => Err(Problem::not_found()),
    };
    result.unwrap_or_else(IntoResponse::into_response)
}

/// `GET {prefix}/json`
pub async fn settings_document<S: SettingsGroup>(
    state: &AdminState<S>,
) -> Result<Json<SettingsDocumentDto>, Problem> {
    let entry = state.entry().map_err(map_domain_error)?;
    let settings = entry.settings();
    let infos = state
        .bounded(
            "get_all_setting_infos",
            entry.store().get_all_setting_infos(settings.application_name()),
        )
        .await
        .map_err(map_domain_error)?;

    Ok(Json(SettingsDocumentDto {
        application_name: settings.application_name().to_string(),
        tier: settings.tier().name().to_string(),
        data_center: settings.data_center().name().to_string(),
        commit: settings.commit().to_string(),
        available_data_centers: S::DataCenter::variants()
            .iter()
            .map(|dc| dc.name().to_string())
            .collect(),
        tier_colors: state.config.tier_colors::<S::Tier>(),
        settings: infos.iter().map(|info| setting_dto(info, &settings)).collect(),
    }))
}

/// `POST {prefix}/set`
pub async fn set_override<S: SettingsGroup>(state: &AdminState<S>, body: &[u8]) -> Result<Json<SettingDto>, Problem> {
    let request: SetOverrideRequest = parse_body(body)?;
    let entry = state.entry().map_err(map_domain_error)?;
    apply_set(state, &entry, &request)
        .await
        .map(Json)
        .map_err(|error| rejected("set", &request.setting_name, error))
}

/// `POST {prefix}/clear`
pub async fn clear_override<S: SettingsGroup>(
    state: &AdminState<S>,
    body: &[u8],
) -> Result<Json<SettingDto>, Problem> {
    let request: ClearOverrideRequest = parse_body(body)?;
    let entry = state.entry().map_err(map_domain_error)?;
    apply_clear(state, &entry, &request)
        .await
        .map(Json)
        .map_err(|error| rejected("clear", &request.setting_name, error))
}

async fn apply_set<S: SettingsGroup>(
    state: &AdminState<S>,
    entry: &SettingsWithStore<S>,
    request: &SetOverrideRequest,
) -> Result<SettingDto, SettingsError> {
    let settings = entry.settings();
    let (application, tier) = (settings.application_name(), settings.tier());
    let name = require_setting_name(&request.setting_name)?;
    let data_center = parse_data_center::<S::DataCenter>(request.data_center.as_deref())?;

    let store = entry.store();
    let info = state
        .bounded("get_setting_info", store.get_setting_info(application, name))
        .await?
        .ok_or_else(|| SettingsError::UnknownSetting { name: name.to_string() })?;
    if !info.can_set_override_for(tier, data_center) {
        return Err(SettingsError::OverrideNotAllowed {
            name: name.to_string(),
            tier: tier.name().to_string(),
            data_center: data_center_label(data_center),
        });
    }
    store.factory().check_value(name, &request.value)?;

    state
        .bounded(
            "set_override",
            store.set_override(application, name, &request.value, tier, data_center),
        )
        .await?;
    info!(
        setting = name,
        tier = tier.name(),
        data_center = %data_center_label(data_center),
        "Admin set override"
    );
    fresh_setting(state, entry, name).await
}

async fn apply_clear<S: SettingsGroup>(
    state: &AdminState<S>,
    entry: &SettingsWithStore<S>,
    request: &ClearOverrideRequest,
) -> Result<SettingDto, SettingsError> {
    let settings = entry.settings();
    let (application, tier) = (settings.application_name(), settings.tier());
    let name = require_setting_name(&request.setting_name)?;
    let data_center = parse_data_center::<S::DataCenter>(request.data_center.as_deref())?;

    let store = entry.store();
    if store.factory().tree().setting(name).is_none() {
        return Err(SettingsError::UnknownSetting { name: name.to_string() });
    }
    state
        .bounded(
            "clear_override",
            store.clear_override(application, name, tier, data_center),
        )
        .await?;
    info!(
        setting = name,
        tier = tier.name(),
        data_center = %data_center_label(data_center),
        "Admin cleared override"
    );
    fresh_setting(state, entry, name).await
}

/// Re-read the setting from the store so the response reflects the write.
async fn fresh_setting<S: SettingsGroup>(
    state: &AdminState<S>,
    entry: &SettingsWithStore<S>,
    name: &str,
) -> Result<SettingDto, SettingsError> {
    let current = entry.settings();
    let store = entry.store();
    let settings = state
        .bounded(
            "get_app_settings",
            store.get_app_settings(current.application_name(), current.tier(), current.data_center()),
        )
        .await?;
    let info = state
        .bounded("get_setting_info", store.get_setting_info(current.application_name(), name))
        .await?
        .ok_or_else(|| SettingsError::UnknownSetting { name: name.to_string() })?;
    Ok(setting_dto(&info, &settings))
}

fn parse_body<T: serde::de::DeserializeOwned + Default>(body: &[u8]) -> Result<T, Problem> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|e| {
        warn!(error = %e, "Rejected malformed admin request body");
        Problem::new(StatusCode::BAD_REQUEST, "Invalid Request Body").with_detail(e.to_string())
    })
}

fn rejected(action: &'static str, setting: &str, error: SettingsError) -> Problem {
    warn!(action, setting, error = %error, "Admin request rejected");
    map_domain_error(error)
}

fn overview<S: SettingsGroup>(state: &AdminState<S>) -> Result<Response, Problem> {
    let entry = state.entry().map_err(map_domain_error)?;
    let settings = entry.settings();
    let colors = state.config.tier_colors::<S::Tier>();
    let tier = settings.tier().name();
    let tier_color = colors.get(tier).map(String::as_str).unwrap_or("#000000");

    let page = SETTINGS_HTML
        .replace("{{applicationName}}", &escape_html(settings.application_name()))
        .replace("{{tier}}", tier)
        .replace("{{dataCenter}}", settings.data_center().name())
        .replace("{{tierColor}}", &escape_html(tier_color))
        .replace("{{legend}}", &legend(&colors))
        .replace("{{prefix}}", &escape_html(state.prefix()));
    Ok(Html(page).into_response())
}

fn script() -> Response {
    (
        [(header::CONTENT_TYPE, "application/javascript; charset=utf-8")],
        SETTINGS_JS,
    )
        .into_response()
}

fn legend(colors: &BTreeMap<String, String>) -> String {
    colors
        .iter()
        .map(|(tier, color)| {
            format!(
                r#"<li><span class="swatch" style="background:{}"></span>{}</li>"#,
                escape_html(color),
                escape_html(tier)
            )
        })
        .collect()
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html(r#"<a href="x">&</a>"#), "&lt;a href=&quot;x&quot;&gt;&amp;&lt;/a&gt;");
    }

    #[test]
    fn test_blank_body_parses_as_default_request() {
        let request: SetOverrideRequest = parse_body(b"  ").unwrap();
        assert!(request.setting_name.is_empty());
        assert!(request.data_center.is_none());
    }

    #[test]
    fn test_malformed_body_is_bad_request() {
        let problem = parse_body::<SetOverrideRequest>(b"{not json").unwrap_err();
        assert_eq!(problem.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_legend_lists_every_tier() {
        let colors = BTreeMap::from([
            ("Local".to_string(), "#228b22".to_string()),
            ("Prod".to_string(), "#ff0000".to_string()),
        ]);
        let html = legend(&colors);
        assert!(html.contains("#228b22"));
        assert!(html.contains(">Prod</li>"));
    }
}
