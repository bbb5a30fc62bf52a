use axum::{
    Json,
    extract::{Query, State},
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
};
use chrono::Local;
use serde::Deserialize;
use serde_json::json;
use std::path::Path;
use tracing::{debug, instrument, warn};

use super::AppState;
use super::chart::ChartData;
use crate::core::range::parse_date;
use crate::core::{AssetClass, Currency, DateRange, Period};

const INDEX_TEMPLATE: &str = include_str!("templates/index.html");
const CURRENCY_PAGE: &str = include_str!("templates/currency.html");
const BACKGROUNDS_JS: &str = include_str!("templates/backgrounds.js");

const IMAGE_EXTENSIONS: [&str; 6] = ["jpg", "jpeg", "png", "webp", "gif", "svg"];

fn api_error(status: StatusCode, message: impl Into<String>) -> Response {
    let message = message.into();
    debug!(%status, %message, "Rejecting request");
    (status, Json(json!({ "success": false, "error": message }))).into_response()
}

pub(crate) fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
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

/// Fills `{{name}}` placeholders in one pass. Substituted values are never rescanned,
/// and unknown placeholders are kept as they are.
pub(crate) fn render_template(template: &str, values: &[(&str, String)]) -> String {
    let mut page = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find("{{") {
        page.push_str(&rest[..open]);
        let after = &rest[open + 2..];
        let found = after.find("}}").and_then(|close| {
            values
                .iter()
                .find(|(name, _)| *name == &after[..close])
                .map(|(_, value)| (close, value))
        });
        match found {
            Some((close, value)) => {
                page.push_str(&escape_html(value));
                rest = &after[close + 2..];
            }
            None => {
                page.push_str("{{");
                rest = after;
            }
        }
    }
    page.push_str(rest);
    page
}

pub async fn index(State(state): State<AppState>) -> Html<String> {
    let server = &state.config.server;
    let db = &state.config.database;
    Html(render_template(
        INDEX_TEMPLATE,
        &[
            ("host", server.host.clone()),
            ("port", server.port.to_string()),
            ("debug", server.debug.to_string()),
            ("db_host", db.host.clone()),
            ("db_port", db.port.clone()),
            ("db_name", db.name.clone()),
            ("db_user", db.user.clone()),
            ("db_password", db.masked_password()),
            ("db_url", db.display_url().to_string()),
        ],
    ))
}

pub async fn config_json(State(state): State<AppState>) -> Json<serde_json::Value> {
    let server = &state.config.server;
    let db = &state.config.database;
    Json(json!({
        "message": "Hello World",
        "host_config": {
            "host": server.host,
            "port": server.port,
            "debug": server.debug,
        },
        "database_config": {
            "db_host": db.host,
            "db_port": db.port,
            "db_name": db.name,
            "db_user": db.user,
            "db_password": db.masked_password(),
            "db_url": db.display_url(),
        },
        "environment": state.config.deployment.name(),
    }))
}

pub async fn currency_page() -> Html<&'static str> {
    Html(CURRENCY_PAGE)
}

pub async fn backgrounds_js() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "application/javascript; charset=utf-8")],
        BACKGROUNDS_JS,
    )
}

pub async fn currency_list() -> Json<serde_json::Value> {
    let fiat: Vec<&str> = Currency::all_fiat().map(|c| c.code).collect();
    let crypto: Vec<&str> = Currency::all_crypto().map(|c| c.code).collect();
    Json(json!({ "fiat": fiat, "crypto": crypto }))
}

#[derive(Debug, Deserialize)]
pub struct CurrentParams {
    #[serde(rename = "type")]
    kind: Option<String>,
    date: Option<String>,
}

#[instrument(name = "current_request", skip(state))]
pub async fn current_rates(
    State(state): State<AppState>,
    Query(params): Query<CurrentParams>,
) -> Response {
    let kind = params.kind.as_deref().unwrap_or("fiat");

    let rates = if kind == "fiat" {
        let date = match params.date.as_deref().map(parse_date).transpose() {
            Ok(date) => date,
            Err(e) => return api_error(StatusCode::BAD_REQUEST, e.to_string()),
        };
        state.fetcher.get_all_fiat_rates(date).await
    } else {
        state.fetcher.get_all_crypto_rates().await
    };

    Json(json!({ "success": true, "rates": rates, "type": kind })).into_response()
}

#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    currency: Option<String>,
    period: Option<String>,
    start_date: Option<String>,
    end_date: Option<String>,
}

#[instrument(name = "history_request", skip(state))]
pub async fn currency_history(
    State(state): State<AppState>,
    Query(params): Query<HistoryParams>,
) -> Response {
    let code = params.currency.as_deref().unwrap_or_default().trim();
    if code.is_empty() {
        return api_error(StatusCode::BAD_REQUEST, "Currency is not specified");
    }

    let Some(currency) = Currency::lookup(code) else {
        return api_error(
            StatusCode::BAD_REQUEST,
            format!("Currency {code} is not supported"),
        );
    };

    let range = match DateRange::resolve(
        Period::from_param(params.period.as_deref()),
        params.start_date.as_deref(),
        params.end_date.as_deref(),
        currency.class,
        Local::now().date_naive(),
    ) {
        Ok(range) => range,
        Err(e) => return api_error(StatusCode::BAD_REQUEST, e.to_string()),
    };

    let history = state
        .fetcher
        .get_history(currency, range.start(), range.end())
        .await;

    let Some(chart) = ChartData::from_history(&history) else {
        let hint = match currency.class {
            AssetClass::Crypto => {
                "The period may be too long or CoinGecko may be unavailable. Try a shorter period."
            }
            AssetClass::Fiat => "The period may be outside the data published by the CBR.",
        };
        warn!(code, start = %range.start(), end = %range.end(), "No history available");
        return api_error(
            StatusCode::BAD_REQUEST,
            format!("No data for {code} in the selected period. {hint}"),
        );
    };

    Json(json!({
        "success": true,
        "graph": chart.figure(currency.code),
        "data": chart,
    }))
    .into_response()
}

/// Background image file names under `dir` that start with `prefix`.
pub(crate) async fn list_backgrounds(dir: &Path, prefix: &str) -> Vec<String> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) => {
            debug!("No backgrounds directory at {}: {}", dir.display(), e);
            return Vec::new();
        }
    };

    let mut names = Vec::new();
    while let Ok(Some(entry)) = entries.next_entry().await {
        let name = entry.file_name().to_string_lossy().into_owned();
        let is_image = Path::new(&name)
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()));
        if name.starts_with(prefix) && is_image {
            names.push(name);
        }
    }
    names.sort();
    names
}

pub async fn backgrounds_list(State(state): State<AppState>) -> Json<serde_json::Value> {
    let target = state.config.deployment;
    let dir = state.config.static_path().join("backgrounds");
    let backgrounds: Vec<serde_json::Value> = list_backgrounds(&dir, target.background_prefix())
        .await
        .into_iter()
        .map(|name| json!({ "url": format!("/static/backgrounds/{name}"), "filename": name }))
        .collect();

    Json(json!({
        "success": true,
        "environment": target.name(),
        "backgrounds": backgrounds,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_template_escapes_values() {
        let page = render_template(
            "<p>{{user}}</p><p>{{missing}}</p>",
            &[("user", "<admin> & co".to_string())],
        );
        assert_eq!(page, "<p>&lt;admin&gt; &amp; co</p><p>{{missing}}</p>");
    }

    #[test]
    fn test_render_template_does_not_expand_substituted_values() {
        let page = render_template(
            "host={{host}} password={{db_password}}",
            &[
                ("host", "{{db_password}}".to_string()),
                ("db_password", "******".to_string()),
            ],
        );
        assert_eq!(page, "host={{db_password}} password=******");
    }

    #[test]
    fn test_render_template_unterminated_placeholder() {
        let page = render_template("a {{host b", &[("host", "x".to_string())]);
        assert_eq!(page, "a {{host b");
    }
}
