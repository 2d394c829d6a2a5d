use axum::{Json, response::IntoResponse};

use souq_types::api::{ModerationCheckRequest, ModerationCheckResponse};

/// POST /moderation/check: classify named fields (offer description,
/// duration, ...) for services that store user text outside this core.
pub async fn check(Json(req): Json<ModerationCheckRequest>) -> impl IntoResponse {
    let violations: std::collections::BTreeMap<String, String> =
        souq_guard::check_fields(req.fields.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .into_iter()
            .map(|(field, kind)| (field.to_string(), kind.code().to_string()))
            .collect();

    Json(ModerationCheckResponse {
        allowed: violations.is_empty(),
        violations,
    })
}
