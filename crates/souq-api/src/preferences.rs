use axum::{Extension, Json, extract::State, response::IntoResponse};

use souq_types::api::{Claims, PreferenceUpdate};
use souq_types::store::PreferenceStore;

use crate::error::{ApiError, blocking};
use crate::state::AppState;

/// GET /preferences: effective toggles, defaults included.
pub async fn get_preferences(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let fanout = state.fanout.clone();
    let user_id = claims.sub;
    let prefs = blocking(move || Ok(fanout.resolve_preferences(user_id))).await?;
    Ok(Json(prefs))
}

/// PUT /preferences: partial update, last write wins.
pub async fn update_preferences(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(update): Json<PreferenceUpdate>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.clone();
    let user_id = claims.sub;
    let prefs = blocking(move || {
        let mut prefs = db.load_preferences(user_id)?.unwrap_or_default();
        update.apply_to(&mut prefs);
        db.save_preferences(user_id, &prefs)?;
        Ok(prefs)
    })
    .await?;
    Ok(Json(prefs))
}
