//! Unit JSON API
//!
//! Queries answer with plain data or an [`AppError`]; actions answer with the
//! flash message the admin would see, plus the affected unit(s).

use crate::actions::{self, ActionError};
use crate::flash::Flash;
use crate::forms::{self, UnitInput};
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use unitforge_common::{errors::Result, Unit, UnitOption, UnitStore};
use validator::Validate;

#[derive(Debug, Serialize, Deserialize)]
pub struct UnitListResponse {
    pub units: Vec<Unit>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UnitResponse {
    pub unit: Unit,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OptionsResponse {
    pub options: Vec<UnitOption>,
}

/// Outcome of an action
#[derive(Debug, Serialize, Deserialize)]
pub struct ActionResponse {
    pub flash: Flash,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<Unit>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub units: Option<Vec<Unit>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inserted: Option<usize>,
}

impl ActionResponse {
    fn new(flash: Flash) -> Self {
        Self {
            flash,
            unit: None,
            units: None,
            inserted: None,
        }
    }

    fn with_unit(flash: Flash, unit: Unit) -> Self {
        Self {
            unit: Some(unit),
            ..Self::new(flash)
        }
    }
}

impl IntoResponse for ActionError {
    fn into_response(self) -> Response {
        (self.status(), Json(ActionResponse::new(self.flash))).into_response()
    }
}

fn store(state: &AppState) -> UnitStore {
    UnitStore::new(state.db.clone())
}

/// GET /api/units
pub async fn list_units(State(state): State<AppState>) -> Result<Json<UnitListResponse>> {
    let units = store(&state).list_all().await?;
    Ok(Json(UnitListResponse { units }))
}

/// GET /api/units/default
pub async fn get_default(State(state): State<AppState>) -> Result<Json<UnitResponse>> {
    let unit = store(&state).get_default().await?;
    Ok(Json(UnitResponse { unit }))
}

/// GET /api/units/options
pub async fn get_options(State(state): State<AppState>) -> Result<Json<OptionsResponse>> {
    let options = store(&state).form_options().await?;
    Ok(Json(OptionsResponse { options }))
}

/// GET /api/units/{id}
pub async fn get_unit(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> std::result::Result<Json<UnitResponse>, ActionError> {
    let unit = actions::detail(&store(&state), &id).await?;
    Ok(Json(UnitResponse { unit }))
}

/// POST /api/units
pub async fn create_unit(
    State(state): State<AppState>,
    Json(input): Json<UnitInput>,
) -> Response {
    if let Err(errors) = input.validate() {
        return forms::to_app_error(&errors).into_response();
    }

    match actions::create(&store(&state), &input).await {
        Ok((unit, flash)) => {
            info!(unit_id = %unit.id, code = %unit.code, "Unit created via API");
            (StatusCode::CREATED, Json(ActionResponse::with_unit(flash, unit))).into_response()
        }
        Err(err) => err.into_response(),
    }
}

/// PUT /api/units/{id}
pub async fn update_unit(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(input): Json<UnitInput>,
) -> Response {
    if let Err(errors) = input.validate() {
        return forms::to_app_error(&errors).into_response();
    }

    match actions::edit(&store(&state), &id, &input).await {
        Ok((unit, flash)) => Json(ActionResponse::with_unit(flash, unit)).into_response(),
        Err(err) => err.into_response(),
    }
}

/// POST /api/units/{id}/default
///
/// Also returns the refreshed list so clients can redraw their grid.
pub async fn set_default(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> std::result::Result<Json<ActionResponse>, ActionError> {
    let store = store(&state);
    let (unit, flash) = actions::set_default(&store, &id).await?;
    // Best effort, the default is already committed
    let units = store.list_all().await.ok();

    Ok(Json(ActionResponse {
        units,
        ..ActionResponse::with_unit(flash, unit)
    }))
}

/// DELETE /api/units/{id}
pub async fn delete_unit(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> std::result::Result<Json<ActionResponse>, ActionError> {
    let (unit, flash) = actions::delete(&store(&state), &id).await?;
    Ok(Json(ActionResponse::with_unit(flash, unit)))
}

/// POST /api/units/install
pub async fn install_units(
    State(state): State<AppState>,
) -> std::result::Result<Json<ActionResponse>, ActionError> {
    let (inserted, flash) = actions::install(&store(&state)).await?;
    info!(inserted, "Starter units installed via API");
    Ok(Json(ActionResponse {
        inserted: Some(inserted),
        ..ActionResponse::new(flash)
    }))
}
