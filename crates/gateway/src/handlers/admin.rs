//! Unit admin pages
//!
//! Every POST ends in a 303 redirect with the outcome in a flash cookie,
//! except when the submitted form has to be shown again with its errors.

use crate::actions::{self, ActionError};
use crate::flash::{self, Flash};
use crate::forms::{self, UnitInput};
use crate::views::{self, UnitForm};
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::{header::SET_COOKIE, HeaderMap, StatusCode},
    response::{Html, IntoResponse, Response},
    Form,
};
use tracing::error;
use unitforge_common::{Unit, UnitStore};
use validator::Validate;

const LIST: &str = "/admin/units";

fn store(state: &AppState) -> UnitStore {
    UnitStore::new(state.db.clone())
}

fn detail_location(unit: &Unit) -> String {
    format!("{}/{}", LIST, unit.id)
}

/// Attach the cookie removal when a stored flash was just displayed
fn page(status: StatusCode, html: String, consumed_flash: bool) -> Response {
    if consumed_flash {
        (status, [(SET_COOKIE, flash::clear_cookie())], Html(html)).into_response()
    } else {
        (status, Html(html)).into_response()
    }
}

async fn render_list(
    store: &UnitStore,
    flash: Option<Flash>,
    form: UnitForm,
    status: StatusCode,
    consumed_flash: bool,
) -> Response {
    match store.list_all().await {
        Ok(units) => page(
            status,
            views::unit_list(&units, flash.as_ref(), &form),
            consumed_flash,
        ),
        Err(err) => {
            error!(error = %err, "Failed to load units for the admin list");
            let flash = Flash::error("Units could not be loaded.");
            page(err.status_code(), views::error_page(&flash), consumed_flash)
        }
    }
}

/// GET /admin/units
pub async fn list_page(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let flash = flash::take(&headers);
    let consumed = flash.is_some();
    render_list(&store(&state), flash, UnitForm::default(), StatusCode::OK, consumed).await
}

/// POST /admin/units
pub async fn create(State(state): State<AppState>, Form(input): Form<UnitInput>) -> Response {
    let store = store(&state);

    if let Err(errors) = input.validate() {
        let form = UnitForm::from_input(&input, forms::field_errors(&errors));
        return render_list(&store, None, form, StatusCode::UNPROCESSABLE_ENTITY, false).await;
    }

    match actions::create(&store, &input).await {
        Ok((_, flash)) => flash::redirect(LIST, &flash),
        Err(ActionError { flash, error }) => {
            let form = UnitForm::from_input(&input, Vec::new());
            let status = if error.is_server_error() {
                error.status_code()
            } else {
                StatusCode::UNPROCESSABLE_ENTITY
            };
            render_list(&store, Some(flash), form, status, false).await
        }
    }
}

/// POST /admin/units/install
pub async fn install(State(state): State<AppState>) -> Response {
    let flash = match actions::install(&store(&state)).await {
        Ok((_, flash)) => flash,
        Err(err) => err.flash,
    };
    flash::redirect(LIST, &flash)
}

/// GET /admin/units/{id}
pub async fn detail_page(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response {
    let flash = flash::take(&headers);
    let consumed = flash.is_some();

    match actions::detail(&store(&state), &id).await {
        Ok(unit) => page(
            StatusCode::OK,
            views::unit_detail(&unit, flash.as_ref(), &UnitForm::from_unit(&unit)),
            consumed,
        ),
        Err(err) => flash::redirect(LIST, &err.flash),
    }
}

/// POST /admin/units/{id}
pub async fn edit(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Form(input): Form<UnitInput>,
) -> Response {
    let store = store(&state);
    let unit = match actions::detail(&store, &id).await {
        Ok(unit) => unit,
        Err(err) => return flash::redirect(LIST, &err.flash),
    };

    if let Err(errors) = input.validate() {
        let form = UnitForm::from_input(&input, forms::field_errors(&errors));
        let html = views::unit_detail(&unit, None, &form);
        return page(StatusCode::UNPROCESSABLE_ENTITY, html, false);
    }

    match actions::edit(&store, &id, &input).await {
        Ok((unit, flash)) => flash::redirect(&detail_location(&unit), &flash),
        Err(err) if err.is_lookup_failure() => flash::redirect(LIST, &err.flash),
        Err(err) => {
            let form = UnitForm::from_input(&input, Vec::new());
            let html = views::unit_detail(&unit, Some(&err.flash), &form);
            let status = if err.error.is_server_error() {
                err.status()
            } else {
                StatusCode::UNPROCESSABLE_ENTITY
            };
            page(status, html, false)
        }
    }
}

/// POST /admin/units/{id}/default
pub async fn set_default(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let flash = match actions::set_default(&store(&state), &id).await {
        Ok((_, flash)) => flash,
        Err(err) => err.flash,
    };
    flash::redirect(LIST, &flash)
}

/// POST /admin/units/{id}/delete
pub async fn delete(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let flash = match actions::delete(&store(&state), &id).await {
        Ok((_, flash)) => flash,
        Err(err) => err.flash,
    };
    flash::redirect(LIST, &flash)
}
