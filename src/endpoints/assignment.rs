use axum::{
    Extension, Json,
    extract::{Path, Query, State},
};
use validator::Validate;

use crate::{
    database::{Collection, DeleteAck, Filter, InsertAck, Page, UpdateAck, to_fields},
    endpoints::parse_id,
    error::{ApiError, ApiResult},
    model::{
        api_response::ApiResponse,
        assignment::{Assignment, AssignmentFields, Level, NewAssignment},
        identity::Identity,
        request::{CountQuery, CountResponse, ListQuery},
    },
    security::authorize,
    state::AppState,
};

fn level_filter(level: Option<Level>) -> Filter {
    match level {
        Some(level) => Filter::all().eq("level", level.as_str()),
        None => Filter::all(),
    }
}

/// Publishes a new assignment. Only the publisher named in the body may do so.
pub async fn create(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(assignment): Json<NewAssignment>,
) -> ApiResult<Json<ApiResponse<InsertAck>>> {
    assignment.validate()?;
    authorize(&identity, &assignment)?;

    let body = to_fields(&assignment).map_err(|e| ApiError::Internal(e.to_string()))?;
    let ack = state.store.insert_one(Collection::Assignments, body).await?;

    tracing::info!("Assignment {} published by {}", ack.inserted_id, identity.email);
    Ok(Json(ApiResponse::success(ack, "Assignment created")))
}

/// Lists assignments page by page, optionally restricted to one level.
///
/// A missing or zero `size` returns every match.
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<ApiResponse<Vec<Assignment>>>> {
    let page = Page::new(query.pages.unwrap_or(0), query.size.filter(|s| *s > 0));
    let docs = state
        .store
        .find(Collection::Assignments, &level_filter(query.level), Some(page))
        .await?;

    let assignments = docs
        .into_iter()
        .map(|d| d.decode())
        .collect::<Result<Vec<Assignment>, _>>()?;

    Ok(Json(ApiResponse::success(assignments, "Assignments retrieved")))
}

pub async fn count(
    State(state): State<AppState>,
    Query(query): Query<CountQuery>,
) -> ApiResult<Json<ApiResponse<CountResponse>>> {
    let total_items = state
        .store
        .count(Collection::Assignments, &level_filter(query.level))
        .await?;

    Ok(Json(ApiResponse::success(
        CountResponse { total_items },
        "Assignments counted",
    )))
}

/// A missing assignment is an empty (`null`) payload rather than an error.
pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ApiResponse<Option<Assignment>>>> {
    let id = parse_id(&id)?;
    let assignment: Option<Assignment> = state
        .store
        .find_one(Collection::Assignments, id)
        .await?
        .map(|d| d.decode())
        .transpose()?;

    let message = if assignment.is_some() {
        "Assignment retrieved"
    } else {
        "Assignment not found"
    };
    Ok(Json(ApiResponse::success(assignment, message)))
}

/// Overwrites the editable fields of an assignment, creating it when the id is unknown.
///
/// Existing assignments may only be edited by their publisher. An upserted assignment is
/// published by the requester.
pub async fn update(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<String>,
    Json(fields): Json<AssignmentFields>,
) -> ApiResult<Json<ApiResponse<UpdateAck>>> {
    let id = parse_id(&id)?;
    fields.validate()?;

    let existing = state.store.find_one(Collection::Assignments, id).await?;
    let mut set = to_fields(&fields).map_err(|e| ApiError::Internal(e.to_string()))?;

    match existing {
        Some(doc) => authorize(&identity, &doc.decode::<Assignment>()?)?,
        None => {
            let publisher =
                serde_json::to_value(&identity).map_err(|e| ApiError::Internal(e.to_string()))?;
            set.insert("publisher".into(), publisher);
        }
    }

    let ack = state
        .store
        .update_one(Collection::Assignments, id, set, true)
        .await?;

    Ok(Json(ApiResponse::success(ack, "Assignment updated")))
}

/// Deletes an assignment owned by the requester. Unknown ids are a no-op.
pub async fn delete(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<String>,
) -> ApiResult<Json<ApiResponse<DeleteAck>>> {
    let id = parse_id(&id)?;

    if let Some(doc) = state.store.find_one(Collection::Assignments, id).await? {
        authorize(&identity, &doc.decode::<Assignment>()?)?;
    }

    let ack = state.store.delete_one(Collection::Assignments, id).await?;
    Ok(Json(ApiResponse::success(ack, "Assignment deleted")))
}
