use axum::{
    Extension, Json,
    extract::{Path, State},
};
use validator::Validate;

use crate::{
    database::{Collection, Filter, InsertAck, UpdateAck, to_fields},
    endpoints::parse_id,
    error::{ApiError, ApiResult},
    model::{
        api_response::ApiResponse,
        identity::Identity,
        submission::{Grade, NewSubmission, Submission, SubmissionStatus},
    },
    security::{authorize, authorize_owner},
    state::AppState,
};

/// Documents that no longer decode are logged and left out rather than failing the list.
async fn find_submissions(state: &AppState, filter: Filter) -> ApiResult<Vec<Submission>> {
    let docs = state.store.find(Collection::Submitted, &filter, None).await?;
    Ok(docs
        .into_iter()
        .filter_map(|d| match d.decode::<Submission>() {
            Ok(submission) => Some(submission),
            Err(e) => {
                tracing::warn!("Skipping submission: {e}");
                None
            }
        })
        .collect())
}

/// Hands in work for grading. Every submission starts out pending.
pub async fn create(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(mut submission): Json<NewSubmission>,
) -> ApiResult<Json<ApiResponse<InsertAck>>> {
    submission.validate()?;
    authorize(&identity, &submission)?;

    submission.clear_grade();
    let body = to_fields(&submission).map_err(|e| ApiError::Internal(e.to_string()))?;
    let ack = state.store.insert_one(Collection::Submitted, body).await?;

    tracing::info!("Submission {} handed in by {}", ack.inserted_id, identity.email);
    Ok(Json(ApiResponse::success(ack, "Submission created")))
}

pub async fn list_pending(
    State(state): State<AppState>,
) -> ApiResult<Json<ApiResponse<Vec<Submission>>>> {
    let filter = Filter::all().eq("status", SubmissionStatus::Pending.as_str());
    let submissions = find_submissions(&state, filter).await?;
    Ok(Json(ApiResponse::success(submissions, "Pending submissions retrieved")))
}

/// Every submission of one examinee. Examinees may only list their own.
pub async fn list_by_examinee(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(email): Path<String>,
) -> ApiResult<Json<ApiResponse<Vec<Submission>>>> {
    authorize_owner(&identity, &email)?;

    let submissions = find_submissions(&state, Filter::all().eq("examinee.email", email)).await?;
    Ok(Json(ApiResponse::success(submissions, "Submissions retrieved")))
}

/// Records the examiner's grade. Only the grading fields are written; unknown ids are a no-op.
pub async fn grade(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<String>,
    Json(grade): Json<Grade>,
) -> ApiResult<Json<ApiResponse<UpdateAck>>> {
    let id = parse_id(&id)?;
    grade.validate()?;
    authorize(&identity, &grade)?;

    let set = to_fields(&grade).map_err(|e| ApiError::Internal(e.to_string()))?;
    let ack = state
        .store
        .update_one(Collection::Submitted, id, set, false)
        .await?;

    if ack.matched_count == 0 {
        tracing::warn!("Grade for unknown submission {id} dropped");
    }
    Ok(Json(ApiResponse::success(ack, "Submission graded")))
}
