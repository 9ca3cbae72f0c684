// handlers/protected/jobs.rs - Action lists for a job's skills and questions

use axum::{
    body::Bytes,
    extract::{Extension, Path, State},
};

use super::data::utils::parse_body;
use crate::auth::Actor;
use crate::batch::{actions::JobAction, execute_actions, ActionOutcome, QuestionAction, SkillAction};
use crate::database::record::parse_id;
use crate::middleware::{ApiResponse, ApiResult};
use crate::routes::AppState;

async fn apply<A: JobAction>(state: &AppState, actor: &Actor, id: &str, body: &Bytes) -> ApiResult<ActionOutcome> {
    let job_id = parse_id(id)?;
    let input = parse_body(body)?;
    let outcome = execute_actions::<A>(state.store.as_ref(), job_id, &input, actor).await?;
    Ok(ApiResponse::success(outcome))
}

/// PUT /api/v1/jobs/:id/skills - Apply `add`/`update`/`delete`/`replace` skill actions
pub async fn skills_put(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
    body: Bytes,
) -> ApiResult<ActionOutcome> {
    apply::<SkillAction>(&state, &actor, &id, &body).await
}

/// PUT /api/v1/jobs/:id/questions - Same action list shape for screening questions
pub async fn questions_put(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
    body: Bytes,
) -> ApiResult<ActionOutcome> {
    apply::<QuestionAction>(&state, &actor, &id, &body).await
}
