//! Ordered action lists against one job's skills or questions.
//!
//! Every action is parsed and checked before anything executes. The plan
//! then runs in a single transaction; `replace` is a delete of the old row
//! followed by an insert of the new one.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::info;
use uuid::Uuid;

use super::access::{job_company, Access};
use super::{authorize, BatchError};
use crate::auth::Actor;
use crate::database::entity::{lookup, EntityDef};
use crate::database::query_builder::WriteOp;
use crate::database::record::FieldErrors;
use crate::database::store::Store;
use crate::types::Operation;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum SkillAction {
    Add {
        skill_id: Uuid,
        level: Option<String>,
    },
    Update {
        skill_id: Uuid,
        level: Option<String>,
    },
    Delete {
        skill_id: Uuid,
    },
    Replace {
        old_skill_id: Uuid,
        skill_id: Uuid,
        level: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum QuestionAction {
    Add {
        question: String,
        is_required: Option<bool>,
    },
    Update {
        question_id: Uuid,
        question: Option<String>,
        is_required: Option<bool>,
    },
    Delete {
        question_id: Uuid,
    },
    Replace {
        old_question_id: Uuid,
        question: String,
        is_required: Option<bool>,
    },
}

/// One kind of job child row driven by an action list
pub trait JobAction: DeserializeOwned {
    /// Route name of the child entity
    const ENTITY: &'static str;

    /// Semantic problems serde cannot express
    fn check(&self) -> Option<String> {
        None
    }

    fn plan(&self, def: &'static EntityDef, job: &Value, actor: &Value, ops: &mut Vec<WriteOp>);
}

fn audit(actor: &Value, created: bool) -> Map<String, Value> {
    let mut values = Map::new();
    if created {
        values.insert("created_by".to_string(), actor.clone());
    }
    values.insert("updated_by".to_string(), actor.clone());
    values
}

fn uuid_value(id: &Uuid) -> Value {
    Value::String(id.to_string())
}

impl JobAction for SkillAction {
    const ENTITY: &'static str = "job-skills";

    fn check(&self) -> Option<String> {
        match self {
            SkillAction::Update { level: None, .. } => Some("update needs a level".to_string()),
            _ => None,
        }
    }

    fn plan(&self, def: &'static EntityDef, job: &Value, actor: &Value, ops: &mut Vec<WriteOp>) {
        let insert = |skill_id: &Uuid, level: &Option<String>| {
            let mut values = audit(actor, true);
            values.insert("job_id".to_string(), job.clone());
            values.insert("skill_id".to_string(), uuid_value(skill_id));
            if let Some(level) = level {
                values.insert("level".to_string(), Value::String(level.clone()));
            }
            WriteOp::Insert { def, values, upsert: true }
        };
        let matching = |skill_id: &Uuid| vec![("job_id", job.clone()), ("skill_id", uuid_value(skill_id))];

        match self {
            SkillAction::Add { skill_id, level } => ops.push(insert(skill_id, level)),
            SkillAction::Update { skill_id, level } => {
                let mut values = audit(actor, false);
                if let Some(level) = level {
                    values.insert("level".to_string(), Value::String(level.clone()));
                }
                ops.push(WriteOp::UpdateMatching { def, matching: matching(skill_id), values });
            }
            SkillAction::Delete { skill_id } => ops.push(WriteOp::DeleteMatching { def, matching: matching(skill_id) }),
            SkillAction::Replace { old_skill_id, skill_id, level } => {
                ops.push(WriteOp::DeleteMatching { def, matching: matching(old_skill_id) });
                ops.push(insert(skill_id, level));
            }
        }
    }
}

impl JobAction for QuestionAction {
    const ENTITY: &'static str = "questions";

    fn check(&self) -> Option<String> {
        match self {
            QuestionAction::Add { question, .. } | QuestionAction::Replace { question, .. } if question.trim().is_empty() => {
                Some("question cannot be empty".to_string())
            }
            QuestionAction::Update { question: Some(q), .. } if q.trim().is_empty() => {
                Some("question cannot be empty".to_string())
            }
            QuestionAction::Update { question: None, is_required: None, .. } => {
                Some("update needs question or is_required".to_string())
            }
            _ => None,
        }
    }

    fn plan(&self, def: &'static EntityDef, job: &Value, actor: &Value, ops: &mut Vec<WriteOp>) {
        let insert = |question: &str, is_required: &Option<bool>| {
            let mut values = audit(actor, true);
            values.insert("job_id".to_string(), job.clone());
            values.insert("question".to_string(), Value::String(question.trim().to_string()));
            values.insert("is_required".to_string(), Value::Bool(is_required.unwrap_or(false)));
            WriteOp::Insert { def, values, upsert: false }
        };
        let matching = |id: &Uuid| vec![("job_id", job.clone()), ("id", uuid_value(id))];

        match self {
            QuestionAction::Add { question, is_required } => ops.push(insert(question, is_required)),
            QuestionAction::Update { question_id, question, is_required } => {
                let mut values = audit(actor, false);
                if let Some(question) = question {
                    values.insert("question".to_string(), Value::String(question.trim().to_string()));
                }
                if let Some(is_required) = is_required {
                    values.insert("is_required".to_string(), Value::Bool(*is_required));
                }
                ops.push(WriteOp::UpdateMatching { def, matching: matching(question_id), values });
            }
            QuestionAction::Delete { question_id } => {
                ops.push(WriteOp::DeleteMatching { def, matching: matching(question_id) })
            }
            QuestionAction::Replace { old_question_id, question, is_required } => {
                ops.push(WriteOp::DeleteMatching { def, matching: matching(old_question_id) });
                ops.push(insert(question, is_required));
            }
        }
    }
}

/// Accepts a bare array or `{ "actions": [...] }`
pub fn parse_actions<A: JobAction>(body: &Value) -> Result<Vec<A>, FieldErrors> {
    let mut errors = FieldErrors::new();
    let items = match body {
        Value::Array(items) => items,
        Value::Object(map) => match map.get("actions") {
            Some(Value::Array(items)) => items,
            _ => {
                errors.insert("actions".to_string(), "Expected an array of actions".to_string());
                return Err(errors);
            }
        },
        _ => {
            errors.insert("actions".to_string(), "Expected an array of actions".to_string());
            return Err(errors);
        }
    };

    let mut actions = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        match A::deserialize(item) {
            Ok(action) => match action.check() {
                None => actions.push(action),
                Some(msg) => {
                    errors.insert(format!("actions[{}]", index), msg);
                }
            },
            Err(e) => {
                errors.insert(format!("actions[{}]", index), e.to_string());
            }
        }
    }

    if errors.is_empty() {
        Ok(actions)
    } else {
        Err(errors)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ActionResult {
    /// Index of the action that produced this operation
    pub action: usize,
    pub operation: Operation,
    pub rows: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ActionOutcome {
    pub job_id: Uuid,
    pub total: usize,
    pub results: Vec<ActionResult>,
}

/// Apply an action list to one job's skills (`SkillAction`) or questions (`QuestionAction`)
pub async fn execute_actions<A: JobAction>(
    store: &dyn Store,
    job_id: Uuid,
    body: &Value,
    actor: &Actor,
) -> Result<ActionOutcome, BatchError> {
    let def = lookup(A::ENTITY).ok_or_else(|| BatchError::NotFound(format!("Unknown entity {}", A::ENTITY)))?;
    authorize(def, actor)?;
    let actions = parse_actions::<A>(body).map_err(BatchError::Invalid)?;

    let manages = match job_company(store, job_id).await? {
        Some(company) => Access::new(store, def, actor).manages_company(company).await?,
        None => actor.is_admin(),
    };
    if !manages {
        return Err(BatchError::Forbidden(format!("Cannot modify {} records of job {}", def.label, job_id)));
    }

    let job_value = uuid_value(&job_id);
    let actor_value = uuid_value(&actor.id);
    let mut ops = Vec::new();
    let mut origins = Vec::new();
    for (index, action) in actions.iter().enumerate() {
        let before = ops.len();
        action.plan(def, &job_value, &actor_value, &mut ops);
        origins.extend(std::iter::repeat(index).take(ops.len() - before));
    }

    let results = if ops.is_empty() { Vec::new() } else { store.transact(&ops).await? };
    info!("{} action(s) applied to {} of job {}", actions.len(), def.table, job_id);

    let results: Vec<ActionResult> = results
        .into_iter()
        .zip(origins)
        .map(|(result, action)| ActionResult {
            action,
            operation: result.operation,
            rows: result.rows,
        })
        .collect();
    Ok(ActionOutcome {
        job_id,
        total: results.len(),
        results,
    })
}
