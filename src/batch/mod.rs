//! Batch reconciliation.
//!
//! A batch names one parent scope and three lists (`new_<items>`,
//! `updated_<items>`, `deleted_<items>`). Every item is validated before
//! anything runs; the resulting write plan executes in one transaction.

pub mod access;
pub mod actions;

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::auth::Actor;
use crate::database::entity::EntityDef;
use crate::database::manager::DatabaseError;
use crate::database::query_builder::WriteOp;
use crate::database::record::{FieldErrors, Record, RecordMode};
use crate::database::repository::{insert_op, update_op};
use crate::database::store::Store;
use crate::types::Operation;

pub use access::Access;
pub use actions::{execute_actions, ActionOutcome, QuestionAction, SkillAction};

#[derive(Debug, Error)]
pub enum BatchError {
    #[error("Invalid batch payload")]
    Invalid(FieldErrors),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Transaction failed: {0}")]
    Transaction(#[from] DatabaseError),
}

impl BatchError {
    fn field(path: impl Into<String>, message: impl Into<String>) -> Self {
        let mut errors = FieldErrors::new();
        errors.insert(path.into(), message.into());
        BatchError::Invalid(errors)
    }
}

/// The three reconciliation lists for one parent scope, still unvalidated
#[derive(Debug, Clone, Default)]
pub struct BatchActionSet {
    pub scope: Option<Uuid>,
    pub created: Vec<Value>,
    pub updated: Vec<Value>,
    pub deleted: Vec<Value>,
}

impl BatchActionSet {
    /// Read the payload shape: `{ <scope>?, new_<items>?, updated_<items>?, deleted_<items>? }`
    pub fn from_json(def: &EntityDef, body: &Value) -> Result<Self, FieldErrors> {
        let mut errors = FieldErrors::new();
        let Value::Object(map) = body else {
            errors.insert(String::new(), "Expected a JSON object".to_string());
            return Err(errors);
        };

        let key = def.batch_key();
        let (new_key, updated_key, deleted_key) =
            (format!("new_{}", key), format!("updated_{}", key), format!("deleted_{}", key));
        let mut set = BatchActionSet::default();

        for (field, value) in map {
            let list = if *field == new_key {
                &mut set.created
            } else if *field == updated_key {
                &mut set.updated
            } else if *field == deleted_key {
                &mut set.deleted
            } else if Some(field.as_str()) == def.scope {
                match value.as_str().and_then(|s| Uuid::parse_str(s).ok()) {
                    Some(id) => set.scope = Some(id),
                    None if value.is_null() => {}
                    None => {
                        errors.insert(field.clone(), format!("Invalid UUID format: {}", value));
                    }
                }
                continue;
            } else {
                errors.insert(field.clone(), format!("Unknown batch field for {}", def.label));
                continue;
            };
            match value {
                Value::Array(items) => *list = items.clone(),
                Value::Null => {}
                _ => {
                    errors.insert(field.clone(), "Expected an array".to_string());
                }
            }
        }

        if errors.is_empty() {
            Ok(set)
        } else {
            Err(errors)
        }
    }

    pub fn is_empty(&self) -> bool {
        self.created.is_empty() && self.updated.is_empty() && self.deleted.is_empty()
    }
}

/// Parent scope for a write; user-scoped entities default to the actor
pub fn resolve_scope(def: &EntityDef, explicit: Option<Uuid>, actor: &Actor) -> Result<Option<Uuid>, BatchError> {
    let Some(column) = def.scope else {
        return Ok(None);
    };
    match explicit {
        Some(id) => Ok(Some(id)),
        None if def.is_user_scoped() => Ok(Some(actor.id)),
        None => Err(BatchError::field(column, "This field is required")),
    }
}

pub fn authorize(def: &EntityDef, actor: &Actor) -> Result<(), BatchError> {
    if def.can_write(actor.role) {
        Ok(())
    } else {
        Err(BatchError::Forbidden(format!(
            "Role '{}' cannot modify {} records",
            actor.role.as_str(),
            def.label
        )))
    }
}

/// Fill `column` on items that omit it; flag items that name another value
fn fill_column(items: &mut [Value], column: &str, value: Uuid, prefix: &str, message: &str, errors: &mut FieldErrors) {
    let value_str = value.to_string();
    for (index, item) in items.iter_mut().enumerate() {
        let Value::Object(map) = item else { continue };
        match map.get(column) {
            None | Some(Value::Null) => {
                map.insert(column.to_string(), Value::String(value_str.clone()));
            }
            Some(given) => {
                if given.as_str().and_then(|s| Uuid::parse_str(s).ok()) != Some(value) {
                    errors.insert(format!("{}[{}].{}", prefix, index, column), message.to_string());
                }
            }
        }
    }
}

/// Batch items with the scope and owner filled in
fn prepare(def: &EntityDef, items: &[Value], scope: Option<Uuid>, owner: Option<Uuid>, prefix: &str, errors: &mut FieldErrors) -> Vec<Value> {
    let mut items = items.to_vec();
    if let (Some(column), Some(scope)) = (def.scope, scope) {
        fill_column(&mut items, column, scope, prefix, "Does not match the batch scope", errors);
    }
    if let (Some(column), Some(owner)) = (def.owner, owner) {
        if def.scope != Some(column) {
            fill_column(&mut items, column, owner, prefix, "Cannot act for another user", errors);
        }
    }
    items
}

fn deleted_id(value: &Value) -> Option<Uuid> {
    let raw = match value {
        Value::String(s) => s.as_str(),
        Value::Object(map) => map.get("id")?.as_str()?,
        _ => return None,
    };
    Uuid::parse_str(raw).ok()
}

/// Validate every item and compile the write plan. Field errors from all
/// three lists are reported together. With an `owner`, every row the batch
/// touches must belong to that user.
pub fn plan(
    def: &'static EntityDef,
    set: &BatchActionSet,
    scope: Option<Uuid>,
    owner: Option<Uuid>,
    actor: &Actor,
) -> Result<Vec<WriteOp>, FieldErrors> {
    let key = def.batch_key();
    let mut errors = FieldErrors::new();

    let new_prefix = format!("new_{}", key);
    let created = prepare(def, &set.created, scope, owner, &new_prefix, &mut errors);
    let created = Record::parse_many(def, &created, RecordMode::Create, &new_prefix, &mut errors);

    let updated_prefix = format!("updated_{}", key);
    let updated = prepare(def, &set.updated, scope, owner, &updated_prefix, &mut errors);
    let updated = Record::parse_many(def, &updated, RecordMode::Replace, &updated_prefix, &mut errors);

    let mut deleted = Vec::with_capacity(set.deleted.len());
    for (index, value) in set.deleted.iter().enumerate() {
        match deleted_id(value) {
            // a repeated id is deleted once
            Some(id) if deleted.contains(&id) => {}
            Some(id) => deleted.push(id),
            None => {
                errors.insert(format!("deleted_{}[{}]", key, index), format!("Invalid UUID format: {}", value));
            }
        }
    }

    if !errors.is_empty() {
        return Err(errors);
    }

    let pins = access::pins(def, scope, owner);
    let mut ops = Vec::with_capacity(created.len() + updated.len() + deleted.len());
    ops.extend(created.into_iter().map(|record| insert_op(def, record, actor.id)));
    for record in updated {
        if let Some(id) = record.id {
            ops.push(update_op(def, id, pins.clone(), record, actor.id));
        }
    }
    ops.extend(deleted.into_iter().map(|id| WriteOp::SoftDelete {
        def,
        id,
        pins: pins.clone(),
        actor: actor.id,
    }));
    Ok(ops)
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchOutcome {
    pub updated: usize,
    pub created: usize,
    pub deleted: usize,
    pub total: usize,
    pub records: Vec<Map<String, Value>>,
}

/// Validate, plan and apply one batch for `def`
pub async fn execute(store: &dyn Store, def: &'static EntityDef, body: &Value, actor: &Actor) -> Result<BatchOutcome, BatchError> {
    authorize(def, actor)?;
    let set = BatchActionSet::from_json(def, body).map_err(BatchError::Invalid)?;
    if set.is_empty() {
        return Ok(BatchOutcome::default());
    }

    let scope = resolve_scope(def, set.scope, actor)?;
    let access = Access::new(store, def, actor);
    let owner = access.batch_owner(scope).await?;
    let ops = plan(def, &set, scope, owner, actor).map_err(BatchError::Invalid)?;
    access.check_targets(&ops).await?;
    let results = store.transact(&ops).await?;

    let mut outcome = BatchOutcome::default();
    for result in results {
        match result.operation {
            Operation::Create => outcome.created += 1,
            Operation::Update => outcome.updated += 1,
            Operation::Delete => outcome.deleted += 1,
        }
        if result.operation != Operation::Delete {
            outcome.records.extend(result.record);
        }
    }
    outcome.total = outcome.created + outcome.updated + outcome.deleted;
    info!(
        "Batch on {}: {} created, {} updated, {} deleted",
        def.table, outcome.created, outcome.updated, outcome.deleted
    );
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;
    use crate::database::entity::lookup;
    use crate::testing::MemoryStore;
    use serde_json::json;

    fn candidate() -> Actor {
        Actor { id: Uuid::new_v4(), role: Role::Candidate }
    }

    fn certificates() -> &'static EntityDef {
        lookup("certificates").unwrap()
    }

    fn row_id(row: &Map<String, Value>) -> String {
        row["id"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn empty_payload_writes_nothing() {
        let store = MemoryStore::new();
        let actor = candidate();
        for body in [json!({}), json!({ "new_certificates": [], "updated_certificates": [], "deleted_certificates": [] })] {
            let outcome = execute(&store, certificates(), &body, &actor).await.unwrap();
            assert_eq!((outcome.updated, outcome.created, outcome.deleted, outcome.total), (0, 0, 0, 0));
        }
        assert_eq!(store.committed_ops(), 0);
    }

    #[tokio::test]
    async fn creates_one_row_per_new_item() {
        let store = MemoryStore::new();
        let actor = candidate();
        let items: Vec<Value> = (0..5).map(|i| json!({ "title": format!("Cert {}", i), "issuer": "AWS" })).collect();
        let outcome = execute(&store, certificates(), &json!({ "new_certificates": items }), &actor)
            .await
            .unwrap();
        assert_eq!(outcome.created, 5);
        assert_eq!(outcome.total, 5);
        let rows = store.rows("certificates");
        assert_eq!(rows.len(), 5);
        assert!(rows.iter().all(|r| r["user_id"] == json!(actor.id.to_string())));
        assert!(rows.iter().all(|r| r["created_by"] == json!(actor.id.to_string())));
    }

    #[tokio::test]
    async fn missing_title_rejects_the_whole_batch() {
        let store = MemoryStore::new();
        let actor = candidate();
        let body = json!({
            "new_certificates": [
                { "title": "CKA" },
                { "issuer": "CNCF" },
                { "title": "CKAD" },
            ]
        });
        match execute(&store, certificates(), &body, &actor).await {
            Err(BatchError::Invalid(errors)) => {
                assert_eq!(errors.len(), 1);
                assert!(errors.contains_key("new_certificates[1].title"));
            }
            other => panic!("expected validation failure, got {:?}", other),
        }
        assert!(store.rows("certificates").is_empty());
        assert_eq!(store.committed_ops(), 0);
    }

    #[tokio::test]
    async fn errors_from_every_list_are_reported_together() {
        let store = MemoryStore::new();
        let body = json!({
            "new_certificates": [{ "issuer": "x" }],
            "updated_certificates": [{ "title": "no id" }],
            "deleted_certificates": ["not-a-uuid"],
            "certificate": [],
        });
        let Err(BatchError::Invalid(errors)) = execute(&store, certificates(), &body, &candidate()).await else {
            panic!("expected validation failure");
        };
        // unknown top-level keys are caught before item validation
        assert!(errors.contains_key("certificate"));

        let body = json!({
            "new_certificates": [{ "issuer": "x" }],
            "updated_certificates": [{ "title": "no id" }],
            "deleted_certificates": ["not-a-uuid"],
        });
        let Err(BatchError::Invalid(errors)) = execute(&store, certificates(), &body, &candidate()).await else {
            panic!("expected validation failure");
        };
        assert!(errors.contains_key("new_certificates[0].title"));
        assert!(errors.contains_key("updated_certificates[0].id"));
        assert!(errors.contains_key("deleted_certificates[0]"));
    }

    #[tokio::test]
    async fn foreign_ids_abort_the_batch_atomically() {
        let store = MemoryStore::new();
        let owner = candidate();
        let other = candidate();

        let mine = execute(&store, certificates(), &json!({ "new_certificates": [{ "title": "Mine" }] }), &owner)
            .await
            .unwrap();
        let theirs = execute(&store, certificates(), &json!({ "new_certificates": [{ "title": "Theirs" }] }), &other)
            .await
            .unwrap();
        let before = store.rows("certificates");
        let committed = store.committed_ops();

        let body = json!({
            "new_certificates": [{ "title": "Extra" }],
            "updated_certificates": [
                { "id": row_id(&mine.records[0]), "title": "Mine v2" },
                { "id": row_id(&theirs.records[0]), "title": "Hijacked" },
            ],
        });
        let result = execute(&store, certificates(), &body, &owner).await;
        assert!(matches!(result, Err(BatchError::Transaction(DatabaseError::NotFound(_)))));
        assert_eq!(store.rows("certificates"), before);
        assert_eq!(store.committed_ops(), committed);
    }

    #[tokio::test]
    async fn updates_and_deletes_within_scope() {
        let store = MemoryStore::new();
        let actor = candidate();
        let seeded = execute(
            &store,
            certificates(),
            &json!({ "new_certificates": [{ "title": "A" }, { "title": "B" }] }),
            &actor,
        )
        .await
        .unwrap();
        let (a, b) = (row_id(&seeded.records[0]), row_id(&seeded.records[1]));

        let body = json!({
            "user_id": actor.id.to_string(),
            "updated_certificates": [{ "id": a, "title": "A+", "issuer": "Linux Foundation" }],
            "deleted_certificates": [b.clone()],
        });
        let outcome = execute(&store, certificates(), &body, &actor).await.unwrap();
        assert_eq!((outcome.updated, outcome.created, outcome.deleted, outcome.total), (1, 0, 1, 2));
        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.records[0]["title"], "A+");

        let rows = store.rows("certificates");
        let deleted = rows.iter().find(|r| r["id"] == json!(b)).unwrap();
        assert_eq!(deleted["is_active"], json!(false));
    }

    #[tokio::test]
    async fn natural_key_collisions_reactivate() {
        let store = MemoryStore::new();
        let actor = candidate();
        let links = lookup("links").unwrap();
        let created = execute(
            &store,
            links,
            &json!({ "new_links": [{ "title": "GitHub", "url": "https://github.com/old" }] }),
            &actor,
        )
        .await
        .unwrap();
        let id = row_id(&created.records[0]);
        execute(&store, links, &json!({ "deleted_links": [id.clone()] }), &actor).await.unwrap();

        let outcome = execute(
            &store,
            links,
            &json!({ "new_links": [{ "title": "GitHub", "url": "https://github.com/new" }] }),
            &actor,
        )
        .await
        .unwrap();
        assert_eq!(outcome.created, 1);
        let rows = store.rows("links");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["id"], json!(id));
        assert_eq!(rows[0]["is_active"], json!(true));
        assert_eq!(rows[0]["url"], "https://github.com/new");
    }

    #[tokio::test]
    async fn scope_and_role_are_enforced() {
        let store = MemoryStore::new();
        let actor = candidate();

        let body = json!({ "user_id": Uuid::new_v4().to_string(), "new_certificates": [{ "title": "X" }] });
        assert!(matches!(
            execute(&store, certificates(), &body, &actor).await,
            Err(BatchError::Forbidden(_))
        ));

        let body = json!({ "new_certificates": [{ "title": "X", "user_id": Uuid::new_v4().to_string() }] });
        let Err(BatchError::Invalid(errors)) = execute(&store, certificates(), &body, &actor).await else {
            panic!("expected scope mismatch");
        };
        assert!(errors.contains_key("new_certificates[0].user_id"));

        let skills = lookup("skills").unwrap();
        assert!(matches!(
            execute(&store, skills, &json!({ "new_skills": [{ "title": "Rust" }] }), &actor).await,
            Err(BatchError::Forbidden(_))
        ));

        let recruiter = Actor { id: Uuid::new_v4(), role: Role::Recruiter };
        let jobs = lookup("jobs").unwrap();
        let body = json!({ "new_jobs": [{ "title": "Dev", "description": "Code" }] });
        let Err(BatchError::Invalid(errors)) = execute(&store, jobs, &body, &recruiter).await else {
            panic!("company-scoped batches need an explicit scope");
        };
        assert!(errors.contains_key("company_id"));
        assert_eq!(store.committed_ops(), 0);
    }

    async fn company_with_job(store: &MemoryStore, recruiter: &Actor) -> (String, String) {
        let company = execute(store, lookup("companies").unwrap(), &json!({ "new_companies": [{ "name": "Acme" }] }), recruiter)
            .await
            .unwrap();
        let company = row_id(&company.records[0]);
        let job = execute(
            store,
            lookup("jobs").unwrap(),
            &json!({ "company_id": company, "new_jobs": [{ "title": "Dev", "description": "Code" }] }),
            recruiter,
        )
        .await
        .unwrap();
        (company, row_id(&job.records[0]))
    }

    #[tokio::test]
    async fn candidates_only_touch_their_own_applications() {
        let store = MemoryStore::new();
        let recruiter = Actor { id: Uuid::new_v4(), role: Role::Recruiter };
        let (_, job) = company_with_job(&store, &recruiter).await;
        let applications = lookup("applications").unwrap();
        let (ada, bob) = (candidate(), candidate());

        let mine = execute(&store, applications, &json!({ "job_id": job, "new_applications": [{}] }), &ada)
            .await
            .unwrap();
        assert_eq!(mine.records[0]["candidate_id"], json!(ada.id.to_string()));
        let application = row_id(&mine.records[0]);

        let body = json!({ "job_id": job, "new_applications": [{ "candidate_id": ada.id.to_string() }] });
        let Err(BatchError::Invalid(errors)) = execute(&store, applications, &body, &bob).await else {
            panic!("applied on someone else's behalf");
        };
        assert!(errors.contains_key("new_applications[0].candidate_id"));

        let before = store.rows("applications");
        for body in [
            json!({ "job_id": job, "updated_applications": [{ "id": application, "status": "withdrawn" }] }),
            json!({ "job_id": job, "deleted_applications": [application] }),
        ] {
            let result = execute(&store, applications, &body, &bob).await;
            assert!(matches!(result, Err(BatchError::Transaction(DatabaseError::NotFound(_)))), "{:?}", result);
        }
        assert_eq!(store.rows("applications"), before);

        // the hiring company manages every application to its jobs
        let body = json!({ "job_id": job, "updated_applications": [{ "id": application, "candidate_id": ada.id.to_string(), "status": "interview" }] });
        let outcome = execute(&store, applications, &body, &recruiter).await.unwrap();
        assert_eq!(outcome.records[0]["status"], "interview");
    }

    #[tokio::test]
    async fn outside_recruiters_cannot_write_another_companys_rows() {
        let store = MemoryStore::new();
        let owner = Actor { id: Uuid::new_v4(), role: Role::Recruiter };
        let outsider = Actor { id: Uuid::new_v4(), role: Role::Recruiter };
        let (company, job) = company_with_job(&store, &owner).await;
        let committed = store.committed_ops();

        let jobs = lookup("jobs").unwrap();
        for body in [
            json!({ "company_id": company, "new_jobs": [{ "title": "Spy", "description": "x" }] }),
            json!({ "company_id": company, "deleted_jobs": [job] }),
        ] {
            assert!(matches!(execute(&store, jobs, &body, &outsider).await, Err(BatchError::Forbidden(_))));
        }
        let questions = lookup("questions").unwrap();
        let body = json!({ "job_id": job, "new_questions": [{ "question": "Why?" }] });
        assert!(matches!(execute(&store, questions, &body, &outsider).await, Err(BatchError::Forbidden(_))));

        let companies = lookup("companies").unwrap();
        let body = json!({ "updated_companies": [{ "id": company, "name": "Taken" }] });
        assert!(matches!(execute(&store, companies, &body, &outsider).await, Err(BatchError::Forbidden(_))));
        assert_eq!(store.committed_ops(), committed);

        // listing the outsider as a recruiter lets them in
        execute(
            &store,
            lookup("recruiters").unwrap(),
            &json!({ "company_id": company, "new_recruiters": [{ "user_id": outsider.id.to_string() }] }),
            &owner,
        )
        .await
        .unwrap();
        let body = json!({ "company_id": company, "new_jobs": [{ "title": "Ops", "description": "x" }] });
        assert_eq!(execute(&store, jobs, &body, &outsider).await.unwrap().created, 1);
    }

    #[tokio::test]
    async fn repeated_deleted_ids_delete_once() {
        let store = MemoryStore::new();
        let actor = candidate();
        let seeded = execute(&store, certificates(), &json!({ "new_certificates": [{ "title": "A" }] }), &actor)
            .await
            .unwrap();
        let id = row_id(&seeded.records[0]);

        let body = json!({ "deleted_certificates": [id.clone(), { "id": id }] });
        let outcome = execute(&store, certificates(), &body, &actor).await.unwrap();
        assert_eq!((outcome.deleted, outcome.total), (1, 1));
        assert_eq!(store.rows("certificates")[0]["is_active"], json!(false));
    }
}
