//! Row-level write access.
//!
//! Role checks live in `authorize`; this decides whether the caller may touch
//! a particular row. Personal rows belong to their owner column. Company rows
//! (and rows under a company's jobs) belong to the people who manage that
//! company: its creator and its active recruiters. Admins pass everything.

use serde_json::Value;
use uuid::Uuid;

use super::BatchError;
use crate::auth::{Actor, Role};
use crate::database::entity::{lookup, CompanyLink, EntityDef};
use crate::database::query_builder::{Pins, SelectQuery, WriteOp};
use crate::database::record::Record;
use crate::database::repository::Row;
use crate::database::store::Store;

fn uuid_at(value: Option<&Value>) -> Option<Uuid> {
    value.and_then(Value::as_str).and_then(|s| Uuid::parse_str(s).ok())
}

fn entity(name: &str) -> Result<&'static EntityDef, BatchError> {
    lookup(name).ok_or_else(|| BatchError::NotFound(format!("Unknown entity {}", name)))
}

/// Scope and owner values a single-row write is pinned to
pub fn pins(def: &EntityDef, scope: Option<Uuid>, owner: Option<Uuid>) -> Pins {
    let mut pins = Pins::new();
    if let (Some(column), Some(scope)) = (def.scope, scope) {
        pins.push((column, Value::String(scope.to_string())));
    }
    if let (Some(column), Some(owner)) = (def.owner, owner) {
        if def.scope != Some(column) {
            pins.push((column, Value::String(owner.to_string())));
        }
    }
    pins
}

/// Company that owns a job; a missing job is a 404
pub async fn job_company(store: &dyn Store, job_id: Uuid) -> Result<Option<Uuid>, BatchError> {
    let jobs = entity("jobs")?;
    let rows = store.select(&SelectQuery::active(jobs).eq("id", job_id.to_string())).await?;
    match rows.first() {
        Some(job) => Ok(uuid_at(job.get("company_id"))),
        None => Err(BatchError::NotFound(format!("No active job with id {}", job_id))),
    }
}

pub struct Access<'a> {
    store: &'a dyn Store,
    def: &'static EntityDef,
    actor: &'a Actor,
}

impl<'a> Access<'a> {
    pub fn new(store: &'a dyn Store, def: &'static EntityDef, actor: &'a Actor) -> Self {
        Self { store, def, actor }
    }

    fn forbidden(&self) -> BatchError {
        BatchError::Forbidden(format!("Cannot modify {} records you do not own", self.def.label))
    }

    /// Creator of the company, or an active recruiter listed for it
    pub async fn manages_company(&self, company_id: Uuid) -> Result<bool, BatchError> {
        if self.actor.is_admin() {
            return Ok(true);
        }
        if self.actor.role != Role::Recruiter {
            return Ok(false);
        }
        let companies = entity("companies")?;
        let rows = self
            .store
            .select(&SelectQuery::active(companies).eq("id", company_id.to_string()))
            .await?;
        let Some(company) = rows.first() else {
            return Err(BatchError::NotFound(format!("No active company with id {}", company_id)));
        };
        if uuid_at(company.get("created_by")) == Some(self.actor.id) {
            return Ok(true);
        }

        let recruiters = entity("recruiters")?;
        let members = self
            .store
            .select(
                &SelectQuery::active(recruiters)
                    .eq("company_id", company_id.to_string())
                    .eq("user_id", self.actor.id.to_string()),
            )
            .await?;
        Ok(!members.is_empty())
    }

    /// Whether the caller manages the company a scope value points at
    async fn manages_scope(&self, scope: Option<Uuid>) -> Result<bool, BatchError> {
        let company = match (self.def.company, scope) {
            (CompanyLink::Scope, Some(company)) => Some(company),
            (CompanyLink::Job, Some(job)) => job_company(self.store, job).await?,
            _ => None,
        };
        match company {
            Some(company) => self.manages_company(company).await,
            None => Ok(false),
        }
    }

    /// May the caller write a row with this id, owner and scope? `row_id` is
    /// `None` for rows that do not exist yet.
    pub async fn check(&self, row_id: Option<Uuid>, owner: Option<Uuid>, scope: Option<Uuid>) -> Result<(), BatchError> {
        if self.actor.is_admin() {
            return Ok(());
        }
        if self.def.owner.is_some() && owner == Some(self.actor.id) {
            return Ok(());
        }
        let allowed = match self.def.company {
            CompanyLink::None => self.def.owner.is_none(),
            CompanyLink::Itself => match row_id {
                Some(id) => self.manages_company(id).await?,
                None => true,
            },
            CompanyLink::Scope | CompanyLink::Job => self.manages_scope(scope).await?,
        };
        if allowed {
            Ok(())
        } else {
            Err(self.forbidden())
        }
    }

    fn value_of(&self, row: &Row, column: Option<&'static str>) -> Option<Uuid> {
        column.and_then(|c| uuid_at(row.get(c)))
    }

    /// Check an existing row and return the pins that keep the write on it
    pub async fn check_row(&self, row: &Row) -> Result<Pins, BatchError> {
        let id = uuid_at(row.get("id"));
        let owner = self.value_of(row, self.def.owner);
        let scope = self.value_of(row, self.def.scope);
        self.check(id, owner, scope).await?;
        Ok(pins(self.def, scope, owner))
    }

    /// Check the values a validated record would leave behind. Columns the
    /// record omits keep the existing row's values.
    pub async fn check_record(&self, record: &Record, existing: Option<&Row>) -> Result<(), BatchError> {
        let value = |column: Option<&'static str>| {
            column.and_then(|c| match record.get(c) {
                Some(v) => uuid_at(Some(v)),
                None => existing.and_then(|row| uuid_at(row.get(c))),
            })
        };
        let id = existing.and_then(|row| uuid_at(row.get("id")));
        self.check(id, value(self.def.owner), value(self.def.scope)).await
    }

    /// Owner every row of a batch must carry, or `None` when the caller may
    /// write any row in the scope
    pub async fn batch_owner(&self, scope: Option<Uuid>) -> Result<Option<Uuid>, BatchError> {
        if self.actor.is_admin() {
            return Ok(None);
        }
        let open = match self.def.company {
            CompanyLink::None => self.def.owner.is_none(),
            // existing companies are checked one by one in check_targets
            CompanyLink::Itself => true,
            CompanyLink::Scope | CompanyLink::Job => self.manages_scope(scope).await?,
        };
        if open {
            return Ok(None);
        }
        match self.def.owner {
            Some(column) if self.def.scope == Some(column) && scope != Some(self.actor.id) => Err(self.forbidden()),
            Some(_) => Ok(Some(self.actor.id)),
            None => Err(self.forbidden()),
        }
    }

    /// Companies are their own scope, so every existing one a batch touches
    /// is checked on its own
    pub async fn check_targets(&self, ops: &[WriteOp]) -> Result<(), BatchError> {
        if self.def.company != CompanyLink::Itself || self.actor.is_admin() {
            return Ok(());
        }
        for op in ops {
            if let WriteOp::Update { id, .. } | WriteOp::SoftDelete { id, .. } = op {
                if !self.manages_company(*id).await? {
                    return Err(self.forbidden());
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::record::RecordMode;
    use crate::database::repository::Repository;
    use crate::testing::MemoryStore;
    use serde_json::json;
    use std::sync::Arc;

    fn actor(role: Role) -> Actor {
        Actor { id: Uuid::new_v4(), role }
    }

    async fn create(store: &Arc<MemoryStore>, name: &str, input: Value, by: &Actor) -> Row {
        let repo = Repository::new(lookup(name).unwrap(), store.clone());
        let record = Record::parse(repo.def(), &input, RecordMode::Create).unwrap();
        repo.create_one(record, by.id).await.unwrap()
    }

    fn id(row: &Row) -> Uuid {
        Uuid::parse_str(row["id"].as_str().unwrap()).unwrap()
    }

    #[tokio::test]
    async fn company_is_managed_by_creator_and_listed_recruiters() {
        let store = Arc::new(MemoryStore::new());
        let (owner, member, outsider) = (actor(Role::Recruiter), actor(Role::Recruiter), actor(Role::Recruiter));
        let company = id(&create(&store, "companies", json!({ "name": "Acme" }), &owner).await);
        create(
            &store,
            "recruiters",
            json!({ "company_id": company.to_string(), "user_id": member.id.to_string() }),
            &owner,
        )
        .await;

        let jobs = lookup("jobs").unwrap();
        for who in [&owner, &member] {
            assert!(Access::new(store.as_ref(), jobs, who).manages_company(company).await.unwrap());
        }
        let access = Access::new(store.as_ref(), jobs, &outsider);
        assert!(!access.manages_company(company).await.unwrap());
        assert!(matches!(access.check(None, None, Some(company)).await, Err(BatchError::Forbidden(_))));
        assert!(matches!(
            access.manages_company(Uuid::new_v4()).await,
            Err(BatchError::NotFound(_))
        ));

        let admin = actor(Role::Admin);
        assert!(Access::new(store.as_ref(), jobs, &admin).check(None, None, Some(company)).await.is_ok());
    }

    #[tokio::test]
    async fn applications_belong_to_their_candidate() {
        let store = Arc::new(MemoryStore::new());
        let recruiter = actor(Role::Recruiter);
        let company = id(&create(&store, "companies", json!({ "name": "Acme" }), &recruiter).await);
        let job = create(
            &store,
            "jobs",
            json!({ "company_id": company.to_string(), "title": "Dev", "description": "Ship it" }),
            &recruiter,
        )
        .await;
        let (ada, bob) = (actor(Role::Candidate), actor(Role::Candidate));
        let application = create(
            &store,
            "applications",
            json!({ "job_id": job["id"], "candidate_id": ada.id.to_string() }),
            &ada,
        )
        .await;

        let applications = lookup("applications").unwrap();
        let pinned = Access::new(store.as_ref(), applications, &ada).check_row(&application).await.unwrap();
        assert_eq!(
            pinned,
            vec![("job_id", job["id"].clone()), ("candidate_id", json!(ada.id.to_string()))]
        );
        assert!(matches!(
            Access::new(store.as_ref(), applications, &bob).check_row(&application).await,
            Err(BatchError::Forbidden(_))
        ));
        // the hiring company can move an application along
        assert!(Access::new(store.as_ref(), applications, &recruiter).check_row(&application).await.is_ok());

        let hijack = Record::parse(applications, &json!({ "candidate_id": bob.id.to_string() }), RecordMode::Patch).unwrap();
        assert!(matches!(
            Access::new(store.as_ref(), applications, &ada).check_record(&hijack, Some(&application)).await,
            Err(BatchError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn batch_owner_narrows_outsiders_to_their_own_rows() {
        let store = Arc::new(MemoryStore::new());
        let recruiter = actor(Role::Recruiter);
        let company = id(&create(&store, "companies", json!({ "name": "Acme" }), &recruiter).await);
        let job = create(
            &store,
            "jobs",
            json!({ "company_id": company.to_string(), "title": "Dev", "description": "Ship it" }),
            &recruiter,
        )
        .await;
        let job = Some(id(&job));
        let candidate = actor(Role::Candidate);

        let applications = lookup("applications").unwrap();
        assert_eq!(Access::new(store.as_ref(), applications, &recruiter).batch_owner(job).await.unwrap(), None);
        assert_eq!(
            Access::new(store.as_ref(), applications, &candidate).batch_owner(job).await.unwrap(),
            Some(candidate.id)
        );

        let certificates = lookup("certificates").unwrap();
        let access = Access::new(store.as_ref(), certificates, &candidate);
        assert_eq!(access.batch_owner(Some(candidate.id)).await.unwrap(), Some(candidate.id));
        assert!(matches!(access.batch_owner(Some(Uuid::new_v4())).await, Err(BatchError::Forbidden(_))));

        let questions = lookup("questions").unwrap();
        let outsider = actor(Role::Recruiter);
        assert!(matches!(
            Access::new(store.as_ref(), questions, &outsider).batch_owner(job).await,
            Err(BatchError::Forbidden(_))
        ));
    }

    #[test]
    fn pins_skip_an_owner_that_is_the_scope() {
        let owner = Uuid::new_v4();
        let links = lookup("links").unwrap();
        assert_eq!(pins(links, Some(owner), Some(owner)), vec![("user_id", json!(owner.to_string()))]);
        assert!(pins(lookup("skills").unwrap(), None, None).is_empty());
    }
}
