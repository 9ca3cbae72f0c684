use serde_json::{Map, Value};
use std::sync::Arc;
use uuid::Uuid;

use crate::database::entity::EntityDef;
use crate::database::manager::DatabaseError;
use crate::database::pagination::{Page, PageRequest, PAGE_SIZE};
use crate::database::query_builder::{Pins, SelectQuery, WriteOp};
use crate::database::record::Record;
use crate::database::store::Store;

pub type Row = Map<String, Value>;

/// Generic soft-delete aware repository, one per entity descriptor
pub struct Repository {
    def: &'static EntityDef,
    store: Arc<dyn Store>,
}

impl Repository {
    pub fn new(def: &'static EntityDef, store: Arc<dyn Store>) -> Self {
        Self { def, store }
    }

    pub fn def(&self) -> &'static EntityDef {
        self.def
    }

    fn scoped(&self, scope: Option<Uuid>) -> SelectQuery {
        let query = SelectQuery::active(self.def);
        match (self.def.scope, scope) {
            (Some(column), Some(id)) => query.eq(column, id.to_string()),
            _ => query,
        }
    }

    /// All active rows, optionally narrowed to one parent
    pub async fn select_any(&self, scope: Option<Uuid>) -> Result<Vec<Row>, DatabaseError> {
        self.store.select(&self.scoped(scope)).await
    }

    pub async fn select_one(&self, id: Uuid) -> Result<Option<Row>, DatabaseError> {
        let query = SelectQuery::active(self.def).eq("id", id.to_string());
        Ok(self.store.select(&query).await?.into_iter().next())
    }

    pub async fn select_404(&self, id: Uuid) -> Result<Row, DatabaseError> {
        self.select_one(id)
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("No active {} with id {}", self.def.label, id)))
    }

    /// One page of active rows. A page past the end is `NotFound`.
    pub async fn select_page(&self, request: PageRequest, scope: Option<Uuid>) -> Result<Page<Row>, DatabaseError> {
        let query = self.scoped(scope);
        let total = self.store.count(&query).await?;
        if request.is_beyond(total) {
            return Err(DatabaseError::NotFound(format!("Page {} not found", request.number())));
        }
        let items = self.store.select(&query.limit(PAGE_SIZE, request.offset())).await?;
        Ok(Page::new(items, request, total))
    }

    /// Active rows with `low <= column <= high`, plus their count
    pub async fn select_range(&self, column: &'static str, low: i64, high: i64) -> Result<(Vec<Row>, i64), DatabaseError> {
        let query = SelectQuery::active(self.def).gte(column, low).lte(column, high);
        let total = self.store.count(&query).await?;
        let items = self.store.select(&query).await?;
        Ok((items, total))
    }

    pub async fn create_one(&self, record: Record, actor: Uuid) -> Result<Row, DatabaseError> {
        self.create_all(vec![record], actor)
            .await?
            .pop()
            .ok_or_else(|| DatabaseError::QueryError(format!("Insert into {} returned no row", self.def.table)))
    }

    /// Insert every record in one transaction
    pub async fn create_all(&self, records: Vec<Record>, actor: Uuid) -> Result<Vec<Row>, DatabaseError> {
        let ops: Vec<WriteOp> = records.into_iter().map(|r| insert_op(self.def, r, actor)).collect();
        let results = self.store.transact(&ops).await?;
        Ok(results.into_iter().filter_map(|r| r.record).collect())
    }

    /// Patch one active row that still matches `pins`
    pub async fn update_one(&self, id: Uuid, pins: Pins, record: Record, actor: Uuid) -> Result<Row, DatabaseError> {
        let op = update_op(self.def, id, pins, record, actor);
        self.single(op).await
    }

    pub async fn delete_one(&self, id: Uuid, pins: Pins, actor: Uuid) -> Result<Row, DatabaseError> {
        let op = WriteOp::SoftDelete { def: self.def, id, pins, actor };
        self.single(op).await
    }

    async fn single(&self, op: WriteOp) -> Result<Row, DatabaseError> {
        let missing = crate::database::store::describe_missing(&op);
        self.store
            .transact(std::slice::from_ref(&op))
            .await?
            .pop()
            .and_then(|r| r.record)
            .ok_or(DatabaseError::NotFound(missing))
    }
}

/// Insert with audit columns; entities with a natural key reactivate on collision
pub fn insert_op(def: &'static EntityDef, record: Record, actor: Uuid) -> WriteOp {
    let mut values = record.into_fields();
    values.insert("created_by".to_string(), Value::String(actor.to_string()));
    values.insert("updated_by".to_string(), Value::String(actor.to_string()));
    WriteOp::Insert {
        def,
        values,
        upsert: def.natural_key.is_some(),
    }
}

pub fn update_op(def: &'static EntityDef, id: Uuid, pins: Pins, record: Record, actor: Uuid) -> WriteOp {
    let mut values = record.into_fields();
    values.insert("updated_by".to_string(), Value::String(actor.to_string()));
    WriteOp::Update { def, id, pins, values }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::entity::lookup;
    use crate::database::record::RecordMode;
    use crate::testing::MemoryStore;
    use serde_json::json;

    fn repo(name: &str, store: &Arc<MemoryStore>) -> Repository {
        Repository::new(lookup(name).unwrap(), store.clone())
    }

    fn record(name: &str, input: Value) -> Record {
        Record::parse(lookup(name).unwrap(), &input, RecordMode::Create).unwrap()
    }

    #[tokio::test]
    async fn size_range_returns_companies_within_bounds() {
        let store = Arc::new(MemoryStore::new());
        let companies = repo("companies", &store);
        let actor = Uuid::new_v4();
        let records = vec![
            record("companies", json!({ "name": "Small", "size": 10 })),
            record("companies", json!({ "name": "Large", "size": 60 })),
            record("companies", json!({ "name": "Medium", "size": 25 })),
        ];
        companies.create_all(records, actor).await.unwrap();

        let (items, total) = companies.select_range("size", 0, 50).await.unwrap();
        assert_eq!(total, 2);
        let mut names: Vec<_> = items.iter().map(|r| r["name"].as_str().unwrap().to_string()).collect();
        names.sort();
        assert_eq!(names, vec!["Medium", "Small"]);
    }

    #[tokio::test]
    async fn bulk_created_rows_read_back_unchanged() {
        let store = Arc::new(MemoryStore::new());
        let jobs = repo("jobs", &store);
        let company = Uuid::new_v4().to_string();
        let input = json!({
            "company_id": company,
            "title": "Backend Engineer",
            "description": "Build APIs",
            "salary_min": 90000,
            "tags": ["rust", "sql"],
        });
        let created = jobs.create_all(vec![record("jobs", input.clone())], Uuid::new_v4()).await.unwrap();
        let id = Uuid::parse_str(created[0]["id"].as_str().unwrap()).unwrap();

        let fetched = jobs.select_404(id).await.unwrap();
        for (key, value) in input.as_object().unwrap() {
            assert_eq!(&fetched[key], value, "field {}", key);
        }
    }

    #[tokio::test]
    async fn pages_are_fixed_size_and_empty_page_is_not_found() {
        let store = Arc::new(MemoryStore::new());
        let skills = repo("skills", &store);
        assert!(matches!(
            skills.select_page(PageRequest::parse("1").unwrap(), None).await,
            Err(DatabaseError::NotFound(_))
        ));

        let records = (0..23).map(|i| record("skills", json!({ "title": format!("skill-{:02}", i) }))).collect();
        skills.create_all(records, Uuid::new_v4()).await.unwrap();

        let page = skills.select_page(PageRequest::parse("3").unwrap(), None).await.unwrap();
        assert_eq!(page.items.len(), 3);
        assert_eq!(page.total, 23);
        assert_eq!(page.total_pages, 3);
        assert!(skills.select_page(PageRequest::parse("4").unwrap(), None).await.is_err());
    }

    #[tokio::test]
    async fn soft_deleted_rows_disappear_from_reads() {
        let store = Arc::new(MemoryStore::new());
        let links = repo("links", &store);
        let user = Uuid::new_v4();
        let row = links
            .create_one(record("links", json!({ "user_id": user.to_string(), "title": "Blog", "url": "https://b.log" })), user)
            .await
            .unwrap();
        let id = Uuid::parse_str(row["id"].as_str().unwrap()).unwrap();

        let pin = |owner: Uuid| vec![("user_id", json!(owner.to_string()))];
        assert!(links.delete_one(id, pin(Uuid::new_v4()), user).await.is_err());
        links.delete_one(id, pin(user), user).await.unwrap();
        assert!(links.select_one(id).await.unwrap().is_none());
        assert!(links.select_any(Some(user)).await.unwrap().is_empty());
        assert!(matches!(links.delete_one(id, pin(user), user).await, Err(DatabaseError::NotFound(_))));
    }
}
