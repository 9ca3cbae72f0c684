use serde_json::{Map, Value};
use sqlx::{self, postgres::PgArguments, types::BigDecimal};
use std::str::FromStr;
use uuid::Uuid;

use crate::database::entity::{ColumnType, EntityDef};
use crate::types::Operation;

/// SQL text plus typed parameters, ready for binding
#[derive(Debug, Clone, PartialEq)]
pub struct SqlStatement {
    pub query: String,
    pub params: Vec<SqlParam>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SqlParam {
    pub ty: ColumnType,
    pub value: Value,
}

impl SqlParam {
    pub fn new(ty: ColumnType, value: impl Into<Value>) -> Self {
        Self { ty, value: value.into() }
    }

    pub fn uuid(id: Uuid) -> Self {
        Self::new(ColumnType::Uuid, id.to_string())
    }
}

/// Resolve the type of any column, including the server-owned ones
pub fn column_type(def: &EntityDef, name: &str) -> ColumnType {
    match name {
        "id" | "created_by" | "updated_by" => ColumnType::Uuid,
        "is_active" => ColumnType::Boolean,
        _ => def.column(name).map(|c| c.ty).unwrap_or(ColumnType::Text),
    }
}

fn quote(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// Accumulates `$n::type` placeholders and their parameters
#[derive(Default)]
struct Params {
    params: Vec<SqlParam>,
}

impl Params {
    fn push(&mut self, param: SqlParam) -> String {
        let placeholder = format!("${}::{}", self.params.len() + 1, param.ty.cast());
        self.params.push(param);
        placeholder
    }
}

/// Column values a single-row write must also match (parent scope, owner)
pub type Pins = Vec<(&'static str, Value)>;

/// One database write. Every batch and action list compiles down to a
/// sequence of these, executed inside a single transaction.
#[derive(Debug, Clone)]
pub enum WriteOp {
    /// Insert a row. With `upsert`, a row that already holds the same
    /// scope + natural key is updated and reactivated instead.
    Insert {
        def: &'static EntityDef,
        values: Map<String, Value>,
        upsert: bool,
    },
    /// Update one active row by primary key, pinned to the given column values
    Update {
        def: &'static EntityDef,
        id: Uuid,
        pins: Pins,
        values: Map<String, Value>,
    },
    /// Flip `is_active` off for one active row
    SoftDelete {
        def: &'static EntityDef,
        id: Uuid,
        pins: Pins,
        actor: Uuid,
    },
    /// Update every row matching the given column values
    UpdateMatching {
        def: &'static EntityDef,
        matching: Vec<(&'static str, Value)>,
        values: Map<String, Value>,
    },
    /// Hard-delete every row matching the given column values
    DeleteMatching {
        def: &'static EntityDef,
        matching: Vec<(&'static str, Value)>,
    },
}

impl WriteOp {
    pub fn def(&self) -> &'static EntityDef {
        match self {
            WriteOp::Insert { def, .. }
            | WriteOp::Update { def, .. }
            | WriteOp::SoftDelete { def, .. }
            | WriteOp::UpdateMatching { def, .. }
            | WriteOp::DeleteMatching { def, .. } => def,
        }
    }

    pub fn operation(&self) -> Operation {
        match self {
            WriteOp::Insert { .. } => Operation::Create,
            WriteOp::Update { .. } | WriteOp::UpdateMatching { .. } => Operation::Update,
            WriteOp::SoftDelete { .. } | WriteOp::DeleteMatching { .. } => Operation::Delete,
        }
    }

    /// Ops addressing one row by id must hit exactly that row
    pub fn targets_single_row(&self) -> bool {
        matches!(self, WriteOp::Insert { .. } | WriteOp::Update { .. } | WriteOp::SoftDelete { .. })
    }

    pub fn to_sql(&self) -> SqlStatement {
        let mut params = Params::default();
        let query = match self {
            WriteOp::Insert { def, values, upsert } => {
                let mut columns = Vec::with_capacity(values.len());
                let mut placeholders = Vec::with_capacity(values.len());
                for (column, value) in values {
                    columns.push(quote(column));
                    placeholders.push(params.push(SqlParam::new(column_type(def, column), value.clone())));
                }
                let mut sql = format!(
                    "INSERT INTO {} AS t ({}) VALUES ({})",
                    quote(def.table),
                    columns.join(", "),
                    placeholders.join(", ")
                );
                if let (true, Some(key)) = (*upsert, def.natural_key) {
                    let target: Vec<String> = def.scope.into_iter().chain(Some(key)).map(quote).collect();
                    let mut assignments: Vec<String> = values
                        .keys()
                        .filter(|c| !matches!(c.as_str(), "id" | "created_by") && Some(c.as_str()) != def.scope && c.as_str() != key)
                        .map(|c| format!("{} = EXCLUDED.{}", quote(c), quote(c)))
                        .collect();
                    assignments.push("\"is_active\" = true".to_string());
                    assignments.push("\"updated_at\" = now()".to_string());
                    sql.push_str(&format!(" ON CONFLICT ({}) DO UPDATE SET {}", target.join(", "), assignments.join(", ")));
                }
                sql.push_str(" RETURNING to_jsonb(t) AS row");
                sql
            }
            WriteOp::Update { def, id, pins, values } => {
                let assignments = assignments(def, values, &mut params);
                let mut sql = format!(
                    "UPDATE {} AS t SET {} WHERE t.\"id\" = {}",
                    quote(def.table),
                    assignments.join(", "),
                    params.push(SqlParam::uuid(*id))
                );
                if !pins.is_empty() {
                    sql.push_str(&format!(" AND {}", conditions(def, pins, &mut params)));
                }
                sql.push_str(" AND t.\"is_active\" RETURNING to_jsonb(t) AS row");
                sql
            }
            WriteOp::SoftDelete { def, id, pins, actor } => {
                let mut sql = format!(
                    "UPDATE {} AS t SET \"is_active\" = false, \"updated_by\" = {}, \"updated_at\" = now() WHERE t.\"id\" = {}",
                    quote(def.table),
                    params.push(SqlParam::uuid(*actor)),
                    params.push(SqlParam::uuid(*id))
                );
                if !pins.is_empty() {
                    sql.push_str(&format!(" AND {}", conditions(def, pins, &mut params)));
                }
                sql.push_str(" AND t.\"is_active\" RETURNING to_jsonb(t) AS row");
                sql
            }
            WriteOp::UpdateMatching { def, matching, values } => {
                let assignments = assignments(def, values, &mut params);
                format!(
                    "UPDATE {} AS t SET {} WHERE {}",
                    quote(def.table),
                    assignments.join(", "),
                    conditions(def, matching, &mut params)
                )
            }
            WriteOp::DeleteMatching { def, matching } => {
                format!(
                    "DELETE FROM {} AS t WHERE {}",
                    quote(def.table),
                    conditions(def, matching, &mut params)
                )
            }
        };
        SqlStatement { query, params: params.params }
    }
}

fn assignments(def: &EntityDef, values: &Map<String, Value>, params: &mut Params) -> Vec<String> {
    let mut out: Vec<String> = values
        .iter()
        .map(|(column, value)| {
            format!("{} = {}", quote(column), params.push(SqlParam::new(column_type(def, column), value.clone())))
        })
        .collect();
    out.push("\"updated_at\" = now()".to_string());
    out
}

fn conditions(def: &EntityDef, matching: &[(&'static str, Value)], params: &mut Params) -> String {
    matching
        .iter()
        .map(|(column, value)| {
            format!("t.{} = {}", quote(column), params.push(SqlParam::new(column_type(def, column), value.clone())))
        })
        .collect::<Vec<_>>()
        .join(" AND ")
}

/// Read query over the active rows of one entity
#[derive(Debug, Clone)]
pub struct SelectQuery {
    def: &'static EntityDef,
    conditions: Vec<(&'static str, &'static str, SqlParam)>,
    limit: Option<i64>,
    offset: Option<i64>,
}

impl SelectQuery {
    pub fn active(def: &'static EntityDef) -> Self {
        Self { def, conditions: Vec::new(), limit: None, offset: None }
    }

    pub fn eq(self, column: &'static str, value: impl Into<Value>) -> Self {
        self.condition(column, "=", value)
    }

    pub fn gte(self, column: &'static str, value: impl Into<Value>) -> Self {
        self.condition(column, ">=", value)
    }

    pub fn lte(self, column: &'static str, value: impl Into<Value>) -> Self {
        self.condition(column, "<=", value)
    }

    fn condition(mut self, column: &'static str, op: &'static str, value: impl Into<Value>) -> Self {
        let ty = column_type(self.def, column);
        self.conditions.push((column, op, SqlParam::new(ty, value)));
        self
    }

    pub fn limit(mut self, limit: i64, offset: i64) -> Self {
        self.limit = Some(limit);
        self.offset = Some(offset);
        self
    }

    pub fn def(&self) -> &'static EntityDef {
        self.def
    }

    /// `(column, operator, parameter)` triples, ANDed together
    pub fn conditions(&self) -> &[(&'static str, &'static str, SqlParam)] {
        &self.conditions
    }

    pub fn window(&self) -> Option<(i64, i64)> {
        self.limit.map(|limit| (limit, self.offset.unwrap_or(0)))
    }

    fn where_clause(&self, params: &mut Params) -> String {
        let mut clauses = vec!["t.\"is_active\"".to_string()];
        for (column, op, param) in &self.conditions {
            clauses.push(format!("t.{} {} {}", quote(column), op, params.push(param.clone())));
        }
        clauses.join(" AND ")
    }

    pub fn to_sql(&self) -> SqlStatement {
        let mut params = Params::default();
        let mut query = format!(
            "SELECT to_jsonb(t) AS row FROM {} AS t WHERE {} ORDER BY {}, t.\"id\"",
            quote(self.def.table),
            self.where_clause(&mut params),
            self.def.order_by
        );
        if let Some(limit) = self.limit {
            query.push_str(&format!(" LIMIT {} OFFSET {}", limit, self.offset.unwrap_or(0)));
        }
        SqlStatement { query, params: params.params }
    }

    pub fn to_count_sql(&self) -> SqlStatement {
        let mut params = Params::default();
        let query = format!(
            "SELECT COUNT(*) AS count FROM {} AS t WHERE {}",
            quote(self.def.table),
            self.where_clause(&mut params)
        );
        SqlStatement { query, params: params.params }
    }
}

/// Bind typed JSON parameters onto a sqlx query
pub fn bind_params<'q>(
    mut q: sqlx::query::Query<'q, sqlx::Postgres, PgArguments>,
    params: &'q [SqlParam],
) -> sqlx::query::Query<'q, sqlx::Postgres, PgArguments> {
    for param in params {
        q = bind_param(q, param);
    }
    q
}

fn bind_param<'q>(
    q: sqlx::query::Query<'q, sqlx::Postgres, PgArguments>,
    param: &'q SqlParam,
) -> sqlx::query::Query<'q, sqlx::Postgres, PgArguments> {
    match (param.ty, &param.value) {
        (_, Value::Null) => {
            let none: Option<String> = None;
            q.bind(none)
        }
        (ColumnType::Json, v) => q.bind(v.clone()),
        (ColumnType::TextArray, Value::Array(items)) => {
            let items: Vec<String> = items.iter().filter_map(|v| v.as_str().map(str::to_string)).collect();
            q.bind(items)
        }
        (_, Value::Bool(b)) => q.bind(*b),
        (_, Value::Number(n)) => {
            if let Some(i) = n.as_i64() {
                q.bind(i)
            } else if let Ok(d) = BigDecimal::from_str(&n.to_string()) {
                q.bind(d)
            } else {
                q.bind(n.to_string())
            }
        }
        (_, Value::String(s)) => q.bind(s.as_str()),
        (_, v) => q.bind(v.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::entity::lookup;
    use serde_json::json;

    fn values(pairs: &[(&str, Value)]) -> Map<String, Value> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn insert_with_natural_key_upserts_and_reactivates() {
        let def = lookup("links").unwrap();
        let op = WriteOp::Insert {
            def,
            values: values(&[
                ("id", json!(Uuid::nil().to_string())),
                ("user_id", json!(Uuid::nil().to_string())),
                ("title", json!("GitHub")),
                ("url", json!("https://github.com/me")),
            ]),
            upsert: true,
        };
        let sql = op.to_sql();
        assert!(sql.query.starts_with("INSERT INTO \"links\" AS t"));
        assert!(sql.query.contains("ON CONFLICT (\"user_id\", \"title\") DO UPDATE SET \"url\" = EXCLUDED.\"url\""));
        assert!(sql.query.contains("\"is_active\" = true"));
        assert!(!sql.query.contains("\"id\" = EXCLUDED"));
        assert!(sql.query.ends_with("RETURNING to_jsonb(t) AS row"));
        assert_eq!(sql.params.len(), 4);
    }

    #[test]
    fn scoped_update_pins_parent_and_active_rows() {
        let def = lookup("certificates").unwrap();
        let user = Uuid::new_v4();
        let op = WriteOp::Update {
            def,
            id: Uuid::new_v4(),
            pins: vec![("user_id", json!(user.to_string()))],
            values: values(&[("title", json!("CKA"))]),
        };
        let sql = op.to_sql();
        assert_eq!(
            sql.query,
            "UPDATE \"certificates\" AS t SET \"title\" = $1::text, \"updated_at\" = now() \
             WHERE t.\"id\" = $2::uuid AND t.\"user_id\" = $3::uuid AND t.\"is_active\" RETURNING to_jsonb(t) AS row"
        );
        assert_eq!(sql.params[2].value, json!(user.to_string()));
    }

    #[test]
    fn soft_delete_pins_scope_and_owner() {
        let def = lookup("applications").unwrap();
        let op = WriteOp::SoftDelete {
            def,
            id: Uuid::new_v4(),
            pins: vec![("job_id", json!("j")), ("candidate_id", json!("c"))],
            actor: Uuid::new_v4(),
        };
        let sql = op.to_sql();
        assert!(sql
            .query
            .ends_with("WHERE t.\"id\" = $2::uuid AND t.\"job_id\" = $3::uuid AND t.\"candidate_id\" = $4::uuid AND t.\"is_active\" RETURNING to_jsonb(t) AS row"));
        assert_eq!(sql.params.len(), 4);
    }

    #[test]
    fn delete_matching_uses_natural_key() {
        let def = lookup("job-skills").unwrap();
        let op = WriteOp::DeleteMatching {
            def,
            matching: vec![("job_id", json!("a")), ("skill_id", json!("b"))],
        };
        assert_eq!(
            op.to_sql().query,
            "DELETE FROM \"job_skills\" AS t WHERE t.\"job_id\" = $1::uuid AND t.\"skill_id\" = $2::uuid"
        );
        assert!(!op.targets_single_row());
        assert_eq!(op.operation(), Operation::Delete);
    }

    #[test]
    fn select_page_and_count_share_conditions() {
        let def = lookup("companies").unwrap();
        let query = SelectQuery::active(def).gte("size", 0).lte("size", 50);
        let count = query.to_count_sql();
        assert_eq!(
            count.query,
            "SELECT COUNT(*) AS count FROM \"companies\" AS t WHERE t.\"is_active\" AND t.\"size\" >= $1::integer AND t.\"size\" <= $2::integer"
        );
        let page = query.limit(10, 20).to_sql();
        assert!(page.query.ends_with("ORDER BY name, t.\"id\" LIMIT 10 OFFSET 20"));
        assert_eq!(page.params.len(), 2);
    }
}
