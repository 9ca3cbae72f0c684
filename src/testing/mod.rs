//! In-memory [`Store`] for tests.
//!
//! Writes are applied to a copy of the tables and swapped in only when every
//! operation succeeds, mirroring a database transaction.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use uuid::Uuid;

use crate::database::manager::DatabaseError;
use crate::database::models::{NewUser, User, UserLookup};
use crate::database::query_builder::{SelectQuery, WriteOp};
use crate::database::store::{describe_missing, OpResult, Store};

type Row = Map<String, Value>;
type Tables = HashMap<&'static str, Vec<Row>>;

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    users: Mutex<Vec<User>>,
    waitlist: Mutex<Vec<String>>,
    committed: AtomicUsize,
}

fn poisoned<T>(_: T) -> DatabaseError {
    DatabaseError::QueryError("memory store lock poisoned".to_string())
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of write operations committed so far
    pub fn committed_ops(&self) -> usize {
        self.committed.load(Ordering::SeqCst)
    }

    /// Every row of a table, inactive ones included
    pub fn rows(&self, table: &str) -> Vec<Row> {
        self.tables
            .lock()
            .map(|tables| tables.get(table).cloned().unwrap_or_default())
            .unwrap_or_default()
    }

    pub fn waitlist(&self) -> Vec<String> {
        self.waitlist.lock().map(|w| w.clone()).unwrap_or_default()
    }
}

fn same(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        (Value::String(x), Value::String(y)) => x == y,
        _ => a == b,
    }
}

fn number(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn matches_all(row: &Row, matching: &[(&'static str, Value)]) -> bool {
    matching.iter().all(|(column, value)| row.get(*column).is_some_and(|v| same(v, value)))
}

fn is_active(row: &Row) -> bool {
    row.get("is_active").and_then(Value::as_bool).unwrap_or(false)
}

fn merge(row: &mut Row, values: &Row) {
    for (k, v) in values {
        row.insert(k.clone(), v.clone());
    }
    row.insert("updated_at".to_string(), Value::String(Utc::now().to_rfc3339()));
}

fn find_active<'a>(rows: &'a mut [Row], id: Uuid, pins: &[(&'static str, Value)]) -> Option<&'a mut Row> {
    let id = Value::String(id.to_string());
    rows.iter_mut()
        .find(|r| is_active(r) && r.get("id").is_some_and(|v| same(v, &id)) && matches_all(r, pins))
}

fn apply(tables: &mut Tables, op: &WriteOp) -> Result<OpResult, DatabaseError> {
    let def = op.def();
    let rows = tables.entry(def.table).or_default();
    let single = |row: &Row| OpResult {
        operation: op.operation(),
        rows: 1,
        record: Some(row.clone()),
    };

    match op {
        WriteOp::Insert { values, upsert, .. } => {
            if let Some(key) = def.natural_key {
                let mut same_key: Vec<(&'static str, Value)> = vec![(key, values.get(key).cloned().unwrap_or(Value::Null))];
                if let Some(scope) = def.scope {
                    same_key.push((scope, values.get(scope).cloned().unwrap_or(Value::Null)));
                }
                if let Some(existing) = rows.iter_mut().find(|r| matches_all(r, &same_key)) {
                    if !upsert {
                        return Err(DatabaseError::Duplicate(format!("duplicate key in {}", def.table)));
                    }
                    let updates: Row = values
                        .iter()
                        .filter(|(c, _)| c.as_str() != "created_by" && Some(c.as_str()) != def.scope && c.as_str() != key)
                        .map(|(c, v)| (c.clone(), v.clone()))
                        .collect();
                    merge(existing, &updates);
                    existing.insert("is_active".to_string(), Value::Bool(true));
                    return Ok(single(existing));
                }
            }
            let now = Value::String(Utc::now().to_rfc3339());
            let mut row = values.clone();
            row.entry("id").or_insert_with(|| Value::String(Uuid::new_v4().to_string()));
            row.insert("is_active".to_string(), Value::Bool(true));
            row.insert("created_at".to_string(), now.clone());
            row.insert("updated_at".to_string(), now);
            rows.push(row);
            Ok(single(rows.last().ok_or_else(|| DatabaseError::QueryError("insert lost".into()))?))
        }
        WriteOp::Update { id, pins, values, .. } => {
            let Some(row) = find_active(rows, *id, pins) else {
                return Err(DatabaseError::NotFound(describe_missing(op)));
            };
            merge(row, values);
            Ok(single(row))
        }
        WriteOp::SoftDelete { id, pins, actor, .. } => {
            let Some(row) = find_active(rows, *id, pins) else {
                return Err(DatabaseError::NotFound(describe_missing(op)));
            };
            let mut values = Row::new();
            values.insert("is_active".to_string(), Value::Bool(false));
            values.insert("updated_by".to_string(), Value::String(actor.to_string()));
            merge(row, &values);
            Ok(single(row))
        }
        WriteOp::UpdateMatching { matching, values, .. } => {
            let mut count = 0;
            for row in rows.iter_mut().filter(|r| matches_all(r, matching)) {
                merge(row, values);
                count += 1;
            }
            Ok(OpResult { operation: op.operation(), rows: count, record: None })
        }
        WriteOp::DeleteMatching { matching, .. } => {
            let before = rows.len();
            rows.retain(|r| !matches_all(r, matching));
            Ok(OpResult {
                operation: op.operation(),
                rows: (before - rows.len()) as u64,
                record: None,
            })
        }
    }
}

fn select_rows(tables: &Tables, query: &SelectQuery) -> Vec<Row> {
    let rows = tables.get(query.def().table).cloned().unwrap_or_default();
    rows.into_iter()
        .filter(is_active)
        .filter(|row| {
            query.conditions().iter().all(|(column, op, param)| {
                let Some(value) = row.get(*column) else { return false };
                match *op {
                    "=" => same(value, &param.value),
                    ">=" => matches!((number(value), number(&param.value)), (Some(a), Some(b)) if a >= b),
                    "<=" => matches!((number(value), number(&param.value)), (Some(a), Some(b)) if a <= b),
                    _ => false,
                }
            })
        })
        .collect()
}

#[async_trait]
impl Store for MemoryStore {
    async fn select(&self, query: &SelectQuery) -> Result<Vec<Row>, DatabaseError> {
        let tables = self.tables.lock().map_err(poisoned)?;
        let rows = select_rows(&tables, query);
        Ok(match query.window() {
            Some((limit, offset)) => rows.into_iter().skip(offset as usize).take(limit as usize).collect(),
            None => rows,
        })
    }

    async fn count(&self, query: &SelectQuery) -> Result<i64, DatabaseError> {
        let tables = self.tables.lock().map_err(poisoned)?;
        Ok(select_rows(&tables, query).len() as i64)
    }

    async fn transact(&self, ops: &[WriteOp]) -> Result<Vec<OpResult>, DatabaseError> {
        let mut tables = self.tables.lock().map_err(poisoned)?;
        let mut working = tables.clone();
        let mut results = Vec::with_capacity(ops.len());
        for op in ops {
            results.push(apply(&mut working, op)?);
        }
        *tables = working;
        self.committed.fetch_add(ops.len(), Ordering::SeqCst);
        Ok(results)
    }

    async fn find_user(&self, lookup: UserLookup<'_>) -> Result<Option<User>, DatabaseError> {
        let users = self.users.lock().map_err(poisoned)?;
        Ok(users
            .iter()
            .filter(|u| u.is_active)
            .find(|u| match lookup {
                UserLookup::Id(id) => u.id == id,
                UserLookup::Email(email) => u.email.eq_ignore_ascii_case(email),
                UserLookup::Username(username) => u.username == username,
            })
            .cloned())
    }

    async fn insert_user(&self, user: &NewUser) -> Result<User, DatabaseError> {
        let mut users = self.users.lock().map_err(poisoned)?;
        if users
            .iter()
            .any(|u| u.email.eq_ignore_ascii_case(&user.email) || u.username == user.username)
        {
            return Err(DatabaseError::Duplicate("duplicate key in users".to_string()));
        }
        let now = Utc::now();
        let created = User {
            id: Uuid::new_v4(),
            email: user.email.clone(),
            username: user.username.clone(),
            name: user.name.clone(),
            password_hash: user.password_hash.clone(),
            role: user.role.as_str().to_string(),
            headline: None,
            bio: None,
            avatar_url: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        users.push(created.clone());
        Ok(created)
    }

    async fn join_waitlist(&self, email: &str, _name: Option<&str>) -> Result<(), DatabaseError> {
        let mut waitlist = self.waitlist.lock().map_err(poisoned)?;
        let email = email.to_lowercase();
        if !waitlist.contains(&email) {
            waitlist.push(email);
        }
        Ok(())
    }

    async fn health_check(&self) -> Result<(), DatabaseError> {
        Ok(())
    }
}
