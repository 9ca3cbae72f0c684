use futures::future::try_join_all;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::database::entity::lookup;
use crate::database::manager::DatabaseError;
use crate::database::models::UserLookup;
use crate::database::repository::Repository;
use crate::database::store::Store;

type Row = Map<String, Value>;

#[derive(Debug, Clone, Serialize)]
pub struct Portfolio {
    pub user: Value,
    pub links: Vec<Row>,
    pub education: Vec<Row>,
    pub projects: Vec<Row>,
    pub skills: Vec<Row>,
    pub experience: Vec<Row>,
    pub certificates: Vec<Row>,
}

/// Read-only public profile assembled from a user's active profile records
pub struct PortfolioService {
    store: Arc<dyn Store>,
}

impl PortfolioService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    fn repo(&self, name: &str) -> Result<Repository, DatabaseError> {
        let def = lookup(name).ok_or_else(|| DatabaseError::QueryError(format!("unknown entity {}", name)))?;
        Ok(Repository::new(def, self.store.clone()))
    }

    pub async fn load(&self, username: &str) -> Result<Portfolio, DatabaseError> {
        let user = self
            .store
            .find_user(UserLookup::Username(username))
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("No portfolio for '{}'", username)))?;
        let owner = Some(user.id);

        let (links, education, projects, skillsets, experience, certificates) = (
            self.repo("links")?,
            self.repo("education")?,
            self.repo("projects")?,
            self.repo("skillsets")?,
            self.repo("experience")?,
            self.repo("certificates")?,
        );
        let (links, education, projects, skills, experience, certificates) = futures::try_join!(
            links.select_any(owner),
            education.select_any(owner),
            projects.select_any(owner),
            skillsets.select_any(owner),
            experience.select_any(owner),
            certificates.select_any(owner),
        )?;

        Ok(Portfolio {
            user: user.public_profile(),
            links,
            education,
            projects,
            skills: self.with_skill_titles(skills).await?,
            experience,
            certificates,
        })
    }

    /// Attach `skill_title` from the skills master table
    async fn with_skill_titles(&self, mut skillsets: Vec<Row>) -> Result<Vec<Row>, DatabaseError> {
        let skills = self.repo("skills")?;
        let mut ids: Vec<Uuid> = skillsets
            .iter()
            .filter_map(|row| row.get("skill_id")?.as_str().and_then(|s| Uuid::parse_str(s).ok()))
            .collect();
        ids.sort();
        ids.dedup();

        let found = try_join_all(ids.iter().map(|id| skills.select_one(*id))).await?;
        let titles: HashMap<String, Value> = found
            .into_iter()
            .flatten()
            .filter_map(|row| Some((row.get("id")?.as_str()?.to_string(), row.get("title")?.clone())))
            .collect();

        for row in &mut skillsets {
            let title = row
                .get("skill_id")
                .and_then(Value::as_str)
                .and_then(|id| titles.get(id))
                .cloned()
                .unwrap_or(Value::Null);
            row.insert("skill_title".to_string(), title);
        }
        Ok(skillsets)
    }
}
