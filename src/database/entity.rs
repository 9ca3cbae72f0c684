//! Static entity registry.
//!
//! Every mutable table the API exposes is described once here. The generic
//! repository, the batch executor and the route layer all read these
//! descriptors instead of carrying one hand-written module per entity.

use crate::auth::Role;

/// Postgres type of a mutable column. Values arrive as JSON and are bound
/// as text/number/bool, then cast server-side with [`ColumnType::cast`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Text,
    Integer,
    Numeric,
    Boolean,
    Uuid,
    Date,
    Json,
    TextArray,
}

impl ColumnType {
    pub fn cast(&self) -> &'static str {
        match self {
            ColumnType::Text => "text",
            ColumnType::Integer => "integer",
            ColumnType::Numeric => "numeric",
            ColumnType::Boolean => "boolean",
            ColumnType::Uuid => "uuid",
            ColumnType::Date => "date",
            ColumnType::Json => "jsonb",
            ColumnType::TextArray => "text[]",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ColumnDef {
    pub name: &'static str,
    pub ty: ColumnType,
}

const fn col(name: &'static str, ty: ColumnType) -> ColumnDef {
    ColumnDef { name, ty }
}

/// How a row hangs off a company, for recruiter access checks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompanyLink {
    None,
    /// The row is the company
    Itself,
    /// The scope column holds the company id
    Scope,
    /// The scope column holds a job id; the company is the job's
    Job,
}

/// Descriptor for one soft-deletable entity table.
#[derive(Debug)]
pub struct EntityDef {
    /// Route segment, e.g. `job-skills`
    pub name: &'static str,
    pub table: &'static str,
    /// Human label used in messages
    pub label: &'static str,
    /// Client-writable columns, including the scope column
    pub columns: &'static [ColumnDef],
    /// Fields every created record must carry (scope column excluded)
    pub required: &'static [&'static str],
    /// Owning parent column (a user, a job, a company)
    pub scope: Option<&'static str>,
    /// Column that identifies a record within its scope for dedup/reactivation
    pub natural_key: Option<&'static str>,
    /// Column naming the person a row belongs to
    pub owner: Option<&'static str>,
    pub company: CompanyLink,
    pub order_by: &'static str,
    pub writers: &'static [Role],
}

const ANY_ROLE: &[Role] = &[Role::Candidate, Role::Recruiter, Role::Admin];
const HIRING: &[Role] = &[Role::Recruiter, Role::Admin];
const CURATORS: &[Role] = &[Role::Recruiter, Role::Admin];

use ColumnType::*;

pub static ENTITIES: &[EntityDef] = &[
    EntityDef {
        name: "companies",
        table: "companies",
        label: "company",
        columns: &[
            col("name", Text),
            col("description", Text),
            col("website", Text),
            col("logo_url", Text),
            col("industry", Text),
            col("location", Text),
            col("size", Integer),
        ],
        required: &["name"],
        scope: None,
        natural_key: None,
        owner: None,
        company: CompanyLink::Itself,
        order_by: "name",
        writers: CURATORS,
    },
    EntityDef {
        name: "degrees",
        table: "degrees",
        label: "degree",
        columns: &[col("title", Text), col("abbreviation", Text), col("field", Text)],
        required: &["title"],
        scope: None,
        natural_key: Some("title"),
        owner: None,
        company: CompanyLink::None,
        order_by: "title",
        writers: CURATORS,
    },
    EntityDef {
        name: "skills",
        table: "skills",
        label: "skill",
        columns: &[col("title", Text), col("category", Text)],
        required: &["title"],
        scope: None,
        natural_key: Some("title"),
        owner: None,
        company: CompanyLink::None,
        order_by: "title",
        writers: CURATORS,
    },
    EntityDef {
        name: "resources",
        table: "resources",
        label: "resource",
        columns: &[
            col("title", Text),
            col("url", Text),
            col("description", Text),
            col("kind", Text),
        ],
        required: &["title", "url"],
        scope: None,
        natural_key: None,
        owner: None,
        company: CompanyLink::None,
        order_by: "created_at DESC",
        writers: CURATORS,
    },
    EntityDef {
        name: "recruiters",
        table: "recruiters",
        label: "recruiter",
        columns: &[col("company_id", Uuid), col("user_id", Uuid), col("designation", Text)],
        required: &["user_id"],
        scope: Some("company_id"),
        natural_key: None,
        owner: None,
        company: CompanyLink::Scope,
        order_by: "created_at",
        writers: HIRING,
    },
    EntityDef {
        name: "jobs",
        table: "jobs",
        label: "job",
        columns: &[
            col("company_id", Uuid),
            col("title", Text),
            col("description", Text),
            col("location", Text),
            col("employment_type", Text),
            col("salary_min", Numeric),
            col("salary_max", Numeric),
            col("status", Text),
            col("tags", TextArray),
        ],
        required: &["title", "description"],
        scope: Some("company_id"),
        natural_key: None,
        owner: None,
        company: CompanyLink::Scope,
        order_by: "created_at DESC",
        writers: HIRING,
    },
    EntityDef {
        name: "job-skills",
        table: "job_skills",
        label: "job skill",
        columns: &[col("job_id", Uuid), col("skill_id", Uuid), col("level", Text)],
        required: &["skill_id"],
        scope: Some("job_id"),
        natural_key: Some("skill_id"),
        owner: None,
        company: CompanyLink::Job,
        order_by: "created_at",
        writers: HIRING,
    },
    EntityDef {
        name: "questions",
        table: "job_questions",
        label: "question",
        columns: &[col("job_id", Uuid), col("question", Text), col("is_required", Boolean)],
        required: &["question"],
        scope: Some("job_id"),
        natural_key: None,
        owner: None,
        company: CompanyLink::Job,
        order_by: "created_at",
        writers: HIRING,
    },
    EntityDef {
        name: "applications",
        table: "applications",
        label: "application",
        columns: &[
            col("job_id", Uuid),
            col("candidate_id", Uuid),
            col("status", Text),
            col("cover_letter", Text),
            col("resume_url", Text),
            col("answers", Json),
        ],
        required: &["candidate_id"],
        scope: Some("job_id"),
        natural_key: None,
        owner: Some("candidate_id"),
        company: CompanyLink::Job,
        order_by: "created_at DESC",
        writers: ANY_ROLE,
    },
    EntityDef {
        name: "links",
        table: "links",
        label: "link",
        columns: &[col("user_id", Uuid), col("title", Text), col("url", Text)],
        required: &["title", "url"],
        scope: Some("user_id"),
        natural_key: Some("title"),
        owner: Some("user_id"),
        company: CompanyLink::None,
        order_by: "created_at",
        writers: ANY_ROLE,
    },
    EntityDef {
        name: "education",
        table: "education",
        label: "education entry",
        columns: &[
            col("user_id", Uuid),
            col("institution", Text),
            col("degree_id", Uuid),
            col("field_of_study", Text),
            col("start_date", Date),
            col("end_date", Date),
            col("grade", Text),
        ],
        required: &["institution"],
        scope: Some("user_id"),
        natural_key: None,
        owner: Some("user_id"),
        company: CompanyLink::None,
        order_by: "start_date DESC NULLS LAST",
        writers: ANY_ROLE,
    },
    EntityDef {
        name: "projects",
        table: "projects",
        label: "project",
        columns: &[
            col("user_id", Uuid),
            col("title", Text),
            col("description", Text),
            col("url", Text),
            col("start_date", Date),
            col("end_date", Date),
        ],
        required: &["title"],
        scope: Some("user_id"),
        natural_key: None,
        owner: Some("user_id"),
        company: CompanyLink::None,
        order_by: "start_date DESC NULLS LAST",
        writers: ANY_ROLE,
    },
    EntityDef {
        name: "skillsets",
        table: "candidate_skills",
        label: "skill set entry",
        columns: &[col("user_id", Uuid), col("skill_id", Uuid), col("level", Text)],
        required: &["skill_id"],
        scope: Some("user_id"),
        natural_key: Some("skill_id"),
        owner: Some("user_id"),
        company: CompanyLink::None,
        order_by: "created_at",
        writers: ANY_ROLE,
    },
    EntityDef {
        name: "experience",
        table: "experience",
        label: "experience entry",
        columns: &[
            col("user_id", Uuid),
            col("company_name", Text),
            col("title", Text),
            col("location", Text),
            col("start_date", Date),
            col("end_date", Date),
            col("description", Text),
        ],
        required: &["company_name", "title"],
        scope: Some("user_id"),
        natural_key: None,
        owner: Some("user_id"),
        company: CompanyLink::None,
        order_by: "start_date DESC NULLS LAST",
        writers: ANY_ROLE,
    },
    EntityDef {
        name: "certificates",
        table: "certificates",
        label: "certificate",
        columns: &[
            col("user_id", Uuid),
            col("title", Text),
            col("issuer", Text),
            col("issued_on", Date),
            col("credential_url", Text),
        ],
        required: &["title"],
        scope: Some("user_id"),
        natural_key: None,
        owner: Some("user_id"),
        company: CompanyLink::None,
        order_by: "issued_on DESC NULLS LAST",
        writers: ANY_ROLE,
    },
];

/// Look up an entity by its route segment
pub fn lookup(name: &str) -> Option<&'static EntityDef> {
    ENTITIES.iter().find(|e| e.name == name)
}

impl EntityDef {
    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Scoped to a user profile (links, education, ...)
    pub fn is_user_scoped(&self) -> bool {
        self.scope == Some("user_id")
    }

    /// Suffix used for the batch list keys: `new_<items>`, `updated_<items>`, `deleted_<items>`
    pub fn batch_key(&self) -> String {
        self.name.replace('-', "_")
    }

    pub fn can_write(&self, role: Role) -> bool {
        self.writers.contains(&role)
    }
}
