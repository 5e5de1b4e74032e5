//! Candidate and job records as served by the platform API, plus the
//! `SearchRecord` view the search engine works against.

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;

use crate::models::lenient;

/// Which side of the marketplace a search agent serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Candidates,
    Jobs,
}

impl RecordKind {
    pub fn singular(self) -> &'static str {
        match self {
            RecordKind::Candidates => "candidate",
            RecordKind::Jobs => "job",
        }
    }

    pub fn plural(self) -> &'static str {
        match self {
            RecordKind::Candidates => "candidates",
            RecordKind::Jobs => "jobs",
        }
    }

    /// `"1 candidate"`, `"3 jobs"`.
    pub fn count_label(self, count: usize) -> String {
        if count == 1 {
            format!("1 {}", self.singular())
        } else {
            format!("{count} {}", self.plural())
        }
    }
}

/// Read-only view of a remote record used for filtering and ranking.
/// Missing attributes are reported as absent; none of these may fail.
pub trait SearchRecord: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    const KIND: RecordKind;

    /// Accepted spellings per field, canonical name first.
    const FIELD_ALIASES: &'static [&'static [&'static str]];

    /// Decodes one remote attribute bag. `None` only when it is not an object.
    fn from_raw(raw: Value) -> Option<Self> {
        serde_json::from_value(lenient::collapse_aliases(raw, Self::FIELD_ALIASES)).ok()
    }

    fn id(&self) -> &str;

    /// Every location-bearing attribute that is populated.
    fn location_values(&self) -> Vec<&str>;

    fn employment_type(&self) -> Option<&str>;

    /// Title, description and requirement text joined for role matching.
    fn searchable_text(&self) -> String;

    /// Verified or featured records rank first.
    fn is_promoted(&self) -> bool;

    /// Count of populated canonical fields, with a bonus for verification.
    fn completeness(&self) -> u32;

    fn recency(&self) -> Option<DateTime<Utc>>;

    fn deadline(&self) -> Option<DateTime<Utc>> {
        None
    }
}

const VERIFIED_BONUS: u32 = 2;

fn present(value: &Option<String>) -> u32 {
    u32::from(value.as_deref().is_some_and(|v| !v.trim().is_empty()))
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Candidate {
    #[serde(deserialize_with = "lenient::string_id")]
    pub id: String,
    #[serde(deserialize_with = "lenient::opt_text")]
    pub first_name: Option<String>,
    #[serde(deserialize_with = "lenient::opt_text")]
    pub last_name: Option<String>,
    #[serde(deserialize_with = "lenient::opt_text")]
    pub title: Option<String>,
    #[serde(deserialize_with = "lenient::opt_text")]
    pub bio: Option<String>,
    #[serde(deserialize_with = "lenient::string_list")]
    pub skills: Vec<String>,
    #[serde(deserialize_with = "lenient::opt_text")]
    pub experience: Option<String>,
    #[serde(deserialize_with = "lenient::opt_text")]
    pub education: Option<String>,
    #[serde(deserialize_with = "lenient::opt_text")]
    pub location: Option<String>,
    #[serde(deserialize_with = "lenient::opt_text")]
    pub province: Option<String>,
    #[serde(deserialize_with = "lenient::opt_text")]
    pub district: Option<String>,
    #[serde(deserialize_with = "lenient::opt_text")]
    pub sector: Option<String>,
    #[serde(deserialize_with = "lenient::opt_text")]
    pub employment_type: Option<String>,
    #[serde(deserialize_with = "lenient::flag")]
    pub is_verified: bool,
    #[serde(deserialize_with = "lenient::flag")]
    pub is_featured: bool,
    #[serde(deserialize_with = "lenient::opt_text")]
    pub profile_picture: Option<String>,
    #[serde(deserialize_with = "lenient::opt_text")]
    pub phone: Option<String>,
    #[serde(deserialize_with = "lenient::opt_text")]
    pub email: Option<String>,
    #[serde(deserialize_with = "lenient::timestamp")]
    pub created_at: Option<DateTime<Utc>>,
}

impl SearchRecord for Candidate {
    const KIND: RecordKind = RecordKind::Candidates;
    const FIELD_ALIASES: &'static [&'static [&'static str]] = &[
        &["id", "_id"],
        &["first_name", "firstName"],
        &["last_name", "lastName"],
        &["title", "profession", "jobTitle"],
        &["bio", "about", "summary"],
        &["employment_type", "employmentType", "preferredEmploymentType"],
        &["is_verified", "isVerified"],
        &["is_featured", "isFeatured"],
        &["profile_picture", "profilePicture"],
        &["created_at", "createdAt"],
    ];

    fn id(&self) -> &str {
        &self.id
    }

    fn location_values(&self) -> Vec<&str> {
        [&self.location, &self.province, &self.district, &self.sector]
            .into_iter()
            .filter_map(|v| v.as_deref())
            .collect()
    }

    fn employment_type(&self) -> Option<&str> {
        self.employment_type.as_deref()
    }

    fn searchable_text(&self) -> String {
        let mut parts: Vec<&str> = [&self.title, &self.bio, &self.experience]
            .into_iter()
            .filter_map(|v| v.as_deref())
            .collect();
        parts.extend(self.skills.iter().map(String::as_str));
        parts.join(" ")
    }

    fn is_promoted(&self) -> bool {
        self.is_verified || self.is_featured
    }

    fn completeness(&self) -> u32 {
        let fields = present(&self.first_name)
            + present(&self.last_name)
            + present(&self.title)
            + present(&self.bio)
            + u32::from(!self.skills.is_empty())
            + present(&self.experience)
            + present(&self.education)
            + u32::from(!self.location_values().is_empty())
            + present(&self.employment_type)
            + present(&self.profile_picture)
            + present(&self.phone)
            + present(&self.email);
        fields + if self.is_verified { VERIFIED_BONUS } else { 0 }
    }

    fn recency(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Job {
    #[serde(deserialize_with = "lenient::string_id")]
    pub id: String,
    #[serde(deserialize_with = "lenient::opt_text")]
    pub title: Option<String>,
    #[serde(deserialize_with = "lenient::opt_text")]
    pub description: Option<String>,
    #[serde(deserialize_with = "lenient::opt_text")]
    pub requirements: Option<String>,
    #[serde(deserialize_with = "lenient::opt_text")]
    pub company_name: Option<String>,
    #[serde(deserialize_with = "lenient::opt_text")]
    pub location: Option<String>,
    #[serde(deserialize_with = "lenient::opt_text")]
    pub province: Option<String>,
    #[serde(deserialize_with = "lenient::opt_text")]
    pub district: Option<String>,
    #[serde(deserialize_with = "lenient::opt_text")]
    pub employment_type: Option<String>,
    pub salary: Option<Value>,
    #[serde(deserialize_with = "lenient::flag")]
    pub is_verified: bool,
    #[serde(deserialize_with = "lenient::flag")]
    pub is_featured: bool,
    #[serde(deserialize_with = "lenient::deadline")]
    pub deadline: Option<DateTime<Utc>>,
    #[serde(deserialize_with = "lenient::timestamp")]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(deserialize_with = "lenient::timestamp")]
    pub created_at: Option<DateTime<Utc>>,
}

impl SearchRecord for Job {
    const KIND: RecordKind = RecordKind::Jobs;
    const FIELD_ALIASES: &'static [&'static [&'static str]] = &[
        &["id", "_id"],
        &["title", "jobTitle"],
        &["requirements", "qualifications"],
        &["company_name", "companyName", "company"],
        &["employment_type", "employmentType", "jobType", "job_type"],
        &["is_verified", "isVerified"],
        &["is_featured", "isFeatured"],
        &["deadline", "applicationDeadline", "expiresAt"],
        &["published_at", "publishedAt"],
        &["created_at", "createdAt"],
    ];

    fn id(&self) -> &str {
        &self.id
    }

    fn location_values(&self) -> Vec<&str> {
        [&self.location, &self.province, &self.district]
            .into_iter()
            .filter_map(|v| v.as_deref())
            .collect()
    }

    fn employment_type(&self) -> Option<&str> {
        self.employment_type.as_deref()
    }

    fn searchable_text(&self) -> String {
        [&self.title, &self.description, &self.requirements]
            .into_iter()
            .filter_map(|v| v.as_deref())
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn is_promoted(&self) -> bool {
        self.is_verified || self.is_featured
    }

    fn completeness(&self) -> u32 {
        let fields = present(&self.title)
            + present(&self.description)
            + present(&self.requirements)
            + present(&self.company_name)
            + u32::from(!self.location_values().is_empty())
            + present(&self.employment_type)
            + u32::from(self.salary.as_ref().is_some_and(|s| !s.is_null()))
            + u32::from(self.deadline.is_some());
        fields + if self.is_verified { VERIFIED_BONUS } else { 0 }
    }

    fn recency(&self) -> Option<DateTime<Utc>> {
        self.published_at.or(self.created_at)
    }

    fn deadline(&self) -> Option<DateTime<Utc>> {
        self.deadline
    }
}
