//! Endpoint schedule
//!
//! The export is driven by an ordered list of typed [`Step`]s. Declaration
//! order is execution order; [`Schedule::new`] checks that every extension
//! reads a collection produced by an earlier step instead of reordering.

use crate::error::{IngestError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Placeholder substituted with an item's id in extension paths.
pub const ID_PLACEHOLDER: &str = "{id}";

/// Top-level collection produced by [`Step::HoistApplications`].
pub const APPLICATIONS: &str = "applications";

/// Collection whose nested applications are hoisted.
pub const RECRUITMENTS: &str = "recruitments";

/// Loosely typed endpoint declaration.
///
/// Paths without a placeholder are root endpoints: `source_collection` is the
/// key holding the list inside the response, `target_key` the document
/// collection. Paths with one `{id}` placeholder are extensions:
/// `source_collection` names the document collection to extend, `id_field`
/// the item field substituted into the path and `target_key` the key the
/// result is attached under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointSpec {
    pub path_template: String,
    #[serde(default)]
    pub source_collection: Option<String>,
    #[serde(default)]
    pub id_field: Option<String>,
    #[serde(default)]
    pub target_key: Option<String>,
}

impl EndpointSpec {
    pub fn root(path: &str) -> Self {
        Self {
            path_template: path.to_string(),
            source_collection: None,
            id_field: None,
            target_key: None,
        }
    }

    pub fn extension(path: &str, source: &str, id_field: &str, target: &str) -> Self {
        Self {
            path_template: path.to_string(),
            source_collection: Some(source.to_string()),
            id_field: Some(id_field.to_string()),
            target_key: Some(target.to_string()),
        }
    }
}

/// Collection name derived from a path: its last segment, lower-cased.
pub fn derive_target_key(path: &str) -> String {
    path.trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(path)
        .to_lowercase()
}

/// One step of the export
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum Step {
    /// Fetch a paginated collection into `document[target]`.
    Root {
        path: String,
        /// Key holding the items inside each response page
        collection_key: String,
        target: String,
    },
    /// Fetch `path` once per item of `source` and attach under `target`.
    Extension {
        path: String,
        source: String,
        id_field: String,
        target: String,
    },
    /// Move applications nested under recruitments into `applications`.
    HoistApplications,
}

impl Step {
    pub fn root(path: &str, target: &str) -> Self {
        Step::Root {
            path: path.to_string(),
            collection_key: target.to_string(),
            target: target.to_string(),
        }
    }

    pub fn extension(path: &str, source: &str, id_field: &str, target: &str) -> Self {
        Step::Extension {
            path: path.to_string(),
            source: source.to_string(),
            id_field: id_field.to_string(),
            target: target.to_string(),
        }
    }

    /// Top-level collection this step creates, if any.
    pub fn produces(&self) -> Option<&str> {
        match self {
            Step::Root { target, .. } => Some(target.as_str()),
            Step::Extension { .. } => None,
            Step::HoistApplications => Some(APPLICATIONS),
        }
    }

    /// Top-level collection this step requires, if any.
    pub fn requires(&self) -> Option<&str> {
        match self {
            Step::Root { .. } => None,
            Step::Extension { source, .. } => Some(source.as_str()),
            Step::HoistApplications => Some(RECRUITMENTS),
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Root {
                path,
                collection_key,
                target,
            } => write!(f, "root {} [{}] -> {}", path, collection_key, target),
            Step::Extension {
                path,
                source,
                id_field,
                target,
            } => write!(f, "extend {} by {} ({}) -> .{}", source, path, id_field, target),
            Step::HoistApplications => write!(f, "hoist {}.{} -> {}", RECRUITMENTS, APPLICATIONS, APPLICATIONS),
        }
    }
}

impl TryFrom<EndpointSpec> for Step {
    type Error = IngestError;

    fn try_from(spec: EndpointSpec) -> Result<Self> {
        let placeholders = spec.path_template.matches(ID_PLACEHOLDER).count();
        let target = spec
            .target_key
            .clone()
            .unwrap_or_else(|| derive_target_key(&spec.path_template));

        match placeholders {
            0 => Ok(Step::Root {
                collection_key: spec.source_collection.unwrap_or_else(|| target.clone()),
                path: spec.path_template,
                target,
            }),
            1 => {
                let source = spec.source_collection.ok_or_else(|| {
                    IngestError::schedule(format!(
                        "extension {} does not name a source collection",
                        spec.path_template
                    ))
                })?;
                let id_field = spec.id_field.ok_or_else(|| {
                    IngestError::schedule(format!(
                        "extension {} does not name an id field",
                        spec.path_template
                    ))
                })?;
                Ok(Step::Extension {
                    path: spec.path_template,
                    source,
                    id_field,
                    target,
                })
            },
            n => Err(IngestError::schedule(format!(
                "{} has {} placeholders, at most one is supported",
                spec.path_template, n
            ))),
        }
    }
}

/// Validated, ordered list of steps
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schedule {
    steps: Vec<Step>,
}

impl Schedule {
    /// Validate that every step's prerequisite is produced by an earlier step.
    pub fn new(steps: Vec<Step>) -> Result<Self> {
        let mut produced = BTreeSet::new();
        for (index, step) in steps.iter().enumerate() {
            if let Step::Root { path, .. } | Step::Extension { path, .. } = step {
                let placeholders = path.matches(ID_PLACEHOLDER).count();
                let expected = usize::from(matches!(step, Step::Extension { .. }));
                if placeholders != expected {
                    return Err(IngestError::schedule(format!(
                        "step {} ({}) has {} placeholders, expected {}",
                        index, step, placeholders, expected
                    )));
                }
            }
            if let Some(required) = step.requires() {
                if !produced.contains(required) {
                    return Err(IngestError::schedule(format!(
                        "step {} ({}) needs collection '{}' which no earlier step produces",
                        index, step, required
                    )));
                }
            }
            if let Some(name) = step.produces() {
                produced.insert(name.to_string());
            }
        }
        Ok(Self { steps })
    }

    /// Build a schedule from endpoint declarations.
    pub fn from_specs(specs: Vec<EndpointSpec>) -> Result<Self> {
        let steps = specs
            .into_iter()
            .map(Step::try_from)
            .collect::<Result<Vec<_>>>()?;
        Self::new(steps)
    }

    /// Skip validation; prerequisites are then only checked at run time.
    pub fn unchecked(steps: Vec<Step>) -> Self {
        Self { steps }
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Built-in schedule for the applicant-tracking API.
pub fn default_ats_steps() -> Vec<Step> {
    vec![
        Step::root("candidates", "candidates"),
        Step::root("recruitments", "recruitments"),
        Step::root("Dictionaries/Languages", "languages"),
        Step::root("Dictionaries/RecruitmentStages", "stages"),
        Step::root("Account/Stages", "accountstages"),
        Step::root("Account/Tags", "tags"),
        Step::root("Account/Origins", "accountorigins"),
        Step::root("Candidates/Favourites", "candidatefavourites"),
        Step::extension("candidates/{id}/Recruitments", "candidates", "candidateId", "recruitments"),
        Step::extension("candidates/{id}/Educations", "candidates", "candidateId", "educations"),
        Step::extension("candidates/{id}/LanguageSkills", "candidates", "candidateId", "languageSkills"),
        Step::extension(
            "candidates/{id}/EmploymentExperiences",
            "candidates",
            "candidateId",
            "employmentexperiences",
        ),
        Step::extension(
            "candidates/{id}/EmploymentHistories",
            "candidates",
            "candidateId",
            "employmenthistories",
        ),
        Step::extension("candidates/{id}/JobWanted", "candidates", "candidateId", "jobwanted"),
        Step::extension("recruitments/{id}/candidateapplications", "recruitments", "id", APPLICATIONS),
        Step::extension("recruitments/{id}/stages", "recruitments", "id", "stages"),
        Step::HoistApplications,
        Step::extension(
            "candidateapplications/{id}/stageshistory",
            APPLICATIONS,
            "applicationId",
            "candidateApplicationStages",
        ),
        Step::extension("candidateapplications/{id}/tags", APPLICATIONS, "applicationId", "tags"),
        Step::extension("candidateapplications/{id}/notes", APPLICATIONS, "applicationId", "notes"),
    ]
}

/// Validated built-in schedule.
pub fn default_ats_schedule() -> Result<Schedule> {
    Schedule::new(default_ats_steps())
}
