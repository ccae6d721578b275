//! Dump and post-processing pipelines
//!
//! `run_dump` is the whole export: configuration checks, token acquisition,
//! the endpoint walk, the assessment-API collection, optional anonymization,
//! and the snapshot write. Fatal errors (configuration, authorization) abort
//! before anything is fetched; every later failure is contained and the
//! snapshot is always written.

use crate::auth::TokenManager;
use crate::codility::{CodilityCollector, CodilityReport, CODILITY_SECTION};
use crate::config::DumpConfig;
use crate::document::Document;
use crate::endpoints::{default_ats_schedule, Schedule};
use crate::error::{IngestError, Result};
use crate::fetcher::{Authorization, RateLimitedFetcher};
use crate::reader::PaginatedReader;
use crate::walker::{EndpointWalker, RunReport};
use hrdump_common::anonymize::{AnonymizeStats, Anonymizer};
use hrdump_common::snapshot::{processed_path, read_json, write_json, write_snapshot};
use hrdump_common::types::HashAlgorithm;
use reqwest::Client;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

/// Snapshot name used when none is given.
pub const DEFAULT_SNAPSHOT_NAME: &str = "db_dump";

/// Endpoint listing the companies visible to the credentials.
pub const COMPANIES_PATH: &str = "Account/Companies";

/// Which upstream APIs a dump reads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum Source {
    #[default]
    All,
    Ats,
    Codility,
}

impl Source {
    pub fn includes_ats(self) -> bool {
        matches!(self, Source::All | Source::Ats)
    }

    pub fn includes_codility(self) -> bool {
        matches!(self, Source::All | Source::Codility)
    }
}

/// Per-run options layered over [`DumpConfig`]
#[derive(Debug, Clone)]
pub struct DumpOptions {
    pub source: Source,
    pub name: String,
    /// Overrides `output_dir` from the config
    pub output_dir: Option<PathBuf>,
    /// Overrides `hash_salt` from the config
    pub salt: Option<String>,
    /// Anonymize even when no salt is configured
    pub anonymize: bool,
}

impl Default for DumpOptions {
    fn default() -> Self {
        Self {
            source: Source::All,
            name: DEFAULT_SNAPSHOT_NAME.to_string(),
            output_dir: None,
            salt: None,
            anonymize: false,
        }
    }
}

#[derive(Debug)]
pub struct DumpOutcome {
    pub path: PathBuf,
    pub report: RunReport,
    pub codility: Option<CodilityReport>,
    pub anonymized: Option<AnonymizeStats>,
}

/// Schedule from the config's `endpoints`, or the built-in one.
pub fn effective_schedule(config: &DumpConfig) -> Result<Schedule> {
    match config.endpoints {
        Some(ref steps) => Schedule::new(steps.clone()),
        None => default_ats_schedule(),
    }
}

fn http_client(config: &DumpConfig) -> Result<Client> {
    Ok(Client::builder()
        .timeout(config.request_timeout())
        .connection_verbose(config.http_debug)
        .build()?)
}

/// Run a complete export and write its snapshot.
pub async fn run_dump(config: &DumpConfig, options: &DumpOptions) -> Result<DumpOutcome> {
    let schedule = effective_schedule(config)?;
    let http = http_client(config)?;

    let codility_token = match (options.source.includes_codility(), config.codility_token.as_deref()) {
        (true, Some(token)) if !token.is_empty() => Some(token.to_string()),
        (true, _) if options.source == Source::Codility => {
            return Err(IngestError::config("Missing required field 'codility_token'"));
        },
        (true, _) => {
            warn!("No codility_token configured, skipping Codility");
            None
        },
        (false, _) => None,
    };

    let mut document = Document::new();
    let mut report = RunReport::default();

    if options.source.includes_ats() {
        let credentials = config.credentials()?;
        let tokens = TokenManager::connect(
            http.clone(),
            config.token_url.as_str(),
            credentials,
            config.token_path.as_path(),
            config.reuse_token,
        )
        .await?;

        let fetcher = RateLimitedFetcher::builder("ats", config.ats_api_url.as_str())
            .client(http.clone())
            .rate_limit(config.rate_limits.ats)
            .authorization(Authorization::OAuth2(tokens))
            .build()?;

        let Some(company_id) = config.company_id else {
            list_companies(&fetcher).await;
            return Err(IngestError::config("Missing required field 'companyId'"));
        };

        let reader = PaginatedReader::new(&fetcher, config.page_size())
            .with_company_id(company_id)
            .with_retry(config.retry.policy());
        report = EndpointWalker::new(reader)
            .run_into(&schedule, &mut document)
            .await;
    }

    let mut codility = None;
    if let Some(token) = codility_token {
        let fetcher = RateLimitedFetcher::builder("codility", config.codility_api_url.as_str())
            .client(http.clone())
            .rate_limit(config.rate_limits.codility)
            .authorization(Authorization::Bearer(token))
            .build()?;

        let (section, codility_report) = CodilityCollector::new(&fetcher, config.retry.policy())
            .collect()
            .await;
        document.insert_section(CODILITY_SECTION, section);
        codility = Some(codility_report);
    }

    for (collection, count) in document.counts() {
        info!(collection, count, "Collected");
    }

    let mut value = document.into_value();

    let salt = options.salt.clone().or_else(|| config.hash_salt.clone());
    let anonymized = if options.anonymize || salt.is_some() {
        Some(config.anonymizer(salt).apply(&mut value))
    } else {
        None
    };

    let output_dir = options.output_dir.as_deref().unwrap_or(config.output_dir.as_path());
    let path = write_snapshot(&value, output_dir, &options.name)?;

    info!(path = %path.display(), report = %report, "Dump finished");
    Ok(DumpOutcome {
        path,
        report,
        codility,
        anonymized,
    })
}

/// Log the companies the credentials can see, as a hint for `companyId`.
///
/// Returns the listed companies; failures are logged and yield none.
pub async fn list_companies(fetcher: &RateLimitedFetcher) -> Vec<Value> {
    let url = match fetcher.url_for(COMPANIES_PATH) {
        Ok(url) => url,
        Err(e) => {
            error!(error = %e, "Cannot list companies");
            return Vec::new();
        },
    };

    let result = PaginatedReader::new(fetcher, crate::config::DEFAULT_PAGE_SIZE)
        .read_collection(&url, "companies")
        .await;
    if let Some(e) = result.failure {
        error!(error = %e, "Failed to list companies");
    }

    let companies = result.data.into_items();
    error!("No companyId in config. Set one of the following companies");
    for company in &companies {
        info!(company = %company, "Available company");
    }
    companies
}

/// Anonymize a previously written snapshot into `<file>.processed.json`.
///
/// Sensitive keys are hashed with `algorithm` and the optional `salt`.
pub fn postprocess(path: &Path, salt: Option<String>, algorithm: HashAlgorithm) -> Result<PathBuf> {
    let absolute = std::path::absolute(path)?;
    info!(path = %absolute.display(), "Loading snapshot");
    let mut value = read_json(&absolute)?;

    let stats = Anonymizer::new(algorithm, salt).apply(&mut value);

    let output = processed_path(&absolute);
    info!(
        path = %output.display(),
        hashed = stats.hashed,
        emails_split = stats.emails_split,
        "Saving processed snapshot"
    );
    write_json(&output, &value)?;
    Ok(output)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::endpoints::Step;
    use serde_json::json;

    #[test]
    fn test_source_selection() {
        assert!(Source::All.includes_ats() && Source::All.includes_codility());
        assert!(Source::Ats.includes_ats() && !Source::Ats.includes_codility());
        assert!(!Source::Codility.includes_ats());
    }

    #[test]
    fn test_effective_schedule_prefers_config() {
        let mut config = DumpConfig::default();
        assert_eq!(effective_schedule(&config).unwrap(), default_ats_schedule().unwrap());

        config.endpoints = Some(vec![Step::root("candidates", "candidates")]);
        assert_eq!(effective_schedule(&config).unwrap().len(), 1);

        config.endpoints = Some(vec![Step::extension(
            "candidates/{id}/Notes",
            "candidates",
            "candidateId",
            "notes",
        )]);
        assert!(matches!(effective_schedule(&config), Err(IngestError::Schedule(_))));
    }

    #[test]
    fn test_postprocess_writes_processed_file() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("db_dump_1.json");
        std::fs::write(&input, r#"{"candidates": [{"email": "A@B.com", "city": "Kraków"}]}"#).unwrap();

        let output = postprocess(&input, Some("s".to_string()), HashAlgorithm::Sha1).unwrap();

        assert_eq!(output, dir.path().join("db_dump_1.json.processed.json"));
        let value: Value = serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
        let candidate = &value["candidates"][0];
        assert_eq!(candidate["email_login"], "a");
        assert_eq!(candidate["email_domain"], "b.com");
        assert_eq!(candidate["city"], "Kraków");
        assert_eq!(
            candidate["email"],
            json!(hrdump_common::anonymize::hash_value(b"a@b.com", HashAlgorithm::Sha1, Some("s")))
        );
    }

    #[test]
    fn test_postprocess_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = postprocess(&dir.path().join("nope.json"), None, HashAlgorithm::Sha1).unwrap_err();
        assert!(matches!(err, IngestError::Common(_)));
    }

    #[tokio::test]
    async fn test_codility_only_requires_token() {
        let dir = tempfile::tempdir().unwrap();
        let options = DumpOptions {
            source: Source::Codility,
            output_dir: Some(dir.path().to_path_buf()),
            ..DumpOptions::default()
        };
        let err = run_dump(&DumpConfig::default(), &options).await.unwrap_err();
        assert!(matches!(err, IngestError::Config(_)));
    }

    #[tokio::test]
    async fn test_ats_requires_credentials() {
        let options = DumpOptions {
            source: Source::Ats,
            ..DumpOptions::default()
        };
        let err = run_dump(&DumpConfig::default(), &options).await.unwrap_err();
        assert!(err.to_string().contains("client_id"));
    }
}
