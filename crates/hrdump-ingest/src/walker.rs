//! Endpoint graph walker
//!
//! Executes a [`Schedule`] step by step against one API, writing into a
//! single [`Document`]. Steps run strictly in declaration order, so every
//! root fetch of a collection completes before the extensions reading it,
//! and the application hoist completes before application extensions.
//!
//! Failures are contained: a failed root leaves an empty collection, a failed
//! extension item is left without the new key, and a step whose source
//! collection is missing is skipped. Nothing here aborts the run.

use crate::assemble::hoist_applications;
use crate::document::{find_item_mut, item_id, Document};
use crate::endpoints::{Schedule, Step, ID_PLACEHOLDER};
use crate::reader::PaginatedReader;
use serde_json::Value;
use std::fmt;
use tracing::{debug, info, warn};

/// What happened during a walk
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub pages: usize,
    pub items_attached: usize,
    pub failed_items: usize,
    pub skipped_steps: usize,
    pub warnings: Vec<String>,
}

impl RunReport {
    fn warn(&mut self, message: String) {
        warn!("{}", message);
        self.warnings.push(message);
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} pages, {} items extended, {} failed items, {} skipped steps, {} warnings",
            self.pages,
            self.items_attached,
            self.failed_items,
            self.skipped_steps,
            self.warnings.len()
        )
    }
}

pub struct EndpointWalker<'a> {
    reader: PaginatedReader<'a>,
}

impl<'a> EndpointWalker<'a> {
    pub fn new(reader: PaginatedReader<'a>) -> Self {
        Self { reader }
    }

    /// Run `schedule` into a fresh document.
    pub async fn run(&self, schedule: &Schedule) -> (Document, RunReport) {
        let mut document = Document::new();
        let report = self.run_into(schedule, &mut document).await;
        (document, report)
    }

    /// Run `schedule`, adding to an existing document.
    pub async fn run_into(&self, schedule: &Schedule, document: &mut Document) -> RunReport {
        let mut report = RunReport::default();

        for (index, step) in schedule.steps().iter().enumerate() {
            debug!(index, step = %step, "Running step");
            match step {
                Step::Root {
                    path,
                    collection_key,
                    target,
                } => self.root(path, collection_key, target, document, &mut report).await,
                Step::Extension {
                    path,
                    source,
                    id_field,
                    target,
                } => {
                    self.extension(path, source, id_field, target, document, &mut report)
                        .await
                },
                Step::HoistApplications => {
                    let summary = hoist_applications(document);
                    report.warnings.extend(summary.warnings);
                },
            }
        }

        info!(report = %report, "Endpoint walk finished");
        report
    }

    async fn root(
        &self,
        path: &str,
        collection_key: &str,
        target: &str,
        document: &mut Document,
        report: &mut RunReport,
    ) {
        document.ensure_collection(target);

        let url = match self.reader.fetcher().url_for(path) {
            Ok(url) => url,
            Err(e) => {
                report.skipped_steps += 1;
                report.warn(format!("Skipping {}: {}", path, e));
                return;
            },
        };

        let result = self.reader.read_collection(&url, collection_key).await;
        report.pages += result.pages;
        report.warnings.extend(result.warnings);
        if let Some(e) = result.failure {
            report.warnings.push(format!("Collection {} is incomplete: {}", target, e));
        }

        let items = result.data.into_items();
        info!(collection = %target, count = items.len(), "Fetched collection");
        document.extend(target, items);
    }

    async fn extension(
        &self,
        path: &str,
        source: &str,
        id_field: &str,
        target: &str,
        document: &mut Document,
        report: &mut RunReport,
    ) {
        let Some(items) = document.collection(source) else {
            report.skipped_steps += 1;
            report.warn(format!("Skipping path {}. Collection {} not present in document", path, source));
            return;
        };

        // Ids are read up front; attachment re-scans the collection by id.
        let ids: Vec<Option<String>> = items.iter().map(|item| item_id(item, id_field)).collect();
        if ids.is_empty() {
            report.warn(format!("Skipping path {}. Collection {} is empty", path, source));
            return;
        }

        let mut attached = 0;
        for id in ids {
            let Some(id) = id else {
                report.failed_items += 1;
                report.warn(format!("Item of {} has no usable {}, not fetching {}", source, id_field, path));
                continue;
            };

            let url = match self.reader.fetcher().url_for(&path.replace(ID_PLACEHOLDER, &id)) {
                Ok(url) => url,
                Err(e) => {
                    report.failed_items += 1;
                    report.warn(format!("Skipping {} {}: {}", source, id, e));
                    continue;
                },
            };

            let mut result = self.reader.read_collection(&url, target).await;
            report.pages += result.pages;
            report.warnings.append(&mut result.warnings);
            if result.failed_outright() {
                report.failed_items += 1;
                if let Some(e) = result.failure {
                    report.warn(format!("Skipping {} for {} {}: {}", target, source, id, e));
                }
                continue;
            }

            let value = result.data.into_value();
            let item = document
                .collection_mut(source)
                .and_then(|items| find_item_mut(items, id_field, &id));
            match item {
                Some(Value::Object(fields)) => {
                    fields.insert(target.to_string(), value);
                    attached += 1;
                },
                Some(_) => {
                    report.failed_items += 1;
                    report.warn(format!("{} {} is not an object, cannot attach {}", source, id, target));
                },
                None => {
                    report.failed_items += 1;
                    report.warn(format!("{} {} disappeared before {} could be attached", source, id, target));
                },
            }
        }

        report.items_attached += attached;
        info!(collection = %source, key = %target, attached, "Extended collection");
    }
}
