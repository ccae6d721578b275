//! Relation rewriting
//!
//! Applications arrive nested under their recruitment. They are promoted to a
//! top-level `applications` collection so that per-application endpoints can
//! extend them like any other collection.

use crate::document::Document;
use crate::endpoints::{APPLICATIONS, RECRUITMENTS};
use serde_json::Value;
use tracing::{debug, info, warn};

/// Keys under which a recruitment may carry its applications.
pub const NESTED_APPLICATION_KEYS: [&str; 3] = ["applications", "candidateApplications", "candidateapplications"];

/// Back-reference written on every hoisted application.
pub const RECRUITMENT_ID_KEY: &str = "recruitmentId";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HoistSummary {
    pub recruitments: usize,
    pub hoisted: usize,
    /// Recruitments without nested applications
    pub skipped: usize,
    pub warnings: Vec<String>,
}

/// Move applications nested under recruitments into `applications`.
///
/// Every hoisted record gets `recruitmentId` set to its recruitment's `id`
/// and the nested keys are removed from the recruitment; records under
/// several synonym keys are merged in [`NESTED_APPLICATION_KEYS`] order. Records are appended
/// in recruitment order, then nested order. Without a `recruitments`
/// collection the document is left untouched.
pub fn hoist_applications(document: &mut Document) -> HoistSummary {
    let mut summary = HoistSummary::default();

    let Some(recruitments) = document.collection_mut(RECRUITMENTS) else {
        let message = format!("No {} in document, cannot process {}", RECRUITMENTS, APPLICATIONS);
        warn!("{}", message);
        summary.warnings.push(message);
        return summary;
    };

    let mut hoisted = Vec::new();
    for recruitment in recruitments.iter_mut() {
        summary.recruitments += 1;

        let Some(fields) = recruitment.as_object_mut() else {
            warn!("Skipping recruitment that is not an object");
            summary.skipped += 1;
            continue;
        };
        let recruitment_id = fields.get("id").cloned().unwrap_or(Value::Null);
        let nested: Vec<Value> = NESTED_APPLICATION_KEYS
            .iter()
            .filter_map(|key| fields.remove(*key))
            .collect();
        if nested.is_empty() {
            debug!(recruitment = %recruitment_id, "Recruitment has no applications");
            summary.skipped += 1;
            continue;
        }

        if recruitment_id.is_null() {
            let message = "Recruitment without id, hoisting its applications with a null recruitmentId".to_string();
            warn!("{}", message);
            summary.warnings.push(message);
        }

        let records = nested.into_iter().flat_map(|value| match value {
            Value::Array(records) => records,
            Value::Null => Vec::new(),
            single => vec![single],
        });
        for mut record in records {
            match record.as_object_mut() {
                Some(fields) => {
                    fields.insert(RECRUITMENT_ID_KEY.to_string(), recruitment_id.clone());
                },
                None => warn!(recruitment = %recruitment_id, "Application is not an object, hoisted without recruitmentId"),
            }
            hoisted.push(record);
        }
    }

    summary.hoisted = hoisted.len();
    document.extend(APPLICATIONS, hoisted);

    info!(
        recruitments = summary.recruitments,
        applications = summary.hoisted,
        skipped = summary.skipped,
        "Hoisted applications"
    );
    summary
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn document_with(recruitments: Vec<Value>) -> Document {
        let mut doc = Document::new();
        doc.extend(RECRUITMENTS, recruitments);
        doc
    }

    #[test]
    fn test_hoist_is_total_and_order_preserving() {
        let mut doc = document_with(vec![
            json!({"id": 10, "applications": [{"applicationId": 1}, {"applicationId": 2}]}),
            json!({"id": 11, "candidateApplications": [{"applicationId": 3}]}),
            json!({"id": 12}),
        ]);

        let summary = hoist_applications(&mut doc);

        assert_eq!(summary.recruitments, 3);
        assert_eq!(summary.hoisted, 3);
        assert_eq!(summary.skipped, 1);
        assert_eq!(
            doc.collection(APPLICATIONS).unwrap(),
            &[
                json!({"applicationId": 1, "recruitmentId": 10}),
                json!({"applicationId": 2, "recruitmentId": 10}),
                json!({"applicationId": 3, "recruitmentId": 11}),
            ]
        );
    }

    #[test]
    fn test_nested_key_is_removed() {
        let mut doc = document_with(vec![json!({"id": "r1", "name": "Dev", "applications": []})]);
        hoist_applications(&mut doc);

        assert_eq!(doc.collection(RECRUITMENTS).unwrap(), &[json!({"id": "r1", "name": "Dev"})]);
        assert_eq!(doc.collection(APPLICATIONS).unwrap().len(), 0);
    }

    #[test]
    fn test_missing_recruitments_leaves_document_unchanged() {
        let mut doc = Document::new();
        doc.extend("candidates", [json!({"candidateId": 1})]);
        let before = doc.clone();

        let summary = hoist_applications(&mut doc);

        assert_eq!(doc, before);
        assert!(!doc.contains(APPLICATIONS));
        assert_eq!(summary.warnings.len(), 1);
    }

    #[test]
    fn test_existing_applications_are_extended() {
        let mut doc = document_with(vec![json!({"id": 2, "applications": [{"applicationId": 9}]})]);
        doc.extend(APPLICATIONS, [json!({"applicationId": 8})]);

        hoist_applications(&mut doc);

        let apps = doc.collection(APPLICATIONS).unwrap();
        assert_eq!(apps.len(), 2);
        assert_eq!(apps[1]["recruitmentId"], 2);
    }

    #[test]
    fn test_recruitment_without_id_is_annotated_with_null() {
        let mut doc = document_with(vec![json!({"applications": [{"applicationId": 5}]})]);
        let summary = hoist_applications(&mut doc);

        assert_eq!(doc.collection(APPLICATIONS).unwrap()[0]["recruitmentId"], Value::Null);
        assert_eq!(summary.warnings.len(), 1);
    }

    #[test]
    fn test_every_synonym_key_is_hoisted() {
        let mut doc = document_with(vec![json!({
            "id": 4,
            "candidateApplications": [{"applicationId": 2}],
            "applications": [{"applicationId": 1}],
            "candidateapplications": {"applicationId": 3}
        })]);

        let summary = hoist_applications(&mut doc);

        assert_eq!(summary.hoisted, 3);
        assert_eq!(doc.collection(RECRUITMENTS).unwrap(), &[json!({"id": 4})]);
        let ids: Vec<&Value> = doc
            .collection(APPLICATIONS)
            .unwrap()
            .iter()
            .map(|app| &app["applicationId"])
            .collect();
        assert_eq!(ids, [&json!(1), &json!(2), &json!(3)]);
    }
}
