use crate::normalizer::{ClassClassifier, ImageResult};
use crate::prelude::Threshold;
use crate::records::entities::{
    Employee, EmployeeDraft, IssuanceRecord, IssuanceStatus, IssuedTool, ToolSet, ToolSetDraft,
};
use crate::records::repository::{Draft, InMemoryRepository, Record, Repository};
use crate::records::RecordError;
use crate::registry::REGISTRY_SIZE;
use crate::telemetry::log::LogManager;
use chrono::Utc;
use uuid::Uuid;

/// Employees, tool sets and the issue/return records that tie them together.
pub struct IssuanceLedger {
    pub employees: InMemoryRepository<Employee>,
    pub tool_sets: InMemoryRepository<ToolSet>,
    records: Vec<IssuanceRecord>,
    logger: LogManager,
}

impl IssuanceLedger {
    pub fn new() -> Self {
        Self {
            employees: InMemoryRepository::new(),
            tool_sets: InMemoryRepository::new(),
            records: Vec::new(),
            logger: LogManager::new("ledger"),
        }
    }

    /// Ledger with the workshop's default staff and the lightweight aviation kit.
    pub fn seeded() -> Result<Self, RecordError> {
        let mut ledger = Self::new();
        for (name, position, department) in [
            ("Ivan Petrovich Ivanov", "Aviation technician", "MRO"),
            ("Alexey Sergeevich Petrov", "Engineer", "MRO"),
            ("Vladimir Mikhailovich Sidorov", "Mechanic", "Kitting"),
        ] {
            ledger
                .employees
                .create(EmployeeDraft::new(name, position, department))?;
        }
        ledger.tool_sets.create(ToolSetDraft {
            name: "Lightweight aviation tool kit RRJ/737/32S".into(),
            tools: crate::registry::TOOL_REGISTRY
                .iter()
                .map(|tool| tool.label.to_string())
                .collect(),
        })?;
        Ok(ledger)
    }

    pub fn records(&self) -> &[IssuanceRecord] {
        &self.records
    }

    pub fn record(&self, id: &str) -> Option<&IssuanceRecord> {
        self.records.iter().find(|record| record.id == id)
    }

    pub fn open(&mut self, employee_id: &str, tool_set_id: &str) -> Result<&IssuanceRecord, RecordError> {
        lookup::<EmployeeDraft>(&self.employees, employee_id)?;
        lookup::<ToolSetDraft>(&self.tool_sets, tool_set_id)?;

        let record = IssuanceRecord {
            id: Uuid::new_v4().to_string(),
            employee_id: employee_id.to_string(),
            tool_set_id: tool_set_id.to_string(),
            status: IssuanceStatus::Created,
            issued_at: None,
            returned_at: None,
            issued_tools: Vec::new(),
            returned_tools: Vec::new(),
            match_percentage: None,
        };
        self.logger
            .record(&format!("opened issuance {} for {}", record.id, employee_id));
        self.records.push(record);
        let idx = self.records.len() - 1;
        Ok(&self.records[idx])
    }

    /// Snapshots the tools seen on the issue photo.
    pub fn issue(
        &mut self,
        id: &str,
        image: &ImageResult,
        threshold: Threshold,
    ) -> Result<&IssuanceRecord, RecordError> {
        let tools = snapshot_tools(image, threshold)?;
        let record = self.transition(id, IssuanceStatus::Created, "issue")?;
        record.status = IssuanceStatus::Issued;
        record.issued_tools = tools;
        record.issued_at = Some(Utc::now().to_rfc3339());
        Ok(&*record)
    }

    /// Snapshots the return photo; the match is the share of registry tools detected on it.
    pub fn complete(
        &mut self,
        id: &str,
        image: &ImageResult,
        threshold: Threshold,
    ) -> Result<&IssuanceRecord, RecordError> {
        let tools = snapshot_tools(image, threshold)?;
        let detected = ClassClassifier::detected_count(image, threshold);
        let record = self.transition(id, IssuanceStatus::Issued, "complete")?;
        record.status = IssuanceStatus::Completed;
        record.returned_tools = tools;
        record.returned_at = Some(Utc::now().to_rfc3339());
        record.match_percentage = Some(detected as f64 / REGISTRY_SIZE as f64 * 100.0);
        Ok(&*record)
    }

    fn transition(
        &mut self,
        id: &str,
        expected: IssuanceStatus,
        action: &'static str,
    ) -> Result<&mut IssuanceRecord, RecordError> {
        let record = self
            .records
            .iter_mut()
            .find(|record| record.id == id)
            .ok_or_else(|| RecordError::NotFound {
                kind: "issuance record",
                id: id.to_string(),
            })?;
        if record.status != expected {
            return Err(RecordError::InvalidTransition {
                id: id.to_string(),
                status: record.status,
                action,
            });
        }
        self.logger.record(&format!("{} issuance {}", action, id));
        Ok(record)
    }
}

impl Default for IssuanceLedger {
    fn default() -> Self {
        Self::new()
    }
}

fn lookup<'a, D: Draft>(
    repository: &'a InMemoryRepository<D::Record>,
    id: &str,
) -> Result<&'a D::Record, RecordError> {
    Repository::<D>::get(repository, id).ok_or_else(|| RecordError::NotFound {
        kind: <D::Record as Record>::KIND,
        id: id.to_string(),
    })
}

fn snapshot_tools(image: &ImageResult, threshold: Threshold) -> Result<Vec<IssuedTool>, RecordError> {
    if let Some(error) = &image.error {
        return Err(RecordError::FailedImage(error.clone()));
    }
    Ok(ClassClassifier::classify_image(image, threshold)
        .into_iter()
        .filter(|classified| classified.finding.is_present())
        .map(|classified| IssuedTool {
            tool_id: classified.finding.tool_id.clone(),
            label: classified.finding.label.clone(),
            confidence: classified.finding.max_confidence,
            status: classified.status,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::TOOL_REGISTRY;
    use crate::wire::observation::DetectionObservation;

    fn image(confidences: &[(&str, f64)]) -> ImageResult {
        let observations: Vec<_> = confidences
            .iter()
            .map(|&(label, confidence)| DetectionObservation::new(label, confidence))
            .collect();
        let reduced = ClassClassifier::reduce(&observations);
        ImageResult {
            source_name: None,
            image_locator: None,
            findings: reduced.known,
            unknown_findings: reduced.unknown,
            error: None,
            detection_time_ms: None,
            image_confidence: None,
        }
    }

    fn threshold() -> Threshold {
        Threshold::new(0.85).unwrap()
    }

    fn open_default(ledger: &mut IssuanceLedger) -> String {
        let employee = Repository::<EmployeeDraft>::list(&ledger.employees)[0].id.clone();
        let tool_set = Repository::<ToolSetDraft>::list(&ledger.tool_sets)[0].id.clone();
        ledger.open(&employee, &tool_set).unwrap().id.clone()
    }

    #[test]
    fn seeded_ledger_has_default_staff_and_kit() {
        let ledger = IssuanceLedger::seeded().unwrap();
        assert_eq!(ledger.employees.len(), 3);
        assert_eq!(ledger.tool_sets.len(), 1);
        let kit = &Repository::<ToolSetDraft>::list(&ledger.tool_sets)[0];
        assert_eq!(kit.tools.len(), REGISTRY_SIZE);
    }

    #[test]
    fn issue_then_complete_records_match() {
        let mut ledger = IssuanceLedger::seeded().unwrap();
        let id = open_default(&mut ledger);

        let full: Vec<(&str, f64)> = TOOL_REGISTRY.iter().map(|tool| (tool.key, 0.95)).collect();
        let issued = ledger.issue(&id, &image(&full), threshold()).unwrap();
        assert_eq!(issued.status, IssuanceStatus::Issued);
        assert_eq!(issued.issued_tools.len(), REGISTRY_SIZE);
        assert!(issued.issued_at.is_some());

        let returned: Vec<(&str, f64)> = full.iter().take(8).cloned().collect();
        let completed = ledger.complete(&id, &image(&returned), threshold()).unwrap();
        assert_eq!(completed.status, IssuanceStatus::Completed);
        let expected = 8.0 / REGISTRY_SIZE as f64 * 100.0;
        assert!((completed.match_percentage.unwrap() - expected).abs() < 1e-9);
        assert_eq!(completed.returned_tools.len(), 8);
    }

    #[test]
    fn complete_before_issue_is_rejected() {
        let mut ledger = IssuanceLedger::seeded().unwrap();
        let id = open_default(&mut ledger);
        let err = ledger.complete(&id, &image(&[]), threshold()).unwrap_err();
        assert!(matches!(
            err,
            RecordError::InvalidTransition {
                status: IssuanceStatus::Created,
                ..
            }
        ));
    }

    #[test]
    fn open_requires_known_employee() {
        let mut ledger = IssuanceLedger::seeded().unwrap();
        let tool_set = Repository::<ToolSetDraft>::list(&ledger.tool_sets)[0].id.clone();
        let err = ledger.open("nobody", &tool_set).unwrap_err();
        assert_eq!(
            err,
            RecordError::NotFound {
                kind: "employee",
                id: "nobody".into()
            }
        );
    }

    #[test]
    fn failed_photo_cannot_be_issued() {
        let mut ledger = IssuanceLedger::seeded().unwrap();
        let id = open_default(&mut ledger);
        let failed = ImageResult::failed(None, None, "timeout");
        assert_eq!(
            ledger.issue(&id, &failed, threshold()).unwrap_err(),
            RecordError::FailedImage("timeout".into())
        );
        assert_eq!(ledger.record(&id).unwrap().status, IssuanceStatus::Created);
    }
}
