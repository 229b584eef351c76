use crate::records::RecordError;
use crate::telemetry::log::LogManager;
use uuid::Uuid;

pub trait Record: Clone {
    /// Human name of the record type, used in lookup errors.
    const KIND: &'static str;

    fn id(&self) -> &str;
}

/// Unsaved record content; the repository assigns the id.
pub trait Draft {
    type Record: Record;

    fn validate(&self) -> Result<(), RecordError>;

    fn into_record(self, id: String) -> Self::Record;
}

pub trait Repository<D: Draft> {
    fn create(&mut self, draft: D) -> Result<D::Record, RecordError>;

    fn delete(&mut self, id: &str) -> Result<D::Record, RecordError>;

    fn get(&self, id: &str) -> Option<&D::Record>;

    fn list(&self) -> &[D::Record];
}

/// Insertion-ordered store with UUID v4 ids.
pub struct InMemoryRepository<T> {
    items: Vec<T>,
    logger: LogManager,
}

impl<T> InMemoryRepository<T> {
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            logger: LogManager::new("records"),
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<T> Default for InMemoryRepository<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: Draft> Repository<D> for InMemoryRepository<D::Record> {
    fn create(&mut self, draft: D) -> Result<D::Record, RecordError> {
        draft.validate()?;
        let record = draft.into_record(Uuid::new_v4().to_string());
        self.logger.detail(&format!(
            "created {} {}",
            <D::Record as Record>::KIND,
            record.id()
        ));
        self.items.push(record.clone());
        Ok(record)
    }

    fn delete(&mut self, id: &str) -> Result<D::Record, RecordError> {
        let position = self
            .items
            .iter()
            .position(|item| item.id() == id)
            .ok_or_else(|| RecordError::NotFound {
                kind: <D::Record as Record>::KIND,
                id: id.to_string(),
            })?;
        Ok(self.items.remove(position))
    }

    fn get(&self, id: &str) -> Option<&D::Record> {
        self.items.iter().find(|item| item.id() == id)
    }

    fn list(&self) -> &[D::Record] {
        &self.items
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::entities::{Employee, EmployeeDraft};

    #[test]
    fn created_records_get_unique_ids() {
        let mut repository: InMemoryRepository<Employee> = InMemoryRepository::new();
        let first = repository
            .create(EmployeeDraft::new("Ivan Ivanov", "Technician", "MRO"))
            .unwrap();
        let second = repository
            .create(EmployeeDraft::new("Ivan Ivanov", "Technician", "MRO"))
            .unwrap();
        assert_ne!(first.id, second.id);
        assert_eq!(Repository::<EmployeeDraft>::list(&repository).len(), 2);
        assert_eq!(
            Repository::<EmployeeDraft>::get(&repository, &second.id),
            Some(&second)
        );
    }

    #[test]
    fn invalid_draft_is_not_stored() {
        let mut repository: InMemoryRepository<Employee> = InMemoryRepository::new();
        assert!(repository.create(EmployeeDraft::new("", "Technician", "MRO")).is_err());
        assert!(repository.is_empty());
    }

    #[test]
    fn delete_unknown_id_reports_kind() {
        let mut repository: InMemoryRepository<Employee> = InMemoryRepository::new();
        let err = Repository::<EmployeeDraft>::delete(&mut repository, "missing").unwrap_err();
        assert_eq!(
            err,
            RecordError::NotFound {
                kind: "employee",
                id: "missing".into()
            }
        );
    }
}
