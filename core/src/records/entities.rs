use crate::normalizer::ToolStatus;
use crate::records::repository::{Draft, Record};
use crate::records::RecordError;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Employee {
    pub id: String,
    pub name: String,
    pub position: String,
    pub department: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EmployeeDraft {
    pub name: String,
    pub position: String,
    pub department: String,
}

impl EmployeeDraft {
    pub fn new(name: &str, position: &str, department: &str) -> Self {
        Self {
            name: name.to_string(),
            position: position.to_string(),
            department: department.to_string(),
        }
    }
}

impl Record for Employee {
    const KIND: &'static str = "employee";

    fn id(&self) -> &str {
        &self.id
    }
}

impl Draft for EmployeeDraft {
    type Record = Employee;

    fn validate(&self) -> Result<(), RecordError> {
        require("name", &self.name)?;
        require("position", &self.position)?;
        require("department", &self.department)
    }

    fn into_record(self, id: String) -> Employee {
        Employee {
            id,
            name: self.name.trim().to_string(),
            position: self.position.trim().to_string(),
            department: self.department.trim().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolSet {
    pub id: String,
    pub name: String,
    pub tools: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ToolSetDraft {
    pub name: String,
    pub tools: Vec<String>,
}

impl Record for ToolSet {
    const KIND: &'static str = "tool set";

    fn id(&self) -> &str {
        &self.id
    }
}

impl Draft for ToolSetDraft {
    type Record = ToolSet;

    fn validate(&self) -> Result<(), RecordError> {
        require("name", &self.name)?;
        if self.tools.iter().all(|tool| tool.trim().is_empty()) {
            return Err(RecordError::EmptyToolSet);
        }
        Ok(())
    }

    /// Blank tool names are dropped.
    fn into_record(self, id: String) -> ToolSet {
        ToolSet {
            id,
            name: self.name.trim().to_string(),
            tools: self
                .tools
                .into_iter()
                .map(|tool| tool.trim().to_string())
                .filter(|tool| !tool.is_empty())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssuanceStatus {
    Created,
    Issued,
    Completed,
}

impl fmt::Display for IssuanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            IssuanceStatus::Created => "created",
            IssuanceStatus::Issued => "issued",
            IssuanceStatus::Completed => "completed",
        };
        f.write_str(text)
    }
}

/// One registry tool as classified on an issue or return photo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssuedTool {
    pub tool_id: String,
    pub label: String,
    pub confidence: f64,
    pub status: ToolStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssuanceRecord {
    pub id: String,
    pub employee_id: String,
    pub tool_set_id: String,
    pub status: IssuanceStatus,
    pub issued_at: Option<String>,
    pub returned_at: Option<String>,
    pub issued_tools: Vec<IssuedTool>,
    pub returned_tools: Vec<IssuedTool>,
    pub match_percentage: Option<f64>,
}

fn require(field: &'static str, value: &str) -> Result<(), RecordError> {
    if value.trim().is_empty() {
        Err(RecordError::Blank { field })
    } else {
        Ok(())
    }
}
