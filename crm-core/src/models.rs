use chrono::{DateTime, NaiveDate, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Identifier shared by every entity type; assigned as max + 1 on create
pub type EntityId = u64;

/// Basic address pattern used by the contact form
static EMAIL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email regex"));

/// Error returned when parsing an enum from user input fails
#[derive(Debug, Error)]
#[error("Unknown {kind} '{value}' (expected one of: {expected})")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
    pub expected: &'static str,
}

/// Pipeline stage of a deal
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum DealStatus {
    #[default]
    Lead,
    Negotiation,
    Won,
    Lost,
}

impl DealStatus {
    pub const ALL: [DealStatus; 4] = [
        DealStatus::Lead,
        DealStatus::Negotiation,
        DealStatus::Won,
        DealStatus::Lost,
    ];

    /// Lead and negotiation deals are still in play
    pub fn is_active(&self) -> bool {
        matches!(self, DealStatus::Lead | DealStatus::Negotiation)
    }
}

impl fmt::Display for DealStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DealStatus::Lead => write!(f, "lead"),
            DealStatus::Negotiation => write!(f, "negotiation"),
            DealStatus::Won => write!(f, "won"),
            DealStatus::Lost => write!(f, "lost"),
        }
    }
}

impl FromStr for DealStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "lead" => Ok(DealStatus::Lead),
            "negotiation" => Ok(DealStatus::Negotiation),
            "won" => Ok(DealStatus::Won),
            "lost" => Ok(DealStatus::Lost),
            _ => Err(UnknownVariant {
                kind: "deal status",
                value: s.to_string(),
                expected: "lead, negotiation, won, lost",
            }),
        }
    }
}

/// The kind of record a task is attached to
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum RelatedType {
    #[default]
    Contact,
    Deal,
}

impl fmt::Display for RelatedType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelatedType::Contact => write!(f, "contact"),
            RelatedType::Deal => write!(f, "deal"),
        }
    }
}

impl FromStr for RelatedType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "contact" => Ok(RelatedType::Contact),
            "deal" => Ok(RelatedType::Deal),
            _ => Err(UnknownVariant {
                kind: "related type",
                value: s.to_string(),
                expected: "contact, deal",
            }),
        }
    }
}

/// A person the team is in touch with
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    #[serde(rename = "Id")]
    pub id: EntityId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_contact_date: Option<NaiveDate>,
    /// Records without a timestamp load as the Unix epoch
    #[serde(default)]
    pub created_at: DateTime<Utc>,
}

/// A sales opportunity tied to a contact
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Deal {
    #[serde(rename = "Id")]
    pub id: EntityId,
    pub name: String,
    /// Not checked against the contact store; dangling references are allowed
    pub contact_id: EntityId,
    pub value: f64,
    #[serde(default)]
    pub status: DealStatus,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: DateTime<Utc>,
}

/// A follow-up item attached to a contact or a deal
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    #[serde(rename = "Id")]
    pub id: EntityId,
    pub description: String,
    pub due_date: NaiveDate,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub related_to: RelatedType,
    #[serde(default)]
    pub related_id: Option<EntityId>,
    #[serde(default)]
    pub created_at: DateTime<Utc>,
}

/// How pressing a task is relative to a given day
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskUrgency {
    Completed,
    Overdue,
    DueToday,
    Upcoming,
}

impl Task {
    /// Classifies the task the way the task list highlights it
    pub fn urgency(&self, today: NaiveDate) -> TaskUrgency {
        if self.completed {
            TaskUrgency::Completed
        } else if self.due_date < today {
            TaskUrgency::Overdue
        } else if self.due_date == today {
            TaskUrgency::DueToday
        } else {
            TaskUrgency::Upcoming
        }
    }
}

// =========================================================================
// Drafts and patches
// =========================================================================

/// Fields for a contact that does not exist yet
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewContact {
    pub name: String,
    pub company: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub last_contact_date: Option<NaiveDate>,
}

/// Fields for a deal that does not exist yet
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewDeal {
    pub name: String,
    pub contact_id: Option<EntityId>,
    pub value: f64,
    pub status: DealStatus,
    pub notes: Option<String>,
}

/// Fields for a task that does not exist yet
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewTask {
    pub description: String,
    pub due_date: Option<NaiveDate>,
    pub completed: bool,
    pub related_to: RelatedType,
    pub related_id: Option<EntityId>,
}

/// Field-level update for a contact. `None` leaves a field untouched;
/// `Some(None)` clears an optional field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContactPatch {
    pub name: Option<String>,
    pub company: Option<Option<String>>,
    pub email: Option<Option<String>>,
    pub phone: Option<Option<String>>,
    pub last_contact_date: Option<Option<NaiveDate>>,
}

/// Field-level update for a deal.
///
/// `notes` is not optional in the merge: an update without notes clears them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DealPatch {
    pub name: Option<String>,
    pub contact_id: Option<EntityId>,
    pub value: Option<f64>,
    pub status: Option<DealStatus>,
    pub notes: Option<String>,
}

/// Field-level update for a task
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskPatch {
    pub description: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub completed: Option<bool>,
    pub related_to: Option<RelatedType>,
    pub related_id: Option<Option<EntityId>>,
}

impl Contact {
    pub(crate) fn from_draft(id: EntityId, draft: NewContact, now: DateTime<Utc>) -> Self {
        Self {
            id,
            name: draft.name.trim().to_string(),
            company: non_blank(draft.company),
            email: non_blank(draft.email),
            phone: non_blank(draft.phone),
            last_contact_date: draft.last_contact_date,
            created_at: now,
        }
    }

    pub(crate) fn apply(&mut self, patch: ContactPatch) {
        if let Some(name) = patch.name {
            self.name = name.trim().to_string();
        }
        if let Some(company) = patch.company {
            self.company = non_blank(company);
        }
        if let Some(email) = patch.email {
            self.email = non_blank(email);
        }
        if let Some(phone) = patch.phone {
            self.phone = non_blank(phone);
        }
        if let Some(date) = patch.last_contact_date {
            self.last_contact_date = date;
        }
    }
}

impl Deal {
    pub(crate) fn from_draft(id: EntityId, draft: NewDeal, now: DateTime<Utc>) -> Self {
        Self {
            id,
            name: draft.name.trim().to_string(),
            contact_id: draft.contact_id.unwrap_or_default(),
            value: draft.value,
            status: draft.status,
            notes: draft.notes.unwrap_or_default(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Merges the patch, overwriting notes and refreshing `updated_at`
    pub fn apply(&mut self, patch: DealPatch, now: DateTime<Utc>) {
        if let Some(name) = patch.name {
            self.name = name.trim().to_string();
        }
        if let Some(contact_id) = patch.contact_id {
            self.contact_id = contact_id;
        }
        if let Some(value) = patch.value {
            self.value = value;
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        self.notes = patch.notes.unwrap_or_default();
        self.updated_at = now;
    }
}

impl Task {
    pub(crate) fn from_draft(id: EntityId, draft: NewTask, now: DateTime<Utc>) -> Self {
        Self {
            id,
            description: draft.description.trim().to_string(),
            due_date: draft.due_date.unwrap_or_else(|| now.date_naive()),
            completed: draft.completed,
            related_to: draft.related_to,
            related_id: draft.related_id,
            created_at: now,
        }
    }

    pub(crate) fn apply(&mut self, patch: TaskPatch) {
        if let Some(description) = patch.description {
            self.description = description.trim().to_string();
        }
        if let Some(due_date) = patch.due_date {
            self.due_date = due_date;
        }
        if let Some(completed) = patch.completed {
            self.completed = completed;
        }
        if let Some(related_to) = patch.related_to {
            self.related_to = related_to;
        }
        if let Some(related_id) = patch.related_id {
            self.related_id = related_id;
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

// =========================================================================
// Validation
// =========================================================================

/// Field-level validation failures, keyed by field name
#[derive(Debug, Clone, Default, PartialEq, Eq, Error)]
#[error("Validation failed ({})", self.joined())]
pub struct ValidationErrors {
    fields: BTreeMap<&'static str, String>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.fields.entry(field).or_insert_with(|| message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Message for a single field, if it failed
    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(|s| s.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> {
        self.fields.iter().map(|(k, v)| (*k, v.as_str()))
    }

    fn joined(&self) -> String {
        self.fields
            .iter()
            .map(|(field, msg)| format!("{}: {}", field, msg))
            .collect::<Vec<_>>()
            .join("; ")
    }

    fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}


/// Boundary validation for drafts and patches
pub trait Validate {
    fn validate(&self) -> Result<(), ValidationErrors>;
}

fn check_name(errors: &mut ValidationErrors, field: &'static str, value: &str, message: &str) {
    if value.trim().is_empty() {
        errors.add(field, message);
    }
}

fn check_email(errors: &mut ValidationErrors, email: Option<&str>) {
    if let Some(email) = email.map(str::trim).filter(|e| !e.is_empty()) {
        if !EMAIL_PATTERN.is_match(email) {
            errors.add("email", "Invalid email format");
        }
    }
}

fn check_value(errors: &mut ValidationErrors, value: f64) {
    if !value.is_finite() || value <= 0.0 {
        errors.add("value", "Value must be greater than 0");
    }
}

impl Validate for NewContact {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        check_name(&mut errors, "name", &self.name, "Name is required");
        check_email(&mut errors, self.email.as_deref());
        errors.into_result()
    }
}

impl Validate for ContactPatch {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if let Some(name) = &self.name {
            check_name(&mut errors, "name", name, "Name is required");
        }
        if let Some(email) = &self.email {
            check_email(&mut errors, email.as_deref());
        }
        errors.into_result()
    }
}

impl Validate for NewDeal {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        check_name(&mut errors, "name", &self.name, "Deal name is required");
        if self.contact_id.is_none() {
            errors.add("contactId", "Contact is required");
        }
        check_value(&mut errors, self.value);
        errors.into_result()
    }
}

impl Validate for DealPatch {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if let Some(name) = &self.name {
            check_name(&mut errors, "name", name, "Deal name is required");
        }
        if let Some(value) = self.value {
            check_value(&mut errors, value);
        }
        errors.into_result()
    }
}

impl Validate for NewTask {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        check_name(&mut errors, "description", &self.description, "Description is required");
        if self.due_date.is_none() {
            errors.add("dueDate", "Due date is required");
        }
        errors.into_result()
    }
}

impl Validate for TaskPatch {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if let Some(description) = &self.description {
            check_name(&mut errors, "description", description, "Description is required");
        }
        errors.into_result()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_contact_validation_messages() {
        let draft = NewContact {
            name: "   ".into(),
            email: Some("not-an-email".into()),
            ..Default::default()
        };
        let errors = draft.validate().unwrap_err();
        assert_eq!(errors.get("name"), Some("Name is required"));
        assert_eq!(errors.get("email"), Some("Invalid email format"));

        let ok = NewContact {
            name: "Jane Doe".into(),
            email: Some("jane@example.com".into()),
            ..Default::default()
        };
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn test_blank_email_is_allowed() {
        let draft = NewContact {
            name: "Jane".into(),
            email: Some("  ".into()),
            ..Default::default()
        };
        assert!(draft.validate().is_ok());
    }

    #[test]
    fn test_deal_validation_messages() {
        let draft = NewDeal {
            name: "".into(),
            contact_id: None,
            value: 0.0,
            ..Default::default()
        };
        let errors = draft.validate().unwrap_err();
        assert_eq!(errors.get("name"), Some("Deal name is required"));
        assert_eq!(errors.get("contactId"), Some("Contact is required"));
        assert_eq!(errors.get("value"), Some("Value must be greater than 0"));
    }

    #[test]
    fn test_task_validation_messages() {
        let errors = NewTask::default().validate().unwrap_err();
        assert_eq!(errors.get("description"), Some("Description is required"));
        assert_eq!(errors.get("dueDate"), Some("Due date is required"));
    }

    #[test]
    fn test_patch_validation_only_checks_provided_fields() {
        assert!(DealPatch::default().validate().is_ok());
        let bad = DealPatch {
            value: Some(-5.0),
            ..Default::default()
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_deal_patch_always_overwrites_notes() {
        let created = Utc::now();
        let mut deal = Deal::from_draft(
            1,
            NewDeal {
                name: "Acme".into(),
                contact_id: Some(1),
                value: 100.0,
                status: DealStatus::Lead,
                notes: Some("keep me?".into()),
            },
            created,
        );
        let later = created + chrono::Duration::seconds(5);
        deal.apply(
            DealPatch {
                status: Some(DealStatus::Negotiation),
                ..Default::default()
            },
            later,
        );
        assert_eq!(deal.notes, "");
        assert_eq!(deal.status, DealStatus::Negotiation);
        assert_eq!(deal.updated_at, later);
        assert_eq!(deal.created_at, created);
    }

    #[test]
    fn test_contact_patch_clears_optional_field() {
        let mut contact = Contact::from_draft(
            1,
            NewContact {
                name: "Jane".into(),
                company: Some("Acme".into()),
                ..Default::default()
            },
            Utc::now(),
        );
        contact.apply(ContactPatch {
            company: Some(None),
            ..Default::default()
        });
        assert_eq!(contact.company, None);
        assert_eq!(contact.name, "Jane");
    }

    #[test]
    fn test_task_urgency() {
        let today = date("2024-03-10");
        let mut task = Task {
            id: 1,
            description: "Call".into(),
            due_date: date("2024-03-09"),
            completed: false,
            related_to: RelatedType::Contact,
            related_id: None,
            created_at: Utc::now(),
        };
        assert_eq!(task.urgency(today), TaskUrgency::Overdue);
        task.due_date = today;
        assert_eq!(task.urgency(today), TaskUrgency::DueToday);
        task.due_date = date("2024-03-11");
        assert_eq!(task.urgency(today), TaskUrgency::Upcoming);
        task.completed = true;
        assert_eq!(task.urgency(today), TaskUrgency::Completed);
    }

    #[test]
    fn test_persisted_layout_uses_capital_id_and_camel_case() {
        let deal = Deal::from_draft(
            7,
            NewDeal {
                name: "Acme".into(),
                contact_id: Some(2),
                value: 10.0,
                ..Default::default()
            },
            Utc::now(),
        );
        let json = serde_json::to_value(&deal).unwrap();
        assert_eq!(json["Id"], 7);
        assert_eq!(json["contactId"], 2);
        assert_eq!(json["status"], "lead");
        assert!(json.get("updatedAt").is_some());
    }

    #[test]
    fn test_status_parsing() {
        assert_eq!("Won".parse::<DealStatus>().unwrap(), DealStatus::Won);
        assert!("closed".parse::<DealStatus>().is_err());
        assert_eq!("deal".parse::<RelatedType>().unwrap(), RelatedType::Deal);
    }

    #[test]
    fn test_validation_errors_display_lists_fields() {
        let errors = NewDeal::default().validate().unwrap_err();
        assert_eq!(
            errors.to_string(),
            "Validation failed (contactId: Contact is required; name: Deal name is required; value: Value must be greater than 0)"
        );
    }
}
