use std::borrow::Cow;

use chrono::NaiveDateTime;
use ims_core::models::{Interaction, InteractionInput, InteractionType};
use validator::{Validate, ValidationError};

use crate::controller::{FormDraft, FormField};
use crate::errors::FieldErrors;

const DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"];
const DATETIME_OUT: &str = "%Y-%m-%dT%H:%M";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InteractionField {
    Title,
    Type,
    Lead,
    StartDatetime,
    EndDatetime,
    Timezone,
    Location,
    Description,
    Notes,
}

impl FormField for InteractionField {
    fn name(&self) -> &'static str {
        match self {
            InteractionField::Title => "title",
            InteractionField::Type => "type",
            InteractionField::Lead => "lead",
            InteractionField::StartDatetime => "start_datetime",
            InteractionField::EndDatetime => "end_datetime",
            InteractionField::Timezone => "timezone",
            InteractionField::Location => "location",
            InteractionField::Description => "description",
            InteractionField::Notes => "notes",
        }
    }
}

fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("required").with_message(Cow::Borrowed("is required")));
    }
    Ok(())
}

/// Create/edit form for an interaction, as typed by the user.
#[derive(Debug, Clone, PartialEq, Validate)]
pub struct InteractionDraft {
    #[validate(
        custom(function = "not_blank"),
        length(max = 200, message = "must be at most 200 characters")
    )]
    pub title: String,
    /// Checked by hand so its errors are keyed `type`.
    pub interaction_type: String,
    #[validate(length(max = 200, message = "must be at most 200 characters"))]
    pub lead: String,
    #[validate(custom(function = "not_blank"))]
    pub start_datetime: String,
    #[validate(custom(function = "not_blank"))]
    pub end_datetime: String,
    #[validate(custom(function = "not_blank"))]
    pub timezone: String,
    #[validate(length(max = 200, message = "must be at most 200 characters"))]
    pub location: String,
    #[validate(length(max = 2000, message = "must be at most 2000 characters"))]
    pub description: String,
    #[validate(length(max = 5000, message = "must be at most 5000 characters"))]
    pub notes: String,
}

impl Default for InteractionDraft {
    fn default() -> Self {
        Self {
            title: String::new(),
            interaction_type: InteractionType::Meeting.to_string(),
            lead: String::new(),
            start_datetime: String::new(),
            end_datetime: String::new(),
            timezone: "UTC".to_string(),
            location: String::new(),
            description: String::new(),
            notes: String::new(),
        }
    }
}

impl InteractionDraft {
    /// Prefill an edit form.
    pub fn from_interaction(i: &Interaction) -> Self {
        Self {
            title: i.title.clone(),
            interaction_type: i.interaction_type.to_string(),
            lead: i.lead.clone().unwrap_or_default(),
            start_datetime: i.start_datetime.format(DATETIME_OUT).to_string(),
            end_datetime: i.end_datetime.format(DATETIME_OUT).to_string(),
            timezone: i.timezone.clone(),
            location: i.location.clone().unwrap_or_default(),
            description: i.description.clone().unwrap_or_default(),
            notes: i.notes.clone().unwrap_or_default(),
        }
    }
}

fn parse_datetime(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    DATETIME_FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(raw, f).ok())
}

fn optional(raw: &str) -> Option<String> {
    let t = raw.trim();
    (!t.is_empty()).then(|| t.to_string())
}

impl FormDraft for InteractionDraft {
    type Field = InteractionField;
    type Output = InteractionInput;

    fn set(&mut self, field: InteractionField, value: &str) {
        let slot = match field {
            InteractionField::Title => &mut self.title,
            InteractionField::Type => &mut self.interaction_type,
            InteractionField::Lead => &mut self.lead,
            InteractionField::StartDatetime => &mut self.start_datetime,
            InteractionField::EndDatetime => &mut self.end_datetime,
            InteractionField::Timezone => &mut self.timezone,
            InteractionField::Location => &mut self.location,
            InteractionField::Description => &mut self.description,
            InteractionField::Notes => &mut self.notes,
        };
        *slot = value.to_string();
    }

    fn check(&self) -> Result<InteractionInput, FieldErrors> {
        let mut errors = match self.validate() {
            Ok(()) => FieldErrors::new(),
            Err(e) => FieldErrors::from_validation(&e),
        };

        let interaction_type = if self.interaction_type.trim().is_empty() {
            errors.push("type", "is required");
            None
        } else {
            match self.interaction_type.parse::<InteractionType>() {
                Ok(t) => Some(t),
                Err(_) => {
                    errors.push("type", "must be one of Meeting, Call, Email, Other");
                    None
                }
            }
        };

        let start = parse_field(&self.start_datetime, "start_datetime", &mut errors);
        let end = parse_field(&self.end_datetime, "end_datetime", &mut errors);
        if let (Some(s), Some(e)) = (start, end) {
            if e <= s {
                errors.push("end_datetime", "must be after the start");
            }
        }

        match (interaction_type, start, end) {
            (Some(interaction_type), Some(start_datetime), Some(end_datetime)) if errors.is_empty() => {
                Ok(InteractionInput {
                    title: self.title.trim().to_string(),
                    interaction_type,
                    lead: optional(&self.lead),
                    start_datetime,
                    end_datetime,
                    timezone: self.timezone.trim().to_string(),
                    location: optional(&self.location),
                    description: optional(&self.description),
                    notes: optional(&self.notes),
                })
            }
            _ => Err(errors),
        }
    }
}

/// Blank values are already reported as required.
fn parse_field(raw: &str, field: &str, errors: &mut FieldErrors) -> Option<NaiveDateTime> {
    if raw.trim().is_empty() {
        return None;
    }
    let parsed = parse_datetime(raw);
    if parsed.is_none() {
        errors.push(field, "must be a valid date and time");
    }
    parsed
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled() -> InteractionDraft {
        InteractionDraft {
            title: "Kickoff".to_string(),
            start_datetime: "2024-03-01T09:00".to_string(),
            end_datetime: "2024-03-01T10:00".to_string(),
            ..InteractionDraft::default()
        }
    }

    #[test]
    fn complete_draft_becomes_input() {
        let mut d = filled();
        d.set(InteractionField::Lead, "  ");
        d.set(InteractionField::Type, "call");

        let input = d.check().unwrap();
        assert_eq!(input.interaction_type, InteractionType::Call);
        assert_eq!(input.lead, None);
        assert_eq!(input.start_datetime.format("%H:%M").to_string(), "09:00");
    }

    #[test]
    fn missing_fields_are_required() {
        let errs = InteractionDraft::default().check().unwrap_err();
        assert_eq!(errs.first("title"), Some("is required"));
        assert_eq!(errs.first("start_datetime"), Some("is required"));
        assert!(!errs.has("type"));
    }

    #[test]
    fn unknown_type_is_rejected() {
        let mut d = filled();
        d.set(InteractionField::Type, "Visit");
        assert!(d.check().unwrap_err().has("type"));
    }

    #[test]
    fn end_not_after_start_is_an_end_error() {
        let mut d = filled();
        d.set(InteractionField::EndDatetime, "2024-03-01T09:00");
        let errs = d.check().unwrap_err();
        assert_eq!(errs.first("end_datetime"), Some("must be after the start"));
        assert!(!errs.has("start_datetime"));
    }

    #[test]
    fn overlong_title_is_rejected() {
        let mut d = filled();
        d.set(InteractionField::Title, &"x".repeat(201));
        assert_eq!(d.check().unwrap_err().first("title"), Some("must be at most 200 characters"));
    }

    #[test]
    fn garbage_dates_are_reported() {
        let mut d = filled();
        d.set(InteractionField::StartDatetime, "yesterday");
        assert_eq!(
            d.check().unwrap_err().first("start_datetime"),
            Some("must be a valid date and time")
        );
    }
}
