//! The submission kinds the site accepts.

use crate::schema::{FieldKind, FieldSpec, ResourceSchema};

/// Advisor applications.
pub fn advisors() -> ResourceSchema {
    ResourceSchema {
        entity: "advisors",
        table: "advisors",
        fields: vec![
            FieldSpec::required("full_name", "Full name", FieldKind::Text),
            FieldSpec::required("email", "Email", FieldKind::Email),
            FieldSpec::optional("phone", "Phone", FieldKind::Text),
            FieldSpec::optional("organization", "Current organization", FieldKind::Text),
            FieldSpec::required("expertise", "Areas of expertise", FieldKind::List),
            FieldSpec::optional("clearance_level", "Security clearance", FieldKind::Text),
            FieldSpec::optional("linkedin_url", "LinkedIn profile", FieldKind::Url),
            FieldSpec::required("bio", "Short biography", FieldKind::LongText),
        ],
        moderated: true,
    }
}

/// Industry event submissions.
pub fn events() -> ResourceSchema {
    ResourceSchema {
        entity: "events",
        table: "events",
        fields: vec![
            FieldSpec::required("name", "Event name", FieldKind::Text),
            FieldSpec::required("event_date", "Date", FieldKind::Date),
            FieldSpec::required("location", "Location", FieldKind::Text),
            FieldSpec::required("organizer", "Organizer", FieldKind::Text),
            FieldSpec::optional("website", "Website", FieldKind::Url),
            FieldSpec::required("description", "Description", FieldKind::LongText),
            FieldSpec::required("contact_email", "Contact email", FieldKind::Email),
        ],
        moderated: true,
    }
}

/// Company directory listings.
pub fn companies() -> ResourceSchema {
    ResourceSchema {
        entity: "companies",
        table: "companies",
        fields: vec![
            FieldSpec::required("name", "Company name", FieldKind::Text),
            FieldSpec::required("website", "Website", FieldKind::Url),
            FieldSpec::required("sector", "Sector", FieldKind::Text),
            FieldSpec::optional("headquarters", "Headquarters", FieldKind::Text),
            FieldSpec::optional("employee_count", "Employees", FieldKind::Number),
            FieldSpec::required("description", "Description", FieldKind::LongText),
            FieldSpec::required("contact_email", "Contact email", FieldKind::Email),
        ],
        moderated: true,
    }
}

/// Consortium listings.
pub fn consortiums() -> ResourceSchema {
    ResourceSchema {
        entity: "consortiums",
        table: "consortiums",
        fields: vec![
            FieldSpec::required("name", "Consortium name", FieldKind::Text),
            FieldSpec::optional("website", "Website", FieldKind::Url),
            FieldSpec::required("focus_area", "Focus area", FieldKind::Text),
            FieldSpec::optional("members", "Member organizations", FieldKind::List),
            FieldSpec::required("description", "Description", FieldKind::LongText),
            FieldSpec::required("contact_email", "Contact email", FieldKind::Email),
        ],
        moderated: true,
    }
}

/// Innovation showcase listings.
pub fn innovations() -> ResourceSchema {
    ResourceSchema {
        entity: "innovations",
        table: "innovations",
        fields: vec![
            FieldSpec::required("title", "Title", FieldKind::Text),
            FieldSpec::required("organization", "Organization", FieldKind::Text),
            FieldSpec::required("technology_area", "Technology area", FieldKind::Text),
            FieldSpec::optional("readiness_level", "Technology readiness level", FieldKind::Number),
            FieldSpec::optional("seeking_funding", "Seeking funding", FieldKind::Boolean),
            FieldSpec::required("description", "Description", FieldKind::LongText),
            FieldSpec::required("contact_email", "Contact email", FieldKind::Email),
        ],
        moderated: true,
    }
}

/// Newsletter signups. Not moderated.
pub fn newsletter() -> ResourceSchema {
    ResourceSchema {
        entity: "newsletter",
        table: "newsletter_subscribers",
        fields: vec![
            FieldSpec::required("email", "Email", FieldKind::Email),
            FieldSpec::optional("full_name", "Name", FieldKind::Text),
        ],
        moderated: false,
    }
}

/// Every built-in schema.
pub fn all() -> Vec<ResourceSchema> {
    vec![
        advisors(),
        events(),
        companies(),
        consortiums(),
        innovations(),
        newsletter(),
    ]
}

/// Find a built-in schema by its entity name.
pub fn by_entity(entity: &str) -> Option<ResourceSchema> {
    all().into_iter().find(|s| s.entity == entity)
}
