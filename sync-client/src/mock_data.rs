//! Deterministic sample submissions for mock mode and demos.

use crate::backend::MockBackend;
use bastion_sync_core::schemas;
use bastion_sync_types::Record;
use serde_json::{json, Value};

/// Fixed timestamp used for every sample (2026-01-15T12:00:00Z).
const SAMPLE_SUBMITTED_AT: i64 = 1_768_478_400;

fn record(value: Value) -> Record {
    match value {
        Value::Object(map) => map,
        _ => Record::new(),
    }
}

fn stamped(id: &str, status: Option<&str>, mut fields: Record) -> Record {
    fields.insert("id".into(), Value::String(id.into()));
    if let Some(status) = status {
        fields.insert("status".into(), Value::String(status.into()));
    }
    fields.insert("submitted_at".into(), Value::from(SAMPLE_SUBMITTED_AT));
    fields
}

/// Sample rows per table, in the order they are seeded.
pub fn samples() -> Vec<(&'static str, Vec<Record>)> {
    vec![
        (
            schemas::advisors().table,
            vec![
                stamped(
                    "adv-001",
                    Some("pending"),
                    record(json!({
                        "full_name": "Dana Whitfield",
                        "email": "dana.whitfield@example.com",
                        "organization": "Northgate Systems",
                        "expertise": ["acquisition strategy", "C4ISR"],
                        "clearance_level": "TS/SCI",
                        "bio": "Twenty years in program management across Army and joint programs.",
                    })),
                ),
                stamped(
                    "adv-002",
                    Some("approved"),
                    record(json!({
                        "full_name": "Marcus Oyelaran",
                        "email": "m.oyelaran@example.com",
                        "expertise": ["space systems"],
                        "linkedin_url": "https://www.linkedin.com/in/example-oyelaran",
                        "bio": "Former satellite operations lead, now advising on commercial space.",
                    })),
                ),
            ],
        ),
        (
            schemas::events().table,
            vec![
                stamped(
                    "evt-001",
                    Some("approved"),
                    record(json!({
                        "name": "Modern Defense Industrial Base Forum",
                        "event_date": "2026-03-18",
                        "location": "Arlington, VA",
                        "organizer": "Bastion Advisory",
                        "website": "https://events.example.com/dib-forum",
                        "description": "Supplier resilience and workforce panels.",
                        "contact_email": "events@example.com",
                    })),
                ),
                stamped(
                    "evt-002",
                    Some("pending"),
                    record(json!({
                        "name": "Autonomy Test and Evaluation Workshop",
                        "event_date": "2026-05-06",
                        "location": "San Diego, CA",
                        "organizer": "Pacific T&E Consortium",
                        "description": "Hands-on sessions on evaluating autonomous systems.",
                        "contact_email": "workshop@example.org",
                    })),
                ),
            ],
        ),
        (
            schemas::companies().table,
            vec![
                stamped(
                    "cmp-001",
                    Some("approved"),
                    record(json!({
                        "name": "Ironwood Microelectronics",
                        "website": "https://ironwood.example.com",
                        "sector": "Microelectronics",
                        "headquarters": "Austin, TX",
                        "employee_count": 240,
                        "description": "Radiation-hardened ASIC design and packaging.",
                        "contact_email": "bd@ironwood.example.com",
                    })),
                ),
                stamped(
                    "cmp-002",
                    Some("rejected"),
                    record(json!({
                        "name": "Quickfix Drones",
                        "website": "https://quickfix.example.net",
                        "sector": "Unmanned systems",
                        "description": "Consumer drone reseller.",
                        "contact_email": "sales@quickfix.example.net",
                    })),
                ),
            ],
        ),
        (
            schemas::consortiums().table,
            vec![stamped(
                "con-001",
                Some("approved"),
                record(json!({
                    "name": "Advanced Manufacturing Alliance",
                    "focus_area": "Additive manufacturing",
                    "members": ["Ironwood Microelectronics", "Keel Forge"],
                    "description": "Prototype-to-production pathway for printed parts.",
                    "contact_email": "hello@ama.example.org",
                })),
            )],
        ),
        (
            schemas::innovations().table,
            vec![stamped(
                "inn-001",
                Some("pending"),
                record(json!({
                    "title": "Low-SWaP Passive RF Sensing",
                    "organization": "Keel Forge",
                    "technology_area": "Sensors",
                    "readiness_level": 5,
                    "seeking_funding": true,
                    "description": "Passive detection using ambient RF illuminators.",
                    "contact_email": "research@keelforge.example.com",
                })),
            )],
        ),
        (
            schemas::newsletter().table,
            vec![
                stamped(
                    "sub-001",
                    None,
                    record(json!({"email": "reader.one@example.com", "full_name": "Avery Chen"})),
                ),
                stamped(
                    "sub-002",
                    None,
                    record(json!({"email": "reader.two@example.org"})),
                ),
            ],
        ),
    ]
}

/// Fill `backend` with the sample rows.
pub fn seed(backend: &MockBackend) {
    for (table, rows) in samples() {
        backend.seed(table, rows);
    }
}

/// A fresh mock backend holding the sample rows.
pub fn seeded() -> MockBackend {
    let backend = MockBackend::new();
    seed(&backend);
    backend
}
