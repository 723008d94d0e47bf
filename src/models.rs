use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::errors::AppError;

/// Placeholder written for every lead field the caller did not provide.
pub const NOT_PROVIDED: &str = "Not provided";

/// Header row expected in the `Leads` sheet, in column order.
pub const SHEET_HEADERS: [&str; 10] = [
    "timestamp",
    "name",
    "email",
    "company",
    "website",
    "phone",
    "project type",
    "budget",
    "notes",
    "raw JSON",
];

pub const CHAT_VALIDATION_MESSAGE: &str =
    "Invalid request body. \"history\" (array) and \"message\" (string) are required.";
pub const LEAD_VALIDATION_MESSAGE: &str = "Invalid lead data. \"email\" is required.";
pub const LEAD_SAVED_MESSAGE: &str = "Lead successfully saved.";

// ============ Chat ============

/// Validated body of `POST /api/chat`.
///
/// History is caller-owned: only its being an array is checked here.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub message: String,
    pub history: Vec<Value>,
}

impl ChatRequest {
    pub fn from_value(body: Value) -> Result<Self, AppError> {
        let invalid = || AppError::Validation(CHAT_VALIDATION_MESSAGE.to_string());

        let Value::Object(mut body) = body else {
            return Err(invalid());
        };

        let message = match body.remove("message") {
            Some(Value::String(message)) if !message.is_empty() => message,
            _ => return Err(invalid()),
        };

        let history = match body.remove("history") {
            Some(Value::Array(history)) => history,
            _ => return Err(invalid()),
        };

        Ok(Self { message, history })
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
}

// ============ Leads ============

/// A prospective customer as submitted by the chat front end.
///
/// Optional fields hold `None` when the caller sent nothing usable (absent,
/// `null`, `""`, `false` or `0`). The caller's full object is kept for the
/// audit column.
#[derive(Debug, Clone, PartialEq)]
pub struct LeadRecord {
    pub email: String,
    pub name: Option<String>,
    pub phone: Option<String>,
    pub interest: Option<String>,
    pub budget: Option<String>,
    pub customer_type: Option<String>,
    pub usecase: Option<String>,
    pub other_info: Option<String>,
    pub company: Option<String>,
    pub website: Option<String>,
    raw: Map<String, Value>,
}

impl LeadRecord {
    /// Validates a request body into a lead. `email` must be a JSON string.
    pub fn from_value(body: Value) -> Result<Self, AppError> {
        let Value::Object(raw) = body else {
            return Err(AppError::Validation(LEAD_VALIDATION_MESSAGE.to_string()));
        };

        let email = raw
            .get("email")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| AppError::Validation(LEAD_VALIDATION_MESSAGE.to_string()))?;

        let field = |key: &str| provided_text(raw.get(key));

        Ok(Self {
            email,
            name: field("name"),
            phone: field("phone"),
            interest: field("interest"),
            budget: field("budget"),
            customer_type: field("customerType"),
            usecase: field("usecase"),
            other_info: field("otherInfo"),
            company: field("company"),
            website: field("website"),
            raw,
        })
    }

    /// The record exactly as the caller sent it.
    pub fn raw(&self) -> &Map<String, Value> {
        &self.raw
    }

    /// Compact JSON of the original record, for the audit column.
    pub fn raw_json(&self) -> String {
        Value::Object(self.raw.clone()).to_string()
    }

    /// Short stable identifier for log lines, so addresses never reach the logs.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.email.trim().to_lowercase().as_bytes());
        let digest = hex::encode(hasher.finalize());
        digest[..12].to_string()
    }
}

/// Text for a lead field, or `None` when the value counts as not provided.
fn provided_text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::Null | Value::Bool(false) => None,
        Value::Bool(true) => Some("true".to_string()),
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) if n.as_f64() == Some(0.0) => None,
        Value::Number(n) => Some(n.to_string()),
        other => Some(other.to_string()),
    }
}

fn or_placeholder(value: Option<&str>) -> String {
    match value {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => NOT_PROVIDED.to_string(),
    }
}

/// One row of the `Leads` sheet. Column order matches [`SHEET_HEADERS`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct SheetRow(Vec<String>);

impl SheetRow {
    pub fn from_lead(lead: &LeadRecord, inserted_at: DateTime<Utc>) -> Self {
        Self(vec![
            inserted_at.to_rfc3339_opts(SecondsFormat::Millis, true),
            or_placeholder(lead.name.as_deref()),
            or_placeholder(Some(lead.email.as_str())),
            or_placeholder(lead.company.as_deref()),
            or_placeholder(lead.website.as_deref()),
            or_placeholder(lead.phone.as_deref()),
            or_placeholder(lead.interest.as_deref()),
            or_placeholder(lead.budget.as_deref()),
            or_placeholder(lead.other_info.as_deref()),
            lead.raw_json(),
        ])
    }

    pub fn values(&self) -> &[String] {
        &self.0
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LeadResponse {
    pub success: bool,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 14, 9, 26, 53).unwrap()
    }

    #[test]
    fn test_chat_request_valid() {
        let req = ChatRequest::from_value(json!({
            "message": "Do you build AI websites?",
            "history": [{"role": "user", "parts": [{"text": "hi"}]}]
        }))
        .unwrap();
        assert_eq!(req.message, "Do you build AI websites?");
        assert_eq!(req.history.len(), 1);
    }

    #[test]
    fn test_chat_request_rejects_bad_shapes() {
        let bad = [
            json!({"history": []}),
            json!({"message": "", "history": []}),
            json!({"message": 42, "history": []}),
            json!({"message": "hi"}),
            json!({"message": "hi", "history": "[]"}),
            json!({"message": "hi", "history": {"0": "x"}}),
            json!(["hi"]),
            Value::Null,
        ];
        for body in bad {
            let err = ChatRequest::from_value(body.clone()).unwrap_err();
            assert!(
                matches!(err, AppError::Validation(ref m) if m == CHAT_VALIDATION_MESSAGE),
                "{body}"
            );
        }
    }

    #[test]
    fn test_lead_requires_string_email() {
        for body in [
            json!({"name": "John"}),
            json!({"email": 12}),
            json!({"email": null}),
            json!({"email": ["a@b.c"]}),
            json!("a@b.c"),
        ] {
            assert!(matches!(
                LeadRecord::from_value(body),
                Err(AppError::Validation(_))
            ));
        }
    }

    #[test]
    fn test_full_row_in_column_order() {
        let body = json!({
            "name": "John Doe",
            "email": "test@example.com",
            "phone": "+1 555 0100",
            "interest": "AI Websites",
            "budget": "$5k",
            "customerType": "b2b",
            "usecase": "Landing page",
            "otherInfo": "Needs it by June",
            "company": "Acme",
            "website": "https://acme.test"
        });
        let lead = LeadRecord::from_value(body.clone()).unwrap();
        let row = SheetRow::from_lead(&lead, at());

        assert_eq!(
            &row.values()[..9],
            &[
                "2025-03-14T09:26:53.000Z",
                "John Doe",
                "test@example.com",
                "Acme",
                "https://acme.test",
                "+1 555 0100",
                "AI Websites",
                "$5k",
                "Needs it by June",
            ]
        );
        let raw: Value = serde_json::from_str(&row.values()[9]).unwrap();
        assert_eq!(raw, body);
    }

    #[test]
    fn test_placeholders_are_independent() {
        let lead = LeadRecord::from_value(json!({
            "email": "",
            "name": "Jane",
            "phone": null,
            "budget": 0,
            "company": false
        }))
        .unwrap();
        let row = SheetRow::from_lead(&lead, at());
        let values = row.values();

        assert_eq!(values[1], "Jane");
        assert_eq!(values[2], NOT_PROVIDED);
        assert_eq!(values[3], NOT_PROVIDED);
        assert_eq!(values[4], NOT_PROVIDED);
        assert_eq!(values[5], NOT_PROVIDED);
        assert_eq!(values[6], NOT_PROVIDED);
        assert_eq!(values[7], NOT_PROVIDED);
        assert_eq!(values[8], NOT_PROVIDED);
    }

    #[test]
    fn test_scalar_fields_kept_as_text() {
        let lead = LeadRecord::from_value(json!({
            "email": "a@b.co",
            "budget": 5000,
            "otherInfo": true
        }))
        .unwrap();
        assert_eq!(lead.budget.as_deref(), Some("5000"));
        assert_eq!(lead.other_info.as_deref(), Some("true"));
    }

    #[test]
    fn test_extra_fields_survive_in_raw_json() {
        let body = json!({"email": "a@b.co", "utm_source": "ads"});
        let lead = LeadRecord::from_value(body.clone()).unwrap();
        let raw: Value = serde_json::from_str(&lead.raw_json()).unwrap();
        assert_eq!(raw, body);
    }

    #[test]
    fn test_raw_json_keeps_submission_order() {
        let submitted = r#"{"name":"Zoe","email":"zoe@example.com","budget":"5000","company":"Acme"}"#;
        let body: Value = serde_json::from_str(submitted).unwrap();
        let lead = LeadRecord::from_value(body).unwrap();
        assert_eq!(lead.raw_json(), submitted);
    }

    #[test]
    fn test_fingerprint_hides_email() {
        let lead = LeadRecord::from_value(json!({"email": "Test@Example.com"})).unwrap();
        let other = LeadRecord::from_value(json!({"email": "test@example.com "})).unwrap();
        let fp = lead.fingerprint();
        assert_eq!(fp.len(), 12);
        assert!(!fp.contains('@'));
        assert_eq!(fp, other.fingerprint());
    }
}
