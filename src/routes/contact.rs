/**
 * Contact Routes
 * Public write-only capture endpoints: contact submissions, newsletter
 * subscriptions (idempotent upsert), workshop requests and leads.
 */
use axum::{http::StatusCode, response::IntoResponse, Json};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::db::{
    self,
    models::{ContactSubmission, Lead, Subscription, WorkshopRequest},
};
use crate::routes::{database_error, database_unavailable, validation_failed};

lazy_static::lazy_static! {
    static ref EMAIL_REGEX: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
}

fn is_valid_email(email: &str) -> bool {
    EMAIL_REGEX.is_match(email)
}

/// Collects per-field validation errors in request-body order.
#[derive(Debug, Default)]
struct FieldErrors {
    fields: BTreeMap<String, String>,
}

impl FieldErrors {
    fn require(&mut self, field: &str, value: &str) {
        if value.trim().is_empty() {
            self.fields
                .insert(field.to_string(), "This field is required.".to_string());
        }
    }

    fn require_email(&mut self, field: &str, value: &str) {
        if value.trim().is_empty() {
            self.fields
                .insert(field.to_string(), "This field is required.".to_string());
        } else if !is_valid_email(value.trim()) {
            self.fields
                .insert(field.to_string(), "Enter a valid email address.".to_string());
        }
    }

    fn require_consent(&mut self, field: &str, value: bool) {
        if !value {
            self.fields
                .insert(field.to_string(), "Consent is required.".to_string());
        }
    }

    fn into_result(self) -> Result<(), axum::response::Response> {
        if self.fields.is_empty() {
            Ok(())
        } else {
            Err(validation_failed(self.fields))
        }
    }
}

// ============================================================================
// Contact submissions
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactSubmissionRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub company: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub subscribe_to_updates: bool,
    #[serde(default)]
    pub consent_privacy: bool,
}

/// POST /contact/contact-submissions/ - Record a contact form submission
pub async fn create_contact_submission(
    Json(payload): Json<ContactSubmissionRequest>,
) -> impl IntoResponse {
    let mut errors = FieldErrors::default();
    errors.require("name", &payload.name);
    errors.require_email("email", &payload.email);
    errors.require("message", &payload.message);
    errors.require_consent("consentPrivacy", payload.consent_privacy);
    if let Err(response) = errors.into_result() {
        return response;
    }

    let pool = match db::get_pool() {
        Some(p) => p,
        None => return database_unavailable(),
    };

    match sqlx::query_as::<_, ContactSubmission>(
        "INSERT INTO contact_submissions \
             (name, email, phone, company, message, subscribe_to_updates, consent_privacy) \
         VALUES ($1, $2, $3, $4, $5, $6, $7) \
         RETURNING id, name, email, phone, company, message, subscribe_to_updates, \
             consent_privacy, created_at, updated_at",
    )
    .bind(payload.name.trim())
    .bind(payload.email.trim())
    .bind(payload.phone.trim())
    .bind(payload.company.trim())
    .bind(payload.message.trim())
    .bind(payload.subscribe_to_updates)
    .bind(payload.consent_privacy)
    .fetch_one(pool.as_ref())
    .await
    {
        Ok(submission) => (StatusCode::CREATED, Json(submission)).into_response(),
        Err(e) => database_error("creating contact submission", e),
    }
}

// ============================================================================
// Subscriptions
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub consent: bool,
}

#[derive(Debug, sqlx::FromRow)]
struct SubscriptionUpsertRow {
    id: uuid::Uuid,
    email: String,
    name: String,
    source: String,
    consent: bool,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
    created: bool,
}

/// POST /contact/subscriptions/ - Idempotent subscription upsert.
///
/// One atomic statement, keyed on the lowercased email: inserts a new row or
/// updates the existing one, where name/source only overwrite with non-empty
/// values and consent can only flip to true. `xmax = 0` distinguishes insert
/// from update, so concurrent requests for the same email cannot race a
/// check-then-write sequence into duplicates. A resubmission that changes
/// nothing leaves `updated_at` untouched.
pub async fn create_subscription(Json(payload): Json<SubscriptionRequest>) -> impl IntoResponse {
    let mut errors = FieldErrors::default();
    errors.require_email("email", &payload.email);
    if let Err(response) = errors.into_result() {
        return response;
    }

    let email = payload.email.trim().to_lowercase();

    let pool = match db::get_pool() {
        Some(p) => p,
        None => return database_unavailable(),
    };

    let row = sqlx::query_as::<_, SubscriptionUpsertRow>(
        "INSERT INTO subscriptions (email, name, source, consent) \
         VALUES ($1, $2, $3, $4) \
         ON CONFLICT (email) DO UPDATE SET \
             name = CASE WHEN excluded.name <> '' \
                 THEN excluded.name ELSE subscriptions.name END, \
             source = CASE WHEN excluded.source <> '' \
                 THEN excluded.source ELSE subscriptions.source END, \
             consent = subscriptions.consent OR excluded.consent, \
             updated_at = CASE WHEN \
                 (excluded.name <> '' AND excluded.name IS DISTINCT FROM subscriptions.name) \
                 OR (excluded.source <> '' AND excluded.source IS DISTINCT FROM subscriptions.source) \
                 OR (excluded.consent AND NOT subscriptions.consent) \
                 THEN now() ELSE subscriptions.updated_at END \
         RETURNING id, email, name, source, consent, created_at, updated_at, \
             (xmax = 0) AS created",
    )
    .bind(&email)
    .bind(payload.name.trim())
    .bind(payload.source.trim())
    .bind(payload.consent)
    .fetch_one(pool.as_ref())
    .await;

    match row {
        Ok(row) => {
            let status = if row.created {
                StatusCode::CREATED
            } else {
                StatusCode::OK
            };
            let subscription = Subscription {
                id: row.id,
                email: row.email,
                name: row.name,
                source: row.source,
                consent: row.consent,
                created_at: row.created_at,
                updated_at: row.updated_at,
            };
            (status, Json(subscription)).into_response()
        }
        Err(e) => database_error("upserting subscription", e),
    }
}

// ============================================================================
// Workshop requests
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkshopRequestBody {
    #[serde(default)]
    pub preferred_date: String,
    #[serde(default)]
    pub preferred_time: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub description: String,
}

/// POST /contact/workshop-requests/ - Record a workshop booking request
pub async fn create_workshop_request(
    Json(payload): Json<WorkshopRequestBody>,
) -> impl IntoResponse {
    let mut errors = FieldErrors::default();
    errors.require("preferredDate", &payload.preferred_date);
    errors.require("preferredTime", &payload.preferred_time);
    errors.require("location", &payload.location);
    errors.require_email("email", &payload.email);
    if let Err(response) = errors.into_result() {
        return response;
    }

    let pool = match db::get_pool() {
        Some(p) => p,
        None => return database_unavailable(),
    };

    match sqlx::query_as::<_, WorkshopRequest>(
        "INSERT INTO workshop_requests \
             (preferred_date, preferred_time, location, email, phone, description) \
         VALUES ($1, $2, $3, $4, $5, $6) \
         RETURNING id, preferred_date, preferred_time, location, email, phone, \
             description, created_at, updated_at",
    )
    .bind(payload.preferred_date.trim())
    .bind(payload.preferred_time.trim())
    .bind(payload.location.trim())
    .bind(payload.email.trim())
    .bind(payload.phone.trim())
    .bind(payload.description.trim())
    .fetch_one(pool.as_ref())
    .await
    {
        Ok(request) => (StatusCode::CREATED, Json(request)).into_response(),
        Err(e) => database_error("creating workshop request", e),
    }
}

// ============================================================================
// Leads
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub company: String,
    #[serde(default)]
    pub plan: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub consent_privacy: bool,
}

/// POST /contact/leads/ - Record a pricing/plan lead
pub async fn create_lead(Json(payload): Json<LeadRequest>) -> impl IntoResponse {
    let mut errors = FieldErrors::default();
    errors.require("name", &payload.name);
    errors.require_email("email", &payload.email);
    errors.require("plan", &payload.plan);
    errors.require_consent("consentPrivacy", payload.consent_privacy);
    if let Err(response) = errors.into_result() {
        return response;
    }

    let pool = match db::get_pool() {
        Some(p) => p,
        None => return database_unavailable(),
    };

    match sqlx::query_as::<_, Lead>(
        "INSERT INTO leads \
             (name, email, phone, company, plan, message, consent_privacy) \
         VALUES ($1, $2, $3, $4, $5, $6, $7) \
         RETURNING id, name, email, phone, company, plan, message, \
             consent_privacy, created_at, updated_at",
    )
    .bind(payload.name.trim())
    .bind(payload.email.trim())
    .bind(payload.phone.trim())
    .bind(payload.company.trim())
    .bind(payload.plan.trim())
    .bind(payload.message.trim())
    .bind(payload.consent_privacy)
    .fetch_one(pool.as_ref())
    .await
    {
        Ok(lead) => (StatusCode::CREATED, Json(lead)).into_response(),
        Err(e) => database_error("creating lead", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::ValidationErrorResponse;
    use axum::body::Body;
    use axum::http::Request;
    use axum::routing::post;
    use axum::Router;
    use tower::ServiceExt;

    fn test_router() -> Router {
        Router::new()
            .route("/contact/contact-submissions/", post(create_contact_submission))
            .route("/contact/subscriptions/", post(create_subscription))
            .route("/contact/workshop-requests/", post(create_workshop_request))
            .route("/contact/leads/", post(create_lead))
    }

    async fn post_json(uri: &str, body: serde_json::Value) -> (StatusCode, Vec<u8>) {
        let req = Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let res = test_router().oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, bytes.to_vec())
    }

    #[test]
    fn test_email_validation() {
        assert!(is_valid_email("jane@example.com"));
        assert!(is_valid_email("jane+tag@sub.example.co"));
        assert!(!is_valid_email("jane"));
        assert!(!is_valid_email("jane@example"));
        assert!(!is_valid_email("jane doe@example.com"));
    }

    #[tokio::test]
    async fn test_contact_submission_rejects_missing_fields() {
        let (status, body) =
            post_json("/contact/contact-submissions/", serde_json::json!({})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let parsed: ValidationErrorResponse = serde_json::from_slice(&body).unwrap();
        assert!(parsed.fields.contains_key("name"));
        assert!(parsed.fields.contains_key("email"));
        assert!(parsed.fields.contains_key("message"));
        assert!(parsed.fields.contains_key("consentPrivacy"));
    }

    #[tokio::test]
    async fn test_contact_submission_requires_consent() {
        let (status, body) = post_json(
            "/contact/contact-submissions/",
            serde_json::json!({
                "name": "Jane Doe",
                "email": "jane@example.com",
                "message": "Interested in a redesign project.",
                "consentPrivacy": false
            }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let parsed: ValidationErrorResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(parsed.fields.len(), 1);
        assert!(parsed.fields.contains_key("consentPrivacy"));
    }

    #[tokio::test]
    async fn test_subscription_rejects_malformed_email() {
        let (status, body) = post_json(
            "/contact/subscriptions/",
            serde_json::json!({ "email": "not-an-email" }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let parsed: ValidationErrorResponse = serde_json::from_slice(&body).unwrap();
        assert!(parsed.fields.contains_key("email"));
    }

    #[tokio::test]
    async fn test_workshop_request_rejects_missing_schedule() {
        let (status, body) = post_json(
            "/contact/workshop-requests/",
            serde_json::json!({ "email": "jane@example.com" }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let parsed: ValidationErrorResponse = serde_json::from_slice(&body).unwrap();
        assert!(parsed.fields.contains_key("preferredDate"));
        assert!(parsed.fields.contains_key("preferredTime"));
        assert!(parsed.fields.contains_key("location"));
    }

    /// Connects to DATABASE_URL, installs the schema and registers the
    /// global pool so the handlers under test can reach it.
    async fn live_pool() -> std::sync::Arc<sqlx::PgPool> {
        let pool = db::init_pool(None)
            .await
            .expect("DATABASE_URL must point at a reachable Postgres");
        db::run_migrations(pool.as_ref())
            .await
            .expect("schema setup failed");
        pool
    }

    #[tokio::test]
    #[ignore = "requires DATABASE_URL"]
    async fn test_subscription_upsert_merge_rules() {
        let pool = live_pool().await;
        let email = format!("upsert-{}@example.com", uuid::Uuid::new_v4().simple());

        // First subscribe: mixed-case input, stored lowercased, 201.
        let (status, body) = post_json(
            "/contact/subscriptions/",
            serde_json::json!({
                "email": email.to_uppercase(),
                "name": "Jane",
                "source": "footer",
                "consent": true
            }),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let first: Subscription = serde_json::from_slice(&body).unwrap();
        assert_eq!(first.email, email);
        assert_eq!(first.name, "Jane");
        assert!(first.consent);

        // Resubscribe with a new name: same row, 200, empty source kept,
        // consent stays true even though the request omitted it.
        let (status, body) = post_json(
            "/contact/subscriptions/",
            serde_json::json!({ "email": email, "name": "Jane Doe" }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let second: Subscription = serde_json::from_slice(&body).unwrap();
        assert_eq!(second.id, first.id);
        assert_eq!(second.name, "Jane Doe");
        assert_eq!(second.source, "footer");
        assert!(second.consent);
        assert!(second.updated_at > first.updated_at);

        // A resubmission that changes nothing must not bump updated_at.
        let (status, body) = post_json(
            "/contact/subscriptions/",
            serde_json::json!({
                "email": email,
                "name": "Jane Doe",
                "source": "footer",
                "consent": true
            }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let third: Subscription = serde_json::from_slice(&body).unwrap();
        assert_eq!(third.id, first.id);
        assert_eq!(third.updated_at, second.updated_at);

        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM subscriptions WHERE email = $1")
                .bind(&email)
                .fetch_one(pool.as_ref())
                .await
                .unwrap();
        assert_eq!(count, 1);

        sqlx::query("DELETE FROM subscriptions WHERE id = $1")
            .bind(first.id)
            .execute(pool.as_ref())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_lead_requires_plan_and_consent() {
        let (status, body) = post_json(
            "/contact/leads/",
            serde_json::json!({ "name": "Jane", "email": "jane@example.com" }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let parsed: ValidationErrorResponse = serde_json::from_slice(&body).unwrap();
        assert!(parsed.fields.contains_key("plan"));
        assert!(parsed.fields.contains_key("consentPrivacy"));
    }
}
