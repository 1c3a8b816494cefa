pub mod admin;
pub mod events;
pub mod public;

use actix_web::{http::StatusCode, web, HttpResponse, ResponseError};
use serde_json::json;

use crate::error::{ServiceError, StoreError};

/// Mount every route group. The event feed lives inside the admin scope.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.configure(public::configure).configure(admin::configure);
}

impl ResponseError for ServiceError {
    fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::Store(StoreError::NotFound(_)) => StatusCode::NOT_FOUND,
            ServiceError::Store(StoreError::Validation { .. })
            | ServiceError::InvalidInput(_)
            | ServiceError::InvalidUpload(_) => StatusCode::BAD_REQUEST,
            ServiceError::InvalidTransition { .. } | ServiceError::SlotTaken { .. } => {
                StatusCode::CONFLICT
            }
            ServiceError::Store(
                StoreError::Unauthorized(_)
                | StoreError::Forbidden(_)
                | StoreError::Transport(_)
                | StoreError::Unexpected { .. },
            ) => StatusCode::BAD_GATEWAY,
            ServiceError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            log::error!("request failed: {self}");
        }
        let body = match self {
            ServiceError::Store(StoreError::Validation { message, fields }) => json!({
                "error": message,
                "fields": fields,
            }),
            // Backend details stay in the log.
            _ if status.is_server_error() => {
                json!({ "error": status.canonical_reason().unwrap_or("error") })
            }
            _ => json!({ "error": self.to_string() }),
        };
        HttpResponse::build(status).json(body)
    }
}

/// 404 for a lookup that found nothing.
pub(crate) fn not_found(what: &str) -> ServiceError {
    StoreError::NotFound(what.to_string()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_follow_error_kind() {
        let cases: Vec<(ServiceError, StatusCode)> = vec![
            (not_found("appointments/x"), StatusCode::NOT_FOUND),
            (StoreError::not_unique("key").into(), StatusCode::BAD_REQUEST),
            (ServiceError::InvalidInput("x".into()), StatusCode::BAD_REQUEST),
            (ServiceError::InvalidUpload("x".into()), StatusCode::BAD_REQUEST),
            (
                ServiceError::InvalidTransition {
                    from: "completed".into(),
                    to: "pending".into(),
                },
                StatusCode::CONFLICT,
            ),
            (
                ServiceError::SlotTaken {
                    date: "2025-06-10".into(),
                    time: "11:00:00".into(),
                },
                StatusCode::CONFLICT,
            ),
            (StoreError::Transport("down".into()).into(), StatusCode::BAD_GATEWAY),
            (StoreError::Forbidden("rules".into()).into(), StatusCode::BAD_GATEWAY),
            (StoreError::Serialize("bad".into()).into(), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, expected) in cases {
            assert_eq!(err.status_code(), expected, "{err}");
        }
    }
}
