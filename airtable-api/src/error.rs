use serde::{Deserialize, Serialize};
use tower_api_client::{Error as ApiError, StatusCode};

#[derive(Debug)]
pub enum AirtableApiError {
    Airtable(StatusCode, ErrorDetail),
    Internal(ApiError),
}

impl From<ApiError> for AirtableApiError {
    fn from(value: ApiError) -> Self {
        match value {
            ApiError::ClientError(status, detail) | ApiError::ServerError(status, detail) => {
                match serde_json::from_str::<ErrorResponse>(&detail) {
                    Ok(response) => AirtableApiError::Airtable(status, response.error),
                    // Some endpoints reply with a bare string or HTML body.
                    Err(_) => AirtableApiError::Airtable(
                        status,
                        ErrorDetail {
                            error_type: "UNKNOWN".to_string(),
                            message: detail,
                        },
                    ),
                }
            }
            e => AirtableApiError::Internal(e),
        }
    }
}

impl std::fmt::Display for AirtableApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AirtableApiError::Internal(e) => write!(f, "Internal error: {}", e),
            AirtableApiError::Airtable(status, detail) => {
                write!(f, "({}) {}: {}", status, detail.error_type, detail.message)
            }
        }
    }
}

impl std::error::Error for AirtableApiError {}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetail {
    #[serde(rename = "type")]
    pub error_type: String,
    pub message: String,
}
