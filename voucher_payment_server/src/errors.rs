use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use thiserror::Error;
use voucher_payment_engine::traits::AllocationError;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("Could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
    #[error("Authentication Error. {0}")]
    AuthenticationError(#[from] AuthError),
    #[error("The data was not found. {0}")]
    NoRecordFound(String),
    #[error("The payment provider could not be reached. {0}")]
    PaymentProviderError(String),
    #[error("Cannot resolve order details for {0}. An operator has been alerted.")]
    UnresolvableOrder(String),
    #[error("The order cannot be fulfilled. {0}")]
    OrderNotFulfillable(String),
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::AuthenticationError(e) => match e {
                AuthError::MissingApiKey => StatusCode::UNAUTHORIZED,
                AuthError::InvalidApiKey => StatusCode::FORBIDDEN,
            },
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NoRecordFound(_) => StatusCode::NOT_FOUND,
            Self::PaymentProviderError(_) => StatusCode::BAD_GATEWAY,
            Self::UnresolvableOrder(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::OrderNotFulfillable(_) => StatusCode::CONFLICT,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .body(serde_json::json!({ "error": self.to_string() }).to_string())
    }
}

#[derive(Debug, Clone, Error)]
pub enum AuthError {
    #[error("No admin API key was provided.")]
    MissingApiKey,
    #[error("The admin API key is not valid.")]
    InvalidApiKey,
}

impl From<AllocationError> for ServerError {
    fn from(e: AllocationError) -> Self {
        match e {
            AllocationError::Validation(msg) => Self::InvalidRequestBody(msg),
            AllocationError::OrderNotFound(reference) => Self::NoRecordFound(format!("Order {reference}")),
            AllocationError::UnresolvableOrder(reference) => Self::UnresolvableOrder(reference.to_string()),
            AllocationError::OrderNotFulfillable(reference) => {
                Self::OrderNotFulfillable(format!("Payment for order {reference} was declined earlier"))
            },
            AllocationError::OrderStatusUpdateError(msg) => Self::OrderNotFulfillable(msg),
            AllocationError::DatabaseError(msg) => Self::BackendError(format!("Database error: {msg}")),
        }
    }
}
