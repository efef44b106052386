use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use dukaan_catalog::{BundleError, InventoryError, ProductError};
use dukaan_core::payment::PaymentError;
use dukaan_core::{CoreError, StoreError};
use dukaan_order::{CartError, CouponError, OrderError};
use dukaan_shared::ValidationErrors;

#[derive(Debug)]
pub enum AppError {
    AuthenticationError(String),
    AuthorizationError(String),
    BadRequest(String),
    NotFoundError(String),
    ConflictError(String),
    /// 422 without field details.
    Unprocessable(String),
    /// 422 with the field-keyed rule failures.
    ValidationFailed(ValidationErrors),
    InternalServerError(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::AuthenticationError(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::AuthorizationError(msg) => (StatusCode::FORBIDDEN, msg),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFoundError(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::ConflictError(msg) => (StatusCode::CONFLICT, msg),
            AppError::Unprocessable(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg),
            AppError::ValidationFailed(errors) => {
                let body = Json(json!({
                    "error": errors.to_string(),
                    "errors": errors,
                }));
                return (StatusCode::UNPROCESSABLE_ENTITY, body).into_response();
            }
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error".to_string())
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

impl From<ValidationErrors> for AppError {
    fn from(errors: ValidationErrors) -> Self {
        AppError::ValidationFailed(errors)
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(_) => AppError::NotFoundError(err.to_string()),
            StoreError::Conflict(_) | StoreError::InsufficientStock(_) => AppError::ConflictError(err.to_string()),
            StoreError::Constraint(_) => AppError::Unprocessable(err.to_string()),
            StoreError::Decode(_) | StoreError::Unavailable(_) | StoreError::Internal(_) => {
                AppError::InternalServerError(err.to_string())
            }
        }
    }
}

impl From<CoreError> for AppError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Store(e) => e.into(),
            CoreError::ValidationError(msg) => AppError::BadRequest(msg),
            CoreError::IdentityError(msg) => AppError::AuthenticationError(msg),
            CoreError::InternalError(msg) | CoreError::PublishError(msg) => AppError::InternalServerError(msg),
        }
    }
}

impl From<ProductError> for AppError {
    fn from(err: ProductError) -> Self {
        match err {
            ProductError::NotFound(_) => AppError::NotFoundError(err.to_string()),
            ProductError::NotAvailable(_) => AppError::ConflictError(err.to_string()),
            ProductError::Invalid(errors) => AppError::ValidationFailed(errors),
        }
    }
}

impl From<BundleError> for AppError {
    fn from(err: BundleError) -> Self {
        match err {
            BundleError::NotFound(_) => AppError::NotFoundError(err.to_string()),
            BundleError::NotAvailable(_) | BundleError::ProductUnavailable(_) => {
                AppError::ConflictError(err.to_string())
            }
            BundleError::Invalid(errors) => AppError::ValidationFailed(errors),
            _ => {
                let mut errors = ValidationErrors::new();
                errors.add("selection", err.to_string());
                AppError::ValidationFailed(errors)
            }
        }
    }
}

impl From<InventoryError> for AppError {
    fn from(err: InventoryError) -> Self {
        match err {
            InventoryError::NotFound(_) => AppError::NotFoundError(err.to_string()),
            InventoryError::InsufficientStock { .. } => AppError::ConflictError(err.to_string()),
        }
    }
}

impl From<CartError> for AppError {
    fn from(err: CartError) -> Self {
        match err {
            CartError::LineNotFound(_) => AppError::NotFoundError(err.to_string()),
            CartError::InvalidQuantity(_) => {
                let mut errors = ValidationErrors::new();
                errors.add("quantity", err.to_string());
                AppError::ValidationFailed(errors)
            }
            CartError::TooManyLines(_) | CartError::Empty => AppError::Unprocessable(err.to_string()),
        }
    }
}

impl From<CouponError> for AppError {
    fn from(err: CouponError) -> Self {
        match err {
            CouponError::NotFound(_) => AppError::NotFoundError(err.to_string()),
            _ => {
                let mut errors = ValidationErrors::new();
                errors.add("code", err.to_string());
                AppError::ValidationFailed(errors)
            }
        }
    }
}

impl From<OrderError> for AppError {
    fn from(err: OrderError) -> Self {
        match err {
            OrderError::NotFound(_) => AppError::NotFoundError(err.to_string()),
            OrderError::InvalidTransition { .. }
            | OrderError::InvalidPaymentTransition { .. }
            | OrderError::UnavailableItems(_) => AppError::ConflictError(err.to_string()),
            OrderError::Inventory(e) => e.into(),
            OrderError::EmptyCart => AppError::Unprocessable(err.to_string()),
            OrderError::CouponRejected(message) => {
                let mut errors = ValidationErrors::new();
                errors.add("coupon", message);
                AppError::ValidationFailed(errors)
            }
            OrderError::Invalid(errors) => AppError::ValidationFailed(errors),
        }
    }
}

impl From<PaymentError> for AppError {
    fn from(err: PaymentError) -> Self {
        match err {
            PaymentError::InvalidSignature | PaymentError::MissingField(_) => AppError::BadRequest(err.to_string()),
            PaymentError::NotConfigured(_) | PaymentError::UnknownGateway(_) => {
                AppError::NotFoundError(err.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body bytes");
        serde_json::from_slice(&bytes).expect("json parse")
    }

    #[tokio::test]
    async fn test_validation_errors_carry_fields() {
        let mut errors = ValidationErrors::new();
        errors.add("email", "The email must be a valid email address.");
        let response = AppError::from(errors).into_response();

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let json = body_json(response).await;
        assert_eq!(json["error"], "The email must be a valid email address.");
        assert_eq!(json["errors"]["email"][0], "The email must be a valid email address.");
    }

    #[tokio::test]
    async fn test_internal_errors_are_not_leaked() {
        let response = AppError::from(StoreError::Unavailable("pool timed out".into())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = body_json(response).await;
        assert_eq!(json["error"], "Internal Server Error");
    }

    #[test]
    fn test_domain_error_statuses() {
        let status = |e: AppError| e.into_response().status();
        assert_eq!(status(StoreError::Conflict("sku".into()).into()), StatusCode::CONFLICT);
        assert_eq!(
            status(OrderError::InvalidTransition { from: "DELIVERED".into(), to: "PENDING".into() }.into()),
            StatusCode::CONFLICT
        );
        assert_eq!(status(OrderError::EmptyCart.into()), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(status(PaymentError::InvalidSignature.into()), StatusCode::BAD_REQUEST);
        assert_eq!(status(CartError::LineNotFound(uuid::Uuid::nil()).into()), StatusCode::NOT_FOUND);
    }
}
