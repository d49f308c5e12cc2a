use std::sync::Arc;

use axum::{
    Router,
    body::Bytes,
    extract::State,
    http::HeaderMap,
    response::{IntoResponse, Response},
    routing::post,
};
use crates::domain::value_objects::tripay_callback::{
    CALLBACK_EVENT_HEADER, CALLBACK_SIGNATURE_HEADER, TripayCallbackPayload,
};
use tracing::{debug, info};

use crate::{
    axum_http::error_responses::callback_ok,
    usecases::invoices::{CallbackOutcome, InvoiceUseCase},
};

pub const TRIPAY_CALLBACK_PATH: &str = "/tripay/callback";

pub fn routes(usecase: Arc<InvoiceUseCase>) -> Router {
    Router::new()
        .route(TRIPAY_CALLBACK_PATH, post(tripay_callback))
        .with_state(usecase)
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

/// The signature covers the exact bytes received, so the body is taken raw
/// and only parsed after the use case has had a chance to verify it.
pub async fn tripay_callback(
    State(usecase): State<Arc<InvoiceUseCase>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let signature = header_value(&headers, CALLBACK_SIGNATURE_HEADER);
    let event = header_value(&headers, CALLBACK_EVENT_HEADER);
    let payload = serde_json::from_slice::<TripayCallbackPayload>(&body)
        .map_err(|err| debug!(error = %err, "tripay callback: body is not a callback payload"))
        .ok();

    match usecase
        .process_callback(&body, signature, event, payload)
        .await
    {
        Ok(CallbackOutcome::Updated { invoice, notified }) => {
            info!(
                merchant_ref = %invoice.merchant_ref,
                status = %invoice.status,
                notified,
                "tripay callback: handled"
            );
            callback_ok()
        }
        Ok(CallbackOutcome::UnknownInvoice) => callback_ok(),
        Err(err) => err.into_response(),
    }
}
