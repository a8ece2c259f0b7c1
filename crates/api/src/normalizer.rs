//! Error normalization around [`Transport::perform`].
//!
//! Every request outcome is folded into a [`ToolOutcome`]: a decoded payload
//! on success, or one of the uniform error records otherwise. Failures are
//! also reported through `tracing` before they are returned.

use std::any::Any;
use std::panic::AssertUnwindSafe;

use futures_util::FutureExt;
use prefect_mcp_types::{Endpoint, ErrorKind, ErrorRecord, ToolOutcome};
use prefect_mcp_util::{redact_sensitive, truncate_preview};
use tracing::warn;

use crate::client::{RawResponse, Transport, TransportError};

const LOG_PREVIEW_LIMIT: usize = 512;
const DECODE_PREVIEW_LIMIT: usize = 200;

/// Execute `endpoint` through `transport` and normalize the result.
///
/// Never returns an error and never panics: a panic raised while the
/// request is in flight is reported as an internal error.
pub async fn execute(transport: &dyn Transport, endpoint: &Endpoint) -> ToolOutcome {
    let attempt = AssertUnwindSafe(transport.perform(endpoint)).catch_unwind().await;
    match attempt {
        Ok(Ok(response)) => normalize_response(endpoint, response),
        Ok(Err(error)) => transport_failure(endpoint, &error),
        Err(panic) => panic_failure(endpoint, panic.as_ref()),
    }
}

fn normalize_response(endpoint: &Endpoint, response: RawResponse) -> ToolOutcome {
    let status = response.status;
    if !status.is_success() {
        report_failure(endpoint, Some(status.as_u16()), &response.body);
        let message = match status.canonical_reason() {
            Some(reason) => format!("Prefect API error: HTTP {} {}", status.as_u16(), reason),
            None => format!("Prefect API error: HTTP {}", status.as_u16()),
        };
        return ErrorRecord::new(ErrorKind::RemoteStatusError, message)
            .with_details(response.body)
            .into();
    }

    match response.json() {
        Ok(payload) => ToolOutcome::Success(payload),
        Err(error) => {
            let cause = format!("response from {} {} is not valid JSON: {error}", endpoint.method(), endpoint.path());
            report_failure(endpoint, Some(status.as_u16()), &cause);
            ErrorRecord::new(ErrorKind::InternalError, format!("Unexpected server error: {cause}"))
                .with_details(truncate_preview(&response.body, DECODE_PREVIEW_LIMIT))
                .into()
        }
    }
}

fn transport_failure(endpoint: &Endpoint, error: &TransportError) -> ToolOutcome {
    report_failure(endpoint, None, &error.to_string());
    if error.is_transport() {
        ErrorRecord::new(ErrorKind::TransportError, format!("Prefect API request error: {error}")).into()
    } else {
        ErrorRecord::new(ErrorKind::InternalError, format!("Unexpected server error: {error}")).into()
    }
}

fn panic_failure(endpoint: &Endpoint, panic: &(dyn Any + Send)) -> ToolOutcome {
    let cause = panic
        .downcast_ref::<&str>()
        .map(|text| text.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "request task panicked".to_string());
    report_failure(endpoint, None, &cause);
    ErrorRecord::new(ErrorKind::InternalError, format!("Unexpected server error: {cause}")).into()
}

/// Diagnostic sink for failed calls. Bodies are redacted and truncated.
fn report_failure(endpoint: &Endpoint, status: Option<u16>, cause: &str) {
    let cause = truncate_preview(&redact_sensitive(cause), LOG_PREVIEW_LIMIT);
    match status {
        Some(status) => warn!(method = %endpoint.method(), path = endpoint.path(), status, %cause, "Prefect API call failed"),
        None => warn!(method = %endpoint.method(), path = endpoint.path(), %cause, "Prefect API call failed"),
    }
}
