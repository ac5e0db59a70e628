use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use stdwire_envelope::{EnvelopeError, ErrorInfo, Request, Response};

/// Any error a handler may return.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Outcome of one handler invocation.
pub type HandlerResult = std::result::Result<(), HandlerError>;

/// Application callback invoked once per request.
///
/// The handler fills in `response` in place. Whatever it set before failing
/// is kept; the failure itself lands in `response.error`.
pub trait Handler {
    fn handle(&mut self, request: &Request, response: &mut Response) -> HandlerResult;
}

impl<F> Handler for F
where
    F: FnMut(&Request, &mut Response) -> HandlerResult,
{
    fn handle(&mut self, request: &Request, response: &mut Response) -> HandlerResult {
        self(request, response)
    }
}

/// Pin a closure to the handler signature so its argument types are inferred.
pub fn handler_fn<F>(f: F) -> F
where
    F: FnMut(&Request, &mut Response) -> HandlerResult,
{
    f
}

/// Handler that leaves every response empty.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoHandler;

impl Handler for NoHandler {
    fn handle(&mut self, _request: &Request, _response: &mut Response) -> HandlerResult {
        Ok(())
    }
}

/// Run one request through `handler` and return its response.
///
/// Never fails: handler errors and panics are stored in the response. With
/// no handler the response only carries the request id.
pub fn dispatch<H: Handler + ?Sized>(request: &Request, handler: Option<&mut H>) -> Response {
    let mut response = Response::for_request(request);
    let Some(handler) = handler else {
        return response;
    };

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        handler.handle(request, &mut response)
    }));

    match outcome {
        Ok(Ok(())) => {}
        Ok(Err(err)) => {
            let info = error_info(err);
            tracing::warn!(id = ?request.id(), error = %info, "handler failed");
            response.set_error(info);
        }
        Err(payload) => {
            let info = ErrorInfo::new(panic_message(&*payload)).with_kind("panic");
            tracing::warn!(id = ?request.id(), error = %info, "handler panicked");
            response.set_error(info);
        }
    }
    response
}

fn error_info(err: HandlerError) -> ErrorInfo {
    let err = match err.downcast::<ErrorInfo>() {
        Ok(info) => return *info,
        Err(err) => err,
    };
    match err.downcast::<EnvelopeError>() {
        Ok(envelope) => ErrorInfo::from_error(&*envelope).with_kind(envelope.kind()),
        Err(err) => ErrorInfo::from_error(&*err),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "handler panicked".to_string()
    }
}
