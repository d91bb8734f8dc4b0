//! Request dispatch.
//!
//! [`Client::request`] turns a [`Request`] into one HTTP exchange and hands
//! exactly one outcome to the caller's [`Callbacks`]:
//!
//! - `success` for a 200 response whose body decoded,
//! - `failure` for any other status, an undecodable body or a transport error,
//! - `aborted` when the handle was cancelled before the exchange completed.
//!
//! Cancelling an exchange in flight drops it at the transport, so `aborted`
//! fires without waiting for the server.
//!
//! [`Client::execute`] is the same pipeline without callbacks, returning the
//! [`Outcome`] directly.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;

use http::header::{HeaderName, HeaderValue};

use crate::endpoint::{append_params, build_url};
use crate::error::Error;
use crate::executor::{PreparedRequest, ReqwestTransport, Transport};
use crate::handle::{Abort, Cancel, RequestHandle, RequestState, SharedHandle};
use crate::options::Options;
use crate::response::{Failure, Outcome, Payload};
use crate::types::{Credentials, Exchange, Request};

type SuccessFn = Box<dyn FnOnce(&Request, &Exchange, Payload) + Send>;
type FailureFn = Box<dyn FnOnce(&Request, Option<&Exchange>, Failure) + Send>;
type AbortedFn = Box<dyn FnOnce(&Request, &Abort) + Send>;

/// Optional handlers for the three outcome channels.
///
/// At most one of them runs per request.
#[derive(Default)]
pub struct Callbacks {
    success: Option<SuccessFn>,
    failure: Option<FailureFn>,
    aborted: Option<AbortedFn>,
}

impl Callbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_success<F>(mut self, f: F) -> Self
    where
        F: FnOnce(&Request, &Exchange, Payload) + Send + 'static,
    {
        self.success = Some(Box::new(f));
        self
    }

    pub fn on_failure<F>(mut self, f: F) -> Self
    where
        F: FnOnce(&Request, Option<&Exchange>, Failure) + Send + 'static,
    {
        self.failure = Some(Box::new(f));
        self
    }

    /// Runs when the handle is cancelled. [`Abort`] carries the handle id and
    /// whether the exchange had already started.
    pub fn on_aborted<F>(mut self, f: F) -> Self
    where
        F: FnOnce(&Request, &Abort) + Send + 'static,
    {
        self.aborted = Some(Box::new(f));
        self
    }

    fn deliver(self, id: u64, request: &Request, outcome: Outcome) {
        match outcome {
            Outcome::Success { exchange, payload } => {
                if let Some(success) = self.success {
                    success(request, &exchange, payload);
                }
            }
            Outcome::Failure { exchange, failure } => {
                if let Some(on_failure) = self.failure {
                    on_failure(request, exchange.as_ref(), failure);
                }
            }
            Outcome::Aborted { in_flight } => {
                if let Some(aborted) = self.aborted {
                    aborted(request, &Abort { id, in_flight });
                }
            }
        }
    }
}

impl std::fmt::Debug for Callbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Callbacks")
            .field("success", &self.success.is_some())
            .field("failure", &self.failure.is_some())
            .field("aborted", &self.aborted.is_some())
            .finish()
    }
}

/// Client for one Pentaho server.
///
/// Cheap to clone; clones share the transport.
#[derive(Clone)]
pub struct Client {
    options: Arc<Options>,
    transport: Arc<dyn Transport>,
    credentials: Option<Credentials>,
    next_id: Arc<AtomicU64>,
}

impl Client {
    /// Create a client using reqwest, enforcing the configured request timeout.
    pub fn new(options: Options) -> Result<Self, Error> {
        options.server_url()?;
        let transport = ReqwestTransport::new(options.timeout())?;
        Ok(Self::with_transport(options, Arc::new(transport)))
    }

    /// Create a client on top of a custom transport.
    pub fn with_transport(options: Options, transport: Arc<dyn Transport>) -> Self {
        Self {
            options: Arc::new(options),
            transport,
            credentials: None,
            next_id: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Credentials sent with every request that does not carry its own.
    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Server-relative URL for a request, query string included.
    pub fn url(&self, request: &Request) -> String {
        let url = build_url(
            request.service.as_ref(),
            request.path.as_ref(),
            request.action.as_deref(),
            &self.options,
        );
        append_params(
            &url,
            request
                .params
                .iter()
                .map(|(n, v)| (n.as_str(), v.as_str())),
        )
    }

    /// Resolve the URL, validate headers and serialize the body.
    ///
    /// Fails before any network traffic if the request cannot be sent.
    pub fn prepare(&self, request: &Request) -> Result<PreparedRequest, Error> {
        let server = self.options.server_url()?;
        let url = format!("{}{}", server.as_str().trim_end_matches('/'), self.url(request));
        url::Url::parse(&url)?;

        for (name, value) in &request.headers {
            HeaderName::from_bytes(name.as_bytes())?;
            HeaderValue::from_str(value)?;
        }

        let mut headers = request.headers.clone();
        let body = request.body.as_ref().map(|body| {
            if let Some(content_type) = body.content_type() {
                if request.header("Content-Type").is_none() {
                    headers.push(("Content-Type".to_string(), content_type.to_string()));
                }
            }
            body.encode()
        });

        Ok(PreparedRequest {
            method: request.method,
            url,
            headers,
            body,
            credentials: request
                .credentials
                .clone()
                .or_else(|| self.credentials.clone()),
        })
    }

    /// Perform the exchange on the calling thread and return its outcome.
    pub fn execute(&self, request: &Request) -> Result<Outcome, Error> {
        let prepared = self.prepare(request)?;
        Ok(perform(self.transport.as_ref(), &prepared, &Cancel::new()))
    }

    /// Perform the exchange on the calling thread, keeping only a successful payload.
    pub fn fetch(&self, request: &Request) -> Result<Payload, Error> {
        self.execute(request)?.into_result()
    }

    /// Dispatch a request and deliver its outcome to `callbacks`.
    ///
    /// Synchronous requests (the request's own flag, else the client default)
    /// have run their callback by the time this returns. Asynchronous requests
    /// run on a worker thread; use the returned handle to wait or cancel.
    pub fn request(&self, request: Request, callbacks: Callbacks) -> Result<RequestHandle, Error> {
        let prepared = self.prepare(&request)?;
        let asynchronous = request.asynchronous.unwrap_or(self.options.asynchronous);
        let mut handle = RequestHandle::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        let shared = handle.shared();
        let id = handle.id();

        if asynchronous {
            let transport = Arc::clone(&self.transport);
            let worker = thread::Builder::new()
                .name(format!("phile-request-{:016x}", id))
                .spawn(move || {
                    run(transport.as_ref(), id, &request, &prepared, callbacks, &shared);
                })?;
            handle.attach(worker);
        } else {
            run(self.transport.as_ref(), id, &request, &prepared, callbacks, &shared);
        }

        Ok(handle)
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

fn perform(transport: &dyn Transport, prepared: &PreparedRequest, cancel: &Cancel) -> Outcome {
    log::debug!("{} {}", prepared.method, prepared.url);
    let outcome = Outcome::from_transport(transport.execute(prepared, cancel));
    if let Outcome::Failure { failure, .. } = &outcome {
        log::debug!("{} {} failed: {}", prepared.method, prepared.url, failure);
    }
    outcome
}

fn run(
    transport: &dyn Transport,
    id: u64,
    request: &Request,
    prepared: &PreparedRequest,
    callbacks: Callbacks,
    shared: &SharedHandle,
) {
    if shared.is_aborted() {
        callbacks.deliver(id, request, Outcome::Aborted { in_flight: false });
        return;
    }

    let outcome = perform(transport, prepared, shared.cancel_signal());
    let state = match &outcome {
        Outcome::Success { .. } => RequestState::Complete,
        Outcome::Failure { .. } => RequestState::Failed,
        Outcome::Aborted { .. } => RequestState::Aborted,
    };

    if shared.finish(state, outcome.exchange().cloned()) {
        callbacks.deliver(id, request, outcome);
    } else {
        callbacks.deliver(id, request, Outcome::Aborted { in_flight: true });
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;
    use std::time::{Duration, Instant};

    use super::*;
    use crate::executor::mock::{MockResponse, MockTransport};
    use crate::executor::TransportError;
    use crate::options::Service;
    use crate::types::Method;

    const CHILDREN: &str = "/pentaho/api/repo/files/:home:admin/children";

    #[derive(Debug, PartialEq)]
    enum Seen {
        Success(serde_json::Value),
        Failure(Option<u16>, String),
        Aborted(Abort),
    }

    fn recording() -> (Callbacks, mpsc::Receiver<Seen>) {
        let (tx, rx) = mpsc::channel();
        let (tx2, tx3) = (tx.clone(), tx.clone());
        let callbacks = Callbacks::new()
            .on_success(move |_, _, payload| {
                let value = match payload {
                    Payload::Json(value) => value,
                    other => serde_json::json!(format!("{:?}", other)),
                };
                tx.send(Seen::Success(value)).unwrap();
            })
            .on_failure(move |_, _, failure| {
                tx2.send(Seen::Failure(failure.status(), failure.to_string()))
                    .unwrap();
            })
            .on_aborted(move |_, abort| {
                tx3.send(Seen::Aborted(*abort)).unwrap();
            });
        (callbacks, rx)
    }

    fn client(transport: MockTransport) -> Client {
        Client::with_transport(Options::default().with_async(false), Arc::new(transport))
    }

    fn children_request() -> Request {
        Request::builder()
            .path("/home/admin")
            .action("children")
            .param("depth", 1)
            .header("Accept", "application/json")
            .build()
    }

    #[test]
    fn prepare_resolves_against_server() {
        let client = Client::with_transport(
            Options::default().with_server("http://bi.example.com:8080/"),
            Arc::new(MockTransport::new()),
        );
        let prepared = client.prepare(&children_request()).unwrap();
        assert_eq!(
            prepared.url,
            "http://bi.example.com:8080/pentaho/api/repo/files/:home:admin/children?depth=1"
        );
        assert_eq!(prepared.method, Method::GET);
        assert_eq!(prepared.header("Accept"), Some("application/json"));
        assert!(prepared.body.is_none());
    }

    #[test]
    fn prepare_rejects_bad_header_before_sending() {
        let transport = MockTransport::new();
        let client = client(transport.clone());
        let request = Request::builder().header("Bad Header", "x").build();
        let result = client.request(request, Callbacks::new());
        assert!(matches!(result, Err(Error::InvalidHeaderName(_))));
        assert!(transport.recorded_requests().is_empty());
    }

    #[test]
    fn prepare_adds_form_content_type() {
        let client = client(MockTransport::new());
        let request = Request::builder()
            .method(Method::PUT)
            .form([("a", "1"), ("b", "x y")])
            .build();
        let prepared = client.prepare(&request).unwrap();
        assert_eq!(
            prepared.header("content-type"),
            Some("application/x-www-form-urlencoded")
        );
        assert_eq!(prepared.body.as_deref(), Some(&b"a=1&b=x+y"[..]));
    }

    #[test]
    fn request_does_not_modify_input() {
        let client = client(MockTransport::new());
        let request = Request::builder().path("/home").build();
        let snapshot = request.clone();
        client.request(request.clone(), Callbacks::new()).unwrap();
        assert_eq!(request, snapshot);
        assert!(request.service.is_none());
        assert!(request.action.is_none());
    }

    #[test]
    fn json_success_invokes_success_only() {
        let transport = MockTransport::new().with_response(
            CHILDREN,
            MockResponse::json(serde_json::json!({"x": 1})),
        );
        let (callbacks, rx) = recording();
        let handle = client(transport)
            .request(children_request(), callbacks)
            .unwrap();

        assert_eq!(handle.state(), RequestState::Complete);
        assert_eq!(handle.exchange().unwrap().status, 200);
        assert_eq!(rx.try_recv().unwrap(), Seen::Success(serde_json::json!({"x": 1})));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn not_found_invokes_failure_only() {
        let (callbacks, rx) = recording();
        let handle = client(MockTransport::new())
            .request(children_request(), callbacks)
            .unwrap();

        assert_eq!(handle.state(), RequestState::Failed);
        assert_eq!(
            rx.try_recv().unwrap(),
            Seen::Failure(Some(404), "HTTP 404 Not Found".to_string())
        );
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn undecodable_body_invokes_failure() {
        let transport = MockTransport::new().with_response(
            CHILDREN,
            MockResponse::text("application/json", "{oops"),
        );
        let (callbacks, rx) = recording();
        client(transport).request(children_request(), callbacks).unwrap();
        match rx.try_recv().unwrap() {
            Seen::Failure(None, message) => assert!(message.starts_with("malformed JSON body")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn transport_error_invokes_failure() {
        let transport = MockTransport::new().fail_with(TransportError::Timeout {
            message: "30s elapsed".to_string(),
        });
        let (callbacks, rx) = recording();
        let handle = client(transport).request(children_request(), callbacks).unwrap();
        assert_eq!(handle.state(), RequestState::Failed);
        assert!(handle.exchange().is_none());
        assert_eq!(
            rx.try_recv().unwrap(),
            Seen::Failure(None, "request timed out: 30s elapsed".to_string())
        );
    }

    #[test]
    fn async_request_completes_on_worker() {
        let transport = MockTransport::new()
            .with_response(CHILDREN, MockResponse::json(serde_json::json!([])))
            .with_delay(Duration::from_millis(20));
        let client = Client::with_transport(Options::default(), Arc::new(transport));
        let (callbacks, rx) = recording();
        let handle = client.request(children_request(), callbacks).unwrap();

        assert_eq!(handle.wait(), RequestState::Complete);
        assert_eq!(handle.join(), RequestState::Complete);
        assert_eq!(rx.try_recv().unwrap(), Seen::Success(serde_json::json!([])));
    }

    #[test]
    fn request_flag_overrides_client_default() {
        let transport = MockTransport::new()
            .with_response(CHILDREN, MockResponse::json(serde_json::json!({})));
        let client = Client::with_transport(Options::default(), Arc::new(transport));
        let request = children_request().to_builder().asynchronous(false).build();
        let (callbacks, rx) = recording();
        let handle = client.request(request, callbacks).unwrap();
        assert_eq!(handle.state(), RequestState::Complete);
        assert!(rx.try_recv().is_ok());
    }

    #[test]
    fn cancelled_request_invokes_aborted_only() {
        let transport = MockTransport::new()
            .with_response(CHILDREN, MockResponse::json(serde_json::json!({})))
            .with_delay(Duration::from_millis(200));
        let client = Client::with_transport(Options::default(), Arc::new(transport));
        let (callbacks, rx) = recording();
        let handle = client.request(children_request(), callbacks).unwrap();

        assert!(handle.cancel());
        let id = handle.id();
        assert_eq!(handle.join(), RequestState::Aborted);
        match rx.try_recv().unwrap() {
            Seen::Aborted(abort) => assert_eq!(abort.id, id),
            other => panic!("unexpected {:?}", other),
        }
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn cancel_interrupts_exchange_in_flight() {
        let transport = MockTransport::new()
            .with_response(CHILDREN, MockResponse::json(serde_json::json!({})))
            .with_delay(Duration::from_secs(5));
        let client = Client::with_transport(Options::default(), Arc::new(transport.clone()));
        let (callbacks, rx) = recording();
        let handle = client.request(children_request(), callbacks).unwrap();

        // Let the worker hand the exchange to the transport.
        while transport.recorded_requests().is_empty() {
            std::thread::sleep(Duration::from_millis(5));
        }
        let started = Instant::now();
        assert!(handle.cancel());

        let seen = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(
            seen,
            Seen::Aborted(Abort {
                id: handle.id(),
                in_flight: true
            })
        );
        let exchange = handle.exchange();
        assert_eq!(handle.join(), RequestState::Aborted);
        assert_eq!(transport.completed_count(), 0);
        assert!(exchange.is_none());
    }

    #[test]
    fn cancel_before_dispatch_is_not_in_flight() {
        let transport = MockTransport::new();
        let handle = RequestHandle::new(42);
        assert!(handle.cancel());

        let (callbacks, rx) = recording();
        let request = children_request();
        let prepared = client(transport.clone()).prepare(&request).unwrap();
        run(&transport, 42, &request, &prepared, callbacks, &handle.shared());

        assert_eq!(
            rx.try_recv().unwrap(),
            Seen::Aborted(Abort {
                id: 42,
                in_flight: false
            })
        );
        assert!(transport.recorded_requests().is_empty());
    }

    #[test]
    fn credentials_and_service_reach_transport() {
        let transport = MockTransport::new();
        let client = client(transport.clone());
        let request = Request::builder()
            .service(Service::Session)
            .action("userWorkspaceDir")
            .basic_auth("admin", "password")
            .build();
        client.execute(&request).unwrap();

        let recorded = transport.recorded_requests();
        assert_eq!(
            recorded[0].url,
            "http://localhost:8080/pentaho/api/session/userWorkspaceDir"
        );
        assert_eq!(
            recorded[0].credentials.as_ref().map(|c| c.username.as_str()),
            Some("admin")
        );
    }

    #[test]
    fn client_credentials_fill_in_for_request() {
        let transport = MockTransport::new();
        let client = client(transport.clone()).with_credentials(Credentials::new("suzy", "x"));
        client.execute(&children_request()).unwrap();
        client
            .execute(&children_request().to_builder().basic_auth("admin", "y").build())
            .unwrap();

        let users: Vec<_> = transport
            .recorded_requests()
            .into_iter()
            .map(|r| r.credentials.map(|c| c.username))
            .collect();
        assert_eq!(
            users,
            vec![Some("suzy".to_string()), Some("admin".to_string())]
        );
    }

    #[test]
    fn fetch_maps_outcome_to_result() {
        let transport = MockTransport::new()
            .with_response(CHILDREN, MockResponse::text("text/plain", "hello"));
        let client = client(transport);
        let payload = client.fetch(&children_request()).unwrap();
        assert_eq!(payload.as_text(), Some("hello"));

        let missing = client.fetch(&Request::builder().path("/nope").build());
        match missing {
            Err(Error::Failure(failure)) => assert!(failure.is_not_found()),
            other => panic!("unexpected {:?}", other),
        }
    }
}
