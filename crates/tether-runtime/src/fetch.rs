#![forbid(unsafe_code)]

//! Cancellable network transport and response cache.
//!
//! A [`Transport`] accepts a [`Request`] plus a one-shot completion callback
//! and returns a [`RequestId`] that can cancel it. A cancelled request must
//! never call its completion. [`MockTransport`] is a scripted implementation
//! that settles requests on the host clock after a fixed latency.
//!
//! [`FetchCache`] is a shared body cache keyed by URL, with freshness measured
//! on the same virtual clock.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use tracing::debug;

use crate::error::FetchError;
use crate::timer::{TimerId, Timers};

/// HTTP method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Method {
    #[default]
    Get,
    Post,
    Put,
    Delete,
}

/// Outgoing request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

impl Request {
    /// A `GET` for `url` with no headers.
    #[must_use]
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            url: url.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    /// Change the method.
    #[must_use]
    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Append a header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Attach a body. Requests with a body are not cached.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Whether the response to this request may be served from a cache:
    /// a `GET` without a body.
    #[must_use]
    pub fn is_cacheable(&self) -> bool {
        self.method == Method::Get && self.body.is_none()
    }
}

/// Settled response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub body: String,
}

impl Response {
    /// A `200` with `body`.
    #[must_use]
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }

    /// Response with an explicit status.
    #[must_use]
    pub fn with_status(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Status in `200..300`.
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Identifier of an in-flight request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(u64);

impl RequestId {
    /// Wrap a transport-specific identifier.
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw identifier.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

/// One-shot completion for a request.
pub type Respond = Box<dyn FnOnce(Result<Response, FetchError>)>;

/// Something that can issue and cancel requests.
pub trait Transport {
    /// Start `request`; `respond` runs once when it settles.
    fn send(&self, request: Request, respond: Respond) -> RequestId;

    /// Cancel an unsettled request. Its completion will not run.
    ///
    /// Returns `false` if the request already settled or was cancelled.
    fn cancel(&self, id: RequestId) -> bool;
}

type Scripted = Result<Response, FetchError>;

/// Default latency of [`MockTransport`].
pub const DEFAULT_LATENCY: Duration = Duration::from_millis(100);

struct MockInner {
    timers: Timers,
    latency: Duration,
    next_id: u64,
    routes: HashMap<String, Scripted>,
    queued: HashMap<String, VecDeque<Scripted>>,
    in_flight: HashMap<RequestId, TimerId>,
    sent: Vec<Request>,
    cancelled: usize,
}

/// Scripted transport that settles on the host clock.
///
/// For each request the transport answers with, in order of precedence, the
/// next queued one-shot response for the URL, the persistent route for the
/// URL, or `404`.
#[derive(Clone)]
pub struct MockTransport {
    inner: Rc<RefCell<MockInner>>,
}

impl fmt::Debug for MockTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("MockTransport")
            .field("latency", &inner.latency)
            .field("in_flight", &inner.in_flight.len())
            .field("sent", &inner.sent.len())
            .finish()
    }
}

impl MockTransport {
    /// A transport with [`DEFAULT_LATENCY`] on `timers`.
    #[must_use]
    pub fn new(timers: &Timers) -> Self {
        Self {
            inner: Rc::new(RefCell::new(MockInner {
                timers: timers.clone(),
                latency: DEFAULT_LATENCY,
                next_id: 0,
                routes: HashMap::new(),
                queued: HashMap::new(),
                in_flight: HashMap::new(),
                sent: Vec::new(),
                cancelled: 0,
            })),
        }
    }

    /// Delay between `send` and the response.
    #[must_use]
    pub fn with_latency(self, latency: Duration) -> Self {
        self.inner.borrow_mut().latency = latency;
        self
    }

    /// Answer every request for `url` with `outcome`.
    pub fn route(&self, url: &str, outcome: Result<Response, FetchError>) {
        self.inner
            .borrow_mut()
            .routes
            .insert(url.to_owned(), outcome);
    }

    /// Answer the next request for `url` with `outcome`, ahead of any route.
    pub fn enqueue(&self, url: &str, outcome: Result<Response, FetchError>) {
        self.inner
            .borrow_mut()
            .queued
            .entry(url.to_owned())
            .or_default()
            .push_back(outcome);
    }

    /// Every request sent so far, in order.
    #[must_use]
    pub fn requests(&self) -> Vec<Request> {
        self.inner.borrow().sent.clone()
    }

    /// Requests sent for `url`.
    #[must_use]
    pub fn request_count(&self, url: &str) -> usize {
        self.inner
            .borrow()
            .sent
            .iter()
            .filter(|r| r.url == url)
            .count()
    }

    /// Requests started and not yet settled or cancelled.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.inner.borrow().in_flight.len()
    }

    /// Requests cancelled before settling.
    #[must_use]
    pub fn cancelled(&self) -> usize {
        self.inner.borrow().cancelled
    }
}

impl Transport for MockTransport {
    fn send(&self, request: Request, respond: Respond) -> RequestId {
        let mut inner = self.inner.borrow_mut();
        let id = RequestId::new(inner.next_id);
        inner.next_id += 1;

        let queued = inner
            .queued
            .get_mut(&request.url)
            .and_then(VecDeque::pop_front);
        let outcome = match queued {
            Some(outcome) => outcome,
            None => inner
                .routes
                .get(&request.url)
                .cloned()
                .unwrap_or_else(|| Ok(Response::with_status(404, ""))),
        };
        debug!(target: "tether::fetch", id = id.0, url = %request.url, "request sent");
        inner.sent.push(request);

        let weak = Rc::downgrade(&self.inner);
        let latency = inner.latency;
        let timer = inner.timers.set_timeout(latency, move || {
            if let Some(rc) = weak.upgrade() {
                rc.borrow_mut().in_flight.remove(&id);
            }
            respond(outcome);
        });
        inner.in_flight.insert(id, timer);
        id
    }

    fn cancel(&self, id: RequestId) -> bool {
        let mut inner = self.inner.borrow_mut();
        let Some(timer) = inner.in_flight.remove(&id) else {
            return false;
        };
        inner.timers.clear(timer);
        inner.cancelled += 1;
        debug!(target: "tether::fetch", id = id.0, "request cancelled");
        true
    }
}

struct CacheEntry {
    stored_at: Duration,
    body: String,
}

struct CacheInner {
    timers: Timers,
    ttl: Duration,
    entries: HashMap<String, CacheEntry>,
}

/// Shared response-body cache with a time-to-live on the host clock.
#[derive(Clone)]
pub struct FetchCache {
    inner: Rc<RefCell<CacheInner>>,
}

impl fmt::Debug for FetchCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("FetchCache")
            .field("ttl", &inner.ttl)
            .field("entries", &inner.entries.len())
            .finish()
    }
}

impl FetchCache {
    /// Empty cache whose entries stay fresh for `ttl`.
    #[must_use]
    pub fn new(timers: &Timers, ttl: Duration) -> Self {
        Self {
            inner: Rc::new(RefCell::new(CacheInner {
                timers: timers.clone(),
                ttl,
                entries: HashMap::new(),
            })),
        }
    }

    /// Fresh body for `url`. Stale entries are evicted on lookup.
    #[must_use]
    pub fn get(&self, url: &str) -> Option<String> {
        let mut inner = self.inner.borrow_mut();
        let now = inner.timers.now();
        let ttl = inner.ttl;
        let fresh = inner
            .entries
            .get(url)
            .map(|entry| now.saturating_sub(entry.stored_at) < ttl)?;
        if fresh {
            inner.entries.get(url).map(|entry| entry.body.clone())
        } else {
            inner.entries.remove(url);
            None
        }
    }

    /// Store `body` for `url`, stamped with the current time.
    pub fn put(&self, url: &str, body: &str) {
        let mut inner = self.inner.borrow_mut();
        let stored_at = inner.timers.now();
        inner.entries.insert(
            url.to_owned(),
            CacheEntry {
                stored_at,
                body: body.to_owned(),
            },
        );
    }

    /// Drop the entry for `url`. Returns `false` if there was none.
    pub fn invalidate(&self, url: &str) -> bool {
        self.inner.borrow_mut().entries.remove(url).is_some()
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.inner.borrow_mut().entries.clear();
    }

    /// Stored entries, fresh or not.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.borrow().entries.len()
    }

    /// Whether nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn capture() -> (Rc<RefCell<Option<Scripted>>>, Respond) {
        let slot = Rc::new(RefCell::new(None));
        let s = Rc::clone(&slot);
        (slot, Box::new(move |r: Scripted| *s.borrow_mut() = Some(r)))
    }

    #[test]
    fn settles_after_latency() {
        let timers = Timers::new();
        let transport = MockTransport::new(&timers).with_latency(ms(50));
        transport.route("/users", Ok(Response::ok("[]")));

        let (slot, respond) = capture();
        transport.send(Request::get("/users"), respond);
        assert_eq!(transport.in_flight(), 1);
        timers.advance(ms(49));
        assert!(slot.borrow().is_none());
        timers.advance(ms(1));
        assert_eq!(*slot.borrow(), Some(Ok(Response::ok("[]"))));
        assert_eq!(transport.in_flight(), 0);
    }

    #[test]
    fn queued_outcomes_take_precedence() {
        let timers = Timers::new();
        let transport = MockTransport::new(&timers);
        transport.route("/x", Ok(Response::ok("route")));
        transport.enqueue("/x", Err(FetchError::Network("reset".into())));

        let (first, respond) = capture();
        transport.send(Request::get("/x"), respond);
        let (second, respond) = capture();
        transport.send(Request::get("/x"), respond);
        timers.advance(DEFAULT_LATENCY);

        assert_eq!(*first.borrow(), Some(Err(FetchError::Network("reset".into()))));
        assert_eq!(*second.borrow(), Some(Ok(Response::ok("route"))));
        assert_eq!(transport.request_count("/x"), 2);
    }

    #[test]
    fn unknown_route_is_404() {
        let timers = Timers::new();
        let transport = MockTransport::new(&timers);
        let (slot, respond) = capture();
        transport.send(Request::get("/missing"), respond);
        timers.advance(DEFAULT_LATENCY);
        assert_eq!(slot.borrow().clone().unwrap().unwrap().status, 404);
    }

    #[test]
    fn cancelled_request_never_responds() {
        let timers = Timers::new();
        let transport = MockTransport::new(&timers);
        let called = Rc::new(Cell::new(false));
        let c = Rc::clone(&called);
        let id = transport.send(Request::get("/slow"), Box::new(move |_: Scripted| c.set(true)));

        assert!(transport.cancel(id));
        assert!(!transport.cancel(id));
        timers.advance(ms(1000));
        assert!(!called.get());
        assert_eq!(transport.cancelled(), 1);
    }

    #[test]
    fn cache_expires_on_clock() {
        let timers = Timers::new();
        let cache = FetchCache::new(&timers, ms(100));
        cache.put("/a", "body");
        timers.advance(ms(99));
        assert_eq!(cache.get("/a").as_deref(), Some("body"));
        timers.advance(ms(1));
        assert_eq!(cache.get("/a"), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn request_builders() {
        let req = Request::get("/p")
            .with_method(Method::Post)
            .with_header("content-type", "application/json")
            .with_body("{}");
        assert!(!req.is_cacheable());
        assert_eq!(req.headers.len(), 1);
        assert!(Request::get("/p").is_cacheable());
        assert!(!Request::get("/p").with_body("q=1").is_cacheable());
        assert!(Response::with_status(204, "").is_success());
        assert!(!Response::with_status(500, "").is_success());
    }
}
