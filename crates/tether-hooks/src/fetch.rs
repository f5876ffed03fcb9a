#![forbid(unsafe_code)]

//! Data fetching with retry, caching and cancellation.
//!
//! The hook's value is a [`FetchState`]: `Loading` until the request settles,
//! then exactly one of `Data` or `Error`. Failures never surface as `Err`
//! from the hook itself; they become `FetchState::Error`.
//!
//! # Lifecycle
//!
//! ```text
//! activate ─► cache hit? ──yes──► Data
//!                 │ no
//!                 ▼
//!            send request ─► settled ─► ok ─► decode ─► Data (cached)
//!                 ▲                    └─ err ─► retryable and attempts left?
//!                 │                                 │ yes            │ no
//!                 └──────── backoff timer ◄─────────┘                ▼
//!                                                                  Error
//! ```
//!
//! Teardown cancels whichever of the request or backoff timer is live. A
//! transport that answers after teardown is ignored.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use serde::de::DeserializeOwned;
use tether_runtime::{
    Deregister, FetchCache, FetchError, HookConfig, HookError, Host, Notifier, RegistrationError,
    Request, RequestId, ResourceHandle, Response, RetryPolicy, TimerId, Timers, Transport, Watch,
};
use tracing::{debug, warn};

/// Outcome of a fetch. Exactly one variant is populated at a time.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchState<T> {
    Loading,
    Data(T),
    Error(FetchError),
}

impl<T> FetchState<T> {
    /// Still waiting for the request to settle.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }

    /// Payload of a successful fetch.
    #[must_use]
    pub fn data(&self) -> Option<&T> {
        match self {
            Self::Data(value) => Some(value),
            _ => None,
        }
    }

    /// Failure of a settled fetch.
    #[must_use]
    pub fn error(&self) -> Option<&FetchError> {
        match self {
            Self::Error(err) => Some(err),
            _ => None,
        }
    }
}

/// Retry and cache settings for [`Fetch`].
#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    pub retry: RetryPolicy,
    pub cache: Option<FetchCache>,
}

impl FetchOptions {
    /// Retry policy from `config`, and a new cache on `timers` holding bodies
    /// for `config.cache_ttl`. A zero TTL disables caching.
    ///
    /// Clone the options to share the cache between fetches.
    #[must_use]
    pub fn from_config(config: &HookConfig, timers: &Timers) -> Self {
        Self {
            retry: config.retry,
            cache: (!config.cache_ttl.is_zero())
                .then(|| FetchCache::new(timers, config.cache_ttl)),
        }
    }

    /// Replace the retry policy.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Read and fill `cache`.
    #[must_use]
    pub fn with_cache(mut self, cache: FetchCache) -> Self {
        self.cache = Some(cache);
        self
    }
}

struct FetchContext {
    transport: Rc<dyn Transport>,
    timers: Timers,
    request: Request,
    retry: RetryPolicy,
    cache: Option<FetchCache>,
}

/// What the current activation is waiting on.
#[derive(Debug, Clone, Copy, Default)]
enum InFlight {
    #[default]
    Idle,
    /// Inside `Transport::send`, before it returned an id.
    Sending,
    Request(RequestId),
    Backoff(TimerId),
}

type Slot = Rc<RefCell<InFlight>>;

/// A request whose settled outcome is held as a [`FetchState`].
pub struct Fetch<T: 'static> {
    context: Rc<FetchContext>,
    handle: ResourceHandle<FetchState<T>>,
}

impl<T: fmt::Debug + 'static> fmt::Debug for Fetch<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fetch")
            .field("url", &self.context.request.url)
            .field("handle", &self.handle)
            .finish()
    }
}

fn settle<T: DeserializeOwned>(outcome: Result<Response, FetchError>) -> Result<(T, String), FetchError> {
    let response = outcome?;
    if !response.is_success() {
        return Err(FetchError::Status(response.status));
    }
    let value = serde_json::from_str(&response.body).map_err(|e| FetchError::Decode(e.to_string()))?;
    Ok((value, response.body))
}

fn attempt<T>(context: Rc<FetchContext>, notify: Notifier<FetchState<T>>, slot: Slot, number: u32)
where
    T: Clone + DeserializeOwned + 'static,
{
    *slot.borrow_mut() = InFlight::Sending;
    let (ctx, n, s) = (Rc::clone(&context), notify.clone(), Rc::clone(&slot));
    let id = context.transport.send(
        context.request.clone(),
        Box::new(move |outcome: Result<Response, FetchError>| {
            *s.borrow_mut() = InFlight::Idle;
            if !n.is_live() {
                debug!(target: "tether::hooks", url = %ctx.request.url, "discarding response after teardown");
                return;
            }
            match settle::<T>(outcome) {
                Ok((value, body)) => {
                    if let Some(cache) = ctx.cache.as_ref().filter(|_| ctx.request.is_cacheable()) {
                        cache.put(&ctx.request.url, &body);
                    }
                    n.notify(FetchState::Data(value));
                }
                Err(err) if ctx.retry.should_retry(number, &err) => {
                    let delay = ctx.retry.delay_for(number);
                    debug!(
                        target: "tether::hooks",
                        url = %ctx.request.url,
                        attempt = number,
                        ?delay,
                        error = %err,
                        "retrying request"
                    );
                    let (retry_ctx, retry_n, retry_s) = (Rc::clone(&ctx), n.clone(), Rc::clone(&s));
                    let timer = ctx.timers.set_timeout(delay, move || {
                        attempt(retry_ctx, retry_n, retry_s, number + 1);
                    });
                    *s.borrow_mut() = InFlight::Backoff(timer);
                }
                Err(err) => {
                    debug!(target: "tether::hooks", url = %ctx.request.url, attempts = number, error = %err, "request failed");
                    n.notify(FetchState::Error(err));
                }
            }
        }),
    );
    let mut current = slot.borrow_mut();
    if matches!(*current, InFlight::Sending) {
        *current = InFlight::Request(id);
    }
}

impl<T> Fetch<T>
where
    T: Clone + DeserializeOwned + 'static,
{
    /// Start fetching `request` through `transport`.
    pub fn new(
        host: &Host,
        transport: Rc<dyn Transport>,
        request: Request,
        options: FetchOptions,
    ) -> Result<Self, HookError> {
        let hook = Self {
            context: Rc::new(FetchContext {
                transport,
                timers: host.timers().clone(),
                request,
                retry: options.retry,
                cache: options.cache,
            }),
            handle: ResourceHandle::named("fetch", FetchState::Loading),
        };
        hook.start(true)?;
        Ok(hook)
    }

    fn start(&self, use_cache: bool) -> Result<(), HookError> {
        let context = Rc::clone(&self.context);
        self.handle.activate(
            move |notify: Notifier<FetchState<T>>| -> Result<Deregister, RegistrationError> {
                notify.notify(FetchState::Loading);

                let cached = context
                    .cache
                    .as_ref()
                    .filter(|_| use_cache && context.request.is_cacheable())
                    .and_then(|cache| cache.get(&context.request.url).map(|body| (cache, body)));
                if let Some((cache, body)) = cached {
                    match serde_json::from_str::<T>(&body) {
                        Ok(value) => {
                            debug!(target: "tether::hooks", url = %context.request.url, "served from cache");
                            notify.notify(FetchState::Data(value));
                            return Ok(Deregister::noop());
                        }
                        Err(err) => {
                            warn!(target: "tether::hooks", url = %context.request.url, error = %err, "evicting undecodable cache entry");
                            cache.invalidate(&context.request.url);
                        }
                    }
                }

                let slot: Slot = Rc::new(RefCell::new(InFlight::Idle));
                attempt(Rc::clone(&context), notify, Rc::clone(&slot), 1);

                Ok(Deregister::new(move || {
                    let live = slot.replace(InFlight::Idle);
                    match live {
                        InFlight::Request(id) => {
                            context.transport.cancel(id);
                        }
                        InFlight::Backoff(timer) => {
                            context.timers.clear(timer);
                        }
                        InFlight::Idle | InFlight::Sending => {}
                    }
                }))
            },
        )
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> FetchState<T> {
        self.handle.current_value()
    }

    /// Decoded payload, if the request succeeded.
    #[must_use]
    pub fn data(&self) -> Option<T> {
        self.handle.with(|state| state.data().cloned())
    }

    /// Whether the request has not settled yet.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.handle.with(FetchState::is_loading)
    }

    /// Tear down and fetch again, bypassing the cache.
    pub fn refetch(&self) -> Result<(), HookError> {
        self.handle.deactivate();
        self.start(false)
    }

    /// Observe state transitions.
    pub fn watch(&self, callback: impl Fn(&FetchState<T>) + 'static) -> Watch {
        self.handle.watch(callback)
    }

    /// Cancel the request or pending retry. Idempotent.
    pub fn deactivate(&self) {
        self.handle.deactivate();
    }
}
