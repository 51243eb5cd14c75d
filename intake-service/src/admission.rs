//! Per-address admission control
//!
//! Each client address owns two fixed windows: a general budget charged by
//! every `/api` request, and a tighter budget charged only by case
//! submissions. Both are checked and charged under the same entry lock, so
//! concurrent requests from one address can never overshoot a budget, and
//! a denied request is never charged.

use crate::config::RateLimitConfig;
use crate::errors::IntakeError;
use async_trait::async_trait;
use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, Method},
    middleware::Next,
    response::Response,
};
use dashmap::DashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

/// Which budget(s) a request is charged against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteClass {
    General,
    FormSubmission,
}

impl RouteClass {
    /// `None` for routes outside `/api`, which bypass admission entirely
    pub fn classify(method: &Method, path: &str) -> Option<Self> {
        let path = path.trim_end_matches('/');
        if path != "/api" && !path.starts_with("/api/") {
            return None;
        }
        if method == Method::POST && path == "/api/form" {
            Some(RouteClass::FormSubmission)
        } else {
            Some(RouteClass::General)
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RouteClass::General => "general",
            RouteClass::FormSubmission => "form-submission",
        }
    }

    pub fn denial_message(&self, retry_after: Duration) -> String {
        match self {
            RouteClass::General => "Too many requests. Please try again later.".to_string(),
            RouteClass::FormSubmission => {
                let minutes = retry_after.as_secs().div_ceil(60).max(1);
                let unit = if minutes == 1 { "minute" } else { "minutes" };
                format!("Too many form submissions. Please try again in {minutes} {unit}.")
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed,
    Denied { retry_after: Duration },
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allowed)
    }
}

/// Backing store for admission windows.
///
/// The in-process map below is the only implementation; a shared backend
/// can slot in here without touching the middleware.
#[async_trait]
pub trait AdmissionStore: Send + Sync {
    async fn check(&self, client: IpAddr, class: RouteClass) -> Decision;

    /// Drop windows that have fully expired; returns how many were removed
    async fn evict_expired(&self) -> usize;
}

#[derive(Debug, Clone, Copy)]
pub struct AdmissionLimits {
    pub general_max: u32,
    pub form_max: u32,
    pub window: Duration,
}

impl From<&RateLimitConfig> for AdmissionLimits {
    fn from(config: &RateLimitConfig) -> Self {
        Self {
            general_max: config.general_max,
            form_max: config.form_max,
            window: config.window,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: u32,
}

impl Window {
    fn new(now: Instant) -> Self {
        Self {
            started: now,
            count: 0,
        }
    }

    fn expired(&self, now: Instant, length: Duration) -> bool {
        now.saturating_duration_since(self.started) >= length
    }

    fn roll(&mut self, now: Instant, length: Duration) {
        if self.expired(now, length) {
            *self = Window::new(now);
        }
    }

    fn retry_after(&self, now: Instant, length: Duration) -> Duration {
        (self.started + length).saturating_duration_since(now)
    }
}

#[derive(Debug)]
struct ClientWindows {
    general: Window,
    form: Window,
}

/// In-memory admission windows keyed by client address
#[derive(Debug)]
pub struct InMemoryAdmissionStore {
    entries: DashMap<IpAddr, ClientWindows>,
    limits: AdmissionLimits,
}

impl InMemoryAdmissionStore {
    pub fn new(limits: AdmissionLimits) -> Self {
        Self {
            entries: DashMap::new(),
            limits,
        }
    }

    /// Check and charge at an explicit instant
    pub fn check_at(&self, client: IpAddr, class: RouteClass, now: Instant) -> Decision {
        let length = self.limits.window;
        let mut entry = self.entries.entry(client).or_insert_with(|| ClientWindows {
            general: Window::new(now),
            form: Window::new(now),
        });

        entry.general.roll(now, length);
        entry.form.roll(now, length);

        if entry.general.count >= self.limits.general_max {
            return Decision::Denied {
                retry_after: entry.general.retry_after(now, length),
            };
        }
        if class == RouteClass::FormSubmission && entry.form.count >= self.limits.form_max {
            return Decision::Denied {
                retry_after: entry.form.retry_after(now, length),
            };
        }

        entry.general.count += 1;
        if class == RouteClass::FormSubmission {
            entry.form.count += 1;
        }
        Decision::Allowed
    }

    pub fn evict_expired_at(&self, now: Instant) -> usize {
        let length = self.limits.window;
        let before = self.entries.len();
        self.entries.retain(|_, windows| {
            !(windows.general.expired(now, length) && windows.form.expired(now, length))
        });
        before.saturating_sub(self.entries.len())
    }

    pub fn tracked_clients(&self) -> usize {
        self.entries.len()
    }
}

#[async_trait]
impl AdmissionStore for InMemoryAdmissionStore {
    async fn check(&self, client: IpAddr, class: RouteClass) -> Decision {
        self.check_at(client, class, Instant::now())
    }

    async fn evict_expired(&self) -> usize {
        self.evict_expired_at(Instant::now())
    }
}

/// The source address the admission decision was made for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientAddress(pub IpAddr);

pub struct AdmissionController {
    store: Arc<dyn AdmissionStore>,
    trusted_proxy_hops: usize,
}

impl AdmissionController {
    pub fn new(store: Arc<dyn AdmissionStore>, trusted_proxy_hops: usize) -> Self {
        Self {
            store,
            trusted_proxy_hops,
        }
    }

    pub fn in_memory(config: &RateLimitConfig) -> Self {
        Self::new(
            Arc::new(InMemoryAdmissionStore::new(AdmissionLimits::from(config))),
            config.trusted_proxy_hops,
        )
    }

    pub async fn check(&self, client: IpAddr, class: RouteClass) -> Decision {
        self.store.check(client, class).await
    }

    /// Resolve the client address: proxy headers (when proxies are
    /// configured), then the socket address, then the unspecified address
    pub fn client_address(&self, request: &Request) -> IpAddr {
        let from_proxy = match self.trusted_proxy_hops {
            0 => None,
            hops => forwarded_client(request.headers(), hops),
        };

        from_proxy
            .or_else(|| {
                request
                    .extensions()
                    .get::<ConnectInfo<SocketAddr>>()
                    .map(|ConnectInfo(addr)| addr.ip())
            })
            .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
    }
}

/// Periodically evict expired windows until the controller is dropped
pub fn spawn_eviction_task(
    controller: &Arc<AdmissionController>,
    every: Duration,
) -> JoinHandle<()> {
    let controller: Weak<AdmissionController> = Arc::downgrade(controller);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let Some(controller) = controller.upgrade() else {
                break;
            };
            let evicted = controller.store.evict_expired().await;
            if evicted > 0 {
                tracing::debug!(evicted, "Evicted expired admission windows");
            }
        }
    })
}

/// Extract the client address from proxy headers.
///
/// Every proxy appends the peer it received the request from, so only the
/// rightmost `hops` entries of `X-Forwarded-For` were written by our own
/// infrastructure. Entries further left are client-supplied and never used.
/// `X-Real-IP` is consulted only when no `X-Forwarded-For` is present.
fn forwarded_client(headers: &HeaderMap, hops: usize) -> Option<IpAddr> {
    let entries: Vec<&str> = headers
        .get_all("x-forwarded-for")
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .collect();

    if entries.is_empty() {
        let real_ip = headers.get("x-real-ip")?.to_str().ok()?;
        return real_ip.rsplit(',').next()?.trim().parse().ok();
    }

    // A chain shorter than the proxy count means we were reached directly
    // by an inner proxy; its leftmost entry is the closest we have
    let index = entries.len().saturating_sub(hops);
    entries.get(index)?.parse().ok()
}

/// Admission middleware: classifies the route, charges the client's
/// budgets, and records the resolved address for downstream handlers
pub async fn admission_middleware(
    State(controller): State<Arc<AdmissionController>>,
    mut request: Request,
    next: Next,
) -> Result<Response, IntakeError> {
    let client = controller.client_address(&request);
    request.extensions_mut().insert(ClientAddress(client));

    let Some(class) = RouteClass::classify(request.method(), request.uri().path()) else {
        return Ok(next.run(request).await);
    };

    match controller.check(client, class).await {
        Decision::Allowed => Ok(next.run(request).await),
        Decision::Denied { retry_after } => {
            tracing::warn!(
                target: "security",
                client = %client,
                route_class = class.as_str(),
                retry_after_secs = retry_after.as_secs(),
                "Admission denied"
            );
            Err(IntakeError::AdmissionDenied {
                route_class: class,
                retry_after,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request as HttpRequest;

    fn limits(general_max: u32, form_max: u32) -> AdmissionLimits {
        AdmissionLimits {
            general_max,
            form_max,
            window: Duration::from_secs(900),
        }
    }

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn test_form_budget() {
        let store = InMemoryAdmissionStore::new(limits(100, 5));
        let now = Instant::now();
        let client = ip("192.168.1.1");

        for _ in 0..5 {
            assert!(store.check_at(client, RouteClass::FormSubmission, now).is_allowed());
        }
        assert!(!store.check_at(client, RouteClass::FormSubmission, now).is_allowed());

        // General routes still have budget left
        assert!(store.check_at(client, RouteClass::General, now).is_allowed());
    }

    #[test]
    fn test_form_submissions_charge_general_budget() {
        let store = InMemoryAdmissionStore::new(limits(3, 5));
        let now = Instant::now();
        let client = ip("192.168.1.2");

        for _ in 0..3 {
            assert!(store.check_at(client, RouteClass::FormSubmission, now).is_allowed());
        }
        assert!(!store.check_at(client, RouteClass::FormSubmission, now).is_allowed());
        assert!(!store.check_at(client, RouteClass::General, now).is_allowed());
    }

    #[test]
    fn test_denials_are_not_charged() {
        let store = InMemoryAdmissionStore::new(limits(10, 1));
        let now = Instant::now();
        let client = ip("192.168.1.3");

        assert!(store.check_at(client, RouteClass::FormSubmission, now).is_allowed());
        for _ in 0..20 {
            assert!(!store.check_at(client, RouteClass::FormSubmission, now).is_allowed());
        }
        // Only the single allowed submission consumed general budget
        for _ in 0..9 {
            assert!(store.check_at(client, RouteClass::General, now).is_allowed());
        }
        assert!(!store.check_at(client, RouteClass::General, now).is_allowed());
    }

    #[test]
    fn test_window_resets_on_expiry() {
        let store = InMemoryAdmissionStore::new(limits(100, 1));
        let start = Instant::now();
        let client = ip("192.168.1.4");

        assert!(store.check_at(client, RouteClass::FormSubmission, start).is_allowed());
        let later = start + Duration::from_secs(60);
        match store.check_at(client, RouteClass::FormSubmission, later) {
            Decision::Denied { retry_after } => assert_eq!(retry_after, Duration::from_secs(840)),
            Decision::Allowed => panic!("second submission should be denied"),
        }
        assert!(store
            .check_at(client, RouteClass::FormSubmission, start + Duration::from_secs(900))
            .is_allowed());
    }

    #[test]
    fn test_addresses_are_independent() {
        let store = InMemoryAdmissionStore::new(limits(100, 1));
        let now = Instant::now();
        assert!(store.check_at(ip("10.0.0.1"), RouteClass::FormSubmission, now).is_allowed());
        assert!(store.check_at(ip("10.0.0.2"), RouteClass::FormSubmission, now).is_allowed());
        assert!(!store.check_at(ip("10.0.0.1"), RouteClass::FormSubmission, now).is_allowed());
    }

    #[test]
    fn test_eviction_drops_only_expired_clients() {
        let store = InMemoryAdmissionStore::new(limits(100, 5));
        let start = Instant::now();
        store.check_at(ip("10.0.0.1"), RouteClass::General, start);
        store.check_at(ip("10.0.0.2"), RouteClass::General, start + Duration::from_secs(600));

        assert_eq!(store.evict_expired_at(start + Duration::from_secs(901)), 1);
        assert_eq!(store.tracked_clients(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_submissions_never_exceed_budget() {
        let store = Arc::new(InMemoryAdmissionStore::new(limits(100, 5)));
        let client = ip("203.0.113.7");

        let handles: Vec<_> = (0..50)
            .map(|_| {
                let store = Arc::clone(&store);
                tokio::spawn(async move {
                    store.check(client, RouteClass::FormSubmission).await
                })
            })
            .collect();

        let mut allowed = 0;
        for handle in handles {
            if handle.await.unwrap().is_allowed() {
                allowed += 1;
            }
        }
        assert_eq!(allowed, 5);
    }

    #[test]
    fn test_route_classification() {
        let classify = |method: Method, path: &str| RouteClass::classify(&method, path);
        assert_eq!(classify(Method::POST, "/api/form"), Some(RouteClass::FormSubmission));
        assert_eq!(classify(Method::POST, "/api/form/"), Some(RouteClass::FormSubmission));
        assert_eq!(classify(Method::GET, "/api/form"), Some(RouteClass::General));
        assert_eq!(classify(Method::PATCH, "/api/form/3/status"), Some(RouteClass::General));
        assert_eq!(classify(Method::GET, "/api"), Some(RouteClass::General));
        assert_eq!(classify(Method::GET, "/apiary"), None);
        assert_eq!(classify(Method::GET, "/"), None);
    }

    fn forwarded(value: &str) -> Request {
        HttpRequest::builder()
            .header("x-forwarded-for", value)
            .body(Body::empty())
            .unwrap()
    }

    fn with_hops(trusted_proxy_hops: usize) -> AdmissionController {
        AdmissionController::in_memory(&RateLimitConfig {
            trusted_proxy_hops,
            ..Default::default()
        })
    }

    #[test]
    fn test_client_address_resolution() {
        let one_proxy = AdmissionController::in_memory(&RateLimitConfig::default());

        // The entry our proxy appended is the rightmost one
        let request = forwarded("198.51.100.4, 10.0.0.1");
        assert_eq!(one_proxy.client_address(&request), ip("10.0.0.1"));
        assert_eq!(with_hops(2).client_address(&request), ip("198.51.100.4"));
        assert_eq!(with_hops(5).client_address(&request), ip("198.51.100.4"));

        let request = HttpRequest::builder()
            .header("x-real-ip", "198.51.100.5")
            .body(Body::empty())
            .unwrap();
        assert_eq!(one_proxy.client_address(&request), ip("198.51.100.5"));

        let mut request = HttpRequest::builder().body(Body::empty()).unwrap();
        request
            .extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 4000))));
        assert_eq!(one_proxy.client_address(&request), ip("127.0.0.1"));

        let request = forwarded("198.51.100.4");
        assert_eq!(
            with_hops(0).client_address(&request),
            IpAddr::V4(Ipv4Addr::UNSPECIFIED)
        );
    }

    #[test]
    fn test_forwarded_for_takes_precedence_over_real_ip() {
        let controller = with_hops(1);
        let request = HttpRequest::builder()
            .header("x-real-ip", "192.0.2.1")
            .header("x-forwarded-for", "198.51.100.7")
            .body(Body::empty())
            .unwrap();
        assert_eq!(controller.client_address(&request), ip("198.51.100.7"));

        // Repeated headers form one chain in arrival order
        let request = HttpRequest::builder()
            .header("x-forwarded-for", "192.0.2.9")
            .header("x-forwarded-for", "198.51.100.8")
            .body(Body::empty())
            .unwrap();
        assert_eq!(controller.client_address(&request), ip("198.51.100.8"));
    }

    #[test]
    fn test_unparseable_forwarded_entry_falls_back_to_socket() {
        let controller = with_hops(1);
        let mut request = forwarded("198.51.100.4, not-an-address");
        request
            .extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([192, 0, 2, 44], 4000))));
        assert_eq!(controller.client_address(&request), ip("192.0.2.44"));
    }

    #[tokio::test]
    async fn test_spoofed_leftmost_entries_share_one_budget() {
        let controller = AdmissionController::in_memory(&RateLimitConfig::default());

        let mut decisions = Vec::new();
        for i in 0..20 {
            let request = forwarded(&format!("10.9.9.{i}, 203.0.113.5"));
            let client = controller.client_address(&request);
            assert_eq!(client, ip("203.0.113.5"));
            decisions.push(controller.check(client, RouteClass::FormSubmission).await);
        }

        let allowed = decisions.iter().filter(|d| d.is_allowed()).count();
        assert_eq!(allowed, 5);
        assert!(decisions[..5].iter().all(Decision::is_allowed));
    }

    #[test]
    fn test_denial_messages() {
        assert_eq!(
            RouteClass::FormSubmission.denial_message(Duration::from_secs(900)),
            "Too many form submissions. Please try again in 15 minutes."
        );
        assert_eq!(
            RouteClass::General.denial_message(Duration::from_secs(5)),
            "Too many requests. Please try again later."
        );
    }
}
