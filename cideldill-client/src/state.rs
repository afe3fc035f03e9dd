//! The process-wide switch and the session state behind it.
//!
//! One explicit object owns everything an attached session needs; there is
//! no hidden module-load initialization. The enabled flag is a plain
//! atomic so the hot path (is debugging even on?) never takes a lock, and
//! flips are expected to be rare, at startup and teardown.

use std::{
    collections::HashSet,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use cideldill_proto::{
    codec::{self, Payload},
    endpoints::callable::RegisterRequest,
    value::ValueRef,
};
use parking_lot::{Mutex, RwLock};
use tracing::info;
use url::Url;

use crate::{
    cache::CidCache,
    errors::DebugError,
    exceptions::ExceptionRegistry,
    http::{AsyncInspectorClient, InspectorClient},
    proxy::Debugged,
    replacements::ReplacementRegistry,
    DEFAULT_SERVER_URL, SERVER_URL_ENV,
};

static ENABLED: AtomicBool = AtomicBool::new(false);
static STATE: RwLock<Option<Arc<DebugState>>> = RwLock::new(None);

/// Everything one attached session owns: the two HTTP clients sharing one
/// CID cache, and the registries the inline-call path accumulates.
/// Dropped wholesale on [`detach`], which is what clears the registries.
pub(crate) struct DebugState {
    pub(crate) http: InspectorClient,
    pub(crate) http_async: AsyncInspectorClient,
    registered: Mutex<HashSet<(String, String)>>,
    pub(crate) replacements: ReplacementRegistry,
    pub(crate) exceptions: ExceptionRegistry,
}

impl DebugState {
    /// Announces a callable to the inspector, once per (name, type) pair.
    /// Repeated inline calls of the same callable hit the local set and
    /// send nothing.
    pub(crate) fn register_callable<F: ?Sized>(&self, name: &str) -> Result<(), DebugError> {
        let Some((key, request)) = self.registration::<F>(name)? else {
            return Ok(());
        };

        self.http.register(&request)?;
        self.registered.lock().insert(key);

        Ok(())
    }

    /// [`Self::register_callable`] for async callers, which must not touch
    /// the blocking client.
    pub(crate) async fn register_callable_async<F: ?Sized>(
        &self,
        name: &str,
    ) -> Result<(), DebugError> {
        let Some((key, request)) = self.registration::<F>(name)? else {
            return Ok(());
        };

        self.http_async.register(&request).await?;
        self.registered.lock().insert(key);

        Ok(())
    }

    #[allow(clippy::type_complexity)]
    fn registration<F: ?Sized>(
        &self,
        name: &str,
    ) -> Result<Option<((String, String), RegisterRequest)>, DebugError> {
        let signature = std::any::type_name::<F>().to_string();
        let key = (name.to_string(), signature.clone());

        if self.registered.lock().contains(&key) {
            return Ok(None);
        }

        let target = callable_target::<F>(name)?;

        Ok(Some((
            key,
            RegisterRequest {
                name: name.to_string(),
                signature,
                target_cid: target.cid,
            },
        )))
    }
}

/// Builds the placeholder wire value standing in for a callable: functions
/// have no serde representation, so the target travels as an opaque
/// payload naming the callable's type and alias.
pub(crate) fn callable_target<F: ?Sized>(name: &str) -> Result<ValueRef, DebugError> {
    let payload = Payload::Opaque {
        type_name: std::any::type_name::<F>().to_string(),
        repr: format!("<callable {name}>"),
    };

    Ok(ValueRef::from_bytes(codec::encode_payload(&payload)?))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connected,
    Disconnected,
}

/// What the switch reports back: whether debugging is on, where the
/// inspector lives, and whether it answered.
#[derive(Debug, Clone)]
pub struct AttachInfo {
    pub enabled: bool,
    pub server_url: Option<Url>,
    pub connection_status: ConnectionStatus,
}

/// The single mode switch: `"ON"` or `"OFF"`, case-insensitive. Anything
/// else is an error rather than a silent no-op.
pub fn set_mode(mode: &str) -> Result<AttachInfo, DebugError> {
    if mode.eq_ignore_ascii_case("on") {
        attach()
    } else if mode.eq_ignore_ascii_case("off") {
        Ok(detach())
    } else {
        Err(DebugError::UnknownMode(mode.to_string()))
    }
}

/// Turns debugging on against the URL named by `CIDELDILL_SERVER_URL`,
/// falling back to the default loopback address.
pub fn attach() -> Result<AttachInfo, DebugError> {
    let url = std::env::var(SERVER_URL_ENV).unwrap_or_else(|_| DEFAULT_SERVER_URL.to_string());
    attach_to(&url)
}

/// Turns debugging on against an explicit inspector URL.
///
/// Verifies the inspector is actually reachable before reporting success;
/// debugging that silently never connected would hide bugs on both sides.
/// Call this from synchronous startup code, before any async runtime the
/// host may have is entered.
pub fn attach_to(url: &str) -> Result<AttachInfo, DebugError> {
    let parsed = Url::parse(url).map_err(|source| DebugError::InvalidUrl {
        url: url.to_string(),
        source,
    })?;

    ensure_loopback(&parsed)?;

    let cache = Arc::new(CidCache::default());
    let http = InspectorClient::new(parsed.clone(), cache.clone())?;
    let http_async = AsyncInspectorClient::new(parsed.clone(), cache)?;

    http.health()?;

    let state = Arc::new(DebugState {
        http,
        http_async,
        registered: Mutex::new(HashSet::new()),
        replacements: ReplacementRegistry::default(),
        exceptions: ExceptionRegistry::default(),
    });

    *STATE.write() = Some(state);
    ENABLED.store(true, Ordering::SeqCst);

    info!(url = %parsed, "debugging attached");

    Ok(AttachInfo {
        enabled: true,
        server_url: Some(parsed),
        connection_status: ConnectionStatus::Connected,
    })
}

/// Turns debugging off, dropping the session and with it everything the
/// inline-call path registered.
pub fn detach() -> AttachInfo {
    ENABLED.store(false, Ordering::SeqCst);
    *STATE.write() = None;

    info!("debugging detached");

    AttachInfo {
        enabled: false,
        server_url: None,
        connection_status: ConnectionStatus::Disconnected,
    }
}

pub fn is_enabled() -> bool {
    ENABLED.load(Ordering::SeqCst)
}

pub(crate) fn current() -> Option<Arc<DebugState>> {
    if !is_enabled() {
        return None;
    }

    STATE.read().clone()
}

/// Wraps a value for interception.
///
/// With debugging off this is a passthrough: the wrapper holds no session,
/// performs no fingerprinting or HTTP, and [`Debugged::into_inner`] hands
/// the value back untouched. With debugging on, calls made through the
/// wrapper run the interception protocol.
pub fn wrap<T>(target: T) -> Debugged<T> {
    Debugged::new(target, current())
}

fn ensure_loopback(url: &Url) -> Result<(), DebugError> {
    let loopback = match url.host() {
        Some(url::Host::Ipv4(addr)) => addr.is_loopback(),
        Some(url::Host::Ipv6(addr)) => addr.is_loopback(),
        Some(url::Host::Domain(domain)) => domain == "localhost",
        None => false,
    };

    if loopback {
        Ok(())
    } else {
        Err(DebugError::NonLoopback(url.to_string()))
    }
}
