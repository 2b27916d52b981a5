//! # Token broker: one process-wide vendor session.
//!
//! ```text
//! token(ctx)
//!   ├─ cached token ──► return it
//!   └─ none ──► SingleFlight::run(login)     (concurrent callers join the same login)
//!                 ├─ Ok(token) ──► [terminate offline sessions, best effort] ──► cache ──► token
//!                 └─ Err(e)    ──► nothing cached ──► Err(e) for every waiter
//! ```
//!
//! `invalidate()` drops the cached token so the next caller logs in again.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::BridgeError;
use crate::events::{Bus, Event, EventKind};
use crate::memo::SingleFlight;
use crate::reply::RequestContext;
use crate::vendor::{AuthApi, Credentials, Token};

/// Owner of the vendor session token.
pub struct TokenBroker {
    api: Arc<dyn AuthApi>,
    credentials: Credentials,
    terminate_sessions: bool,
    token: Arc<Mutex<Option<Token>>>,
    login: SingleFlight<Token>,
    bus: Bus,
}

impl TokenBroker {
    /// Creates a broker with no token.
    ///
    /// With `terminate_sessions`, every successful login is followed by a
    /// cleanup of the account's offline sessions.
    pub fn new(
        api: Arc<dyn AuthApi>,
        credentials: Credentials,
        terminate_sessions: bool,
        bus: Bus,
    ) -> Self {
        Self {
            api,
            credentials,
            terminate_sessions,
            token: Arc::new(Mutex::new(None)),
            login: SingleFlight::new(),
            bus,
        }
    }

    /// Returns the cached token or logs in.
    pub async fn token(&self, ctx: &RequestContext) -> Result<Token, BridgeError> {
        let cached = self.token.lock().clone();
        if let Some(token) = cached {
            return Ok(token);
        }

        let api = Arc::clone(&self.api);
        let credentials = self.credentials.clone();
        let terminate = self.terminate_sessions;
        let slot = Arc::clone(&self.token);
        let bus = self.bus.clone();
        let ctx = ctx.clone();

        self.login
            .run(move || async move {
                bus.publish(
                    Event::new(EventKind::LoginStarted).with_request(ctx.request_id.as_str()),
                );
                let token = match api.login(&credentials, &ctx).await {
                    Ok(token) => token,
                    Err(e) => {
                        *slot.lock() = None;
                        bus.publish(
                            Event::new(EventKind::LoginFailed)
                                .with_request(ctx.request_id.as_str())
                                .with_reason(e.to_string()),
                        );
                        return Err(e);
                    }
                };

                if terminate {
                    if let Err(e) = api
                        .terminate_offline_sessions(&token, &credentials.user, &ctx)
                        .await
                    {
                        bus.publish(
                            Event::new(EventKind::SessionCleanupFailed)
                                .with_request(ctx.request_id.as_str())
                                .with_reason(e.to_string()),
                        );
                    }
                }

                *slot.lock() = Some(token.clone());
                bus.publish(
                    Event::new(EventKind::LoginSucceeded).with_request(ctx.request_id.as_str()),
                );
                Ok(token)
            })
            .await
    }

    /// Drops the cached token. A login already in flight is not affected.
    pub fn invalidate(&self) {
        if self.token.lock().take().is_some() {
            self.bus.publish(Event::new(EventKind::TokenInvalidated));
        }
    }

    /// Currently cached token, if any.
    pub fn cached(&self) -> Option<Token> {
        self.token.lock().clone()
    }

    /// True while a login is in flight.
    pub fn is_logging_in(&self) -> bool {
        self.login.is_pending()
    }

    /// Ends the current session, if there is one.
    pub async fn logout(&self, ctx: &RequestContext) -> Result<(), BridgeError> {
        let current = self.token.lock().take();
        match current {
            Some(token) => self.api.logout(&token, ctx).await,
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeAuth;
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    fn ctx() -> RequestContext {
        RequestContext::new("test", "c1", "u1", "r1")
    }

    fn broker(api: &Arc<FakeAuth>, terminate: bool, bus: Bus) -> Arc<TokenBroker> {
        Arc::new(TokenBroker::new(
            Arc::clone(api) as Arc<dyn AuthApi>,
            Credentials::new("svc", "pw"),
            terminate,
            bus,
        ))
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_callers_share_one_login() {
        let api = Arc::new(FakeAuth::new().with_login_delay(Duration::from_millis(100)));
        let broker = broker(&api, false, Bus::new(16));

        let mut handles = Vec::new();
        for _ in 0..20 {
            let broker = Arc::clone(&broker);
            handles.push(tokio::spawn(async move { broker.token(&ctx()).await }));
        }
        let mut tokens = Vec::new();
        for h in handles {
            tokens.push(h.await.unwrap().unwrap());
        }

        assert_eq!(api.logins.load(Ordering::SeqCst), 1);
        assert!(tokens.iter().all(|t| t == &tokens[0]));
    }

    #[tokio::test]
    async fn test_token_is_cached_until_invalidated() {
        let api = Arc::new(FakeAuth::new());
        let broker = broker(&api, false, Bus::new(16));

        let a = broker.token(&ctx()).await.unwrap();
        let b = broker.token(&ctx()).await.unwrap();
        assert_eq!(a, b);
        assert_eq!(api.logins.load(Ordering::SeqCst), 1);

        broker.invalidate();
        assert!(broker.cached().is_none());
        let c = broker.token(&ctx()).await.unwrap();
        assert_ne!(a, c);
        assert_eq!(api.logins.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_cleanup_failure_does_not_fail_login() {
        let api = Arc::new(FakeAuth::new().with_failing_cleanup());
        let bus = Bus::new(16);
        let mut rx = bus.subscribe();
        let broker = broker(&api, true, bus);

        assert!(broker.token(&ctx()).await.is_ok());
        assert_eq!(api.cleanups.load(Ordering::SeqCst), 1);

        let kinds: Vec<_> = std::iter::from_fn(|| rx.try_recv().ok()).map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![
                EventKind::LoginStarted,
                EventKind::SessionCleanupFailed,
                EventKind::LoginSucceeded
            ]
        );
    }

    #[tokio::test]
    async fn test_cleanup_skipped_when_disabled() {
        let api = Arc::new(FakeAuth::new());
        let broker = broker(&api, false, Bus::new(16));
        broker.token(&ctx()).await.unwrap();
        assert_eq!(api.cleanups.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_login_failure_clears_state() {
        let api = Arc::new(FakeAuth::new());
        api.fail_logins.store(1, Ordering::SeqCst);
        let broker = broker(&api, false, Bus::new(16));

        let err = broker.token(&ctx()).await.unwrap_err();
        assert!(err.is_auth());
        assert!(broker.cached().is_none());
        assert!(!broker.is_logging_in());

        assert!(broker.token(&ctx()).await.is_ok());
        assert_eq!(api.logins.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_logout_drops_token() {
        let api = Arc::new(FakeAuth::new());
        let broker = broker(&api, false, Bus::new(16));

        broker.logout(&ctx()).await.unwrap();
        assert_eq!(api.logouts.load(Ordering::SeqCst), 0);

        broker.token(&ctx()).await.unwrap();
        broker.logout(&ctx()).await.unwrap();
        assert_eq!(api.logouts.load(Ordering::SeqCst), 1);
        assert!(broker.cached().is_none());
    }
}
