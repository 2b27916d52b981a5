//! # Auth-aware retry loop around every vendor operation.
//!
//! ```text
//! attempt = 0
//! loop:
//!   token = broker.token()            ──► Err ──┐
//!   outcome = op(token)                          │
//!     Done(Ok(v))   ──► Reply::ok(v)             │
//!     Cancelled     ──► Reply::error("operation canceled")
//!     Done(Err(e)) ◄────────────────────────────┘
//!       401/403 && attempt < MAX_AUTH_ATTEMPTS ──► invalidate, attempt += 1, loop
//!       otherwise                              ──► Reply::error(e)
//! ```
//!
//! With the default of 3, a permanently rejected token leads to four calls of
//! `op` before the error is surfaced.

use std::future::Future;
use std::sync::Arc;

use crate::error::BridgeError;
use crate::events::{Bus, Event, EventKind};
use crate::pool::Outcome;
use crate::reply::{Reply, RequestContext};
use crate::vendor::Token;

use super::broker::TokenBroker;

/// Number of re-authentications before a 401/403 is surfaced.
pub const MAX_AUTH_ATTEMPTS: u32 = 3;

/// Runs operations with a token from [`TokenBroker`], re-authenticating on 401/403.
#[derive(Clone)]
pub struct AuthGuard {
    broker: Arc<TokenBroker>,
    bus: Bus,
    max_attempts: u32,
}

impl AuthGuard {
    /// Creates a guard allowing [`MAX_AUTH_ATTEMPTS`] re-authentications.
    pub fn new(broker: Arc<TokenBroker>, bus: Bus) -> Self {
        Self {
            broker,
            bus,
            max_attempts: MAX_AUTH_ATTEMPTS,
        }
    }

    /// Overrides the number of re-authentications.
    pub fn with_max_attempts(mut self, n: u32) -> Self {
        self.max_attempts = n;
        self
    }

    /// Token broker used by this guard.
    pub fn broker(&self) -> &Arc<TokenBroker> {
        &self.broker
    }

    /// Runs `op` and wraps the result in a [`Reply`].
    pub async fn run<T, F, Fut>(&self, ctx: &RequestContext, op_name: &str, op: F) -> Reply<T>
    where
        F: FnMut(Token) -> Fut,
        Fut: Future<Output = Outcome<Result<T, BridgeError>>>,
    {
        let res = self.execute(ctx, op_name, op).await;
        self.reply(ctx, op_name, res)
    }

    /// The auth loop without the envelope.
    ///
    /// `Outcome::Cancelled` is returned as [`BridgeError::Canceled`].
    pub async fn execute<T, F, Fut>(
        &self,
        ctx: &RequestContext,
        op_name: &str,
        mut op: F,
    ) -> Result<T, BridgeError>
    where
        F: FnMut(Token) -> Fut,
        Fut: Future<Output = Outcome<Result<T, BridgeError>>>,
    {
        let mut attempt: u32 = 0;
        loop {
            let res = match self.broker.token(ctx).await {
                Ok(token) => match op(token).await {
                    Outcome::Done(res) => res,
                    Outcome::Cancelled => Err(BridgeError::Canceled),
                },
                Err(e) => Err(e),
            };

            match res {
                Err(e) if e.is_auth() && attempt < self.max_attempts => {
                    self.broker.invalidate();
                    attempt += 1;
                    self.bus.publish(
                        Event::new(EventKind::AuthRetry)
                            .with_subject(op_name)
                            .with_request(ctx.request_id.as_str())
                            .with_attempt(attempt)
                            .with_reason(e.to_string()),
                    );
                }
                other => return other,
            }
        }
    }

    /// Converts a result into a [`Reply`], publishing the request outcome.
    pub fn reply<T>(
        &self,
        ctx: &RequestContext,
        op_name: &str,
        res: Result<T, BridgeError>,
    ) -> Reply<T> {
        match res {
            Ok(value) => {
                self.bus.publish(
                    Event::new(EventKind::RequestSucceeded)
                        .with_subject(op_name)
                        .with_request(ctx.request_id.as_str()),
                );
                Reply::ok(ctx.clone(), value)
            }
            Err(e) => {
                self.bus.publish(
                    Event::new(EventKind::RequestFailed)
                        .with_subject(op_name)
                        .with_request(ctx.request_id.as_str())
                        .with_reason(format!("{}: {e}", e.as_label())),
                );
                Reply::error(ctx.clone(), e.to_string())
            }
        }
    }
}
