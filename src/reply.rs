//! Public result envelope.
//!
//! Every [`Bridge`](crate::Bridge) operation returns a [`Reply`]: either
//! `status: "ok"` with `data`, or `status: "error"` with a message. Errors never
//! cross this boundary any other way.
//!
//! ```text
//! {"serviceName":"capture","clientId":"c1","userId":"u1","requestId":"r1","status":"ok","data":...}
//! {"serviceName":"capture","clientId":"c1","userId":"u1","requestId":"r1","status":"error","error":"..."}
//! ```

use serde::{Deserialize, Serialize};

/// Correlation keys of one request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestContext {
    /// Calling service.
    pub service_name: String,
    /// Client that issued the request.
    pub client_id: String,
    /// End user on whose behalf the request runs.
    pub user_id: String,
    /// Request id, unique per call.
    pub request_id: String,
}

impl RequestContext {
    /// Builds a context.
    pub fn new(
        service_name: impl Into<String>,
        client_id: impl Into<String>,
        user_id: impl Into<String>,
        request_id: impl Into<String>,
    ) -> Self {
        Self {
            service_name: service_name.into(),
            client_id: client_id.into(),
            user_id: user_id.into(),
            request_id: request_id.into(),
        }
    }
}

/// Payload half of a [`Reply`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ReplyBody<T> {
    /// Operation succeeded.
    Ok {
        /// Result value.
        data: T,
    },
    /// Operation failed.
    Error {
        /// Error message.
        error: String,
    },
}

/// Tagged success/error envelope keyed by a [`RequestContext`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reply<T> {
    /// Correlation keys.
    #[serde(flatten)]
    pub ctx: RequestContext,
    /// Outcome.
    #[serde(flatten)]
    pub body: ReplyBody<T>,
}

impl<T> Reply<T> {
    /// Successful reply.
    pub fn ok(ctx: RequestContext, data: T) -> Self {
        Self {
            ctx,
            body: ReplyBody::Ok { data },
        }
    }

    /// Failed reply.
    pub fn error(ctx: RequestContext, error: impl Into<String>) -> Self {
        Self {
            ctx,
            body: ReplyBody::Error {
                error: error.into(),
            },
        }
    }

    /// True for `status: "ok"`.
    pub fn is_ok(&self) -> bool {
        matches!(self.body, ReplyBody::Ok { .. })
    }

    /// Result value, if any.
    pub fn data(&self) -> Option<&T> {
        match &self.body {
            ReplyBody::Ok { data } => Some(data),
            ReplyBody::Error { .. } => None,
        }
    }

    /// Error message, if any.
    pub fn error_message(&self) -> Option<&str> {
        match &self.body {
            ReplyBody::Ok { .. } => None,
            ReplyBody::Error { error } => Some(error),
        }
    }

    /// Converts into a plain `Result`, dropping the context.
    pub fn into_result(self) -> Result<T, String> {
        match self.body {
            ReplyBody::Ok { data } => Ok(data),
            ReplyBody::Error { error } => Err(error),
        }
    }

    /// Maps the success value.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Reply<U> {
        let body = match self.body {
            ReplyBody::Ok { data } => ReplyBody::Ok { data: f(data) },
            ReplyBody::Error { error } => ReplyBody::Error { error },
        };
        Reply { ctx: self.ctx, body }
    }
}
