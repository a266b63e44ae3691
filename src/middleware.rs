// ABOUTME: Interceptor chain (C8) — ordered middleware wrapping the terminal submission
// ABOUTME: through the pipelined queue, built once at startup per the teacher's layered-trait style

use crate::error::RespError;
use crate::resp::value::Value;
use bytes::Bytes;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// A boxed, owned future — the crate has no `futures` dependency, so the chain's
/// recursive `next.call(ctx)` shape is expressed with a hand-rolled alias instead of
/// pulling one in for a single type.
pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

/// A single outgoing command and the property bag middleware can stash state in.
///
/// Mirrors the design's "request context carries {command-token, argument list or
/// encoded bytes, a key/value property bag}" — the bag is a plain string map since
/// nothing in this crate's own middleware needs more than that; a consumer wanting
/// richer values can serialize into it.
#[derive(Clone, Debug)]
pub struct RequestContext {
    pub command: Bytes,
    pub args: Vec<Bytes>,
    pub properties: HashMap<String, String>,
}

impl RequestContext {
    pub fn new(command: impl Into<Bytes>, args: Vec<Bytes>) -> Self {
        RequestContext { command: command.into(), args, properties: HashMap::new() }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }
}

/// One link in the chain. `next` is the rest of the chain (including the terminal
/// submission); a middleware may call it, rewrite `ctx` first, rewrite the returned
/// `Value`, or skip it entirely and synthesize a response (e.g. a circuit-open error).
pub trait Middleware: Send + Sync + 'static {
    fn handle(&self, ctx: RequestContext, next: Next) -> BoxFuture<Result<Value, RespError>>;
}

/// Handle to the remainder of the chain, handed to a `Middleware::handle` call.
pub struct Next {
    inner: Arc<Inner>,
    index: usize,
}

impl Next {
    pub fn call(self, ctx: RequestContext) -> BoxFuture<Result<Value, RespError>> {
        self.inner.dispatch(self.index, ctx)
    }
}

type Terminal = Arc<dyn Fn(RequestContext) -> BoxFuture<Result<Value, RespError>> + Send + Sync>;

struct Inner {
    middlewares: Vec<Arc<dyn Middleware>>,
    terminal: Terminal,
}

impl Inner {
    fn dispatch(self: Arc<Self>, index: usize, ctx: RequestContext) -> BoxFuture<Result<Value, RespError>> {
        match self.middlewares.get(index) {
            Some(mw) => {
                let mw = mw.clone();
                let next = Next { inner: self.clone(), index: index + 1 };
                mw.handle(ctx, next)
            }
            None => (self.terminal)(ctx),
        }
    }
}

/// The interceptor chain itself (C8). Built once at startup from an ordered list of
/// middleware plus the terminal handler that actually submits through C6; ordering
/// follows registration, matching the design notes' "no inheritance hierarchy
/// required... a straight-line iteration over an ordered list".
#[derive(Clone)]
pub struct Chain(Arc<Inner>);

impl Chain {
    pub fn new(
        middlewares: Vec<Arc<dyn Middleware>>,
        terminal: impl Fn(RequestContext) -> BoxFuture<Result<Value, RespError>> + Send + Sync + 'static,
    ) -> Self {
        Chain(Arc::new(Inner { middlewares, terminal: Arc::new(terminal) }))
    }

    pub fn call(&self, ctx: RequestContext) -> BoxFuture<Result<Value, RespError>> {
        self.0.clone().dispatch(0, ctx)
    }
}

/// Logs every command at debug level and its outcome (success / server error /
/// transport failure) at the appropriate level. Ships in the crate itself, the way the
/// teacher's `keepalive`/`flow_control` modules ship concrete, ready-to-use behavior
/// rather than leaving every cross-cutting concern to the caller.
pub struct LoggingMiddleware;

impl Middleware for LoggingMiddleware {
    fn handle(&self, ctx: RequestContext, next: Next) -> BoxFuture<Result<Value, RespError>> {
        Box::pin(async move {
            let command = String::from_utf8_lossy(&ctx.command).into_owned();
            tracing::debug!(command = %command, nargs = ctx.args.len(), "submitting command");
            let result = next.call(ctx).await;
            match &result {
                Ok(value) if value.is_error() => {
                    tracing::warn!(command = %command, "server returned an error frame");
                }
                Ok(_) => tracing::debug!(command = %command, "command completed"),
                Err(e) => tracing::warn!(command = %command, error = %e, "command failed"),
            }
            result
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Uppercase;

    impl Middleware for Uppercase {
        fn handle(&self, mut ctx: RequestContext, next: Next) -> BoxFuture<Result<Value, RespError>> {
            ctx.command = Bytes::from(String::from_utf8_lossy(&ctx.command).to_uppercase());
            next.call(ctx)
        }
    }

    struct ShortCircuit;

    impl Middleware for ShortCircuit {
        fn handle(&self, _ctx: RequestContext, _next: Next) -> BoxFuture<Result<Value, RespError>> {
            Box::pin(async { Ok(Value::error(&b"CIRCUITOPEN synthesized"[..])) })
        }
    }

    fn echo_terminal() -> Chain {
        Chain::new(vec![], |ctx| {
            Box::pin(async move { Ok(Value::bulk_string(ctx.command)) })
        })
    }

    #[tokio::test]
    async fn empty_chain_calls_terminal_directly() {
        let chain = echo_terminal();
        let result = chain.call(RequestContext::new("ping", vec![])).await.unwrap();
        assert_eq!(result, Value::bulk_string(&b"ping"[..]));
    }

    #[tokio::test]
    async fn middleware_rewrites_request_before_terminal() {
        let chain = Chain::new(vec![Arc::new(Uppercase)], |ctx| {
            Box::pin(async move { Ok(Value::bulk_string(ctx.command)) })
        });
        let result = chain.call(RequestContext::new("get", vec![])).await.unwrap();
        assert_eq!(result, Value::bulk_string(&b"GET"[..]));
    }

    #[tokio::test]
    async fn middleware_can_short_circuit() {
        let chain = Chain::new(vec![Arc::new(ShortCircuit)], |_ctx| {
            Box::pin(async { panic!("terminal must not run") })
        });
        let result = chain.call(RequestContext::new("get", vec![])).await.unwrap();
        assert!(result.is_error());
    }

    #[tokio::test]
    async fn ordering_follows_registration() {
        struct Tag(&'static str);
        impl Middleware for Tag {
            fn handle(&self, mut ctx: RequestContext, next: Next) -> BoxFuture<Result<Value, RespError>> {
                let tag = self.0;
                Box::pin(async move {
                    ctx.properties.insert(tag.to_string(), "seen".to_string());
                    next.call(ctx).await
                })
            }
        }
        let chain = Chain::new(vec![Arc::new(Tag("first")), Arc::new(Tag("second"))], |ctx| {
            Box::pin(async move {
                assert_eq!(ctx.properties.get("first").map(String::as_str), Some("seen"));
                assert_eq!(ctx.properties.get("second").map(String::as_str), Some("seen"));
                Ok(Value::Null)
            })
        });
        chain.call(RequestContext::new("ping", vec![])).await.unwrap();
    }
}
