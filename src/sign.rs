//! Optional JSON-envelope request router layered on top of the raw
//! text channel (spec.md §4.5). Incoming text frames are expected to
//! carry `{"sign": "<tag>", "data": <any>}`; handlers are registered
//! per tag and run in the order they were added, each one deciding
//! whether to call `next` to continue the chain.
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::Value;

use crate::split::WSWriter;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A single step in a tag's handler chain.
pub type Handler = Arc<dyn Fn(Value, WSWriter, Next) -> BoxFuture<'static, ()> + Send + Sync>;

/// Tag used when an inbound envelope's `sign` value has no registered
/// handler chain. Kept verbatim (not "unknown") — it's the name the
/// wire protocol uses.
pub const TAG_UNKNOWN: &str = "unknow";

/// Tag used when inbound text isn't valid JSON at all.
pub const TAG_NOT_JSON: &str = "noJSON";

/// Continuation handed to each handler in a chain so it can invoke the
/// next one. Calling `call` with no handlers left is a no-op.
#[derive(Clone)]
pub struct Next {
    chain: Arc<Vec<Handler>>,
    index: usize,
}

impl Next {
    pub fn call(self, data: Value, writer: WSWriter) -> BoxFuture<'static, ()> {
        Box::pin(async move {
            if let Some(handler) = self.chain.get(self.index).cloned() {
                let next = Next {
                    chain: self.chain,
                    index: self.index + 1,
                };
                handler(data, writer, next).await;
            }
        })
    }
}

/// Routes parsed `{sign, data}` envelopes to their registered handler
/// chains. Cheap to clone — sharable across the tasks driving each
/// connection's reader loop.
#[derive(Clone, Default)]
pub struct SignDispatcher {
    handlers: HashMap<String, Arc<Vec<Handler>>>,
}

impl SignDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `handler` to the chain registered for `tag`.
    pub fn sign<F, Fut>(mut self, tag: impl Into<String>, handler: F) -> Self
    where
        F: Fn(Value, WSWriter, Next) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let boxed: Handler = Arc::new(move |data, writer, next| Box::pin(handler(data, writer, next)));
        let tag = tag.into();
        let chain = Arc::make_mut(self.handlers.entry(tag).or_insert_with(|| Arc::new(Vec::new())));
        chain.push(boxed);
        self
    }

    /// Parses `text` as a `{sign, data}` envelope and runs the matching
    /// chain, falling back to [`TAG_UNKNOWN`] on a tag miss or
    /// [`TAG_NOT_JSON`] when `text` isn't valid JSON at all.
    pub async fn dispatch(&self, text: &str, writer: &WSWriter) {
        let value: Value = match serde_json::from_str(text) {
            Ok(v) => v,
            Err(_) => {
                self.run(TAG_NOT_JSON, Value::String(text.to_string()), writer.clone())
                    .await;
                return;
            }
        };

        let tag = value
            .get("sign")
            .and_then(Value::as_str)
            .unwrap_or(TAG_UNKNOWN)
            .to_string();
        let data = value.get("data").cloned().unwrap_or(Value::Null);

        if self.handlers.contains_key(&tag) {
            self.run(&tag, data, writer.clone()).await;
        } else {
            self.run(TAG_UNKNOWN, data, writer.clone()).await;
        }
    }

    async fn run(&self, tag: &str, data: Value, writer: WSWriter) {
        if let Some(chain) = self.handlers.get(tag) {
            let next = Next {
                chain: chain.clone(),
                index: 0,
            };
            next.call(data, writer).await;
        }
    }
}
