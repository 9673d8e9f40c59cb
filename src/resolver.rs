use crate::cache::RecordCache;
use crate::enums::{OpCode, Rcode};
use crate::message::Message;
use crate::upstream::Upstream;
use async_trait::async_trait;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, warn};

/// The hook an embedder gets into the pipeline. Runs after the cache
/// and before the upstream stage.
#[async_trait]
pub trait Handler: Send + Sync {
    /// Answer the query, or return `None` to defer to upstream. A
    /// returned response with answers is cached like an upstream one.
    async fn resolve(&self, query: &Message) -> Option<Message>;
}

/// The default handler defers everything.
pub struct NoopHandler;

#[async_trait]
impl Handler for NoopHandler {
    async fn resolve(&self, _query: &Message) -> Option<Message> {
        None
    }
}

/// Turns queries into responses: cache, then handler, then upstream,
/// and SERVFAIL when all three come up dry. Transport-agnostic and
/// shared across every listener task.
pub struct Resolver {
    cache: Arc<RecordCache>,
    cache_enabled: bool,
    handler: Box<dyn Handler>,
    upstream: Box<dyn Upstream>,
}

impl Resolver {
    pub fn new(
        cache: Arc<RecordCache>,
        cache_enabled: bool,
        handler: Box<dyn Handler>,
        upstream: Box<dyn Upstream>,
    ) -> Self {
        Resolver {
            cache,
            cache_enabled,
            handler,
            upstream,
        }
    }

    /// Every query gets a response; the worst a caller sees is
    /// SERVFAIL. Only the first question is resolved, all of them are
    /// echoed.
    pub async fn process(&self, query: &Message) -> Message {
        if query.is_response() || query.header.opcode() != OpCode::Query {
            debug!(
                "refusing id={} qr={:?} opcode={:?}",
                query.id(),
                query.header.qr,
                query.header.opcode()
            );
            return query.make_error(Rcode::NotImplemented);
        }
        let question = match query.first_question() {
            Some(value) => value.clone(),
            None => {
                debug!("query id={} carries no question", query.id());
                return query.make_error(Rcode::FormatError);
            }
        };

        if self.cache_enabled {
            if self.cache.is_negatively_cached(&question.qname) {
                debug!("negative cache hit for {question}");
                return query.make_error(Rcode::NameError);
            }
            if let Some(records) = self.cache.lookup(&question) {
                debug!("cache hit for {question}");
                return query.make_response(records, vec![], vec![]);
            }
        }

        // the embedder's handler is arbitrary code; a panic in there
        // must not take the listener down with it
        match AssertUnwindSafe(self.handler.resolve(query)).catch_unwind().await {
            Ok(Some(response)) => {
                if self.cache_enabled && !response.answers.is_empty() {
                    self.cache.insert(&question, response.answers.clone());
                }
                return response;
            }
            Ok(None) => {}
            Err(_) => {
                warn!("handler panicked while resolving {question}");
                return query.make_error(Rcode::ServFail);
            }
        }

        match self.upstream.proxy(query).await {
            Some(response) => {
                if self.cache_enabled {
                    if response.rcode() == Rcode::NameError {
                        self.cache.insert_negative(&question.qname);
                    } else if !response.answers.is_empty() {
                        self.cache.insert(&question, response.answers.clone());
                    }
                }
                response
            }
            None => {
                debug!("all upstreams failed for {question}");
                query.make_error(Rcode::ServFail)
            }
        }
    }

    pub fn cache(&self) -> &Arc<RecordCache> {
        &self.cache
    }
}
