//! dbctl describe: locate database clusters, fetch each one, project it and stream
//! the summary to a sink.
//!
//! Error policy:
//! - per-item locator errors are soft: deduplicated by message and returned together
//!   in [`Outcome::errors`] after the whole batch;
//! - fetch and projection failures are hard: the run stops at that object. Summaries
//!   already written to the sink stay written.

#![forbid(unsafe_code)]

use std::time::Instant;

use dbctl_core::{project, AggregatedError, ClusterSummary, Located, MalformedResourceError, PlaygroundDefaults};
use dbctl_kubehub::{locate, ClientError, ClusterClient, LocateRequest, LocatorError};
use metrics::{counter, histogram};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Receives summaries one at a time, plus diagnostics meant for stderr.
pub trait SummarySink {
    fn summary(&mut self, summary: &ClusterSummary) -> std::io::Result<()>;
    fn notice(&mut self, message: &str) -> std::io::Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Scope {
    Namespace(String),
    AllNamespaces,
}

impl Scope {
    /// Diagnostic printed when nothing was located and nothing failed.
    pub fn no_resources_message(&self) -> String {
        match self {
            Scope::Namespace(ns) => format!("No resources found in {} namespace.", ns),
            Scope::AllNamespaces => "No resources found".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescribeRequest {
    pub type_hint: String,
    pub scope: Scope,
    pub names: Vec<String>,
    pub chunk_size: u32,
}

impl DescribeRequest {
    fn locate_request(&self) -> LocateRequest<'_> {
        let (namespace, all_namespaces) = match &self.scope {
            Scope::Namespace(ns) => (ns.as_str(), false),
            Scope::AllNamespaces => ("", true),
        };
        LocateRequest {
            type_hint: &self.type_hint,
            namespace,
            all_namespaces,
            names: &self.names,
            chunk_size: self.chunk_size,
        }
    }
}

/// Result of a run that was not aborted.
#[derive(Debug, Default)]
pub struct Outcome {
    /// Locator entries processed, including soft errors.
    pub located: usize,
    pub emitted: usize,
    pub errors: AggregatedError,
}

#[derive(Debug, thiserror::Error)]
pub enum DescribeError {
    #[error("You must specify the database cluster name to describe.")]
    MissingName,
    #[error(transparent)]
    Locate(#[from] LocatorError),
    #[error("{source}")]
    Fetch {
        identity: String,
        #[source]
        source: ClientError,
    },
    #[error("{identity}: {source}")]
    Malformed {
        identity: String,
        #[source]
        source: MalformedResourceError,
    },
    #[error("writing output: {0}")]
    Output(#[from] std::io::Error),
}

pub struct Describer<'a, C: ?Sized> {
    client: &'a C,
    defaults: PlaygroundDefaults,
}

impl<'a, C> Describer<'a, C>
where
    C: ClusterClient + ?Sized,
{
    pub fn new(client: &'a C, defaults: PlaygroundDefaults) -> Self {
        Self { client, defaults }
    }

    /// Locate the requested clusters and run the batch. At least one name is required.
    pub async fn describe<S>(&self, req: &DescribeRequest, sink: &mut S) -> Result<Outcome, DescribeError>
    where
        S: SummarySink + ?Sized,
    {
        if req.names.is_empty() {
            return Err(DescribeError::MissingName);
        }
        let located = locate(self.client, &req.locate_request()).await?;
        self.run(located, &req.scope, sink).await
    }

    /// Fetch, project and emit each located entry in order, one at a time.
    pub async fn run<S>(&self, located: Vec<Located>, scope: &Scope, sink: &mut S) -> Result<Outcome, DescribeError>
    where
        S: SummarySink + ?Sized,
    {
        let mut outcome = Outcome { located: located.len(), ..Default::default() };
        for entry in located {
            let identity = match entry {
                Ok(identity) => identity,
                Err(item) => {
                    if outcome.errors.insert(item.message.clone()) {
                        counter!("describe_soft_errors_total", 1u64);
                        warn!(error = %item, "skipping unresolved entry");
                    } else {
                        debug!(error = %item, "duplicate error suppressed");
                    }
                    continue;
                }
            };

            let namespace = (!identity.namespace.is_empty()).then_some(identity.namespace.as_str());
            let started = Instant::now();
            let doc = self
                .client
                .get(&identity.mapping, namespace, &identity.name)
                .await
                .map_err(|source| DescribeError::Fetch { identity: identity.to_string(), source })?;
            histogram!("describe_fetch_ms", started.elapsed().as_secs_f64() * 1000.0);

            let summary = project(&doc, &self.defaults)
                .map_err(|source| DescribeError::Malformed { identity: identity.to_string(), source })?
                .with_identity(&identity);
            sink.summary(&summary)?;
            counter!("describe_summaries_total", 1u64);
            outcome.emitted += 1;
            debug!(ns = %summary.namespace, name = %summary.cluster_name, status = %summary.status, "summary emitted");
        }

        if outcome.located == 0 && outcome.errors.is_empty() {
            sink.notice(&scope.no_resources_message())?;
        }
        info!(located = outcome.located, emitted = outcome.emitted, errors = outcome.errors.len(), "describe done");
        Ok(outcome)
    }
}
