//! Async front end for concurrent callers
//!
//! Signing and verification are blocking (file I/O and OpenSSL). The service runs
//! them on tokio's blocking pool, never more than `max_concurrency` at a time, and
//! bounds the work of every call by `timeout_seconds`. Time spent waiting for a
//! permit does not count.

use crate::config::SigningConfig;
use crate::signature::error::SignError;
use crate::signature::passphrase::Passphrase;
use crate::signature::signer::{CommitGate, SignedArtifact, Signer, SigningKey};
use crate::signature::verdict::Verdict;
use crate::signature::verifier::Verifier;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

/// Bounded, timed sign/verify worker pool
#[derive(Clone)]
pub struct SigningService {
    signer: Arc<Signer>,
    verifier: Arc<Verifier>,
    permits: Arc<Semaphore>,
    timeout: Duration,
}

impl SigningService {
    pub fn new(config: SigningConfig) -> Result<Self, SignError> {
        let permits = Arc::new(Semaphore::new(config.max_concurrency.max(1)));
        let timeout = config.timeout();

        Ok(Self {
            verifier: Arc::new(Verifier::new(config.clone())?),
            signer: Arc::new(Signer::new(config)),
            permits,
            timeout,
        })
    }

    /// Override the per-call timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sign one artifact
    ///
    /// On timeout the call returns [`SignError::ToolInvocationFailure`] only if the
    /// background work had not started writing; it then never writes, so the artifact
    /// keeps its previous signature state. Work that already started committing is
    /// awaited and its real result returned.
    pub async fn sign(
        &self,
        artifact: PathBuf,
        key: Arc<SigningKey>,
        passphrase: Arc<Passphrase>,
    ) -> Result<SignedArtifact, SignError> {
        let gate = Arc::new(CommitGate::new());
        let signer = Arc::clone(&self.signer);
        let worker_gate = Arc::clone(&gate);

        self.run(
            "sign",
            move || signer.sign_gated(&artifact, &key, &passphrase, &worker_gate),
            move || gate.abandon(),
        )
        .await?
    }

    /// Verify one artifact
    pub async fn verify(
        &self,
        artifact: PathBuf,
        trust_dir: Option<PathBuf>,
    ) -> Result<Verdict, SignError> {
        let verifier = Arc::clone(&self.verifier);
        self.run(
            "verify",
            move || verifier.verify_artifact(&artifact, trust_dir.as_deref()),
            || true,
        )
        .await
    }

    /// Verify many artifacts concurrently; results come back in input order
    pub async fn verify_all(
        &self,
        artifacts: Vec<PathBuf>,
        trust_dir: Option<PathBuf>,
    ) -> Vec<(PathBuf, Result<Verdict, SignError>)> {
        let handles: Vec<_> = artifacts
            .into_iter()
            .map(|artifact| {
                let service = self.clone();
                let trust_dir = trust_dir.clone();
                let path = artifact.clone();
                (
                    path,
                    tokio::spawn(async move { service.verify(artifact, trust_dir).await }),
                )
            })
            .collect();

        let mut results = Vec::with_capacity(handles.len());
        for (path, handle) in handles {
            let result = handle
                .await
                .unwrap_or_else(|e| Err(SignError::tool("verify", e)));
            results.push((path, result));
        }
        results
    }

    /// Run blocking work under a permit
    ///
    /// Waiting for the permit is not timed; only the work itself is. When the
    /// deadline passes, `abandon` decides whether the caller may stop waiting. If it
    /// returns `false` the work is awaited to completion.
    async fn run<T, F, A>(
        &self,
        operation: &'static str,
        work: F,
        abandon: A,
    ) -> Result<T, SignError>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
        A: FnOnce() -> bool,
    {
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|e| SignError::tool(operation, e))?;

        let mut handle = tokio::task::spawn_blocking(move || {
            // Held until the work finishes, even if the caller stopped waiting
            let _permit = permit;
            work()
        });

        let joined = match tokio::time::timeout(self.timeout, &mut handle).await {
            Ok(joined) => joined,
            Err(_) if abandon() => {
                warn!("{operation} timed out after {:?}", self.timeout);
                return Err(SignError::tool(
                    operation,
                    format!("timed out after {:?}", self.timeout),
                ));
            }
            Err(_) => {
                debug!("{operation} passed its deadline while committing; waiting");
                handle.await
            }
        };

        debug!("{operation} finished");
        joined.map_err(|e| SignError::tool(operation, e))
    }
}
