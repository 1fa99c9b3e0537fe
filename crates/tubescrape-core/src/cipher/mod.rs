//! Signature deciphering
//!
//! Ciphered formats carry a scrambled signature that only becomes valid
//! after the player script's transform is applied. The transform is
//! recovered structurally from the script ([`discover`]), kept per script
//! in a [`ProgramCache`], and applied locally ([`TransformProgram`]).

pub mod cache;
pub mod discover;
pub mod program;

use std::sync::Arc;

use tracing::{debug, info};

use crate::client::{PageFetcher, RetryPolicy, fetch_with_retry};
use crate::error::{Result, TubeError};
use crate::types::{CipherPayload, PlayerScriptRef};

pub use cache::ProgramCache;
pub use discover::discover_program;
pub use program::{TransformOp, TransformProgram};

/// Turns cipher payloads into signed stream URLs
#[derive(Clone)]
pub struct CipherResolver {
    fetcher: Arc<dyn PageFetcher>,
    cache: ProgramCache,
    retry: RetryPolicy,
}

impl CipherResolver {
    pub fn new(fetcher: Arc<dyn PageFetcher>, cache: ProgramCache, retry: RetryPolicy) -> Self {
        Self {
            fetcher,
            cache,
            retry,
        }
    }

    pub fn cache(&self) -> &ProgramCache {
        &self.cache
    }

    /// Transform program of `script`, fetching and deriving it on first use
    ///
    /// Concurrent calls for the same script share a single fetch.
    ///
    /// # Errors
    /// Fetch errors, or `UnrecognizedCipherScheme` if the script cannot be
    /// analysed. Neither is cached.
    pub async fn program_for(&self, script: &PlayerScriptRef) -> Result<Arc<TransformProgram>> {
        if let Some(program) = self.cache.get(script) {
            debug!(script = %script, "transform program cache hit");
            return Ok(program);
        }

        self.cache
            .get_or_try_derive(script, || async {
                let url = script.url();
                info!(script = %script, "fetching player script");
                let text = fetch_with_retry(self.fetcher.as_ref(), &url, self.retry).await?;
                let program = discover_program(&text)?;
                info!(script = %script, program = %program, "derived transform program");
                Ok(program)
            })
            .await
    }

    /// Deciphers `payload` and returns its playable URL
    ///
    /// # Errors
    /// See [`CipherResolver::program_for`]; `InvalidUrl` if the payload's
    /// base URL does not parse.
    pub async fn resolve(&self, payload: &CipherPayload) -> Result<String> {
        let program = self.program_for(&payload.player_script).await?;
        signed_url(&program, payload)
    }
}

impl std::fmt::Debug for CipherResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CipherResolver")
            .field("cache", &self.cache)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

/// Applies `program` to the payload's signature and appends it to the base URL
///
/// # Errors
/// Returns `InvalidUrl` if the base URL does not parse
pub fn signed_url(program: &TransformProgram, payload: &CipherPayload) -> Result<String> {
    let signature = program.apply(&payload.signature);
    let mut url = url::Url::parse(&payload.base_url)
        .map_err(|e| TubeError::InvalidUrl(format!("{}: {}", payload.base_url, e)))?;
    url.query_pairs_mut()
        .append_pair(&payload.signature_param, &signature);
    Ok(url.into())
}
