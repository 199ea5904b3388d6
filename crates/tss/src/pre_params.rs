//! Deadline-bounded generation of key generation pre-parameters.
//!
//! Safe-prime generation for the Paillier and Ñ moduli takes from seconds to
//! minutes, so members usually generate pre-parameters ahead of time and
//! pass them to [`crate::KeyGenerator::generate`].

use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::error::{BoxError, TssError, TssResult};
use crate::key::LocalPreParams;

/// Run `generator` on a blocking worker, giving up after `timeout`.
///
/// A generator that overruns keeps its worker thread until it returns; only
/// its result is discarded.
pub async fn generate_pre_params<F>(generator: F, timeout: Duration) -> TssResult<LocalPreParams>
where
    F: FnOnce() -> Result<LocalPreParams, BoxError> + Send + 'static,
{
    info!("Generating pre-parameters (timeout {:?})", timeout);
    let started = Instant::now();

    let task = tokio::task::spawn_blocking(generator);
    match tokio::time::timeout(timeout, task).await {
        Ok(Ok(Ok(pre_params))) => {
            info!("Pre-parameters generated in {:?}", started.elapsed());
            Ok(pre_params)
        }
        Ok(Ok(Err(source))) => Err(TssError::ProtocolFailure { source }),
        Ok(Err(join_error)) => Err(TssError::protocol_failure(join_error)),
        Err(_) => {
            warn!("Pre-parameters generation timed out after {:?}", timeout);
            Err(TssError::PreParamsTimeout(timeout))
        }
    }
}
