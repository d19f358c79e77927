use std::time::Instant;

use tracing::{info, warn};

use echo_core::{Conditioning, EchoError, EchoResult, SynthesisRequest};
use flow_sampler::FlowSampler;

/// Seed for the warm-up pass. Its output is discarded.
const WARM_SEED: u64 = 0;

/// Trace the sampler once with a single step at the shortest length.
///
/// Runs every kernel of the fused path so backend compilation happens here
/// and not on the first user request. Any failure is reported as
/// `AccelerationUnavailable`; the caller may rebuild without fusion.
pub fn warm_sampler(sampler: &FlowSampler) -> EchoResult<()> {
    info!("Warming fused sampler path...");
    let started = Instant::now();

    let config = sampler.config();
    let cond = Conditioning::new(vec![0.0; config.cond_dim], 1, config.cond_dim)?;
    let request = SynthesisRequest::new("warm-up", WARM_SEED, 1, config.min_sequence_length);

    match sampler.sample(&cond, &request) {
        Ok(buffer) if buffer.is_finite() => {
            info!(
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Fused sampler warm-up complete"
            );
            Ok(())
        }
        Ok(_) => Err(EchoError::acceleration_unavailable(
            "fused sampler produced non-finite output during warm-up",
        )),
        Err(e) => {
            warn!("Fused sampler warm-up failed: {}", e);
            Err(EchoError::acceleration_unavailable(format!(
                "fused sampler warm-up failed: {e}"
            )))
        }
    }
}
