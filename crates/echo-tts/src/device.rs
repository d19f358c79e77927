//! Device selection and precision policy.
//!
//! `Accelerator` resolves to Metal, then CUDA, depending on which cargo
//! features are enabled. There is no silent CPU fallback: asking for an
//! accelerator that is not there is an error.

use candle_core::{DType, Device, Tensor};
use tracing::{debug, info, warn};

use echo_core::{DeviceKind, EchoError, EchoResult, Precision};
use flow_sampler::compute_dtype;

/// What the resolved device can compute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceCapabilities {
    pub kind: DeviceKind,
    /// IEEE f16 matmul works.
    pub supports_half: bool,
    /// bf16 matmul works.
    pub supports_reduced_half: bool,
}

impl DeviceCapabilities {
    /// Capabilities of a plain CPU device.
    pub fn cpu() -> Self {
        Self {
            kind: DeviceKind::Cpu,
            supports_half: false,
            supports_reduced_half: false,
        }
    }
}

/// Pick the working precision for a device.
///
/// CPU always gets `Full`. An accelerator gets the narrowest type it
/// supports, preferring `ReducedHalf` over `Half`.
pub fn resolve_precision(caps: &DeviceCapabilities) -> Precision {
    match caps.kind {
        DeviceKind::Cpu => Precision::Full,
        DeviceKind::Accelerator if caps.supports_reduced_half => Precision::ReducedHalf,
        DeviceKind::Accelerator if caps.supports_half => Precision::Half,
        DeviceKind::Accelerator => Precision::Full,
    }
}

/// Open the compute device for `kind`.
pub fn select_device(kind: DeviceKind) -> EchoResult<Device> {
    match kind {
        DeviceKind::Cpu => {
            info!("Using CPU device");
            Ok(Device::Cpu)
        }
        DeviceKind::Accelerator => select_accelerator(),
    }
}

fn select_accelerator() -> EchoResult<Device> {
    #[cfg(feature = "metal")]
    {
        match Device::new_metal(0) {
            Ok(device) => {
                info!("Using Metal GPU");
                return Ok(device);
            }
            Err(e) => warn!("Metal GPU not available: {}", e),
        }
    }

    #[cfg(feature = "cuda")]
    {
        match Device::new_cuda(0) {
            Ok(device) => {
                info!("Using CUDA GPU");
                return Ok(device);
            }
            Err(e) => warn!("CUDA GPU not available: {}", e),
        }
    }

    if cfg!(any(feature = "cuda", feature = "metal")) {
        Err(EchoError::device_unavailable(
            "no accelerator device could be opened",
        ))
    } else {
        Err(EchoError::device_unavailable(
            "accelerator requested but neither the 'cuda' nor the 'metal' feature is enabled",
        ))
    }
}

/// Run a tiny matmul in `dtype` to see whether the backend supports it.
fn matmul_supported(device: &Device, dtype: DType) -> bool {
    let result = Tensor::ones((4, 4), dtype, device)
        .and_then(|a| a.matmul(&a))
        .and_then(|c| c.to_dtype(DType::F32))
        .and_then(|c| c.sum_all())
        .and_then(|s| s.to_scalar::<f32>());

    match result {
        Ok(v) => v.is_finite(),
        Err(e) => {
            debug!(?dtype, error = %e, "dtype check failed");
            false
        }
    }
}

/// Detect what an opened device supports. Allocates only a few bytes.
pub fn detect_capabilities(device: &Device) -> DeviceCapabilities {
    let kind = if device.is_cpu() {
        DeviceKind::Cpu
    } else {
        DeviceKind::Accelerator
    };
    let caps = DeviceCapabilities {
        kind,
        supports_half: matmul_supported(device, DType::F16),
        supports_reduced_half: matmul_supported(device, DType::BF16),
    };
    debug!(?caps, "detected device capabilities");
    caps
}

/// Whether the sampler can run at `precision` on `device`.
pub fn supports_precision(device: &Device, precision: Precision) -> bool {
    match precision {
        Precision::Full => true,
        other => matmul_supported(device, compute_dtype(other)),
    }
}

/// Fail unless `precision` can be computed on `device`.
pub fn check_precision(device: &Device, precision: Precision) -> EchoResult<()> {
    if supports_precision(device, precision) {
        Ok(())
    } else {
        Err(EchoError::unsupported_precision(
            precision,
            device_name(device),
        ))
    }
}

/// Device name for logging.
pub fn device_name(device: &Device) -> &'static str {
    match device {
        Device::Cpu => "CPU",
        Device::Cuda(_) => "CUDA GPU",
        Device::Metal(_) => "Metal GPU",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn accel(half: bool, reduced: bool) -> DeviceCapabilities {
        DeviceCapabilities {
            kind: DeviceKind::Accelerator,
            supports_half: half,
            supports_reduced_half: reduced,
        }
    }

    #[test]
    fn test_cpu_is_full_precision() {
        assert_eq!(resolve_precision(&DeviceCapabilities::cpu()), Precision::Full);

        // Flags are ignored on CPU.
        let caps = DeviceCapabilities {
            kind: DeviceKind::Cpu,
            supports_half: true,
            supports_reduced_half: true,
        };
        assert_eq!(resolve_precision(&caps), Precision::Full);
    }

    #[test]
    fn test_accelerator_precision_order() {
        assert_eq!(resolve_precision(&accel(true, true)), Precision::ReducedHalf);
        assert_eq!(resolve_precision(&accel(false, true)), Precision::ReducedHalf);
        assert_eq!(resolve_precision(&accel(true, false)), Precision::Half);
        assert_eq!(resolve_precision(&accel(false, false)), Precision::Full);
    }

    #[test]
    fn test_select_cpu() {
        let device = select_device(DeviceKind::Cpu).unwrap();
        assert!(matches!(device, Device::Cpu));
        assert_eq!(device_name(&device), "CPU");
        assert_eq!(detect_capabilities(&device).kind, DeviceKind::Cpu);
    }

    #[test]
    fn test_cpu_precision_support() {
        let device = Device::Cpu;
        assert!(supports_precision(&device, Precision::Full));
        assert!(supports_precision(&device, Precision::Half));
        assert!(!supports_precision(&device, Precision::ReducedHalf));

        let err = check_precision(&device, Precision::ReducedHalf).unwrap_err();
        assert!(matches!(
            err,
            EchoError::UnsupportedPrecision {
                precision: Precision::ReducedHalf,
                ..
            }
        ));
    }

    #[cfg(not(any(feature = "cuda", feature = "metal")))]
    #[test]
    fn test_accelerator_without_features() {
        let err = select_device(DeviceKind::Accelerator).unwrap_err();
        assert!(matches!(err, EchoError::DeviceUnavailable(_)));
    }

    #[test]
    fn test_f32_matmul_on_cpu() {
        assert!(matmul_supported(&Device::Cpu, DType::F32));
    }
}
