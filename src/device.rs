//! Target device description.
//!
//! Generated kernels are never launched here; the device is only asked
//! which element types it can handle. Detection goes through wgpu so it
//! works on Metal, Vulkan and DX12 hosts alike.

use crate::symbolic::ScalarType;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeviceInfo {
    pub name: String,
    pub supports_double: bool,
}

impl DeviceInfo {
    /// A device description for machines without a usable adapter.
    pub fn offline(supports_double: bool) -> Self {
        Self {
            name: "offline".to_string(),
            supports_double,
        }
    }

    /// Query the preferred GPU adapter. Returns None if there is none.
    pub fn probe() -> Option<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        }))?;
        let info = adapter.get_info();
        let supports_double = adapter.features().contains(wgpu::Features::SHADER_F64);
        tracing::debug!(
            name = info.name.as_str(),
            backend = ?info.backend,
            supports_double,
            "probed adapter"
        );
        Some(Self {
            name: info.name,
            supports_double,
        })
    }

    /// Probe, or fall back to an offline device without double support.
    pub fn probe_or_offline() -> Self {
        Self::probe().unwrap_or_else(|| {
            tracing::warn!("no GPU adapter found, assuming single precision only");
            Self::offline(false)
        })
    }

    pub fn supports(&self, scalar: ScalarType) -> bool {
        !scalar.needs_double() || self.supports_double
    }
}

impl Default for DeviceInfo {
    fn default() -> Self {
        Self::offline(true)
    }
}
