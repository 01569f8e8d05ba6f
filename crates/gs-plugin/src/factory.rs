//! Renderer and device construction per variant

use gs_core::error::{DeviceError, GsError};
use gs_core::GsConfig;
use gs_renderer::backend::{Device, Dx11Device, NullDevice, OglDevice, SoftwareDevice};
use gs_renderer::renderer::{HardwareRenderer, NullRenderer, Renderer, RendererType, SoftwareRenderer};
use gs_renderer::HostRenderContext;
use std::sync::Arc;

/// Construct the (not yet created) device a variant presents through
pub fn make_device(kind: RendererType, host: &Arc<dyn HostRenderContext>) -> Result<Box<dyn Device>, DeviceError> {
    let device: Box<dyn Device> = match kind {
        RendererType::SoftwareGl => Box::new(SoftwareDevice::new(host.clone())),
        RendererType::HardwareGl => Box::new(OglDevice::new(host.clone())),
        RendererType::HardwareDx11 => Box::new(Dx11Device::new(host.clone())),
        RendererType::Null => Box::new(NullDevice::new()),
        RendererType::Undefined => {
            return Err(DeviceError::Unsupported("no renderer selected".into()));
        }
    };
    Ok(device)
}

/// Construct a renderer. `threads` only applies to the software variant;
/// -1 reads `extrathreads` from `config`.
pub fn make_renderer(kind: RendererType, config: &GsConfig, threads: i32) -> Result<Box<dyn Renderer>, GsError> {
    let renderer: Box<dyn Renderer> = match kind {
        RendererType::SoftwareGl => Box::new(SoftwareRenderer::new(config, threads)?),
        RendererType::HardwareGl | RendererType::HardwareDx11 => Box::new(HardwareRenderer::new(kind, config)?),
        RendererType::Null => Box::new(NullRenderer::new(config)?),
        RendererType::Undefined => {
            return Err(GsError::RendererCreation("no renderer selected".into()));
        }
    };
    Ok(renderer)
}
