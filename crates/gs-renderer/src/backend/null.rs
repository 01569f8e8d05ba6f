//! Null device for headless and validation runs

use super::{Device, DeviceKind, DeviceStats, Frame, DEFAULT_TARGET};
use gs_core::error::DeviceError;

/// Device whose operations all succeed without doing anything
pub struct NullDevice {
    size: (u32, u32),
    created: bool,
    stats: DeviceStats,
}

impl NullDevice {
    pub fn new() -> Self {
        Self {
            size: DEFAULT_TARGET,
            created: false,
            stats: DeviceStats::default(),
        }
    }
}

impl Default for NullDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl Device for NullDevice {
    fn kind(&self) -> DeviceKind {
        DeviceKind::Null
    }

    fn create(&mut self, width: u32, height: u32) -> Result<(), DeviceError> {
        self.size = (width, height);
        self.created = true;
        self.stats.creates += 1;
        Ok(())
    }

    fn reset(&mut self) -> Result<(), DeviceError> {
        self.stats.resets += 1;
        Ok(())
    }

    fn resize_target(&mut self, width: u32, height: u32) -> Result<(), DeviceError> {
        self.size = (width, height);
        Ok(())
    }

    fn present(&mut self, _frame: &Frame) -> Result<(), DeviceError> {
        self.stats.presents += 1;
        Ok(())
    }

    fn target_size(&self) -> (u32, u32) {
        self.size
    }

    fn stats(&self) -> DeviceStats {
        self.stats
    }

    fn is_created(&self) -> bool {
        self.created
    }
}
