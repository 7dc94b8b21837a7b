//! COM initialization guard.

use crate::audio::AudioError;
use windows::Win32::System::Com::{CoInitializeEx, CoUninitialize, COINIT_MULTITHREADED};

/// COM initialization guard that uninitializes COM on drop.
///
/// The serializer thread holds one for the lifetime of the run; the audio
/// endpoint handles it creates are bound to that apartment, which is why
/// all mutations are funneled onto that thread.
pub struct ComGuard(());

impl ComGuard {
    /// Initialize COM for the current thread.
    ///
    /// Multithreaded apartment: the owning thread blocks on a channel
    /// rather than pumping messages, so an STA would deadlock callbacks.
    pub fn new() -> Result<Self, AudioError> {
        unsafe {
            CoInitializeEx(None, COINIT_MULTITHREADED)
                .ok()
                .map_err(|e| AudioError::ComInit(e.to_string()))?;
        }
        Ok(Self(()))
    }
}

impl Drop for ComGuard {
    fn drop(&mut self) {
        unsafe {
            CoUninitialize();
        }
    }
}
