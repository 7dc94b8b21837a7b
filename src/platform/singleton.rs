//! Single-instance guard.
//!
//! Two instances would fight over the same endpoints and double-restore
//! state at exit, so a named global mutex gates startup.

use thiserror::Error;
use windows::core::PCWSTR;
use windows::Win32::Foundation::{CloseHandle, GetLastError, ERROR_ALREADY_EXISTS, HANDLE};
use windows::Win32::System::Threading::CreateMutexW;
use windows::Win32::UI::WindowsAndMessaging::{MessageBoxW, MB_ICONERROR, MB_OK};

const MUTEX_NAME: &str = "Global\\MicGateAppMutex";

/// Single-instance error types.
#[derive(Debug, Error)]
pub enum SingletonError {
    #[error("another instance of mic-gate is already running")]
    AlreadyRunning,

    #[error("failed to create instance mutex: {0}")]
    CreateFailed(String),
}

/// Holds the named mutex for the process lifetime.
pub struct InstanceGuard {
    handle: HANDLE,
}

impl InstanceGuard {
    /// Acquire the instance mutex, failing if another instance holds it.
    pub fn acquire() -> Result<Self, SingletonError> {
        let name: Vec<u16> = MUTEX_NAME.encode_utf16().chain(std::iter::once(0)).collect();
        unsafe {
            let handle = CreateMutexW(None, false, PCWSTR(name.as_ptr()))
                .map_err(|e| SingletonError::CreateFailed(e.to_string()))?;

            if GetLastError() == ERROR_ALREADY_EXISTS {
                let _ = CloseHandle(handle);
                return Err(SingletonError::AlreadyRunning);
            }

            Ok(Self { handle })
        }
    }
}

impl Drop for InstanceGuard {
    fn drop(&mut self) {
        unsafe {
            let _ = CloseHandle(self.handle);
        }
    }
}

/// Show a blocking error dialog; used for startup failures that happen
/// before the tray exists.
pub fn show_error(message: &str) {
    unsafe {
        let text: Vec<u16> = message.encode_utf16().chain(std::iter::once(0)).collect();
        let title: Vec<u16> = "Mic Gate".encode_utf16().chain(std::iter::once(0)).collect();
        MessageBoxW(
            None,
            PCWSTR(text.as_ptr()),
            PCWSTR(title.as_ptr()),
            MB_OK | MB_ICONERROR,
        );
    }
}
