//! Low-level keyboard and mouse hooks.
//!
//! Each hook runs on its own thread: WH_KEYBOARD_LL / WH_MOUSE_LL deliver
//! events through the message loop of the installing thread, so the
//! thread installs the hook and then pumps messages until it is told to
//! quit. The hook procedure only forwards a compact `InputEvent` into a
//! channel; all matching happens on the dispatcher side.

use crate::dispatcher::{InputEvent, Phase};
use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use std::sync::Mutex;
use std::thread::{self, JoinHandle};
use thiserror::Error;
use tracing::{info, warn};
use windows::Win32::Foundation::{HINSTANCE, LPARAM, LRESULT, WPARAM};
use windows::Win32::System::LibraryLoader::GetModuleHandleW;
use windows::Win32::System::Threading::GetCurrentThreadId;
use windows::Win32::UI::WindowsAndMessaging::{
    CallNextHookEx, DispatchMessageW, GetMessageW, PostThreadMessageW, SetWindowsHookExW,
    TranslateMessage, UnhookWindowsHookEx, HOOKPROC, KBDLLHOOKSTRUCT, MSG, MSLLHOOKSTRUCT,
    WH_KEYBOARD_LL, WH_MOUSE_LL, WINDOWS_HOOK_ID, WM_KEYDOWN, WM_KEYUP, WM_LBUTTONUP,
    WM_MBUTTONUP, WM_QUIT, WM_RBUTTONUP, WM_SYSKEYDOWN, WM_SYSKEYUP, WM_XBUTTONUP,
};

/// Hook service error types.
#[derive(Debug, Error)]
pub enum HookError {
    #[error("failed to install {kind} hook: {detail}")]
    Install { kind: &'static str, detail: String },
}

// The hook procedures have no user-data pointer; each hook kind forwards
// through its own slot. One hook of each kind at a time.
static KEYBOARD_EVENTS: Mutex<Option<Sender<InputEvent>>> = Mutex::new(None);
static MOUSE_EVENTS: Mutex<Option<Sender<InputEvent>>> = Mutex::new(None);

/// A live hook registration; uninstall posts WM_QUIT to the pump thread
/// and joins it, which unhooks before exiting.
pub struct InputHook {
    kind: &'static str,
    thread_id: u32,
    pump: Option<JoinHandle<()>>,
}

impl InputHook {
    pub fn uninstall(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(pump) = self.pump.take() {
            unsafe {
                let _ = PostThreadMessageW(self.thread_id, WM_QUIT, WPARAM(0), LPARAM(0));
            }
            if pump.join().is_err() {
                warn!(kind = self.kind, "hook pump thread panicked");
            }
        }
    }
}

impl Drop for InputHook {
    fn drop(&mut self) {
        self.release();
    }
}

/// Install the global low-level keyboard hook.
pub fn install_keyboard_hook() -> Result<(InputHook, Receiver<InputEvent>), HookError> {
    install("keyboard", WH_KEYBOARD_LL, Some(keyboard_proc), &KEYBOARD_EVENTS)
}

/// Install the global low-level mouse hook.
pub fn install_mouse_hook() -> Result<(InputHook, Receiver<InputEvent>), HookError> {
    install("mouse", WH_MOUSE_LL, Some(mouse_proc), &MOUSE_EVENTS)
}

fn install(
    kind: &'static str,
    id: WINDOWS_HOOK_ID,
    hook_proc: HOOKPROC,
    slot: &'static Mutex<Option<Sender<InputEvent>>>,
) -> Result<(InputHook, Receiver<InputEvent>), HookError> {
    let (event_tx, event_rx) = unbounded();
    *slot.lock().expect("hook slot poisoned") = Some(event_tx);

    // The pump thread reports the install outcome (and its thread id, for
    // the eventual WM_QUIT) before entering its message loop.
    let (ready_tx, ready_rx) = bounded(1);
    let pump = thread::spawn(move || pump_hook(kind, id, hook_proc, slot, ready_tx));

    match ready_rx.recv() {
        Ok(Ok(thread_id)) => {
            info!(kind, "input hook installed");
            Ok((
                InputHook {
                    kind,
                    thread_id,
                    pump: Some(pump),
                },
                event_rx,
            ))
        }
        Ok(Err(err)) => {
            let _ = pump.join();
            Err(err)
        }
        Err(_) => {
            let _ = pump.join();
            Err(HookError::Install {
                kind,
                detail: "hook thread exited before reporting".into(),
            })
        }
    }
}

fn pump_hook(
    kind: &'static str,
    id: WINDOWS_HOOK_ID,
    hook_proc: HOOKPROC,
    slot: &'static Mutex<Option<Sender<InputEvent>>>,
    ready: Sender<Result<u32, HookError>>,
) {
    unsafe {
        let module = match GetModuleHandleW(None) {
            Ok(module) => module,
            Err(e) => {
                *slot.lock().expect("hook slot poisoned") = None;
                let _ = ready.send(Err(HookError::Install {
                    kind,
                    detail: e.to_string(),
                }));
                return;
            }
        };

        let hook = match SetWindowsHookExW(id, hook_proc, HINSTANCE::from(module), 0) {
            Ok(hook) => hook,
            Err(e) => {
                *slot.lock().expect("hook slot poisoned") = None;
                let _ = ready.send(Err(HookError::Install {
                    kind,
                    detail: e.to_string(),
                }));
                return;
            }
        };

        let _ = ready.send(Ok(GetCurrentThreadId()));

        let mut msg = MSG::default();
        while GetMessageW(&mut msg, None, 0, 0).into() {
            let _ = TranslateMessage(&msg);
            DispatchMessageW(&msg);
        }

        if let Err(e) = UnhookWindowsHookEx(hook) {
            warn!(kind, error = %e, "failed to unhook");
        }
        *slot.lock().expect("hook slot poisoned") = None;
        info!(kind, "input hook released");
    }
}

fn forward(slot: &Mutex<Option<Sender<InputEvent>>>, event: InputEvent) {
    if let Some(tx) = slot.lock().expect("hook slot poisoned").as_ref() {
        let _ = tx.send(event);
    }
}

unsafe extern "system" fn keyboard_proc(code: i32, wparam: WPARAM, lparam: LPARAM) -> LRESULT {
    if code >= 0 {
        let info = &*(lparam.0 as *const KBDLLHOOKSTRUCT);
        let phase = match wparam.0 as u32 {
            WM_KEYDOWN | WM_SYSKEYDOWN => Some(Phase::Down),
            WM_KEYUP | WM_SYSKEYUP => Some(Phase::Up),
            _ => None,
        };
        if let Some(phase) = phase {
            forward(
                &KEYBOARD_EVENTS,
                InputEvent {
                    code: info.vkCode,
                    data: 0,
                    phase,
                },
            );
        }
    }
    CallNextHookEx(None, code, wparam, lparam)
}

unsafe extern "system" fn mouse_proc(code: i32, wparam: WPARAM, lparam: LPARAM) -> LRESULT {
    if code >= 0 {
        let info = &*(lparam.0 as *const MSLLHOOKSTRUCT);
        let message = wparam.0 as u32;
        forward(
            &MOUSE_EVENTS,
            InputEvent {
                code: message,
                data: info.mouseData,
                phase: mouse_phase(message),
            },
        );
    }
    CallNextHookEx(None, code, wparam, lparam)
}

fn mouse_phase(message: u32) -> Phase {
    match message {
        WM_LBUTTONUP | WM_RBUTTONUP | WM_MBUTTONUP | WM_XBUTTONUP => Phase::Up,
        _ => Phase::Down,
    }
}
