//! System tray icon thread.
//!
//! The tray icon lives on its own thread with a Win32 message pump; the
//! serializer thread reaches it only through the channel-backed
//! [`TrayHandle`], which implements [`StatusSink`]. The Quit menu item
//! trips the shared shutdown signal.

use super::{icons, StatusSink};
use crate::shutdown::ShutdownSignal;
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};
use tray_icon::{
    menu::{Menu, MenuEvent, MenuId, MenuItem, PredefinedMenuItem},
    Icon, TrayIcon, TrayIconBuilder,
};
use windows::Win32::UI::WindowsAndMessaging::{
    DispatchMessageW, PeekMessageW, TranslateMessage, MSG, PM_REMOVE,
};

/// Tray service error types.
#[derive(Debug, Error)]
pub enum TrayError {
    #[error("failed to create tray icon: {0}")]
    CreateFailed(String),

    #[error("failed to build tray menu: {0}")]
    MenuFailed(String),

    #[error("failed to generate icon: {0}")]
    IconFailed(String),
}

enum TrayUpdate {
    Icon { muted: bool },
    Title(String),
    Info(String),
}

/// Channel-backed status sink; safe to call from any thread.
#[derive(Clone)]
pub struct TrayHandle {
    updates: Sender<TrayUpdate>,
}

impl StatusSink for TrayHandle {
    fn set_status_icon(&self, muted: bool) {
        let _ = self.updates.send(TrayUpdate::Icon { muted });
    }

    fn set_display_title(&self, title: &str) {
        let _ = self.updates.send(TrayUpdate::Title(title.to_string()));
    }

    fn add_info_line(&self, line: &str) {
        let _ = self.updates.send(TrayUpdate::Info(line.to_string()));
    }
}

/// Owns the tray thread.
pub struct TrayController {
    thread: JoinHandle<()>,
}

impl TrayController {
    /// Spawn the tray thread. A tray that fails to come up degrades to a
    /// warning; the gate keeps working without it.
    pub fn spawn(shutdown: &ShutdownSignal) -> (Self, TrayHandle) {
        let (tx, rx) = unbounded();
        let shutdown = shutdown.clone();
        let thread = thread::spawn(move || run_tray(rx, shutdown));
        (Self { thread }, TrayHandle { updates: tx })
    }

    pub fn join(self) {
        if self.thread.join().is_err() {
            warn!("tray thread panicked");
        }
    }
}

struct Tray {
    icon: TrayIcon,
    menu: Menu,
    device_item: MenuItem,
    quit_id: MenuId,
    open_icon: Icon,
    gated_icon: Icon,
    info_count: usize,
}

fn run_tray(updates: Receiver<TrayUpdate>, shutdown: ShutdownSignal) {
    let mut tray = match build_tray() {
        Ok(tray) => tray,
        Err(err) => {
            warn!(error = %err, "tray unavailable, continuing without it");
            // Keep draining updates and exit with everyone else.
            while !shutdown.is_signalled() {
                while updates.try_recv().is_ok() {}
                thread::sleep(Duration::from_millis(50));
            }
            return;
        }
    };

    info!("tray icon running");

    while !shutdown.is_signalled() {
        pump_pending_messages();

        while let Ok(update) = updates.try_recv() {
            apply_update(&mut tray, update);
        }

        while let Ok(event) = MenuEvent::receiver().try_recv() {
            if event.id() == &tray.quit_id {
                info!("quit requested from tray");
                shutdown.signal();
            }
        }

        thread::sleep(Duration::from_millis(50));
    }
}

fn build_tray() -> Result<Tray, TrayError> {
    let open_icon = icons::open_icon().map_err(TrayError::IconFailed)?;
    let gated_icon = icons::gated_icon().map_err(TrayError::IconFailed)?;

    let menu = Menu::new();

    // Shows the engaged input device once one is known.
    let device_item = MenuItem::new("No device engaged", false, None);
    menu.append(&device_item)
        .map_err(|e| TrayError::MenuFailed(e.to_string()))?;

    menu.append(&PredefinedMenuItem::separator())
        .map_err(|e| TrayError::MenuFailed(e.to_string()))?;

    let quit_item = MenuItem::new("Quit", true, None);
    let quit_id = quit_item.id().clone();
    menu.append(&quit_item)
        .map_err(|e| TrayError::MenuFailed(e.to_string()))?;

    // The gate starts closed.
    let icon = TrayIconBuilder::new()
        .with_icon(gated_icon.clone())
        .with_tooltip("Mic Gate")
        .with_menu(Box::new(menu.clone()))
        .build()
        .map_err(|e| TrayError::CreateFailed(e.to_string()))?;

    Ok(Tray {
        icon,
        menu,
        device_item,
        quit_id,
        open_icon,
        gated_icon,
        info_count: 0,
    })
}

fn apply_update(tray: &mut Tray, update: TrayUpdate) {
    match update {
        TrayUpdate::Icon { muted } => {
            let icon = if muted {
                tray.gated_icon.clone()
            } else {
                tray.open_icon.clone()
            };
            if tray.icon.set_icon(Some(icon)).is_err() {
                warn!("failed to update tray icon");
            }
        }
        TrayUpdate::Title(title) => {
            tray.device_item.set_text(title.clone());
            let _ = tray.icon.set_tooltip(Some(format!("Mic Gate: {title}")));
        }
        TrayUpdate::Info(line) => {
            // Info lines sit between the device item and the separator.
            let item = MenuItem::new(line, false, None);
            let position = 1 + tray.info_count;
            if tray.menu.insert(&item, position).is_ok() {
                tray.info_count += 1;
            }
        }
    }
}

fn pump_pending_messages() {
    unsafe {
        let mut msg = MSG::default();
        while PeekMessageW(&mut msg, None, 0, 0, PM_REMOVE).as_bool() {
            let _ = TranslateMessage(&msg);
            DispatchMessageW(&msg);
        }
    }
}
