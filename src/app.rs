//! Application wiring and lifecycle.
//!
//! Startup order matters here: baseline snapshot before the default
//! device is gated, hooks only after the controller is ready, and at
//! shutdown the producers exit before the serializer closes so nothing
//! submits into a void. The main thread doubles as the serializer's
//! execution context; COM and every endpoint handle stay on it.

use crate::audio::EndpointController;
use crate::binding::Trigger;
use crate::config::RunConfig;
use crate::discovery::{run_discovery, BindSink, FileBindSink, InputSource};
use crate::dispatcher::EventDispatcher;
use crate::platform::{self, ComGuard, WasapiDirectory};
use crate::serializer;
use crate::shutdown::ShutdownSignal;
use crate::ui::tray::TrayController;
use crate::ui::{StatusSink, StatusSinkRef};
use anyhow::{bail, Context, Result};
use std::sync::Arc;
use std::thread;
use tracing::{error, info};

pub fn run(config: RunConfig) -> Result<()> {
    let _instance = match platform::InstanceGuard::acquire() {
        Ok(guard) => guard,
        Err(err) => {
            platform::singleton::show_error(&err.to_string());
            bail!(err);
        }
    };

    let shutdown = ShutdownSignal::new();
    {
        let shutdown = shutdown.clone();
        ctrlc::set_handler(move || {
            info!("received shutdown signal");
            shutdown.signal();
        })
        .context("failed to install interrupt handler")?;
    }

    let (tray, tray_handle) = TrayController::spawn(&shutdown);
    let status: StatusSinkRef = Arc::new(tray_handle);

    let outcome = if config.discovery {
        run_discovery_mode(&config, status, &shutdown)
    } else {
        run_gate(&config, status, &shutdown)
    };

    // Whatever happened, release the tray thread.
    shutdown.signal();
    tray.join();
    outcome
}

/// Log raw input codes to the bind log instead of driving the gate.
fn run_discovery_mode(
    config: &RunConfig,
    status: StatusSinkRef,
    shutdown: &ShutdownSignal,
) -> Result<()> {
    info!("bind discovery mode active");
    status.add_info_line("Bind Mode");

    let sink: Arc<dyn BindSink> = Arc::new(FileBindSink::open(&config.bind_log).with_context(
        || format!("failed to open bind log {}", config.bind_log.display()),
    )?);

    let mut listeners = Vec::new();

    match platform::install_keyboard_hook() {
        Ok((hook, events)) => {
            let sink = sink.clone();
            let shutdown = shutdown.clone();
            listeners.push(thread::spawn(move || {
                run_discovery(InputSource::Keyboard, events, sink.as_ref(), &shutdown);
                hook.uninstall();
            }));
        }
        Err(err) => error!(error = %err, "keyboard hook install failed"),
    }

    match platform::install_mouse_hook() {
        Ok((hook, events)) => {
            let shutdown = shutdown.clone();
            listeners.push(thread::spawn(move || {
                run_discovery(InputSource::Mouse, events, sink.as_ref(), &shutdown);
                hook.uninstall();
            }));
        }
        Err(err) => error!(error = %err, "mouse hook install failed"),
    }

    if listeners.is_empty() {
        bail!("no input hook could be installed");
    }

    shutdown.wait();
    for listener in listeners {
        let _ = listener.join();
    }
    Ok(())
}

/// Normal operation: gate the default device and drive it from the
/// configured bindings.
fn run_gate(config: &RunConfig, status: StatusSinkRef, shutdown: &ShutdownSignal) -> Result<()> {
    let _com = ComGuard::new()?;
    let directory = WasapiDirectory::new()?;

    let mut controller = EndpointController::new(Box::new(directory), status.clone(), config.mode);

    // A missing or failing capture device is fatal to the audio side but
    // not to the process: the tray stays up so the user can see the
    // errors, and every activation retries the default-device lookup.
    if let Err(err) = controller.snapshot_baseline() {
        error!(error = %err, "could not snapshot capture devices");
        status.add_info_line("Error: could not list capture devices");
    }
    if let Err(err) = controller.prepare_startup() {
        error!(error = %err, "could not gate the default capture device");
        status.add_info_line("Error: could not gate the microphone");
    }

    advertise_config(config, status.as_ref());

    let (commands, runner) = serializer::channel();
    let mut dispatchers = Vec::new();

    if let Some(binding) = config.keyboard.clone() {
        match platform::install_keyboard_hook() {
            Ok((hook, events)) => {
                info!("keyboard mode active");
                let dispatcher = EventDispatcher::new(binding, commands.clone(), shutdown);
                dispatchers.push(thread::spawn(move || {
                    dispatcher.run(events);
                    hook.uninstall();
                }));
            }
            Err(err) => error!(error = %err, "keyboard hook install failed"),
        }
    }

    if let Some(binding) = config.mouse.clone() {
        match platform::install_mouse_hook() {
            Ok((hook, events)) => {
                info!("mouse mode active");
                let dispatcher = EventDispatcher::new(binding, commands.clone(), shutdown);
                dispatchers.push(thread::spawn(move || {
                    dispatcher.run(events);
                    hook.uninstall();
                }));
            }
            Err(err) => error!(error = %err, "mouse hook install failed"),
        }
    }

    // Close the queue only after every producer has exited; detached
    // hold timers that outlive them get SerializerClosed and drop their
    // work.
    let supervisor = {
        let commands = commands.clone();
        let shutdown = shutdown.clone();
        thread::spawn(move || {
            shutdown.wait();
            for dispatcher in dispatchers {
                let _ = dispatcher.join();
            }
            commands.close();
        })
    };

    // The main thread is the serializer's execution context; it gets the
    // controller back once the queue closes and restores state from the
    // same thread that owns the COM apartment.
    let mut controller = runner.run(controller);
    controller.restore_on_shutdown();

    let _ = supervisor.join();
    Ok(())
}

fn advertise_config(config: &RunConfig, status: &dyn StatusSink) {
    if let Some(binding) = &config.keyboard {
        if let Trigger::Key { code } = binding.trigger {
            status.add_info_line(&format!("Hooked Key: {code}"));
        }
    }
    if let Some(binding) = &config.mouse {
        if let Trigger::MouseButton { down, up } = binding.trigger {
            status.add_info_line(&format!("MouseDown: {down}"));
            status.add_info_line(&format!("MouseUp: {up}"));
        }
        if let Some(data) = binding.data_filter {
            status.add_info_line(&format!("MouseData: {data}"));
        }
    }
    status.add_info_line(&format!("Hold Time: {}ms", config.hold_time.as_millis()));
}
