//! Enumeration and hot-plug commands

use std::sync::atomic::Ordering;
use std::time::Duration;

use anyhow::Context;
use hidlink_session::HidPollWatcher;
use tracing::debug;

use super::{setup_interrupt_handler, CommandResult, Runtime};

/// List attached HID interfaces
pub fn list(runtime: &Runtime, vid: Option<&str>) -> CommandResult {
    let vid = vid
        .map(|v| u16::from_str_radix(v.trim_start_matches("0x"), 16))
        .transpose()
        .context("Invalid vendor ID")?;

    let devices = runtime.backend.enumerate()?;
    println!("HID devices:");
    let mut shown = 0;
    for device in devices
        .iter()
        .filter(|d| vid.map_or(true, |vid| d.vendor_id == vid))
    {
        println!(
            "  VID={:04x} PID={:04x} usage={:04x} page={:04x} if={} {}",
            device.vendor_id,
            device.product_id,
            device.usage,
            device.usage_page,
            device.interface_number,
            device.product.as_deref().unwrap_or("-"),
        );
        println!("    path={}", device.path);
        shown += 1;
    }
    if shown == 0 {
        println!("  (none)");
    }
    Ok(())
}

/// Print arrivals and removals until Ctrl+C
pub fn watch(runtime: &Runtime) -> CommandResult {
    let monitor = runtime
        .manager
        .spawn_monitor()
        .context("Failed to start disconnect monitor")?;
    monitor.set_arrival_callback(|path| println!("+ {path}"));
    monitor.set_removal_callback(|path| println!("- {path}"));

    let _watcher = HidPollWatcher::spawn(
        runtime.backend.clone(),
        monitor.feed(),
        &runtime.config.watcher,
    )?;

    let running = setup_interrupt_handler();
    println!("Watching for HID devices (Ctrl+C to stop)...");
    while running.load(Ordering::SeqCst) {
        std::thread::sleep(Duration::from_millis(100));
    }
    debug!("Watch interrupted");
    Ok(())
}
