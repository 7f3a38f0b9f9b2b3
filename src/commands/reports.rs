//! Session commands: reading, streaming and sending reports

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use hidlink_session::{HidPollWatcher, ReadTimeout, ReportKind};
use tracing::{info, warn};

use super::{format_hex, parse_hex_bytes, setup_interrupt_handler, CommandResult, Runtime};

/// Read `count` reports from the queue
pub fn read(runtime: &Runtime, path: &str, count: usize, timeout_ms: i32) -> CommandResult {
    let session = runtime
        .manager
        .open(path)
        .with_context(|| format!("Failed to open {path}"))?;
    let timeout = ReadTimeout::from_millis(timeout_ms);
    let mut buf = vec![0u8; session.max_input_report_length()];

    for _ in 0..count {
        let n = session.read_timeout(&mut buf, timeout)?;
        if n == 0 {
            println!("(no report)");
        } else {
            println!("{}", format_hex(&buf[..n]));
        }
    }
    session.close();
    Ok(())
}

/// Stream reports through the read callback until Ctrl+C or unplug
pub fn listen(runtime: &Runtime, path: &str) -> CommandResult {
    let monitor = runtime
        .manager
        .spawn_monitor()
        .context("Failed to start disconnect monitor")?;
    let _watcher = HidPollWatcher::spawn(
        runtime.backend.clone(),
        monitor.feed(),
        &runtime.config.watcher,
    )?;

    let session = runtime
        .manager
        .open(path)
        .with_context(|| format!("Failed to open {path}"))?;

    let start = Instant::now();
    session.register_read_callback(move |data| {
        println!(
            "[{:>10.3}] {}",
            start.elapsed().as_secs_f64(),
            format_hex(data)
        );
    });

    let unplugged = Arc::new(AtomicBool::new(false));
    let unplugged_clone = unplugged.clone();
    session.register_disconnected_callback(move || {
        unplugged_clone.store(true, Ordering::SeqCst);
    });

    let running = setup_interrupt_handler();
    println!("Listening on {path} (Ctrl+C to stop)...");
    while running.load(Ordering::SeqCst) && !unplugged.load(Ordering::SeqCst) {
        std::thread::sleep(Duration::from_millis(50));
    }

    if unplugged.load(Ordering::SeqCst) {
        warn!("Device {} was removed", path);
        println!("Device disconnected");
    }
    session.close();
    info!("Listen finished");
    Ok(())
}

/// Send one output report
pub fn write(runtime: &Runtime, path: &str, bytes: &[String]) -> CommandResult {
    let data = parse_hex_bytes(bytes)?;
    let session = runtime
        .manager
        .open(path)
        .with_context(|| format!("Failed to open {path}"))?;
    let written = session.write_report(&data)?;
    println!("Wrote {written} bytes: {}", format_hex(&data));
    Ok(())
}

/// Request an input or feature report
pub fn feature_get(
    runtime: &Runtime,
    path: &str,
    report_id: &str,
    length: usize,
    kind: ReportKind,
) -> CommandResult {
    let report_id = u8::from_str_radix(report_id.trim_start_matches("0x"), 16)
        .context("Invalid report ID")?;
    let session = runtime
        .manager
        .open(path)
        .with_context(|| format!("Failed to open {path}"))?;

    let mut buf = vec![0u8; length.max(1)];
    buf[0] = report_id;
    let n = session.get_report(kind, &mut buf)?;
    println!("{:?} report 0x{report_id:02x} ({n} bytes):", kind);
    println!("  {}", format_hex(&buf[..n]));
    Ok(())
}

/// Send one feature report
pub fn feature_send(runtime: &Runtime, path: &str, bytes: &[String]) -> CommandResult {
    let data = parse_hex_bytes(bytes)?;
    let session = runtime
        .manager
        .open(path)
        .with_context(|| format!("Failed to open {path}"))?;
    let sent = session.send_feature_report(&data)?;
    println!("Sent {sent} bytes: {}", format_hex(&data));
    Ok(())
}
