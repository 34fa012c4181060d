//! Serial output for the log streams.
//!
//! Runs as its own low-priority task on device: drains the capture stream
//! before the background one and reports drop counters now and then.
//! Formatting and draining are plain functions over a byte sink so they
//! are tested on the host.

use core::fmt::Write;

use crate::logging::{LogEntry, LogStream, MsgBuf, MAX_MSG_LEN};

#[cfg(target_os = "espidf")]
use crate::log_globals::{BG_LOG_STREAM, CAPTURE_LOG_STREAM};
#[cfg(target_os = "espidf")]
use esp_idf_svc::hal::gpio;
#[cfg(target_os = "espidf")]
use esp_idf_svc::hal::peripheral::Peripheral;
#[cfg(target_os = "espidf")]
use esp_idf_svc::hal::uart::{self, UartTxDriver};

/// Longest formatted line: prefix, level, message, newline.
pub const LINE_LEN: usize = MAX_MSG_LEN + 32;

/// Interval between drop reports.
pub const DROP_REPORT_INTERVAL_US: i64 = 10_000_000;

/// UART settings for the log output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UartLoggerConfig {
    pub baud_rate: u32,
    pub tx_pin: u8,
}

impl Default for UartLoggerConfig {
    fn default() -> Self {
        Self {
            baud_rate: 115_200,
            tx_pin: 17,
        }
    }
}

/// `[timestamp_us] LEVEL: message\n`
pub fn format_log_entry(entry: &LogEntry) -> MsgBuf<LINE_LEN> {
    let mut line = MsgBuf::new();
    let text = core::str::from_utf8(entry.text()).unwrap_or("<invalid utf8>");
    let _ = writeln!(
        line,
        "[{:10}] {}: {}",
        entry.timestamp_us,
        entry.level.as_str(),
        text
    );
    line
}

/// Write every pending record of `stream` to `sink`. Returns the count.
pub fn drain_to<const N: usize>(stream: &LogStream<N>, mut sink: impl FnMut(&[u8])) -> usize {
    let mut n = 0;
    while let Some(entry) = stream.drain() {
        sink(format_log_entry(&entry).as_bytes());
        n += 1;
    }
    n
}

/// Drop summary line, `None` when nothing was lost.
pub fn format_drop_report(capture: u32, background: u32) -> Option<MsgBuf<64>> {
    if capture == 0 && background == 0 {
        return None;
    }
    let mut line = MsgBuf::new();
    let _ = writeln!(line, "[WARN] log dropped: capture={} bg={}", capture, background);
    Some(line)
}

/// UART1 in TX-only mode.
#[cfg(target_os = "espidf")]
pub fn init_uart_logger<'d>(
    uart: impl Peripheral<P = uart::UART1> + 'd,
    tx_pin: impl Peripheral<P = impl gpio::OutputPin> + 'd,
    config: &UartLoggerConfig,
) -> Result<UartTxDriver<'d>, esp_idf_svc::sys::EspError> {
    let uart_config =
        uart::config::Config::default().baudrate(esp_idf_svc::hal::units::Hertz(config.baud_rate));

    UartTxDriver::new(
        uart,
        tx_pin,
        Option::<gpio::AnyIOPin>::None,
        Option::<gpio::AnyIOPin>::None,
        &uart_config,
    )
}

/// Log drain loop. Never returns.
#[cfg(target_os = "espidf")]
pub fn uart_logger_task(uart: &mut UartTxDriver<'_>) -> ! {
    let mut last_report = crate::logging::timestamp_us();

    loop {
        let mut written = drain_to(&CAPTURE_LOG_STREAM, |line| {
            let _ = uart.write(line);
        });
        written += drain_to(&BG_LOG_STREAM, |line| {
            let _ = uart.write(line);
        });

        let now = crate::logging::timestamp_us();
        if now - last_report > DROP_REPORT_INTERVAL_US {
            if let Some(line) =
                format_drop_report(CAPTURE_LOG_STREAM.dropped(), BG_LOG_STREAM.dropped())
            {
                let _ = uart.write(line.as_bytes());
                CAPTURE_LOG_STREAM.reset_dropped();
                BG_LOG_STREAM.reset_dropped();
            }
            last_report = now;
        }

        if written == 0 {
            // SAFETY: FreeRTOS delay from task context
            unsafe { esp_idf_svc::sys::vTaskDelay(10) };
        }
    }
}
