//! Default logging setup for valla binaries.
//!
//! Every log line is prefixed with the time since [`setup`] was called and the current and peak
//! resident set size of the process, so that memory telemetry can be read off the log directly.
//! Resident set sizes are read on Linux and macOS. Other platforms report zero.
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(clippy::undocumented_unsafe_blocks)]
#![warn(missing_docs)]

use std::{
    fmt,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    },
};

#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
struct MemoryAmount(usize);

impl fmt::Debug for MemoryAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self, f)
    }
}

impl fmt::Display for MemoryAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 < 1000 {
            write!(f, "{:5}B", self.0)
        } else if self.0 < 1000 << 10 {
            write!(f, "{:5.1}K", self.0 as f64 / (1u64 << 10) as f64)
        } else if self.0 < 1000 << 20 {
            write!(f, "{:5.1}M", self.0 as f64 / (1u64 << 20) as f64)
        } else {
            write!(f, "{:5.1}G", self.0 as f64 / (1u64 << 30) as f64)
        }
    }
}

#[derive(Clone, Copy, Default, Debug)]
struct RssStats {
    current: MemoryAmount,
    peak: MemoryAmount,
}

/// Extracts a `kB` valued field of `/proc/self/status` in bytes.
fn status_field(status: &str, field: &str) -> Option<usize> {
    let line = status.lines().find_map(|line| line.strip_prefix(field))?;
    let kilobytes = line.strip_prefix(':')?.split_ascii_whitespace().next()?;
    kilobytes.parse::<usize>().ok().map(|kb| kb * 1024)
}

impl RssStats {
    /// Returns zeros where the statistics are unavailable.
    fn now() -> Self {
        #[cfg(all(target_os = "linux", not(miri)))]
        {
            let Ok(status) = std::fs::read_to_string("/proc/self/status") else {
                return Self::default();
            };
            Self {
                current: MemoryAmount(status_field(&status, "VmRSS").unwrap_or(0)),
                peak: MemoryAmount(status_field(&status, "VmHWM").unwrap_or(0)),
            }
        }
        #[cfg(all(target_os = "macos", not(miri)))]
        {
            // SAFETY: rusage is plain old data so all zeros is valid
            let mut rusage: libc::rusage = unsafe { std::mem::zeroed() };
            // SAFETY: getrusage is safe to call as long as it can safely write to the passed
            // pointer
            if unsafe { libc::getrusage(libc::RUSAGE_SELF, &mut rusage) } < 0 {
                return Self::default();
            }

            // SAFETY: proc_taskallinfo is plain old data so all zeros is valid
            let mut info: libc::proc_taskallinfo = unsafe { std::mem::zeroed() };
            let size = std::mem::size_of::<libc::proc_taskallinfo>() as i32;
            // SAFETY: proc_pidinfo is safe to call as long as it can safely write to the passed
            // pointer and is given the correct storage size for the passed pointer
            let written = unsafe {
                libc::proc_pidinfo(
                    libc::getpid(),
                    libc::PROC_PIDTASKALLINFO,
                    0,
                    (&mut info as *mut libc::proc_taskallinfo).cast::<libc::c_void>(),
                    size,
                )
            };
            // ru_maxrss is in bytes on macOS
            let peak = MemoryAmount(rusage.ru_maxrss as usize);
            if written < size {
                return Self { current: MemoryAmount(0), peak };
            }
            Self {
                current: MemoryAmount(info.ptinfo.pti_resident_size as usize),
                peak,
            }
        }
        #[cfg(not(all(any(target_os = "linux", target_os = "macos"), not(miri))))]
        {
            Self::default()
        }
    }
}

const TIMESTAMP_STYLE: anstyle::Style =
    anstyle::Style::new().fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::BrightBlack)));

const MEMORY_STYLE: anstyle::Style =
    anstyle::Style::new().fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Blue)));
const MEMORY_NEW_PEAK_STYLE: anstyle::Style =
    anstyle::Style::new().fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Red)));
const MEMORY_PEAK_STYLE: anstyle::Style =
    anstyle::Style::new().fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::BrightBlack)));

const TARGET_STYLE: anstyle::Style =
    anstyle::Style::new().fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Magenta)));

/// Installs the default logger.
///
/// The filter is read from `VALLA_LOG` and defaults to `info`, colors are controlled by
/// `VALLA_LOG_STYLE`. A header line naming the target is printed whenever it changes.
pub fn setup() {
    let start_time = std::time::Instant::now();
    let peak = AtomicUsize::new(RssStats::now().peak.0);

    let last_target = Mutex::new(String::new());

    env_logger::Builder::from_env(
        env_logger::Env::new()
            .filter_or("VALLA_LOG", "info")
            .write_style("VALLA_LOG_STYLE"),
    )
    .format(move |buf, record| {
        use std::io::Write;

        let timestamp = start_time.elapsed();
        let level = record.level();
        let target = record.target();

        let RssStats { current, peak: max } = RssStats::now();

        let new_peak = peak.fetch_max(max.0, Ordering::Relaxed) < max.0;
        let peak_style = if new_peak {
            MEMORY_NEW_PEAK_STYLE
        } else {
            MEMORY_PEAK_STYLE
        };

        let prefix = format!(
            "{} {} {}",
            format_args!("{style}{timestamp:>9.2?}{style:#}", style = TIMESTAMP_STYLE),
            format_args!("{style}{current}{style:#}", style = MEMORY_STYLE),
            format_args!("{style}{max}{style:#}", style = peak_style),
        );

        let mut last_target = last_target.lock().unwrap_or_else(|err| err.into_inner());
        if target != *last_target {
            last_target.clear();
            last_target.push_str(target);

            writeln!(
                buf,
                "{prefix} {}",
                format_args!("{style}{target}{style:#}", style = TARGET_STYLE)
            )?;
        }
        writeln!(
            buf,
            "{prefix} {} {}",
            format_args!(
                "{style}{level}{style:#}",
                style = buf.default_level_style(level),
            ),
            record.args(),
        )
    })
    .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_status_fields() {
        let status = "Name:\tbench\nVmHWM:\t  2048 kB\nVmRSS:\t   1024 kB\nThreads:\t1\n";
        assert_eq!(status_field(status, "VmRSS"), Some(1024 * 1024));
        assert_eq!(status_field(status, "VmHWM"), Some(2048 * 1024));
        assert_eq!(status_field(status, "VmSwap"), None);
    }

    #[test]
    fn memory_amounts() {
        assert_eq!(MemoryAmount(999).to_string(), "  999B");
        assert_eq!(MemoryAmount(1536).to_string(), "  1.5K");
        assert_eq!(MemoryAmount(3 << 20).to_string(), "  3.0M");
    }

    #[test]
    #[cfg(all(any(target_os = "linux", target_os = "macos"), not(miri)))]
    fn reports_resident_memory() {
        let stats = RssStats::now();
        assert!(stats.current.0 > 0);
        assert!(stats.peak >= stats.current);
    }
}
