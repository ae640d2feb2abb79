//! Session preferences and the global display level.

use std::sync::atomic::{AtomicI32, Ordering};

use crate::block::CompressorConfig;

pub const KB: usize = 1 << 10;
pub const MB: usize = 1 << 20;
pub const GB: usize = 1 << 30;

/// Global notification level: 0 silent, 1 errors, 2 results, 3 progress,
/// 4..5 verbose.
static DISPLAY_LEVEL: AtomicI32 = AtomicI32::new(1);

pub fn set_display_level(level: i32) {
    DISPLAY_LEVEL.store(level.clamp(0, 5), Ordering::Relaxed);
}

pub fn current_display_level() -> i32 {
    DISPLAY_LEVEL.load(Ordering::Relaxed)
}

/// Write `msg` to stderr when the notification level is at least `level`.
pub fn display_level(level: i32, msg: &str) {
    if DISPLAY_LEVEL.load(Ordering::Relaxed) >= level {
        eprint!("{}", msg);
    }
}

/// Everything the file drivers need beyond the per-session block config.
#[derive(Debug, Clone)]
pub struct Prefs {
    pub config: CompressorConfig,
    pub force: bool,
    pub remove_input: bool,
    pub no_link: bool,
    pub no_dot_file: bool,
    /// Block-range extraction bounds for decode, `[from, to)`, 1-based.
    pub from: u64,
    pub to: u64,
}

impl Default for Prefs {
    fn default() -> Self {
        Prefs {
            config: CompressorConfig::default(),
            force: false,
            remove_input: false,
            no_link: false,
            no_dot_file: false,
            from: 0,
            to: u64::MAX,
        }
    }
}
