//! # TypeAssist
//!
//! An auto-typer: types a fixed text into whatever window has keyboard focus,
//! one character at a time, at a user-selected speed.
//!
//! ## Features
//!
//! - Start delay to focus the target window before typing begins
//! - Pause/resume and stop at any time, from any thread
//! - Global hotkeys for start, pause/resume and stop
//! - Structured run states alongside human-readable status messages
//! - JSON configuration file support
//! - Text from an argument, a file, stdin or the clipboard
//! - Update checks against GitHub releases, with download and launch
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use typeassist::{injector, Controller, EnigoInjector, LogReporter};
//!
//! # async fn run() -> typeassist::Result<()> {
//! let controller = Controller::new(
//!     injector::shared(EnigoInjector::new()?),
//!     Arc::new(LogReporter),
//! )?;
//!
//! controller.start("Hello, world!", 70)?;
//! let outcome = controller.wait_until_idle().await;
//! println!("run ended: {outcome:?}");
//! # Ok(())
//! # }
//! ```
//!
//! ## Configuration
//!
//! ```json
//! {
//!   "speed": 70,
//!   "start_delay": "2s",
//!   "hotkeys_enabled": true,
//!   "start_hotkey": "f8",
//!   "pause_hotkey": "f9",
//!   "stop_hotkey": "f10"
//! }
//! ```

pub mod clipboard;
pub mod config;
pub mod control;
pub mod error;
pub mod global_hotkey;
pub mod injector;
pub mod reporter;
pub mod scheduler;
pub mod signal;
pub mod speed;
pub mod updater;

pub use config::Config;
pub use control::Controller;
pub use error::{Result, TypeAssistError};
pub use crate::global_hotkey::{HotkeyAction, HotkeyManager};
pub use injector::{EchoInjector, EnigoInjector, Injector, SharedInjector};
pub use reporter::{ChannelReporter, LogReporter, RunId, RunState, StatusReporter, StatusUpdate};
pub use scheduler::{Run, RunRequest};
pub use signal::RunSignal;
pub use updater::{ReleaseInfo, Updater};
