//! Character injection primitives.
//!
//! The scheduler only needs to type one character at a time into whatever
//! currently has input focus. [`EnigoInjector`] does that through the OS input
//! layer; [`EchoInjector`] writes to stdout for dry runs.

use enigo::{Direction, Enigo, Key, Keyboard, Settings};
use std::io::{self, Write};
use std::sync::{Arc, Mutex};
use tracing::debug;

use crate::error::{Result, TypeAssistError};

/// Types a single character at the current input focus.
///
/// Calls are synchronous and are never interrupted once started.
pub trait Injector: Send {
    fn inject(&mut self, ch: char) -> Result<()>;
}

/// Injector shared between the controller and the runs it spawns.
pub type SharedInjector = Arc<Mutex<dyn Injector>>;

/// Wrap an injector for sharing across runs.
pub fn shared<I: Injector + 'static>(injector: I) -> SharedInjector {
    Arc::new(Mutex::new(injector))
}

/// Injects characters as synthetic key events via `enigo`.
pub struct EnigoInjector {
    enigo: Enigo,
}

impl EnigoInjector {
    pub fn new() -> Result<Self> {
        let enigo = Enigo::new(&Settings::default())
            .map_err(|e| TypeAssistError::injector_init(e.to_string()))?;
        debug!("Keyboard input initialised");
        Ok(Self { enigo })
    }
}

impl Injector for EnigoInjector {
    fn inject(&mut self, ch: char) -> Result<()> {
        let result = match ch {
            // CRLF pairs are folded before a run starts; a lone CR is a line break.
            '\r' | '\n' => self.enigo.key(Key::Return, Direction::Click),
            '\t' => self.enigo.key(Key::Tab, Direction::Click),
            _ => {
                let mut buf = [0u8; 4];
                self.enigo.text(ch.encode_utf8(&mut buf))
            }
        };
        result.map_err(|e| TypeAssistError::injection(ch, e.to_string()))
    }
}

/// Writes characters to stdout instead of synthesising key events.
#[derive(Debug, Default)]
pub struct EchoInjector;

impl Injector for EchoInjector {
    fn inject(&mut self, ch: char) -> Result<()> {
        let mut stdout = io::stdout().lock();
        let mut buf = [0u8; 4];
        stdout
            .write_all(ch.encode_utf8(&mut buf).as_bytes())
            .and_then(|_| stdout.flush())
            .map_err(|e| TypeAssistError::injection(ch, e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Collect(Vec<char>);

    impl Injector for Collect {
        fn inject(&mut self, ch: char) -> Result<()> {
            self.0.push(ch);
            Ok(())
        }
    }

    #[test]
    fn test_shared_injector_is_usable_through_lock() {
        let injector = Arc::new(Mutex::new(Collect(Vec::new())));
        let shared_handle: SharedInjector = injector.clone();

        for ch in "ok".chars() {
            shared_handle.lock().unwrap().inject(ch).unwrap();
        }
        assert_eq!(injector.lock().unwrap().0, vec!['o', 'k']);
    }

    #[test]
    fn test_echo_injector() {
        let mut echo = EchoInjector;
        assert!(echo.inject('a').is_ok());
    }
}
