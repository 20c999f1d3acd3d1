//! Global hotkeys for starting, pausing and stopping runs while another
//! window has focus.

use global_hotkey::hotkey::HotKey;
use global_hotkey::{GlobalHotKeyEvent, GlobalHotKeyManager, HotKeyState};
use std::collections::HashMap;
use std::fmt;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{Result, TypeAssistError};

/// How often the listener drains the hotkey event queue.
const EVENT_POLL: Duration = Duration::from_millis(10);

/// What a registered hotkey does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HotkeyAction {
    Start,
    TogglePause,
    Stop,
}

impl fmt::Display for HotkeyAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HotkeyAction::Start => "start",
            HotkeyAction::TogglePause => "pause/resume",
            HotkeyAction::Stop => "stop",
        };
        f.write_str(name)
    }
}

pub struct HotkeyManager {
    manager: GlobalHotKeyManager,
    bindings: HashMap<u32, HotkeyAction>,
}

impl HotkeyManager {
    pub fn new() -> Result<Self> {
        let manager = GlobalHotKeyManager::new().map_err(|e| {
            TypeAssistError::hotkey(format!("failed to create hotkey manager: {e}"))
        })?;

        Ok(Self {
            manager,
            bindings: HashMap::new(),
        })
    }

    pub fn register(&mut self, action: HotkeyAction, hotkey_str: &str) -> Result<()> {
        let hotkey = parse_hotkey(hotkey_str)?;
        if let Some(existing) = self.bindings.get(&hotkey.id()) {
            return Err(TypeAssistError::hotkey(format!(
                "'{hotkey_str}' is already bound to {existing}"
            )));
        }

        self.manager.register(hotkey).map_err(|e| {
            TypeAssistError::hotkey(format!("failed to register '{hotkey_str}': {e}"))
        })?;
        self.bindings.insert(hotkey.id(), action);

        info!("Global {} hotkey '{}' registered", action, hotkey_str);
        Ok(())
    }

    /// Dispatch pressed hotkeys to `handler` on a detached listener thread.
    ///
    /// The manager itself must stay alive for the registrations to remain
    /// active; the listener only holds a copy of the bindings. The thread runs
    /// until the process exits. It is a plain thread rather than a tokio
    /// blocking task, so it never holds up runtime shutdown.
    pub fn start_listener<F>(&self, handler: F) -> Result<JoinHandle<()>>
    where
        F: Fn(HotkeyAction) + Send + 'static,
    {
        let bindings = self.bindings.clone();
        let receiver = GlobalHotKeyEvent::receiver();

        let listener = thread::Builder::new()
            .name("hotkey-listener".to_string())
            .spawn(move || loop {
                while let Ok(event) = receiver.try_recv() {
                    if event.state != HotKeyState::Pressed {
                        continue;
                    }
                    if let Some(action) = bindings.get(&event.id).copied() {
                        debug!("Hotkey pressed: {}", action);
                        handler(action);
                    }
                }
                thread::sleep(EVENT_POLL);
            })?;
        Ok(listener)
    }
}

/// Parse strings like `"f9"`, `"ctrl+alt+r"` or `"shift+esc"`.
///
/// Exactly one non-modifier key is required. Matching is case-insensitive.
pub fn parse_hotkey(hotkey_str: &str) -> Result<HotKey> {
    let binding = hotkey_str.trim().to_lowercase();
    if binding.is_empty() {
        return Err(TypeAssistError::hotkey("empty hotkey string"));
    }

    let mut tokens = Vec::new();
    let mut key_count = 0;
    for part in binding.split('+').map(str::trim) {
        if part.is_empty() {
            return Err(TypeAssistError::hotkey(format!(
                "missing key in hotkey '{hotkey_str}'"
            )));
        }
        let token = match part {
            "ctrl" | "control" => "control",
            "alt" | "option" => "alt",
            "shift" => "shift",
            "meta" | "cmd" | "super" | "win" => "super",
            key => {
                key_count += 1;
                normalize_key(key)
            }
        };
        tokens.push(token);
    }

    match key_count {
        0 => Err(TypeAssistError::hotkey(format!(
            "no key specified in hotkey '{hotkey_str}'"
        ))),
        1 => tokens
            .join("+")
            .parse::<HotKey>()
            .map_err(|e| TypeAssistError::hotkey(format!("unsupported hotkey '{hotkey_str}': {e}"))),
        _ => Err(TypeAssistError::hotkey(format!(
            "multiple keys specified in hotkey '{hotkey_str}'"
        ))),
    }
}

fn normalize_key(key: &str) -> &str {
    match key {
        "esc" => "escape",
        "return" => "enter",
        "up" => "arrowup",
        "down" => "arrowdown",
        "left" => "arrowleft",
        "right" => "arrowright",
        "del" => "delete",
        "ins" => "insert",
        "pgup" => "pageup",
        "pgdn" => "pagedown",
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_function_key() {
        assert!(parse_hotkey("f8").is_ok());
        assert!(parse_hotkey("F9").is_ok());
    }

    #[test]
    fn test_parse_with_modifiers() {
        let a = parse_hotkey("ctrl+alt+r").unwrap();
        let b = parse_hotkey("Control + Alt + R").unwrap();
        assert_eq!(a, b);
        assert_ne!(a, parse_hotkey("r").unwrap());
    }

    #[test]
    fn test_aliases() {
        assert_eq!(parse_hotkey("esc").unwrap(), parse_hotkey("escape").unwrap());
        assert_eq!(parse_hotkey("shift+up").unwrap(), parse_hotkey("shift+arrowup").unwrap());
    }

    #[test]
    fn test_rejects_malformed() {
        assert!(parse_hotkey("").is_err());
        assert!(parse_hotkey("ctrl+").is_err());
        assert!(parse_hotkey("ctrl+alt").is_err());
        assert!(parse_hotkey("a+b").is_err());
        assert!(parse_hotkey("ctrl+nosuchkey").is_err());
    }

    #[test]
    fn test_action_display() {
        assert_eq!(HotkeyAction::TogglePause.to_string(), "pause/resume");
    }
}
