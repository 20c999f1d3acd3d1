//! Reading the text to type from the system clipboard.

use tracing::debug;

use crate::error::{Result, TypeAssistError};

/// Current clipboard contents as text.
///
/// Fails when the clipboard cannot be opened, holds something other than
/// text, or holds only whitespace.
pub fn read_text() -> Result<String> {
    let mut clipboard =
        arboard::Clipboard::new().map_err(|e| TypeAssistError::clipboard(e.to_string()))?;
    let text = clipboard.get_text().unwrap_or_default();
    debug!("Read {} characters from the clipboard", text.chars().count());
    require_text(text)
}

fn require_text(text: String) -> Result<String> {
    if text.trim().is_empty() {
        return Err(TypeAssistError::clipboard("clipboard empty or non-text"));
    }
    Ok(text)
}
