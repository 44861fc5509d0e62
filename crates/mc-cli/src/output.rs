//! Terminal output helpers

use mc_protocol::Response;
use serde_json::Value;

/// Render a reply for the terminal: the result value, pretty-printed
pub fn format_result(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
    }
}

/// Print a reply, as raw JSON or as a status line plus result.
///
/// Returns `false` for an error reply.
pub fn print_reply(reply: &Response, raw: bool) -> bool {
    if raw {
        match reply.to_json() {
            Ok(text) => println!("{}", text),
            Err(e) => print_error(&format!("Failed to encode reply: {}", e)),
        }
        return reply.error_object().is_none();
    }

    match (reply.result(), reply.error_object()) {
        (Some(result), _) => {
            print_success(&format_result(result));
            true
        }
        (None, Some(error)) => {
            print_error(&format!("{} (code {})", error.message, error.code));
            false
        }
        (None, None) => false,
    }
}

/// Print a success message in green with a checkmark prefix
pub fn print_success(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stdout = std::io::stdout();
    let _ = crossterm::execute!(
        stdout,
        SetForegroundColor(Color::Green),
        Print("✓ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Print an error message in red with an X prefix, to stderr
pub fn print_error(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stderr = std::io::stderr();
    let _ = crossterm::execute!(
        stderr,
        SetForegroundColor(Color::Red),
        Print("✗ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Print an informational message in cyan
pub fn print_info(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stdout = std::io::stdout();
    let _ = crossterm::execute!(
        stdout,
        SetForegroundColor(Color::Cyan),
        Print("ℹ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}
