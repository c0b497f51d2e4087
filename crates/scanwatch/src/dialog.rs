//! Desktop dialog notifier
//!
//! Renders a scan outcome as a zenity dialog: scanner output in monospace
//! Pango markup, with the failure message appended in red when the scan
//! failed. Dialog failures are logged and swallowed; a broken desktop session
//! must never take the watcher down.

use async_trait::async_trait;
use tracing::warn;

/// Presents one scan outcome to the user, best-effort
#[async_trait]
pub trait Notifier: Send + Sync {
  async fn notify(&self, output: &[u8], failure: Option<&str>);
}

/// Dialog mode, mapped to zenity's `--info` / `--warning` flags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogMode {
  Info,
  Warning,
}

impl DialogMode {
  fn flag(self) -> &'static str {
    match self {
      DialogMode::Info => "--info",
      DialogMode::Warning => "--warning",
    }
  }
}

/// Escape text for inclusion in Pango markup
fn markup_escape(text: &str) -> String {
  let mut escaped = String::with_capacity(text.len());
  for c in text.chars() {
    match c {
      '&' => escaped.push_str("&amp;"),
      '<' => escaped.push_str("&lt;"),
      '>' => escaped.push_str("&gt;"),
      _ => escaped.push(c),
    }
  }
  escaped
}

/// Render a scan outcome into a dialog mode and Pango markup body
///
/// Non-UTF-8 scanner output is rendered lossily.
pub(crate) fn render(output: &[u8], failure: Option<&str>) -> (DialogMode, String) {
  let body = markup_escape(&String::from_utf8_lossy(output));

  match failure {
    None => (DialogMode::Info, format!("<tt>{body}</tt>")),
    Some(err) => (
      DialogMode::Warning,
      format!(
        "<tt>{body}</tt>\n\nError reported: <span foreground='red'>{}</span>",
        markup_escape(err)
      ),
    ),
  }
}

/// Notifier backed by the zenity dialog program
#[derive(Debug, Clone)]
pub struct ZenityNotifier {
  command: String,
}

impl ZenityNotifier {
  pub fn new(command: impl Into<String>) -> Self {
    Self {
      command: command.into(),
    }
  }
}

#[async_trait]
impl Notifier for ZenityNotifier {
  async fn notify(&self, output: &[u8], failure: Option<&str>) {
    let (mode, text) = render(output, failure);

    let result = tokio::process::Command::new(&self.command)
      .arg(mode.flag())
      .arg("--ellipsize")
      .arg(format!("--text={text}"))
      .status()
      .await;

    match result {
      Ok(status) if !status.success() => {
        warn!(command = %self.command, %status, "dialog command exited with failure");
      }
      Err(e) => {
        warn!(command = %self.command, error = %e, "failed to run dialog command");
      }
      Ok(_) => {}
    }
  }
}
