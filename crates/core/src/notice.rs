//! User-facing notices (toasts).

use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Error,
    Info,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub title: String,
    pub description: Option<String>,
}

impl std::fmt::Display for Notice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.description {
            Some(ref description) => write!(f, "{}: {}", self.title, description),
            None => f.write_str(&self.title),
        }
    }
}

/// Sending half of the notice channel. Notices sent after the receiver is
/// gone are dropped.
#[derive(Debug, Clone)]
pub struct Notifier {
    tx: mpsc::UnboundedSender<Notice>,
}

pub fn channel() -> (Notifier, mpsc::UnboundedReceiver<Notice>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Notifier { tx }, rx)
}

impl Notifier {
    pub fn notify(&self, level: NoticeLevel, title: &str, description: Option<String>) {
        let _ = self.tx.send(Notice {
            level,
            title: title.to_string(),
            description,
        });
    }

    pub fn success(&self, title: &str, description: impl Into<String>) {
        self.notify(NoticeLevel::Success, title, Some(description.into()));
    }

    pub fn error(&self, title: &str, description: impl Into<String>) {
        self.notify(NoticeLevel::Error, title, Some(description.into()));
    }

    pub fn info(&self, title: &str, description: impl Into<String>) {
        self.notify(NoticeLevel::Info, title, Some(description.into()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notices_render_title_and_description() {
        let (notifier, mut rx) = channel();
        notifier.error("Error", "Failed to update task status. Please try again.");
        notifier.notify(NoticeLevel::Info, "Saved", None);

        let first = rx.try_recv().expect("first notice");
        assert_eq!(first.level, NoticeLevel::Error);
        assert_eq!(
            first.to_string(),
            "Error: Failed to update task status. Please try again."
        );
        assert_eq!(rx.try_recv().expect("second").to_string(), "Saved");
    }

    #[test]
    fn sending_after_receiver_dropped_is_silent() {
        let (notifier, rx) = channel();
        drop(rx);
        notifier.success("Task updated", "ok");
    }
}
