//! Incremental text channel between a reply being generated and its readers.

use tokio::sync::watch;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamStatus {
    Open,
    Done,
    Failed(String),
}

#[derive(Debug, Clone)]
struct Snapshot {
    text: String,
    status: StreamStatus,
}

/// Create a connected writer/reader pair.
#[must_use]
pub fn stream_channel() -> (StreamHandle, StreamReader) {
    let (tx, rx) = watch::channel(Snapshot {
        text: String::new(),
        status: StreamStatus::Open,
    });
    (StreamHandle { tx }, StreamReader { rx })
}

/// Producer side. `update` any number of times, then exactly one of
/// `done` or `fail`; both consume the handle.
///
/// Dropping an open handle marks the stream failed so readers never wait
/// forever.
#[derive(Debug)]
pub struct StreamHandle {
    tx: watch::Sender<Snapshot>,
}

impl StreamHandle {
    pub fn update(&self, delta: &str) {
        if delta.is_empty() {
            return;
        }
        self.tx.send_modify(|s| s.text.push_str(delta));
    }

    pub fn done(self) {
        self.tx.send_modify(|s| s.status = StreamStatus::Done);
    }

    pub fn fail(self, reason: impl Into<String>) {
        let reason = reason.into();
        self.tx.send_modify(|s| s.status = StreamStatus::Failed(reason));
    }

    #[must_use]
    pub fn reader(&self) -> StreamReader {
        StreamReader {
            rx: self.tx.subscribe(),
        }
    }
}

impl Drop for StreamHandle {
    fn drop(&mut self) {
        self.tx.send_if_modified(|s| {
            if s.status == StreamStatus::Open {
                s.status = StreamStatus::Failed("stream closed before completion".to_string());
                true
            } else {
                false
            }
        });
    }
}

/// Consumer side. Cheap to clone; every clone tracks its own "seen" version.
#[derive(Debug, Clone)]
pub struct StreamReader {
    rx: watch::Receiver<Snapshot>,
}

impl StreamReader {
    /// Concatenation of every delta received so far.
    #[must_use]
    pub fn text(&self) -> String {
        self.rx.borrow().text.clone()
    }

    #[must_use]
    pub fn status(&self) -> StreamStatus {
        self.rx.borrow().status.clone()
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.rx.borrow().status == StreamStatus::Open
    }

    /// Wait for the next update. Returns `false` once nothing more can
    /// change.
    pub async fn changed(&mut self) -> bool {
        self.rx.changed().await.is_ok()
    }

    /// Wait for the terminal signal; `Ok` carries the full text.
    pub async fn finished(&mut self) -> Result<String, String> {
        let result = self
            .rx
            .wait_for(|s| s.status != StreamStatus::Open)
            .await
            .map(|s| (*s).clone());
        let snapshot = match result {
            Ok(snapshot) => snapshot,
            Err(_) => self.rx.borrow().clone(),
        };
        match snapshot.status {
            StreamStatus::Done => Ok(snapshot.text),
            StreamStatus::Failed(reason) => Err(reason),
            StreamStatus::Open => Err("stream closed before completion".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reader_sees_concatenation_in_order() {
        let (handle, reader) = stream_channel();
        assert!(reader.is_open());
        assert_eq!(reader.text(), "");

        handle.update("Hel");
        handle.update("");
        handle.update("lo");
        assert_eq!(reader.text(), "Hello");
        assert!(reader.is_open());

        handle.done();
        assert_eq!(reader.status(), StreamStatus::Done);
        assert_eq!(reader.text(), "Hello");
    }

    #[test]
    fn late_reader_sees_everything() {
        let (handle, _first) = stream_channel();
        handle.update("abc");
        let late = handle.reader();
        assert_eq!(late.text(), "abc");
    }

    #[test]
    fn dropping_open_handle_fails_stream() {
        let (handle, reader) = stream_channel();
        handle.update("partial");
        drop(handle);
        assert!(matches!(reader.status(), StreamStatus::Failed(_)));
        assert_eq!(reader.text(), "partial");
    }

    #[tokio::test]
    async fn finished_waits_for_done() {
        let (handle, mut reader) = stream_channel();
        let producer = tokio::spawn(async move {
            for part in ["a", "b", "c"] {
                handle.update(part);
                tokio::task::yield_now().await;
            }
            handle.done();
        });

        assert_eq!(reader.finished().await, Ok("abc".to_string()));
        producer.await.unwrap();
    }

    #[tokio::test]
    async fn finished_reports_failure() {
        let (handle, mut reader) = stream_channel();
        handle.fail("boom");
        assert_eq!(reader.finished().await, Err("boom".to_string()));
    }

    #[tokio::test]
    async fn changed_stops_after_terminal_state() {
        let (handle, mut reader) = stream_channel();
        handle.update("x");
        assert!(reader.changed().await);
        handle.done();
        assert!(reader.changed().await);
        assert!(!reader.changed().await);
    }
}
