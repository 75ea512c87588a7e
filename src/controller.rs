use std::sync::Arc;

use futures_util::StreamExt;
use tokio::sync::watch;

use crate::client::{ChunkStream, GenerativeClient};
use crate::state::UiState;

/// Owns the current [`UiState`] and drives it through one streaming request
/// at a time.
///
/// Renderers observe state through [`subscribe`](Self::subscribe); each
/// publication replaces the previous value atomically. A submission is
/// refused while a request is in flight, so publications for a request are
/// strictly ordered and late chunks can never race a newer request.
pub struct ChatController {
    client: Arc<dyn GenerativeClient>,
    tx: watch::Sender<UiState>,
    // Held so publishing never fails while no renderer is subscribed.
    _rx: watch::Receiver<UiState>,
}

impl ChatController {
    pub fn new(client: Arc<dyn GenerativeClient>) -> Self {
        let (tx, rx) = watch::channel(UiState::Initial);
        Self {
            client,
            tx,
            _rx: rx,
        }
    }

    /// A change-notified view of the current state.
    pub fn subscribe(&self) -> watch::Receiver<UiState> {
        self.tx.subscribe()
    }

    pub fn current(&self) -> UiState {
        self.tx.borrow().clone()
    }

    /// Sends `prompt` to the model.
    ///
    /// Returns `false` without publishing anything when the prompt is blank
    /// after trimming or a request is already in flight. Otherwise publishes
    /// `Loading`, then `Success` with the running text on every streamed
    /// chunk, and finally either leaves the last `Success` standing or
    /// publishes `Error`.
    pub fn submit(&self, prompt: &str) -> bool {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return false;
        }

        // One request at a time: only a non-Loading state may flip to
        // Loading, checked and set under the channel's lock.
        let accepted = self.tx.send_if_modified(|state| {
            if state.is_loading() {
                false
            } else {
                *state = UiState::Loading;
                true
            }
        });
        if !accepted {
            return false;
        }

        let client = Arc::clone(&self.client);
        let tx = self.tx.clone();
        let prompt = prompt.to_string();
        tokio::spawn(async move {
            drive(client.stream_generate(&prompt).await, move |state| {
                let _ = tx.send(state);
            })
            .await;
        });

        true
    }
}

/// Pumps one streaming request to completion, publishing every transition.
///
/// On each chunk the running buffer grows and `Success` is re-published with
/// the accumulated text; any failure publishes `Error` and stops, so partial
/// text never appears after an error. A stream that completes without
/// producing tokens still terminates in `Success` with empty text.
async fn drive<F>(connect: anyhow::Result<ChunkStream>, mut publish: F)
where
    F: FnMut(UiState),
{
    let mut stream = match connect {
        Ok(stream) => stream,
        Err(e) => {
            publish(UiState::Error {
                message: format!("{e:#}"),
            });
            return;
        }
    };

    let mut buffer = String::new();
    let mut produced = false;

    while let Some(chunk) = stream.next().await {
        match chunk {
            Ok(text) => {
                produced = true;
                buffer.push_str(&text);
                publish(UiState::Success {
                    text: buffer.clone(),
                });
            }
            Err(e) => {
                publish(UiState::Error {
                    message: format!("{e:#}"),
                });
                return;
            }
        }
    }

    if !produced {
        publish(UiState::Success { text: buffer });
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use anyhow::anyhow;
    use async_trait::async_trait;

    use super::*;

    /// Replays a scripted sequence of chunks, recording received prompts.
    struct ScriptedClient {
        connect_error: Option<String>,
        chunks: Vec<Result<String, String>>,
        hang: bool,
        seen_prompts: Mutex<Vec<String>>,
    }

    impl ScriptedClient {
        fn streaming(chunks: &[&str]) -> Self {
            Self {
                connect_error: None,
                chunks: chunks.iter().map(|c| Ok(c.to_string())).collect(),
                hang: false,
                seen_prompts: Mutex::new(Vec::new()),
            }
        }

        fn failing_after(chunks: &[&str], message: &str) -> Self {
            let mut scripted = Self::streaming(chunks);
            scripted.chunks.push(Err(message.to_string()));
            scripted
        }

        fn hanging() -> Self {
            let mut scripted = Self::streaming(&[]);
            scripted.hang = true;
            scripted
        }
    }

    #[async_trait]
    impl GenerativeClient for ScriptedClient {
        async fn stream_generate(&self, prompt: &str) -> anyhow::Result<ChunkStream> {
            self.seen_prompts.lock().unwrap().push(prompt.to_string());

            if let Some(message) = &self.connect_error {
                return Err(anyhow!("{message}"));
            }
            if self.hang {
                return Ok(Box::pin(futures_util::stream::pending()));
            }

            let chunks = self.chunks.clone();
            Ok(Box::pin(futures_util::stream::iter(
                chunks.into_iter().map(|c| c.map_err(|m| anyhow!(m))),
            )))
        }
    }

    fn collect_drive(connect: anyhow::Result<ChunkStream>) -> Vec<UiState> {
        let states = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
        let sink = states.clone();
        let rt = tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap();
        rt.block_on(drive(connect, move |state| sink.borrow_mut().push(state)));
        std::rc::Rc::try_unwrap(states).unwrap().into_inner()
    }

    fn chunk_stream(chunks: &[&str]) -> ChunkStream {
        let owned: Vec<anyhow::Result<String>> =
            chunks.iter().map(|c| Ok(c.to_string())).collect();
        Box::pin(futures_util::stream::iter(owned))
    }

    #[test]
    fn drive_publishes_running_prefixes_in_order() {
        let states = collect_drive(Ok(chunk_stream(&[
            "Plants ",
            "convert ",
            "light to energy.",
        ])));

        assert_eq!(
            states,
            vec![
                UiState::Success { text: "Plants ".into() },
                UiState::Success { text: "Plants convert ".into() },
                UiState::Success { text: "Plants convert light to energy.".into() },
            ]
        );
    }

    #[test]
    fn drive_discards_partial_text_on_stream_error() {
        let owned: Vec<anyhow::Result<String>> = vec![
            Ok("partial ".to_string()),
            Ok("output".to_string()),
            Err(anyhow!("connection reset")),
        ];
        let states = collect_drive(Ok(Box::pin(futures_util::stream::iter(owned))));

        assert!(matches!(states.last(), Some(UiState::Error { .. })));
        let after_error: Vec<_> = states
            .iter()
            .skip_while(|s| !matches!(s, UiState::Error { .. }))
            .skip(1)
            .collect();
        assert!(after_error.is_empty());
    }

    #[test]
    fn drive_reports_connect_failure() {
        let states = collect_drive(Err(anyhow!("deadline exceeded")));

        assert_eq!(states.len(), 1);
        match &states[0] {
            UiState::Error { message } => assert!(message.contains("deadline exceeded")),
            other => panic!("expected error state, got {other:?}"),
        }
    }

    #[test]
    fn drive_finishes_empty_stream_with_empty_success() {
        let states = collect_drive(Ok(chunk_stream(&[])));

        assert_eq!(states, vec![UiState::Success { text: String::new() }]);
    }

    #[tokio::test]
    async fn blank_prompt_causes_no_transition() {
        let controller = ChatController::new(Arc::new(ScriptedClient::streaming(&["hi"])));

        assert!(!controller.submit(""));
        assert!(!controller.submit("   \t  "));
        assert_eq!(controller.current(), UiState::Initial);
    }

    #[tokio::test]
    async fn submit_publishes_loading_before_any_result() {
        let controller = ChatController::new(Arc::new(ScriptedClient::streaming(&["hi"])));

        assert!(controller.submit("Summarize photosynthesis"));
        // Single-threaded test runtime: the spawned request task has not run
        // yet, so the synchronously published Loading is still current.
        assert_eq!(controller.current(), UiState::Loading);
    }

    #[tokio::test]
    async fn submit_is_rejected_while_loading() {
        let controller = ChatController::new(Arc::new(ScriptedClient::hanging()));

        assert!(controller.submit("first"));
        assert!(!controller.submit("second"));
        assert_eq!(controller.current(), UiState::Loading);
    }

    #[tokio::test]
    async fn streamed_request_ends_in_accumulated_success() {
        let client = Arc::new(ScriptedClient::streaming(&[
            "Plants ",
            "convert ",
            "light to energy.",
        ]));
        let controller = ChatController::new(client.clone());
        let mut rx = controller.subscribe();

        assert!(controller.submit("  Summarize photosynthesis  "));
        let expected = UiState::Success {
            text: "Plants convert light to energy.".into(),
        };
        loop {
            rx.changed().await.unwrap();
            if *rx.borrow_and_update() == expected {
                break;
            }
        }

        // The prompt reaches the client trimmed.
        assert_eq!(
            client.seen_prompts.lock().unwrap().as_slice(),
            ["Summarize photosynthesis"]
        );
        // A terminal state accepts the next submission.
        assert!(controller.submit("again"));
    }

    #[tokio::test]
    async fn failed_request_ends_in_error() {
        let controller = ChatController::new(Arc::new(ScriptedClient::failing_after(
            &["partial "],
            "quota exceeded",
        )));
        let mut rx = controller.subscribe();

        assert!(controller.submit("trigger quota"));
        loop {
            rx.changed().await.unwrap();
            let state = rx.borrow_and_update().clone();
            if let UiState::Error { message } = state {
                assert!(message.contains("quota exceeded"));
                break;
            }
        }

        assert!(controller.submit("retry by hand"));
    }
}
