//! Agent half of the bridge: runs inside a content page.
//!
//! The agent answers `executeScript` requests with a response named by the
//! request's `returnId`, and announces document completion with the
//! `readystatechange` lifecycle message. Everything else is ignored.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::eval::ScriptEvaluator;
use super::resource::{AgentError, ResourceLoader};
use super::wire::{BridgeMessage, EXECUTE_SCRIPT, RequestPayload, ResponsePayload, SerializedError};
use crate::tab::ScriptDetails;

/// Where an agent sends messages back to the controller.
pub trait AgentPort: Send + Sync {
    fn dispatch_message(&self, message: BridgeMessage);
}

/// Document readiness as the agent observes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyState {
    Loading,
    Interactive,
    Complete,
}

/// A content-page agent.
pub struct Agent {
    port: Arc<dyn AgentPort>,
    evaluator: Arc<dyn ScriptEvaluator>,
    resources: Option<Arc<dyn ResourceLoader>>,
}

impl Agent {
    pub fn new(port: Arc<dyn AgentPort>, evaluator: Arc<dyn ScriptEvaluator>) -> Self {
        Self {
            port,
            evaluator,
            resources: None,
        }
    }

    /// Allow `file` references, fetched through `loader`.
    pub fn with_resources(mut self, loader: Arc<dyn ResourceLoader>) -> Self {
        self.resources = Some(loader);
        self
    }

    /// Report a readiness change. Only `Complete` is forwarded.
    pub fn ready_state_changed(&self, state: ReadyState) {
        if state == ReadyState::Complete {
            self.port.dispatch_message(BridgeMessage::ready_complete());
        }
    }

    /// Handle one inbound message. Returns whether a response was sent.
    pub async fn handle_message(&self, message: BridgeMessage) -> bool {
        if message.name != EXECUTE_SCRIPT {
            debug!(name = %message.name, "Agent ignoring message");
            return false;
        }

        let request: RequestPayload = match serde_json::from_value(message.message) {
            Ok(request) => request,
            Err(err) => {
                // Without a return id there is nobody to answer.
                warn!(%err, "Agent dropping malformed request");
                return false;
            }
        };

        let outcome = self.execute_script(request.args).await;
        if let Err(err) = &outcome {
            debug!(return_id = %request.return_id, %err, "Script raised");
        }
        let payload = ResponsePayload::from(outcome);
        self.port
            .dispatch_message(BridgeMessage::response(&request.return_id, &payload));
        true
    }

    /// Serve inbound messages until the sender side closes.
    pub async fn run(&self, mut inbox: mpsc::UnboundedReceiver<BridgeMessage>) {
        info!("Agent started");
        while let Some(message) = inbox.recv().await {
            self.handle_message(message).await;
        }
        info!("Agent stopped");
    }

    async fn execute_script(&self, args: Vec<Value>) -> Result<Value, SerializedError> {
        let details: ScriptDetails = args
            .into_iter()
            .next()
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| SerializedError::new("TypeError", format!("invalid script details: {e}")))?
            .unwrap_or_default();

        // Empty code counts as no code.
        let code = details.code.filter(|code| !code.is_empty());
        let source = match (code, details.file) {
            (Some(code), _) => code,
            (None, Some(file)) => {
                let loader = self.resources.as_ref().ok_or(AgentError::NoResourceLoader)?;
                loader.load(&file).await?
            }
            (None, None) => {
                return Err(SerializedError::new(
                    "TypeError",
                    "script details carry neither code nor file",
                ));
            }
        };

        let evaluator = Arc::clone(&self.evaluator);
        tokio::task::spawn_blocking(move || evaluator.evaluate(&source))
            .await
            .map_err(|e| SerializedError::new("InternalError", e.to_string()))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::eval::QuickJsEvaluator;
    use crate::bridge::resource::DirResourceLoader;
    use crate::bridge::wire::READY_STATE_CHANGE;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Outbox(Mutex<Vec<BridgeMessage>>);

    impl AgentPort for Outbox {
        fn dispatch_message(&self, message: BridgeMessage) {
            self.0.lock().unwrap().push(message);
        }
    }

    impl Outbox {
        fn take(&self) -> Vec<BridgeMessage> {
            std::mem::take(&mut *self.0.lock().unwrap())
        }
    }

    fn agent() -> (Arc<Outbox>, Agent) {
        let outbox = Arc::new(Outbox::default());
        let agent = Agent::new(outbox.clone(), Arc::new(QuickJsEvaluator::new()));
        (outbox, agent)
    }

    fn execute(details: Value, return_id: &str) -> BridgeMessage {
        BridgeMessage::request(EXECUTE_SCRIPT, vec![details], return_id)
    }

    #[tokio::test]
    async fn test_code_result_is_returned_under_return_id() {
        let (outbox, agent) = agent();
        assert!(agent.handle_message(execute(json!({"code": "1+1"}), "return-9")).await);

        let sent = outbox.take();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].name, "return-9");
        assert_eq!(sent[0].message, json!({ "returnValue": 2 }));
    }

    #[tokio::test]
    async fn test_thrown_error_is_serialized() {
        let (outbox, agent) = agent();
        agent
            .handle_message(execute(json!({"code": "throw new Error('x')"}), "return-1"))
            .await;

        let sent = outbox.take();
        assert_eq!(sent[0].message["error"]["message"], json!("x"));
        assert!(sent[0].message.get("returnValue").is_none());
    }

    #[tokio::test]
    async fn test_other_names_are_ignored() {
        let (outbox, agent) = agent();
        assert!(!agent.handle_message(BridgeMessage::new("remove", json!({}))).await);
        assert!(!agent.handle_message(BridgeMessage::new(EXECUTE_SCRIPT, json!("junk"))).await);
        assert!(outbox.take().is_empty());
    }

    #[tokio::test]
    async fn test_file_reference_is_loaded_and_evaluated() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("answer.js"), "6 * 7").unwrap();

        let (outbox, agent) = agent();
        let agent = agent.with_resources(Arc::new(DirResourceLoader::new(dir.path())));
        agent
            .handle_message(execute(json!({"file": "/answer.js"}), "return-2"))
            .await;
        assert_eq!(outbox.take()[0].message, json!({ "returnValue": 42 }));
    }

    #[tokio::test]
    async fn test_file_without_loader_fails_remotely() {
        let (outbox, agent) = agent();
        agent
            .handle_message(execute(json!({"file": "/a.js"}), "return-3"))
            .await;
        let sent = outbox.take();
        assert_eq!(
            sent[0].message["error"]["message"],
            json!("file references are not supported by this agent")
        );
    }

    #[tokio::test]
    async fn test_empty_details_fail_remotely() {
        let (outbox, agent) = agent();
        agent.handle_message(execute(json!({}), "return-4")).await;
        assert_eq!(outbox.take()[0].message["error"]["name"], json!("TypeError"));
    }

    #[tokio::test]
    async fn test_empty_code_counts_as_absent() {
        let (outbox, agent) = agent();
        agent.handle_message(execute(json!({"code": ""}), "return-7")).await;
        let sent = outbox.take();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].message["error"]["name"], json!("TypeError"));
        assert_eq!(
            sent[0].message["error"]["message"],
            json!("script details carry neither code nor file")
        );

        // With a file alongside, the file is what runs.
        agent
            .handle_message(execute(json!({"code": "", "file": "/a.js"}), "return-8"))
            .await;
        assert_eq!(
            outbox.take()[0].message["error"]["message"],
            json!("file references are not supported by this agent")
        );
    }

    #[test]
    fn test_only_complete_is_announced() {
        let (outbox, agent) = agent();
        agent.ready_state_changed(ReadyState::Loading);
        agent.ready_state_changed(ReadyState::Interactive);
        agent.ready_state_changed(ReadyState::Complete);

        let sent = outbox.take();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].name, READY_STATE_CHANGE);
        assert!(sent[0].is_ready_complete());
    }

    #[tokio::test]
    async fn test_run_serves_until_closed() {
        let (outbox, agent) = agent();
        let (tx, rx) = mpsc::unbounded_channel();
        tx.send(execute(json!({"code": "'a'"}), "return-5")).unwrap();
        tx.send(execute(json!({"code": "'b'"}), "return-6")).unwrap();
        drop(tx);

        agent.run(rx).await;
        let names: Vec<_> = outbox.take().into_iter().map(|m| m.name).collect();
        assert_eq!(names, ["return-5", "return-6"]);
    }
}
