//! LlmClient trait definition

use async_trait::async_trait;

use super::{CompletionRequest, CompletionResponse, LlmError};

/// One model endpoint
///
/// Each call carries the whole conversation; the client keeps no state
/// between calls and makes a single attempt. Retry and timeout policy lives
/// with the caller.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError>;
}

pub mod mock {
    //! Scripted client for tests and offline runs

    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tracing::debug;

    /// What the scripted client does on a call
    #[derive(Debug)]
    pub enum ScriptStep {
        Reply(CompletionResponse),
        Fail(LlmError),
        /// Never answers; for timeout and cancellation paths
        Hang,
    }

    /// Answers calls from a fixed script, in order
    pub struct MockLlmClient {
        script: Mutex<VecDeque<ScriptStep>>,
        requests: Mutex<Vec<CompletionRequest>>,
        call_count: AtomicUsize,
    }

    impl MockLlmClient {
        pub fn new(responses: Vec<CompletionResponse>) -> Self {
            debug!(response_count = %responses.len(), "MockLlmClient::new: called");
            Self::scripted(responses.into_iter().map(ScriptStep::Reply).collect())
        }

        pub fn scripted(steps: Vec<ScriptStep>) -> Self {
            Self {
                script: Mutex::new(steps.into()),
                requests: Mutex::new(Vec::new()),
                call_count: AtomicUsize::new(0),
            }
        }

        pub fn call_count(&self) -> usize {
            self.call_count.load(Ordering::SeqCst)
        }

        /// Every request seen so far
        pub fn requests(&self) -> Vec<CompletionRequest> {
            self.requests.lock().map(|r| r.clone()).unwrap_or_default()
        }
    }

    #[async_trait]
    impl LlmClient for MockLlmClient {
        async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
            let idx = self.call_count.fetch_add(1, Ordering::SeqCst);
            debug!(%idx, "MockLlmClient::complete: called");
            if let Ok(mut requests) = self.requests.lock() {
                requests.push(request);
            }

            let step = self.script.lock().ok().and_then(|mut script| script.pop_front());
            match step {
                Some(ScriptStep::Reply(response)) => Ok(response),
                Some(ScriptStep::Fail(err)) => Err(err),
                Some(ScriptStep::Hang) => {
                    std::future::pending::<()>().await;
                    Err(LlmError::InvalidResponse("unreachable".to_string()))
                }
                None => {
                    debug!("MockLlmClient::complete: no more mock responses");
                    Err(LlmError::InvalidResponse("No more mock responses".to_string()))
                }
            }
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use crate::llm::TokenUsage;

        fn request() -> CompletionRequest {
            CompletionRequest {
                system_prompt: "Test".to_string(),
                messages: vec![],
                tools: vec![],
                max_tokens: 64,
            }
        }

        #[tokio::test]
        async fn test_mock_client_returns_responses() {
            let client = MockLlmClient::new(vec![
                CompletionResponse::text("ls", TokenUsage::new(10, 1)),
                CompletionResponse::text("cd corridor", TokenUsage::new(20, 2)),
            ]);

            let resp1 = client.complete(request()).await.unwrap();
            assert_eq!(resp1.content.as_deref(), Some("ls"));
            let resp2 = client.complete(request()).await.unwrap();
            assert_eq!(resp2.content.as_deref(), Some("cd corridor"));

            assert_eq!(client.call_count(), 2);
            assert_eq!(client.requests().len(), 2);
        }

        #[tokio::test]
        async fn test_mock_client_errors_when_exhausted() {
            let client = MockLlmClient::new(vec![]);
            assert!(client.complete(request()).await.is_err());
        }

        #[tokio::test]
        async fn test_mock_client_scripted_failure() {
            let client = MockLlmClient::scripted(vec![ScriptStep::Fail(LlmError::ApiError {
                status: 500,
                message: "boom".to_string(),
            })]);
            let err = client.complete(request()).await.unwrap_err();
            assert!(err.is_retryable());
        }
    }
}
