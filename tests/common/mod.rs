//! Scripted model backend for driving the pipeline without real weights.

use filetalk::{FiletalkError, GenerationParams, IntentResolver, LLMBackend, Sandbox, Session};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[allow(dead_code)]
pub enum Reply {
    Text(String),
    /// Backend error for this call.
    Fail,
    /// Blocks until the call is cancelled.
    Hang,
    /// Sleeps, then answers.
    Slow(Duration, String),
}

pub fn text(s: &str) -> Reply {
    Reply::Text(s.to_string())
}

/// Answers calls from a fixed script, recording every prompt it sees.
/// Once the script is exhausted it answers with an empty string.
pub struct ScriptedBackend {
    replies: VecDeque<Reply>,
    prompts: Arc<Mutex<Vec<String>>>,
}

impl ScriptedBackend {
    pub fn new(replies: Vec<Reply>) -> (Self, Arc<Mutex<Vec<String>>>) {
        let prompts = Arc::new(Mutex::new(Vec::new()));
        let backend = Self {
            replies: replies.into(),
            prompts: Arc::clone(&prompts),
        };
        (backend, prompts)
    }
}

impl LLMBackend for ScriptedBackend {
    fn generate(&mut self, prompt: &str, params: &GenerationParams) -> filetalk::Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());

        match self.replies.pop_front() {
            Some(Reply::Text(t)) => Ok(params.apply_stop(&t)),
            Some(Reply::Fail) => Err(FiletalkError::Backend("scripted failure".into())),
            Some(Reply::Hang) => {
                while !params.cancel.is_cancelled() {
                    std::thread::sleep(Duration::from_millis(5));
                }
                Err(FiletalkError::Cancelled)
            }
            Some(Reply::Slow(delay, t)) => {
                std::thread::sleep(delay);
                Ok(t)
            }
            None => Ok(String::new()),
        }
    }
}

/// A session over a fresh temporary sandbox.
pub struct Harness {
    pub session: Arc<Session>,
    pub prompts: Arc<Mutex<Vec<String>>>,
    pub sandbox: Sandbox,
    _dir: tempfile::TempDir,
}

impl Harness {
    pub fn new(replies: Vec<Reply>) -> Self {
        Self::with_timeout(replies, Duration::from_secs(5))
    }

    pub fn with_timeout(replies: Vec<Reply>, timeout: Duration) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let sandbox = Sandbox::new(dir.path().join("filetalk_root")).unwrap();
        let (backend, prompts) = ScriptedBackend::new(replies);
        let resolver = IntentResolver::new(Box::new(backend)).with_timeout(timeout);
        let session = Arc::new(Session::new(resolver, sandbox.clone()));
        Self {
            session,
            prompts,
            sandbox,
            _dir: dir,
        }
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}
