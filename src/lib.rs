pub mod command;
pub mod config;
pub mod error;
pub mod intent;
pub mod models;
pub mod normalize;
pub mod sandbox;
pub mod session;
pub mod tools;

pub use command::{Command, ToolKind};
pub use config::{Config, ModelSource};
pub use error::{FiletalkError, Result};
pub use intent::{Candidate, IntentResolver, ParseOutcome, Resolution};
pub use models::qwen3::CandleQwen;
pub use models::{GenerationParams, LLMBackend};
pub use normalize::normalize;
pub use sandbox::Sandbox;
pub use session::{Interpretation, Session};
pub use tools::{Tool, dispatch};
