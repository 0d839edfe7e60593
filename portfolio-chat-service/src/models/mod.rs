pub mod chat;
pub mod model;
pub mod prompt;

pub use chat::{ChatRequest, ChatResponse, Question, QuestionError};
pub use model::{ModelCandidate, ModelHandle};
pub use prompt::{build_prompt, PortfolioContext, Prompt, PromptStyle};
