pub mod completion;

pub use completion::{CompletionChoice, CompletionRequest, CompletionResponse, CompletionUsage};
