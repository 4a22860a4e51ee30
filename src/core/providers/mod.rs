//! Provider implementations

pub mod compatible;

pub use compatible::OpenAICompatibleProvider;
