//! Integration adapters (Rig + Ollama).

pub mod rig_adapter;

pub use rig_adapter::{OllamaProvider, build_answer_prompt, build_title_prompt, init_tracing};
