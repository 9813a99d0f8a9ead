//! API translation between Gemini and `OpenAI` formats.
//!
//! The core of the proxy: converts `generateContent` requests into Chat
//! Completions requests and translates the responses back. All translation
//! functions are pure (no I/O); the handler owns every side effect.

pub mod gemini_types;
pub mod openai_types;
pub mod request;
pub mod response;
