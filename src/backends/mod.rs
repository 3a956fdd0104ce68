/// Built-in backends.
pub mod mock;
pub mod whisper;
