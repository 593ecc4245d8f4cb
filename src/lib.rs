//! Tarkov Tail - follows Escape from Tarkov client logs and extracts events.

pub mod engine;
