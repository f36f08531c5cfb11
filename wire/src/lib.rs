//! Wire protocol for the agent-run orchestration substrate.
//!
//! This crate defines the shape of a single [`ResponseItem`] and its SSE
//! framing. It has no dependency on the runtime crate: the runtime builds
//! `ResponseItem`s and this crate only knows how to represent and frame them.

pub mod item;
pub mod sse;

pub use item::{ItemType, ResponseItem, StatusType};
pub use sse::{to_sse_line, SSE_HEADERS};
