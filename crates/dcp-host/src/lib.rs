//! Host-facing contracts for the dcp engine.
//!
//! This crate models the slice of the host that the engine sees: the
//! message/part/tool-state shapes delivered to the transform hook, the
//! hook payload types, and the small RPC surface (`HostClient`) the
//! engine calls back into. The engine treats host transcripts as
//! read-only input except through the explicit rewriter operations in
//! `dcp-core`.

pub mod client;
pub mod error;
pub mod hook;
pub mod message;

pub use client::{HostClient, Session, Toast, ToastVariant};
pub use error::{HostError, HostResult};
pub use hook::{ChatMessageInput, CommandExecuteInput, HostEvent, SessionStatus};
pub use message::{
    MessageInfo, MessageTime, MessageWithParts, ModelRef, Part, Role, TextPart, ToolPart,
    ToolState,
};
