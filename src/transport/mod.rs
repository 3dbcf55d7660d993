//! CoAP over UDP - Transport Layer
//!
//! This module moves [`Message`](crate::message::Message)s over a connected
//! UDP socket. It provides:
//!
//! - **Async sockets**: [`CoapSocket`] wrapper for tokio UDP with deadlines
//! - **Demultiplexing**: [`Demux`] routes replies, acknowledgements and notifications
//! - **Connection state**: [`ConnectionState`] with the Ready/Open/Closed lifecycle
//! - **Retransmission**: [`RetransmitPolicy`] for confirmable back-off
//! - **Block-wise transfer**: [`BlockPlan`] and [`transfer`] for Block1 uploads
//! - **Size gating**: [`message_size_allowed`] before anything is written
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │            Client API                   │
//! ├─────────────────────────────────────────┤
//! │         Transport Layer                 │  ← This module
//! │   exchanges, demux, blocks, back-off    │
//! ├─────────────────────────────────────────┤
//! │         Message Codec                   │
//! ├─────────────────────────────────────────┤
//! │              UDP                        │
//! └─────────────────────────────────────────┘
//! ```

mod blockwise;
mod connection;
mod demux;
mod notification;
mod retransmit;
mod size;
mod socket;

pub use blockwise::{BlockPlan, BlockSpan, transfer};
pub use connection::*;
pub use demux::{Demux, Disposition, ExchangeKind, PendingReply, run_reader};
pub use notification::*;
pub use retransmit::{RetransmitPolicy, RetransmitState};
pub use size::{message_size_allowed, size_allowed_within};
pub use socket::*;
