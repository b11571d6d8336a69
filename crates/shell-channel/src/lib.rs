//! shell-channel
//!
//! Bilateral payment channels for off-chain settlement between two
//! institutions. The on-chain lifecycle is open → update* → close; every
//! update must conserve the channel capacity and strictly advance the
//! nonce, and carries both participants' signatures over the canonical
//! state encoding. Stale updates are rejected here, before broadcast; the
//! on-chain spending script punishes any that slip through a contested
//! close.

pub mod channel;
pub mod registry;

pub use channel::{derive_channel_id, ChannelUpdate, PaymentChannel};
pub use registry::{ChannelRegistry, ClosureSummary};
