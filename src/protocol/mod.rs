// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The wire protocol: length-delimited JSON framing plus the tagged message
//! enums that ride inside each frame.

pub mod codec;
pub mod messages;

pub use codec::FrameCodec;
pub use messages::{Ack, ClientMessage, ResultCode, ServerMessage};
