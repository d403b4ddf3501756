//! Remote model provider boundary.
//!
//! The rest of the crate talks to the hosted model only through the traits in
//! [`base`]: a request-in/text-out exchange and a duplex audio channel.
//! Vendor adapters live in their own submodules and are interchangeable or
//! mockable behind those traits.

mod base;
pub mod gemini;

pub use base::{
    BoxedLiveHandle, EMPTY_REPLY_FALLBACK, ERROR_REPLY, LiveConnector, LiveEvent, LiveHandle,
    ProviderError, ProviderResult, TextExchange,
};
