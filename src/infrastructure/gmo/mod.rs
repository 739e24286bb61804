//! Gateway to the GMO Coin FX broker: signed REST, rate limiting and the
//! public/private WebSocket streams.

pub mod dispatch;
pub mod dto;
pub mod envelope;
pub mod orders;
pub mod rest;
pub mod signer;
pub mod ws_private;
pub mod ws_public;

pub use dispatch::{PrivateChannel, PrivateEventBus, PrivateEventReceivers, quote_ring};
pub use rest::{GmoRestClient, PriceType};
pub use signer::RequestSigner;
pub use ws_private::PrivateWsClient;
pub use ws_public::{PublicWsClient, PublicWsHandle, SubscriptionCommand};
