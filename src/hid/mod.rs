//! HID module - USB HID communication with the Stream Deck

mod device;
mod error;
mod icon;
mod keys;
mod matcher;
pub mod mock;
mod pages;
mod poller;
pub mod protocol;
mod transport;

pub use device::StreamDeck;
pub use error::{FramingError, IconError, LifecycleError, TransportError, WriteError};
pub use icon::{load_and_orient, IconPixelBuffer};
pub use keys::{decode_keys, KeySet, KeyTracker};
pub use matcher::{endpoint_matches, find_device};
pub use pages::{build_pages, OutboundPacket};
pub use poller::{
    KeyCallback, KeyPoller, PollPhase, PollSettings, PollStats, Subscribers, SubscriptionId,
};
pub use protocol::Page;
pub use transport::{
    DeckHandle, DescriptorKind, EndpointInfo, HidApiHandle, HidApiTransport, Transport,
};
