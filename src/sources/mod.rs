//! Source Adapters (§4.E): four concrete `Platform` implementations.
//!
//! One module per source type, mirroring the per-source-type module layout
//! used elsewhere in this codebase for pluggable backends.

pub mod cookie;
pub mod media_info;
pub mod odysee;
pub mod peertube;
pub mod rumble;
pub mod youtube;

pub use odysee::OdyseePlatform;
pub use peertube::PeertubePlatform;
pub use rumble::RumblePlatform;
pub use youtube::YoutubePlatform;
