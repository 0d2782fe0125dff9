//! SIP message model used by the rcse signaling engine.
//!
//! Provides case-insensitive header [`Name`]s, the order preserving [`Headers`] multimap,
//! typed headers (see [`header::typed`]), status [`Code`]s, [`Method`]s and the
//! message line types inside [`msg`].

mod code;
pub mod header;
mod method;
pub mod msg;
pub mod parse;
pub mod uri;

pub use code::{Code, CodeKind};
pub use header::headers::Headers;
pub use header::name::Name;
pub use method::Method;
