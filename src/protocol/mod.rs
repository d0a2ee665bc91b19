//! Wire types for the Sentient agent protocol
//!
//! Response events, outbound queries and the session history that accompanies them.
//! Every type here derives a JSON Schema so the validation pipeline can enforce it.

pub mod events;
pub mod identifier;
pub mod identity;
pub mod request;
pub mod session;

pub use events::*;
pub use identifier::*;
pub use identity::*;
pub use request::*;
pub use session::*;
