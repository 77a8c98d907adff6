//! Session issuance for Tradecast.
//!
//! A play attempt starts with a **session descriptor**: a random token,
//! an expiry, and the verified user id, sealed so that only this server
//! and the real-time backend can read it. The client receives the sealed
//! blob and presents it, opaque and unmodified, as the first frame of the
//! streaming handshake.
//!
//! Issuance is all-or-nothing: the descriptor is registered with the
//! real-time backend *before* it is handed to the client, and if that
//! registration fails the descriptor is never returned — a token the
//! backend never learned about is useless and must not exist.
//!
//! ```text
//! issue(user_id)
//!   ├─ random 256-bit token
//!   ├─ session_end = now + session duration
//!   ├─ seal {token, session_end, user_id}        (DescriptorSealer)
//!   ├─ register sealed blob with the backend     (SessionRegistry)
//!   └─ return IssuedSession — only if registration succeeded
//! ```

mod descriptor;
mod error;
mod issuer;
mod registry;
mod sealer;

pub use descriptor::SessionDescriptor;
pub use error::SessionError;
pub use issuer::{IssuedSession, IssuerConfig, SessionIssuer};
pub use registry::{HttpSessionRegistry, SessionRegistry};
pub use sealer::DescriptorSealer;
