// Capability tokens: signed, short-lived bearer credentials bound to a gallery resource.

pub mod claims;
pub mod clock;
pub mod codec;
pub mod issuer;
pub mod key;
pub mod verifier;

pub use claims::{Claims, ResourceId, ScopeSet};
pub use clock::{Clock, FixedClock, SystemClock};
pub use issuer::TokenIssuer;
pub use key::SigningKey;
pub use verifier::TokenVerifier;
