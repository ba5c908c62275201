pub mod claims;
pub mod context;
pub mod guard;
pub mod middleware;
pub mod verifier;

pub use claims::Claims;
pub use context::AuthContext;
pub use guard::{authorize, Access, AuthorizedCaller, PropertyScope, Role};
pub use middleware::RequireAuth;
pub use verifier::{AdminBootstrap, TokenVerifier};
