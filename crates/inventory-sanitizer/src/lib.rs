//! Inventory submission sanitizer
//!
//! Turns untrusted form input into a validated [`inventory_schema::Entry`]
//! and the graph mutation that stores it:
//!
//! ```text
//!   JSON ─► permission gate ─► per-predicate validation ─► autocodes
//!        ─► audit stamps ─► unique name ─► Mutation ─► commit
//! ```
//!
//! Permission checks run before any storage access, so a refused user
//! costs nothing. External lookups (geocoding, social profiles, knowledge
//! base, repositories) go through the traits in [`resolvers`].

pub mod error;
pub mod resolvers;
pub mod sanitizer;
pub mod user;

pub use error::{ResolverError, SanitizeError};
pub use resolvers::{
    Geocoder, KnowledgeBase, KnowledgeRecord, Place, RepositoryInfo, RepositoryMetadata,
    Resolvers, SocialProfile, SocialProfiles,
};
pub use sanitizer::{Sanitizer, SanitizerContext, Stage};
pub use user::User;
