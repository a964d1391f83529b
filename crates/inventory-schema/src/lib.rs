//! Inventory schema layer
//!
//! Declarative description of every entity type stored in the inventory
//! graph, and the pure half of entry validation:
//!
//! - [`predicate`]: field-type descriptors that validate/coerce raw input
//! - [`schema`]: the registry mapping type names to flattened predicate lists,
//!   permission thresholds and the storage schema (DDL) generator
//! - [`catalog`]: the concrete inventory types (`Entry`, `Source`, ...)
//! - [`value`]: the typed intermediate record that flows from validation into
//!   mutation building
//! - [`facets`]: the reversible facet side-channel encoding
//!
//! ```text
//!   raw JSON ──► Predicate::validate ──► FieldValue ──► Record (Entry)
//!                      ▲                                    │
//!                      │                                    ▼
//!                  Registry ───────── DDL ──────────►  graph store
//! ```

pub mod auxiliary;
pub mod catalog;
pub mod dates;
pub mod error;
pub mod facets;
pub mod predicate;
pub mod role;
pub mod schema;
pub mod slug;
pub mod uid;
pub mod value;

pub use error::{SchemaError, UidError, ValidationError};
pub use predicate::{
    Autocode, Cardinality, ChoiceSet, DefaultValue, FacetSpec, FacetType, LinkInput, Predicate,
    PredicateKind, ResolverKind, TargetConstraint,
};
pub use role::{Operation, Role};
pub use schema::{EntityType, Registry, RegistryBuilder, TypeDef, BASE_TYPE};
pub use uid::{BlankId, NodeRef, Uid};
pub use value::{Entry, Facets, FieldValue, GeoPoint, Item, Record, Value};
