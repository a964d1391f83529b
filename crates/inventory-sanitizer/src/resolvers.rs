//! External lookups used by autocode predicates.
//!
//! Each resolver is a trait object so deployments can wire real services
//! and tests can wire fixed answers. A missing resolver behaves like one
//! that always fails.

use crate::error::ResolverError;
use chrono::{DateTime, Utc};
use inventory_schema::GeoPoint;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub struct Place {
    /// Canonical name of the place.
    pub name: String,
    /// ISO 3166-1 alpha-2 code of the containing country.
    pub country_code: String,
    pub point: GeoPoint,
    /// Canonical postal address, when the query was an address.
    pub address: Option<String>,
    pub external_ids: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SocialProfile {
    pub followers: i64,
    pub verified: bool,
    pub joined: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct KnowledgeRecord {
    pub identifier: Option<String>,
    pub aliases: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RepositoryInfo {
    pub programming_languages: Vec<String>,
    pub pypi: Option<String>,
    pub cran: Option<String>,
    pub license: Option<String>,
}

pub trait Geocoder: Send + Sync {
    fn geocode(&self, query: &str) -> Result<Place, ResolverError>;
}

pub trait SocialProfiles: Send + Sync {
    /// Profile behind a channel URL or handle.
    fn profile(&self, handle: &str) -> Result<SocialProfile, ResolverError>;
}

pub trait KnowledgeBase: Send + Sync {
    fn lookup(&self, name: &str) -> Result<KnowledgeRecord, ResolverError>;
}

pub trait RepositoryMetadata: Send + Sync {
    fn repository(&self, url: &str) -> Result<RepositoryInfo, ResolverError>;
}

/// The resolvers available to a sanitizer.
#[derive(Clone, Default)]
pub struct Resolvers {
    pub geocoder: Option<Arc<dyn Geocoder>>,
    pub social: Option<Arc<dyn SocialProfiles>>,
    pub knowledge: Option<Arc<dyn KnowledgeBase>>,
    pub repository: Option<Arc<dyn RepositoryMetadata>>,
}

impl std::fmt::Debug for Resolvers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolvers")
            .field("geocoder", &self.geocoder.is_some())
            .field("social", &self.social.is_some())
            .field("knowledge", &self.knowledge.is_some())
            .field("repository", &self.repository.is_some())
            .finish()
    }
}

fn unavailable(what: &str) -> ResolverError {
    ResolverError::Unavailable(format!("no {what} configured"))
}

impl Resolvers {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_geocoder(mut self, geocoder: Arc<dyn Geocoder>) -> Self {
        self.geocoder = Some(geocoder);
        self
    }

    pub fn with_social(mut self, social: Arc<dyn SocialProfiles>) -> Self {
        self.social = Some(social);
        self
    }

    pub fn with_knowledge(mut self, knowledge: Arc<dyn KnowledgeBase>) -> Self {
        self.knowledge = Some(knowledge);
        self
    }

    pub fn with_repository(mut self, repository: Arc<dyn RepositoryMetadata>) -> Self {
        self.repository = Some(repository);
        self
    }

    pub fn geocode(&self, query: &str) -> Result<Place, ResolverError> {
        self.geocoder.as_ref().ok_or_else(|| unavailable("geocoder"))?.geocode(query)
    }

    pub fn profile(&self, handle: &str) -> Result<SocialProfile, ResolverError> {
        self.social.as_ref().ok_or_else(|| unavailable("social profile resolver"))?.profile(handle)
    }

    pub fn knowledge(&self, name: &str) -> Result<KnowledgeRecord, ResolverError> {
        self.knowledge.as_ref().ok_or_else(|| unavailable("knowledge base"))?.lookup(name)
    }

    pub fn repository(&self, url: &str) -> Result<RepositoryInfo, ResolverError> {
        self.repository
            .as_ref()
            .ok_or_else(|| unavailable("repository resolver"))?
            .repository(url)
    }
}
