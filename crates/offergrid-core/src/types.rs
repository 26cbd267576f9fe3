//! Offer and recommendation types.
//!
//! An [`Offer`] is a bundle of resources on one host, valid for a single
//! scheduling cycle. Services answer offers with [`Recommendation`]s, each of
//! which claims exactly one resource of one offer.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Cluster-manager assigned offer identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OfferId(pub String);

impl OfferId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OfferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ── Resources ──────────────────────────────────────────────────────

/// Reservation metadata attached to a reserved resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reservation {
    /// Role the resource is reserved for.
    pub role: String,
    /// Namespace label: the logical name of the owning service.
    #[serde(default)]
    pub namespace: Option<String>,
}

/// A single resource within an offer (e.g. `cpus`, `mem`, a volume).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    /// Unique within the enclosing offer.
    pub id: String,
    pub name: String,
    pub amount: f64,
    #[serde(default)]
    pub reservation: Option<Reservation>,
}

impl Resource {
    /// An unreserved scalar resource.
    pub fn unreserved(id: impl Into<String>, name: impl Into<String>, amount: f64) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            amount,
            reservation: None,
        }
    }

    /// A resource reserved for `role`, labelled with the owning service.
    pub fn reserved(
        id: impl Into<String>,
        name: impl Into<String>,
        amount: f64,
        role: impl Into<String>,
        namespace: Option<&str>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            amount,
            reservation: Some(Reservation {
                role: role.into(),
                namespace: namespace.map(str::to_string),
            }),
        }
    }

    pub fn is_reserved(&self) -> bool {
        self.reservation.is_some()
    }

    /// The owning service named by the namespace label, if any.
    pub fn owner(&self) -> Option<&str> {
        self.reservation.as_ref()?.namespace.as_deref()
    }
}

/// A bundle of resources on one host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Offer {
    pub id: OfferId,
    pub hostname: String,
    #[serde(default)]
    pub resources: Vec<Resource>,
}

impl Offer {
    pub fn new(id: impl Into<String>, hostname: impl Into<String>, resources: Vec<Resource>) -> Self {
        Self {
            id: OfferId::new(id),
            hostname: hostname.into(),
            resources,
        }
    }

    pub fn resource(&self, resource_id: &str) -> Option<&Resource> {
        self.resources.iter().find(|r| r.id == resource_id)
    }

    /// Copy of this offer restricted to the given resources.
    pub fn with_resources(&self, resources: Vec<Resource>) -> Self {
        Self {
            id: self.id.clone(),
            hostname: self.hostname.clone(),
            resources,
        }
    }

    /// Copy of this offer with the listed resource ids removed.
    ///
    /// Returns `None` once no resources remain.
    pub fn without_resources(&self, consumed: &HashSet<&str>) -> Option<Self> {
        let remaining: Vec<Resource> = self
            .resources
            .iter()
            .filter(|r| !consumed.contains(r.id.as_str()))
            .cloned()
            .collect();
        (!remaining.is_empty()).then(|| self.with_resources(remaining))
    }
}

/// Unexpected resources found in one offer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfferResources {
    pub offer_id: OfferId,
    pub hostname: String,
    pub resources: Vec<Resource>,
}

impl OfferResources {
    /// Bundle `resources` with the offer they were found in.
    pub fn new(offer: &Offer, resources: Vec<Resource>) -> Self {
        Self {
            offer_id: offer.id.clone(),
            hostname: offer.hostname.clone(),
            resources,
        }
    }
}

// ── Recommendations ────────────────────────────────────────────────

/// What a recommendation asks the cluster manager to do with a resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Operation {
    Reserve,
    Unreserve,
    CreateVolume,
    DestroyVolume,
    Launch { task_id: String },
}

/// A request to accept one resource of one offer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub offer_id: OfferId,
    pub resource_id: String,
    pub operation: Operation,
}

impl Recommendation {
    pub fn new(offer: &Offer, resource_id: impl Into<String>, operation: Operation) -> Self {
        Self {
            offer_id: offer.id.clone(),
            resource_id: resource_id.into(),
            operation,
        }
    }
}
