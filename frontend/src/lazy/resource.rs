use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// The heavy client-side libraries the site defers until needed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Resource {
    Three,
    Lottie,
    Gsap,
    /// GSAP plugin; usable only after `gsap.registerPlugin(ScrollTrigger)`.
    ScrollTrigger,
}

impl Resource {
    pub const ALL: [Resource; 4] = [
        Resource::Three,
        Resource::Lottie,
        Resource::Gsap,
        Resource::ScrollTrigger,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Resource::Three => "three",
            Resource::Lottie => "lottie",
            Resource::Gsap => "gsap",
            Resource::ScrollTrigger => "ScrollTrigger",
        }
    }

    /// Library this resource registers itself against before use.
    pub fn parent(self) -> Option<Resource> {
        match self {
            Resource::ScrollTrigger => Some(Resource::Gsap),
            _ => None,
        }
    }

    pub fn script_url(self) -> &'static str {
        match self {
            Resource::Three => "https://cdn.jsdelivr.net/npm/three@0.160.0/build/three.min.js",
            Resource::Lottie => "https://cdn.jsdelivr.net/npm/lottie-web@5.12.2/build/player/lottie.min.js",
            Resource::Gsap => "https://cdn.jsdelivr.net/npm/gsap@3.12.5/dist/gsap.min.js",
            Resource::ScrollTrigger => "https://cdn.jsdelivr.net/npm/gsap@3.12.5/dist/ScrollTrigger.min.js",
        }
    }

    /// Global the UMD build installs on `window`.
    pub fn global(self) -> &'static str {
        match self {
            Resource::Three => "THREE",
            Resource::Lottie => "lottie",
            Resource::Gsap => "gsap",
            Resource::ScrollTrigger => "ScrollTrigger",
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Resource {
    type Err = LoadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Resource::ALL
            .into_iter()
            .find(|resource| resource.name() == s)
            .ok_or_else(|| LoadError::UnknownResource(s.to_string()))
    }
}

/// Why a resource is not available. Cloned to every waiter of a shared load.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    #[error("unknown resource {0:?}")]
    UnknownResource(String),
    #[error("failed to import {resource}: {reason}")]
    Import { resource: Resource, reason: String },
    #[error("{resource} loaded but did not expose {global}")]
    MissingExport { resource: Resource, global: &'static str },
    #[error("{resource} needs {parent}, which failed: {reason}")]
    Parent {
        resource: Resource,
        parent: Resource,
        reason: String,
    },
    #[error("failed to register {resource} with {parent}: {reason}")]
    Registration {
        resource: Resource,
        parent: Resource,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResourceStatus<M> {
    Unrequested,
    Loading,
    Ready(M),
    Failed(LoadError),
}

impl<M> ResourceStatus<M> {
    pub fn is_loading(&self) -> bool {
        matches!(self, ResourceStatus::Loading)
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, ResourceStatus::Ready(_))
    }

    pub fn value(&self) -> Option<&M> {
        match self {
            ResourceStatus::Ready(value) => Some(value),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&LoadError> {
        match self {
            ResourceStatus::Failed(err) => Some(err),
            _ => None,
        }
    }
}
