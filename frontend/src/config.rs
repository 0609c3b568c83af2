use crate::components::three_scene::SceneComplexity;

#[cfg(debug_assertions)]
pub fn get_backend_url() -> &'static str {
    "http://localhost:3001"  // Development URL when running locally
}

#[cfg(not(debug_assertions))]
pub fn get_backend_url() -> &'static str {
    ""  // Production URL
}

/// Where field metrics are beaconed. Relative so it follows the page origin.
pub const VITALS_ENDPOINT: &str = "/api/vitals";

pub const SERVICE_WORKER_URL: &str = "/sw.js";

pub const SERVICE_WORKER_SCOPE: &str = "/";

// the hero sits above the fold on every device, keep it cheap
pub const HERO_SCENE: SceneComplexity = SceneComplexity::Low;

/// Dev builds skip the worker so stale precaches never hide fresh trunk output.
pub fn service_worker_enabled() -> bool {
    !cfg!(debug_assertions)
}
