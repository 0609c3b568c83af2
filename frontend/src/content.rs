//! Static site content. Pages render from these tables, nothing here is fetched.

use crate::components::three_scene::SceneComplexity;

pub struct Service {
    pub slug: &'static str,
    pub title: &'static str,
    pub summary: &'static str,
    pub highlights: &'static [&'static str],
    /// Lottie export illustrating the service, served from `/animations`.
    pub animation: Option<&'static str>,
}

pub struct CaseStudy {
    pub slug: &'static str,
    pub client: &'static str,
    pub title: &'static str,
    pub summary: &'static str,
    pub services: &'static [&'static str],
    pub results: &'static [(&'static str, &'static str)],
    pub scene: SceneComplexity,
}

pub const SERVICES: &[Service] = &[
    Service {
        slug: "web-design",
        title: "Web design",
        summary: "Sites designed around what your visitors came to do, from first sketch to the last breakpoint.",
        highlights: &["Discovery workshops", "Design systems", "Accessible by default"],
        animation: Some("/animations/web-design.json"),
    },
    Service {
        slug: "motion",
        title: "Motion & animation",
        summary: "Scroll-driven storytelling and micro-interactions that load only when they are about to be seen.",
        highlights: &["Lottie illustration", "Scroll choreography", "Reduced-motion fallbacks"],
        animation: Some("/animations/motion.json"),
    },
    Service {
        slug: "3d",
        title: "Real-time 3D",
        summary: "WebGL scenes tuned to the device in front of them instead of the designer's workstation.",
        highlights: &["three.js scenes", "Adaptive quality", "Product configurators"],
        animation: None,
    },
    Service {
        slug: "performance",
        title: "Performance audits",
        summary: "Core Web Vitals measured in the field, fixed in the code and kept green with budgets.",
        highlights: &["Field data collection", "Server-Timing instrumentation", "Offline support"],
        animation: Some("/animations/performance.json"),
    },
];

pub const CASE_STUDIES: &[CaseStudy] = &[
    CaseStudy {
        slug: "northwind-relaunch",
        client: "Northwind Outfitters",
        title: "A storefront that loads before the coffee cools",
        summary: "Replatformed a catalogue of 12k products and moved every heavy animation behind the fold.",
        services: &["web-design", "performance"],
        results: &[("LCP", "4.1s → 1.6s"), ("Conversion", "+18%")],
        scene: SceneComplexity::Low,
    },
    CaseStudy {
        slug: "aurora-configurator",
        client: "Aurora Bikes",
        title: "Configure a bike in real time",
        summary: "A three.js configurator that scales its detail to the visitor's GPU.",
        services: &["3d", "motion"],
        results: &[("Session length", "+42%"), ("Returns", "-9%")],
        scene: SceneComplexity::High,
    },
    CaseStudy {
        slug: "fjord-annual-report",
        client: "Fjord Energy",
        title: "An annual report people actually scrolled",
        summary: "Scroll-linked chapters with Lottie charts that animate as each figure arrives.",
        services: &["motion", "web-design"],
        results: &[("Avg. scroll depth", "87%"), ("Press mentions", "31")],
        scene: SceneComplexity::Medium,
    },
];

pub fn service(slug: &str) -> Option<&'static Service> {
    SERVICES.iter().find(|service| service.slug == slug)
}

pub fn case_study(slug: &str) -> Option<&'static CaseStudy> {
    CASE_STUDIES.iter().find(|study| study.slug == slug)
}
