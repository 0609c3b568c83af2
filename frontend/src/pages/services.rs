use yew::prelude::*;
use yew_router::prelude::*;

use super::not_found::NotFound;
use crate::components::lottie_player::LottiePlayer;
use crate::components::scroll_reveal::ScrollReveal;
use crate::content::{self, CASE_STUDIES, SERVICES};
use crate::Route;

#[function_component(Services)]
pub fn services() -> Html {
    html! {
        <div class="services-page">
            <h1>{"Services"}</h1>
            { for SERVICES.iter().map(|service| html! {
                <ScrollReveal key={service.slug} class="service-row">
                    <h2>{ service.title }</h2>
                    <p>{ service.summary }</p>
                    <Link<Route> to={Route::Service { slug: service.slug.to_string() }} classes="nav-link">
                        {"Details"}
                    </Link<Route>>
                </ScrollReveal>
            }) }
        </div>
    }
}

#[derive(Properties, PartialEq)]
pub struct ServiceDetailProps {
    pub slug: String,
}

#[function_component(ServiceDetail)]
pub fn service_detail(props: &ServiceDetailProps) -> Html {
    let Some(service) = content::service(&props.slug) else {
        return html! { <NotFound /> };
    };
    let related = CASE_STUDIES
        .iter()
        .filter(|study| study.services.contains(&service.slug));

    html! {
        <div class="service-detail">
            <h1>{ service.title }</h1>
            {
                if let Some(src) = service.animation {
                    html! { <LottiePlayer src={src} class="service-animation" /> }
                } else {
                    html! {}
                }
            }
            <p class="lead">{ service.summary }</p>
            <ul class="highlights">
                { for service.highlights.iter().map(|item| html! { <li>{ *item }</li> }) }
            </ul>
            <ScrollReveal>
                <h2>{"Related work"}</h2>
                <ul>
                    { for related.map(|study| html! {
                        <li key={study.slug}>
                            <Link<Route> to={Route::CaseStudy { slug: study.slug.to_string() }}>
                                { format!("{}: {}", study.client, study.title) }
                            </Link<Route>>
                        </li>
                    }) }
                </ul>
            </ScrollReveal>
            <Link<Route> to={Route::Contact} classes="cta-button">{"Talk to us about it"}</Link<Route>>
        </div>
    }
}
