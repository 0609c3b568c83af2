use yew::prelude::*;
use yew_router::prelude::*;

use super::not_found::NotFound;
use crate::components::scroll_reveal::ScrollReveal;
use crate::components::three_scene::ThreeScene;
use crate::content::{self, CASE_STUDIES};
use crate::Route;

#[function_component(CaseStudies)]
pub fn case_studies() -> Html {
    html! {
        <div class="case-studies-page">
            <h1>{"Case studies"}</h1>
            <div class="card-grid">
                { for CASE_STUDIES.iter().map(|study| html! {
                    <div class="card" key={study.slug}>
                        <span class="client">{ study.client }</span>
                        <h2>{ study.title }</h2>
                        <p>{ study.summary }</p>
                        <Link<Route> to={Route::CaseStudy { slug: study.slug.to_string() }} classes="nav-link">
                            {"Read more"}
                        </Link<Route>>
                    </div>
                }) }
            </div>
        </div>
    }
}

#[derive(Properties, PartialEq)]
pub struct CaseStudyDetailProps {
    pub slug: String,
}

#[function_component(CaseStudyDetail)]
pub fn case_study_detail(props: &CaseStudyDetailProps) -> Html {
    let Some(study) = content::case_study(&props.slug) else {
        return html! { <NotFound /> };
    };

    html! {
        <article class="case-study">
            <header class="case-study-hero">
                <ThreeScene complexity={study.scene} />
                <span class="client">{ study.client }</span>
                <h1>{ study.title }</h1>
            </header>
            <p class="lead">{ study.summary }</p>
            <ScrollReveal>
                <dl class="results">
                    { for study.results.iter().map(|(metric, outcome)| html! {
                        <>
                            <dt>{ *metric }</dt>
                            <dd>{ *outcome }</dd>
                        </>
                    }) }
                </dl>
            </ScrollReveal>
            <ul class="service-tags">
                { for study.services.iter().filter_map(|slug| content::service(slug)).map(|service| html! {
                    <li key={service.slug}>
                        <Link<Route> to={Route::Service { slug: service.slug.to_string() }}>{ service.title }</Link<Route>>
                    </li>
                }) }
            </ul>
        </article>
    }
}
