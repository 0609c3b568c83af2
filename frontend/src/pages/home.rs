use yew::prelude::*;
use yew_router::prelude::*;

use crate::components::lottie_player::LottiePlayer;
use crate::components::scroll_reveal::ScrollReveal;
use crate::components::three_scene::ThreeScene;
use crate::config;
use crate::content::{CASE_STUDIES, SERVICES};
use crate::Route;

#[function_component(Home)]
pub fn home() -> Html {
    html! {
        <div class="home">
            <style>
            {r#".hero {
                position: relative;
                min-height: 90vh;
                display: flex;
                flex-direction: column;
                justify-content: center;
                padding: 0 1.5rem;
                overflow: hidden;
            }
            .hero .three-scene {
                position: absolute;
                inset: 0;
                z-index: -1;
            }
            .hero h1 {
                font-size: clamp(2.5rem, 6vw, 4.5rem);
                max-width: 14ch;
                background: linear-gradient(45deg, #fff, #b8a6ff);
                -webkit-background-clip: text;
                -webkit-text-fill-color: transparent;
            }
            .card-grid {
                display: grid;
                grid-template-columns: repeat(auto-fit, minmax(240px, 1fr));
                gap: 1.5rem;
                padding: 2rem 1.5rem;
            }
            .card {
                background: rgba(30, 30, 40, 0.7);
                border: 1px solid rgba(124, 92, 255, 0.15);
                border-radius: 16px;
                padding: 1.5rem;
            }
            .card .lottie-player {
                height: 140px;
            }"#}
            </style>
            <section class="hero">
                <ThreeScene complexity={config::HERO_SCENE} />
                <h1>{"Websites that move, and still load fast."}</h1>
                <p>{"We design and build animated sites for teams who care about both."}</p>
                <Link<Route> to={Route::Contact} classes="cta-button">
                    {"Start a project"}
                </Link<Route>>
            </section>

            <ScrollReveal>
                <h2>{"What we do"}</h2>
                <div class="card-grid">
                    { for SERVICES.iter().map(|service| html! {
                        <div class="card" key={service.slug}>
                            {
                                match service.animation {
                                    Some(src) => html! { <LottiePlayer src={src} /> },
                                    None => html! {},
                                }
                            }
                            <h3>{ service.title }</h3>
                            <p>{ service.summary }</p>
                            <Link<Route> to={Route::Service { slug: service.slug.to_string() }} classes="nav-link">
                                {"Learn more"}
                            </Link<Route>>
                        </div>
                    }) }
                </div>
            </ScrollReveal>

            <ScrollReveal offset={60.0}>
                <h2>{"Recent work"}</h2>
                <div class="card-grid">
                    { for CASE_STUDIES.iter().map(|study| html! {
                        <div class="card" key={study.slug}>
                            <span class="client">{ study.client }</span>
                            <h3>{ study.title }</h3>
                            <Link<Route> to={Route::CaseStudy { slug: study.slug.to_string() }} classes="nav-link">
                                {"Read the case study"}
                            </Link<Route>>
                        </div>
                    }) }
                </div>
            </ScrollReveal>
        </div>
    }
}
