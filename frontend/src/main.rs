use yew::prelude::*;
use yew_router::prelude::*;
use log::{info, Level};
use web_sys::MouseEvent;
use wasm_bindgen::closure::Closure;
use wasm_bindgen::JsCast;

mod components;
mod config;
mod content;
mod lazy;
mod perf;
mod subscription;
mod sw_registration;
mod viewport;
mod pages {
    pub mod case_studies;
    pub mod contact;
    pub mod home;
    pub mod not_found;
    pub mod services;
}

use components::server_timing_widget::ServerTimingWidget;
use lazy::{web_registry, WebRegistry};
use pages::{
    case_studies::{CaseStudies, CaseStudyDetail},
    contact::Contact,
    home::Home,
    not_found::NotFound,
    services::{ServiceDetail, Services},
};

#[derive(Clone, Routable, PartialEq)]
pub enum Route {
    #[at("/")]
    Home,
    #[at("/services")]
    Services,
    #[at("/services/:slug")]
    Service { slug: String },
    #[at("/work")]
    CaseStudies,
    #[at("/work/:slug")]
    CaseStudy { slug: String },
    #[at("/contact")]
    Contact,
    #[not_found]
    #[at("/404")]
    NotFound,
}

fn switch(routes: Route) -> Html {
    match routes {
        Route::Home => {
            info!("Rendering Home page");
            html! { <Home /> }
        },
        Route::Services => {
            info!("Rendering Services page");
            html! { <Services /> }
        },
        Route::Service { slug } => {
            info!("Rendering Service page for {}", slug);
            html! { <ServiceDetail {slug} /> }
        },
        Route::CaseStudies => {
            info!("Rendering Case studies page");
            html! { <CaseStudies /> }
        },
        Route::CaseStudy { slug } => {
            info!("Rendering Case study page for {}", slug);
            html! { <CaseStudyDetail {slug} /> }
        },
        Route::Contact => {
            info!("Rendering Contact page");
            html! { <Contact /> }
        },
        Route::NotFound => html! { <NotFound /> },
    }
}

#[function_component(Nav)]
pub fn nav() -> Html {
    let menu_open = use_state(|| false);
    let is_scrolled = use_state(|| false);

    {
        let is_scrolled = is_scrolled.clone();
        use_effect_with_deps(move |_| {
            let window = web_sys::window();
            let listener = window.as_ref().map(|window| {
                let document = window.document();
                let scroll_callback = Closure::wrap(Box::new(move || {
                    let scroll_top = document
                        .as_ref()
                        .and_then(|d| d.document_element())
                        .map_or(0, |el| el.scroll_top());
                    is_scrolled.set(scroll_top > 80);
                }) as Box<dyn FnMut()>);
                let _ = window.add_event_listener_with_callback("scroll", scroll_callback.as_ref().unchecked_ref());
                scroll_callback
            });

            move || {
                if let (Some(window), Some(listener)) = (window, listener) {
                    let _ = window.remove_event_listener_with_callback("scroll", listener.as_ref().unchecked_ref());
                }
            }
        }, ());
    }

    let toggle_menu = {
        let menu_open = menu_open.clone();
        Callback::from(move |e: MouseEvent| {
            e.prevent_default();
            menu_open.set(!*menu_open);
        })
    };

    let close_menu = {
        let menu_open = menu_open.clone();
        Callback::from(move |_: MouseEvent| {
            menu_open.set(false);
        })
    };

    let menu_class = if *menu_open {
        "nav-right mobile-menu-open"
    } else {
        "nav-right"
    };

    html! {
        <nav class={classes!("top-nav", (*is_scrolled).then(|| "scrolled"))}>
            <div class="nav-content">
                <Link<Route> to={Route::Home} classes="nav-logo">
                    {"kinetic studio"}
                </Link<Route>>

                <button class="burger-menu" onclick={toggle_menu} aria-label="Menu">
                    <span></span>
                    <span></span>
                    <span></span>
                </button>
                <div class={menu_class}>
                    <div onclick={close_menu.clone()}>
                        <Link<Route> to={Route::Services} classes="nav-link">
                            {"Services"}
                        </Link<Route>>
                    </div>
                    <div onclick={close_menu.clone()}>
                        <Link<Route> to={Route::CaseStudies} classes="nav-link">
                            {"Work"}
                        </Link<Route>>
                    </div>
                    <div onclick={close_menu}>
                        <Link<Route> to={Route::Contact} classes="nav-login-button">
                            {"Contact"}
                        </Link<Route>>
                    </div>
                </div>
            </div>
        </nav>
    }
}

#[function_component]
fn App() -> Html {
    let registry = use_memo(|_| web_registry(), ());

    // field metrics for the whole visit, the subscriptions live as long as the app
    use_effect_with_deps(
        |_| {
            let vitals = perf::vitals::start_collecting(config::VITALS_ENDPOINT);
            sw_registration::register_service_worker();
            move || drop(vitals)
        },
        (),
    );

    html! {
        <ContextProvider<WebRegistry> context={(*registry).clone()}>
            <BrowserRouter>
                <Nav />
                <main>
                    <Switch<Route> render={switch} />
                </main>
                <footer class="site-footer">
                    <ServerTimingWidget />
                </footer>
            </BrowserRouter>
        </ContextProvider<WebRegistry>>
    }
}

fn main() {
    // Initialize console error panic hook for better error messages
    console_error_panic_hook::set_once();

    // Initialize logging
    let level = if cfg!(debug_assertions) { Level::Debug } else { Level::Info };
    console_log::init_with_level(level).expect("error initializing log");

    info!("Starting application");
    yew::Renderer::<App>::new().render();
}
