use yew::prelude::*;
use yew_router::prelude::*;

use crate::Route;

#[function_component(NotFound)]
pub fn not_found() -> Html {
    html! {
        <div class="not-found" style="padding: 8rem 1.5rem; text-align: center;">
            <h1>{"Nothing here"}</h1>
            <p>{"The page you were looking for has moved or never existed."}</p>
            <Link<Route> to={Route::Home} classes="cta-button">{"Back home"}</Link<Route>>
        </div>
    }
}
