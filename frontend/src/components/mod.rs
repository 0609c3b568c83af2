pub mod js;
pub mod lottie_player;
pub mod scroll_reveal;
pub mod server_timing_widget;
pub mod three_scene;

use yew::prelude::*;

#[derive(Properties, PartialEq)]
pub struct LoadFailedProps {
    pub what: AttrValue,
    pub reason: AttrValue,
    pub on_retry: Callback<()>,
}

/// Placeholder shown where a lazily loaded widget could not be loaded.
#[function_component(LoadFailed)]
pub fn load_failed(props: &LoadFailedProps) -> Html {
    let onclick = {
        let on_retry = props.on_retry.clone();
        Callback::from(move |_: MouseEvent| on_retry.emit(()))
    };
    html! {
        <div class="load-failed" role="status" title={props.reason.clone()}>
            <span>{ format!("The {} failed to load.", props.what) }</span>
            <button class="load-failed-retry" {onclick}>{"Try again"}</button>
        </div>
    }
}
