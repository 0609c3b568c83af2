use std::cell::{Cell, RefCell};
use std::rc::Rc;

use gloo_net::http::Request;
use log::{error, warn};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use wasm_bindgen::JsValue;
use wasm_bindgen_futures::spawn_local;
use web_sys::Element;
use yew::prelude::*;

use super::js;
use super::LoadFailed;
use crate::lazy::{use_lazy_resource, Resource, ResourceStatus};
use crate::viewport::{use_in_view, ObserveOptions};

#[derive(Debug, Error, PartialEq)]
pub enum AnimationDataError {
    #[error("could not fetch animation: {0}")]
    Fetch(String),
    #[error("animation data is not a JSON object")]
    NotAnObject,
    #[error("animation data is missing {0:?}")]
    MissingField(&'static str),
    #[error("animation has no layers")]
    NoLayers,
    #[error("container was removed before the animation arrived")]
    ContainerDetached,
}

const REQUIRED_FIELDS: [&str; 5] = ["v", "fr", "ip", "op", "layers"];

/// Checks that parsed JSON looks like a Bodymovin export before it is handed
/// to the player, which would otherwise throw deep inside its renderer.
pub fn validate_animation_data(data: &Value) -> Result<(), AnimationDataError> {
    let object = data.as_object().ok_or(AnimationDataError::NotAnObject)?;
    for field in REQUIRED_FIELDS {
        if !object.contains_key(field) {
            return Err(AnimationDataError::MissingField(field));
        }
    }
    match object.get("layers").and_then(Value::as_array) {
        Some(layers) if !layers.is_empty() => Ok(()),
        _ => Err(AnimationDataError::NoLayers),
    }
}

#[derive(Serialize)]
struct PlayerOptions<'a> {
    renderer: &'a str,
    #[serde(rename = "loop")]
    looped: bool,
    autoplay: bool,
}

#[derive(Properties, PartialEq)]
pub struct LottiePlayerProps {
    pub src: AttrValue,
    #[prop_or(true)]
    pub looped: bool,
    #[prop_or(true)]
    pub autoplay: bool,
    #[prop_or_default]
    pub class: Classes,
}

#[function_component(LottiePlayer)]
pub fn lottie_player(props: &LottiePlayerProps) -> Html {
    let container = use_node_ref();
    let options = ObserveOptions::once(0.0)
        .and_then(|opts| opts.with_root_margin("200px"))
        .unwrap_or_default();
    let in_view = use_in_view(container.clone(), options);
    let visible = in_view.map_or(false, |obs| obs.is_intersecting);
    let lottie = use_lazy_resource(Resource::Lottie, visible);

    {
        let container = container.clone();
        let src = props.src.clone();
        let (looped, autoplay) = (props.looped, props.autoplay);
        use_effect_with_deps(
            move |module: &Option<JsValue>| {
                let animation: Rc<RefCell<Option<JsValue>>> = Rc::new(RefCell::new(None));
                let cancelled = Rc::new(Cell::new(false));
                if let Some(lottie) = module.clone() {
                    let animation = Rc::clone(&animation);
                    let cancelled = Rc::clone(&cancelled);
                    spawn_local(async move {
                        let result = async {
                            let data = fetch_animation(&src).await?;
                            validate_animation_data(&data)?;
                            let host = container
                                .cast::<Element>()
                                .filter(|el| el.is_connected() && !cancelled.get())
                                .ok_or(AnimationDataError::ContainerDetached)?;
                            Ok::<_, AnimationDataError>((host, data))
                        }
                        .await;

                        match result {
                            Ok((host, data)) => match start(&lottie, &host, &data, looped, autoplay) {
                                Ok(handle) => *animation.borrow_mut() = Some(handle),
                                Err(err) => error!("lottie player rejected {}: {:?}", src, err),
                            },
                            // the widget just stays empty
                            Err(err) => warn!("animation {} skipped: {}", src, err),
                        }
                    });
                }
                move || {
                    cancelled.set(true);
                    if let Some(handle) = animation.borrow_mut().take() {
                        let _ = js::call(&handle, "destroy", &[]);
                    }
                }
            },
            lottie.status.value().cloned(),
        );
    }

    html! {
        <div class={classes!("lottie-player", lottie.status.is_loading().then_some("is-loading"), props.class.clone())} ref={container}>
            {
                if let ResourceStatus::Failed(err) = &lottie.status {
                    html! { <LoadFailed what="animation" reason={err.to_string()} on_retry={lottie.retry.clone()} /> }
                } else {
                    html! {}
                }
            }
        </div>
    }
}

async fn fetch_animation(src: &str) -> Result<Value, AnimationDataError> {
    let response = Request::get(src)
        .send()
        .await
        .map_err(|e| AnimationDataError::Fetch(e.to_string()))?;
    if !response.ok() {
        return Err(AnimationDataError::Fetch(format!("HTTP {}", response.status())));
    }
    response
        .json::<Value>()
        .await
        .map_err(|e| AnimationDataError::Fetch(e.to_string()))
}

fn start(lottie: &JsValue, host: &Element, data: &Value, looped: bool, autoplay: bool) -> Result<JsValue, JsValue> {
    let serializer = serde_wasm_bindgen::Serializer::json_compatible();
    let options = PlayerOptions {
        renderer: "svg",
        looped,
        autoplay,
    }
    .serialize(&serializer)
    .map_err(JsValue::from)?;
    js::set(&options, "container", host.clone())?;
    js::set(&options, "animationData", data.serialize(&serializer).map_err(JsValue::from)?)?;
    js::call(lottie, "loadAnimation", &[options])
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accepts_bodymovin_exports() {
        let data = json!({"v": "5.7.4", "fr": 30, "ip": 0, "op": 90, "w": 200, "h": 200, "layers": [{"ty": 4}]});
        assert_eq!(validate_animation_data(&data), Ok(()));
    }

    #[test]
    fn rejects_json_that_is_not_an_animation() {
        assert_eq!(validate_animation_data(&json!([1, 2])), Err(AnimationDataError::NotAnObject));
        assert_eq!(
            validate_animation_data(&json!({"v": "5", "fr": 30, "ip": 0, "layers": []})),
            Err(AnimationDataError::MissingField("op"))
        );
        assert_eq!(
            validate_animation_data(&json!({"v": "5", "fr": 30, "ip": 0, "op": 1, "layers": []})),
            Err(AnimationDataError::NoLayers)
        );
        assert_eq!(
            validate_animation_data(&json!({"v": "5", "fr": 30, "ip": 0, "op": 1, "layers": "x"})),
            Err(AnimationDataError::NoLayers)
        );
    }
}
