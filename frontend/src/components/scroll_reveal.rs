use log::error;
use wasm_bindgen::JsValue;
use web_sys::Element;
use yew::prelude::*;

use super::js;
use crate::lazy::{use_lazy_resource, Resource};
use crate::viewport::{use_in_view, ObserveOptions};

#[derive(Properties, PartialEq)]
pub struct ScrollRevealProps {
    pub children: Children,
    /// Vertical distance in px the content travels while fading in.
    #[prop_or(40.0)]
    pub offset: f64,
    #[prop_or_default]
    pub class: Classes,
}

/// Fades its children in with a GSAP ScrollTrigger tween. GSAP and the plugin
/// are fetched when the section gets close to the viewport; without them the
/// content is simply shown as is.
#[function_component(ScrollReveal)]
pub fn scroll_reveal(props: &ScrollRevealProps) -> Html {
    let section = use_node_ref();
    let options = ObserveOptions::once(0.0)
        .and_then(|opts| opts.with_root_margin("25%"))
        .unwrap_or_default();
    let near = use_in_view(section.clone(), options).map_or(false, |obs| obs.is_intersecting);

    // ScrollTrigger pulls in and registers with gsap itself; gsap is read from the registry
    let trigger = use_lazy_resource(Resource::ScrollTrigger, near);
    let gsap = use_lazy_resource(Resource::Gsap, near);

    {
        let section = section.clone();
        let offset = props.offset;
        let ready = match (gsap.status.value(), trigger.status.value()) {
            (Some(gsap), Some(_)) => Some(gsap.clone()),
            _ => None,
        };
        use_effect_with_deps(
            move |gsap: &Option<JsValue>| {
                let tween = match (gsap, section.cast::<Element>()) {
                    (Some(gsap), Some(el)) => match reveal(gsap, &el, offset) {
                        Ok(tween) => Some(tween),
                        Err(err) => {
                            error!("scroll reveal failed: {:?}", err);
                            None
                        }
                    },
                    _ => None,
                };
                move || {
                    if let Some(tween) = tween {
                        if let Ok(trigger) = js::get(&tween, "scrollTrigger") {
                            if !trigger.is_undefined() {
                                let _ = js::call(&trigger, "kill", &[]);
                            }
                        }
                        let _ = js::call(&tween, "kill", &[]);
                    }
                }
            },
            ready,
        );
    }

    html! {
        <section class={classes!("scroll-reveal", props.class.clone())} ref={section}>
            { for props.children.iter() }
        </section>
    }
}

fn reveal(gsap: &JsValue, el: &Element, offset: f64) -> Result<JsValue, JsValue> {
    let scroll_trigger = js::object(&[
        ("trigger", el.clone().into()),
        ("start", "top 85%".into()),
    ])?;
    let vars = js::object(&[
        ("opacity", 0_i32.into()),
        ("y", offset.into()),
        ("duration", 0.8_f64.into()),
        ("ease", "power2.out".into()),
        ("scrollTrigger", scroll_trigger),
    ])?;
    js::call(gsap, "from", &[el.clone().into(), vars])
}
