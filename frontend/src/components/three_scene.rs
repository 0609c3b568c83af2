use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::str::FromStr;

use log::{error, info};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::Element;
use yew::prelude::*;

use super::js;
use super::LoadFailed;
use crate::lazy::{use_lazy_resource, Resource, ResourceStatus};
use crate::viewport::{use_in_view, ObserveOptions};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SceneComplexity {
    Low,
    #[default]
    Medium,
    High,
}

impl FromStr for SceneComplexity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(SceneComplexity::Low),
            "medium" => Ok(SceneComplexity::Medium),
            "high" => Ok(SceneComplexity::High),
            other => Err(format!("unknown complexity {:?}", other)),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SceneSettings {
    pub complexity: SceneComplexity,
    pub shapes: u32,
    pub detail: u32,
    pub max_pixel_ratio: f64,
    pub antialias: bool,
}

impl SceneSettings {
    pub fn for_complexity(complexity: SceneComplexity) -> Self {
        let (shapes, detail, max_pixel_ratio, antialias) = match complexity {
            SceneComplexity::Low => (4, 0, 1.0, false),
            SceneComplexity::Medium => (8, 1, 1.5, true),
            SceneComplexity::High => (16, 2, 2.0, true),
        };
        Self {
            complexity,
            shapes,
            detail,
            max_pixel_ratio,
            antialias,
        }
    }
}

#[derive(Properties, PartialEq)]
pub struct ThreeSceneProps {
    #[prop_or_default]
    pub complexity: SceneComplexity,
    #[prop_or_default]
    pub class: Classes,
}

/// Decorative WebGL backdrop. three.js is only fetched once the container
/// scrolls into view.
#[function_component(ThreeScene)]
pub fn three_scene(props: &ThreeSceneProps) -> Html {
    let container = use_node_ref();
    let in_view = use_in_view(
        container.clone(),
        ObserveOptions::once(0.1).unwrap_or_default(),
    );
    let visible = in_view.map_or(false, |obs| obs.is_intersecting);
    let three = use_lazy_resource(Resource::Three, visible);

    {
        let container = container.clone();
        let settings = SceneSettings::for_complexity(props.complexity);
        use_effect_with_deps(
            move |module: &Option<JsValue>| {
                let running = match (module, container.cast::<Element>()) {
                    (Some(three), Some(host)) => match Scene::mount(three, &host, settings) {
                        Ok(scene) => Some(scene),
                        Err(err) => {
                            error!("three.js scene failed: {:?}", err);
                            None
                        }
                    },
                    _ => None,
                };
                move || {
                    if let Some(scene) = running {
                        scene.stop();
                    }
                }
            },
            three.status.value().cloned(),
        );
    }

    html! {
        <div class={classes!("three-scene", props.class.clone())} ref={container} aria-hidden="true">
            {
                match &three.status {
                    ResourceStatus::Failed(err) => html! {
                        <LoadFailed what="3D scene" reason={err.to_string()} on_retry={three.retry.clone()} />
                    },
                    ResourceStatus::Loading => html! { <div class="scene-loading"></div> },
                    _ => html! {},
                }
            }
        </div>
    }
}

struct Scene {
    renderer: JsValue,
    stopped: Rc<Cell<bool>>,
    frame: Rc<RefCell<Option<Closure<dyn FnMut()>>>>,
    frame_id: Rc<Cell<i32>>,
}

impl Scene {
    fn mount(three: &JsValue, host: &Element, settings: SceneSettings) -> Result<Self, JsValue> {
        let window = web_sys::window().ok_or_else(|| JsValue::from_str("no window"))?;
        let width = f64::from(host.client_width().max(1));
        let height = f64::from(host.client_height().max(1));

        let renderer = js::construct(
            three,
            "WebGLRenderer",
            &[js::object(&[
                ("antialias", settings.antialias.into()),
                ("alpha", true.into()),
            ])?],
        )?;
        let pixel_ratio = window.device_pixel_ratio().min(settings.max_pixel_ratio);
        js::call(&renderer, "setPixelRatio", &[pixel_ratio.into()])?;
        js::call(&renderer, "setSize", &[width.into(), height.into()])?;
        let canvas: Element = js::get(&renderer, "domElement")?.dyn_into()?;
        host.append_child(&canvas)?;

        let scene = js::construct(three, "Scene", &[])?;
        let camera = js::construct(
            three,
            "PerspectiveCamera",
            &[45.0_f64.into(), (width / height).into(), 0.1_f64.into(), 100.0_f64.into()],
        )?;
        js::set(&js::get(&camera, "position")?, "z", 8.0_f64)?;

        let mut meshes = Vec::with_capacity(settings.shapes as usize);
        for i in 0..settings.shapes {
            let geometry = js::construct(three, "IcosahedronGeometry", &[0.6_f64.into(), settings.detail.into()])?;
            let material = js::construct(
                three,
                "MeshBasicMaterial",
                &[js::object(&[("color", 0x7c5cff_u32.into()), ("wireframe", true.into())])?],
            )?;
            let mesh = js::construct(three, "Mesh", &[geometry, material])?;
            let angle = i as f64 / settings.shapes as f64 * std::f64::consts::TAU;
            let position = js::get(&mesh, "position")?;
            js::set(&position, "x", angle.cos() * 3.0)?;
            js::set(&position, "y", angle.sin() * 1.8)?;
            js::call(&scene, "add", &[mesh.clone()])?;
            meshes.push(mesh);
        }
        info!("three.js scene mounted with {} shapes", meshes.len());

        let stopped = Rc::new(Cell::new(false));
        let frame: Rc<RefCell<Option<Closure<dyn FnMut()>>>> = Rc::new(RefCell::new(None));
        let frame_id = Rc::new(Cell::new(0));
        let tick = {
            let stopped = Rc::clone(&stopped);
            let frame = Rc::clone(&frame);
            let frame_id = Rc::clone(&frame_id);
            let renderer = renderer.clone();
            let window = window.clone();
            Closure::<dyn FnMut()>::new(move || {
                if stopped.get() {
                    return;
                }
                for mesh in &meshes {
                    if let Ok(rotation) = js::get(mesh, "rotation") {
                        for axis in ["x", "y"] {
                            let current = js::get(&rotation, axis).ok().and_then(|v| v.as_f64()).unwrap_or(0.0);
                            let _ = js::set(&rotation, axis, current + 0.005);
                        }
                    }
                }
                let _ = js::call(&renderer, "render", &[scene.clone(), camera.clone()]);
                if let Some(next) = frame.borrow().as_ref() {
                    if let Ok(id) = window.request_animation_frame(next.as_ref().unchecked_ref()) {
                        frame_id.set(id);
                    }
                }
            })
        };
        frame_id.set(window.request_animation_frame(tick.as_ref().unchecked_ref())?);
        *frame.borrow_mut() = Some(tick);

        Ok(Self {
            renderer,
            stopped,
            frame,
            frame_id,
        })
    }

    fn stop(self) {
        self.stopped.set(true);
        if let Some(window) = web_sys::window() {
            let _ = window.cancel_animation_frame(self.frame_id.get());
        }
        // breaks the closure's reference to itself
        self.frame.borrow_mut().take();
        if let Ok(canvas) = js::get(&self.renderer, "domElement").and_then(|c| c.dyn_into::<Element>()) {
            canvas.remove();
        }
        let _ = js::call(&self.renderer, "dispose", &[]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn complexity_parses_case_insensitively() {
        assert_eq!("LOW".parse::<SceneComplexity>(), Ok(SceneComplexity::Low));
        assert_eq!("high".parse::<SceneComplexity>(), Ok(SceneComplexity::High));
        assert!("ultra".parse::<SceneComplexity>().is_err());
        assert_eq!(SceneComplexity::default(), SceneComplexity::Medium);
    }

    #[test]
    fn lower_complexity_means_less_work() {
        let low = SceneSettings::for_complexity(SceneComplexity::Low);
        let high = SceneSettings::for_complexity(SceneComplexity::High);
        assert!(low.shapes < high.shapes);
        assert!(low.max_pixel_ratio <= high.max_pixel_ratio);
        assert!(!low.antialias);
    }

    #[test]
    fn extra_classes_are_optional() {
        let plain = yew::props!(ThreeSceneProps {});
        assert_eq!(plain.complexity, SceneComplexity::Medium);
        assert!(plain.class.is_empty());

        let hero = yew::props!(ThreeSceneProps { class: classes!("hero") });
        assert!(hero.class.contains("hero"));
    }
}
