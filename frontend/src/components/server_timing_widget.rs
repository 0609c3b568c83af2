use gloo_net::http::Request;
use log::warn;
use wasm_bindgen_futures::spawn_local;
use yew::prelude::*;
use yew_hooks::use_mount;

use crate::config;
use crate::perf::server_timing::{parse_server_timing, total_duration, ServerTimingEntry};

#[derive(Clone, PartialEq)]
enum Probe {
    Pending,
    Done {
        entries: Vec<ServerTimingEntry>,
        round_trip_ms: f64,
    },
    Failed(String),
}

/// Small footer badge showing where the time of a probe request went,
/// read from the backend's `Server-Timing` header.
#[function_component(ServerTimingWidget)]
pub fn server_timing_widget() -> Html {
    let probe = use_state(|| Probe::Pending);

    {
        let probe = probe.clone();
        use_mount(move || {
            spawn_local(async move {
                let started = js_sys::Date::now();
                let url = format!("{}/api/health", config::get_backend_url());
                match Request::get(&url).send().await {
                    Ok(response) => {
                        let header = response.headers().get("server-timing").unwrap_or_default();
                        probe.set(Probe::Done {
                            entries: parse_server_timing(&header),
                            round_trip_ms: js_sys::Date::now() - started,
                        });
                    }
                    Err(e) => {
                        warn!("server timing probe failed: {}", e);
                        probe.set(Probe::Failed(e.to_string()));
                    }
                }
            });
        });
    }

    let body = match &*probe {
        Probe::Pending => html! { <span class="timing-pending">{"measuring…"}</span> },
        Probe::Failed(_) => html! { <span class="timing-failed">{"server unreachable"}</span> },
        Probe::Done { entries, round_trip_ms } => html! {
            <>
                <span class="timing-total">
                    { format!("{:.0} ms round trip, {:.1} ms on server", round_trip_ms, total_duration(entries)) }
                </span>
                <ul class="timing-entries">
                    { for entries.iter().map(|entry| html! {
                        <li key={entry.name.clone()}>
                            <strong>{ entry.description.clone().unwrap_or_else(|| entry.name.clone()) }</strong>
                            { entry.duration.map(|d| format!(" {:.1} ms", d)).unwrap_or_default() }
                        </li>
                    }) }
                </ul>
            </>
        },
    };

    html! {
        <div class="server-timing-widget" title="Server-Timing">
            { body }
        </div>
    }
}
