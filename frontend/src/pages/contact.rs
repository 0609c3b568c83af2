use gloo_net::http::Request;
use log::{info, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use wasm_bindgen_futures::spawn_local;
use web_sys::{HtmlInputElement, HtmlSelectElement, HtmlTextAreaElement};
use yew::prelude::*;

use crate::config;
use crate::content::SERVICES;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap()
});

const DRAFT_KEY: &str = "contact-draft";

pub const NAME_MAX: usize = 100;
pub const MESSAGE_MIN: usize = 10;
pub const MESSAGE_MAX: usize = 5000;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ContactForm {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub company: String,
    /// Slug of the service the visitor is asking about, empty for "not sure".
    #[serde(default)]
    pub service: String,
    pub message: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Field {
    Name,
    Email,
    Service,
    Message,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldError {
    pub field: Field,
    pub message: &'static str,
}

impl ContactForm {
    /// Same rules the backend enforces, so most mistakes never leave the page.
    pub fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut errors = Vec::new();
        let mut fail = |field, message| errors.push(FieldError { field, message });

        let name = self.name.trim();
        if name.is_empty() {
            fail(Field::Name, "Please tell us your name");
        } else if name.chars().count() > NAME_MAX {
            fail(Field::Name, "Name is too long");
        }

        if !EMAIL_RE.is_match(self.email.trim()) {
            fail(Field::Email, "That email address doesn't look right");
        }

        if !self.service.is_empty() && !SERVICES.iter().any(|s| s.slug == self.service) {
            fail(Field::Service, "Unknown service");
        }

        let message = self.message.trim().chars().count();
        if message < MESSAGE_MIN {
            fail(Field::Message, "A few more words would help us reply");
        } else if message > MESSAGE_MAX {
            fail(Field::Message, "Message is too long");
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

fn load_draft() -> ContactForm {
    web_sys::window()
        .and_then(|w| w.local_storage().ok().flatten())
        .and_then(|storage| storage.get_item(DRAFT_KEY).ok().flatten())
        .and_then(|raw| serde_json::from_str(&raw).ok())
        .unwrap_or_default()
}

// the draft outlives failed submissions so an offline visitor loses nothing
fn save_draft(form: &ContactForm) {
    if let Some(storage) = web_sys::window().and_then(|w| w.local_storage().ok().flatten()) {
        if let Ok(raw) = serde_json::to_string(form) {
            let _ = storage.set_item(DRAFT_KEY, &raw);
        }
    }
}

fn clear_draft() {
    if let Some(storage) = web_sys::window().and_then(|w| w.local_storage().ok().flatten()) {
        let _ = storage.remove_item(DRAFT_KEY);
    }
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Clone, PartialEq)]
enum Submission {
    Idle,
    Sending,
    Sent,
    Failed(String),
}

#[function_component(Contact)]
pub fn contact() -> Html {
    let form = use_state(load_draft);
    let errors = use_state(Vec::<FieldError>::new);
    let submission = use_state(|| Submission::Idle);

    let update = |apply: fn(&mut ContactForm, String)| {
        let form = form.clone();
        move |value: String| {
            let mut next = (*form).clone();
            apply(&mut next, value);
            save_draft(&next);
            form.set(next);
        }
    };

    let on_name = {
        let set = update(|f, v| f.name = v);
        Callback::from(move |e: InputEvent| {
            let input: HtmlInputElement = e.target_unchecked_into();
            set(input.value());
        })
    };
    let on_email = {
        let set = update(|f, v| f.email = v);
        Callback::from(move |e: InputEvent| {
            let input: HtmlInputElement = e.target_unchecked_into();
            set(input.value());
        })
    };
    let on_company = {
        let set = update(|f, v| f.company = v);
        Callback::from(move |e: InputEvent| {
            let input: HtmlInputElement = e.target_unchecked_into();
            set(input.value());
        })
    };
    let on_service = {
        let set = update(|f, v| f.service = v);
        Callback::from(move |e: Event| {
            let select: HtmlSelectElement = e.target_unchecked_into();
            set(select.value());
        })
    };
    let on_message = {
        let set = update(|f, v| f.message = v);
        Callback::from(move |e: InputEvent| {
            let area: HtmlTextAreaElement = e.target_unchecked_into();
            set(area.value());
        })
    };

    let onsubmit = {
        let form = form.clone();
        let errors = errors.clone();
        let submission = submission.clone();
        Callback::from(move |e: SubmitEvent| {
            e.prevent_default();
            if *submission == Submission::Sending {
                return;
            }
            if let Err(found) = form.validate() {
                errors.set(found);
                return;
            }
            errors.set(Vec::new());
            submission.set(Submission::Sending);

            let payload = (*form).clone();
            let form = form.clone();
            let submission = submission.clone();
            spawn_local(async move {
                let request = match Request::post(&format!("{}/api/contact", config::get_backend_url())).json(&payload) {
                    Ok(request) => request,
                    Err(e) => {
                        submission.set(Submission::Failed(e.to_string()));
                        return;
                    }
                };
                match request.send().await {
                    Ok(response) if response.ok() => {
                        info!("contact request delivered");
                        clear_draft();
                        form.set(ContactForm::default());
                        submission.set(Submission::Sent);
                    }
                    Ok(response) => {
                        let status = response.status();
                        let body = response.text().await.unwrap_or_default();
                        // the service worker's offline fallback is plain text, not JSON
                        let reason = match serde_json::from_str::<ErrorResponse>(&body) {
                            Ok(parsed) => parsed.error,
                            Err(_) if !body.trim().is_empty() => body,
                            Err(_) => format!("Request failed ({})", status),
                        };
                        warn!("contact request rejected with {}: {}", status, reason);
                        submission.set(Submission::Failed(reason));
                    }
                    Err(e) => {
                        warn!("contact request failed: {}", e);
                        submission.set(Submission::Failed(
                            "We couldn't reach the server. Your message is saved, try again when you're back online.".to_string(),
                        ));
                    }
                }
            });
        })
    };

    let error_for = |field: Field| {
        errors
            .iter()
            .find(|err| err.field == field)
            .map(|err| html! { <span class="field-error">{ err.message }</span> })
            .unwrap_or_default()
    };

    html! {
        <div class="contact-page">
            <style>
            {r#".contact-page {
                max-width: 640px;
                margin: 0 auto;
                padding: 6rem 1.5rem 4rem;
            }
            .contact-form label {
                display: block;
                margin-top: 1.25rem;
                color: rgba(255, 255, 255, 0.85);
            }
            .contact-form input,
            .contact-form select,
            .contact-form textarea {
                width: 100%;
                padding: 0.75rem;
                border-radius: 8px;
                border: 1px solid rgba(124, 92, 255, 0.3);
                background: rgba(20, 20, 30, 0.8);
                color: #fff;
            }
            .field-error {
                color: #ff6b6b;
                font-size: 0.85rem;
            }
            .submission-status {
                margin-top: 1.5rem;
            }"#}
            </style>
            <h1>{"Start a project"}</h1>
            <p>{"Tell us what you're building. We answer within two working days."}</p>
            <form class="contact-form" {onsubmit}>
                <label for="contact-name">{"Name"}</label>
                <input id="contact-name" type="text" value={form.name.clone()} oninput={on_name} />
                { error_for(Field::Name) }

                <label for="contact-email">{"Email"}</label>
                <input id="contact-email" type="email" value={form.email.clone()} oninput={on_email} />
                { error_for(Field::Email) }

                <label for="contact-company">{"Company (optional)"}</label>
                <input id="contact-company" type="text" value={form.company.clone()} oninput={on_company} />

                <label for="contact-service">{"What can we help with?"}</label>
                <select id="contact-service" onchange={on_service}>
                    <option value="" selected={form.service.is_empty()}>{"Not sure yet"}</option>
                    { for SERVICES.iter().map(|service| html! {
                        <option value={service.slug} selected={form.service == service.slug}>{ service.title }</option>
                    }) }
                </select>
                { error_for(Field::Service) }

                <label for="contact-message">{"Message"}</label>
                <textarea id="contact-message" rows="6" value={form.message.clone()} oninput={on_message} />
                { error_for(Field::Message) }

                <button type="submit" class="cta-button" disabled={*submission == Submission::Sending}>
                    { if *submission == Submission::Sending { "Sending…" } else { "Send" } }
                </button>
            </form>
            <div class="submission-status">
                {
                    match &*submission {
                        Submission::Sent => html! { <p class="success">{"Thanks! We'll be in touch."}</p> },
                        Submission::Failed(reason) => html! { <p class="field-error">{ reason.clone() }</p> },
                        _ => html! {},
                    }
                }
            </div>
        </div>
    }
}
