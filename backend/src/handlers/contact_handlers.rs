use std::future::Future;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{ConnectInfo, FromRequestParts, State},
    http::{request::Parts, StatusCode},
    response::IntoResponse,
    Json,
};
use governor::{clock::DefaultClock, state::keyed::DefaultKeyedStateStore, Quota, RateLimiter};
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use crate::config::SmtpConfig;
use crate::error::{ApiError, FieldError, MailerError};
use crate::server_timing::{self, SERVER_TIMING};
use crate::AppState;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap()
});

/// Services a visitor can pick on the contact form.
pub const SERVICE_SLUGS: &[&str] = &["web-design", "motion", "3d", "performance"];

pub const NAME_MAX: usize = 100;
pub const COMPANY_MAX: usize = 200;
pub const MESSAGE_MIN: usize = 10;
pub const MESSAGE_MAX: usize = 5000;

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct ContactRequest {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub company: String,
    #[serde(default)]
    pub service: String,
    pub message: String,
}

impl ContactRequest {
    pub fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut errors = Vec::new();
        let mut fail = |field, message| errors.push(FieldError { field, message });

        let name = self.name.trim();
        if name.is_empty() {
            fail("name", "Please tell us your name");
        } else if name.chars().count() > NAME_MAX {
            fail("name", "Name is too long");
        }

        if !EMAIL_RE.is_match(self.email.trim()) {
            fail("email", "That email address doesn't look right");
        }

        if self.company.chars().count() > COMPANY_MAX {
            fail("company", "Company name is too long");
        }

        if !self.service.is_empty() && !SERVICE_SLUGS.contains(&self.service.as_str()) {
            fail("service", "Unknown service");
        }

        let message = self.message.trim().chars().count();
        if message < MESSAGE_MIN {
            fail("message", "A few more words would help us reply");
        } else if message > MESSAGE_MAX {
            fail("message", "Message is too long");
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    fn subject(&self) -> String {
        match self.service.as_str() {
            "" => format!("New enquiry from {}", self.name.trim()),
            service => format!("New {} enquiry from {}", service, self.name.trim()),
        }
    }

    fn body(&self) -> String {
        let company = if self.company.trim().is_empty() { "-" } else { self.company.trim() };
        format!(
            "Name: {}\nEmail: {}\nCompany: {}\nService: {}\n\n{}\n",
            self.name.trim(),
            self.email.trim(),
            company,
            if self.service.is_empty() { "not sure" } else { self.service.as_str() },
            self.message.trim()
        )
    }
}

pub type ContactLimiter = RateLimiter<IpAddr, DefaultKeyedStateStore<IpAddr>, DefaultClock>;

pub fn contact_limiter(per_minute: NonZeroU32) -> ContactLimiter {
    RateLimiter::keyed(Quota::per_minute(per_minute))
}

/// Where accepted contact requests end up.
pub enum Mailer {
    Smtp {
        transport: AsyncSmtpTransport<Tokio1Executor>,
        from: Mailbox,
        inbox: Mailbox,
    },
    /// No SMTP configured: requests are only logged.
    Log,
    #[cfg(test)]
    Memory(std::sync::Mutex<Vec<ContactRequest>>),
}

impl Mailer {
    pub fn from_config(smtp: Option<&SmtpConfig>) -> Result<Self, MailerError> {
        let Some(smtp) = smtp else {
            warn!("SMTP is not configured, contact requests will only be logged");
            return Ok(Mailer::Log);
        };
        let from = smtp
            .from
            .parse::<Mailbox>()
            .map_err(|source| MailerError::Address { key: "CONTACT_FROM", source })?;
        let inbox = smtp
            .inbox
            .parse::<Mailbox>()
            .map_err(|source| MailerError::Address { key: "CONTACT_INBOX", source })?;
        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&smtp.host)
            .map_err(|source| MailerError::Relay {
                host: smtp.host.clone(),
                source,
            })?
            .credentials(Credentials::new(smtp.username.clone(), smtp.password.clone()))
            .build();
        Ok(Mailer::Smtp { transport, from, inbox })
    }

    pub async fn deliver(&self, request: &ContactRequest) -> Result<(), ApiError> {
        match self {
            Mailer::Smtp { transport, from, inbox } => {
                let mut builder = Message::builder()
                    .from(from.clone())
                    .to(inbox.clone())
                    .subject(request.subject())
                    .header(ContentType::TEXT_PLAIN);
                if let Ok(address) = request.email.trim().parse() {
                    builder = builder.reply_to(Mailbox::new(Some(request.name.trim().to_string()), address));
                }
                let email = builder
                    .body(request.body())
                    .map_err(|e| ApiError::Delivery(e.to_string()))?;
                transport
                    .send(email)
                    .await
                    .map_err(|e| ApiError::Delivery(e.to_string()))?;
                Ok(())
            }
            Mailer::Log => {
                info!(
                    name = %request.name.trim(),
                    email = %request.email.trim(),
                    service = %request.service,
                    "contact request:\n{}",
                    request.message.trim()
                );
                Ok(())
            }
            #[cfg(test)]
            Mailer::Memory(sent) => {
                sent.lock().unwrap().push(request.clone());
                Ok(())
            }
        }
    }
}

/// Resolves the visitor's address. `X-Forwarded-For` only counts when the
/// socket peer is a trusted proxy; hops are read right to left, skipping
/// further trusted proxies, and the first other address wins.
pub fn client_ip(peer: Option<IpAddr>, forwarded: Option<&str>, trusted: &[IpAddr]) -> IpAddr {
    let Some(peer) = peer else {
        return IpAddr::V4(Ipv4Addr::UNSPECIFIED);
    };
    if !trusted.contains(&peer) {
        return peer;
    }
    for hop in forwarded.unwrap_or_default().rsplit(',') {
        match hop.trim().parse::<IpAddr>() {
            Ok(ip) if trusted.contains(&ip) => continue,
            Ok(ip) => return ip,
            Err(_) => break,
        }
    }
    peer
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClientIp(pub IpAddr);

impl FromRequestParts<Arc<AppState>> for ClientIp {
    type Rejection = std::convert::Infallible;

    fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> impl Future<Output = Result<Self, Self::Rejection>> + Send {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());
        let forwarded = parts
            .headers
            .get("x-forwarded-for")
            .and_then(|value| value.to_str().ok());
        let ip = client_ip(peer, forwarded, &state.trusted_proxies);

        async move { Ok(ClientIp(ip)) }
    }
}

pub async fn submit_contact(
    State(state): State<Arc<AppState>>,
    ClientIp(ip): ClientIp,
    payload: Result<Json<ContactRequest>, axum::extract::rejection::JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(request) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    if state.contact_limiter.check_key(&ip).is_err() {
        warn!("contact rate limit hit for {}", ip);
        return Err(ApiError::RateLimited);
    }

    request.validate().map_err(ApiError::Validation)?;

    let started = Instant::now();
    state.mailer.deliver(&request).await?;
    let timing = server_timing::entry("mail", started.elapsed(), "Delivery");

    info!("contact request from {} accepted", ip);
    Ok((
        StatusCode::ACCEPTED,
        [(SERVER_TIMING.clone(), timing)],
        Json(json!({ "status": "received" })),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled() -> ContactRequest {
        ContactRequest {
            name: "Ada".into(),
            email: "ada@example.com".into(),
            company: "Analytical Engines".into(),
            service: "3d".into(),
            message: "We'd like a product configurator.".into(),
        }
    }

    #[test]
    fn accepts_complete_request() {
        assert_eq!(filled().validate(), Ok(()));
        assert_eq!(ContactRequest { service: String::new(), ..filled() }.validate(), Ok(()));
    }

    #[test]
    fn reports_each_invalid_field() {
        let request = ContactRequest {
            name: "".into(),
            email: "not-an-email".into(),
            company: "x".repeat(COMPANY_MAX + 1),
            service: "catering".into(),
            message: "hi".into(),
        };
        let fields: Vec<_> = request.validate().unwrap_err().into_iter().map(|e| e.field).collect();
        assert_eq!(fields, vec!["name", "email", "company", "service", "message"]);
    }

    #[test]
    fn mail_body_names_the_service() {
        let request = filled();
        assert_eq!(request.subject(), "New 3d enquiry from Ada");
        assert!(request.body().contains("Company: Analytical Engines"));
        let unsure = ContactRequest { service: String::new(), company: " ".into(), ..filled() };
        assert_eq!(unsure.subject(), "New enquiry from Ada");
        assert!(unsure.body().contains("Service: not sure"));
        assert!(unsure.body().contains("Company: -"));
    }

    #[test]
    fn mailer_rejects_bad_addresses() {
        let smtp = SmtpConfig {
            host: "smtp.example".into(),
            username: "u".into(),
            password: "p".into(),
            from: "not an address".into(),
            inbox: "team@studio.example".into(),
        };
        assert!(matches!(
            Mailer::from_config(Some(&smtp)),
            Err(MailerError::Address { key: "CONTACT_FROM", .. })
        ));
        assert!(matches!(Mailer::from_config(None), Ok(Mailer::Log)));
    }

    #[test]
    fn forwarded_header_needs_a_trusted_peer() {
        let proxy: IpAddr = "10.0.0.1".parse().unwrap();
        let visitor: IpAddr = "203.0.113.9".parse().unwrap();

        // untrusted peers cannot pick their own address
        assert_eq!(client_ip(Some(visitor), Some("198.51.100.1"), &[]), visitor);
        assert_eq!(client_ip(Some(visitor), Some("198.51.100.1"), &[proxy]), visitor);

        // behind the proxy the nearest untrusted hop wins, spoofed prefixes are ignored
        assert_eq!(client_ip(Some(proxy), Some("198.51.100.1, 203.0.113.9"), &[proxy]), visitor);
        assert_eq!(client_ip(Some(proxy), Some("203.0.113.9, 10.0.0.1"), &[proxy]), visitor);
        assert_eq!(client_ip(Some(proxy), Some("garbage"), &[proxy]), proxy);
        assert_eq!(client_ip(Some(proxy), None, &[proxy]), proxy);

        assert_eq!(client_ip(None, Some("198.51.100.1"), &[proxy]), IpAddr::V4(Ipv4Addr::UNSPECIFIED));
    }

    #[test]
    fn limiter_is_per_address() {
        let limiter = contact_limiter(NonZeroU32::new(2).unwrap());
        let a: IpAddr = "203.0.113.1".parse().unwrap();
        let b: IpAddr = "203.0.113.2".parse().unwrap();
        assert!(limiter.check_key(&a).is_ok());
        assert!(limiter.check_key(&a).is_ok());
        assert!(limiter.check_key(&a).is_err());
        assert!(limiter.check_key(&b).is_ok());
    }
}
