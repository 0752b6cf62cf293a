//! src/email_client.rs

use crate::configuration::SmtpConfig;
use crate::error::error_chain_fmt;
use lettre::message::{Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::client::{Tls, TlsParameters};
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use secrecy::ExposeSecret;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use tera::{Context, Tera};

#[derive(thiserror::Error)]
pub enum EmailError {
    #[error("Template folder `{0}` does not exist.")]
    MissingTemplateFolder(PathBuf),
    #[error("Failed to load mail templates.")]
    TemplateLoadError(#[source] tera::Error),
    #[error("Failed to render mail template `{name}`.")]
    RenderError {
        name: String,
        #[source]
        source: tera::Error,
    },
    #[error("`{0}` is not a valid recipient.")]
    InvalidRecipient(String),
    #[error("Failed to build mail message.")]
    BuildError(#[from] lettre::error::Error),
    #[error("Failed to send mail.")]
    TransportError(#[from] lettre::transport::smtp::Error),
}

impl std::fmt::Debug for EmailError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

/// Rendered mail, ready for dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailMessage {
    pub subject: String,
    pub recipients: Vec<Mailbox>,
    pub html_body: String,
    pub alternative_body: Option<String>,
}

impl MailMessage {
    pub fn to_message(&self, sender: &Mailbox) -> Result<Message, EmailError> {
        let mut builder = Message::builder()
            .from(sender.clone())
            .subject(self.subject.clone());
        for recipient in self.recipients.iter() {
            builder = builder.to(recipient.clone());
        }
        let message = match &self.alternative_body {
            Some(plain) => builder.multipart(MultiPart::alternative_plain_html(
                plain.clone(),
                self.html_body.clone(),
            ))?,
            None => builder.singlepart(SinglePart::html(self.html_body.clone()))?,
        };
        Ok(message)
    }
}

#[derive(Clone)]
enum Transport {
    Smtp(AsyncSmtpTransport<Tokio1Executor>),
    /// keeps messages in memory instead of sending them
    Outbox(Arc<Mutex<Vec<MailMessage>>>),
}

#[derive(Clone)]
pub struct EmailClient {
    sender: Mailbox,
    templates: Arc<Tera>,
    transport: Transport,
    debug: bool,
}

impl std::fmt::Debug for EmailClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let transport = match self.transport {
            Transport::Smtp(_) => "smtp",
            Transport::Outbox(_) => "outbox",
        };
        f.debug_struct("EmailClient")
            .field("sender", &self.sender)
            .field("transport", &transport)
            .field("debug", &self.debug)
            .finish()
    }
}

impl EmailClient {
    pub fn new(config: &SmtpConfig) -> Result<Self, EmailError> {
        if !config.template_folder.is_dir() {
            return Err(EmailError::MissingTemplateFolder(
                config.template_folder.clone(),
            ));
        }
        let glob = format!("{}/**/*", config.template_folder.display());
        let templates = Tera::new(&glob).map_err(EmailError::TemplateLoadError)?;
        let transport = if config.suppress_send {
            Transport::Outbox(Arc::new(Mutex::new(Vec::new())))
        } else {
            Transport::Smtp(smtp_transport(config)?)
        };
        Ok(Self {
            sender: config.sender.clone(),
            templates: Arc::new(templates),
            transport,
            debug: config.debug,
        })
    }

    /// Messages recorded so far; empty when sending through SMTP.
    pub fn outbox(&self) -> Vec<MailMessage> {
        match &self.transport {
            Transport::Outbox(outbox) => outbox
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone(),
            Transport::Smtp(_) => Vec::new(),
        }
    }

    /// Render `template_name` and its optional `.txt` sibling with `context` and send the result.
    #[tracing::instrument(name = "Send mail from template", skip(self, context))]
    pub async fn send_with_template(
        &self,
        subject: &str,
        recipients: &[&str],
        template_name: &str,
        context: &Context,
    ) -> Result<(), EmailError> {
        let alternative_name = template_name.replace(".html", ".txt");
        let alternative_body = match self.templates.render(&alternative_name, context) {
            Ok(body) => Some(body),
            Err(e) if matches!(e.kind, tera::ErrorKind::TemplateNotFound(_)) => None,
            Err(source) => {
                return Err(EmailError::RenderError {
                    name: alternative_name,
                    source,
                })
            }
        };
        let html_body =
            self.templates
                .render(template_name, context)
                .map_err(|source| EmailError::RenderError {
                    name: template_name.to_string(),
                    source,
                })?;
        let recipients = recipients
            .iter()
            .map(|r| {
                r.parse::<Mailbox>()
                    .map_err(|_| EmailError::InvalidRecipient(r.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        self.send_message(MailMessage {
            subject: subject.to_string(),
            recipients,
            html_body,
            alternative_body,
        })
        .await
    }

    pub async fn send_message(&self, message: MailMessage) -> Result<(), EmailError> {
        if self.debug {
            tracing::debug!(mail = ?message, "Outgoing mail");
        }
        match &self.transport {
            Transport::Smtp(transport) => {
                transport.send(message.to_message(&self.sender)?).await?;
            }
            Transport::Outbox(outbox) => {
                // build anyway, so malformed messages fail like they would on SMTP
                message.to_message(&self.sender)?;
                outbox
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(message);
            }
        }
        Ok(())
    }
}

fn smtp_transport(config: &SmtpConfig) -> Result<AsyncSmtpTransport<Tokio1Executor>, EmailError> {
    let mut builder = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.server)
        .port(config.port)
        .timeout(Some(config.timeout));
    if config.ssl_tls || config.starttls {
        let parameters = TlsParameters::builder(config.server.clone())
            .dangerous_accept_invalid_certs(!config.validate_certs)
            .build()?;
        builder = builder.tls(if config.ssl_tls {
            Tls::Wrapper(parameters)
        } else {
            Tls::Required(parameters)
        });
    } else {
        builder = builder.tls(Tls::None);
    }
    if config.use_credentials {
        builder = builder.credentials(Credentials::new(
            config.username.clone(),
            config.password.expose_secret().clone(),
        ));
    }
    Ok(builder.build())
}
