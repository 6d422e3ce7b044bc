// SPDX-FileCopyrightText: 2026 Sluice Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SMTP destination for the sluice log service.
//!
//! Each message becomes one mail: subject `Log <Category> from <source>`,
//! body the canonical formatted line. Transport trouble never propagates as
//! a delivery failure: the sink demotes the message to a console record and
//! reports success.

use async_trait::async_trait;
use lettre::message::Mailbox;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use sluice_config::EmailConfig;
use sluice_core::{Category, ConsoleSink, LogMessage, LogSink, RetentionCutoffs, SluiceError};
use tracing::warn;

/// A [`LogSink`] relaying messages to an SMTP host, one mail per message.
pub struct EmailSink {
    config: EmailConfig,
    target: Option<String>,
    transport: Option<AsyncSmtpTransport<Tokio1Executor>>,
    console: ConsoleSink,
}

impl EmailSink {
    /// Create a sink for the given SMTP relay settings. No recipient is
    /// configured yet; `set_target` must run before the first write.
    pub fn new(config: EmailConfig) -> Self {
        EmailSink {
            config,
            target: None,
            transport: None,
            console: ConsoleSink::new(),
        }
    }

    async fn send(&self, target: &str, message: &LogMessage) -> Result<(), SluiceError> {
        let email = Message::builder()
            .from(self.config.from_address.parse::<Mailbox>().map_err(email_err)?)
            .to(target.parse::<Mailbox>().map_err(email_err)?)
            .subject(format!("Log {} from {}", message.category, message.source))
            .body(message.format_line())
            .map_err(email_err)?;

        let Some(transport) = self.transport.as_ref() else {
            return Err(SluiceError::Internal(
                "email transport missing after open".to_string(),
            ));
        };
        transport.send(email).await.map_err(email_err)?;
        Ok(())
    }
}

#[async_trait]
impl LogSink for EmailSink {
    fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }

    /// The destination is a recipient address, validated on assignment.
    fn set_target(&mut self, target: &str) -> Result<(), SluiceError> {
        target
            .parse::<lettre::Address>()
            .map_err(|err| SluiceError::InvalidTarget {
                sink: "email",
                reason: format!("`{target}` is not a valid email address: {err}"),
            })?;
        self.target = Some(target.to_string());
        Ok(())
    }

    async fn open(&mut self) -> Result<(), SluiceError> {
        if self.transport.is_none() {
            self.transport = Some(
                AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&self.config.smtp_host)
                    .port(self.config.smtp_port)
                    .build(),
            );
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<(), SluiceError> {
        self.transport = None;
        Ok(())
    }

    async fn write(&mut self, message: &LogMessage) -> Result<(), SluiceError> {
        let Some(target) = self.target.clone() else {
            return Err(SluiceError::MissingTarget { sink: "email" });
        };
        self.open().await?;

        match self.send(&target, message).await {
            Ok(()) => Ok(()),
            Err(err) => {
                warn!(%err, recipient = %target, "email delivery failed, demoting to console");
                let notice = LogMessage::new(
                    Category::FatalError,
                    "email sink",
                    format!("Failed to write message: {err}"),
                );
                self.console.write(&notice).await
            }
        }
    }

    async fn clean_up(
        &mut self,
        _max_size_kb: u64,
        _max_generations: u32,
        _cutoffs: Option<&RetentionCutoffs>,
    ) -> Result<(), SluiceError> {
        Err(SluiceError::Unsupported {
            sink: "email",
            op: "clean_up",
        })
    }
}

fn email_err<E>(err: E) -> SluiceError
where
    E: std::error::Error + Send + Sync + 'static,
{
    SluiceError::Email {
        source: Box::new(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn relay_config(port: u16) -> EmailConfig {
        EmailConfig {
            smtp_host: "127.0.0.1".to_string(),
            smtp_port: port,
            from_address: "logger@example.com".to_string(),
        }
    }

    #[tokio::test]
    async fn set_target_validates_the_address() {
        let mut sink = EmailSink::new(relay_config(25));
        assert!(matches!(
            sink.set_target("wibble"),
            Err(SluiceError::InvalidTarget { sink: "email", .. })
        ));
        assert!(matches!(
            sink.set_target(""),
            Err(SluiceError::InvalidTarget { sink: "email", .. })
        ));

        sink.set_target("ops@example.com").unwrap();
        assert_eq!(sink.target(), Some("ops@example.com"));
    }

    #[tokio::test]
    async fn write_without_target_is_a_usage_error() {
        let mut sink = EmailSink::new(relay_config(25));
        let message = LogMessage::new(Category::Information, "svc", "hello");
        assert!(matches!(
            sink.write(&message).await,
            Err(SluiceError::MissingTarget { sink: "email" })
        ));
    }

    #[tokio::test]
    async fn open_and_close_are_idempotent() {
        let mut sink = EmailSink::new(relay_config(25));
        sink.close().await.unwrap();
        sink.open().await.unwrap();
        sink.open().await.unwrap();
        sink.close().await.unwrap();
        sink.close().await.unwrap();
    }

    #[tokio::test]
    async fn clean_up_is_unsupported() {
        let mut sink = EmailSink::new(relay_config(25));
        assert!(matches!(
            sink.clean_up(1, 1, None).await,
            Err(SluiceError::Unsupported {
                sink: "email",
                op: "clean_up"
            })
        ));
    }

    #[tokio::test]
    async fn transport_failure_degrades_to_console_and_succeeds() {
        // Port 1 on loopback refuses immediately; the sink must swallow the
        // failure after writing the console notice.
        let mut sink = EmailSink::new(relay_config(1));
        sink.set_target("ops@example.com").unwrap();

        let message = LogMessage::new(Category::FatalError, "svc", "disk on fire");
        assert!(sink.write(&message).await.is_ok());
    }
}
