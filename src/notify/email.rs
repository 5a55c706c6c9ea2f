// src/notify/email.rs
use anyhow::{anyhow, Context, Result};
use lettre::message::{header, Mailbox, Message};
use lettre::transport::smtp::{authentication::Credentials, AsyncSmtpTransport};
use lettre::{AsyncTransport, Tokio1Executor};

use super::{Sink, Summary};
use crate::record::AnalyzedRecord;

pub struct EmailSink {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Vec<Mailbox>,
}

const REQUIRED: [&str; 5] = ["SMTP_HOST", "SMTP_USER", "SMTP_PASS", "NOTIFY_EMAIL_FROM", "NOTIFY_EMAIL_TO"];

impl EmailSink {
    /// `Ok(None)` when `SMTP_HOST` is unset. Once it is set, every other
    /// variable must be present and valid. `NOTIFY_EMAIL_TO` may list
    /// several comma-separated addresses.
    pub fn from_env() -> Result<Option<Self>> {
        if std::env::var("SMTP_HOST").is_err() {
            return Ok(None);
        }
        let mut vals = Vec::with_capacity(REQUIRED.len());
        for key in REQUIRED {
            let v = std::env::var(key).map_err(|_| anyhow!("{key} missing"))?;
            vals.push(v);
        }
        let [host, user, pass, from_addr, to_addrs]: [String; 5] = vals
            .try_into()
            .map_err(|_| anyhow!("smtp env incomplete"))?;

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::relay(&host)
            .context("invalid SMTP_HOST")?
            .credentials(Credentials::new(user, pass))
            .build();
        let from = from_addr.parse().context("invalid NOTIFY_EMAIL_FROM")?;
        let to = parse_recipients(&to_addrs)?;
        Ok(Some(Self { mailer, from, to }))
    }
}

fn parse_recipients(s: &str) -> Result<Vec<Mailbox>> {
    let to: Vec<Mailbox> = s
        .split(',')
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .map(|a| a.parse().with_context(|| format!("invalid recipient {a}")))
        .collect::<Result<_>>()?;
    if to.is_empty() {
        return Err(anyhow!("NOTIFY_EMAIL_TO has no addresses"));
    }
    Ok(to)
}

pub(crate) fn subject(records: &[AnalyzedRecord]) -> String {
    format!("[grant-radar] {} new announcements", records.len())
}

pub(crate) fn render_text(records: &[AnalyzedRecord]) -> String {
    let s = Summary::new(records);
    let mut body = format!(
        "New announcements: {}\nRecommended: {}\nUrgent (HIGH): {}\nNeeds review: {}\n\n",
        records.len(),
        s.recommended,
        s.high_priority,
        s.needs_review
    );
    for (i, r) in s.by_score.iter().enumerate() {
        body.push_str(&format!(
            "{}. {}\n   Organization: {}\n   Deadline: {}\n   Score: {}/10 ({}), priority {}\n",
            i + 1,
            r.record.title,
            r.record.organization,
            r.record.deadline.format("%Y-%m-%d"),
            r.analysis.score,
            r.analysis.recommendation,
            r.analysis.priority,
        ));
        if let Some(b) = &r.analysis.estimated_budget {
            body.push_str(&format!("   Budget: {b}\n"));
        }
        if !r.analysis.match_reasons.is_empty() {
            body.push_str(&format!("   Why: {}\n", r.analysis.match_reasons.join("; ")));
        }
        if let Some(err) = &r.analysis_error {
            body.push_str(&format!("   Automatic analysis failed: {err}\n"));
        }
        if let Some(url) = &r.record.url {
            body.push_str(&format!("   {url}\n"));
        }
        body.push('\n');
    }
    body
}

#[async_trait::async_trait]
impl Sink for EmailSink {
    fn name(&self) -> &str {
        "email"
    }

    async fn append_new(&self, records: &[AnalyzedRecord]) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }
        let mut builder = Message::builder()
            .from(self.from.clone())
            .subject(subject(records))
            .header(header::ContentType::TEXT_PLAIN);
        for to in &self.to {
            builder = builder.to(to.clone());
        }
        let msg = builder.body(render_text(records)).context("build email")?;

        self.mailer.send(msg).await.context("send email")?;
        Ok(records.len())
    }
}
