#![warn(
    missing_debug_implementations,
    rust_2018_idioms,
    missing_docs,
    rustdoc::broken_intra_doc_links,
    rustdoc::missing_crate_level_docs
)]

//! Submit a single message from the command line

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use clap::Parser;
use mail_submit::{
    domain::mail::{File, Message},
    infrastructure::email::smtp::{Sender, SmtpConfig},
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Command-line arguments / environment variables
#[derive(Debug, Parser)]
pub struct Args {
    /// The SMTP configuration
    #[clap(flatten)]
    pub smtp: SmtpConfig,

    /// Read the message from a JSON file; the flags below override its fields
    #[arg(long)]
    pub message: Option<PathBuf>,

    /// The sender mailbox
    #[arg(long)]
    pub from: Option<String>,

    /// Comma separated recipient mailboxes
    #[arg(long)]
    pub to: Option<String>,

    /// Comma separated carbon copy mailboxes
    #[arg(long)]
    pub cc: Option<String>,

    /// The subject line
    #[arg(long)]
    pub subject: Option<String>,

    /// The plain text body
    #[arg(long)]
    pub text: Option<String>,

    /// The HTML body, ignored when a text body is given
    #[arg(long)]
    pub html: Option<String>,

    /// Files to show inline
    #[arg(long)]
    pub inline: Vec<PathBuf>,

    /// Files to attach
    #[arg(long)]
    pub attach: Vec<PathBuf>,

    /// Domain used when generating a Message-ID
    #[arg(long, env = "MESSAGE_ID_DOMAIN", default_value = "localhost")]
    pub message_id_domain: String,
}

impl Args {
    fn message(&self) -> Result<Message> {
        let mut message = match &self.message {
            Some(path) => {
                let json = fs::read_to_string(path)
                    .with_context(|| format!("failed to read {}", path.display()))?;

                serde_json::from_str(&json)
                    .with_context(|| format!("failed to parse {}", path.display()))?
            }
            None => Message::default(),
        };

        if let Some(from) = &self.from {
            message.from = from.clone();
        }
        if let Some(to) = &self.to {
            message.to = to.clone();
        }
        if self.cc.is_some() {
            message.cc = self.cc.clone();
        }
        if let Some(subject) = &self.subject {
            message.subject = subject.clone();
        }
        if self.text.is_some() {
            message.body_text = self.text.clone();
        }
        if self.html.is_some() {
            message.body_html = self.html.clone();
        }
        if message.id.is_empty() {
            message.id = Message::generate_id(&self.message_id_domain);
        }

        for path in &self.inline {
            message.inlines.push(read_file(path)?);
        }
        for path in &self.attach {
            message.attachments.push(read_file(path)?);
        }

        Ok(message)
    }
}

fn read_file(path: &Path) -> Result<File> {
    let bytes = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;

    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .with_context(|| format!("{} has no file name", path.display()))?;

    let content_type = mime_guess::from_path(path).first_or_octet_stream();

    Ok(File::from_bytes(name, content_type.essence_str(), bytes))
}

#[mutants::skip]
fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let message = args.message()?;

    let sender = Sender::new(args.smtp);

    info!(
        server = %sender.config().address,
        message_id = %message.id,
        "submitting message"
    );

    if let Err(e) = sender.send(&message) {
        error!(stage = %e.stage(), error = %e, "submission failed");

        return Err(e.into());
    }

    Ok(())
}
