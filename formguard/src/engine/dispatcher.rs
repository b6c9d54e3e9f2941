// formguard/src/engine/dispatcher.rs
//
// Appends admission decisions to JSONL files in the output directory.
//   Accepted       → leads.jsonl
//   SpamSuppressed → spam_quarantine.jsonl
//   RateLimited    → rate_limited.jsonl
// Every decision also lands in audit_log.jsonl.
// Point the CRM forwarder / review queue at these files in production.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::events::{Decision, Outcome};

pub const LEADS_FILE:      &str = "leads.jsonl";
pub const QUARANTINE_FILE: &str = "spam_quarantine.jsonl";
pub const RATE_LIMIT_FILE: &str = "rate_limited.jsonl";
pub const AUDIT_FILE:      &str = "audit_log.jsonl";

pub struct Dispatcher {
    out: PathBuf,
}

impl Dispatcher {
    pub fn new(output_dir: impl Into<PathBuf>) -> Result<Self> {
        let out: PathBuf = output_dir.into();
        std::fs::create_dir_all(&out)
            .with_context(|| format!("creating output directory {}", out.display()))?;
        Ok(Self { out })
    }

    pub fn output_dir(&self) -> &Path { &self.out }

    pub async fn dispatch(&self, decision: &Decision) -> Result<()> {
        let line = decision.to_jsonl() + "\n";
        let file = match decision.outcome {
            Outcome::Accepted       => LEADS_FILE,
            Outcome::SpamSuppressed => QUARANTINE_FILE,
            Outcome::RateLimited    => RATE_LIMIT_FILE,
        };
        self.write(file, &line).await?;
        self.write(AUDIT_FILE, &line).await?;
        debug!(outcome = %decision.outcome, file, "decision written");
        Ok(())
    }

    async fn write(&self, file: &str, content: &str) -> Result<()> {
        let path = self.out.join(file);
        let mut f = OpenOptions::new().create(true).append(true)
            .open(&path).await
            .with_context(|| format!("opening {}", path.display()))?;
        f.write_all(content.as_bytes()).await?;
        Ok(())
    }
}
