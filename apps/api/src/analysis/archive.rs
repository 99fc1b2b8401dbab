//! Optional Markdown copies of each report in an S3-compatible bucket.

use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use chrono::{DateTime, Utc};
use tracing::info;

use crate::models::analysis::AnalysisReport;

/// Stores a rendered report and returns the object key.
#[async_trait]
pub trait ReportArchive: Send + Sync {
    async fn store(&self, user_id: &str, entry_id: &str, markdown: String) -> anyhow::Result<String>;
}

pub struct S3ReportArchive {
    client: aws_sdk_s3::Client,
    bucket: String,
}

impl S3ReportArchive {
    pub fn new(client: aws_sdk_s3::Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }
}

pub fn archive_key(user_id: &str, entry_id: &str) -> String {
    format!("reports/{user_id}/{entry_id}.md")
}

#[async_trait]
impl ReportArchive for S3ReportArchive {
    async fn store(&self, user_id: &str, entry_id: &str, markdown: String) -> anyhow::Result<String> {
        let key = archive_key(user_id, entry_id);
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(ByteStream::from(markdown.into_bytes()))
            .content_type("text/markdown")
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("S3 upload failed: {e}"))?;

        info!("Uploaded analysis report to s3://{}/{}", self.bucket, key);
        Ok(key)
    }
}

/// Renders a report as a Markdown document, one section per category.
pub fn render_report_markdown(
    user_id: &str,
    report: &AnalysisReport,
    model: &str,
    generated_at: DateTime<Utc>,
) -> String {
    let mut md = format!("# Career Analysis: {user_id}\n\n");
    md.push_str(&format!(
        "_Generated {} by {model}_\n\n",
        generated_at.format("%Y-%m-%d %H:%M UTC")
    ));
    if !report.summary.is_empty() {
        md.push_str(&format!("{}\n\n", report.summary));
    }

    for category in &report.categories {
        md.push_str(&format!("## {}\n\n", category.name));
        if !category.description.is_empty() {
            md.push_str(&format!("{}\n\n", category.description));
        }
        push_list(&mut md, "Strengths", &category.strengths);
        push_list(&mut md, "Development areas", &category.development_areas);
        push_list(&mut md, "Recommendations", &category.recommendations);
        if !category.example.is_empty() {
            md.push_str(&format!("**Example:** {}\n\n", category.example));
        }
        if !category.motivation.is_empty() {
            md.push_str(&format!("> {}\n\n", category.motivation));
        }
        push_list(&mut md, "Resources", &category.resources);
    }
    md
}

fn push_list(md: &mut String, title: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    md.push_str(&format!("### {title}\n\n"));
    for item in items {
        md.push_str(&format!("- {item}\n"));
    }
    md.push('\n');
}
