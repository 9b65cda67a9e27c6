//! 打印出口：把渲染好的单据交给平台打印设施

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Mutex;

use crate::service::document::{Document, DocumentKind};

use super::html::render_html;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrintJob {
    pub name: String,
    pub kind: DocumentKind,
    pub html: String,
}

impl PrintJob {
    pub fn from_document(document: &Document) -> Self {
        Self {
            name: document.slug(),
            kind: document.kind,
            html: render_html(document),
        }
    }
}

#[async_trait]
pub trait PrintSink: Send + Sync {
    async fn submit(&self, job: PrintJob) -> std::io::Result<()>;
}

/// 写入打印队列目录，由外部打印服务拾取
#[derive(Debug, Clone)]
pub struct SpoolDirSink {
    dir: PathBuf,
}

impl SpoolDirSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl PrintSink for SpoolDirSink {
    async fn submit(&self, job: PrintJob) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.dir.join(format!("{}.html", job.name));
        tokio::fs::write(&path, job.html.as_bytes()).await?;
        tracing::info!("print job {} ({}) spooled to {}", job.name, job.kind, path.display());
        Ok(())
    }
}

/// 内存打印出口，保存提交过的任务
#[derive(Debug, Default)]
pub struct MemorySink {
    jobs: Mutex<Vec<PrintJob>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn jobs(&self) -> Vec<PrintJob> {
        self.jobs.lock().map(|jobs| jobs.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl PrintSink for MemorySink {
    async fn submit(&self, job: PrintJob) -> std::io::Result<()> {
        tracing::debug!("print job {} kept in memory", job.name);
        self.jobs
            .lock()
            .map_err(|_| std::io::Error::other("print queue poisoned"))?
            .push(job);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(name: &str) -> PrintJob {
        PrintJob {
            name: name.to_string(),
            kind: DocumentKind::Single,
            html: "<html></html>".to_string(),
        }
    }

    #[tokio::test]
    async fn spool_sink_writes_html_file() {
        let dir = tempfile::tempdir().unwrap();
        let sink = SpoolDirSink::new(dir.path().join("spool"));
        sink.submit(job("single-s-1")).await.unwrap();

        let written = std::fs::read_to_string(dir.path().join("spool/single-s-1.html")).unwrap();
        assert_eq!(written, "<html></html>");
    }

    #[tokio::test]
    async fn memory_sink_keeps_jobs_in_order() {
        let sink = MemorySink::new();
        sink.submit(job("a")).await.unwrap();
        sink.submit(job("b")).await.unwrap();
        let names: Vec<String> = sink.jobs().into_iter().map(|j| j.name).collect();
        assert_eq!(names, vec!["a", "b"]);
    }
}
