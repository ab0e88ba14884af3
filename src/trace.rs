use crate::layout::LayoutStats;
use serde_json::{Value, json};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

/// JSON-lines layout trace. Write failures are swallowed; tracing never fails a render.
///
/// One trace file may be shared by concurrent renders. Each render writes
/// through its own [`LayoutTrace::for_render`] handle, which tags every line
/// with the client, and its summary counts come from that render's stats.
#[derive(Clone)]
pub struct LayoutTrace {
    writer: Arc<Mutex<Box<dyn Write + Send>>>,
    render: Option<String>,
}

impl LayoutTrace {
    pub fn create(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = File::create(path)?;
        Ok(Self::from_writer(BufWriter::new(file)))
    }

    pub fn from_writer(writer: impl Write + Send + 'static) -> Self {
        Self {
            writer: Arc::new(Mutex::new(Box::new(writer))),
            render: None,
        }
    }

    /// Handle for one render, writing to the same file.
    pub fn for_render(&self, client: &str) -> Self {
        Self {
            writer: Arc::clone(&self.writer),
            render: Some(client.to_string()),
        }
    }

    pub fn event(&self, kind: &str, mut fields: Value) {
        if let Value::Object(map) = &mut fields {
            map.insert("type".to_string(), Value::String(kind.to_string()));
            if let Some(render) = &self.render {
                map.insert("render".to_string(), Value::String(render.clone()));
            }
        }
        if let Ok(mut writer) = self.writer.lock() {
            let _ = writeln!(writer, "{fields}");
        }
    }

    pub fn page_break(&self, from_page: usize, to_page: usize, reason: &str, block: &str) {
        self.event(
            "layout.page_break",
            json!({
                "from_page": from_page,
                "to_page": to_page,
                "reason": reason,
                "block": block,
            }),
        );
    }

    pub fn block_skipped(&self, page: usize, block: &str, error: &str) {
        self.event(
            "layout.block_skipped",
            json!({ "page": page, "block": block, "error": error }),
        );
    }

    /// Writes this render's totals and flushes.
    pub fn summary(&self, pages: usize, stats: &LayoutStats) {
        self.event(
            "render.summary",
            json!({
                "pages": pages,
                "counts": {
                    "layout.page_break": stats.page_breaks,
                    "layout.block_placed": stats.placed_blocks,
                    "layout.block_skipped": stats.skipped_blocks,
                },
            }),
        );
        if let Ok(mut writer) = self.writer.lock() {
            let _ = writer.flush();
        }
    }
}
