#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageMetrics {
    pub page_number: usize,
    pub block_count: usize,
    pub command_count: usize,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderMetrics {
    pub pages: Vec<PageMetrics>,
    pub total_render_ms: f64,
    pub page_breaks: usize,
    pub placed_blocks: usize,
    pub skipped_blocks: usize,
    pub total_bytes: usize,
}
