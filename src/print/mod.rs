pub mod html;
pub mod sink;

pub use html::render_html;
pub use sink::{MemorySink, PrintJob, PrintSink, SpoolDirSink};
