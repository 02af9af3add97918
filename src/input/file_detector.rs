//! Input format detection

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    Pdf,
    Text,
    Markdown,
    Json,
    Unknown,
}

impl InputFormat {
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "pdf" => InputFormat::Pdf,
            "txt" | "text" => InputFormat::Text,
            "md" | "markdown" => InputFormat::Markdown,
            "json" => InputFormat::Json,
            _ => InputFormat::Unknown,
        }
    }
}
