pub mod html;
pub mod json;
pub mod markdown;
pub mod nushell;
pub mod traits;

pub use html::HtmlRenderer;
pub use json::JsonRenderer;
pub use markdown::MarkdownRenderer;
pub use nushell::NushellRenderer;
pub use traits::{collate, git_status_glyph, Renderer};

/// All renderers produced on every render stage, in the order artifacts
/// are written.
pub fn default_renderers() -> Vec<Box<dyn Renderer>> {
    vec![
        Box::new(MarkdownRenderer),
        Box::new(HtmlRenderer),
        Box::new(JsonRenderer),
        Box::new(NushellRenderer),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_renderers_cover_all_four_formats() {
        let names: Vec<&str> = default_renderers().iter().map(|r| r.name()).collect();
        assert_eq!(names, vec!["markdown", "html", "json", "nushell"]);
    }
}
