use crate::config::Config;
use crate::html::escape_html;
use crate::store::Permalink;

const SITEMAP_HEADER: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8"?>"#,
    r#"<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">"#
);

/// One `<url><loc>` per permalink, absolute, in the order given.
pub fn render_sitemap(config: &Config, permalinks: &[Permalink]) -> String {
    let mut lines = Vec::with_capacity(permalinks.len() + 2);
    lines.push(SITEMAP_HEADER.to_string());
    for permalink in permalinks {
        lines.push(format!(
            "<url><loc>{}</loc></url>",
            escape_html(&config.absolute_url(&permalink.path()))
        ));
    }
    lines.push("</urlset>".to_string());
    lines.join("\n")
}
