//! HTML document assembly

/// Wrap a client bundle, optional stylesheet, and optional server-rendered
/// markup into the servable document.
pub fn render_document(js: &str, css: Option<&str>, ssr_html: Option<&str>) -> String {
    let mut html = String::with_capacity(
        js.len() + css.map_or(0, str::len) + ssr_html.map_or(0, str::len) + 512,
    );
    html.push_str("<!DOCTYPE html>\n<html>\n<head>\n");
    html.push_str("<meta charset=\"utf-8\" />\n");
    html.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\" />\n");
    html.push_str("<meta name=\"color-scheme\" content=\"light dark\" />\n");
    if let Some(css) = css {
        html.push_str("<style>\n");
        html.push_str(css);
        html.push_str("\n</style>\n");
    }
    html.push_str("</head>\n<body>\n<div id=\"root\">");
    if let Some(markup) = ssr_html {
        html.push_str(markup);
    }
    html.push_str("</div>\n<script type=\"module\">\n");
    html.push_str(js);
    html.push_str("\n</script>\n</body>\n</html>\n");
    html
}
