/// Escapes text for inclusion in HTML element content or quoted attributes.
pub fn escape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Minimal standalone page shown to people scanning a code.
pub fn render_page(title: &str, heading: &str, message: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{title}</title>
<style>
body {{ font-family: system-ui, sans-serif; display: flex; min-height: 100vh; margin: 0; align-items: center; justify-content: center; background: #f5f5f5; }}
main {{ background: #fff; padding: 2rem 2.5rem; border-radius: 12px; box-shadow: 0 2px 12px rgba(0,0,0,.08); text-align: center; max-width: 28rem; }}
</style>
</head>
<body>
<main>
<h1>{heading}</h1>
<p>{message}</p>
</main>
</body>
</html>"#,
        title = escape(title),
        heading = escape(heading),
        message = escape(message),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape() {
        assert_eq!(
            escape(r#"<script>alert("x")</script> & 'y'"#),
            "&lt;script&gt;alert(&quot;x&quot;)&lt;/script&gt; &amp; &#39;y&#39;"
        );
    }

    #[test]
    fn test_render_page_escapes_all_fields() {
        let page = render_page("<t>", "<h>", "<m>");
        assert!(page.contains("&lt;t&gt;"));
        assert!(page.contains("&lt;h&gt;"));
        assert!(page.contains("&lt;m&gt;"));
        assert!(!page.contains("<m>"));
    }
}
