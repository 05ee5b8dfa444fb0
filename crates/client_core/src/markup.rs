//! Element queries and in-place edits over injected fragments. Fragments are
//! parsed with `tl`; edits are spliced back into the source at the byte ranges
//! the parser reports, so untouched markup keeps its exact formatting.

use tl::{HTMLTag, ParserOptions};

const RAW_TEXT_ELEMENTS: [&str; 2] = ["script", "style"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    pub name: String,
    pub attrs: Vec<(String, String)>,
    /// Byte range of the whole start tag, `<` through `>`.
    pub span: (usize, usize),
    /// Byte range of the element's children; `None` for void or unclosed
    /// elements.
    pub inner: Option<(usize, usize)>,
}

impl Tag {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.attr("class")
            .is_some_and(|classes| classes.split_whitespace().any(|c| c == class))
    }

    pub fn set_attr(&mut self, name: &str, value: &str) {
        match self.attrs.iter_mut().find(|(key, _)| key == name) {
            Some((_, existing)) => *existing = value.to_string(),
            None => self.attrs.push((name.to_string(), value.to_string())),
        }
    }

    pub fn remove_attr(&mut self, name: &str) {
        self.attrs.retain(|(key, _)| key != name);
    }

    pub fn toggle_class(&mut self, class: &str, on: bool) {
        let mut classes: Vec<String> = self
            .attr("class")
            .unwrap_or_default()
            .split_whitespace()
            .filter(|c| *c != class)
            .map(str::to_string)
            .collect();
        if on {
            classes.push(class.to_string());
        }
        if classes.is_empty() {
            self.remove_attr("class");
        } else {
            self.set_attr("class", &classes.join(" "));
        }
    }

    /// Serializes the start tag. Empty values render as bare attributes.
    pub fn render(&self) -> String {
        let mut out = format!("<{}", self.name);
        for (key, value) in &self.attrs {
            out.push(' ');
            out.push_str(key);
            if !value.is_empty() {
                out.push_str(&format!("=\"{}\"", escape_html(value)));
            }
        }
        out.push('>');
        out
    }
}

/// Every element of `html` in document order. Comments and the bodies of
/// `<script>`/`<style>` never produce elements.
pub fn start_tags(html: &str) -> Vec<Tag> {
    let masked = mask_raw_text(html);
    let Ok(dom) = tl::parse(&masked, ParserOptions::default()) else {
        return Vec::new();
    };
    let parser = dom.parser();
    dom.nodes()
        .iter()
        .filter_map(|node| node.as_tag())
        .filter_map(|tag| {
            let (start, last) = tag.boundaries(parser);
            let name = tag.name().as_utf8_str().to_ascii_lowercase();
            let head_end = find_tag_end(&masked, start + 1)? + 1;
            let closing_len = name.len() + "</>".len();
            let end = last + 1;
            let inner = (end > head_end && end - head_end >= closing_len)
                .then(|| (head_end, end - closing_len));
            Some(Tag {
                attrs: collect_attrs(tag),
                name,
                span: (start, head_end),
                inner,
            })
        })
        .collect()
}

// Attributes in source order; `tl` keeps `id` and `class` apart from the rest,
// so order by where each one sits in the input.
fn collect_attrs(tag: &HTMLTag<'_>) -> Vec<(String, String)> {
    let attributes = tag.attributes();
    let mut attrs: Vec<(usize, String, String)> = attributes
        .unstable_raw()
        .iter()
        .map(|(key, value)| {
            (
                key.as_ptr() as usize,
                key.as_utf8_str().to_ascii_lowercase(),
                value
                    .as_ref()
                    .map(|v| decode_entities(&v.as_utf8_str()))
                    .unwrap_or_default(),
            )
        })
        .collect();
    for (name, value) in [("id", attributes.id()), ("class", attributes.class())] {
        if let Some(value) = value {
            attrs.push((
                value.as_ptr() as usize,
                name.to_string(),
                decode_entities(&value.as_utf8_str()),
            ));
        }
    }
    attrs.sort_by_key(|(at, _, _)| *at);
    attrs
        .into_iter()
        .map(|(_, key, value)| (key, value))
        .collect()
}

// Blanks the bodies of raw-text elements byte for byte so offsets into the
// masked copy are offsets into the original.
fn mask_raw_text(html: &str) -> String {
    let lower = html.to_ascii_lowercase();
    let mut masked = html.as_bytes().to_vec();
    let mut cursor = 0;
    while let Some((open, name)) = RAW_TEXT_ELEMENTS
        .iter()
        .filter_map(|name| {
            lower[cursor..]
                .find(&format!("<{name}"))
                .map(|at| (cursor + at, *name))
        })
        .min_by_key(|(at, _)| *at)
    {
        let Some(head_end) = find_tag_end(html, open + 1) else {
            break;
        };
        let body_start = head_end + 1;
        let body_end = lower[body_start..]
            .find(&format!("</{name}"))
            .map_or(html.len(), |at| body_start + at);
        masked[body_start..body_end].fill(b' ');
        cursor = body_end.max(open + 1);
    }
    // Only whole UTF-8 sequences were replaced with ASCII spaces.
    String::from_utf8(masked).unwrap_or_else(|_| html.to_string())
}

// Quoted attribute values may contain '>'.
fn find_tag_end(html: &str, from: usize) -> Option<usize> {
    let mut quote: Option<char> = None;
    for (index, ch) in html.get(from..)?.char_indices() {
        match (quote, ch) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(ch),
            (None, '>') => return Some(from + index),
            (None, _) => {}
        }
    }
    None
}

fn decode_entities(value: &str) -> String {
    value
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

pub fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// Text between a start tag and the next tag, i.e. the element's leading
/// text node.
pub fn leaf_text<'a>(html: &'a str, tag: &Tag) -> &'a str {
    let after = &html[tag.span.1..];
    let end = after.find('<').unwrap_or(after.len());
    &after[..end]
}

/// Replaces the leading text of every element for which `text_for` returns
/// a value. Returns the rewritten markup and how many elements changed.
pub fn rewrite_text<F>(html: &str, mut text_for: F) -> (String, usize)
where
    F: FnMut(&Tag) -> Option<String>,
{
    let mut output = String::with_capacity(html.len());
    let mut copied_to = 0;
    let mut rewritten = 0;

    for tag in start_tags(html) {
        if tag.span.1 < copied_to {
            continue;
        }
        let Some(text) = text_for(&tag) else {
            continue;
        };
        let old_len = leaf_text(html, &tag).len();
        output.push_str(&html[copied_to..tag.span.1]);
        output.push_str(&escape_html(&text));
        copied_to = tag.span.1 + old_len;
        rewritten += 1;
    }
    output.push_str(&html[copied_to..]);
    (output, rewritten)
}

/// Re-serializes every start tag `edit` changes. Returns the rewritten markup
/// and how many tags changed.
pub fn rewrite_tags<F>(html: &str, mut edit: F) -> (String, usize)
where
    F: FnMut(&mut Tag) -> bool,
{
    let mut output = String::with_capacity(html.len());
    let mut copied_to = 0;
    let mut rewritten = 0;

    for mut tag in start_tags(html) {
        if !edit(&mut tag) {
            continue;
        }
        output.push_str(&html[copied_to..tag.span.0]);
        output.push_str(&tag.render());
        copied_to = tag.span.1;
        rewritten += 1;
    }
    output.push_str(&html[copied_to..]);
    (output, rewritten)
}

pub fn set_element_text(html: &str, id: &str, text: &str) -> Option<String> {
    let (rewritten, count) = rewrite_text(html, |tag| {
        (tag.attr("id") == Some(id)).then(|| text.to_string())
    });
    (count > 0).then_some(rewritten)
}

/// Replaces the children of the element with the given id.
pub fn set_inner_html(html: &str, id: &str, inner: &str) -> Option<String> {
    let (start, end) = start_tags(html)
        .into_iter()
        .find(|tag| tag.attr("id") == Some(id))?
        .inner?;
    Some(format!("{}{}{}", &html[..start], inner, &html[end..]))
}

/// Appends `inner` as the last child of `tag`.
pub fn append_child(html: &str, tag: &Tag, inner: &str) -> Option<String> {
    let (_, end) = tag.inner?;
    Some(format!("{}{}{}", &html[..end], inner, &html[end..]))
}

pub fn has_element(html: &str, id: &str) -> bool {
    start_tags(html)
        .iter()
        .any(|tag| tag.attr("id") == Some(id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scans_start_tags_with_quoted_and_bare_attributes() {
        let tags = start_tags(
            r#"<!-- note --><div class="card featured" data-category=Art><a href='#x>y' hidden>go</a></div>"#,
        );
        assert_eq!(tags.len(), 2);
        assert_eq!(tags[0].name, "div");
        assert!(tags[0].has_class("featured"));
        assert_eq!(tags[0].attr("data-category"), Some("Art"));
        assert_eq!(tags[1].attr("href"), Some("#x>y"));
        assert_eq!(tags[1].attr("hidden"), Some(""));
    }

    #[test]
    fn apostrophes_in_comments_do_not_hide_later_elements() {
        let html = r#"<!-- don't forget --><span data-metric="1500">0</span><p id="x">it's</p>"#;
        let tags = start_tags(html);
        assert_eq!(tags.len(), 2);
        assert_eq!(tags[0].attr("data-metric"), Some("1500"));

        let (out, count) = rewrite_text(html, |tag| tag.attr("data-metric").map(str::to_string));
        assert_eq!(count, 1);
        assert_eq!(
            out,
            r#"<!-- don't forget --><span data-metric="1500">1500</span><p id="x">it's</p>"#
        );
    }

    #[test]
    fn script_and_style_bodies_yield_no_elements() {
        let html = r#"<style>a > b { color: red }</style><script>if (a<b && c>d) { x = '<i id="fake">'; }</script><b id="real">ok</b>"#;
        let names: Vec<_> = start_tags(html).into_iter().map(|tag| tag.name).collect();
        assert_eq!(names, vec!["style", "script", "b"]);
        assert_eq!(
            set_element_text(html, "real", "fine").expect("real").rsplit("</script>").next(),
            Some(r#"<b id="real">fine</b>"#)
        );
    }

    #[test]
    fn attributes_keep_source_order_and_inner_ranges() {
        let html = r#"<section data-page="home" class="hero" ID="top"><br><p>a</p></section>"#;
        let tags = start_tags(html);
        let keys: Vec<_> = tags[0].attrs.iter().map(|(key, _)| key.as_str()).collect();
        assert_eq!(keys, vec!["data-page", "class", "id"]);
        let (start, end) = tags[0].inner.expect("closed section");
        assert_eq!(&html[start..end], "<br><p>a</p>");
        assert_eq!(tags[1].name, "br");
        assert_eq!(tags[1].inner, None);
    }

    #[test]
    fn set_element_text_escapes_and_reports_missing_ids() {
        let html = r#"<p>Year: <span id="footer-year">2000</span></p>"#;
        let updated = set_element_text(html, "footer-year", "<2026>").expect("found");
        assert_eq!(
            updated,
            r#"<p>Year: <span id="footer-year">&lt;2026&gt;</span></p>"#
        );
        assert_eq!(set_element_text(html, "nope", "x"), None);
    }

    #[test]
    fn set_inner_html_respects_nested_elements() {
        let html = r#"<div id="grid"><div class="card"><div>a</div></div></div><div id="after"></div>"#;
        let updated = set_inner_html(html, "grid", "<p>new</p>").expect("grid");
        assert_eq!(updated, r#"<div id="grid"><p>new</p></div><div id="after"></div>"#);
        assert!(has_element(&updated, "after"));
        assert_eq!(set_inner_html(html, "missing", ""), None);
    }

    #[test]
    fn rewrite_tags_edits_attributes_in_place() {
        let html = r#"<ul><li class="work-item" data-category="art">a</li><li class="work-item featured">b</li></ul>"#;
        let (out, count) = rewrite_tags(html, |tag| {
            if !tag.has_class("work-item") {
                return false;
            }
            let hide = tag.attr("data-category") != Some("art");
            tag.toggle_class("is-hidden", hide);
            if hide {
                tag.set_attr("hidden", "");
            }
            true
        });
        assert_eq!(count, 2);
        assert_eq!(
            out,
            r#"<ul><li class="work-item" data-category="art">a</li><li class="work-item featured is-hidden" hidden>b</li></ul>"#
        );
    }

    #[test]
    fn rewrite_text_touches_only_matching_elements() {
        let html = r#"<b data-metric="12">0</b><i>keep</i><b data-metric="3">0</b>"#;
        let (out, count) = rewrite_text(html, |tag| tag.attr("data-metric").map(str::to_string));
        assert_eq!(count, 2);
        assert_eq!(out, r#"<b data-metric="12">12</b><i>keep</i><b data-metric="3">3</b>"#);
    }
}
