//! Minimal reader for the Atom/XML documents the Service Bus REST API returns.
//! Only what the readers need: element text by local name, entry iteration.

/// Text of every element whose local name is `name` (namespace prefix ignored).
pub fn element_texts(xml: &str, name: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut rest = xml;
    while let Some((inner, after)) = next_element(rest, name) {
        out.push(decode_text(inner));
        rest = after;
    }
    out
}

pub fn first_element_text(xml: &str, name: &str) -> Option<String> {
    next_element(xml, name).map(|(inner, _)| decode_text(inner))
}

/// Raw inner markup of every element named `name`.
pub fn element_bodies<'a>(xml: &'a str, name: &str) -> Vec<&'a str> {
    let mut out = Vec::new();
    let mut rest = xml;
    while let Some((inner, after)) = next_element(rest, name) {
        out.push(inner);
        rest = after;
    }
    out
}

/// Text of each direct-or-nested leaf inside `body`, whatever the tag names are.
pub fn leaf_texts(body: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut rest = body;
    while let Some(open_end) = rest.find('>') {
        let after_open = &rest[open_end + 1..];
        match after_open.find('<') {
            Some(close_start) => {
                let text = after_open[..close_start].trim();
                if !text.is_empty() && after_open[close_start..].starts_with("</") {
                    out.push(decode_text(text));
                }
                rest = &after_open[close_start..];
            }
            None => break,
        }
    }
    out
}

/// Finds the next `<name ...>inner</name>` (or prefixed `<p:name>`) in `xml`.
/// Returns the inner markup and the remainder after the closing tag.
fn next_element<'a>(xml: &'a str, name: &str) -> Option<(&'a str, &'a str)> {
    let mut cursor = 0;
    while let Some(rel) = xml[cursor..].find('<') {
        let start = cursor + rel;
        let tag_end = start + xml[start..].find('>')?;
        let tag = &xml[start + 1..tag_end];
        cursor = tag_end + 1;

        if tag.starts_with('/') || tag.starts_with('?') || tag.starts_with('!') {
            continue;
        }
        let qualified = tag
            .split(|c: char| c.is_whitespace() || c == '/')
            .next()
            .unwrap_or_default();
        let local = qualified.rsplit(':').next().unwrap_or_default();
        if local != name {
            continue;
        }
        if tag.ends_with('/') {
            return Some(("", &xml[cursor..]));
        }

        let closing = format!("</{}>", qualified);
        let close_rel = xml[cursor..].find(&closing)?;
        let inner = &xml[cursor..cursor + close_rel];
        return Some((inner, &xml[cursor + close_rel + closing.len()..]));
    }
    None
}

/// Element text with any CDATA wrapper removed and references resolved.
fn decode_text(raw: &str) -> String {
    let trimmed = raw.trim();
    match trimmed.strip_prefix("<![CDATA[").and_then(|rest| rest.strip_suffix("]]>")) {
        Some(literal) => literal.trim().to_string(),
        None => decode_entities(trimmed),
    }
}

/// Single pass, so `&amp;lt;` stays `&lt;`. Unknown references are kept verbatim.
fn decode_entities(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];
        let decoded = tail
            .find(';')
            .and_then(|end| decode_reference(&tail[1..end]).map(|c| (c, end)));
        match decoded {
            Some((c, end)) => {
                out.push(c);
                rest = &tail[end + 1..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn decode_reference(name: &str) -> Option<char> {
    match name {
        "lt" => Some('<'),
        "gt" => Some('>'),
        "amp" => Some('&'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        _ => {
            let numeric = name.strip_prefix('#')?;
            let code = match numeric.strip_prefix('x').or_else(|| numeric.strip_prefix('X')) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => numeric.parse::<u32>().ok()?,
            };
            char::from_u32(code)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEED: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title type="text">consumergroups</title>
  <entry><title type="text">$Default</title><content/></entry>
  <entry><title type="text"> analytics &amp; ml </title></entry>
  <entry><title type="text">   </title></entry>
</feed>"#;

    #[test]
    fn titles_per_entry() {
        let titles: Vec<String> = element_bodies(FEED, "entry")
            .into_iter()
            .filter_map(|entry| first_element_text(entry, "title"))
            .collect();
        assert_eq!(titles, vec!["$Default", "analytics & ml", ""]);
    }

    #[test]
    fn prefixed_children() {
        let xml = concat!(
            r#"<PartitionIds xmlns:d3p1="urn:x">"#,
            "<d3p1:string>0</d3p1:string><d3p1:string>1</d3p1:string></PartitionIds>",
        );
        let body = element_bodies(xml, "PartitionIds");
        assert_eq!(leaf_texts(body[0]), vec!["0", "1"]);
        assert_eq!(element_texts(xml, "string"), vec!["0", "1"]);
    }

    #[test]
    fn numeric_references_and_cdata() {
        let feed = concat!(
            r#"<feed><entry><title type="text">&#36;Default</title></entry>"#,
            r#"<entry><title type="text"><![CDATA[billing]]></title></entry>"#,
            "<entry><title>a&#x26;b &amp;lt; &bogus; 5 & 6</title></entry></feed>",
        );
        let titles: Vec<String> = element_bodies(feed, "entry")
            .into_iter()
            .filter_map(|entry| first_element_text(entry, "title"))
            .collect();
        assert_eq!(titles, vec!["$Default", "billing", "a&b &lt; &bogus; 5 & 6"]);
    }

    #[test]
    fn out_of_range_reference_is_kept() {
        assert_eq!(decode_entities("&#xD800;&#99999999;"), "&#xD800;&#99999999;");
    }
}
