use super::*;

pub(crate) fn parse_html(html: &str) -> Result<Dom> {
    let mut dom = Dom::new();

    let mut stack = vec![dom.root];
    let bytes = html.as_bytes();
    let mut i = 0usize;

    while i < bytes.len() {
        if starts_with_at(bytes, i, b"<!--") {
            if let Some(end) = find_subslice(bytes, i + 4, b"-->") {
                i = end + 3;
            } else {
                return Err(Error::HtmlParse("unclosed HTML comment".into()));
            }
            continue;
        }

        if bytes[i] == b'<' {
            if starts_with_at(bytes, i, b"</") {
                let (tag, next) = parse_end_tag(html, i)?;
                i = next;

                while stack.len() > 1 {
                    let top = *stack
                        .last()
                        .ok_or_else(|| Error::HtmlParse("invalid stack state".into()))?;
                    let top_tag = dom.tag_name(top).unwrap_or("");
                    let matched = top_tag.eq_ignore_ascii_case(&tag);
                    stack.pop();
                    if matched {
                        break;
                    }
                }
                continue;
            }

            if starts_with_at(bytes, i, b"<!") {
                i = parse_declaration_tag(html, i)?;
                continue;
            }

            let (tag, attrs, self_closing, next) = parse_start_tag(html, i)?;
            i = next;

            close_optional_start_tags(&dom, &mut stack, &tag);

            let parent = *stack
                .last()
                .ok_or_else(|| Error::HtmlParse("missing parent element".into()))?;
            let node = dom.create_element(parent, tag.clone(), attrs);

            if is_raw_text_tag(&tag) && !self_closing {
                let close = find_case_insensitive_end_tag(bytes, i, tag.as_bytes())
                    .ok_or_else(|| Error::HtmlParse(format!("unclosed <{tag}>")))?;
                if let Some(body) = html.get(i..close) {
                    if !body.is_empty() {
                        let text = if tag.eq_ignore_ascii_case("textarea") {
                            decode_html_character_references(body)
                        } else {
                            body.to_string()
                        };
                        if !text.is_empty() {
                            dom.create_text(node, text);
                        }
                    }
                }
                i = close;
                let (_, after_end) = parse_end_tag(html, i)?;
                i = after_end;
                continue;
            }

            if !self_closing && !is_void_tag(&tag) {
                stack.push(node);
            }
            continue;
        }

        let text_start = i;
        while i < bytes.len() && bytes[i] != b'<' {
            i += 1;
        }

        if let Some(text) = html.get(text_start..i) {
            if !text.is_empty() {
                let parent = *stack
                    .last()
                    .ok_or_else(|| Error::HtmlParse("missing parent element".into()))?;
                let decoded = decode_html_character_references(text);
                if !decoded.is_empty() {
                    dom.create_text(parent, decoded);
                }
            }
        }
    }

    dom.initialize_form_control_values()?;
    Ok(dom)
}

// Tags whose content is taken verbatim up to the matching end tag.
fn is_raw_text_tag(tag: &str) -> bool {
    tag.eq_ignore_ascii_case("script")
        || tag.eq_ignore_ascii_case("style")
        || tag.eq_ignore_ascii_case("textarea")
        || tag.eq_ignore_ascii_case("title")
}

fn is_void_tag(tag: &str) -> bool {
    matches!(
        tag.to_ascii_lowercase().as_str(),
        "area"
            | "base"
            | "br"
            | "col"
            | "embed"
            | "hr"
            | "img"
            | "input"
            | "link"
            | "meta"
            | "source"
            | "track"
            | "wbr"
    )
}

// A start tag for one of these closes an open element of the same group,
// matching the optional-end-tag rules pages actually rely on.
fn close_optional_start_tags(dom: &Dom, stack: &mut Vec<NodeId>, tag: &str) {
    let closes: &[&str] = match tag.to_ascii_lowercase().as_str() {
        "li" => &["li"],
        "tr" => &["tr", "td", "th"],
        "td" | "th" => &["td", "th"],
        "p" | "div" | "ul" | "ol" | "table" | "form" | "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
            &["p"]
        }
        _ => return,
    };

    while stack.len() > 1 {
        let Some(&top) = stack.last() else {
            return;
        };
        let top_tag = match dom.tag_name(top) {
            Some(tag) => tag.to_ascii_lowercase(),
            None => return,
        };
        if closes.contains(&top_tag.as_str()) {
            stack.pop();
        } else {
            return;
        }
    }
}

fn starts_with_at(bytes: &[u8], at: usize, needle: &[u8]) -> bool {
    bytes.len() >= at + needle.len() && &bytes[at..at + needle.len()] == needle
}

fn find_subslice(bytes: &[u8], from: usize, needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || bytes.len() < needle.len() {
        return None;
    }
    (from..=bytes.len() - needle.len()).find(|&i| &bytes[i..i + needle.len()] == needle)
}

fn find_case_insensitive_end_tag(bytes: &[u8], from: usize, tag: &[u8]) -> Option<usize> {
    let mut i = from;
    while i + tag.len() + 2 < bytes.len() {
        if bytes[i] == b'<' && bytes[i + 1] == b'/' {
            let name = &bytes[i + 2..i + 2 + tag.len()];
            if name.eq_ignore_ascii_case(tag) {
                return Some(i);
            }
        }
        i += 1;
    }
    None
}

fn parse_declaration_tag(html: &str, start: usize) -> Result<usize> {
    let bytes = html.as_bytes();
    let mut i = start + 2;
    while i < bytes.len() {
        if bytes[i] == b'>' {
            return Ok(i + 1);
        }
        i += 1;
    }
    Err(Error::HtmlParse("unclosed <!...> declaration".into()))
}

fn parse_end_tag(html: &str, start: usize) -> Result<(String, usize)> {
    let bytes = html.as_bytes();
    let mut i = start + 2;
    let name_start = i;
    while i < bytes.len() && bytes[i] != b'>' {
        i += 1;
    }
    if i >= bytes.len() {
        return Err(Error::HtmlParse("unclosed end tag".into()));
    }
    let name = html
        .get(name_start..i)
        .ok_or_else(|| Error::HtmlParse("invalid end tag".into()))?
        .trim()
        .to_ascii_lowercase();
    if name.is_empty() {
        return Err(Error::HtmlParse("empty end tag".into()));
    }
    Ok((name, i + 1))
}

fn parse_start_tag(
    html: &str,
    start: usize,
) -> Result<(String, HashMap<String, String>, bool, usize)> {
    let bytes = html.as_bytes();
    let mut i = start + 1;

    let name_start = i;
    while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'-') {
        i += 1;
    }
    let tag = html
        .get(name_start..i)
        .ok_or_else(|| Error::HtmlParse("invalid start tag".into()))?
        .to_ascii_lowercase();
    if tag.is_empty() {
        return Err(Error::HtmlParse("empty start tag name".into()));
    }

    let mut attrs = HashMap::new();
    let mut self_closing = false;

    loop {
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        if i >= bytes.len() {
            return Err(Error::HtmlParse(format!("unclosed <{tag}> start tag")));
        }
        if bytes[i] == b'>' {
            i += 1;
            break;
        }
        if bytes[i] == b'/' {
            self_closing = true;
            i += 1;
            continue;
        }

        let attr_start = i;
        while i < bytes.len()
            && !bytes[i].is_ascii_whitespace()
            && bytes[i] != b'='
            && bytes[i] != b'>'
            && bytes[i] != b'/'
        {
            i += 1;
        }
        let attr_name = html
            .get(attr_start..i)
            .ok_or_else(|| Error::HtmlParse("invalid attribute name".into()))?
            .to_ascii_lowercase();
        if attr_name.is_empty() {
            return Err(Error::HtmlParse(format!(
                "malformed attribute in <{tag}> start tag"
            )));
        }

        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        if i >= bytes.len() || bytes[i] != b'=' {
            // Boolean attribute.
            attrs.insert(attr_name, String::new());
            continue;
        }
        i += 1;
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        if i >= bytes.len() {
            return Err(Error::HtmlParse(format!("unclosed <{tag}> start tag")));
        }

        let value = if bytes[i] == b'"' || bytes[i] == b'\'' {
            let quote = bytes[i];
            i += 1;
            let value_start = i;
            while i < bytes.len() && bytes[i] != quote {
                i += 1;
            }
            if i >= bytes.len() {
                return Err(Error::HtmlParse(format!(
                    "unclosed attribute value in <{tag}>"
                )));
            }
            let raw = html
                .get(value_start..i)
                .ok_or_else(|| Error::HtmlParse("invalid attribute value".into()))?;
            i += 1;
            decode_html_character_references(raw)
        } else {
            let value_start = i;
            while i < bytes.len()
                && !bytes[i].is_ascii_whitespace()
                && bytes[i] != b'>'
                && bytes[i] != b'/'
            {
                i += 1;
            }
            let raw = html
                .get(value_start..i)
                .ok_or_else(|| Error::HtmlParse("invalid attribute value".into()))?;
            decode_html_character_references(raw)
        };

        attrs.insert(attr_name, value);
    }

    Ok((tag, attrs, self_closing, i))
}

fn decode_html_character_references(src: &str) -> String {
    if !src.contains('&') {
        return src.to_string();
    }

    fn decode_numeric(value: &str) -> Option<char> {
        let codepoint =
            if let Some(hex) = value.strip_prefix('x').or_else(|| value.strip_prefix('X')) {
                u32::from_str_radix(hex, 16).ok()?
            } else {
                value.parse::<u32>().ok()?
            };
        char::from_u32(codepoint)
    }

    fn decode_named(value: &str) -> Option<char> {
        match value {
            "amp" => Some('&'),
            "lt" => Some('<'),
            "gt" => Some('>'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            "nbsp" => Some('\u{00A0}'),
            "copy" => Some('©'),
            "reg" => Some('®'),
            "hellip" => Some('…'),
            "ldquo" => Some('“'),
            "rdquo" => Some('”'),
            "lsquo" => Some('‘'),
            "rsquo" => Some('’'),
            _ => None,
        }
    }

    let chars: Vec<char> = src.chars().collect();
    let mut out = String::with_capacity(src.len());
    let mut i = 0usize;
    while i < chars.len() {
        if chars[i] != '&' {
            out.push(chars[i]);
            i += 1;
            continue;
        }

        let mut j = i + 1;
        while j < chars.len() && j - i <= 10 && chars[j] != ';' && chars[j] != '&' {
            j += 1;
        }
        if j < chars.len() && chars[j] == ';' && j > i + 1 {
            let entity: String = chars[i + 1..j].iter().collect();
            let decoded = if let Some(numeric) = entity.strip_prefix('#') {
                decode_numeric(numeric)
            } else {
                decode_named(&entity)
            };
            if let Some(ch) = decoded {
                out.push(ch);
                i = j + 1;
                continue;
            }
        }

        out.push('&');
        i += 1;
    }
    out
}
