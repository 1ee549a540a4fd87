//! Flat, single-pass link scanner for the addons wiki page.
//!
//! The scanner tracks at most one open content region and one open link. It
//! does not validate nesting: a second region tag inside the first is ignored
//! and the first closing region tag ends the region.

use std::collections::BTreeMap;

use reqwest::Url;

use crate::addons::Addon;

pub const DEFAULT_SITE_ORIGIN: &str = "https://kubejs.com";
pub const DEFAULT_REGION_TAG: &str = "main";
pub const DEFAULT_PATH_MARKER: &str = "/wiki/addons/";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddonScanner {
    origin: String,
    region_tag: String,
    path_marker: String,
}

impl Default for AddonScanner {
    fn default() -> Self {
        Self::new(DEFAULT_SITE_ORIGIN)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ScanState {
    Outside,
    InRegion,
    InLink { href: String, text: String },
}

#[derive(Debug)]
struct Tag<'a> {
    name: String,
    closing: bool,
    raw: &'a str,
}

impl AddonScanner {
    pub fn new(origin: impl Into<String>) -> Self {
        Self {
            origin: origin.into().trim_end_matches('/').to_string(),
            region_tag: DEFAULT_REGION_TAG.to_string(),
            path_marker: DEFAULT_PATH_MARKER.to_string(),
        }
    }

    /// Scanner whose origin is taken from the page being scanned.
    pub fn for_page(page_url: &str) -> Self {
        site_origin(page_url)
            .map(Self::new)
            .unwrap_or_default()
    }

    pub fn with_region_tag(mut self, tag: &str) -> Self {
        self.region_tag = tag.to_ascii_lowercase();
        self
    }

    pub fn with_path_marker(mut self, marker: &str) -> Self {
        self.path_marker = marker.to_string();
        self
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn scan(&self, html: &str) -> Vec<Addon> {
        let mut output = Vec::new();
        let mut state = ScanState::Outside;
        let mut index = 0usize;

        while index < html.len() {
            let Some(lt) = html[index..].find('<') else {
                push_text(&mut state, &html[index..]);
                break;
            };
            let at = index + lt;
            push_text(&mut state, &html[index..at]);

            let opens_markup = html
                .as_bytes()
                .get(at + 1)
                .is_some_and(|next| *next == b'/' || *next == b'!' || next.is_ascii_alphabetic());
            if !opens_markup {
                push_text(&mut state, "<");
                index = at + 1;
                continue;
            }

            if starts_with_at(html, at, "<!--") {
                index = match html[at + 4..].find("-->") {
                    Some(end) => at + 4 + end + 3,
                    None => html.len(),
                };
                continue;
            }
            let Some(end) = find_tag_end(html, at) else {
                break;
            };
            index = end + 1;

            let Some(tag) = read_tag(&html[at..=end]) else {
                continue;
            };
            state = self.step(state, &tag, &mut output);
        }

        output
    }

    fn step(&self, state: ScanState, tag: &Tag<'_>, output: &mut Vec<Addon>) -> ScanState {
        let is_region = tag.name == self.region_tag;
        let is_link = tag.name == "a";

        match state {
            ScanState::Outside => {
                if is_region && !tag.closing {
                    ScanState::InRegion
                } else {
                    ScanState::Outside
                }
            }
            ScanState::InRegion => {
                if is_region && tag.closing {
                    ScanState::Outside
                } else if is_link && !tag.closing {
                    open_link(tag).unwrap_or(ScanState::InRegion)
                } else {
                    ScanState::InRegion
                }
            }
            ScanState::InLink { href, text } => {
                if is_region && tag.closing {
                    ScanState::Outside
                } else if is_link && tag.closing {
                    if let Some(addon) = self.addon_from_link(&href, &text) {
                        output.push(addon);
                    }
                    ScanState::InRegion
                } else if is_link {
                    open_link(tag).unwrap_or(ScanState::InRegion)
                } else {
                    ScanState::InLink { href, text }
                }
            }
        }
    }

    fn addon_from_link(&self, href: &str, text: &str) -> Option<Addon> {
        let href = decode_html(href.trim());
        let name = decode_html(text);
        let name = name.trim();
        if href.is_empty() || name.is_empty() || !href.contains(&self.path_marker) {
            return None;
        }
        Some(Addon {
            name: name.to_string(),
            url: absolute_url(&self.origin, &href),
        })
    }
}

/// Root-relative URLs are prefixed with `origin`; everything else is kept as-is.
pub fn absolute_url(origin: &str, url: &str) -> String {
    let url = url.trim();
    if url.starts_with('/') {
        format!("{}{}", origin.trim_end_matches('/'), url)
    } else {
        url.to_string()
    }
}

/// `scheme://host[:port]` of a URL, if it has one.
pub fn site_origin(url: &str) -> Option<String> {
    let parsed = Url::parse(url.trim()).ok()?;
    let origin = parsed.origin();
    if !origin.is_tuple() {
        return None;
    }
    Some(origin.ascii_serialization())
}

fn open_link(tag: &Tag<'_>) -> Option<ScanState> {
    let attrs = parse_attributes(tag.raw, tag.name.len());
    let href = attrs.get("href")?;
    Some(ScanState::InLink {
        href: href.clone(),
        text: String::new(),
    })
}

fn push_text(state: &mut ScanState, chunk: &str) {
    if let ScanState::InLink { text, .. } = state {
        text.push_str(chunk);
    }
}

fn read_tag(raw: &str) -> Option<Tag<'_>> {
    let bytes = raw.as_bytes();
    let mut index = 1usize;
    let closing = bytes.get(index).copied() == Some(b'/');
    if closing {
        index += 1;
    }
    let name_start = index;
    while index < bytes.len() && bytes[index].is_ascii_alphanumeric() {
        index += 1;
    }
    if name_start == index {
        return None;
    }
    Some(Tag {
        name: raw[name_start..index].to_ascii_lowercase(),
        closing,
        raw,
    })
}

fn find_tag_end(html: &str, start: usize) -> Option<usize> {
    let bytes = html.as_bytes();
    let mut index = start;
    let mut quote = None::<u8>;
    while index < bytes.len() {
        let byte = bytes[index];
        if let Some(active) = quote {
            if byte == active {
                quote = None;
            }
            index += 1;
            continue;
        }
        if byte == b'"' || byte == b'\'' {
            quote = Some(byte);
            index += 1;
            continue;
        }
        if byte == b'>' {
            return Some(index);
        }
        index += 1;
    }
    None
}

fn parse_attributes(tag_raw: &str, name_len: usize) -> BTreeMap<String, String> {
    let mut attrs = BTreeMap::new();
    let bytes = tag_raw.as_bytes();
    let mut index = name_len + 1;

    while index < bytes.len() {
        let byte = bytes[index];
        if byte == b'>' {
            break;
        }
        if byte == b'/' || byte.is_ascii_whitespace() {
            index += 1;
            continue;
        }

        let name_start = index;
        while index < bytes.len() {
            let ch = bytes[index];
            if ch.is_ascii_whitespace() || ch == b'=' || ch == b'>' || ch == b'/' {
                break;
            }
            index += 1;
        }
        if name_start == index {
            index += 1;
            continue;
        }
        let name = tag_raw[name_start..index].to_ascii_lowercase();
        while index < bytes.len() && bytes[index].is_ascii_whitespace() {
            index += 1;
        }
        let mut value = String::new();
        if bytes.get(index).copied() == Some(b'=') {
            index += 1;
            while index < bytes.len() && bytes[index].is_ascii_whitespace() {
                index += 1;
            }
            if let Some(quote) = bytes
                .get(index)
                .copied()
                .filter(|byte| *byte == b'"' || *byte == b'\'')
            {
                index += 1;
                let value_start = index;
                while index < bytes.len() && bytes[index] != quote {
                    index += 1;
                }
                value = tag_raw[value_start..index].to_string();
                if bytes.get(index).copied() == Some(quote) {
                    index += 1;
                }
            } else {
                let value_start = index;
                while index < bytes.len()
                    && !bytes[index].is_ascii_whitespace()
                    && bytes[index] != b'>'
                {
                    index += 1;
                }
                value = tag_raw[value_start..index].to_string();
            }
        }

        attrs.entry(name).or_insert(value);
    }

    attrs
}

fn starts_with_at(text: &str, index: usize, sequence: &str) -> bool {
    text.as_bytes()
        .get(index..index + sequence.len())
        .is_some_and(|slice| slice == sequence.as_bytes())
}

fn decode_html(text: &str) -> String {
    text.replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}
