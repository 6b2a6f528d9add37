//! Caption payload parsers: WebVTT, SRV3/timed-text XML, TTML, JSON3, and HLS playlists.
//!
//! All parsers are pure and never fail: malformed input yields empty text.

use gistpipe_core::CaptionFormat;
use quick_xml::events::Event;
use quick_xml::Reader;
use regex::Regex;

lazy_static::lazy_static! {
    static ref CUE_TIMING_RE: Regex = Regex::new(
        r"(?:\d{2,}:)?\d{2}:\d{2}\.\d{3}\s+-->\s+(?:\d{2,}:)?\d{2}:\d{2}\.\d{3}"
    ).unwrap();
    static ref CUE_INDEX_RE: Regex = Regex::new(r"^\d+$").unwrap();
    // Inline cue markup such as `<c>`, `</c>` and `<00:00:01.200>` karaoke timestamps.
    static ref CUE_TAG_RE: Regex = Regex::new(r"</?[A-Za-z0-9:.]+(?:\.[^>]*)?>").unwrap();
}

const HLS_MARKER: &str = "#EXTM3U";

/// WebVTT → flat text: drops the `WEBVTT` header, cue timing lines and bare cue indices,
/// then joins the remaining lines with single spaces.
pub fn clean_vtt(vtt: &str) -> String {
    let mut lines: Vec<String> = Vec::new();
    for line in vtt.lines() {
        let l = line.trim();
        if l.is_empty() || line.starts_with("WEBVTT") {
            continue;
        }
        if CUE_TIMING_RE.is_match(l) || CUE_INDEX_RE.is_match(l) {
            continue;
        }
        let text = CUE_TAG_RE.replace_all(l, "");
        let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
        if !text.is_empty() {
            lines.push(text);
        }
    }
    lines.join(" ")
}

pub fn is_hls_playlist(body: &str) -> bool {
    body.trim_start().starts_with(HLS_MARKER)
}

/// Segment URLs of an HLS playlist, resolved against the playlist URL.
pub fn playlist_segment_urls(playlist_url: &url::Url, body: &str) -> Vec<url::Url> {
    body.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .filter_map(|l| playlist_url.join(l).ok())
        .collect()
}

/// Lenient HTML entity decoding: unknown references are kept verbatim.
///
/// Numeric references and the legacy named ones (`&amp`, `&lt`, `&nbsp`, ...) also decode
/// without their trailing `;`, as browsers do.
pub fn html_unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp + 1..];
        let decoded = tail
            .find(';')
            .filter(|&semi| semi > 0 && semi <= 32)
            .and_then(|semi| decode_entity(&tail[..semi]).map(|d| (d, semi)));
        match decoded.or_else(|| decode_unterminated(tail)) {
            Some((d, used)) => {
                out.push_str(&d);
                rest = tail.get(used + 1..).unwrap_or("");
            }
            None => {
                out.push('&');
                rest = tail;
            }
        }
    }
    out.push_str(rest);
    out
}

// Named references that HTML5 still resolves without a semicolon; longest names first.
const LEGACY_ENTITIES: &[&str] = &[
    "nbsp", "quot", "copy", "QUOT", "COPY", "amp", "reg", "AMP", "REG", "lt", "gt", "LT", "GT",
];

/// Decodes a reference with no `;`. Returns the text and the index of the last byte consumed
/// in `tail` (the part after `&`), matching the terminated case where that byte is the `;`.
fn decode_unterminated(tail: &str) -> Option<(String, usize)> {
    if let Some(num) = tail.strip_prefix('#') {
        let (hex, digits) = match num.strip_prefix(['x', 'X']) {
            Some(h) => (true, h),
            None => (false, num),
        };
        let len = digits
            .find(|c: char| !(if hex { c.is_ascii_hexdigit() } else { c.is_ascii_digit() }))
            .unwrap_or(digits.len());
        if len == 0 {
            return None;
        }
        let code = u32::from_str_radix(&digits[..len], if hex { 16 } else { 10 }).ok()?;
        let prefix = if hex { 2 } else { 1 };
        return char::from_u32(code).map(|c| (c.to_string(), prefix + len - 1));
    }
    let name = LEGACY_ENTITIES.iter().find(|n| tail.starts_with(**n))?;
    let d = quick_xml::escape::resolve_html5_entity(name)?;
    Some((d.to_string(), name.len() - 1))
}

fn decode_entity(name: &str) -> Option<String> {
    if let Some(num) = name.strip_prefix('#') {
        let code = match num.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => num.parse::<u32>().ok()?,
        };
        return char::from_u32(code).map(String::from);
    }
    quick_xml::escape::resolve_html5_entity(name).map(str::to_string)
}

struct Frame {
    name: String,
    seen_child: bool,
    text: String,
}

/// SRV3 / timed-text XML → flat text.
///
/// Collects the leading text of every element whose tag name ends in "text"
/// (case-insensitive), HTML-unescapes each piece and joins them with spaces.
pub fn parse_srv3(xml: &str) -> String {
    parse_srv3_inner(xml).unwrap_or_default()
}

fn parse_srv3_inner(xml: &str) -> Option<String> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(false);

    let mut stack: Vec<Frame> = Vec::new();
    let mut saw_root = false;
    let mut out: Vec<String> = Vec::new();
    loop {
        match reader.read_event().ok()? {
            Event::Start(e) => {
                if stack.is_empty() && saw_root {
                    return None; // second root
                }
                saw_root = true;
                if let Some(parent) = stack.last_mut() {
                    parent.seen_child = true;
                }
                stack.push(Frame {
                    name: String::from_utf8_lossy(e.local_name().as_ref()).to_ascii_lowercase(),
                    seen_child: false,
                    text: String::new(),
                });
            }
            Event::Empty(_) => {
                saw_root = true;
                if let Some(parent) = stack.last_mut() {
                    parent.seen_child = true;
                }
            }
            Event::End(_) => {
                let frame = stack.pop()?;
                if frame.name.ends_with("text") {
                    let t = frame.text.trim();
                    if !t.is_empty() {
                        out.push(html_unescape(t));
                    }
                }
            }
            Event::Text(t) => {
                let s = t.unescape().ok()?;
                match stack.last_mut() {
                    Some(f) if !f.seen_child => f.text.push_str(&s),
                    Some(_) => {}
                    None if s.trim().is_empty() => {}
                    None => return None, // text outside the root element
                }
            }
            Event::CData(c) => {
                if let Some(f) = stack.last_mut() {
                    if !f.seen_child {
                        f.text.push_str(&String::from_utf8_lossy(&c.into_inner()));
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    if !stack.is_empty() || !saw_root {
        return None;
    }
    Some(out.join(" "))
}

/// TTML → flat text: the full text content of each `<p>`, `<br/>` read as a space.
pub fn parse_ttml(xml: &str) -> String {
    parse_ttml_inner(xml).unwrap_or_default()
}

fn parse_ttml_inner(xml: &str) -> Option<String> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(false);

    let mut depth_in_p = 0usize;
    let mut cur = String::new();
    let mut out: Vec<String> = Vec::new();
    loop {
        match reader.read_event().ok()? {
            Event::Start(e) => {
                if depth_in_p > 0 {
                    depth_in_p += 1;
                } else if e.local_name().as_ref().eq_ignore_ascii_case(b"p") {
                    depth_in_p = 1;
                    cur.clear();
                }
            }
            Event::Empty(e) => {
                if depth_in_p > 0 && e.local_name().as_ref().eq_ignore_ascii_case(b"br") {
                    cur.push(' ');
                }
            }
            Event::End(_) => {
                if depth_in_p > 0 {
                    depth_in_p -= 1;
                    if depth_in_p == 0 {
                        let line = cur.split_whitespace().collect::<Vec<_>>().join(" ");
                        if !line.is_empty() {
                            out.push(html_unescape(&line));
                        }
                    }
                }
            }
            Event::Text(t) => {
                if depth_in_p > 0 {
                    cur.push_str(&t.unescape().ok()?);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Some(out.join(" "))
}

#[derive(serde::Deserialize)]
struct Json3 {
    #[serde(default)]
    events: Vec<Json3Event>,
}

#[derive(serde::Deserialize)]
struct Json3Event {
    #[serde(default)]
    segs: Vec<Json3Seg>,
}

#[derive(serde::Deserialize)]
struct Json3Seg {
    #[serde(default)]
    utf8: String,
}

/// YouTube JSON3 captions → flat text (`events[].segs[].utf8`).
pub fn parse_json3(body: &str) -> String {
    let Ok(doc) = serde_json::from_str::<Json3>(body) else {
        return String::new();
    };
    doc.events
        .iter()
        .map(|ev| ev.segs.iter().map(|s| s.utf8.as_str()).collect::<String>())
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Best guess at the format of a payload whose extension told us nothing.
pub fn sniff_format(body: &str) -> CaptionFormat {
    if is_hls_playlist(body) {
        CaptionFormat::M3u8
    } else if body.contains("<text") && body.contains("</text>") {
        CaptionFormat::Srv3
    } else if body.contains("<tt") && body.contains("<p") {
        CaptionFormat::Ttml
    } else if body.trim_start().starts_with('{') && body.contains("\"events\"") {
        CaptionFormat::Json3
    } else {
        CaptionFormat::Vtt
    }
}

/// Parse an already-fetched, non-playlist payload according to `format`.
pub fn parse_payload(format: &CaptionFormat, body: &str) -> String {
    match format {
        CaptionFormat::Vtt | CaptionFormat::M3u8 => clean_vtt(body),
        CaptionFormat::Srv3 => parse_srv3(body),
        CaptionFormat::Ttml => parse_ttml(body),
        CaptionFormat::Json3 => parse_json3(body),
        CaptionFormat::Unknown => parse_payload(&sniff_format(body), body),
    }
}
