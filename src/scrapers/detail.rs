//! Recovery of listing attributes from the client-state blob embedded in a detail page.
//!
//! The blob is assigned to `window.__PINIA__` inside an inline `<script>`. Its layout is
//! undocumented upstream and shifts between site releases, so every field below is read
//! independently: a missing or malformed block only costs that one field.

use crate::models::DetailAttributes;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use serde_json::Value;
use tracing::debug;

pub const STATE_MARKER: &str = "window.__PINIA__";

/// Unit token the site appends to mileage ("120 тис." = 120 000 km)
const THOUSANDS_TOKEN: &str = "тис.";

const CURRENCY_SYMBOLS: &[char] = &['$', '€', '₴', '£'];

static SCRIPT: Lazy<Selector> =
    Lazy::new(|| Selector::parse("script").expect("script selector is valid"));

static VIN_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b[A-HJ-NPR-Z0-9]{17}\b").expect("VIN regex is hardcoded and valid"));

/// Contact details attached to the listing's call-to-action phone button
#[derive(Debug, Clone, PartialEq)]
struct Contact {
    username: Option<String>,
    phone_number: Option<String>,
}

/// Extract every recoverable attribute from a detail page. Never fails.
pub fn extract(html: &str) -> DetailAttributes {
    let Some(state) = decode_state(html) else {
        return DetailAttributes::default();
    };
    let Some(structure) = first_structure(&state) else {
        debug!("Client state has no page structures");
        return DetailAttributes::default();
    };

    let mut attributes = DetailAttributes {
        car_vin: find_vin(structure),
        ..DetailAttributes::default()
    };

    let templates = children(structure);

    if let Some(raw) = find_block(templates, "price").and_then(|block| payload(block, "price")) {
        attributes.price_usd = price_from_value(raw);
    }

    if let Some(raw) = find_block(templates, "odometer")
        .and_then(|block| payload(block, "odometer"))
        .and_then(scalar_text)
    {
        attributes.odometer = parse_odometer(&raw);
    }

    if let Some(contact) = find_block(templates, "main").and_then(find_contact) {
        attributes.username = contact.username;
        attributes.phone_number = contact.phone_number;
    }

    attributes
}

/// Locate the state script and decode its object literal
fn decode_state(html: &str) -> Option<Value> {
    let document = Html::parse_document(html);
    let script = document
        .select(&SCRIPT)
        .map(|element| element.text().collect::<String>())
        .find(|text| text.contains(STATE_MARKER));

    let Some(script) = script else {
        debug!("No client state script on page");
        return None;
    };

    let literal = slice_object_literal(&script)?;
    match serde_json::from_str(literal) {
        Ok(state) => Some(state),
        Err(e) => {
            debug!("Client state blob is not valid JSON: {}", e);
            None
        }
    }
}

/// The `{...}` following the marker, up to its matching closing brace.
///
/// Braces inside string literals are ignored.
pub fn slice_object_literal(script: &str) -> Option<&str> {
    let after_marker = script.find(STATE_MARKER)? + STATE_MARKER.len();
    let start = after_marker + script[after_marker..].find('{')?;

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, &byte) in script.as_bytes()[start..].iter().enumerate() {
        if in_string {
            match byte {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match byte {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&script[start..=start + offset]);
                }
            }
            _ => {}
        }
    }

    None
}

/// First entry of `page.structures`, in document order.
///
/// Structure IDs are opaque and which one comes first depends on how the site
/// rendered the page.
fn first_structure(state: &Value) -> Option<&Value> {
    state
        .get("page")?
        .get("structures")?
        .as_object()?
        .values()
        .next()
}

/// Any VIN-shaped token anywhere in the structure, templates parsed or not
fn find_vin(structure: &Value) -> Option<String> {
    let serialized = serde_json::to_string(structure).ok()?;
    VIN_PATTERN
        .find(&serialized)
        .map(|m| m.as_str().to_string())
}

fn children(block: &Value) -> &[Value] {
    block
        .get("templates")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

fn find_block<'a>(blocks: &'a [Value], id: &str) -> Option<&'a Value> {
    blocks
        .iter()
        .find(|block| block.get("id").and_then(Value::as_str) == Some(id))
}

/// A block's component data lives under a key named after the block
fn payload<'a>(block: &'a Value, field: &str) -> Option<&'a Value> {
    block.get("component")?.get(field)
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn price_from_value(raw: &Value) -> u32 {
    match raw {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()).unwrap_or(0),
        Value::String(s) => parse_price(s),
        _ => 0,
    }
}

/// "12 345$" -> 12345. Anything unparseable is 0.
pub fn parse_price(raw: &str) -> u32 {
    let cleaned: String = raw
        .chars()
        .filter(|c| !c.is_whitespace() && !CURRENCY_SYMBOLS.contains(c))
        .collect();
    cleaned.parse().unwrap_or(0)
}

/// "120 тис." -> 120000 km. Anything else is unknown.
pub fn parse_odometer(raw: &str) -> Option<u32> {
    let lowered = raw.to_lowercase().replace(THOUSANDS_TOKEN, "");
    let digits = lowered.trim();
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    digits.parse::<u32>().ok()?.checked_mul(1000)
}

/// Depth-first search below `main` for a photo slider carrying a phone button
fn find_contact(main: &Value) -> Option<Contact> {
    children(main).iter().find_map(|block| {
        let is_slider = block.get("id").and_then(Value::as_str) == Some("photoSlider");
        let here = if is_slider { slider_contact(block) } else { None };
        here.or_else(|| find_contact(block))
    })
}

fn slider_contact(slider: &Value) -> Option<Contact> {
    let button = payload(slider, "photoSlider")?
        .pointer("/callToAction/buttons")?
        .as_array()?
        .iter()
        .find(|button| button.get("id").and_then(Value::as_str) == Some("autoPhone"))?;

    let params = button.pointer("/actionData/params");
    Some(Contact {
        username: params
            .and_then(|p| p.get("userName"))
            .and_then(Value::as_str)
            .map(str::to_string),
        phone_number: params.and_then(|p| p.get("phoneId")).and_then(scalar_text),
    })
}
