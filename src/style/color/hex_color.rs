use super::Color;
use std::borrow::Cow;

/// A hex color literal that keeps its source text alongside the parsed value.
#[derive(Debug, Clone)]
pub struct HexColor<'a> {
    raw: Cow<'a, str>,
    value: Option<Color>,
}

impl<'a> HexColor<'a> {
    pub fn new(hex: impl Into<Cow<'a, str>>) -> Self {
        let raw = hex.into();
        let value = parse(raw.as_bytes());
        HexColor { raw, value }
    }

    pub fn get_raw(&self) -> &str {
        &self.raw
    }

    pub fn is_valid(&self) -> bool {
        self.value.is_some()
    }

    pub fn color(&self) -> Color {
        self.value.unwrap_or(Color::TRANSPARENT)
    }
}

fn parse(bytes: &[u8]) -> Option<Color> {
    if !validate(bytes) {
        return None;
    }
    let color = match bytes.len() {
        4 => Color::rgb(
            hex_1_to_u8(bytes[1]) * 17,
            hex_1_to_u8(bytes[2]) * 17,
            hex_1_to_u8(bytes[3]) * 17,
        ),
        5 => Color::rgba(
            hex_1_to_u8(bytes[1]) * 17,
            hex_1_to_u8(bytes[2]) * 17,
            hex_1_to_u8(bytes[3]) * 17,
            hex_1_to_u8(bytes[4]) * 17,
        ),
        7 => Color::rgb(
            hex_2_to_u8(bytes[1], bytes[2]),
            hex_2_to_u8(bytes[3], bytes[4]),
            hex_2_to_u8(bytes[5], bytes[6]),
        ),
        9 => Color::rgba(
            hex_2_to_u8(bytes[1], bytes[2]),
            hex_2_to_u8(bytes[3], bytes[4]),
            hex_2_to_u8(bytes[5], bytes[6]),
            hex_2_to_u8(bytes[7], bytes[8]),
        ),
        _ => return None,
    };
    Some(color)
}

fn validate(bytes: &[u8]) -> bool {
    let length = bytes.len();

    if length == 0 || bytes[0] != b'#' {
        return false;
    }

    if length != 4 && length != 5 && length != 7 && length != 9 {
        return false;
    }

    bytes[1..].iter().all(|c| c.is_ascii_hexdigit())
}

fn hex_1_to_u8(c: u8) -> u8 {
    match c {
        b'0'..=b'9' => c - b'0',
        b'a'..=b'f' => c - b'a' + 10,
        b'A'..=b'F' => c - b'A' + 10,
        _ => 0,
    }
}

fn hex_2_to_u8(c1: u8, c2: u8) -> u8 {
    (hex_1_to_u8(c1) << 4) | hex_1_to_u8(c2)
}
