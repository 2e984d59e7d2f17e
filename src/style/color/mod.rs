mod hex_color;

pub use hex_color::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Color {
    r: u8,
    g: u8,
    b: u8,
    a: u8,
}

impl Color {
    pub const BLACK: Color = Color::rgb(0, 0, 0);
    pub const WHITE: Color = Color::rgb(255, 255, 255);
    pub const TRANSPARENT: Color = Color::rgba(0, 0, 0, 0);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const fn to_rgba_u8(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }

    /// Parses `#rgb`, `#rgba`, `#rrggbb` or `#rrggbbaa`. Malformed input
    /// yields a fully transparent color.
    pub fn hex(raw: &str) -> Self {
        HexColor::new(raw).color()
    }

    pub const fn alpha(self) -> u8 {
        self.a
    }

    pub const fn with_alpha(self, a: u8) -> Self {
        Self { a, ..self }
    }

    pub const fn is_transparent(self) -> bool {
        self.a == 0
    }
}

impl From<&str> for Color {
    fn from(value: &str) -> Self {
        Color::hex(value)
    }
}

#[cfg(test)]
mod tests {
    use super::Color;

    #[test]
    fn hex_parses_short_and_long_forms() {
        assert_eq!(Color::hex("#fff"), Color::WHITE);
        assert_eq!(Color::hex("#0000ff"), Color::rgb(0, 0, 255));
        assert_eq!(Color::hex("#11223344"), Color::rgba(0x11, 0x22, 0x33, 0x44));
    }

    #[test]
    fn malformed_hex_is_transparent() {
        assert!(Color::hex("blue").is_transparent());
        assert!(Color::hex("#12").is_transparent());
    }

    #[test]
    fn with_alpha_keeps_channels() {
        let faded = Color::from("#336699").with_alpha(0x80);
        assert_eq!(faded.to_rgba_u8(), [0x33, 0x66, 0x99, 0x80]);
        assert!(!faded.is_transparent());
    }
}
