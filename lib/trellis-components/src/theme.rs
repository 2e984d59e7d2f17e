use trellis::style::Color;

/// Colors shared by the composite controls.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Palette {
    pub text: Color,
    pub secondary_text: Color,
    pub disabled_text: Color,
    pub accent: Color,
    pub surface: Color,
    pub border: Color,
    pub hover: Color,
    pub selected: Color,
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            text: Color::hex("#111827"),
            secondary_text: Color::hex("#6B7280"),
            disabled_text: Color::hex("#9CA3AF"),
            accent: Color::hex("#1D4ED8"),
            surface: Color::hex("#FFFFFF"),
            border: Color::hex("#B0BEC5"),
            hover: Color::hex("#F5F7FA"),
            selected: Color::hex("#EEF3FE"),
        }
    }
}
