use bitflags::bitflags;

/// The closed set of roles platform accessibility bridges understand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AccessibilityRole {
    #[default]
    None,
    Container,
    Text,
    Button,
    Link,
    TextField,
    ComboBox,
    ListItem,
    Menu,
    MenuItem,
    TabList,
    Tab,
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct AccessibilityTraits: u32 {
        const FOCUSABLE = 1 << 0;
        const FOCUSED = 1 << 1;
        const DISABLED = 1 << 2;
        const SELECTED = 1 << 3;
        const CHECKED = 1 << 4;
        const EXPANDED = 1 << 5;
        const HAS_POPUP = 1 << 6;
        const LINK = 1 << 7;
        const HIDDEN = 1 << 8;
        const READ_ONLY = 1 << 9;
        const PASSWORD = 1 << 10;
    }
}
