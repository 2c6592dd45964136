use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Theme {
    pub font_family: String,
    pub background: String,
    pub axis_color: String,
    pub tick_label_color: String,
}

impl Theme {
    /// Plain publication look: black axis on white, DejaVu-style sans.
    pub fn classic() -> Self {
        Self {
            font_family: "DejaVu Sans, Bitstream Vera Sans, Arial, sans-serif".to_string(),
            background: "#FFFFFF".to_string(),
            axis_color: "#000000".to_string(),
            tick_label_color: "#000000".to_string(),
        }
    }

    pub fn modern() -> Self {
        Self {
            font_family: "Inter, Segoe UI, system-ui, -apple-system, sans-serif".to_string(),
            background: "#FFFFFF".to_string(),
            axis_color: "#7A8AA6".to_string(),
            tick_label_color: "#1C2430".to_string(),
        }
    }

    pub fn by_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "classic" | "default" => Some(Self::classic()),
            "modern" => Some(Self::modern()),
            _ => None,
        }
    }
}

impl Default for Theme {
    fn default() -> Self {
        Self::classic()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_presets_resolve() {
        assert!(Theme::by_name("Modern").is_some());
        assert_eq!(
            Theme::by_name("default").map(|t| t.font_family),
            Some(Theme::classic().font_family)
        );
        assert!(Theme::by_name("neon").is_none());
    }
}
