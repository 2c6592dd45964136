use fontdb::{Database, Family, Query, Stretch, Style, Weight};
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::fmt::Debug;
use std::fs;
use std::hash::{Hash, Hasher};
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::warn;
use ttf_parser::Face;

/// Turns a single line of text at a font size (points) into a horizontal
/// extent in the same units.
///
/// Implementations must be deterministic for a given text, size and font.
pub trait WidthEstimator: Debug + Send + Sync {
    fn measure(&self, text: &str, font_size: f32) -> f32;
}

/// Measures with real glyph advances of the first installed face matching
/// `font_family`, falling back to [`CharWidthEstimator`] when no face is found.
#[derive(Debug, Clone)]
pub struct FontWidthEstimator {
    font_family: String,
}

impl FontWidthEstimator {
    pub fn new(font_family: impl Into<String>) -> Self {
        Self {
            font_family: font_family.into(),
        }
    }
}

impl WidthEstimator for FontWidthEstimator {
    fn measure(&self, text: &str, font_size: f32) -> f32 {
        measure_text_width(text, font_size, &self.font_family)
            .unwrap_or_else(|| CharWidthEstimator.measure(text, font_size))
    }
}

/// Font-independent estimate from a calibrated per-character width table.
#[derive(Debug, Clone, Copy, Default)]
pub struct CharWidthEstimator;

impl WidthEstimator for CharWidthEstimator {
    fn measure(&self, text: &str, font_size: f32) -> f32 {
        if font_size <= 0.0 {
            return 0.0;
        }
        text.chars()
            .filter(|ch| *ch != '\n')
            .map(char_width_factor)
            .sum::<f32>()
            * font_size
    }
}

fn char_width_factor(ch: char) -> f32 {
    // Advance widths in em for a DejaVu/Helvetica-like sans face.
    match ch {
        ' ' => 0.318,
        '\\' | '.' | ',' | ':' | ';' | '|' | '!' => 0.318,
        '(' | ')' | '[' | ']' | '{' | '}' => 0.39,
        '+' | '=' | '<' | '>' | '-' => 0.838,
        'A' | 'B' => 0.684,
        'C' => 0.698,
        'D' => 0.77,
        'E' => 0.632,
        'F' => 0.575,
        'G' => 0.775,
        'H' => 0.752,
        'I' => 0.295,
        'J' => 0.295,
        'K' => 0.656,
        'L' => 0.557,
        'M' => 0.863,
        'N' => 0.748,
        'O' => 0.787,
        'P' => 0.603,
        'Q' => 0.787,
        'R' => 0.695,
        'S' => 0.635,
        'T' => 0.611,
        'U' => 0.732,
        'V' => 0.684,
        'W' => 0.989,
        'X' => 0.685,
        'Y' => 0.611,
        'Z' => 0.685,
        'a' => 0.613,
        'b' | 'd' | 'g' | 'p' | 'q' => 0.635,
        'c' => 0.55,
        'e' => 0.615,
        'f' => 0.352,
        'h' | 'n' | 'u' => 0.634,
        'i' | 'l' => 0.278,
        'j' => 0.278,
        'k' => 0.579,
        'm' => 0.974,
        'o' => 0.612,
        'r' => 0.411,
        's' => 0.521,
        't' => 0.392,
        'v' | 'y' => 0.592,
        'w' => 0.818,
        'x' => 0.592,
        'z' => 0.525,
        '0'..='9' => 0.636,
        '\u{0394}' => 0.684,
        '\u{2021}' => 0.5,
        '@' | '#' | '%' | '&' => 0.838,
        _ => 0.6,
    }
}

static TEXT_MEASURER: Lazy<Mutex<TextMeasurer>> = Lazy::new(|| Mutex::new(TextMeasurer::new()));

pub fn measure_text_width(text: &str, font_size: f32, font_family: &str) -> Option<f32> {
    if text.is_empty() || font_size <= 0.0 {
        return Some(0.0);
    }
    let mut guard = TEXT_MEASURER.lock().ok()?;
    guard.measure(text, font_size, font_family)
}

struct TextMeasurer {
    db: Database,
    loaded_system_fonts: bool,
    faces: HashMap<String, Option<FontFace>>,
}

impl TextMeasurer {
    fn new() -> Self {
        Self {
            db: Database::new(),
            loaded_system_fonts: false,
            faces: HashMap::new(),
        }
    }

    fn measure(&mut self, text: &str, font_size: f32, font_family: &str) -> Option<f32> {
        let key = normalize_family_key(font_family);
        if !self.faces.contains_key(&key) {
            let face = self.load_face(&key);
            if face.is_none() {
                warn!(font_family = %key, "no font face found; using character table widths");
            }
            self.faces.insert(key.clone(), face);
        }
        let face = self.faces.get_mut(&key).and_then(|face| face.as_mut())?;
        Some(face.measure_width(text, font_size))
    }

    fn load_face(&mut self, family_key: &str) -> Option<FontFace> {
        if let Some(face) = load_cached_face(family_key) {
            return Some(face);
        }

        let names: Vec<&str> = family_key
            .split(',')
            .map(|part| part.trim().trim_matches('"').trim_matches('\''))
            .filter(|part| !part.is_empty())
            .collect();
        let mut families: Vec<Family<'_>> = names
            .iter()
            .copied()
            .map(|name| match name.to_ascii_lowercase().as_str() {
                "serif" => Family::Serif,
                "sans-serif" | "system-ui" | "-apple-system" => Family::SansSerif,
                "monospace" => Family::Monospace,
                "cursive" => Family::Cursive,
                "fantasy" => Family::Fantasy,
                _ => Family::Name(name),
            })
            .collect();
        if families.is_empty() {
            families.push(Family::SansSerif);
        }

        if !self.loaded_system_fonts {
            self.db.load_system_fonts();
            self.loaded_system_fonts = true;
        }

        let query = Query {
            families: &families,
            weight: Weight::NORMAL,
            stretch: Stretch::Normal,
            style: Style::Normal,
        };
        let id = self.db.query(&query)?;
        let mut loaded = None;
        self.db.with_face_data(id, |data, index| {
            let bytes = data.to_vec();
            if Face::parse(&bytes, index).is_ok() {
                store_cached_face(family_key, &bytes, index);
                loaded = FontFace::parse(bytes, index);
            }
        });
        loaded
    }
}

/// Advance widths of one parsed face, read eagerly so no borrow of the font
/// data outlives construction.
struct FontFace {
    units_per_em: f32,
    advances: HashMap<char, Option<u16>>,
    data: Vec<u8>,
    index: u32,
}

impl FontFace {
    fn parse(data: Vec<u8>, index: u32) -> Option<Self> {
        let face = Face::parse(&data, index).ok()?;
        let units_per_em = face.units_per_em().max(1) as f32;
        let mut advances = HashMap::new();
        for byte in 0x20u8..0x7f {
            let ch = byte as char;
            advances.insert(ch, glyph_advance(&face, ch));
        }
        Some(Self {
            units_per_em,
            advances,
            data,
            index,
        })
    }

    fn measure_width(&mut self, text: &str, font_size: f32) -> f32 {
        let scale = font_size / self.units_per_em;
        let fallback = font_size * 0.6;
        let mut width = 0.0f32;
        for ch in text.chars() {
            if ch == '\n' {
                continue;
            }
            let advance = match self.advances.get(&ch) {
                Some(advance) => *advance,
                None => {
                    let advance = Face::parse(&self.data, self.index)
                        .ok()
                        .and_then(|face| glyph_advance(&face, ch));
                    self.advances.insert(ch, advance);
                    advance
                }
            };
            width += match advance {
                Some(units) if units > 0 => units as f32 * scale,
                _ => fallback,
            };
        }
        width.max(0.0)
    }
}

fn glyph_advance(face: &Face<'_>, ch: char) -> Option<u16> {
    let glyph = face.glyph_index(ch)?;
    face.glyph_hor_advance(glyph)
}

fn normalize_family_key(font_family: &str) -> String {
    let trimmed = font_family.trim();
    if trimmed.is_empty() {
        "sans-serif".to_string()
    } else {
        trimmed.to_string()
    }
}

fn cache_paths(family_key: &str) -> Option<(PathBuf, PathBuf)> {
    let base = std::env::var_os("XDG_CACHE_HOME")
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".cache")))?;
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    family_key.hash(&mut hasher);
    let hash = hasher.finish();
    let dir = base.join("rpd").join("font-cache");
    Some((
        dir.join(format!("{hash:x}.font")),
        dir.join(format!("{hash:x}.meta")),
    ))
}

fn store_cached_face(family_key: &str, bytes: &[u8], index: u32) {
    let Some((font_path, meta_path)) = cache_paths(family_key) else {
        return;
    };
    if font_path.exists() {
        return;
    }
    if let Some(parent) = font_path.parent() {
        let _ = fs::create_dir_all(parent);
    }
    let _ = fs::write(&font_path, bytes);
    let _ = fs::write(&meta_path, index.to_string());
}

fn load_cached_face(family_key: &str) -> Option<FontFace> {
    let (font_path, meta_path) = cache_paths(family_key)?;
    if !font_path.exists() || !meta_path.exists() {
        return None;
    }
    let bytes = fs::read(font_path).ok()?;
    let index: u32 = fs::read_to_string(meta_path).ok()?.trim().parse().ok()?;
    FontFace::parse(bytes, index)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn char_estimator_scales_with_font_size() {
        let w10 = CharWidthEstimator.measure("product 1", 10.0);
        let w20 = CharWidthEstimator.measure("product 1", 20.0);
        assert!(w10 > 0.0);
        assert!((w20 - w10 * 2.0).abs() < 1e-3);
    }

    #[test]
    fn char_estimator_is_zero_for_empty_or_sizeless_text() {
        assert_eq!(CharWidthEstimator.measure("", 10.0), 0.0);
        assert_eq!(CharWidthEstimator.measure("TS", 0.0), 0.0);
    }

    #[test]
    fn char_width_factors_are_positive() {
        for ch in ['a', 'Z', ' ', '0', '+', '\u{0394}', '\u{4e2d}'] {
            assert!(char_width_factor(ch) > 0.0, "char {:?} has zero width", ch);
        }
    }

    #[test]
    fn font_estimator_is_deterministic() {
        let estimator = FontWidthEstimator::new("sans-serif");
        let first = estimator.measure("TS", 10.0);
        let second = estimator.measure("TS", 10.0);
        assert_eq!(first, second);
        assert!(first > 0.0);
    }

    #[test]
    fn empty_family_normalizes_to_sans_serif() {
        assert_eq!(normalize_family_key("  "), "sans-serif");
        assert_eq!(normalize_family_key(" Inter "), "Inter");
    }
}
