use crate::ir::{DashStyle, LevelId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Script {
    Normal,
    Sub,
    Super,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextRun {
    pub text: String,
    pub script: Script,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextLine {
    pub runs: Vec<TextRun>,
    pub width: f32,
}

impl TextLine {
    /// The line with markup resolved and script positions dropped.
    pub fn plain_text(&self) -> String {
        self.runs.iter().map(|run| run.text.as_str()).collect()
    }
}

/// A measured, possibly multi-line label. Widths are in points at `font_size`.
#[derive(Debug, Clone, PartialEq)]
pub struct TextBlock {
    pub lines: Vec<TextLine>,
    pub width: f32,
    pub font_size: f32,
}

#[derive(Debug, Clone)]
pub struct LevelLayout {
    pub id: LevelId,
    pub order: usize,
    pub energy: f32,
    pub label: TextBlock,
    pub energy_tag_color: String,
    pub label_color: String,
    pub line_color: String,
    pub width: f32,
    pub start_position: f32,
}

impl LevelLayout {
    pub fn end_position(&self) -> f32 {
        self.start_position + self.width
    }

    pub fn center(&self) -> f32 {
        self.start_position + self.width / 2.0
    }
}

#[derive(Debug, Clone)]
pub struct ColumnLayout {
    pub order: usize,
    pub x: f32,
    pub width: f32,
    pub levels: Vec<LevelId>,
}

/// A link resolved to a segment from the right edge of the lower-id level to
/// the left edge of the higher-id level.
#[derive(Debug, Clone)]
pub struct LinkLayout {
    pub from: LevelId,
    pub to: LevelId,
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    pub color: String,
    pub width: f32,
    pub style: DashStyle,
}

/// Vertical clearance of annotations from their bar, in energy units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnnotationOffsets {
    pub energy_tag: f32,
    pub level_label: f32,
}

#[derive(Debug, Clone)]
pub struct Layout {
    pub levels: Vec<LevelLayout>,
    pub columns: Vec<ColumnLayout>,
    pub links: Vec<LinkLayout>,
    /// Extent from the origin to the right edge of the last column.
    pub width: f32,
    pub gap: f32,
    pub energy_min: f32,
    pub energy_max: f32,
    pub offsets: AnnotationOffsets,
}

impl Layout {
    pub fn level(&self, id: LevelId) -> Option<&LevelLayout> {
        self.levels.get(id.index())
    }

    pub fn energy_range(&self) -> f32 {
        self.energy_max - self.energy_min
    }
}
