use crate::config::{Config, LayoutConfig, StyleConfig};
use crate::error::DiagramError;
use crate::layout::TextBlock;
use crate::layout::measure_label;
use crate::text_metrics::{FontWidthEstimator, WidthEstimator};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Positional identifier of a level: its index in insertion order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LevelId(pub usize);

impl LevelId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for LevelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Line pattern, spelled the way matplotlib spells it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum DashStyle {
    Solid,
    #[default]
    Dashed,
    Dotted,
    DashDot,
}

impl DashStyle {
    pub fn as_str(self) -> &'static str {
        match self {
            DashStyle::Solid => "-",
            DashStyle::Dashed => "--",
            DashStyle::Dotted => ":",
            DashStyle::DashDot => "-.",
        }
    }

    /// Dash/gap pattern in multiples of the line width; empty for solid lines.
    pub fn pattern(self) -> &'static [f32] {
        match self {
            DashStyle::Solid => &[],
            DashStyle::Dashed => &[3.7, 1.6],
            DashStyle::Dotted => &[1.0, 1.65],
            DashStyle::DashDot => &[6.4, 1.6, 1.0, 1.6],
        }
    }
}

impl FromStr for DashStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "-" | "solid" => Ok(DashStyle::Solid),
            "--" | "dashed" => Ok(DashStyle::Dashed),
            ":" | "dotted" => Ok(DashStyle::Dotted),
            "-." | "dashdot" => Ok(DashStyle::DashDot),
            other => Err(format!("unknown line style '{other}'")),
        }
    }
}

impl TryFrom<String> for DashStyle {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<DashStyle> for String {
    fn from(value: DashStyle) -> Self {
        value.as_str().to_string()
    }
}

/// Optional per-level colors; unset fields take the diagram's style defaults.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct LevelStyle {
    pub energy_tag_color: Option<String>,
    pub label_color: Option<String>,
    pub line_color: Option<String>,
}

/// Optional per-link style; unset fields take the diagram's style defaults.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LinkStyle {
    pub color: Option<String>,
    pub width: Option<f32>,
    pub style: Option<DashStyle>,
}

#[derive(Debug, Clone)]
pub struct Level {
    pub id: LevelId,
    /// Column index; levels sharing it are stacked at the same horizontal extent.
    pub order: usize,
    pub energy: f32,
    pub label: String,
    pub label_block: TextBlock,
    pub energy_tag_color: String,
    pub label_color: String,
    pub line_color: String,
    /// Bar width in diagram units, fixed when the level is added.
    pub width: f32,
}

#[derive(Debug, Clone)]
pub struct Link {
    pub from: LevelId,
    pub to: LevelId,
    pub color: String,
    pub width: f32,
    pub style: DashStyle,
}

impl Link {
    /// The lower and higher level id, in that order.
    pub fn ordered(&self) -> (LevelId, LevelId) {
        (self.from.min(self.to), self.from.max(self.to))
    }
}

/// Append-only store of levels and links.
///
/// Style defaults and sizing parameters are captured when the diagram is
/// created, and every level and link resolves its style eagerly on insertion.
#[derive(Debug)]
pub struct Diagram {
    levels: Vec<Level>,
    links: Vec<Link>,
    style: StyleConfig,
    label_width_scale: f32,
    script_scale: f32,
    estimator: Box<dyn WidthEstimator>,
}

impl Diagram {
    pub fn new(config: &Config) -> Self {
        Self::with_estimator(config, FontWidthEstimator::new(&config.theme.font_family))
    }

    pub fn with_estimator(config: &Config, estimator: impl WidthEstimator + 'static) -> Self {
        Self::from_parts(&config.style, &config.layout, Box::new(estimator))
    }

    pub fn from_parts(
        style: &StyleConfig,
        layout: &LayoutConfig,
        estimator: Box<dyn WidthEstimator>,
    ) -> Self {
        Self {
            levels: Vec::new(),
            links: Vec::new(),
            style: style.clone(),
            label_width_scale: layout.label_width_scale,
            script_scale: layout.script_scale,
            estimator,
        }
    }

    /// Adds a level and returns its id.
    ///
    /// The first level opens column 0; later levels either join the previous
    /// level's column (`attach_to_previous`) or open the next one.
    pub fn add_level(
        &mut self,
        energy: f32,
        label: &str,
        attach_to_previous: bool,
        style: LevelStyle,
    ) -> LevelId {
        let order = match self.levels.last() {
            Some(last) if attach_to_previous => last.order,
            Some(last) => last.order + 1,
            None => 0,
        };

        let label_block = measure_label(
            label,
            self.style.level_labels_font_size,
            self.script_scale,
            self.estimator.as_ref(),
        );
        let width = label_block.width * self.label_width_scale + self.style.level_labels_padding;

        let id = LevelId(self.levels.len());
        self.levels.push(Level {
            id,
            order,
            energy,
            label: label.to_string(),
            label_block,
            energy_tag_color: style
                .energy_tag_color
                .unwrap_or_else(|| self.style.energy_tags_color.clone()),
            label_color: style
                .label_color
                .unwrap_or_else(|| self.style.level_labels_color.clone()),
            line_color: style
                .line_color
                .unwrap_or_else(|| self.style.level_lines_color.clone()),
            width,
        });
        id
    }

    /// Connects two existing levels. Nothing is added when either id is unknown.
    pub fn add_link(
        &mut self,
        first: LevelId,
        second: LevelId,
        style: LinkStyle,
    ) -> Result<(), DiagramError> {
        let level_count = self.levels.len();
        for id in [first, second] {
            if id.index() >= level_count {
                return Err(DiagramError::InvalidReference { id, level_count });
            }
        }
        self.links.push(Link {
            from: first,
            to: second,
            color: style.color.unwrap_or_else(|| self.style.links_color.clone()),
            width: style.width.unwrap_or(self.style.links_width),
            style: style.style.unwrap_or(self.style.links_style),
        });
        Ok(())
    }

    /// Style defaults captured when the diagram was created.
    pub fn style(&self) -> &StyleConfig {
        &self.style
    }

    pub fn levels(&self) -> &[Level] {
        &self.levels
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    pub fn level(&self, id: LevelId) -> Option<&Level> {
        self.levels.get(id.index())
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Column index of the last level, `None` for an empty diagram.
    pub fn max_order(&self) -> Option<usize> {
        self.levels.last().map(|level| level.order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text_metrics::CharWidthEstimator;

    fn diagram() -> Diagram {
        Diagram::with_estimator(&Config::default(), CharWidthEstimator)
    }

    #[test]
    fn orders_follow_attachment_flags() {
        let mut d = diagram();
        let flags = [false, true, false, false, true, true, false];
        for (idx, attach) in flags.iter().enumerate() {
            d.add_level(idx as f32, "X", *attach, LevelStyle::default());
        }
        let orders: Vec<usize> = d.levels().iter().map(|l| l.order).collect();
        assert_eq!(orders, vec![0, 0, 1, 2, 2, 2, 3]);
        assert_eq!(d.max_order(), Some(3));
    }

    #[test]
    fn attaching_the_first_level_still_starts_at_zero() {
        let mut d = diagram();
        d.add_level(0.0, "A", true, LevelStyle::default());
        assert_eq!(d.levels()[0].order, 0);
    }

    #[test]
    fn ids_are_positional() {
        let mut d = diagram();
        let a = d.add_level(1.0, "A", false, LevelStyle::default());
        let b = d.add_level(2.0, "B", false, LevelStyle::default());
        assert_eq!(a, LevelId(0));
        assert_eq!(b, LevelId(1));
        assert_eq!(d.level(b).map(|l| l.energy), Some(2.0));
        assert!(d.level(LevelId(2)).is_none());
    }

    #[test]
    fn width_grows_with_label_and_includes_padding() {
        let mut d = diagram();
        let short = d.add_level(0.0, "TS", false, LevelStyle::default());
        let long = d.add_level(0.0, "a much longer product label", false, LevelStyle::default());
        let short_w = d.level(short).unwrap().width;
        let long_w = d.level(long).unwrap().width;
        assert!(short_w > 1.0);
        assert!(long_w > short_w);

        let empty = d.add_level(0.0, "", false, LevelStyle::default());
        assert_eq!(d.level(empty).unwrap().width, 1.0);
    }

    #[test]
    fn level_styles_default_from_config() {
        let mut d = diagram();
        let plain = d.add_level(0.0, "A", false, LevelStyle::default());
        let red = d.add_level(
            0.0,
            "B",
            false,
            LevelStyle {
                label_color: Some("red".to_string()),
                ..Default::default()
            },
        );
        assert_eq!(d.level(plain).unwrap().label_color, "blue");
        assert_eq!(d.level(red).unwrap().label_color, "red");
        assert_eq!(d.level(red).unwrap().line_color, "black");
        assert_eq!(d.level(red).unwrap().energy_tag_color, "black");
    }

    #[test]
    fn style_defaults_are_captured_at_creation() {
        let mut config = Config::default();
        let mut d = Diagram::with_estimator(&config, CharWidthEstimator);
        config.style.links_color = "green".to_string();
        let a = d.add_level(0.0, "A", false, LevelStyle::default());
        let b = d.add_level(1.0, "B", false, LevelStyle::default());
        d.add_link(a, b, LinkStyle::default()).unwrap();
        assert_eq!(d.links()[0].color, "black");
        assert_eq!(d.links()[0].style, DashStyle::Dashed);
        assert_eq!(d.links()[0].width, 1.5);
    }

    #[test]
    fn invalid_link_reference_is_reported_and_not_added() {
        let mut d = diagram();
        let a = d.add_level(0.0, "A", false, LevelStyle::default());
        let err = d.add_link(a, LevelId(1), LinkStyle::default()).unwrap_err();
        assert_eq!(
            err,
            DiagramError::InvalidReference {
                id: LevelId(1),
                level_count: 1
            }
        );
        let err = d.add_link(LevelId(7), a, LinkStyle::default()).unwrap_err();
        assert!(matches!(err, DiagramError::InvalidReference { id: LevelId(7), .. }));
        assert!(d.links().is_empty());
    }

    #[test]
    fn link_ordering_uses_ids() {
        let mut d = diagram();
        let a = d.add_level(0.0, "A", false, LevelStyle::default());
        let b = d.add_level(1.0, "B", false, LevelStyle::default());
        d.add_link(b, a, LinkStyle::default()).unwrap();
        assert_eq!(d.links()[0].ordered(), (a, b));
    }

    #[test]
    fn dash_styles_parse_matplotlib_spellings() {
        assert_eq!("--".parse::<DashStyle>(), Ok(DashStyle::Dashed));
        assert_eq!("dotted".parse::<DashStyle>(), Ok(DashStyle::Dotted));
        assert_eq!("-.".parse::<DashStyle>(), Ok(DashStyle::DashDot));
        assert_eq!("-".parse::<DashStyle>(), Ok(DashStyle::Solid));
        assert!("~~".parse::<DashStyle>().is_err());
        assert!(DashStyle::Solid.pattern().is_empty());
    }
}
