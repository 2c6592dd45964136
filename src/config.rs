use crate::ir::DashStyle;
use crate::theme::Theme;
use anyhow::{Context, anyhow};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Named styling constants for axis, tags, labels, bars and links.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StyleConfig {
    pub energy_axis_label: String,
    pub energy_axis_label_font_size: f32,
    pub energy_axis_label_font_weight: String,
    pub energy_axis_ticks_font_size: f32,
    pub energy_axis_ticks_width: f32,
    pub energy_axis_ticks_length: f32,
    pub energy_tags_color: String,
    pub energy_tags_font_size: f32,
    pub energy_tags_font_weight: String,
    /// Vertical clearance of the energy tag above its bar, in inches before
    /// rescaling to the energy span.
    pub energy_tags_offset: f32,
    pub level_labels_color: String,
    pub level_labels_font_size: f32,
    pub level_labels_font_weight: String,
    pub level_labels_offset: f32,
    pub level_labels_padding: f32,
    pub level_lines_color: String,
    pub level_lines_thickness: f32,
    pub links_color: String,
    pub links_width: f32,
    pub links_style: DashStyle,
}

impl Default for StyleConfig {
    fn default() -> Self {
        Self {
            energy_axis_label: "\u{0394}E (eV)".to_string(),
            energy_axis_label_font_size: 10.0,
            energy_axis_label_font_weight: "bold".to_string(),
            energy_axis_ticks_font_size: 10.0,
            energy_axis_ticks_width: 1.5,
            energy_axis_ticks_length: 6.0,
            energy_tags_color: "black".to_string(),
            energy_tags_font_size: 10.0,
            energy_tags_font_weight: "normal".to_string(),
            energy_tags_offset: 0.3,
            level_labels_color: "blue".to_string(),
            level_labels_font_size: 10.0,
            level_labels_font_weight: "normal".to_string(),
            level_labels_offset: 0.3,
            level_labels_padding: 1.0,
            level_lines_color: "black".to_string(),
            level_lines_thickness: 2.5,
            links_color: "black".to_string(),
            links_width: 1.5,
            links_style: DashStyle::Dashed,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutConfig {
    /// Gap between neighbouring columns, also used as the left margin.
    pub levels_horizontal_offset: f32,
    /// Nominal plot height in inches; the reference for offset rescaling.
    pub plot_height: f32,
    /// Factor from measured label width (points) to diagram units.
    pub label_width_scale: f32,
    /// Font size factor for sub- and superscript runs.
    pub script_scale: f32,
    /// Diagram units per inch of output width.
    pub units_per_inch: f32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            levels_horizontal_offset: 3.0,
            plot_height: 4.0,
            label_width_scale: 0.25,
            script_scale: 0.7,
            units_per_inch: 10.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    pub dpi: f32,
    pub background: String,
    /// Space left of the plot area for tick labels and the axis title, in pixels.
    pub margin_left: f32,
    pub margin_right: f32,
    pub margin_top: f32,
    pub margin_bottom: f32,
    pub label_line_height: f32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            dpi: 100.0,
            background: "#FFFFFF".to_string(),
            margin_left: 72.0,
            margin_right: 16.0,
            margin_top: 16.0,
            margin_bottom: 16.0,
            label_line_height: 1.2,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub theme: Theme,
    pub style: StyleConfig,
    pub layout: LayoutConfig,
    pub render: RenderConfig,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ConfigFile {
    theme: Option<String>,
    font_family: Option<String>,
    style: Option<StyleConfigFile>,
    layout: Option<LayoutConfigFile>,
    render: Option<RenderConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct StyleConfigFile {
    energy_axis_label: Option<String>,
    energy_axis_label_font_size: Option<f32>,
    energy_axis_label_font_weight: Option<String>,
    energy_axis_ticks_font_size: Option<f32>,
    energy_axis_ticks_width: Option<f32>,
    energy_axis_ticks_length: Option<f32>,
    energy_tags_color: Option<String>,
    energy_tags_font_size: Option<f32>,
    energy_tags_font_weight: Option<String>,
    energy_tags_offset: Option<f32>,
    level_labels_color: Option<String>,
    level_labels_font_size: Option<f32>,
    level_labels_font_weight: Option<String>,
    level_labels_offset: Option<f32>,
    level_labels_padding: Option<f32>,
    level_lines_color: Option<String>,
    level_lines_thickness: Option<f32>,
    links_color: Option<String>,
    links_width: Option<f32>,
    links_style: Option<DashStyle>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct LayoutConfigFile {
    levels_horizontal_offset: Option<f32>,
    plot_height: Option<f32>,
    label_width_scale: Option<f32>,
    script_scale: Option<f32>,
    units_per_inch: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct RenderConfigFile {
    dpi: Option<f32>,
    background: Option<String>,
    margin_left: Option<f32>,
    margin_right: Option<f32>,
    margin_top: Option<f32>,
    margin_bottom: Option<f32>,
    label_line_height: Option<f32>,
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let config = Config::default();
    let Some(path) = path else {
        return Ok(config);
    };

    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    let parsed: ConfigFile = json5::from_str(&contents)
        .with_context(|| format!("invalid config file {}", path.display()))?;
    apply_config_file(config, parsed)
}

/// Merges an `%%{init: {...}}%%` object over an existing configuration.
pub fn merge_init_config(config: Config, init: &str) -> anyhow::Result<Config> {
    let parsed: ConfigFile =
        json5::from_str(init).map_err(|err| anyhow!("invalid init directive: {err}"))?;
    apply_config_file(config, parsed)
}

fn apply_config_file(mut config: Config, parsed: ConfigFile) -> anyhow::Result<Config> {
    if let Some(name) = parsed.theme.as_deref() {
        config.theme = Theme::by_name(name).ok_or_else(|| anyhow!("unknown theme '{name}'"))?;
        config.render.background = config.theme.background.clone();
    }
    if let Some(v) = parsed.font_family {
        config.theme.font_family = v;
    }

    if let Some(style) = parsed.style {
        let target = &mut config.style;
        if let Some(v) = style.energy_axis_label {
            target.energy_axis_label = v;
        }
        if let Some(v) = style.energy_axis_label_font_size {
            target.energy_axis_label_font_size = v;
        }
        if let Some(v) = style.energy_axis_label_font_weight {
            target.energy_axis_label_font_weight = v;
        }
        if let Some(v) = style.energy_axis_ticks_font_size {
            target.energy_axis_ticks_font_size = v;
        }
        if let Some(v) = style.energy_axis_ticks_width {
            target.energy_axis_ticks_width = v;
        }
        if let Some(v) = style.energy_axis_ticks_length {
            target.energy_axis_ticks_length = v;
        }
        if let Some(v) = style.energy_tags_color {
            target.energy_tags_color = v;
        }
        if let Some(v) = style.energy_tags_font_size {
            target.energy_tags_font_size = v;
        }
        if let Some(v) = style.energy_tags_font_weight {
            target.energy_tags_font_weight = v;
        }
        if let Some(v) = style.energy_tags_offset {
            target.energy_tags_offset = v;
        }
        if let Some(v) = style.level_labels_color {
            target.level_labels_color = v;
        }
        if let Some(v) = style.level_labels_font_size {
            target.level_labels_font_size = v;
        }
        if let Some(v) = style.level_labels_font_weight {
            target.level_labels_font_weight = v;
        }
        if let Some(v) = style.level_labels_offset {
            target.level_labels_offset = v;
        }
        if let Some(v) = style.level_labels_padding {
            target.level_labels_padding = v;
        }
        if let Some(v) = style.level_lines_color {
            target.level_lines_color = v;
        }
        if let Some(v) = style.level_lines_thickness {
            target.level_lines_thickness = v;
        }
        if let Some(v) = style.links_color {
            target.links_color = v;
        }
        if let Some(v) = style.links_width {
            target.links_width = v;
        }
        if let Some(v) = style.links_style {
            target.links_style = v;
        }
    }

    if let Some(layout) = parsed.layout {
        if let Some(v) = layout.levels_horizontal_offset {
            config.layout.levels_horizontal_offset = v.max(0.0);
        }
        if let Some(v) = layout.plot_height {
            if v <= 0.0 {
                return Err(anyhow!("layout.plotHeight must be positive, got {v}"));
            }
            config.layout.plot_height = v;
        }
        if let Some(v) = layout.label_width_scale {
            config.layout.label_width_scale = v;
        }
        if let Some(v) = layout.script_scale {
            config.layout.script_scale = v;
        }
        if let Some(v) = layout.units_per_inch {
            if v <= 0.0 {
                return Err(anyhow!("layout.unitsPerInch must be positive, got {v}"));
            }
            config.layout.units_per_inch = v;
        }
    }

    if let Some(render) = parsed.render {
        if let Some(v) = render.dpi {
            config.render.dpi = v;
        }
        if let Some(v) = render.background {
            config.render.background = v;
        }
        if let Some(v) = render.margin_left {
            config.render.margin_left = v;
        }
        if let Some(v) = render.margin_right {
            config.render.margin_right = v;
        }
        if let Some(v) = render.margin_top {
            config.render.margin_top = v;
        }
        if let Some(v) = render.margin_bottom {
            config.render.margin_bottom = v;
        }
        if let Some(v) = render.label_line_height {
            config.render.label_line_height = v;
        }
    }

    Ok(config)
}
