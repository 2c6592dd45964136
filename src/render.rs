use crate::config::{Config, RenderConfig};
use crate::layout::{FLAT_ENERGY_SPAN, Layout, LinkLayout, Script, TextBlock, TextLine};
use crate::text_metrics::{CharWidthEstimator, WidthEstimator};
use anyhow::Result;
use std::fmt::Write as _;
use std::path::Path;

/// Cap height and descent as fractions of the font size.
const ASCENT: f32 = 0.8;
const DESCENT: f32 = 0.2;
const TICK_PAD_PT: f32 = 3.5;

/// Formats an energy tag: zero is bare, everything else carries its sign.
pub fn format_energy(energy: f32) -> String {
    if energy == 0.0 {
        "0".to_string()
    } else {
        format!("{energy:+}")
    }
}

/// Maps diagram coordinates (layout units across, energy up) to SVG pixels.
struct Frame {
    origin_x: f32,
    px_per_unit: f32,
    top: f32,
    plot_height: f32,
    y_lo: f32,
    y_hi: f32,
    dpi: f32,
}

impl Frame {
    fn new(layout: &Layout, config: &Config) -> Self {
        let render = &config.render;
        let range = layout.energy_range();
        let pad = if range > 0.0 {
            0.05 * range
        } else {
            FLAT_ENERGY_SPAN / 2.0
        };
        let y_lo = layout.energy_min - layout.offsets.level_label.abs() - pad;
        let y_hi = layout.energy_max + layout.offsets.energy_tag.abs() + pad;
        Self {
            origin_x: render.margin_left,
            px_per_unit: render.dpi / config.layout.units_per_inch,
            top: render.margin_top,
            plot_height: config.layout.plot_height * render.dpi,
            y_lo,
            y_hi,
            dpi: render.dpi,
        }
    }

    fn x(&self, units: f32) -> f32 {
        self.origin_x + units * self.px_per_unit
    }

    fn y(&self, energy: f32) -> f32 {
        self.top + (self.y_hi - energy) / (self.y_hi - self.y_lo) * self.plot_height
    }

    fn pt(&self, points: f32) -> f32 {
        points * self.dpi / 72.0
    }
}

pub fn render_svg(layout: &Layout, config: &Config) -> String {
    let frame = Frame::new(layout, config);
    let style = &config.style;
    let theme = &config.theme;
    let render = &config.render;

    let plot_width = (layout.width + layout.gap) * frame.px_per_unit;
    let width = render.margin_left + plot_width + render.margin_right;
    let height = render.margin_top + frame.plot_height + render.margin_bottom;

    let mut svg = String::new();
    let _ = write!(
        svg,
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{width:.2}\" height=\"{height:.2}\" viewBox=\"0 0 {width:.2} {height:.2}\">",
    );
    let _ = write!(
        svg,
        "<rect width=\"100%\" height=\"100%\" fill=\"{}\"/>",
        escape_xml(&render.background)
    );

    render_axis(&mut svg, &frame, config);

    for link in &layout.links {
        svg.push_str(&link_svg(link, &frame));
    }

    for level in &layout.levels {
        let x1 = frame.x(level.start_position);
        let x2 = frame.x(level.end_position());
        let y = frame.y(level.energy);
        let _ = write!(
            svg,
            "<line x1=\"{x1:.2}\" y1=\"{y:.2}\" x2=\"{x2:.2}\" y2=\"{y:.2}\" stroke=\"{}\" stroke-width=\"{:.2}\"/>",
            escape_xml(&level.line_color),
            frame.pt(style.level_lines_thickness)
        );

        let center = frame.x(level.center());
        let tag_size = frame.pt(style.energy_tags_font_size);
        let tag_top = frame.y(level.energy + layout.offsets.energy_tag);
        let _ = write!(
            svg,
            "<text x=\"{center:.2}\" y=\"{:.2}\" text-anchor=\"middle\" font-family=\"{}\" font-size=\"{tag_size:.2}\" font-weight=\"{}\" fill=\"{}\">{}</text>",
            tag_top + tag_size * ASCENT,
            escape_xml(&theme.font_family),
            escape_xml(&style.energy_tags_font_weight),
            escape_xml(&level.energy_tag_color),
            escape_xml(&format_energy(level.energy))
        );

        let label_bottom = frame.y(level.energy - layout.offsets.level_label);
        svg.push_str(&label_svg(
            center,
            label_bottom,
            &level.label,
            &level.label_color,
            &frame,
            config,
        ));
    }

    svg.push_str("</svg>");
    svg
}

fn render_axis(svg: &mut String, frame: &Frame, config: &Config) {
    let style = &config.style;
    let theme = &config.theme;
    let axis_x = frame.origin_x;
    let tick_len = frame.pt(style.energy_axis_ticks_length);
    let tick_width = frame.pt(style.energy_axis_ticks_width);
    let tick_size = frame.pt(style.energy_axis_ticks_font_size);
    let color = escape_xml(&theme.axis_color);

    let _ = write!(
        svg,
        "<line x1=\"{axis_x:.2}\" y1=\"{:.2}\" x2=\"{axis_x:.2}\" y2=\"{:.2}\" stroke=\"{color}\" stroke-width=\"{:.2}\"/>",
        frame.top,
        frame.top + frame.plot_height,
        frame.pt(0.8)
    );

    let ticks = nice_ticks(frame.y_lo, frame.y_hi, 6);
    let decimals = ticks.get(1).zip(ticks.first()).map_or(1, |(b, a)| tick_decimals(b - a));
    let mut widest = 0.0f32;
    for tick in ticks {
        let y = frame.y(tick);
        let label = format!("{tick:.decimals$}");
        widest = widest.max(CharWidthEstimator.measure(&label, tick_size));
        let _ = write!(
            svg,
            "<line x1=\"{:.2}\" y1=\"{y:.2}\" x2=\"{axis_x:.2}\" y2=\"{y:.2}\" stroke=\"{color}\" stroke-width=\"{tick_width:.2}\"/>",
            axis_x - tick_len
        );
        let _ = write!(
            svg,
            "<text x=\"{:.2}\" y=\"{:.2}\" text-anchor=\"end\" font-family=\"{}\" font-size=\"{tick_size:.2}\" fill=\"{}\">{}</text>",
            axis_x - tick_len - frame.pt(TICK_PAD_PT),
            y + tick_size * (ASCENT - DESCENT) / 2.0,
            escape_xml(&theme.font_family),
            escape_xml(&theme.tick_label_color),
            escape_xml(&label)
        );
    }

    let label_size = frame.pt(style.energy_axis_label_font_size);
    let label_x = (axis_x - tick_len - frame.pt(TICK_PAD_PT) * 2.0 - widest - label_size * DESCENT)
        .max(label_size * ASCENT);
    let label_y = frame.top + frame.plot_height / 2.0;
    let _ = write!(
        svg,
        "<text x=\"{label_x:.2}\" y=\"{label_y:.2}\" transform=\"rotate(-90 {label_x:.2} {label_y:.2})\" text-anchor=\"middle\" font-family=\"{}\" font-size=\"{label_size:.2}\" font-weight=\"{}\" fill=\"{}\">{}</text>",
        escape_xml(&theme.font_family),
        escape_xml(&style.energy_axis_label_font_weight),
        escape_xml(&theme.tick_label_color),
        escape_xml(&style.energy_axis_label)
    );
}

fn link_svg(link: &LinkLayout, frame: &Frame) -> String {
    let stroke_width = frame.pt(link.width);
    let pattern = link.style.pattern();
    let dash = if pattern.is_empty() {
        String::new()
    } else {
        let values: Vec<String> = pattern
            .iter()
            .map(|step| format!("{:.2}", step * stroke_width))
            .collect();
        format!(" stroke-dasharray=\"{}\"", values.join(" "))
    };
    format!(
        "<line x1=\"{:.2}\" y1=\"{:.2}\" x2=\"{:.2}\" y2=\"{:.2}\" stroke=\"{}\" stroke-width=\"{stroke_width:.2}\"{dash}/>",
        frame.x(link.x1),
        frame.y(link.y1),
        frame.x(link.x2),
        frame.y(link.y2),
        escape_xml(&link.color)
    )
}

/// Draws a label whose last line rests on `bottom`.
fn label_svg(
    x: f32,
    bottom: f32,
    label: &TextBlock,
    color: &str,
    frame: &Frame,
    config: &Config,
) -> String {
    let font_size = frame.pt(label.font_size);
    let line_height = font_size * config.render.label_line_height;
    let last_baseline = bottom - font_size * DESCENT;
    let first_baseline = last_baseline - (label.lines.len().saturating_sub(1)) as f32 * line_height;

    let mut text = String::new();
    for (idx, line) in label.lines.iter().enumerate() {
        if line.runs.is_empty() {
            continue;
        }
        let y = first_baseline + idx as f32 * line_height;
        let _ = write!(
            text,
            "<text x=\"{x:.2}\" y=\"{y:.2}\" text-anchor=\"middle\" font-family=\"{}\" font-size=\"{font_size:.2}\" font-weight=\"{}\" fill=\"{}\">{}</text>",
            escape_xml(&config.theme.font_family),
            escape_xml(&config.style.level_labels_font_weight),
            escape_xml(color),
            line_runs_svg(line, font_size * config.layout.script_scale)
        );
    }
    text
}

fn line_runs_svg(line: &TextLine, script_size: f32) -> String {
    let mut out = String::new();
    for run in &line.runs {
        let text = escape_xml(&run.text);
        match run.script {
            Script::Normal => {
                let _ = write!(out, "<tspan>{text}</tspan>");
            }
            Script::Sub => {
                let _ = write!(
                    out,
                    "<tspan baseline-shift=\"sub\" font-size=\"{script_size:.2}\">{text}</tspan>"
                );
            }
            Script::Super => {
                let _ = write!(
                    out,
                    "<tspan baseline-shift=\"super\" font-size=\"{script_size:.2}\">{text}</tspan>"
                );
            }
        }
    }
    out
}

/// Tick values covering `[lo, hi]` on a 1/2/2.5/5 x 10^k grid.
fn nice_ticks(lo: f32, hi: f32, target: usize) -> Vec<f32> {
    if !(hi > lo) || target == 0 {
        return Vec::new();
    }
    let raw = (hi - lo) / target as f32;
    let magnitude = 10f32.powf(raw.log10().floor());
    let step = [1.0, 2.0, 2.5, 5.0, 10.0]
        .iter()
        .map(|factor| factor * magnitude)
        .find(|step| *step >= raw)
        .unwrap_or(10.0 * magnitude);

    let scale = 10f32.powi(tick_decimals(step) as i32);
    let first = (lo / step).ceil() as i64;
    let last = (hi / step).floor() as i64;
    (first..=last)
        .map(|k| {
            let value = (k as f32 * step * scale).round() / scale;
            if value == 0.0 { 0.0 } else { value }
        })
        .collect()
}

fn tick_decimals(step: f32) -> usize {
    (0..6)
        .find(|d| {
            let scaled = step * 10f32.powi(*d as i32);
            (scaled - scaled.round()).abs() < 1e-3
        })
        .unwrap_or(6)
}

pub fn write_output_svg(svg: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => std::fs::write(path, svg)?,
        None => print!("{svg}"),
    }
    Ok(())
}

#[cfg(feature = "png")]
pub fn write_output_png(svg: &str, output: &Path, render_cfg: &RenderConfig) -> Result<()> {
    let mut opt = usvg::Options::default();
    opt.fontdb_mut().load_system_fonts();
    opt.dpi = render_cfg.dpi;

    let tree = usvg::Tree::from_str(svg, &opt)?;
    let size = tree.size().to_int_size();
    let mut pixmap = resvg::tiny_skia::Pixmap::new(size.width(), size.height())
        .ok_or_else(|| anyhow::anyhow!("Failed to allocate pixmap"))?;

    resvg::render(&tree, resvg::tiny_skia::Transform::default(), &mut pixmap.as_mut());
    pixmap.save_png(output)?;
    Ok(())
}

#[cfg(not(feature = "png"))]
pub fn write_output_png(_svg: &str, _output: &Path, _render_cfg: &RenderConfig) -> Result<()> {
    Err(anyhow::anyhow!("PNG output requires the `png` feature"))
}

fn escape_xml(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Diagram, LevelId, LevelStyle, LinkStyle};
    use crate::layout::compute_layout;
    use crate::text_metrics::CharWidthEstimator;

    fn sample() -> (Layout, Config) {
        let config = Config::default();
        let mut d = Diagram::with_estimator(&config, CharWidthEstimator);
        let r = d.add_level(1.1, "R & <S>", false, LevelStyle::default());
        let ts = d.add_level(
            0.0,
            "TS$^\\ddagger$",
            false,
            LevelStyle {
                line_color: Some("#d62728".to_string()),
                ..Default::default()
            },
        );
        let p = d.add_level(-0.5, "$H_2O$\\nproduct", false, LevelStyle::default());
        d.add_link(r, ts, LinkStyle::default()).unwrap();
        d.add_link(
            ts,
            p,
            LinkStyle {
                style: Some(crate::ir::DashStyle::Solid),
                ..Default::default()
            },
        )
        .unwrap();
        let layout = compute_layout(&d, &config.layout).unwrap();
        (layout, config)
    }

    #[test]
    fn energy_tags_carry_explicit_sign() {
        assert_eq!(format_energy(0.0), "0");
        assert_eq!(format_energy(-0.0), "0");
        assert_eq!(format_energy(1.1), "+1.1");
        assert_eq!(format_energy(-0.5), "-0.5");
    }

    #[test]
    fn render_svg_basic() {
        let (layout, config) = sample();
        let svg = render_svg(&layout, &config);
        assert!(svg.starts_with("<svg"));
        assert!(svg.ends_with("</svg>"));
        assert!(svg.contains(">+1.1<"));
        assert!(svg.contains(">0<"));
        assert!(svg.contains(">-0.5<"));
        assert!(svg.contains("R &amp; &lt;S&gt;"));
        assert!(svg.contains("stroke=\"#d62728\""));
        assert!(svg.contains("\u{0394}E (eV)"));
    }

    #[test]
    fn scripts_render_as_shifted_tspans() {
        let (layout, config) = sample();
        let svg = render_svg(&layout, &config);
        assert!(svg.contains("baseline-shift=\"super\""));
        assert!(svg.contains("baseline-shift=\"sub\""));
        assert!(svg.contains(">product<"));
    }

    #[test]
    fn only_dashed_links_get_a_dasharray() {
        let (layout, config) = sample();
        let svg = render_svg(&layout, &config);
        assert_eq!(svg.matches("stroke-dasharray").count(), 1);
    }

    #[test]
    fn canvas_width_follows_layout_width() {
        let (layout, config) = sample();
        let svg = render_svg(&layout, &config);
        let expected = config.render.margin_left
            + (layout.width + layout.gap) * (config.render.dpi / config.layout.units_per_inch)
            + config.render.margin_right;
        assert!(svg.contains(&format!("width=\"{expected:.2}\"")));
    }

    #[test]
    fn bars_sit_at_level_energy() {
        let (layout, config) = sample();
        let frame = Frame::new(&layout, &config);
        let level = layout.level(LevelId(0)).unwrap();
        let y_top = frame.y(layout.energy_max);
        let y_bottom = frame.y(layout.energy_min);
        assert!(frame.y(level.energy) <= y_bottom);
        assert!(y_top < y_bottom);
        assert!(frame.y(frame.y_hi) - frame.top < 1e-3);
    }

    fn tag_clearance_inches(layout: &Layout, config: &Config) -> f32 {
        let frame = Frame::new(layout, config);
        let level = &layout.levels[0];
        let px = frame.y(level.energy) - frame.y(level.energy + layout.offsets.energy_tag);
        px / config.render.dpi
    }

    #[test]
    fn flat_diagram_keeps_annotations_near_the_bar() {
        let config = Config::default();
        let mut d = Diagram::with_estimator(&config, CharWidthEstimator);
        d.add_level(0.5, "only", false, LevelStyle::default());
        let single = compute_layout(&d, &config.layout).unwrap();
        d.add_level(0.5, "twin", false, LevelStyle::default());
        let pair = compute_layout(&d, &config.layout).unwrap();

        let (sloped, _) = sample();
        let normal = tag_clearance_inches(&sloped, &config);
        for layout in [&single, &pair] {
            let clearance = tag_clearance_inches(layout, &config);
            assert!(clearance > 0.2 && clearance < 0.3, "clearance {clearance} in");
            assert!((clearance - normal).abs() < 0.05);
        }
    }

    #[test]
    fn nice_ticks_cover_range() {
        let ticks = nice_ticks(-1.2, 1.2, 6);
        assert_eq!(ticks.first().copied(), Some(-1.0));
        assert_eq!(ticks.last().copied(), Some(1.0));
        assert!(ticks.contains(&0.0));
        assert!(nice_ticks(1.0, 1.0, 6).is_empty());
        assert_eq!(tick_decimals(0.5), 1);
        assert_eq!(tick_decimals(0.25), 2);
        assert_eq!(tick_decimals(2.0), 0);
    }
}
