#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod error;
pub mod ir;
pub mod layout;
pub mod layout_dump;
pub mod parser;
pub mod render;
pub mod text_metrics;
pub mod theme;

#[cfg(feature = "cli")]
pub use cli::run;
pub use config::{Config, LayoutConfig, RenderConfig, StyleConfig, load_config};
pub use error::DiagramError;
pub use ir::{DashStyle, Diagram, Level, LevelId, LevelStyle, Link, LinkStyle};
pub use layout::{Layout, compute_layout};
pub use parser::{DiagramSource, parse_diagram};
pub use render::{format_energy, render_svg};
pub use text_metrics::{CharWidthEstimator, FontWidthEstimator, WidthEstimator};
pub use theme::Theme;

/// Lays out `diagram` and renders it to an SVG document.
pub fn render_diagram(diagram: &Diagram, config: &Config) -> Result<String, DiagramError> {
    let layout = compute_layout(diagram, &config.layout)?;
    Ok(render_svg(&layout, config))
}
