use crate::layout::Layout;
use crate::render::format_energy;
use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

#[derive(Debug, Serialize)]
pub struct LayoutDump {
    pub width: f32,
    pub gap: f32,
    pub energy_min: f32,
    pub energy_max: f32,
    pub energy_tag_offset: f32,
    pub level_label_offset: f32,
    pub columns: Vec<ColumnDump>,
    pub levels: Vec<LevelDump>,
    pub links: Vec<LinkDump>,
}

#[derive(Debug, Serialize)]
pub struct ColumnDump {
    pub order: usize,
    pub x: f32,
    pub width: f32,
    pub levels: Vec<usize>,
}

#[derive(Debug, Serialize)]
pub struct LevelDump {
    pub id: usize,
    /// Name from the description file, when the level came from one.
    pub name: Option<String>,
    pub order: usize,
    pub energy: f32,
    pub energy_tag: String,
    pub start_position: f32,
    pub width: f32,
    pub label_lines: Vec<String>,
    pub line_color: String,
}

#[derive(Debug, Serialize)]
pub struct LinkDump {
    pub from: usize,
    pub to: usize,
    pub points: [[f32; 2]; 2],
    pub style: String,
}

impl LayoutDump {
    /// `names` are optional source names indexed by level id.
    pub fn from_layout(layout: &Layout, names: &[String]) -> Self {
        let columns = layout
            .columns
            .iter()
            .map(|column| ColumnDump {
                order: column.order,
                x: column.x,
                width: column.width,
                levels: column.levels.iter().map(|id| id.index()).collect(),
            })
            .collect();

        let levels = layout
            .levels
            .iter()
            .map(|level| LevelDump {
                id: level.id.index(),
                name: names.get(level.id.index()).cloned(),
                order: level.order,
                energy: level.energy,
                energy_tag: format_energy(level.energy),
                start_position: level.start_position,
                width: level.width,
                label_lines: level.label.lines.iter().map(|line| line.plain_text()).collect(),
                line_color: level.line_color.clone(),
            })
            .collect();

        let links = layout
            .links
            .iter()
            .map(|link| LinkDump {
                from: link.from.index(),
                to: link.to.index(),
                points: [[link.x1, link.y1], [link.x2, link.y2]],
                style: link.style.as_str().to_string(),
            })
            .collect();

        LayoutDump {
            width: layout.width,
            gap: layout.gap,
            energy_min: layout.energy_min,
            energy_max: layout.energy_max,
            energy_tag_offset: layout.offsets.energy_tag,
            level_label_offset: layout.offsets.level_label,
            columns,
            levels,
            links,
        }
    }
}

pub fn write_layout_dump(path: &Path, layout: &Layout, names: &[String]) -> anyhow::Result<()> {
    let file = File::create(path)?;
    let writer = BufWriter::new(file);
    let dump = LayoutDump::from_layout(layout, names);
    serde_json::to_writer_pretty(writer, &dump)?;
    Ok(())
}
