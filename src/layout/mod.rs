mod text;
pub(crate) mod types;
pub(crate) use text::measure_label;
pub use types::*;

use crate::config::LayoutConfig;
use crate::error::DiagramError;
use crate::ir::Diagram;
use tracing::debug;

/// Energy span drawn for a diagram whose levels all share one energy.
pub const FLAT_ENERGY_SPAN: f32 = 1.0;

/// Positions every level of `diagram` and resolves its links.
///
/// Columns are laid out left to right in increasing order, starting one gap
/// from the origin and separated by `levels_horizontal_offset`. Each column is
/// as wide as its widest level and every member is centred in it. The
/// annotation offsets are rescaled from inches of plot height to energy units,
/// using [`FLAT_ENERGY_SPAN`] when every level shares one energy; neither
/// `diagram` nor `config` is modified, so repeated calls agree.
pub fn compute_layout(diagram: &Diagram, config: &LayoutConfig) -> Result<Layout, DiagramError> {
    let levels = diagram.levels();
    if levels.is_empty() {
        return Err(DiagramError::EmptyDiagram);
    }

    let gap = config.levels_horizontal_offset;
    let mut start_positions = vec![0.0f32; levels.len()];
    let mut columns = Vec::new();
    let mut cursor = gap;

    // Orders are contiguous and non-decreasing, so each column is one run.
    for members in levels.chunk_by(|a, b| a.order == b.order) {
        let order = members[0].order;
        let column_width = members.iter().map(|level| level.width).fold(0.0, f32::max);
        for level in members {
            start_positions[level.id.index()] = cursor + (column_width - level.width) / 2.0;
        }
        debug!(order, x = cursor, width = column_width, levels = members.len(), "placed column");
        columns.push(ColumnLayout {
            order,
            x: cursor,
            width: column_width,
            levels: members.iter().map(|level| level.id).collect(),
        });
        cursor += column_width + gap;
    }

    let (energy_min, energy_max) = levels
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), level| {
            (lo.min(level.energy), hi.max(level.energy))
        });
    let offsets = rescale_offsets(diagram, energy_max - energy_min, config.plot_height);

    let level_layouts: Vec<LevelLayout> = levels
        .iter()
        .zip(start_positions)
        .map(|(level, start_position)| LevelLayout {
            id: level.id,
            order: level.order,
            energy: level.energy,
            label: level.label_block.clone(),
            energy_tag_color: level.energy_tag_color.clone(),
            label_color: level.label_color.clone(),
            line_color: level.line_color.clone(),
            width: level.width,
            start_position,
        })
        .collect();

    let links = diagram
        .links()
        .iter()
        .map(|link| {
            let (left_id, right_id) = link.ordered();
            let left = &level_layouts[left_id.index()];
            let right = &level_layouts[right_id.index()];
            LinkLayout {
                from: link.from,
                to: link.to,
                x1: left.end_position(),
                y1: left.energy,
                x2: right.start_position,
                y2: right.energy,
                color: link.color.clone(),
                width: link.width,
                style: link.style,
            }
        })
        .collect();

    Ok(Layout {
        levels: level_layouts,
        columns,
        links,
        width: cursor - gap,
        gap,
        energy_min,
        energy_max,
        offsets,
    })
}

fn rescale_offsets(diagram: &Diagram, energy_range: f32, plot_height: f32) -> AnnotationOffsets {
    let span = if energy_range > 0.0 {
        energy_range
    } else {
        FLAT_ENERGY_SPAN
    };
    let factor = if plot_height > 0.0 {
        span / plot_height
    } else {
        1.0
    };
    debug!(energy_range, factor, "rescaled annotation offsets");
    let style = diagram.style();
    AnnotationOffsets {
        energy_tag: style.energy_tags_offset * factor,
        level_label: style.level_labels_offset * factor,
    }
}
