//! Screen-space cull: which shading points need a photon query.

use rayon::prelude::*;

use crate::primary::{VisibilityBuffer, VisibilitySample};

/// One shading point that gathers photons.
#[derive(Debug, Clone, Copy)]
pub struct WorkItem {
    /// Linear pixel index into the frame.
    pub pixel: u32,
    pub sample: VisibilitySample,
}

/// Compact list of work items grouped by tile.
#[derive(Debug, Clone, Default)]
pub struct WorkList {
    pub tile_size: u32,
    pub tiles_x: u32,
    pub tiles_y: u32,
    pub active_tiles: u32,
    pub items: Vec<WorkItem>,
}

impl WorkList {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }
}

/// A visibility sample worth a density query: it sees some light path.
#[inline]
fn wants_query(sample: &VisibilitySample) -> bool {
    sample.throughput.max_element() > 0.0 && sample.albedo.max_element() > 0.0
}

/// Scan the visibility buffer tile by tile and keep only tiles with work.
pub fn cull(visibility: &VisibilityBuffer, tile_size: u32) -> WorkList {
    let tile_size = tile_size.max(1);
    let (width, height) = visibility.dimensions();
    let tiles_x = width.div_ceil(tile_size);
    let tiles_y = height.div_ceil(tile_size);

    let tiles: Vec<Vec<WorkItem>> = (0..tiles_x * tiles_y)
        .into_par_iter()
        .map(|tile| {
            let x0 = (tile % tiles_x) * tile_size;
            let y0 = (tile / tiles_x) * tile_size;
            let mut items = Vec::new();
            for y in y0..(y0 + tile_size).min(height) {
                for x in x0..(x0 + tile_size).min(width) {
                    if let Some(sample) = visibility.get(x, y) {
                        if wants_query(&sample) {
                            items.push(WorkItem { pixel: visibility.index(x, y) as u32, sample });
                        }
                    }
                }
            }
            items
        })
        .collect();

    let active_tiles = tiles.iter().filter(|t| !t.is_empty()).count() as u32;
    WorkList {
        tile_size,
        tiles_x,
        tiles_y,
        active_tiles,
        items: tiles.into_iter().flatten().collect(),
    }
}
