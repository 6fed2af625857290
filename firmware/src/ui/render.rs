use alloc::string::String;

/// Progress ring drawn around a tile, in degrees.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ProgressArc {
    pub start_angle: f32,
    pub sweep_angle: f32,
}

impl ProgressArc {
    /// Arc for a period fraction in `[0, 1)`: the elapsed part is cut from the start.
    pub fn from_progress(progress: f64) -> Self {
        let start_angle = (progress.clamp(0.0, 1.0) * 360.0) as f32;
        Self {
            start_angle,
            sweep_angle: 360.0 - start_angle,
        }
    }
}

/// Content written into one physical tile.
#[derive(Clone, Debug, PartialEq)]
pub struct TileView {
    pub index: usize,
    pub code: String,
    pub display_name: String,
    pub progress: ProgressArc,
    pub placeholder: bool,
}
