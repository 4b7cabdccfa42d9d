use std::rc::Rc;

use geodeck_engine::device::{GlContext, ProgramDesc, ProgramId, Topology, Uniforms};
use geodeck_engine::glam::DVec2;
use geodeck_engine::layer::{AttributeBuffers, Attributes, ChangeFlags, Layer, LayerContext, LayerState};
use geodeck_engine::viewport::{lng_lat_to_world, EARTH_CIRCUMFERENCE, TILE_SIZE};

/// Layer data. Identity is the change signal.
pub type Data<T> = Rc<Vec<T>>;

/// Reads one value out of a datum.
pub type Accessor<T, R> = Rc<dyn Fn(&T) -> R>;

/// Straight-alpha RGBA.
pub type Color = [u8; 4];

pub(crate) const POINTS: ProgramDesc = ProgramDesc {
    name: "geodeck-points",
    topology: Topology::Points,
};

pub(crate) const LINES: ProgramDesc = ProgramDesc {
    name: "geodeck-lines",
    topology: Topology::Lines,
};

pub(crate) const TRIANGLES: ProgramDesc = ProgramDesc {
    name: "geodeck-triangles",
    topology: Topology::Triangles,
};

/// `[lng, lat]` → zoom-independent mercator plus elevation in meters.
#[inline]
pub(crate) fn to_world(lng_lat: [f64; 2], elevation: f64) -> [f64; 3] {
    let w = lng_lat_to_world(DVec2::from_array(lng_lat), 1.0);
    [w.x, w.y, elevation]
}

/// Meters covered by one world unit (scale 1) at `latitude`.
#[inline]
pub(crate) fn meters_per_world_unit(latitude: f64) -> f64 {
    EARTH_CIRCUMFERENCE * latitude.to_radians().cos() / TILE_SIZE
}

#[inline]
pub(crate) fn lerp_color(a: Color, b: Color, t: f64) -> Color {
    let mix = |x: u8, y: u8| (x as f64 + (y as f64 - x as f64) * t).round().clamp(0.0, 255.0) as u8;
    [mix(a[0], b[0]), mix(a[1], b[1]), mix(a[2], b[2]), mix(a[3], b[3])]
}

/// One program plus the attribute buffers it draws.
pub(crate) struct Primitive {
    program: ProgramId,
    buffers: AttributeBuffers,
}

impl Primitive {
    /// Buffers are tracked by `state` and released with it.
    pub fn allocate(ctx: &mut LayerContext<'_>, state: &mut LayerState, desc: &ProgramDesc) -> anyhow::Result<Self> {
        let program = ctx.program(desc)?;
        let buffers = AttributeBuffers::allocate(&mut *ctx.gl, state);
        Ok(Self { program, buffers })
    }

    pub fn upload(&mut self, gl: &mut dyn GlContext, attrs: &Attributes) -> anyhow::Result<()> {
        self.buffers.upload(gl, attrs)?;
        Ok(())
    }

    pub fn vertex_count(&self) -> usize {
        self.buffers.vertex_count
    }

    pub fn draw(&self, gl: &mut dyn GlContext, uniforms: &Uniforms) -> anyhow::Result<()> {
        if self.buffers.vertex_count == 0 {
            return Ok(());
        }
        gl.draw(&self.buffers.draw_call(self.program, uniforms))?;
        Ok(())
    }
}

/// Collects the kind-specific prop diff of a layer against its previous
/// instance.
pub(crate) struct PropDiff {
    flags: ChangeFlags,
}

impl PropDiff {
    /// Starts from the data comparison. A previous instance of another kind
    /// counts as new data.
    pub fn new<'a, L: Layer, T>(
        old: &'a dyn Layer,
        data: impl Fn(&L) -> &Data<T>,
        new_data: &Data<T>,
    ) -> (Self, Option<&'a L>) {
        let old = old.as_any().downcast_ref::<L>();
        let mut flags = ChangeFlags::default();
        match old {
            Some(old) if Rc::ptr_eq(data(old), new_data) => {}
            _ => flags.data_changed = Some("data changed".to_string()),
        }
        (Self { flags }, old)
    }

    pub fn prop(&mut self, name: &str, changed: bool) -> &mut Self {
        if changed && self.flags.props_changed.is_none() {
            self.flags.props_changed = Some(format!("props.{name} changed"));
        }
        self
    }

    pub fn finish(self) -> ChangeFlags {
        self.flags
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn color_lerp_hits_endpoints() {
        let (a, b) = ([0, 0, 0, 255], [200, 100, 50, 55]);
        assert_eq!(lerp_color(a, b, 0.0), a);
        assert_eq!(lerp_color(a, b, 1.0), b);
        assert_eq!(lerp_color(a, b, 0.5), [100, 50, 25, 155]);
    }

    #[test]
    fn world_units_shrink_toward_the_poles() {
        let equator = meters_per_world_unit(0.0);
        assert!((equator - EARTH_CIRCUMFERENCE / TILE_SIZE).abs() < 1e-6);
        assert!(meters_per_world_unit(60.0) < equator * 0.51);
    }
}
