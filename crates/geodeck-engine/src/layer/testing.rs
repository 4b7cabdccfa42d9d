//! Minimal layer used by the engine's unit tests.

use std::any::Any;
use std::cell::Cell;
use std::rc::Rc;

use anyhow::bail;
use glam::DVec2;

use crate::device::{BufferId, GlContext, ProgramDesc, ProgramId, Topology};
use crate::viewport::lng_lat_to_world;

use super::{
    AttributeBuffers, Attributes, ChangeFlags, DrawOptions, Layer, LayerContext, LayerCore, LayerList,
    LayerNode, LayerProps, LayerRef, LayerState, PickInfo, UpdateParams,
};

const POINTS: ProgramDesc = ProgramDesc {
    name: "test-points",
    topology: Topology::Points,
};

pub(crate) struct TestLayer {
    core: LayerCore,
    value: u32,
    fail_init: bool,
    fail_update: bool,
    fail_draw: bool,
    sublayers: Vec<String>,
    points: Vec<DVec2>,
    radius_px: f32,
    draws: Cell<usize>,
    finalizes: Cell<usize>,
}

pub(crate) struct TestState {
    pub handle: BufferId,
    pub updates: usize,
    pub program: ProgramId,
    pub attributes: AttributeBuffers,
}

impl TestLayer {
    pub fn new(id: &str) -> Self {
        Self::with_props(LayerProps::new(id))
    }

    pub fn with_props(props: LayerProps) -> Self {
        Self {
            core: LayerCore::new(props),
            value: 0,
            fail_init: false,
            fail_update: false,
            fail_draw: false,
            sublayers: Vec::new(),
            points: Vec::new(),
            radius_px: 2.0,
            draws: Cell::new(0),
            finalizes: Cell::new(0),
        }
    }

    pub fn value(mut self, value: u32) -> Self {
        self.value = value;
        self
    }

    pub fn fail_on_init(mut self) -> Self {
        self.fail_init = true;
        self
    }

    pub fn fail_on_update(mut self) -> Self {
        self.fail_update = true;
        self
    }

    /// Makes the layer composite with one sublayer per suffix.
    pub fn fail_on_draw(mut self) -> Self {
        self.fail_draw = true;
        self
    }

    pub fn composite(mut self, suffixes: &[&str]) -> Self {
        self.sublayers = suffixes.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn points(mut self, points: &[[f64; 2]], radius_px: f32) -> Self {
        self.points = points.iter().map(|p| DVec2::from_array(*p)).collect();
        self.radius_px = radius_px;
        self
    }

    pub fn rc(self) -> Rc<TestLayer> {
        Rc::new(self)
    }

    pub fn draw_count(&self) -> usize {
        self.draws.get()
    }

    pub fn finalize_count(&self) -> usize {
        self.finalizes.get()
    }

    pub fn handle(&self) -> Option<BufferId> {
        self.core.state().and_then(|s| s.kind::<TestState>().map(|k| k.handle))
    }

    pub fn update_count(&self) -> Option<usize> {
        self.core.state().and_then(|s| s.kind::<TestState>().map(|k| k.updates))
    }

    fn upload(&self, state: &mut LayerState, gl: &mut dyn GlContext) -> anyhow::Result<()> {
        let mut attrs = Attributes::with_capacity(self.points.len());
        for (i, p) in self.points.iter().enumerate() {
            let w = lng_lat_to_world(*p, 1.0);
            attrs.push([w.x, w.y, 0.0], [255, 0, 0, 255], self.radius_px, i);
        }
        state.object_count = self.points.len();
        if let Some(kind) = state.kind_mut::<TestState>() {
            kind.attributes.upload(gl, &attrs)?;
        }
        Ok(())
    }
}

impl Layer for TestLayer {
    fn core(&self) -> &LayerCore {
        &self.core
    }

    fn layer_name(&self) -> &'static str {
        "TestLayer"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn is_composite(&self) -> bool {
        !self.sublayers.is_empty()
    }

    fn initialize_state(&self, ctx: &mut LayerContext<'_>) -> anyhow::Result<LayerState> {
        if self.fail_init {
            bail!("init failed for {}", self.id());
        }
        let program = ctx.program(&POINTS)?;
        let mut state = LayerState::empty();
        let handle = state.create_buffer(&mut *ctx.gl, &[0; 4]);
        let attributes = AttributeBuffers::allocate(&mut *ctx.gl, &mut state);
        state.set_kind(TestState {
            handle,
            updates: 0,
            program,
            attributes,
        });
        Ok(state)
    }

    fn update_state(
        &self,
        _params: &UpdateParams<'_>,
        state: &mut LayerState,
        ctx: &mut LayerContext<'_>,
    ) -> anyhow::Result<()> {
        if self.fail_update {
            bail!("update failed for {}", self.id());
        }
        if let Some(kind) = state.kind_mut::<TestState>() {
            kind.updates += 1;
        }
        self.upload(state, &mut *ctx.gl)
    }

    fn finalize_state(&self, state: &mut LayerState, ctx: &mut LayerContext<'_>) -> anyhow::Result<()> {
        self.finalizes.set(self.finalizes.get() + 1);
        state.release(&mut *ctx.gl);
        Ok(())
    }

    fn diff_props(&self, old: &dyn Layer) -> ChangeFlags {
        match old.as_any().downcast_ref::<TestLayer>() {
            Some(old) if old.value == self.value && old.points == self.points => ChangeFlags::default(),
            _ => ChangeFlags {
                props_changed: Some("value changed".into()),
                ..ChangeFlags::default()
            },
        }
    }

    fn draw(&self, state: &LayerState, opts: &DrawOptions<'_>, gl: &mut dyn GlContext) -> anyhow::Result<()> {
        self.draws.set(self.draws.get() + 1);
        if self.fail_draw {
            bail!("draw failed for {}", self.id());
        }
        let Some(kind) = state.kind::<TestState>() else {
            return Ok(());
        };
        let uniforms = opts.uniforms(self.props());
        gl.draw(&kind.attributes.draw_call(kind.program, &uniforms))?;
        Ok(())
    }

    fn render_layers(&self, _state: &LayerState, _ctx: &LayerContext<'_>) -> anyhow::Result<Vec<LayerNode>> {
        Ok(self
            .sublayers
            .iter()
            .map(|suffix| {
                LayerNode::layer(
                    TestLayer::with_props(self.props().sublayer(suffix))
                        .value(self.value)
                        .points(
                            &self.points.iter().map(|p| p.to_array()).collect::<Vec<_>>(),
                            self.radius_px,
                        ),
                )
            })
            .collect())
    }

    fn picking_info(&self, mut info: PickInfo, source: &dyn Layer) -> PickInfo {
        if self.is_composite() {
            info.object = Some(Rc::new(format!("{} via {}", self.id(), source.id())));
        }
        info
    }
}

/// Layer list from test layers, in order.
pub(crate) fn list(layers: &[&Rc<TestLayer>]) -> LayerList {
    layers.iter().map(|l| Rc::clone(*l) as LayerRef).collect()
}

/// Downcasts a manager-held layer.
pub(crate) fn as_test(layer: &LayerRef) -> &TestLayer {
    layer
        .as_any()
        .downcast_ref::<TestLayer>()
        .unwrap_or_else(|| panic!("{} is not a TestLayer", layer.id()))
}
