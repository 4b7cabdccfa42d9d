use std::rc::Rc;

use crate::coords::DeviceRect;
use crate::device::{
    BlendEquation, BlendFunc, ClearMask, FramebufferBinding, FramebufferId, GlContext, GlParameters,
    with_parameters,
};
use crate::error::{DeckError, LayerError, LayerStage};
use crate::layer::{encode_picking_color, DrawOptions, Layer, LayerProps, LayerRef, ModuleParameters};
use crate::view::View;
use crate::viewport::Viewport;

use super::ctx::{LastPicked, RenderContext};
use super::stats::PassStats;

/// Inputs of a layer filter.
pub struct LayerFilterArgs<'a> {
    pub layer: &'a dyn Layer,
    pub viewport: &'a Viewport,
    pub is_picking: bool,
    pub pass: &'a str,
}

/// Host predicate deciding per layer and viewport whether to draw.
pub type LayerFilter = Rc<dyn Fn(&LayerFilterArgs<'_>) -> bool>;

/// One draw over every viewport.
pub struct DrawLayersParams<'a, G: GlContext> {
    pub layers: &'a [LayerRef],
    pub viewports: &'a [Rc<Viewport>],
    pub views: &'a [View],
    /// Called before a viewport's layers draw; the manager activates it.
    pub on_viewport_active: &'a mut dyn FnMut(&mut RenderContext<G>, &Rc<Viewport>),
    /// Draw picking colours instead of colours.
    pub draw_picking_colors: bool,
    pub layer_filter: Option<&'a LayerFilter>,
    pub pass: &'a str,
    /// Pass parameters; win over layer parameters.
    pub parameters: GlParameters,
    pub redraw_reason: &'a str,
    /// Skip the initial clear (the host composited something first).
    pub custom_render: bool,
    /// Picking colours hidden from this pass, keyed by layer index.
    pub excluded: &'a [(usize, [u8; 3])],
}

/// Device-pixel rectangle of `viewport`, origin bottom-left.
pub fn gl_viewport(viewport: &Viewport, canvas_height: f64, pixel_ratio: f64) -> DeviceRect {
    let (x, y, w, h) = (viewport.x(), viewport.y(), viewport.width(), viewport.height());
    DeviceRect::new(
        (x * pixel_ratio).round() as i32,
        ((canvas_height - y - h) * pixel_ratio).round() as i32,
        (w * pixel_ratio).round() as i32,
        (h * pixel_ratio).round() as i32,
    )
}

/// Clears the bound framebuffer, then draws every viewport in order.
///
/// Errors abort the pass; GL state changed by a layer draw is restored first.
pub fn draw_layers<G: GlContext>(
    ctx: &mut RenderContext<G>,
    params: DrawLayersParams<'_, G>,
) -> Result<Vec<PassStats>, DeckError> {
    let DrawLayersParams {
        layers,
        viewports,
        views,
        on_viewport_active,
        draw_picking_colors,
        layer_filter,
        pass,
        parameters,
        redraw_reason,
        custom_render,
        excluded,
    } = params;

    if !custom_render {
        clear_canvas(&mut ctx.gl)?;
    }

    let pixel_ratio = ctx.pixel_ratio();
    let mut all_stats = Vec::with_capacity(viewports.len());

    for viewport in viewports {
        on_viewport_active(ctx, viewport);
        let view = views.iter().find(|v| v.id == viewport.id());

        let canvas_height = ctx.gl.canvas_size().1;
        let gl_vp = gl_viewport(viewport, canvas_height, pixel_ratio);

        if let Some(clear) = view.and_then(|v| v.clear) {
            let mut clear_params = GlParameters::default().with_scissor(gl_vp);
            clear_params.clear_color = clear.color;
            let mask = ClearMask {
                color: clear.color.is_some(),
                depth: clear.depth,
            };
            with_parameters(&mut ctx.gl, &clear_params, |gl| gl.clear(mask))?;
        }

        let mut stats = PassStats {
            pass: pass.to_string(),
            viewport_id: viewport.id().to_string(),
            total: layers.len(),
            ..PassStats::default()
        };

        for (layer_index, layer) in layers.iter().enumerate() {
            let props = layer.props();
            if props.visible {
                stats.visible += 1;
            }
            if layer.is_composite() {
                stats.composite += 1;
            }
            if props.pickable {
                stats.pickable += 1;
            }

            let passes_filter = layer_filter.is_none_or(|filter| {
                filter(&LayerFilterArgs {
                    layer: layer.as_ref(),
                    viewport,
                    is_picking: draw_picking_colors,
                    pass,
                })
            });
            let should_draw = !layer.is_composite()
                && props.visible
                && (!draw_picking_colors || props.pickable)
                && passes_filter;
            if !should_draw {
                continue;
            }

            let Some(state) = layer.core().state() else {
                log::trace!("{} has no state, skipped", layer.id());
                continue;
            };

            let module = ModuleParameters {
                picking_active: draw_picking_colors,
                device_pixel_ratio: pixel_ratio,
                selected_color: if draw_picking_colors {
                    None
                } else {
                    selected_color(props, layer.id(), &ctx.last_picked)
                },
                excluded_colors: excluded
                    .iter()
                    .filter(|(i, _)| *i == layer_index)
                    .map(|(_, color)| *color)
                    .collect(),
            };

            let mut layer_params = GlParameters::default()
                .with_blend(BlendFunc::ALPHA, BlendEquation::Add)
                .merged(&props.parameters)
                .merged(&parameters)
                .with_viewport(gl_vp);
            if draw_picking_colors {
                layer_params.blend_color = Some([0.0, 0.0, 0.0, (layer_index + 1) as f32 / 255.0]);
            }

            let opts = DrawOptions {
                viewport,
                module,
                layer_index,
                animation: ctx.animation,
            };
            with_parameters(&mut ctx.gl, &layer_params, |gl| layer.draw(&state, &opts, gl))
                .map_err(|source| LayerError::new(layer.id(), LayerStage::Draw, source))?;
            stats.drawn += 1;
        }

        ctx.stats.render_count += 1;
        log::debug!(
            "RENDER #{} {} ({}): {} of {} layers drawn in viewport {} ({} visible, {} composite, {} pickable)",
            ctx.stats.render_count,
            pass,
            redraw_reason,
            stats.drawn,
            stats.total,
            stats.viewport_id,
            stats.visible,
            stats.composite,
            stats.pickable,
        );
        all_stats.push(stats);
    }

    ctx.stats.last_pass = all_stats.clone();
    Ok(all_stats)
}

/// Draws picking colours into `framebuffer`, restricted to `rect`.
///
/// The default framebuffer is left untouched; nothing is read back.
pub fn draw_picking_buffer<G: GlContext>(
    ctx: &mut RenderContext<G>,
    framebuffer: FramebufferId,
    rect: DeviceRect,
    params: DrawLayersParams<'_, G>,
) -> Result<Vec<PassStats>, DeckError> {
    let binding = GlParameters::default()
        .with_framebuffer(FramebufferBinding::Offscreen(framebuffer))
        .with_scissor(rect)
        .with_clear_color([0.0; 4]);
    let saved = ctx.gl.state();
    ctx.gl.set_parameters(&binding);

    let result = draw_layers(
        ctx,
        DrawLayersParams {
            draw_picking_colors: true,
            parameters: params
                .parameters
                .with_blend(BlendFunc::PICKING, BlendEquation::Add)
                .with_blend_color([0.0; 4]),
            ..params
        },
    );

    ctx.gl.set_parameters(&saved.to_parameters());
    result
}

pub(crate) fn clear_canvas<G: GlContext>(gl: &mut G) -> Result<(), DeckError> {
    let (width, height) = gl.drawing_buffer_size();
    let params = GlParameters::default()
        .with_viewport(DeviceRect::from_size(width, height))
        .with_clear_color([0.0; 4]);
    with_parameters(gl, &params, |gl| gl.clear(ClearMask::ALL))?;
    Ok(())
}

fn selected_color(props: &LayerProps, layer_id: &str, last: &LastPicked) -> Option<[u8; 3]> {
    match props.highlighted_object_index {
        Some(index) if index >= 0 => Some(encode_picking_color(index as usize)),
        Some(_) => None,
        None if props.auto_highlight && last.index >= 0 && last.layer_id.as_deref() == Some(layer_id) => {
            Some(encode_picking_color(last.index as usize))
        }
        None => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{BlendFactor, SoftwareContext};
    use crate::layer::testing::{as_test, TestLayer};
    use crate::layer::{LayerCore, LayerProps, LayerState};
    use crate::viewport::ViewportOptions;

    fn viewport(w: f64, h: f64) -> Rc<Viewport> {
        Rc::new(
            Viewport::new(ViewportOptions {
                id: "main".into(),
                width: w,
                height: h,
                zoom: 1.0,
                ..ViewportOptions::default()
            })
            .unwrap(),
        )
    }

    fn initialized(ctx: &mut RenderContext<SoftwareContext>, layer: &LayerRef) {
        let mut lc = ctx.layer_context();
        let mut state = layer.initialize_state(&mut lc).unwrap();
        let flags = crate::layer::ChangeFlags::all("test");
        layer
            .update_state(
                &crate::layer::UpdateParams {
                    old: None,
                    change_flags: &flags,
                },
                &mut state,
                &mut lc,
            )
            .unwrap();
        layer.core().put_state(state);
    }

    fn draw<G: GlContext>(ctx: &mut RenderContext<G>, layers: &[LayerRef], viewports: &[Rc<Viewport>], picking: bool) -> Vec<PassStats> {
        draw_layers(
            ctx,
            DrawLayersParams {
                layers,
                viewports,
                views: &[],
                on_viewport_active: &mut |_, _| {},
                draw_picking_colors: picking,
                layer_filter: None,
                pass: "test",
                parameters: GlParameters::default(),
                redraw_reason: "test",
                custom_render: false,
                excluded: &[],
            },
        )
        .unwrap()
    }

    // ── viewport rect ───────────────────────────────────────────────────

    #[test]
    fn gl_viewport_flips_y_and_scales() {
        let vp = Viewport::new(ViewportOptions {
            x: 10.0,
            y: 20.0,
            width: 100.0,
            height: 50.0,
            ..ViewportOptions::default()
        })
        .unwrap();
        assert_eq!(gl_viewport(&vp, 200.0, 2.0), DeviceRect::new(20, 260, 200, 100));
    }

    // ── filtering ───────────────────────────────────────────────────────

    #[test]
    fn hidden_composite_and_unpickable_layers_are_skipped() {
        let mut ctx = RenderContext::new(SoftwareContext::new(64.0, 64.0, 1.0));
        let visible: LayerRef = TestLayer::new("visible").points(&[[0.0, 0.0]], 2.0).rc();
        let hidden: LayerRef = TestLayer::with_props(LayerProps::new("hidden").visible(false)).rc();
        let composite: LayerRef = TestLayer::new("composite").composite(&["a"]).rc();
        let pickable: LayerRef = TestLayer::with_props(LayerProps::new("pickable").pickable(true)).rc();
        let layers = vec![visible.clone(), hidden.clone(), composite.clone(), pickable.clone()];
        for layer in &layers {
            initialized(&mut ctx, layer);
        }
        let viewports = [viewport(64.0, 64.0)];

        let stats = draw(&mut ctx, &layers, &viewports, false);
        assert_eq!(stats[0].total, 4);
        assert_eq!(stats[0].visible, 3);
        assert_eq!(stats[0].composite, 1);
        assert_eq!(stats[0].pickable, 1);
        assert_eq!(stats[0].drawn, 2);
        assert_eq!(as_test(&visible).draw_count(), 1);
        assert_eq!(as_test(&hidden).draw_count(), 0);
        assert_eq!(as_test(&composite).draw_count(), 0);

        let stats = draw(&mut ctx, &layers, &viewports, true);
        assert_eq!(stats[0].drawn, 1);
        assert_eq!(as_test(&pickable).draw_count(), 2);
        assert_eq!(as_test(&visible).draw_count(), 1);
    }

    #[test]
    fn layer_filter_sees_the_pass() {
        let mut ctx = RenderContext::new(SoftwareContext::new(32.0, 32.0, 1.0));
        let a: LayerRef = TestLayer::new("a").rc();
        let b: LayerRef = TestLayer::new("b").rc();
        let layers = vec![a.clone(), b.clone()];
        for layer in &layers {
            initialized(&mut ctx, layer);
        }
        let filter: LayerFilter = Rc::new(|args: &LayerFilterArgs<'_>| args.layer.id() == "b" && args.pass == "screen");
        draw_layers(
            &mut ctx,
            DrawLayersParams {
                layers: &layers,
                viewports: &[viewport(32.0, 32.0)],
                views: &[],
                on_viewport_active: &mut |_, _| {},
                draw_picking_colors: false,
                layer_filter: Some(&filter),
                pass: "screen",
                parameters: GlParameters::default(),
                redraw_reason: "test",
                custom_render: false,
                excluded: &[],
            },
        )
        .unwrap();
        assert_eq!(as_test(&a).draw_count(), 0);
        assert_eq!(as_test(&b).draw_count(), 1);
    }

    #[test]
    fn stateless_layer_is_not_drawn() {
        let mut ctx = RenderContext::new(SoftwareContext::new(32.0, 32.0, 1.0));
        let layer: LayerRef = TestLayer::new("a").rc();
        let stats = draw(&mut ctx, &[layer.clone()], &[viewport(32.0, 32.0)], false);
        assert_eq!(stats[0].drawn, 0);
    }

    // ── parameters ──────────────────────────────────────────────────────

    struct ParamProbe {
        core: LayerCore,
        seen: std::cell::RefCell<Vec<crate::device::GlState>>,
    }

    impl Layer for ParamProbe {
        fn core(&self) -> &LayerCore {
            &self.core
        }
        fn layer_name(&self) -> &'static str {
            "ParamProbe"
        }
        fn as_any(&self) -> &dyn std::any::Any {
            self
        }
        fn initialize_state(&self, _ctx: &mut crate::layer::LayerContext<'_>) -> anyhow::Result<LayerState> {
            Ok(LayerState::empty())
        }
        fn update_state(
            &self,
            _params: &crate::layer::UpdateParams<'_>,
            _state: &mut LayerState,
            _ctx: &mut crate::layer::LayerContext<'_>,
        ) -> anyhow::Result<()> {
            Ok(())
        }
        fn draw(&self, _state: &LayerState, _opts: &DrawOptions<'_>, gl: &mut dyn GlContext) -> anyhow::Result<()> {
            self.seen.borrow_mut().push(gl.state());
            Ok(())
        }
    }

    #[test]
    fn pass_parameters_win_and_state_is_restored() {
        let mut ctx = RenderContext::new(SoftwareContext::new(40.0, 20.0, 1.0));
        let mut own = GlParameters::default().with_blend(BlendFunc::ALPHA, BlendEquation::Subtract);
        own.depth_test = Some(true);
        let probe = Rc::new(ParamProbe {
            core: LayerCore::new(LayerProps::new("probe").parameters(own)),
            seen: Default::default(),
        });
        let layer: LayerRef = probe.clone();
        layer.core().put_state(LayerState::empty());
        let before = ctx.gl.state();

        draw_layers(
            &mut ctx,
            DrawLayersParams {
                layers: &[layer],
                viewports: &[viewport(40.0, 20.0)],
                views: &[],
                on_viewport_active: &mut |_, _| {},
                draw_picking_colors: false,
                layer_filter: None,
                pass: "test",
                parameters: GlParameters::default().with_blend(BlendFunc::ALPHA, BlendEquation::Max),
                redraw_reason: "test",
                custom_render: false,
                excluded: &[],
            },
        )
        .unwrap();

        let seen = probe.seen.borrow();
        assert_eq!(seen[0].blend_equation, BlendEquation::Max);
        assert!(seen[0].depth_test);
        assert_eq!(seen[0].viewport, DeviceRect::new(0, 0, 40, 20));
        assert_eq!(ctx.gl.state(), before);
    }

    #[test]
    fn picking_pass_encodes_layer_index_in_blend_color() {
        let mut ctx = RenderContext::new(SoftwareContext::new(16.0, 16.0, 1.0));
        let probes: Vec<Rc<ParamProbe>> = (0..2)
            .map(|i| {
                Rc::new(ParamProbe {
                    core: LayerCore::new(LayerProps::new(format!("p{i}")).pickable(true)),
                    seen: Default::default(),
                })
            })
            .collect();
        let layers: Vec<LayerRef> = probes.iter().map(|p| p.clone() as LayerRef).collect();
        for layer in &layers {
            layer.core().put_state(LayerState::empty());
        }
        let fb = ctx.prepare_picking_framebuffer().unwrap();
        draw_picking_buffer(
            &mut ctx,
            fb,
            DeviceRect::new(0, 0, 4, 4),
            DrawLayersParams {
                layers: &layers,
                viewports: &[viewport(16.0, 16.0)],
                views: &[],
                on_viewport_active: &mut |_, _| {},
                draw_picking_colors: false,
                layer_filter: None,
                pass: "picking",
                parameters: GlParameters::default(),
                redraw_reason: "pick",
                custom_render: false,
                excluded: &[],
            },
        )
        .unwrap();

        let first = probes[0].seen.borrow()[0];
        let second = probes[1].seen.borrow()[0];
        assert_eq!(first.framebuffer, FramebufferBinding::Offscreen(fb));
        assert_eq!(first.blend_func.src_alpha, BlendFactor::ConstantAlpha);
        assert_eq!(first.blend_color[3], 1.0 / 255.0);
        assert_eq!(second.blend_color[3], 2.0 / 255.0);
        assert_eq!(ctx.gl.state().framebuffer, FramebufferBinding::Default);
    }

    // ── highlight ───────────────────────────────────────────────────────

    #[test]
    fn explicit_highlight_wins_over_auto_highlight() {
        let last = LastPicked {
            layer_id: Some("a".into()),
            index: 3,
        };
        let auto = LayerProps::new("a").auto_highlight(true);
        assert_eq!(selected_color(&auto, "a", &last), Some(encode_picking_color(3)));
        assert_eq!(selected_color(&auto, "b", &last), None);
        let explicit = LayerProps::new("a").auto_highlight(true).highlighted_object_index(Some(7));
        assert_eq!(selected_color(&explicit, "a", &last), Some(encode_picking_color(7)));
        let cleared = LayerProps::new("a").auto_highlight(true).highlighted_object_index(Some(-1));
        assert_eq!(selected_color(&cleared, "a", &last), None);
    }
}
