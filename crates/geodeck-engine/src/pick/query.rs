use std::collections::HashSet;
use std::rc::Rc;

use glam::DVec2;

use crate::coords::{DeviceRect, Point};
use crate::device::{FramebufferBinding, GlContext, GlParameters};
use crate::error::DeckError;
use crate::layer::{LayerRef, PickInfo};
use crate::render::{draw_picking_buffer, DrawLayersParams, LastPicked, LayerFilter, RenderContext};
use crate::view::View;
use crate::viewport::Viewport;

use super::pixels::{closest_picked_pixel, PickedPixel};

/// Why a pick is issued. Hover picks maintain the last-picked record.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum PickMode {
    #[default]
    Query,
    Hover,
    Click,
}

/// Point pick.
pub struct PickObjectParams<'a, G: GlContext> {
    pub layers: &'a [LayerRef],
    pub viewports: &'a [Rc<Viewport>],
    pub views: &'a [View],
    pub on_viewport_active: &'a mut dyn FnMut(&mut RenderContext<G>, &Rc<Viewport>),
    pub layer_filter: Option<&'a LayerFilter>,
    /// CSS pixels, canvas space.
    pub x: f64,
    pub y: f64,
    pub radius: f64,
    /// Maximum number of stacked objects to return.
    pub depth: usize,
    pub mode: PickMode,
}

/// Rectangle pick.
pub struct PickObjectsParams<'a, G: GlContext> {
    pub layers: &'a [LayerRef],
    pub viewports: &'a [Rc<Viewport>],
    pub views: &'a [View],
    pub on_viewport_active: &'a mut dyn FnMut(&mut RenderContext<G>, &Rc<Viewport>),
    pub layer_filter: Option<&'a LayerFilter>,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub max_objects: Option<usize>,
}

/// Picks the objects under `(x, y)`, closest to the point first.
///
/// Each pass hides the objects found so far, so `depth` passes return up to
/// `depth` stacked objects. In hover mode a layer that lost the hover is
/// reported first with index `-1`.
pub fn pick_object<G: GlContext>(
    ctx: &mut RenderContext<G>,
    params: PickObjectParams<'_, G>,
) -> Result<Vec<PickInfo>, DeckError> {
    let PickObjectParams {
        layers,
        viewports,
        views,
        on_viewport_active,
        layer_filter,
        x,
        y,
        radius,
        depth,
        mode,
    } = params;

    ctx.stats.pick_count += 1;
    let pixel_ratio = ctx.pixel_ratio();
    let (buffer_width, buffer_height) = ctx.gl.drawing_buffer_size();
    let device_x = (x * pixel_ratio).floor() as i32;
    let device_y = buffer_height as i32 - 1 - (y * pixel_ratio).floor() as i32;
    let device_radius = (radius * pixel_ratio).round().max(0.0) as i32;
    let rect = DeviceRect::new(
        device_x - device_radius,
        device_y - device_radius,
        2 * device_radius + 1,
        2 * device_radius + 1,
    )
    .intersect(DeviceRect::from_size(buffer_width, buffer_height));

    let mut hits: Vec<PickedPixel> = Vec::new();
    if !layers.is_empty() && !viewports.is_empty() && !rect.is_empty() {
        let framebuffer = ctx.prepare_picking_framebuffer()?;
        let mut excluded: Vec<(usize, [u8; 3])> = Vec::new();

        for _ in 0..depth.max(1) {
            draw_picking_buffer(
                ctx,
                framebuffer,
                rect,
                DrawLayersParams {
                    layers,
                    viewports,
                    views,
                    on_viewport_active: &mut *on_viewport_active,
                    draw_picking_colors: true,
                    layer_filter,
                    pass: "picking",
                    parameters: GlParameters::default(),
                    redraw_reason: "pick",
                    custom_render: false,
                    excluded: &excluded,
                },
            )?;
            let pixels = ctx.gl.read_pixels(FramebufferBinding::Offscreen(framebuffer), rect)?;
            let Some(hit) = closest_picked_pixel(&pixels, rect, device_x, device_y, device_radius) else {
                break;
            };
            if hit.layer_index >= layers.len() {
                log::warn!("picked layer index {} out of range", hit.layer_index);
                break;
            }
            excluded.push((hit.layer_index, hit.rgb()));
            hits.push(hit);
        }
    }

    let mut infos: Vec<PickInfo> = hits
        .iter()
        .map(|hit| hit_info(&layers[hit.layer_index], viewports, hit, x, y))
        .collect();

    if mode == PickMode::Hover {
        if let Some(unhovered) = update_hover(ctx, layers, hits.first(), x, y) {
            infos.insert(0, unhovered);
        }
    }
    Ok(infos)
}

/// Picks every object visible inside a rectangle, in scan order.
pub fn pick_objects<G: GlContext>(
    ctx: &mut RenderContext<G>,
    params: PickObjectsParams<'_, G>,
) -> Result<Vec<PickInfo>, DeckError> {
    let PickObjectsParams {
        layers,
        viewports,
        views,
        on_viewport_active,
        layer_filter,
        x,
        y,
        width,
        height,
        max_objects,
    } = params;

    ctx.stats.pick_count += 1;
    let pixel_ratio = ctx.pixel_ratio();
    let (buffer_width, buffer_height) = ctx.gl.drawing_buffer_size();
    let bh = buffer_height as i32;
    let left = (x * pixel_ratio).round() as i32;
    let right = ((x + width) * pixel_ratio).round() as i32;
    let top = bh - (y * pixel_ratio).round() as i32;
    let bottom = bh - ((y + height) * pixel_ratio).round() as i32;
    let rect = DeviceRect::new(left, bottom, right - left, top - bottom)
        .intersect(DeviceRect::from_size(buffer_width, buffer_height));

    if layers.is_empty() || viewports.is_empty() || rect.is_empty() {
        return Ok(Vec::new());
    }

    let framebuffer = ctx.prepare_picking_framebuffer()?;
    draw_picking_buffer(
        ctx,
        framebuffer,
        rect,
        DrawLayersParams {
            layers,
            viewports,
            views,
            on_viewport_active,
            draw_picking_colors: true,
            layer_filter,
            pass: "picking",
            parameters: GlParameters::default(),
            redraw_reason: "pick",
            custom_render: false,
            excluded: &[],
        },
    )?;
    let pixels = ctx.gl.read_pixels(FramebufferBinding::Offscreen(framebuffer), rect)?;

    let row = rect.width as usize;
    let mut seen: HashSet<(usize, [u8; 3])> = HashSet::new();
    let mut infos = Vec::new();
    for (i, color) in pixels.iter().enumerate() {
        let px = rect.x + (i % row) as i32;
        let py = rect.y + (i / row) as i32;
        let Some(hit) = PickedPixel::decode(*color, px, py) else {
            continue;
        };
        if hit.layer_index >= layers.len() || !seen.insert((hit.layer_index, hit.rgb())) {
            continue;
        }
        let css_x = (px as f64 + 0.5) / pixel_ratio;
        let css_y = (bh as f64 - py as f64 - 0.5) / pixel_ratio;
        infos.push(hit_info(&layers[hit.layer_index], viewports, &hit, css_x, css_y));
        if max_objects.is_some_and(|max| infos.len() >= max) {
            break;
        }
    }
    Ok(infos)
}

fn viewport_at(viewports: &[Rc<Viewport>], x: f64, y: f64) -> Option<&Rc<Viewport>> {
    viewports
        .iter()
        .find(|vp| vp.contains_pixel(Point::new(x, y)))
        .or_else(|| viewports.first())
}

fn hit_info(layer: &LayerRef, viewports: &[Rc<Viewport>], hit: &PickedPixel, x: f64, y: f64) -> PickInfo {
    let viewport = viewport_at(viewports, x, y);
    let info = PickInfo {
        layer_id: Some(layer.id().to_string()),
        index: hit.object_index,
        picked: true,
        x,
        y,
        coordinate: viewport.map(|vp| vp.unproject(DVec2::new(x - vp.x(), y - vp.y()))),
        color: Some(hit.color),
        object: layer
            .core()
            .state()
            .and_then(|state| layer.picked_object(&state, hit.object_index)),
        viewport_id: viewport.map(|vp| vp.id().to_string()),
    };
    resolve_through_parents(layer, info)
}

/// Lets the layer, then each composite ancestor, rewrite the info. The final
/// layer id is the top-most ancestor's.
fn resolve_through_parents(layer: &LayerRef, info: PickInfo) -> PickInfo {
    let mut info = layer.picking_info(info, layer.as_ref());
    let mut source = Rc::clone(layer);
    while let Some(parent) = source.core().parent() {
        info = parent.picking_info(info, source.as_ref());
        info.layer_id = Some(parent.id().to_string());
        source = parent;
    }
    info
}

/// Updates the last-picked record; returns the un-hover info for a layer
/// that lost the pointer.
fn update_hover<G: GlContext>(
    ctx: &mut RenderContext<G>,
    layers: &[LayerRef],
    hit: Option<&PickedPixel>,
    x: f64,
    y: f64,
) -> Option<PickInfo> {
    let picked_layer = hit.map(|h| &layers[h.layer_index]);
    let picked = LastPicked {
        layer_id: picked_layer.map(|l| l.id().to_string()),
        index: hit.map_or(-1, |h| h.object_index),
    };
    if ctx.last_picked == picked {
        return None;
    }

    let mut unhovered = None;
    if ctx.last_picked.layer_id != picked.layer_id {
        let previous = ctx
            .last_picked
            .layer_id
            .as_deref()
            .and_then(|id| layers.iter().find(|l| l.id() == id));
        if let Some(previous) = previous {
            if previous.props().auto_highlight {
                previous.core().set_needs_redraw("hover left");
            }
            let info = PickInfo {
                layer_id: Some(previous.id().to_string()),
                ..PickInfo::empty(x, y)
            };
            unhovered = Some(resolve_through_parents(previous, info));
        }
    }
    if let Some(layer) = picked_layer.filter(|l| l.props().auto_highlight) {
        layer.core().set_needs_redraw("hover changed");
    }

    log::trace!("hover {:?} -> {:?}", ctx.last_picked, picked);
    ctx.last_picked = picked;
    unhovered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::SoftwareContext;
    use crate::layer::testing::TestLayer;
    use crate::layer::{ChangeFlags, LayerProps, UpdateParams};
    use crate::viewport::ViewportOptions;

    fn setup() -> (RenderContext<SoftwareContext>, Vec<Rc<Viewport>>) {
        let ctx = RenderContext::new(SoftwareContext::new(64.0, 64.0, 1.0));
        let viewport = Viewport::new(ViewportOptions {
            id: "main".into(),
            width: 64.0,
            height: 64.0,
            zoom: 1.0,
            ..ViewportOptions::default()
        })
        .unwrap();
        (ctx, vec![Rc::new(viewport)])
    }

    fn live(ctx: &mut RenderContext<SoftwareContext>, layer: TestLayer) -> LayerRef {
        let layer: LayerRef = layer.rc();
        let mut lc = ctx.layer_context();
        let mut state = layer.initialize_state(&mut lc).unwrap();
        let flags = ChangeFlags::all("test");
        layer
            .update_state(
                &UpdateParams {
                    old: None,
                    change_flags: &flags,
                },
                &mut state,
                &mut lc,
            )
            .unwrap();
        layer.core().put_state(state);
        layer
    }

    fn pickable(id: &str) -> TestLayer {
        TestLayer::with_props(LayerProps::new(id).pickable(true).auto_highlight(true))
    }

    fn pick(
        ctx: &mut RenderContext<SoftwareContext>,
        layers: &[LayerRef],
        viewports: &[Rc<Viewport>],
        x: f64,
        y: f64,
        depth: usize,
        mode: PickMode,
    ) -> Vec<PickInfo> {
        pick_object(
            ctx,
            PickObjectParams {
                layers,
                viewports,
                views: &[],
                on_viewport_active: &mut |_, _| {},
                layer_filter: None,
                x,
                y,
                radius: 1.0,
                depth,
                mode,
            },
        )
        .unwrap()
    }

    // ── point picks ─────────────────────────────────────────────────────

    #[test]
    fn hit_reports_layer_and_object_index() {
        let (mut ctx, viewports) = setup();
        let layer = live(&mut ctx, pickable("dots").points(&[[60.0, 40.0], [0.0, 0.0]], 3.0));

        let infos = pick(&mut ctx, &[layer], &viewports, 32.0, 32.0, 1, PickMode::Query);
        assert_eq!(infos.len(), 1);
        assert_eq!(infos[0].layer_id.as_deref(), Some("dots"));
        assert_eq!(infos[0].index, 1);
        assert!(infos[0].picked);
        assert_eq!(infos[0].viewport_id.as_deref(), Some("main"));
        let coordinate = infos[0].coordinate.unwrap();
        assert!(coordinate.x.abs() < 2.0 && coordinate.y.abs() < 2.0);
    }

    #[test]
    fn miss_returns_nothing() {
        let (mut ctx, viewports) = setup();
        let layer = live(&mut ctx, pickable("dots").points(&[[0.0, 0.0]], 2.0));
        assert!(pick(&mut ctx, &[layer], &viewports, 2.0, 2.0, 1, PickMode::Query).is_empty());
    }

    #[test]
    fn picking_leaves_the_default_framebuffer_alone() {
        let (mut ctx, viewports) = setup();
        let layer = live(&mut ctx, pickable("dots").points(&[[0.0, 0.0]], 4.0));
        let before = ctx.gl.pixels().to_vec();
        pick(&mut ctx, &[layer], &viewports, 32.0, 32.0, 3, PickMode::Query);
        assert_eq!(ctx.gl.pixels(), &before[..]);
    }

    #[test]
    fn depth_pick_returns_stacked_objects_top_first() {
        let (mut ctx, viewports) = setup();
        let below = live(&mut ctx, pickable("below").points(&[[0.0, 0.0]], 3.0));
        let above = live(&mut ctx, pickable("above").points(&[[0.0, 0.0]], 3.0));
        let infos = pick(&mut ctx, &[below, above], &viewports, 32.0, 32.0, 10, PickMode::Query);
        let ids: Vec<_> = infos.iter().map(|i| i.layer_id.clone().unwrap()).collect();
        assert_eq!(ids, ["above", "below"]);
    }

    #[test]
    fn unpickable_layer_is_transparent_to_picks() {
        let (mut ctx, viewports) = setup();
        let below = live(&mut ctx, pickable("below").points(&[[0.0, 0.0]], 3.0));
        let cover = live(&mut ctx, TestLayer::new("cover").points(&[[0.0, 0.0]], 6.0));
        let infos = pick(&mut ctx, &[below, cover], &viewports, 32.0, 32.0, 1, PickMode::Query);
        assert_eq!(infos[0].layer_id.as_deref(), Some("below"));
    }

    #[test]
    fn composite_ancestor_owns_the_pick() {
        let (mut ctx, viewports) = setup();
        let parent: LayerRef = pickable("parent").composite(&["child"]).rc();
        let child = live(&mut ctx, pickable("parent-child").points(&[[0.0, 0.0]], 3.0));
        child.core().set_parent(&parent);

        let infos = pick(&mut ctx, &[parent.clone(), child], &viewports, 32.0, 32.0, 1, PickMode::Query);
        assert_eq!(infos[0].layer_id.as_deref(), Some("parent"));
        assert_eq!(
            infos[0].object_as::<String>().map(String::as_str),
            Some("parent via parent-child")
        );
    }

    // ── hover ───────────────────────────────────────────────────────────

    #[test]
    fn hover_tracks_last_picked_and_reports_unhover() {
        let (mut ctx, viewports) = setup();
        let layer = live(&mut ctx, pickable("dots").points(&[[0.0, 0.0]], 3.0));
        let layers = [layer.clone()];

        let infos = pick(&mut ctx, &layers, &viewports, 32.0, 32.0, 1, PickMode::Hover);
        assert_eq!(infos.len(), 1);
        assert_eq!(ctx.last_picked.layer_id.as_deref(), Some("dots"));
        assert_eq!(ctx.last_picked.index, 0);
        assert!(layer.core().needs_redraw(true).is_some());

        // Same object again: nothing changes.
        pick(&mut ctx, &layers, &viewports, 32.0, 32.0, 1, PickMode::Hover);
        assert!(layer.core().needs_redraw(true).is_none());

        let infos = pick(&mut ctx, &layers, &viewports, 2.0, 2.0, 1, PickMode::Hover);
        assert_eq!(infos.len(), 1);
        assert_eq!(infos[0].layer_id.as_deref(), Some("dots"));
        assert_eq!(infos[0].index, -1);
        assert!(!infos[0].picked);
        assert_eq!(ctx.last_picked, LastPicked::default());
        assert!(layer.core().needs_redraw(true).is_some());
    }

    #[test]
    fn hover_without_viewports_clears_the_record() {
        let (mut ctx, viewports) = setup();
        let layer = live(&mut ctx, pickable("dots").points(&[[0.0, 0.0]], 3.0));
        let layers = [layer];
        pick(&mut ctx, &layers, &viewports, 32.0, 32.0, 1, PickMode::Hover);
        let infos = pick(&mut ctx, &layers, &[], -1.0, -1.0, 1, PickMode::Hover);
        assert_eq!(infos.len(), 1);
        assert_eq!(infos[0].index, -1);
        assert_eq!(ctx.last_picked.layer_id, None);
    }

    // ── rectangle picks ─────────────────────────────────────────────────

    #[test]
    fn rectangle_pick_dedups_and_caps() {
        let (mut ctx, viewports) = setup();
        // Both points sit near the center; one far away at the map edge.
        let layer = live(&mut ctx, pickable("dots").points(&[[0.0, 0.0], [5.0, 0.0], [170.0, 80.0]], 2.0));
        let layers = [layer];

        let pick_rect = |ctx: &mut RenderContext<SoftwareContext>, max_objects| {
            pick_objects(
                ctx,
                PickObjectsParams {
                    layers: &layers,
                    viewports: &viewports,
                    views: &[],
                    on_viewport_active: &mut |_, _| {},
                    layer_filter: None,
                    x: 16.0,
                    y: 16.0,
                    width: 32.0,
                    height: 32.0,
                    max_objects,
                },
            )
            .unwrap()
        };

        let infos = pick_rect(&mut ctx, None);
        let mut indices: Vec<i64> = infos.iter().map(|i| i.index).collect();
        indices.sort();
        assert_eq!(indices, [0, 1]);
        assert_eq!(pick_rect(&mut ctx, Some(1)).len(), 1);
    }
}
