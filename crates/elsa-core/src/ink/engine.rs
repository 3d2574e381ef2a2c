//! The freehand engine.
//!
//! Drives a stroke from pointer-down to pointer-up, then edits finished
//! strokes: selection, pixel and geometric erase, delete/move/recolor and
//! group resize/rotate. Every committed change is queued in an [`InkOutbox`]
//! as collaboration messages, `{action, lines}` payloads and undo commands;
//! the host application flushes it after the event handler returns.

use std::collections::HashMap;

use kurbo::{BezPath, Point, Rect, Vec2};
use uuid::Uuid;

use super::eraser::{self, EraseMode};
use super::smoothing::SampleBuffer;
use super::stroke::{Stroke, StrokeId};
use super::transform::StrokeGroupTransform;
use super::PenMode;
use crate::collaboration::{
    CollabError, CollabMessage, CollaborationChannel, CommandRecorder, FreeLineAction, FreeLineActionKind, ShapeLines,
};
use crate::config::InkConfig;
use crate::connector::ConnectorKind;
use crate::geometry::is_rect_interact_rect;
use crate::page::{Page, PageId};
use crate::shapes::{SerializableColor, Shape, ShapeId};

/// The stroke currently being drawn.
#[derive(Debug, Clone)]
pub struct LiveStroke {
    mode: PenMode,
    host: ShapeId,
    buffer: SampleBuffer,
    points: Vec<Point>,
    path: BezPath,
    color: SerializableColor,
    width: f64,
    alpha: f64,
}

impl LiveStroke {
    pub fn mode(&self) -> PenMode {
        self.mode
    }

    /// Host the stroke will land in.
    pub fn host(&self) -> ShapeId {
        self.host
    }

    /// Smoothed points emitted so far.
    pub fn points(&self) -> &[Point] {
        &self.points
    }

    /// Incrementally built path of the emitted points.
    pub fn path(&self) -> &BezPath {
        &self.path
    }

    pub fn color(&self) -> SerializableColor {
        self.color
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    fn extend(&mut self, point: Point) {
        if self.points.is_empty() {
            self.path.move_to(point);
        } else {
            self.path.line_to(point);
        }
        self.points.push(point);
    }
}

/// An undo/redo payload waiting for the command recorder.
#[derive(Debug, Clone)]
pub enum InkCommand {
    Add {
        page: PageId,
        changes: Vec<ShapeLines>,
    },
    Delete {
        page: PageId,
        changes: Vec<ShapeLines>,
    },
    Update {
        page: PageId,
        before: Vec<ShapeLines>,
        after: Vec<ShapeLines>,
    },
    Erase {
        page: PageId,
        shape: ShapeId,
        before: Vec<Rect>,
        after: Vec<Rect>,
    },
}

/// Side effects produced by committed ink changes.
#[derive(Debug, Default)]
pub struct InkOutbox {
    messages: Vec<CollabMessage>,
    actions: Vec<FreeLineAction>,
    commands: Vec<InkCommand>,
}

impl InkOutbox {
    pub fn messages(&self) -> &[CollabMessage] {
        &self.messages
    }

    pub fn actions(&self) -> &[FreeLineAction] {
        &self.actions
    }

    pub fn commands(&self) -> &[InkCommand] {
        &self.commands
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty() && self.actions.is_empty() && self.commands.is_empty()
    }

    fn push_action(&mut self, action: FreeLineActionKind, shape: ShapeId, lines: Vec<Stroke>) {
        if !lines.is_empty() {
            self.actions.push(FreeLineAction { action, shape, lines });
        }
    }

    /// Send queued messages, record queued commands and return the actions.
    ///
    /// Messages are fire-and-forget: a failed ack is only logged. Without a
    /// channel or recorder the corresponding queue is dropped.
    pub fn flush(
        &mut self,
        channel: Option<&dyn CollaborationChannel>,
        recorder: Option<&mut dyn CommandRecorder>,
    ) -> Vec<FreeLineAction> {
        let messages = std::mem::take(&mut self.messages);
        if let Some(channel) = channel {
            for message in messages {
                let method = message.method;
                channel.invoke(
                    message,
                    Some(Box::new(move |result: Result<serde_json::Value, CollabError>| {
                        if let Err(err) = result {
                            log::warn!("Collaboration {method:?} failed: {err}");
                        }
                    })),
                );
            }
        }

        let commands = std::mem::take(&mut self.commands);
        if let Some(recorder) = recorder {
            for command in commands {
                match command {
                    InkCommand::Add { page, changes } => recorder.add_free_line_command(page, changes),
                    InkCommand::Delete { page, changes } => recorder.delete_free_line_command(page, changes),
                    InkCommand::Update { page, before, after } => {
                        recorder.update_free_line_command(page, before, after)
                    }
                    InkCommand::Erase {
                        page,
                        shape,
                        before,
                        after,
                    } => recorder.erase_command(page, shape, before, after),
                }
            }
        }

        std::mem::take(&mut self.actions)
    }
}

/// Eraser gesture state.
#[derive(Debug, Default)]
struct EraseSession {
    regions: Vec<Rect>,
    /// Erased regions of each touched pixel host before the gesture.
    before: HashMap<ShapeId, Vec<Rect>>,
}

/// Freehand capture and editing.
#[derive(Debug)]
pub struct FreehandEngine {
    config: InkConfig,
    live: Option<LiveStroke>,
    transform: Option<StrokeGroupTransform>,
    erase: Option<EraseSession>,
    outbox: InkOutbox,
}

impl Default for FreehandEngine {
    fn default() -> Self {
        Self::new(InkConfig::default())
    }
}

impl FreehandEngine {
    pub fn new(config: InkConfig) -> Self {
        Self {
            config,
            live: None,
            transform: None,
            erase: None,
            outbox: InkOutbox::default(),
        }
    }

    pub fn config(&self) -> &InkConfig {
        &self.config
    }

    pub fn outbox(&self) -> &InkOutbox {
        &self.outbox
    }

    pub fn outbox_mut(&mut self) -> &mut InkOutbox {
        &mut self.outbox
    }

    pub fn live(&self) -> Option<&LiveStroke> {
        self.live.as_ref()
    }

    pub fn transform(&self) -> Option<&StrokeGroupTransform> {
        self.transform.as_ref()
    }

    pub fn is_drawing(&self) -> bool {
        self.live.is_some()
    }

    pub fn is_erasing(&self) -> bool {
        self.erase.is_some()
    }

    /// True while a stroke, transform or erase gesture is running.
    pub fn is_gesture_active(&self) -> bool {
        self.live.is_some() || self.transform.is_some() || self.erase.is_some()
    }

    // --- Live stroke ---

    /// Start a stroke at `point` (logical coordinates).
    pub fn begin(&mut self, page: &Page, mode: PenMode, point: Point) {
        if self.live.is_some() {
            log::debug!("Replacing unfinished stroke");
        }
        let (color, width, alpha) = mode.stroke_style(&self.config);
        self.live = Some(LiveStroke {
            mode,
            host: page.open_host(mode).unwrap_or_else(Uuid::new_v4),
            buffer: SampleBuffer::new(self.config.smoothing_buffer),
            points: Vec::new(),
            path: BezPath::new(),
            color,
            width,
            alpha,
        });
        self.drag(page, point);
    }

    /// Feed a raw sample; returns the smoothed point when one is emitted.
    pub fn drag(&mut self, page: &Page, point: Point) -> Option<Point> {
        let live = self.live.as_mut()?;
        let smoothed = live.buffer.push(point)?;
        live.extend(smoothed);
        self.outbox
            .messages
            .push(CollabMessage::add_freeline_point(page.id(), live.host, smoothed, live.mode));
        Some(smoothed)
    }

    /// Finalize the live stroke.
    ///
    /// Strokes with fewer than two points are discarded. Otherwise the
    /// stroke joins the open host of its pen mode, or a new host shape is
    /// created for it.
    pub fn done(&mut self, page: &mut Page) -> Option<StrokeId> {
        let mut live = self.live.take()?;
        for point in live.buffer.flush(live.points.last().copied()) {
            live.extend(point);
        }
        if live.points.len() < 2 {
            log::debug!("Discarding stroke with {} point(s)", live.points.len());
            return None;
        }

        let mode = live.mode;
        let stroke = Stroke::new(live.points, live.color, live.width, live.alpha);
        let stroke_id = stroke.id();
        let host_id = match page.open_host(mode) {
            Some(host) => {
                page.edit_host(host, |h| h.push(stroke.clone()));
                host
            }
            None => {
                let mut shape = Shape::free_line(mode).with_id(live.host);
                if let Some(host) = shape.as_free_line_mut() {
                    host.push(stroke.clone());
                }
                shape.fit_to_strokes();
                page.add_shape(shape)
            }
        };

        match CollabMessage::freeline_done(page.id(), host_id, &stroke, mode) {
            Ok(message) => self.outbox.messages.push(message),
            Err(err) => log::warn!("Failed to encode finished stroke: {err}"),
        }
        self.outbox.commands.push(InkCommand::Add {
            page: page.id(),
            changes: vec![ShapeLines {
                shape: host_id,
                lines: vec![stroke.clone()],
            }],
        });
        self.outbox
            .push_action(FreeLineActionKind::AddFreeLines, host_id, vec![stroke]);
        Some(stroke_id)
    }

    /// Drop the live stroke without persisting anything.
    pub fn cancel(&mut self) -> bool {
        self.live.take().is_some()
    }

    /// Close every open host so the next stroke starts a new one.
    pub fn close_hosts(&mut self, page: &mut Page) -> usize {
        let mut closed = 0;
        for id in host_ids(page) {
            if let Some(host) = page.host_flags_mut(id) {
                if host.open {
                    host.open = false;
                    closed += 1;
                }
            }
        }
        prune_empty_hosts(page);
        closed
    }

    // --- Selection ---

    /// Mark strokes touching `rect` as pre-selected; returns how many are.
    ///
    /// The bound intersection gates the per-point test.
    pub fn select_in_rect(&mut self, page: &mut Page, rect: Rect) -> usize {
        let mut count = 0;
        for id in host_ids(page) {
            let Some(host) = page.host_flags_mut(id) else {
                continue;
            };
            for stroke in &mut host.strokes {
                stroke.pre_selected = stroke.intersects_rect(rect);
                count += usize::from(stroke.pre_selected);
            }
        }
        count
    }

    /// Select the topmost stroke under a point.
    pub fn select_at(&mut self, page: &mut Page, point: Point, tolerance: f64) -> Option<(ShapeId, StrokeId)> {
        let hit = page.free_line_hosts().collect::<Vec<_>>().into_iter().rev().find_map(|shape| {
            let host = shape.as_free_line()?;
            host.strokes()
                .iter()
                .rev()
                .find(|s| s.hit_test(point, tolerance))
                .map(|s| (shape.id(), s.id()))
        })?;
        if let Some(stroke) = page.host_flags_mut(hit.0).and_then(|h| h.stroke_mut(hit.1)) {
            stroke.selected = true;
        }
        page.mark_ink_changed();
        Some(hit)
    }

    /// Promote pre-selected strokes to selected; returns the selection size.
    pub fn commit_selection(&mut self, page: &mut Page) -> usize {
        let mut changed = false;
        let mut count = 0;
        for id in host_ids(page) {
            let Some(host) = page.host_flags_mut(id) else {
                continue;
            };
            for stroke in &mut host.strokes {
                if stroke.pre_selected {
                    stroke.pre_selected = false;
                    changed |= !stroke.selected;
                    stroke.selected = true;
                }
                count += usize::from(stroke.selected);
            }
        }
        if changed {
            page.mark_ink_changed();
        }
        count
    }

    pub fn clear_selection(&mut self, page: &mut Page) {
        let mut changed = false;
        for id in host_ids(page) {
            let Some(host) = page.host_flags_mut(id) else {
                continue;
            };
            for stroke in &mut host.strokes {
                changed |= stroke.selected;
                stroke.selected = false;
                stroke.pre_selected = false;
            }
        }
        if changed {
            page.mark_ink_changed();
        }
    }

    /// Selected strokes as `(host, stroke)` pairs.
    pub fn selected(&self, page: &Page) -> Vec<(ShapeId, StrokeId)> {
        page.free_line_hosts()
            .filter_map(|shape| shape.as_free_line().map(|h| (shape.id(), h.selected_ids())))
            .flat_map(|(host, ids)| ids.into_iter().map(move |id| (host, id)))
            .collect()
    }

    /// Union of the selected strokes' bounds.
    pub fn selection_bounds(&self, page: &Page) -> Option<Rect> {
        self.selected(page)
            .into_iter()
            .filter_map(|(host, id)| page.stroke(host, id).map(Stroke::bound))
            .reduce(|acc, b| acc.union(b))
    }

    // --- Erase ---

    pub fn begin_erase(&mut self) {
        self.erase = Some(EraseSession::default());
    }

    /// Apply the eraser centered at `point`; returns how many hosts or strokes it touched.
    ///
    /// Pixel hosts record the cleared square. Geometric hosts pre-select the
    /// strokes crossing it; they are removed at [`FreehandEngine::end_erase`].
    pub fn erase_at(&mut self, page: &mut Page, point: Point) -> usize {
        let region = eraser::pixel_region(point, self.config.eraser_radius);
        let session = self.erase.get_or_insert_with(EraseSession::default);
        session.regions.push(region);

        let mut touched = 0;
        let mut pixels_changed = false;
        for id in host_ids(page) {
            let Some(host) = page.host_flags_mut(id) else {
                continue;
            };
            match host.mode.erase_mode() {
                EraseMode::Pixel => {
                    let hit = host.bounds().is_some_and(|b| is_rect_interact_rect(b, region));
                    if hit {
                        session.before.entry(id).or_insert_with(|| host.erased.clone());
                        pixels_changed |= host.add_erased(region);
                        touched += 1;
                    }
                }
                EraseMode::Geometric => {
                    for stroke in &mut host.strokes {
                        if !stroke.pre_selected && stroke.intersects_rect(region) {
                            stroke.pre_selected = true;
                            touched += 1;
                        }
                    }
                }
            }
        }
        if pixels_changed {
            page.mark_ink_changed();
        }
        touched
    }

    /// Finish the eraser gesture; returns the number of strokes removed.
    ///
    /// Pixel hosts emit an erase command whose `before` list restores the
    /// host on undo. Pre-selected strokes of geometric hosts are deleted, or
    /// cut at the eraser squares when splitting is enabled.
    pub fn end_erase(&mut self, page: &mut Page) -> usize {
        let Some(session) = self.erase.take() else {
            return 0;
        };

        for (shape, before) in session.before {
            let after = page
                .get_shape(shape)
                .and_then(Shape::as_free_line)
                .map(|h| h.erased_regions().to_vec())
                .unwrap_or_default();
            self.outbox.commands.push(InkCommand::Erase {
                page: page.id(),
                shape,
                before,
                after,
            });
        }

        let mut removed_total = 0;
        for id in host_ids(page) {
            let ids = match page.get_shape(id).and_then(Shape::as_free_line) {
                Some(host) if host.mode.erase_mode() == EraseMode::Geometric => host.pre_selected_ids(),
                _ => continue,
            };
            if ids.is_empty() {
                continue;
            }

            let split = self.config.split_on_erase;
            let regions = &session.regions;
            let Some((removed, added)) = page.edit_host(id, |host| {
                let mut removed = Vec::new();
                let mut added = Vec::new();
                for stroke_id in &ids {
                    let Some(stroke) = host.remove(*stroke_id) else {
                        continue;
                    };
                    if split {
                        for piece in split_by_regions(stroke.points(), regions) {
                            let part = Stroke::new(piece, stroke.color, stroke.width, stroke.alpha);
                            host.push(part.clone());
                            added.push(part);
                        }
                    }
                    removed.push(stroke);
                }
                (removed, added)
            }) else {
                continue;
            };

            removed_total += removed.len();
            self.record_delete(page.id(), id, removed);
            if !added.is_empty() {
                self.outbox.commands.push(InkCommand::Add {
                    page: page.id(),
                    changes: vec![ShapeLines {
                        shape: id,
                        lines: added.clone(),
                    }],
                });
                self.outbox.push_action(FreeLineActionKind::AddFreeLines, id, added);
            }
        }
        prune_empty_hosts(page);
        removed_total
    }

    /// Clear the pre-selection left by an eraser or rubber band without deleting.
    pub fn clear_pre_selection(&mut self, page: &mut Page) {
        for id in host_ids(page) {
            if let Some(host) = page.host_flags_mut(id) {
                for stroke in &mut host.strokes {
                    stroke.pre_selected = false;
                }
            }
        }
    }

    // --- Editing ---

    /// Delete every selected stroke; returns how many were removed.
    pub fn delete_selected(&mut self, page: &mut Page) -> usize {
        let mut total = 0;
        for (host, ids) in group_by_host(self.selected(page)) {
            let removed = page
                .edit_host(host, |h| ids.iter().filter_map(|id| h.remove(*id)).collect::<Vec<_>>())
                .unwrap_or_default();
            total += removed.len();
            self.record_delete(page.id(), host, removed);
        }
        prune_empty_hosts(page);
        total
    }

    /// Translate selected strokes by a logical delta.
    pub fn move_selected(&mut self, page: &mut Page, delta: Vec2) -> usize {
        self.update_selected(page, |stroke| stroke.translate(delta))
    }

    /// Change the color of selected strokes.
    pub fn recolor_selected(&mut self, page: &mut Page, color: SerializableColor) -> usize {
        self.update_selected(page, |stroke| stroke.color = color)
    }

    fn update_selected(&mut self, page: &mut Page, mut f: impl FnMut(&mut Stroke)) -> usize {
        let selected = self.selected(page);
        if selected.is_empty() {
            return 0;
        }
        let before = snapshot(page, &selected);
        for (host, id) in &selected {
            page.edit_stroke(*host, *id, &mut f);
        }
        page.mark_ink_changed();
        self.record_update(page, before, &selected);
        selected.len()
    }

    // --- Group transform ---

    /// Start resizing/rotating the selected strokes with a handle.
    pub fn begin_transform(&mut self, page: &Page, kind: ConnectorKind, start: Point) -> bool {
        self.start_group(page, Some(kind), start)
    }

    /// Start dragging the selected strokes.
    pub fn begin_move(&mut self, page: &Page, start: Point) -> bool {
        self.start_group(page, None, start)
    }

    fn start_group(&mut self, page: &Page, kind: Option<ConnectorKind>, start: Point) -> bool {
        let originals: Vec<(ShapeId, Stroke)> = self
            .selected(page)
            .into_iter()
            .filter_map(|(host, id)| page.stroke(host, id).map(|s| (host, s.clone())))
            .collect();
        self.transform = StrokeGroupTransform::new(kind, start, originals);
        self.transform.is_some()
    }

    /// Re-map the selected strokes for the current pointer position.
    pub fn transform_to(&mut self, page: &mut Page, pointer: Point, keep_aspect: bool, snap_rotation: bool) -> bool {
        let Some(transform) = &self.transform else {
            return false;
        };
        for (host, stroke) in transform.apply(pointer, keep_aspect, snap_rotation) {
            let points = stroke.points().to_vec();
            page.edit_stroke(host, stroke.id(), |s| s.set_points(points));
        }
        true
    }

    /// Commit the group transform.
    pub fn end_transform(&mut self, page: &mut Page) -> bool {
        let Some(transform) = self.transform.take() else {
            return false;
        };
        let pairs: Vec<(ShapeId, StrokeId)> = transform.originals().iter().map(|(h, s)| (*h, s.id())).collect();
        let before = group_lines(transform.originals().iter().map(|(h, s)| (*h, s.clone())));
        page.mark_ink_changed();
        self.record_update(page, before, &pairs);
        true
    }

    /// Abort the group transform, restoring the original points.
    pub fn cancel_transform(&mut self, page: &mut Page) {
        let Some(transform) = self.transform.take() else {
            return;
        };
        for (host, original) in transform.originals() {
            let points = original.points().to_vec();
            page.edit_stroke(*host, original.id(), |s| s.set_points(points));
        }
    }

    // --- Outbox helpers ---

    fn record_delete(&mut self, page: PageId, host: ShapeId, removed: Vec<Stroke>) {
        if removed.is_empty() {
            return;
        }
        self.outbox.commands.push(InkCommand::Delete {
            page,
            changes: vec![ShapeLines {
                shape: host,
                lines: removed.clone(),
            }],
        });
        self.outbox
            .push_action(FreeLineActionKind::DeleteFreeLines, host, removed);
    }

    fn record_update(&mut self, page: &Page, before: Vec<ShapeLines>, pairs: &[(ShapeId, StrokeId)]) {
        let after = snapshot(page, pairs);
        for lines in &after {
            self.outbox
                .push_action(FreeLineActionKind::UpdateFreeLines, lines.shape, lines.lines.clone());
        }
        self.outbox.commands.push(InkCommand::Update {
            page: page.id(),
            before,
            after,
        });
    }
}

fn host_ids(page: &Page) -> Vec<ShapeId> {
    page.free_line_hosts().map(Shape::id).collect()
}

/// Remove closed hosts that no longer hold any stroke.
fn prune_empty_hosts(page: &mut Page) {
    let empty: Vec<ShapeId> = page
        .free_line_hosts()
        .filter(|s| s.as_free_line().is_some_and(|h| h.is_empty() && !h.is_open()))
        .map(Shape::id)
        .collect();
    for id in empty {
        page.remove_shape(id);
    }
}

fn group_by_host(pairs: Vec<(ShapeId, StrokeId)>) -> Vec<(ShapeId, Vec<StrokeId>)> {
    let mut groups: Vec<(ShapeId, Vec<StrokeId>)> = Vec::new();
    for (host, id) in pairs {
        match groups.iter_mut().find(|(h, _)| *h == host) {
            Some((_, ids)) => ids.push(id),
            None => groups.push((host, vec![id])),
        }
    }
    groups
}

fn group_lines(strokes: impl Iterator<Item = (ShapeId, Stroke)>) -> Vec<ShapeLines> {
    let mut groups: Vec<ShapeLines> = Vec::new();
    for (host, stroke) in strokes {
        match groups.iter_mut().find(|g| g.shape == host) {
            Some(group) => group.lines.push(stroke),
            None => groups.push(ShapeLines {
                shape: host,
                lines: vec![stroke],
            }),
        }
    }
    groups
}

fn snapshot(page: &Page, pairs: &[(ShapeId, StrokeId)]) -> Vec<ShapeLines> {
    group_lines(
        pairs
            .iter()
            .filter_map(|(host, id)| page.stroke(*host, *id).map(|s| (*host, s.clone()))),
    )
}

fn split_by_regions(points: &[Point], regions: &[Rect]) -> Vec<Vec<Point>> {
    let mut pieces = vec![points.to_vec()];
    for region in regions {
        pieces = pieces
            .iter()
            .flat_map(|piece| eraser::split_outside(piece, *region))
            .collect();
    }
    pieces
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaboration::{AckCallback, CollabMethod};
    use std::cell::RefCell;

    #[derive(Default)]
    struct MockChannel {
        sent: RefCell<Vec<CollabMessage>>,
    }

    impl CollaborationChannel for MockChannel {
        fn invoke(&self, message: CollabMessage, ack: Option<AckCallback>) {
            self.sent.borrow_mut().push(message);
            if let Some(ack) = ack {
                ack(Ok(serde_json::Value::Null));
            }
        }
    }

    #[derive(Default)]
    struct MockRecorder {
        added: usize,
        deleted: usize,
        updated: usize,
        erased: Vec<(Vec<Rect>, Vec<Rect>)>,
    }

    impl CommandRecorder for MockRecorder {
        fn add_free_line_command(&mut self, _page: PageId, changes: Vec<ShapeLines>) {
            self.added += changes.iter().map(|c| c.lines.len()).sum::<usize>();
        }
        fn delete_free_line_command(&mut self, _page: PageId, changes: Vec<ShapeLines>) {
            self.deleted += changes.iter().map(|c| c.lines.len()).sum::<usize>();
        }
        fn update_free_line_command(&mut self, _page: PageId, _before: Vec<ShapeLines>, after: Vec<ShapeLines>) {
            self.updated += after.iter().map(|c| c.lines.len()).sum::<usize>();
        }
        fn erase_command(&mut self, _page: PageId, _shape: ShapeId, before: Vec<Rect>, after: Vec<Rect>) {
            self.erased.push((before, after));
        }
    }

    fn draw(engine: &mut FreehandEngine, page: &mut Page, mode: PenMode, points: &[Point]) -> Option<StrokeId> {
        engine.begin(page, mode, points[0]);
        for p in &points[1..] {
            engine.drag(page, *p);
        }
        engine.done(page)
    }

    fn line(y: f64) -> Vec<Point> {
        (0..8).map(|i| Point::new(i as f64 * 10.0, y)).collect()
    }

    #[test]
    fn test_example_stroke_emits_one_point_then_finalizes() {
        let mut page = Page::new();
        let mut engine = FreehandEngine::default();
        engine.begin(&page, PenMode::Pen, Point::new(0.0, 0.0));
        assert!(engine.drag(&page, Point::new(10.0, 0.0)).is_none());
        assert!(engine.drag(&page, Point::new(20.0, 0.0)).is_none());
        let emitted = engine.drag(&page, Point::new(30.0, 0.0)).unwrap();
        assert!((emitted.x - 15.0).abs() < f64::EPSILON);
        assert_eq!(engine.live().unwrap().points().len(), 1);

        let id = engine.done(&mut page).unwrap();
        let host = page.host_of(id).unwrap();
        let stroke = page.stroke(host, id).unwrap();
        assert!(stroke.len() >= 2);
        assert!(stroke.bound().width() >= 0.0);

        let half = stroke.width / 2.0;
        let min_x = stroke.points().iter().map(|p| p.x).fold(f64::INFINITY, f64::min);
        let max_x = stroke.points().iter().map(|p| p.x).fold(f64::NEG_INFINITY, f64::max);
        assert!((stroke.bound().x0 - (min_x - half)).abs() < f64::EPSILON);
        assert!((stroke.bound().x1 - (max_x + half)).abs() < f64::EPSILON);
    }

    #[test]
    fn test_tap_is_discarded() {
        let mut page = Page::new();
        let mut engine = FreehandEngine::default();
        engine.begin(&page, PenMode::Pen, Point::new(5.0, 5.0));
        assert!(engine.done(&mut page).is_none());
        assert!(page.is_empty());
        assert!(engine.outbox().actions().is_empty());
    }

    #[test]
    fn test_two_samples_are_kept() {
        let mut page = Page::new();
        let mut engine = FreehandEngine::default();
        let id = draw(&mut engine, &mut page, PenMode::Pen, &[Point::new(0.0, 0.0), Point::new(3.0, 4.0)]).unwrap();
        let host = page.host_of(id).unwrap();
        assert_eq!(page.stroke(host, id).unwrap().len(), 2);
    }

    #[test]
    fn test_strokes_share_open_host_per_mode() {
        let mut page = Page::new();
        let mut engine = FreehandEngine::default();
        let a = draw(&mut engine, &mut page, PenMode::Pen, &line(0.0)).unwrap();
        let b = draw(&mut engine, &mut page, PenMode::Pen, &line(50.0)).unwrap();
        let c = draw(&mut engine, &mut page, PenMode::Highlighter, &line(100.0)).unwrap();
        assert_eq!(page.host_of(a), page.host_of(b));
        assert_ne!(page.host_of(a), page.host_of(c));
        assert_eq!(page.len(), 2);

        engine.close_hosts(&mut page);
        let d = draw(&mut engine, &mut page, PenMode::Pen, &line(150.0)).unwrap();
        assert_ne!(page.host_of(a), page.host_of(d));
    }

    #[test]
    fn test_host_frame_fits_strokes() {
        let mut page = Page::new();
        let mut engine = FreehandEngine::default();
        let id = draw(&mut engine, &mut page, PenMode::Pen, &line(20.0)).unwrap();
        let host = page.get_shape(page.host_of(id).unwrap()).unwrap();
        let bound = page.stroke(host.id(), id).unwrap().bound();
        assert!((host.frame().x0 - bound.x0).abs() < f64::EPSILON);
        assert!((host.frame().y1 - bound.y1).abs() < f64::EPSILON);
    }

    #[test]
    fn test_outbox_flush() {
        let mut page = Page::new();
        let mut engine = FreehandEngine::default();
        draw(&mut engine, &mut page, PenMode::Pen, &line(0.0)).unwrap();

        let channel = MockChannel::default();
        let mut recorder = MockRecorder::default();
        let actions = engine.outbox_mut().flush(Some(&channel), Some(&mut recorder));

        let sent = channel.sent.borrow();
        assert!(sent.iter().any(|m| m.method == CollabMethod::AddFreelinePoint));
        assert_eq!(sent.last().unwrap().method, CollabMethod::FreelineDone);
        assert_eq!(recorder.added, 1);
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].action, FreeLineActionKind::AddFreeLines);
        assert!(engine.outbox().is_empty());
    }

    #[test]
    fn test_rect_selection_is_precise() {
        let mut page = Page::new();
        let mut engine = FreehandEngine::default();
        // A diagonal whose bound overlaps the query rect but whose points do not.
        let diagonal = draw(
            &mut engine,
            &mut page,
            PenMode::Pen,
            &[Point::new(0.0, 0.0), Point::new(100.0, 100.0)],
        )
        .unwrap();
        let flat = draw(&mut engine, &mut page, PenMode::Pen, &line(200.0)).unwrap();

        assert_eq!(engine.select_in_rect(&mut page, Rect::new(70.0, 0.0, 95.0, 20.0)), 0);
        assert_eq!(engine.select_in_rect(&mut page, Rect::new(-5.0, 190.0, 30.0, 210.0)), 1);
        assert_eq!(engine.commit_selection(&mut page), 1);
        let host = page.host_of(flat).unwrap();
        assert_eq!(engine.selected(&page), vec![(host, flat)]);
        assert!(!page.stroke(host, diagonal).unwrap().is_selected());
    }

    #[test]
    fn test_pixel_erase_records_regions() {
        let mut page = Page::new();
        let mut engine = FreehandEngine::default();
        let id = draw(&mut engine, &mut page, PenMode::Solid, &line(0.0)).unwrap();
        let host = page.host_of(id).unwrap();
        engine.outbox_mut().flush(None, None);

        engine.begin_erase();
        assert_eq!(engine.erase_at(&mut page, Point::new(30.0, 0.0)), 1);
        assert_eq!(engine.erase_at(&mut page, Point::new(500.0, 500.0)), 0);
        assert_eq!(engine.end_erase(&mut page), 0);

        let erased = page.get_shape(host).unwrap().as_free_line().unwrap().erased_regions().to_vec();
        assert_eq!(erased.len(), 1);
        assert!((erased[0].width() - 20.0).abs() < f64::EPSILON);
        // Stroke geometry is untouched.
        assert!(page.stroke(host, id).is_some());

        let mut recorder = MockRecorder::default();
        engine.outbox_mut().flush(None, Some(&mut recorder));
        assert_eq!(recorder.erased.len(), 1);
        assert!(recorder.erased[0].0.is_empty());
        assert_eq!(recorder.erased[0].1.len(), 1);
    }

    #[test]
    fn test_pixel_erase_drag_keeps_one_region() {
        let mut page = Page::new();
        let mut engine = FreehandEngine::default();
        let id = draw(&mut engine, &mut page, PenMode::Solid, &line(0.0)).unwrap();
        let host = page.host_of(id).unwrap();

        engine.begin_erase();
        for x in 0..20 {
            engine.erase_at(&mut page, Point::new(10.0 + x as f64, 0.0));
        }
        let version = page.ink_version();
        engine.erase_at(&mut page, Point::new(15.0, 0.0));
        assert_eq!(page.ink_version(), version);
        engine.end_erase(&mut page);

        let erased = page.get_shape(host).unwrap().as_free_line().unwrap().erased_regions().to_vec();
        assert_eq!(erased.len(), 1);
        assert!((erased[0].width() - 39.0).abs() < 1e-9);
    }

    #[test]
    fn test_geometric_erase_deletes_crossing_strokes() {
        let mut page = Page::new();
        let mut engine = FreehandEngine::default();
        let hit = draw(&mut engine, &mut page, PenMode::Pen, &line(0.0)).unwrap();
        let kept = draw(&mut engine, &mut page, PenMode::Pen, &line(100.0)).unwrap();
        let host = page.host_of(hit).unwrap();

        engine.begin_erase();
        engine.erase_at(&mut page, Point::new(35.0, 0.0));
        assert_eq!(engine.end_erase(&mut page), 1);
        assert!(page.stroke(host, hit).is_none());
        assert!(page.stroke(host, kept).is_some());
        assert!(engine
            .outbox()
            .actions()
            .iter()
            .any(|a| a.action == FreeLineActionKind::DeleteFreeLines));
    }

    #[test]
    fn test_geometric_erase_can_split() {
        let mut page = Page::new();
        let config = InkConfig {
            split_on_erase: true,
            ..InkConfig::default()
        };
        let mut engine = FreehandEngine::new(config);
        let id = draw(&mut engine, &mut page, PenMode::Pen, &line(0.0)).unwrap();
        let host = page.host_of(id).unwrap();

        engine.begin_erase();
        engine.erase_at(&mut page, Point::new(35.0, 0.0));
        engine.end_erase(&mut page);

        let strokes = page.get_shape(host).unwrap().as_free_line().unwrap().strokes().to_vec();
        assert_eq!(strokes.len(), 2);
        assert!(strokes.iter().all(|s| s.id() != id));
    }

    #[test]
    fn test_move_selected_invalidates_path() {
        let mut page = Page::new();
        let mut engine = FreehandEngine::default();
        let id = draw(&mut engine, &mut page, PenMode::Pen, &line(0.0)).unwrap();
        let host = page.host_of(id).unwrap();
        page.for_each_stroke_path(|_, _, _| {});
        assert!(page.paths().contains(id));

        engine.select_in_rect(&mut page, Rect::new(-10.0, -10.0, 200.0, 10.0));
        engine.commit_selection(&mut page);
        let x0 = page.stroke(host, id).unwrap().points()[0].x;
        assert_eq!(engine.move_selected(&mut page, Vec2::new(10.0, 0.0)), 1);
        assert!(!page.paths().contains(id));
        assert!((page.stroke(host, id).unwrap().points()[0].x - (x0 + 10.0)).abs() < f64::EPSILON);

        let mut recorder = MockRecorder::default();
        engine.outbox_mut().flush(None, Some(&mut recorder));
        assert_eq!(recorder.updated, 1);
    }

    #[test]
    fn test_delete_selected() {
        let mut page = Page::new();
        let mut engine = FreehandEngine::default();
        let id = draw(&mut engine, &mut page, PenMode::Pen, &line(0.0)).unwrap();
        engine.close_hosts(&mut page);
        engine.select_in_rect(&mut page, Rect::new(-10.0, -10.0, 200.0, 10.0));
        engine.commit_selection(&mut page);
        assert_eq!(engine.delete_selected(&mut page), 1);
        assert!(page.host_of(id).is_none());
        // Closed empty hosts are removed.
        assert!(page.is_empty());
    }

    #[test]
    fn test_group_transform_round_trip() {
        let mut page = Page::new();
        let mut engine = FreehandEngine::default();
        let id = draw(&mut engine, &mut page, PenMode::Pen, &line(0.0)).unwrap();
        let host = page.host_of(id).unwrap();
        engine.select_in_rect(&mut page, Rect::new(-10.0, -10.0, 200.0, 10.0));
        engine.commit_selection(&mut page);
        let original = page.stroke(host, id).unwrap().points().to_vec();

        let bounds = engine.selection_bounds(&page).unwrap();
        assert!(engine.begin_transform(&page, ConnectorKind::Rotate, Point::new(bounds.center().x, -100.0)));
        let version = page.ink_version();
        for step in 0..20 {
            engine.transform_to(&mut page, Point::new(bounds.center().x + step as f64, 100.0), false, false);
        }
        assert_eq!(page.ink_version(), version);
        engine.cancel_transform(&mut page);
        let restored = page.stroke(host, id).unwrap().points().to_vec();
        for (a, b) in original.iter().zip(&restored) {
            assert!((*a - *b).hypot() < 1e-9);
        }

        assert!(engine.begin_transform(&page, ConnectorKind::RightBottom, Point::new(bounds.x1, bounds.y1)));
        engine.transform_to(&mut page, Point::new(bounds.x1 + 50.0, bounds.y1), false, false);
        assert!(engine.end_transform(&mut page));
        assert!(page.ink_version() > version);
    }
}
