//! Collaboration and command-log interfaces.
//!
//! The transport and the undo storage live outside the core. The core only
//! produces well-formed messages for an opaque `invoke(message, ack)` channel,
//! emits `{action, lines}` payloads for the shape model's observers, and
//! hands diff payloads to a command recorder.

use kurbo::{Point, Rect};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::ink::{PenMode, Stroke};
use crate::page::{Page, PageId};
use crate::shapes::ShapeId;

/// Errors surfaced by a collaboration channel to the ack callback.
#[derive(Debug, Error)]
pub enum CollabError {
    #[error("Collaboration channel closed")]
    Closed,
    #[error("Request rejected: {0}")]
    Rejected(String),
    #[error("Invalid payload: {0}")]
    Payload(#[from] serde_json::Error),
}

/// Methods the core invokes on the channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollabMethod {
    /// A smoothed point of a stroke still being drawn.
    AddFreelinePoint,
    /// A finished stroke.
    FreelineDone,
}

/// A message sent over the collaboration channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollabMessage {
    pub method: CollabMethod,
    pub page: PageId,
    pub shape: ShapeId,
    pub value: Value,
    pub mode: PenMode,
}

impl CollabMessage {
    pub fn add_freeline_point(page: PageId, shape: ShapeId, point: Point, mode: PenMode) -> Self {
        Self {
            method: CollabMethod::AddFreelinePoint,
            page,
            shape,
            value: serde_json::json!([point.x, point.y]),
            mode,
        }
    }

    pub fn freeline_done(page: PageId, shape: ShapeId, stroke: &Stroke, mode: PenMode) -> Result<Self, CollabError> {
        Ok(Self {
            method: CollabMethod::FreelineDone,
            page,
            shape,
            value: serde_json::to_value(stroke)?,
            mode,
        })
    }
}

/// Callback receiving the channel's acknowledgment.
pub type AckCallback = Box<dyn FnOnce(Result<Value, CollabError>)>;

/// Opaque collaboration transport.
///
/// Calls are fire-and-forget; the core never waits for the ack.
pub trait CollaborationChannel {
    fn invoke(&self, message: CollabMessage, ack: Option<AckCallback>);
}

/// Kind of ink change observed by the collaboration layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FreeLineActionKind {
    AddFreeLines,
    DeleteFreeLines,
    UpdateFreeLines,
}

/// `{action, lines}` payload for one host shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FreeLineAction {
    pub action: FreeLineActionKind,
    pub shape: ShapeId,
    pub lines: Vec<Stroke>,
}

/// Lines touched on one host, as passed to the command recorder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShapeLines {
    pub shape: ShapeId,
    pub lines: Vec<Stroke>,
}

/// Receiver of undo/redo diff payloads.
pub trait CommandRecorder {
    fn add_free_line_command(&mut self, page: PageId, changes: Vec<ShapeLines>);
    fn delete_free_line_command(&mut self, page: PageId, changes: Vec<ShapeLines>);
    fn update_free_line_command(&mut self, page: PageId, before: Vec<ShapeLines>, after: Vec<ShapeLines>);
    /// Pixel erase; `before` is the snapshot to restore on undo.
    fn erase_command(&mut self, page: PageId, shape: ShapeId, before: Vec<Rect>, after: Vec<Rect>);
}

/// Apply a remote ink action to a page.
///
/// A missing host shape or stroke id is skipped silently. Returns whether
/// the page changed.
pub fn apply_remote(page: &mut Page, action: &FreeLineAction) -> bool {
    if page.get_shape(action.shape).and_then(|s| s.as_free_line()).is_none() {
        log::debug!("Ignoring {:?} for missing host {}", action.action, action.shape);
        return false;
    }

    let changed = page.edit_host(action.shape, |host| {
        let mut changed = false;
        for line in &action.lines {
            match action.action {
                FreeLineActionKind::AddFreeLines => {
                    host.upsert(line.clone());
                    changed = true;
                }
                FreeLineActionKind::DeleteFreeLines => {
                    changed |= host.remove(line.id()).is_some();
                }
                FreeLineActionKind::UpdateFreeLines => match host.stroke_mut(line.id()) {
                    Some(existing) => {
                        *existing = line.clone();
                        existing.refit();
                        changed = true;
                    }
                    None => log::debug!("Ignoring update for missing stroke {}", line.id()),
                },
            }
        }
        changed
    });
    changed.unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shapes::{SerializableColor, Shape};

    fn stroke(x: f64) -> Stroke {
        Stroke::new(
            vec![Point::new(x, 0.0), Point::new(x + 10.0, 0.0)],
            SerializableColor::black(),
            2.0,
            1.0,
        )
    }

    fn page_with_host() -> (Page, ShapeId) {
        let mut page = Page::new();
        let host = page.add_shape(Shape::free_line(PenMode::Pen));
        (page, host)
    }

    #[test]
    fn test_point_message_shape() {
        let page = uuid::Uuid::new_v4();
        let shape = uuid::Uuid::new_v4();
        let msg = CollabMessage::add_freeline_point(page, shape, Point::new(1.5, 2.0), PenMode::Pen);
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["method"], "add_freeline_point");
        assert_eq!(json["value"], serde_json::json!([1.5, 2.0]));
        assert_eq!(json["mode"], "pen");
    }

    #[test]
    fn test_remote_add_then_delete() {
        let (mut page, host) = page_with_host();
        let line = stroke(0.0);
        let add = FreeLineAction {
            action: FreeLineActionKind::AddFreeLines,
            shape: host,
            lines: vec![line.clone()],
        };
        assert!(apply_remote(&mut page, &add));
        assert_eq!(page.get_shape(host).unwrap().as_free_line().unwrap().len(), 1);

        let delete = FreeLineAction {
            action: FreeLineActionKind::DeleteFreeLines,
            ..add
        };
        assert!(apply_remote(&mut page, &delete));
        assert!(page.get_shape(host).unwrap().as_free_line().unwrap().is_empty());
    }

    #[test]
    fn test_remote_missing_host_is_noop() {
        let mut page = Page::new();
        let action = FreeLineAction {
            action: FreeLineActionKind::UpdateFreeLines,
            shape: uuid::Uuid::new_v4(),
            lines: vec![stroke(0.0)],
        };
        let version = page.ink_version();
        assert!(!apply_remote(&mut page, &action));
        assert_eq!(page.ink_version(), version);
    }

    #[test]
    fn test_remote_update_missing_stroke_is_noop() {
        let (mut page, host) = page_with_host();
        let action = FreeLineAction {
            action: FreeLineActionKind::UpdateFreeLines,
            shape: host,
            lines: vec![stroke(0.0)],
        };
        assert!(!apply_remote(&mut page, &action));
    }

    #[test]
    fn test_remote_update_replaces_points() {
        let (mut page, host) = page_with_host();
        let line = stroke(0.0);
        let id = line.id();
        apply_remote(
            &mut page,
            &FreeLineAction {
                action: FreeLineActionKind::AddFreeLines,
                shape: host,
                lines: vec![line],
            },
        );
        let moved = stroke(100.0).with_id(id);
        assert!(apply_remote(
            &mut page,
            &FreeLineAction {
                action: FreeLineActionKind::UpdateFreeLines,
                shape: host,
                lines: vec![moved],
            },
        ));
        let stored = page.stroke(host, id).unwrap();
        assert!((stored.points()[0].x - 100.0).abs() < f64::EPSILON);
        assert!((stored.bound().x0 - 99.0).abs() < f64::EPSILON);
    }
}
