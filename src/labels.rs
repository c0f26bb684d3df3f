//! Screen-space placement of body labels.
//!
//! Labels are plain DOM text drawn over the canvas; this module only computes
//! where each one goes so the browser overlay stays a thin layer.

use glam::{Mat4, Vec2, Vec3};

use crate::camera::PerspectiveCamera;
use crate::scene::Scene;

/// Where a label lands on screen.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelPlacement {
    pub text: String,
    /// Pixel position of the anchor, origin top-left.
    pub screen: Vec2,
    /// Normalized depth in `[0, 1]`; nearer labels have smaller values.
    pub depth: f32,
    pub visible: bool,
    /// Stacking order, nearer labels on top.
    pub z_index: u32,
}

/// Projects a world point to pixel coordinates. `None` when behind the camera.
pub fn project(view_proj: Mat4, world: Vec3, width: u32, height: u32) -> Option<(Vec2, f32)> {
    let clip = view_proj * world.extend(1.0);
    if clip.w <= 0.0 {
        return None;
    }
    let ndc = clip.truncate() / clip.w;
    let screen = Vec2::new(
        (ndc.x * 0.5 + 0.5) * width as f32,
        (-ndc.y * 0.5 + 0.5) * height as f32,
    );
    Some((screen, ndc.z))
}

/// Computes placements for every labelled body, in scene order.
pub fn layout(scene: &Scene, camera: &PerspectiveCamera, size: (u32, u32)) -> Vec<LabelPlacement> {
    let view_proj = camera.view_proj();
    let mut placements: Vec<LabelPlacement> = scene
        .labels()
        .map(|(body, label)| {
            let anchor = body.position + label.offset;
            match project(view_proj, anchor, size.0, size.1) {
                Some((screen, depth)) => LabelPlacement {
                    text: label.text.clone(),
                    screen,
                    depth,
                    visible: (0.0..=1.0).contains(&depth),
                    z_index: 0,
                },
                None => LabelPlacement {
                    text: label.text.clone(),
                    screen: Vec2::ZERO,
                    depth: 1.0,
                    visible: false,
                    z_index: 0,
                },
            }
        })
        .collect();

    let mut order: Vec<usize> = (0..placements.len()).collect();
    order.sort_by(|&a, &b| placements[b].depth.total_cmp(&placements[a].depth));
    for (rank, index) in order.into_iter().enumerate() {
        placements[index].z_index = rank as u32;
    }
    placements
}
