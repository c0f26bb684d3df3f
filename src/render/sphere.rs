use std::f32::consts::{PI, TAU};

use bytemuck::{Pod, Zeroable};

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

/// Unit sphere mesh; bodies are scaled by radius in the model matrix.
#[derive(Debug, Clone)]
pub struct SphereMesh {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

impl SphereMesh {
    /// Latitude/longitude tessellation with a seam column duplicated for UVs.
    pub fn uv(width_segments: u32, height_segments: u32) -> Self {
        let width_segments = width_segments.max(3);
        let height_segments = height_segments.max(2);
        let mut vertices =
            Vec::with_capacity(((width_segments + 1) * (height_segments + 1)) as usize);

        for y in 0..=height_segments {
            let v = y as f32 / height_segments as f32;
            let phi = v * PI;
            for x in 0..=width_segments {
                let u = x as f32 / width_segments as f32;
                let theta = u * TAU;
                let position = [
                    -theta.cos() * phi.sin(),
                    phi.cos(),
                    theta.sin() * phi.sin(),
                ];
                vertices.push(Vertex {
                    position,
                    normal: position,
                    uv: [u, v],
                });
            }
        }

        let stride = width_segments + 1;
        let mut indices = Vec::new();
        for y in 0..height_segments {
            for x in 0..width_segments {
                let a = y * stride + x + 1;
                let b = y * stride + x;
                let c = (y + 1) * stride + x;
                let d = (y + 1) * stride + x + 1;
                // poles collapse to a single triangle per quad
                if y != 0 {
                    indices.extend_from_slice(&[a, b, d]);
                }
                if y != height_segments - 1 {
                    indices.extend_from_slice(&[b, c, d]);
                }
            }
        }

        Self { vertices, indices }
    }
}
