//! Geometry kernel boundary
//!
//! The external execution backend that runs candidate code and returns a
//! triangle mesh. The wire shape is flat vertex/face/normal arrays;
//! normals may be empty.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Mesh produced by a successful execution.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MeshArtifact {
    /// Flat xyz triples
    pub vertices: Vec<f32>,
    /// Flat triangle index triples
    pub faces: Vec<u32>,
    /// Flat xyz normal triples; may be empty
    pub normals: Vec<f32>,
}

impl MeshArtifact {
    /// Number of vertices (xyz triples).
    #[inline]
    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len() / 3
    }

    /// Number of triangle faces (index triples).
    #[inline]
    #[must_use]
    pub fn face_count(&self) -> usize {
        self.faces.len() / 3
    }

    /// Whether the mesh has neither vertices nor faces.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty() || self.faces.is_empty()
    }

    /// Axis-aligned bounding box extents (width, depth, height).
    ///
    /// Returns zeros for an empty mesh.
    #[must_use]
    pub fn extents(&self) -> [f32; 3] {
        if self.vertices.len() < 3 {
            return [0.0; 3];
        }
        let mut min = [f32::INFINITY; 3];
        let mut max = [f32::NEG_INFINITY; 3];
        for triple in self.vertices.chunks_exact(3) {
            for axis in 0..3 {
                min[axis] = min[axis].min(triple[axis]);
                max[axis] = max[axis].max(triple[axis]);
            }
        }
        [max[0] - min[0], max[1] - min[1], max[2] - min[2]]
    }
}

/// A failed execution, as reported by the kernel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KernelFailure {
    /// Raw error message from the backend
    pub message: String,
    /// Backend-supplied category hint, if any
    pub category_hint: Option<String>,
}

impl KernelFailure {
    /// Create a failure from a bare message.
    #[inline]
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            category_hint: None,
        }
    }
}

/// External geometry kernel.
///
/// The validator wraps `execute` in its own timeout; implementations do
/// not need to enforce one.
#[async_trait]
pub trait GeometryKernel: Send + Sync {
    /// Execute candidate code and return the resulting mesh.
    async fn execute(&self, code: &str) -> Result<MeshArtifact, KernelFailure>;

    /// Cheap reachability probe.
    async fn health(&self) -> bool;
}
