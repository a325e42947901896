//! Output canvas sizes as a function of the two input sizes.
//!
//! Callers that allocate their own output buffers must use the same rules;
//! [`CanvasLayout`] is the single source for them.

/// Output canvas dimensions for an image pair.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CanvasLayout {
    /// Zoom applied to both images in the side-by-side match canvases.
    pub match_zoom: f32,
    /// `[width, height]` of the inlier/outlier canvases.
    pub match_size: [usize; 2],
    /// `[width, height]` of the warped images and the mosaic.
    pub warp_size: [usize; 2],
}

impl CanvasLayout {
    /// Layout for images of size `(w1, h1)` and `(w2, h2)`.
    ///
    /// Match canvases are `max(w1, w2)` wide with zoom `z = w / (w1 + w2)`
    /// and height `trunc(z * max(h1, h2))`. Warp canvases are
    /// `max(w1, w2) x max(h1, h2)`.
    pub fn for_sizes(w1: usize, h1: usize, w2: usize, h2: usize) -> Self {
        let w = w1.max(w2);
        let h_max = h1.max(h2);
        let z = if w1 + w2 == 0 {
            0.0
        } else {
            w as f32 / (w1 + w2) as f32
        };
        let h = (z * h_max as f32) as usize;
        Self {
            match_zoom: z,
            match_size: [w, h],
            warp_size: [w, h_max],
        }
    }

    /// Planar sample count of an inlier/outlier buffer.
    pub fn match_len(&self) -> usize {
        3 * self.match_size[0] * self.match_size[1]
    }

    /// Planar sample count of a warped-image or mosaic buffer.
    pub fn warp_len(&self) -> usize {
        3 * self.warp_size[0] * self.warp_size[1]
    }
}
