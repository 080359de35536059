//! Planar area detector with a regular pixel array.
//!
//! # Coordinate conventions
//!
//! - **Lab frame** (mm): X along the nominal beam, Z up, origin at the sample.
//! - **Pixel coordinates** `(u, v)`: `u` runs along `u_dir`, `v` along `v_dir`;
//!   the reference position `ref_pos` sits at pixel `(ucen, vcen)`.
//!
//! # Pipeline
//!
//! ```text
//! lab point → subtract ref_pos → project on (u_dir, v_dir) → divide by pixel size → add (ucen, vcen) → pixel
//! pixel → subtract (ucen, vcen) → multiply by pixel size → along (u_dir, v_dir) → add ref_pos → lab point
//! ```

use crate::Vector3;

/// Below this the direction is considered parallel to the detector plane.
const PARALLEL_EPS: f64 = 1e-12;

/// A 2D detector made of a regular array of square pixels.
///
/// The image is stored in `data`, indexed `[u * size.1 + v]`.
#[derive(Debug, Clone)]
pub struct RegArrayDetector2d {
    /// Number of pixels along u and v.
    pub size: (usize, usize),
    /// Pixel size in mm.
    pub pixel_size: f64,
    /// Pixel u coordinate of the reference position.
    pub ucen: f64,
    /// Pixel v coordinate of the reference position.
    pub vcen: f64,
    /// Lab position (mm) of the detector reference point.
    pub ref_pos: Vector3,
    /// Lab direction of increasing u.
    pub u_dir: Vector3,
    /// Lab direction of increasing v.
    pub v_dir: Vector3,
    /// Detector plane normal, pointing away from the sample.
    pub w_dir: Vector3,
    /// Image buffer.
    pub data: Vec<f32>,
}

impl RegArrayDetector2d {
    /// Detector normal to X, centered on the beam at `distance` mm from the sample.
    pub fn new(size: (usize, usize), pixel_size: f64, distance: f64) -> Self {
        Self {
            size,
            pixel_size,
            ucen: size.0 as f64 / 2.0,
            vcen: size.1 as f64 / 2.0,
            ref_pos: Vector3::new(distance, 0.0, 0.0),
            u_dir: Vector3::new(0.0, -1.0, 0.0),
            v_dir: Vector3::new(0.0, 0.0, -1.0),
            w_dir: Vector3::new(1.0, 0.0, 0.0),
            data: vec![0.0; size.0 * size.1],
        }
    }

    /// Intersection of the ray `origin + t·direction` with the detector plane.
    ///
    /// Returns `None` if the ray is parallel to the plane or points away from it.
    pub fn project_along_direction(&self, direction: &Vector3, origin: &Vector3) -> Option<Vector3> {
        let denom = direction.dot(&self.w_dir);
        if denom.abs() < PARALLEL_EPS {
            return None;
        }
        let t = (self.ref_pos - origin).dot(&self.w_dir) / denom;
        if t <= 0.0 {
            return None;
        }
        Some(origin + t * direction)
    }

    /// Convert a lab point lying in the detector plane to fractional pixel coordinates.
    pub fn lab_to_pixel(&self, point: &Vector3) -> (f64, f64) {
        let d = point - self.ref_pos;
        (
            self.ucen + d.dot(&self.u_dir) / self.pixel_size,
            self.vcen + d.dot(&self.v_dir) / self.pixel_size,
        )
    }

    /// Convert fractional pixel coordinates to a lab point in the detector plane.
    pub fn pixel_to_lab(&self, u: f64, v: f64) -> Vector3 {
        self.ref_pos
            + (u - self.ucen) * self.pixel_size * self.u_dir
            + (v - self.vcen) * self.pixel_size * self.v_dir
    }

    /// True if integer pixel `(u, v)` is on the array.
    #[inline]
    pub fn contains(&self, u: f64, v: f64) -> bool {
        u >= 0.0 && v >= 0.0 && u < self.size.0 as f64 && v < self.size.1 as f64
    }

    #[inline]
    pub fn get(&self, u: usize, v: usize) -> f32 {
        self.data[u * self.size.1 + v]
    }

    #[inline]
    pub fn set(&mut self, u: usize, v: usize, value: f32) {
        self.data[u * self.size.1 + v] = value;
    }

    /// Reset the image buffer to zero.
    pub fn clear(&mut self) {
        self.data.clear();
        self.data.resize(self.size.0 * self.size.1, 0.0);
    }

    pub fn max_value(&self) -> f32 {
        self.data.iter().copied().fold(0.0, f32::max)
    }
}

/// A spot position on a detector, optionally tagged with its intensity and energy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectorSpot {
    /// Pixel coordinate along u.
    pub u: f64,
    /// Pixel coordinate along v.
    pub v: f64,
    /// Integrated intensity, if known.
    pub intensity: Option<f64>,
    /// Diffracted energy in keV, if known.
    pub energy: Option<f64>,
}

impl DetectorSpot {
    pub fn new(u: f64, v: f64) -> Self {
        Self {
            u,
            v,
            intensity: None,
            energy: None,
        }
    }
}

// ── Image export / import ───────────────────────────────────────────────────

#[cfg(feature = "image")]
impl RegArrayDetector2d {
    /// The image buffer as an 8-bit grayscale image, values clipped to [0, 255].
    ///
    /// Image columns follow `u`, rows follow `v`.
    pub fn to_gray_image(&self) -> image::GrayImage {
        let (nu, nv) = self.size;
        image::GrayImage::from_fn(nu as u32, nv as u32, |x, y| {
            let value = self.get(x as usize, y as usize).clamp(0.0, 255.0);
            image::Luma([value as u8])
        })
    }

    /// Save the image buffer as an 8-bit grayscale image (format from the extension).
    pub fn save_image<P: AsRef<std::path::Path>>(&self, path: P) -> anyhow::Result<()> {
        use anyhow::Context;
        let path = path.as_ref();
        self.to_gray_image()
            .save(path)
            .with_context(|| format!("Failed to save detector image to {}", path.display()))?;
        tracing::info!("Saved {}x{} detector image to {}", self.size.0, self.size.1, path.display());
        Ok(())
    }

    /// Load an image file into the buffer; its dimensions must match the detector.
    pub fn load_image<P: AsRef<std::path::Path>>(&mut self, path: P) -> anyhow::Result<()> {
        use anyhow::Context;
        let path = path.as_ref();
        let img = image::open(path)
            .with_context(|| format!("Failed to open image {}", path.display()))?
            .to_luma8();
        anyhow::ensure!(
            (img.width() as usize, img.height() as usize) == self.size,
            "image {} is {}x{}, detector is {}x{}",
            path.display(),
            img.width(),
            img.height(),
            self.size.0,
            self.size.1
        );
        for (x, y, pixel) in img.enumerate_pixels() {
            self.set(x as usize, y as usize, pixel.0[0] as f32);
        }
        Ok(())
    }
}
