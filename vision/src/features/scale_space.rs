//! Gaussian and difference-of-Gaussian pyramids.

use ndarray::{s, Array2, Zip};

use super::DetectorConfig;

/// Blur already present in a freshly captured frame
const ASSUMED_INPUT_SIGMA: f64 = 0.5;

/// Normalized 1-D Gaussian kernel of radius `ceil(3 sigma)`
pub(crate) fn gaussian_kernel(sigma: f64) -> Vec<f32> {
    let radius = (3.0 * sigma).ceil().max(1.0) as isize;
    let mut kernel: Vec<f32> = (-radius..=radius)
        .map(|i| (-(i * i) as f64 / (2.0 * sigma * sigma)).exp() as f32)
        .collect();
    let sum: f32 = kernel.iter().sum();
    for k in kernel.iter_mut() {
        *k /= sum;
    }
    kernel
}

/// Separable Gaussian blur with clamped borders
pub(crate) fn gaussian_blur(img: &Array2<f32>, sigma: f64) -> Array2<f32> {
    if sigma <= 0.0 {
        return img.clone();
    }
    let kernel = gaussian_kernel(sigma);
    let r = (kernel.len() / 2) as isize;
    let (h, w) = img.dim();

    let mut horizontal = Array2::<f32>::zeros((h, w));
    Zip::indexed(&mut horizontal).par_for_each(|(y, x), out| {
        let mut acc = 0.0;
        for (k, weight) in kernel.iter().enumerate() {
            let xx = (x as isize + k as isize - r).clamp(0, w as isize - 1) as usize;
            acc += weight * img[[y, xx]];
        }
        *out = acc;
    });

    let mut blurred = Array2::<f32>::zeros((h, w));
    Zip::indexed(&mut blurred).par_for_each(|(y, x), out| {
        let mut acc = 0.0;
        for (k, weight) in kernel.iter().enumerate() {
            let yy = (y as isize + k as isize - r).clamp(0, h as isize - 1) as usize;
            acc += weight * horizontal[[yy, x]];
        }
        *out = acc;
    });

    blurred
}

/// One octave of the scale space
pub(crate) struct Octave {
    /// Pixel size of this octave relative to the input frame
    pub scale: f64,
    /// Blur level of each Gaussian image, in octave pixels
    pub sigmas: Vec<f64>,
    pub gaussians: Vec<Array2<f32>>,
    pub dogs: Vec<Array2<f32>>,
}

/// Build `config.octaves` octaves (fewer if the image becomes too small).
///
/// Each octave holds `scales_per_octave + 3` Gaussian images so that
/// extrema can be searched on `scales_per_octave` DoG levels.
pub(crate) fn build_pyramid(image: &Array2<f32>, config: &DetectorConfig) -> Vec<Octave> {
    let s = config.scales_per_octave.max(1);
    let k = 2f64.powf(1.0 / s as f64);
    let sigmas: Vec<f64> = (0..s + 3)
        .map(|i| config.base_sigma * k.powi(i as i32))
        .collect();
    let min_size = 2 * config.border + 8;

    let initial = (config.base_sigma.powi(2) - ASSUMED_INPUT_SIGMA.powi(2))
        .max(0.01)
        .sqrt();
    let mut base = gaussian_blur(image, initial);
    let mut octaves = Vec::with_capacity(config.octaves);

    for o in 0..config.octaves {
        let (h, w) = base.dim();
        if h < min_size || w < min_size {
            break;
        }

        let mut gaussians = Vec::with_capacity(sigmas.len());
        gaussians.push(base);
        for i in 1..sigmas.len() {
            let increment = (sigmas[i].powi(2) - sigmas[i - 1].powi(2)).sqrt();
            let next = gaussian_blur(&gaussians[i - 1], increment);
            gaussians.push(next);
        }

        let dogs: Vec<Array2<f32>> = gaussians
            .windows(2)
            .map(|pair| &pair[1] - &pair[0])
            .collect();

        // Level s has twice the base blur; subsampled it seeds the next octave
        base = gaussians[s].slice(s![..;2, ..;2]).to_owned();

        octaves.push(Octave {
            scale: 2f64.powi(o as i32),
            sigmas: sigmas.clone(),
            gaussians,
            dogs,
        });
    }

    octaves
}
