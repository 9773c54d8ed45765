use image::{ImageBuffer, Luma};
use imageproc::template_matching::Extremes;

use crate::utils::{image_mean, square_sum};

/// Score direction differs per family: for the squared-difference method a
/// smaller score is better, for the correlation methods a bigger score is
/// better. Callers normalize with [`Extremes`] accordingly.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MatchTemplateMethod {
    /// Zero-mean normalized cross-correlation.
    CorrelationCoefficientNormed,
    /// Plain normalized cross-correlation.
    CrossCorrelationNormed,
    /// Normalized sum of squared differences.
    SumOfSquaredDifferenceNormed,
}

/// Slides `template` over `image` and scores the match at each position
/// with the requested method. The result map has size
/// `(W - w + 1, H - h + 1)`; the template must not exceed the image.
pub fn match_template(
    image: &ImageBuffer<Luma<f32>, Vec<f32>>,
    template: &ImageBuffer<Luma<f32>, Vec<f32>>,
    method: MatchTemplateMethod,
) -> ImageBuffer<Luma<f32>, Vec<f32>> {
    assert!(
        template.width() <= image.width() && template.height() <= image.height(),
        "template ({}x{}) must not exceed image ({}x{})",
        template.width(),
        template.height(),
        image.width(),
        image.height()
    );

    let (iw, ih) = image.dimensions();
    let (tw, th) = template.dimensions();
    let (rw, rh) = (iw - tw + 1, ih - th + 1);

    let n = (tw * th) as f64;
    let t_mean = image_mean(template) as f64;
    let t_sq_sum = square_sum(template) as f64;
    // Σ(T - mean(T))² = ΣT² - n·mean(T)²
    let t_centered_sq_sum = t_sq_sum - n * t_mean * t_mean;

    let image_raw = image.as_raw();
    let template_raw = template.as_raw();

    let mut result = Vec::with_capacity((rw * rh) as usize);
    for ry in 0..rh {
        for rx in 0..rw {
            let mut i_sum = 0.0f64;
            let mut i_sq_sum = 0.0f64;
            let mut cross = 0.0f64;
            for ty in 0..th {
                let image_row = ((ry + ty) * iw + rx) as usize;
                let template_row = (ty * tw) as usize;
                for tx in 0..tw as usize {
                    let i = image_raw[image_row + tx] as f64;
                    let t = template_raw[template_row + tx] as f64;
                    i_sum += i;
                    i_sq_sum += i * i;
                    cross += i * t;
                }
            }
            let score = score_window(method, n, i_sum, i_sq_sum, cross, t_mean, t_sq_sum, t_centered_sq_sum);
            result.push(score as f32);
        }
    }

    ImageBuffer::from_vec(rw, rh, result).unwrap()
}

#[allow(clippy::too_many_arguments)]
fn score_window(
    method: MatchTemplateMethod,
    n: f64,
    i_sum: f64,
    i_sq_sum: f64,
    cross: f64,
    t_mean: f64,
    t_sq_sum: f64,
    t_centered_sq_sum: f64,
) -> f64 {
    const EPS: f64 = 1e-12;
    match method {
        MatchTemplateMethod::CorrelationCoefficientNormed => {
            // Σ I'·T' = Σ I·T - mean(T)·Σ I, since Σ T' = 0
            let num = cross - t_mean * i_sum;
            let i_centered_sq_sum = i_sq_sum - i_sum * i_sum / n;
            let denom = (i_centered_sq_sum * t_centered_sq_sum).sqrt();
            if denom < EPS {
                0.0
            } else {
                num / denom
            }
        }
        MatchTemplateMethod::CrossCorrelationNormed => {
            let denom = (i_sq_sum * t_sq_sum).sqrt();
            if denom < EPS {
                0.0
            } else {
                cross / denom
            }
        }
        MatchTemplateMethod::SumOfSquaredDifferenceNormed => {
            // Σ(I - T)² = ΣI² - 2·ΣI·T + ΣT²
            let num = i_sq_sum - 2.0 * cross + t_sq_sum;
            let denom = (i_sq_sum * t_sq_sum).sqrt();
            if denom < EPS {
                if num < EPS {
                    0.0
                } else {
                    1.0
                }
            } else {
                num / denom
            }
        }
    }
}

/// Finds the smallest and largest scores and their locations in a result map.
pub fn find_extremes(input: &ImageBuffer<Luma<f32>, Vec<f32>>) -> Extremes<f32> {
    let mut min_value = f32::MAX;
    let mut min_value_location = (0, 0);
    let mut max_value = f32::MIN;
    let mut max_value_location = (0, 0);

    for (x, y, pixel) in input.enumerate_pixels() {
        let value = pixel.0[0];
        if value < min_value {
            min_value = value;
            min_value_location = (x, y);
        }
        if value > max_value {
            max_value = value;
            max_value_location = (x, y);
        }
    }

    Extremes {
        min_value,
        max_value,
        min_value_location,
        max_value_location,
    }
}
