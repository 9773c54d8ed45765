use ava_cv::{find_extremes, match_template, MatchTemplateMethod};
use ava_resource::manifest::MatchMethod;
use image::{imageops::crop_imm, math::Rect, DynamicImage};
use log::warn;

/// Best match of one engine invocation, in pixel coordinates of the
/// captured frame. Transient: consumed immediately by click-point
/// resolution, never cached across steps.
#[derive(Debug, Clone, Copy)]
pub struct MatchResult {
    pub rect: Rect,
    pub confidence: f32,
}

fn cv_method(method: MatchMethod) -> MatchTemplateMethod {
    match method {
        MatchMethod::CcoeffNormed => MatchTemplateMethod::CorrelationCoefficientNormed,
        MatchMethod::CcorrNormed => MatchTemplateMethod::CrossCorrelationNormed,
        MatchMethod::SqdiffNormed => MatchTemplateMethod::SumOfSquaredDifferenceNormed,
    }
}

/// Grayscale template correlation over a captured frame, optionally
/// restricted to a sub-rect of it (which bounds both cost and false
/// positives from unrelated content).
///
/// Both inputs are collapsed to grayscale; color variation from themes
/// and lighting is the dominant source of false negatives for UI chrome.
/// Squared-difference scores are folded into the same bigger-is-better
/// convention as the correlation methods (`1 - min`), so `threshold`
/// always compares one way. A score below `threshold` is a plain
/// no-match; callers cannot tell "nothing there" from "low confidence"
/// except by lowering the threshold and re-querying.
pub fn match_in_frame(
    frame: &DynamicImage,
    template: &DynamicImage,
    threshold: f32,
    region: Option<Rect>,
    method: MatchMethod,
) -> Option<MatchResult> {
    let frame = frame.to_luma32f();
    let template = template.to_luma32f();

    if frame.width() == 0 || frame.height() == 0 {
        return None;
    }

    let (mut offset_x, mut offset_y) = (0u32, 0u32);
    let search = match region {
        Some(region) => {
            let x = region.x.min(frame.width().saturating_sub(1));
            let y = region.y.min(frame.height().saturating_sub(1));
            let w = region.width.clamp(1, frame.width() - x);
            let h = region.height.clamp(1, frame.height() - y);
            offset_x = x;
            offset_y = y;
            crop_imm(&frame, x, y, w, h).to_image()
        }
        None => frame,
    };

    if template.width() > search.width() || template.height() > search.height() {
        warn!(
            "template {}x{} larger than search area {}x{}, skipping match",
            template.width(),
            template.height(),
            search.width(),
            search.height()
        );
        return None;
    }

    let res = match_template(&search, &template, cv_method(method));
    let extremes = find_extremes(&res);

    let (confidence, (x, y)) = match method {
        MatchMethod::SqdiffNormed => (1.0 - extremes.min_value, extremes.min_value_location),
        _ => (extremes.max_value, extremes.max_value_location),
    };

    if confidence < threshold {
        return None;
    }

    Some(MatchResult {
        rect: Rect {
            x: x + offset_x,
            y: y + offset_y,
            width: template.width(),
            height: template.height(),
        },
        confidence,
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::testutil::{noise_image, patch_of};
    use image::DynamicImage;

    fn frame_and_patch() -> (DynamicImage, DynamicImage) {
        let frame = noise_image(100, 80);
        let template = patch_of(&frame, 30, 20, 10, 8);
        (
            DynamicImage::ImageLuma8(frame),
            DynamicImage::ImageLuma8(template),
        )
    }

    #[test]
    fn test_match_locates_embedded_patch() {
        let (frame, template) = frame_and_patch();
        let res = match_in_frame(&frame, &template, 0.9, None, MatchMethod::CcoeffNormed).unwrap();
        assert_eq!((res.rect.x, res.rect.y), (30, 20));
        assert_eq!((res.rect.width, res.rect.height), (10, 8));
        assert!(res.confidence > 0.99);
    }

    #[test]
    fn test_no_match_below_threshold() {
        let (frame, _) = frame_and_patch();
        // a patch that exists nowhere in the frame
        let absent = DynamicImage::ImageLuma8(noise_image(12, 12));

        for method in [
            MatchMethod::CcoeffNormed,
            MatchMethod::CcorrNormed,
            MatchMethod::SqdiffNormed,
        ] {
            let best = match_in_frame(&frame, &absent, -1.0, None, method)
                .expect("threshold -1 accepts any score");
            assert!(best.confidence < 0.98);
            // the same score rejected once the threshold sits above it
            assert!(match_in_frame(&frame, &absent, 0.98, None, method).is_none());
        }
    }

    #[test]
    fn test_sqdiff_scores_fold_into_confidence() {
        let (frame, template) = frame_and_patch();
        let res =
            match_in_frame(&frame, &template, 0.9, None, MatchMethod::SqdiffNormed).unwrap();
        assert_eq!((res.rect.x, res.rect.y), (30, 20));
        assert!((res.confidence - 1.0).abs() < 1e-3);
    }

    #[test]
    fn test_region_offsets_restored() {
        let (frame, template) = frame_and_patch();
        let region = Rect {
            x: 20,
            y: 10,
            width: 40,
            height: 30,
        };
        let res = match_in_frame(
            &frame,
            &template,
            0.9,
            Some(region),
            MatchMethod::CcoeffNormed,
        )
        .unwrap();
        assert_eq!((res.rect.x, res.rect.y), (30, 20));
    }

    #[test]
    fn test_region_excluding_patch_misses() {
        let (frame, template) = frame_and_patch();
        let region = Rect {
            x: 50,
            y: 40,
            width: 50,
            height: 40,
        };
        assert!(match_in_frame(
            &frame,
            &template,
            0.9,
            Some(region),
            MatchMethod::CcoeffNormed
        )
        .is_none());
    }

    #[test]
    fn test_oversized_template_is_no_match() {
        let (frame, _) = frame_and_patch();
        let big = DynamicImage::ImageLuma8(noise_image(200, 200));
        assert!(match_in_frame(&frame, &big, 0.0, None, MatchMethod::CcoeffNormed).is_none());
    }
}
