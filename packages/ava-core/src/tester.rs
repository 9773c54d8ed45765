use std::path::Path;

use anyhow::Result;
use serde::Serialize;

use ava_resource::manifest::{template::DEFAULT_THRESHOLD, TemplateConfig};

use crate::{click::resolve_click_point, vision::match_in_frame, Error};

/// Outcome of checking one template against a saved frame. Used by the
/// interactive tuning surface to dial in thresholds and regions without
/// driving the live window.
#[derive(Debug, Serialize)]
pub struct TemplateTestReport {
    pub matched: bool,
    pub confidence: Option<f32>,
    /// `(x, y, width, height)` in pixels of the base image.
    pub rect: Option<(u32, u32, u32, u32)>,
    /// Only present on a match; check `matched` before acting on it.
    pub click_point: Option<(u32, u32)>,
}

/// Runs a catalog template against a base image exactly the way the live
/// engine would, search region and click resolution included.
pub fn test_template(
    base_image: &Path,
    templates_config: &Path,
    key: &str,
) -> Result<TemplateTestReport> {
    let catalog = TemplateConfig::load(templates_config)?;
    let def = catalog
        .get(key)
        .cloned()
        .ok_or_else(|| Error::TemplateNotFound(key.to_string()))?;

    let frame = image::open(base_image)?;
    let template = image::open(&def.file)?;
    let region = def.search_region.map(|region| {
        let (x, y, width, height) = region.to_absolute(frame.width(), frame.height());
        image::math::Rect {
            x,
            y,
            width,
            height,
        }
    });

    let report = match match_in_frame(
        &frame,
        &template,
        def.threshold.unwrap_or(DEFAULT_THRESHOLD),
        region,
        def.method.unwrap_or_default(),
    ) {
        Some(matched) => {
            let point = resolve_click_point(
                matched.rect,
                def.click_mode.unwrap_or_default(),
                def.padding.unwrap_or_default(),
            );
            TemplateTestReport {
                matched: true,
                confidence: Some(matched.confidence),
                rect: Some((
                    matched.rect.x,
                    matched.rect.y,
                    matched.rect.width,
                    matched.rect.height,
                )),
                click_point: Some(point),
            }
        }
        None => TemplateTestReport {
            matched: false,
            confidence: None,
            rect: None,
            click_point: None,
        },
    };
    Ok(report)
}
