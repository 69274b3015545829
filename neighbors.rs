use crate::error::Result;
use crate::loader::{self, ImageSet};
use crate::perceptual::PerceptualModel;
use std::collections::BTreeMap;
use std::path::Path;

/// For every generated image in a class, the distance to its closest real
/// neighbor; the class score is the average of those minima. Classes
/// empty on either side are skipped entirely (absent from the mapping);
/// a class that produced no minima despite the emptiness check reports
/// `None`.
pub fn per_class_min_distance(
    model: &mut dyn PerceptualModel,
    real_root: &Path,
    generated_root: &Path,
    resolution: u32,
) -> Result<BTreeMap<String, Option<f64>>> {
    let mut results = BTreeMap::new();
    for class_name in loader::discover_classes(real_root) {
        let real = loader::load_class(&loader::class_dir(real_root, &class_name), resolution);
        let generated =
            loader::load_class(&loader::class_dir(generated_root, &class_name), resolution);
        if real.is_empty() {
            log::warn!("No real images for class '{class_name}'; skipping");
            continue;
        }
        if generated.is_empty() {
            log::warn!("No generated images for class '{class_name}'; skipping");
            continue;
        }
        log::info!(
            "Class '{class_name}': {} real, {} generated",
            real.len(),
            generated.len()
        );
        let score = average_min_distance(model, &generated, &real)?;
        results.insert(class_name, score);
    }
    Ok(results)
}

/// Average over generated images of the minimum distance to any real
/// image. `None` when no minima were computed.
pub fn average_min_distance(
    model: &mut dyn PerceptualModel,
    generated: &ImageSet,
    real: &ImageSet,
) -> Result<Option<f64>> {
    let mut minima = Vec::with_capacity(generated.len());
    for gen_img in &generated.images {
        let scores = model.distances(gen_img, &real.images)?;
        if let Some(min) = scores.iter().cloned().reduce(f32::min) {
            minima.push(min as f64);
        }
    }
    if minima.is_empty() {
        return Ok(None);
    }
    Ok(Some(minima.iter().sum::<f64>() / minima.len() as f64))
}
