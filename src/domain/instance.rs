// The immutable description of one image selection problem.
//
// An instance is the discretized area of interest (a number of elements), a list of
// candidate images and a list of cloud regions. Every image knows which elements and
// which cloud regions it covers. Instances are validated once on construction and never
// change afterwards.

use serde::{Deserialize, Serialize};

use super::solver_service::{MosaicError, Result};

/// A candidate image that can be part of the mosaic
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageCandidate {
    pub cost: i64,
    /// Ground resolution, lower is better
    pub resolution: i64,
    /// Incidence angle, lower is better
    pub incidence_angle: i64,
    /// Indices of the AOI elements covered by the image
    pub elements: Vec<usize>,
    /// Indices of the cloud regions covered by the image
    pub clouds: Vec<usize>,
}

impl ImageCandidate {
    pub fn new(cost: i64, resolution: i64, incidence_angle: i64) -> Self {
        Self {
            cost,
            resolution,
            incidence_angle,
            elements: Vec::new(),
            clouds: Vec::new(),
        }
    }

    pub fn covering(mut self, elements: impl IntoIterator<Item = usize>) -> Self {
        self.elements.extend(elements);
        self
    }

    pub fn covering_clouds(mut self, clouds: impl IntoIterator<Item = usize>) -> Self {
        self.clouds.extend(clouds);
        self
    }
}

/// A cloud region of the AOI, the accounting unit of the cloud objective
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloudRegion {
    pub area: i64,
}

/// Instance data as parallel arrays, the shape produced by upstream preprocessing
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawInstance {
    pub num_elements: usize,
    pub costs: Vec<i64>,
    pub resolutions: Vec<i64>,
    pub incidence_angles: Vec<i64>,
    /// `image_elements[i]` lists the elements covered by image `i`
    pub image_elements: Vec<Vec<usize>>,
    /// `image_clouds[i]` lists the cloud regions covered by image `i`
    #[serde(default)]
    pub image_clouds: Vec<Vec<usize>>,
    #[serde(default)]
    pub cloud_areas: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MosaicInstance {
    num_elements: usize,
    images: Vec<ImageCandidate>,
    clouds: Vec<CloudRegion>,
    #[serde(skip)]
    element_cover: Vec<Vec<usize>>,
    #[serde(skip)]
    cloud_cover: Vec<Vec<usize>>,
}

impl MosaicInstance {
    pub fn new(
        num_elements: usize,
        images: Vec<ImageCandidate>,
        clouds: Vec<CloudRegion>,
    ) -> Result<Self> {
        validate(num_elements, &images, &clouds)?;

        let mut element_cover = vec![Vec::new(); num_elements];
        let mut cloud_cover = vec![Vec::new(); clouds.len()];
        for (i, image) in images.iter().enumerate() {
            for &e in &image.elements {
                if !element_cover[e].contains(&i) {
                    element_cover[e].push(i);
                }
            }
            for &c in &image.clouds {
                if !cloud_cover[c].contains(&i) {
                    cloud_cover[c].push(i);
                }
            }
        }

        if let Some(e) = element_cover.iter().position(Vec::is_empty) {
            return Err(MosaicError::InvalidInstance(format!(
                "element {} is not covered by any image",
                e
            )));
        }

        Ok(Self {
            num_elements,
            images,
            clouds,
            element_cover,
            cloud_cover,
        })
    }

    pub fn from_arrays(raw: RawInstance) -> Result<Self> {
        let n = raw.costs.len();
        check_len("resolutions", raw.resolutions.len(), n)?;
        check_len("incidence_angles", raw.incidence_angles.len(), n)?;
        check_len("image_elements", raw.image_elements.len(), n)?;

        // No cloud lists at all means no image covers a cloud
        let image_clouds = if raw.image_clouds.is_empty() {
            vec![Vec::new(); n]
        } else {
            check_len("image_clouds", raw.image_clouds.len(), n)?;
            raw.image_clouds
        };

        let images = raw
            .costs
            .into_iter()
            .zip(raw.resolutions)
            .zip(raw.incidence_angles)
            .zip(raw.image_elements)
            .zip(image_clouds)
            .map(
                |((((cost, resolution), incidence_angle), elements), clouds)| ImageCandidate {
                    cost,
                    resolution,
                    incidence_angle,
                    elements,
                    clouds,
                },
            )
            .collect();
        let clouds = raw
            .cloud_areas
            .into_iter()
            .map(|area| CloudRegion { area })
            .collect();

        Self::new(raw.num_elements, images, clouds)
    }

    pub fn num_elements(&self) -> usize {
        self.num_elements
    }

    pub fn num_images(&self) -> usize {
        self.images.len()
    }

    pub fn num_clouds(&self) -> usize {
        self.clouds.len()
    }

    pub fn images(&self) -> &[ImageCandidate] {
        &self.images
    }

    pub fn image(&self, i: usize) -> &ImageCandidate {
        &self.images[i]
    }

    pub fn clouds(&self) -> &[CloudRegion] {
        &self.clouds
    }

    pub fn cloud_area(&self, c: usize) -> i64 {
        self.clouds[c].area
    }

    pub fn total_cloud_area(&self) -> i64 {
        self.clouds.iter().map(|c| c.area).sum()
    }

    /// Images covering element `e`, in increasing order
    pub fn images_covering_element(&self, e: usize) -> &[usize] {
        &self.element_cover[e]
    }

    /// Images covering cloud region `c`, in increasing order
    pub fn images_covering_cloud(&self, c: usize) -> &[usize] {
        &self.cloud_cover[c]
    }

    pub fn min_resolution(&self) -> i64 {
        self.images.iter().map(|i| i.resolution).min().unwrap_or_default()
    }

    pub fn max_resolution(&self) -> i64 {
        self.images.iter().map(|i| i.resolution).max().unwrap_or_default()
    }

    pub fn min_incidence_angle(&self) -> i64 {
        self.images
            .iter()
            .map(|i| i.incidence_angle)
            .min()
            .unwrap_or_default()
    }

    pub fn max_incidence_angle(&self) -> i64 {
        self.images
            .iter()
            .map(|i| i.incidence_angle)
            .max()
            .unwrap_or_default()
    }

    /// Total cost of the images flagged in `selection`
    pub fn selection_cost(&self, selection: &[bool]) -> i64 {
        self.images
            .iter()
            .zip(selection)
            .filter(|(_, &taken)| taken)
            .map(|(image, _)| image.cost)
            .sum()
    }

    /// Whether every element is covered by at least one selected image
    pub fn covers_all(&self, selection: &[bool]) -> bool {
        self.element_cover
            .iter()
            .all(|cover| cover.iter().any(|&i| selection.get(i).copied().unwrap_or(false)))
    }
}

fn check_len(what: &str, found: usize, expected: usize) -> Result<()> {
    if found != expected {
        return Err(MosaicError::InvalidInstance(format!(
            "{} has {} entries but there are {} images",
            what, found, expected
        )));
    }
    Ok(())
}

fn validate(num_elements: usize, images: &[ImageCandidate], clouds: &[CloudRegion]) -> Result<()> {
    let mut errors = Vec::new();

    if images.is_empty() {
        errors.push("Instance must have at least one image".to_string());
    }

    for (i, image) in images.iter().enumerate() {
        if let Some(e) = image.elements.iter().find(|&&e| e >= num_elements) {
            errors.push(format!(
                "Image {} covers element {} but there are {} elements",
                i, e, num_elements
            ));
        }
        if let Some(c) = image.clouds.iter().find(|&&c| c >= clouds.len()) {
            errors.push(format!(
                "Image {} covers cloud {} but there are {} clouds",
                i,
                c,
                clouds.len()
            ));
        }
        if image.cost < 0 {
            errors.push(format!("Image {} has negative cost ({})", i, image.cost));
        }
        if image.resolution <= 0 {
            errors.push(format!(
                "Image {} has non-positive resolution ({})",
                i, image.resolution
            ));
        }
        // Unselected images contribute an incidence angle of 0 to the maximum
        if image.incidence_angle < 0 {
            errors.push(format!(
                "Image {} has negative incidence angle ({})",
                i, image.incidence_angle
            ));
        }
    }

    for (c, cloud) in clouds.iter().enumerate() {
        if cloud.area < 0 {
            errors.push(format!("Cloud {} has negative area ({})", c, cloud.area));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(MosaicError::InvalidInstance(errors.join("; ")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_images() -> Vec<ImageCandidate> {
        vec![
            ImageCandidate::new(5, 10, 20).covering([0, 1]).covering_clouds([0]),
            ImageCandidate::new(7, 5, 10).covering([1, 2]),
        ]
    }

    #[test]
    fn builds_cover_lists() {
        let instance = MosaicInstance::new(3, two_images(), vec![CloudRegion { area: 4 }]).unwrap();
        assert_eq!(instance.images_covering_element(1), &[0, 1]);
        assert_eq!(instance.images_covering_element(2), &[1]);
        assert_eq!(instance.images_covering_cloud(0), &[0]);
        assert_eq!(instance.total_cloud_area(), 4);
        assert_eq!(instance.min_resolution(), 5);
        assert_eq!(instance.max_resolution(), 10);
        assert_eq!(instance.max_incidence_angle(), 20);
    }

    #[test]
    fn rejects_element_out_of_range() {
        let images = vec![ImageCandidate::new(1, 1, 1).covering([0, 3])];
        let err = MosaicInstance::new(2, images, vec![]).unwrap_err();
        assert!(matches!(err, MosaicError::InvalidInstance(msg) if msg.contains("element 3")));
    }

    #[test]
    fn rejects_cloud_out_of_range() {
        let images = vec![ImageCandidate::new(1, 1, 1).covering([0]).covering_clouds([1])];
        let result = MosaicInstance::new(1, images, vec![CloudRegion { area: 1 }]);
        assert!(matches!(result, Err(MosaicError::InvalidInstance(_))));
    }

    #[test]
    fn rejects_uncoverable_element() {
        let images = vec![ImageCandidate::new(1, 1, 1).covering([0])];
        let result = MosaicInstance::new(2, images, vec![]);
        assert!(matches!(result, Err(MosaicError::InvalidInstance(msg)) if msg.contains("element 1")));
    }

    #[test]
    fn rejects_negative_incidence_angle() {
        let images = vec![ImageCandidate::new(1, 1, -3).covering([0])];
        assert!(MosaicInstance::new(1, images, vec![]).is_err());
    }

    #[test]
    fn rejects_empty_image_list() {
        assert!(MosaicInstance::new(0, vec![], vec![]).is_err());
    }

    #[test]
    fn from_arrays_checks_lengths() {
        let raw = RawInstance {
            num_elements: 1,
            costs: vec![1, 2],
            resolutions: vec![1],
            incidence_angles: vec![0, 0],
            image_elements: vec![vec![0], vec![0]],
            ..Default::default()
        };
        let err = MosaicInstance::from_arrays(raw).unwrap_err();
        assert!(matches!(err, MosaicError::InvalidInstance(msg) if msg.contains("resolutions")));
    }

    #[test]
    fn from_arrays_without_clouds() {
        let raw = RawInstance {
            num_elements: 2,
            costs: vec![3],
            resolutions: vec![2],
            incidence_angles: vec![15],
            image_elements: vec![vec![0, 1]],
            ..Default::default()
        };
        let instance = MosaicInstance::from_arrays(raw).unwrap();
        assert_eq!(instance.num_clouds(), 0);
        assert_eq!(instance.num_images(), 1);
        assert!(instance.image(0).clouds.is_empty());
    }

    #[test]
    fn coverage_and_cost_of_selection() {
        let instance = MosaicInstance::new(3, two_images(), vec![CloudRegion { area: 4 }]).unwrap();
        assert!(!instance.covers_all(&[true, false]));
        assert!(instance.covers_all(&[true, true]));
        assert_eq!(instance.selection_cost(&[true, true]), 12);
    }

    #[test]
    fn raw_instance_reads_json() {
        let json = r#"{
            "num_elements": 2,
            "costs": [4, 6],
            "resolutions": [3, 1],
            "incidence_angles": [10, 25],
            "image_elements": [[0, 1], [1]],
            "image_clouds": [[0], []],
            "cloud_areas": [8]
        }"#;
        let raw: RawInstance = serde_json::from_str(json).unwrap();
        let instance = MosaicInstance::from_arrays(raw).unwrap();
        assert_eq!(instance.total_cloud_area(), 8);
        assert_eq!(instance.images_covering_element(1), &[0, 1]);
    }
}
