use image::imageops::{self, FilterType};
use image::GrayImage;
use ndarray::Array4;

use crate::error::PipelineError;
use crate::localizer::FaceRegion;

/// Side length of the square input the classifier was trained on.
pub const INPUT_SIZE: u32 = 48;

/// Turns a face crop into the classifier's input tensor.
///
/// Steps, in order: bounds-checked crop, bilinear resize to 48x48, cast to
/// f32 and scale by 1/255, reshape to (1, 48, 48, 1). The resize filter must
/// stay bilinear to match the kernel used when the model was trained. No
/// augmentation of any kind is applied here.
pub fn to_model_input(
    image: &GrayImage,
    region: &FaceRegion,
) -> Result<Array4<f32>, PipelineError> {
    let (image_width, image_height) = image.dimensions();

    let right = region.x.checked_add(region.width);
    let bottom = region.y.checked_add(region.height);
    let in_bounds = region.width > 0
        && region.height > 0
        && right.is_some_and(|r| r <= image_width)
        && bottom.is_some_and(|b| b <= image_height);
    if !in_bounds {
        return Err(PipelineError::InvalidRegion {
            x: region.x,
            y: region.y,
            width: region.width,
            height: region.height,
            image_width,
            image_height,
        });
    }

    let crop =
        imageops::crop_imm(image, region.x, region.y, region.width, region.height).to_image();
    let face = imageops::resize(&crop, INPUT_SIZE, INPUT_SIZE, FilterType::Triangle);

    let mut tensor = Array4::<f32>::zeros((1, INPUT_SIZE as usize, INPUT_SIZE as usize, 1));
    for (x, y, pixel) in face.enumerate_pixels() {
        tensor[[0, y as usize, x as usize, 0]] = f32::from(pixel.0[0]) / 255.0;
    }

    Ok(tensor)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient_image(width: u32, height: u32) -> GrayImage {
        GrayImage::from_fn(width, height, |x, y| {
            image::Luma([((x * 5 + y * 3) % 256) as u8])
        })
    }

    #[test]
    fn output_has_model_shape_and_unit_range() {
        let img = gradient_image(100, 100);
        let region = FaceRegion {
            x: 10,
            y: 10,
            width: 64,
            height: 64,
        };

        let tensor = to_model_input(&img, &region).unwrap();
        assert_eq!(tensor.shape(), &[1, 48, 48, 1]);
        assert!(tensor.iter().all(|&v| (0.0..=1.0).contains(&v)));
    }

    #[test]
    fn preprocessing_is_deterministic() {
        let img = gradient_image(120, 90);
        let region = FaceRegion {
            x: 5,
            y: 7,
            width: 70,
            height: 60,
        };

        let first = to_model_input(&img, &region).unwrap();
        let second = to_model_input(&img, &region).unwrap();
        // Bit-identical, not merely close.
        assert_eq!(first, second);
    }

    #[test]
    fn resize_is_identity_on_48x48_crop() {
        let img = gradient_image(100, 100);
        let region = FaceRegion {
            x: 20,
            y: 20,
            width: 48,
            height: 48,
        };

        let tensor = to_model_input(&img, &region).unwrap();
        for y in 0..48u32 {
            for x in 0..48u32 {
                let direct = f32::from(img.get_pixel(region.x + x, region.y + y).0[0]) / 255.0;
                let resized = tensor[[0, y as usize, x as usize, 0]];
                assert!(
                    (direct - resized).abs() <= 1.5 / 255.0,
                    "pixel ({x}, {y}) drifted: {direct} vs {resized}"
                );
            }
        }
    }

    #[test]
    fn out_of_bounds_region_is_rejected() {
        let img = gradient_image(50, 50);
        let region = FaceRegion {
            x: 30,
            y: 30,
            width: 30,
            height: 30,
        };

        let err = to_model_input(&img, &region).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidRegion { .. }));
    }

    #[test]
    fn empty_region_is_rejected() {
        let img = gradient_image(50, 50);
        let region = FaceRegion {
            x: 10,
            y: 10,
            width: 0,
            height: 20,
        };

        let err = to_model_input(&img, &region).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidRegion { .. }));
    }
}
