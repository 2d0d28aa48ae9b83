use super::encode::resize_and_encode;
use super::plan::sample_indices;
use super::{FrameSampler, SamplingSettings};
use crate::common::{EncodedFrame, FrameOrigin, FrameSet, LocatedMedia};
use crate::error::ItemError;
use async_trait::async_trait;
use image::codecs::gif::GifDecoder;
use image::codecs::png::PngDecoder;
use image::codecs::webp::WebPDecoder;
use image::{AnimationDecoder, DynamicImage, Frames, ImageError, ImageFormat};
use std::io::Cursor;
use tracing::debug;

fn decode_error(e: ImageError) -> ItemError {
    ItemError::FrameExtraction(format!("Frame decode failed: {}", e))
}

/// Samples discrete frames from GIF, animated WebP and APNG; other images count as one frame
#[derive(Debug, Clone, Default)]
pub struct AnimatedImageSampler;

impl AnimatedImageSampler {
    pub fn new() -> Self {
        Self
    }

    /// Frame iterator when the data is animated, `None` for stills
    fn animation(data: &[u8], format: ImageFormat) -> Result<Option<Frames<'_>>, ItemError> {
        let frames = match format {
            ImageFormat::Gif => {
                let decoder = GifDecoder::new(Cursor::new(data)).map_err(decode_error)?;
                Some(decoder.into_frames())
            }
            ImageFormat::WebP => {
                let decoder = WebPDecoder::new(Cursor::new(data)).map_err(decode_error)?;
                decoder.has_animation().then(|| decoder.into_frames())
            }
            ImageFormat::Png => {
                let decoder = PngDecoder::new(Cursor::new(data)).map_err(decode_error)?;
                if decoder.is_apng().map_err(decode_error)? {
                    Some(decoder.apng().map_err(decode_error)?.into_frames())
                } else {
                    None
                }
            }
            _ => None,
        };
        Ok(frames)
    }

    /// Walk the animation twice: once to count frames, once to keep only the chosen ones.
    /// Frames are composited in order, so each one is decoded but at most one is held at a time.
    fn sample_animation(
        data: &[u8],
        format: ImageFormat,
        settings: SamplingSettings,
    ) -> Result<Option<Vec<EncodedFrame>>, ItemError> {
        let Some(frames) = Self::animation(data, format)? else {
            return Ok(None);
        };
        let mut total = 0usize;
        for frame in frames {
            frame.map_err(decode_error)?;
            total += 1;
        }

        let indices = sample_indices(total, settings.frame_count);
        debug!("Sampling {} of {} frames: {:?}", indices.len(), total, indices);

        let mut wanted = indices.into_iter().peekable();
        let mut encoded = Vec::with_capacity(settings.frame_count);
        let frames = Self::animation(data, format)?.into_iter().flatten();
        for (position, frame) in frames.enumerate() {
            let Some(&next) = wanted.peek() else {
                break;
            };
            let frame = frame.map_err(decode_error)?;
            if position == next {
                wanted.next();
                let image = DynamicImage::ImageRgba8(frame.into_buffer());
                encoded.push(resize_and_encode(
                    image,
                    settings.max_dimension,
                    FrameOrigin::Index(position),
                )?);
            }
        }
        Ok(Some(encoded))
    }

    /// Decode, pick evenly spaced frames, resize and encode them
    pub fn sample_bytes(data: &[u8], settings: SamplingSettings) -> Result<FrameSet, ItemError> {
        let format = image::guess_format(data)
            .map_err(|e| ItemError::FrameExtraction(format!("Unrecognised image data: {}", e)))?;

        let encoded = match Self::sample_animation(data, format, settings)? {
            Some(encoded) => encoded,
            None => {
                let image = image::load_from_memory_with_format(data, format)
                    .map_err(|e| ItemError::FrameExtraction(format!("Image decode failed: {}", e)))?;
                vec![resize_and_encode(image, settings.max_dimension, FrameOrigin::Index(0))?]
            }
        };

        if encoded.is_empty() {
            return Err(ItemError::FrameExtraction("Image contains no frames".to_string()));
        }
        Ok(FrameSet::new(encoded))
    }
}

#[async_trait]
impl FrameSampler for AnimatedImageSampler {
    async fn sample(
        &self,
        media: &LocatedMedia,
        settings: SamplingSettings,
    ) -> Result<FrameSet, ItemError> {
        let data = media
            .read_bytes()
            .await
            .map_err(|e| ItemError::FrameExtraction(format!("Failed to read media: {}", e)))?;

        tokio::task::spawn_blocking(move || Self::sample_bytes(&data, settings))
            .await
            .map_err(|e| ItemError::Aborted(format!("Frame decoding task failed: {}", e)))?
    }

    fn name(&self) -> &'static str {
        "animated-image"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use image::codecs::gif::GifEncoder;
    use image::{Delay, Frame, ImageBuffer, Rgba, RgbaImage};

    /// A GIF whose frame `n` is filled with red level `n * 10`
    fn synthetic_gif(frame_count: u8, width: u32, height: u32) -> Vec<u8> {
        let mut data = Vec::new();
        {
            let mut encoder = GifEncoder::new(&mut data);
            let frames = (0..frame_count).map(|n| {
                let buffer: RgbaImage = ImageBuffer::from_pixel(width, height, Rgba([n * 10, 0, 0, 255]));
                Frame::from_parts(buffer, 0, 0, Delay::from_numer_denom_ms(100, 1))
            });
            encoder.encode_frames(frames).unwrap();
        }
        data
    }

    fn crc32(bytes: &[u8]) -> u32 {
        let mut crc = 0xFFFF_FFFFu32;
        for &byte in bytes {
            crc ^= byte as u32;
            for _ in 0..8 {
                crc = if crc & 1 != 0 {
                    (crc >> 1) ^ 0xEDB8_8320
                } else {
                    crc >> 1
                };
            }
        }
        !crc
    }

    fn push_chunk(out: &mut Vec<u8>, kind: &[u8; 4], body: &[u8]) {
        out.extend_from_slice(&(body.len() as u32).to_be_bytes());
        let start = out.len();
        out.extend_from_slice(kind);
        out.extend_from_slice(body);
        let crc = crc32(&out[start..]);
        out.extend_from_slice(&crc.to_be_bytes());
    }

    fn png_chunks(png: &[u8]) -> Vec<([u8; 4], Vec<u8>)> {
        let mut chunks = Vec::new();
        let mut at = 8;
        while at + 8 <= png.len() {
            let len = u32::from_be_bytes(png[at..at + 4].try_into().unwrap()) as usize;
            let kind: [u8; 4] = png[at + 4..at + 8].try_into().unwrap();
            chunks.push((kind, png[at + 8..at + 8 + len].to_vec()));
            at += 12 + len;
        }
        chunks
    }

    /// An APNG whose frame `n` is filled with red level `n * 10`
    fn synthetic_apng(frame_count: u8, width: u32, height: u32) -> Vec<u8> {
        let stills: Vec<Vec<u8>> = (0..frame_count)
            .map(|n| {
                let buffer: RgbaImage = ImageBuffer::from_pixel(width, height, Rgba([n * 10, 0, 0, 255]));
                let mut png = Vec::new();
                DynamicImage::ImageRgba8(buffer)
                    .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
                    .unwrap();
                png
            })
            .collect();

        let mut out = stills[0][..8].to_vec();
        let (_, header) = png_chunks(&stills[0])
            .into_iter()
            .find(|(kind, _)| kind == b"IHDR")
            .unwrap();
        push_chunk(&mut out, b"IHDR", &header);

        let mut control = (frame_count as u32).to_be_bytes().to_vec();
        control.extend_from_slice(&0u32.to_be_bytes());
        push_chunk(&mut out, b"acTL", &control);

        let mut sequence = 0u32;
        for (n, still) in stills.iter().enumerate() {
            let mut frame_control = Vec::new();
            for field in [sequence, width, height, 0, 0] {
                frame_control.extend_from_slice(&field.to_be_bytes());
            }
            frame_control.extend_from_slice(&1u16.to_be_bytes());
            frame_control.extend_from_slice(&10u16.to_be_bytes());
            // dispose none, blend source
            frame_control.extend_from_slice(&[0, 0]);
            push_chunk(&mut out, b"fcTL", &frame_control);
            sequence += 1;

            let data: Vec<u8> = png_chunks(still)
                .into_iter()
                .filter(|(kind, _)| kind == b"IDAT")
                .flat_map(|(_, body)| body)
                .collect();
            if n == 0 {
                push_chunk(&mut out, b"IDAT", &data);
            } else {
                let mut frame_data = sequence.to_be_bytes().to_vec();
                frame_data.extend_from_slice(&data);
                push_chunk(&mut out, b"fdAT", &frame_data);
                sequence += 1;
            }
        }
        push_chunk(&mut out, b"IEND", &[]);
        out
    }

    fn settings(frame_count: usize, max_dimension: u32) -> SamplingSettings {
        SamplingSettings {
            frame_count,
            max_dimension,
        }
    }

    #[test]
    fn samples_endpoints_of_long_gif() {
        let gif = synthetic_gif(12, 8, 8);
        let frames = AnimatedImageSampler::sample_bytes(&gif, settings(5, 512)).unwrap();
        assert_eq!(frames.indices(), vec![0, 3, 6, 8, 11]);
    }

    #[test]
    fn short_gif_contributes_every_frame() {
        let gif = synthetic_gif(3, 8, 8);
        let frames = AnimatedImageSampler::sample_bytes(&gif, settings(5, 512)).unwrap();
        assert_eq!(frames.indices(), vec![0, 1, 2]);
    }

    #[test]
    fn sampled_frames_come_from_the_chosen_positions() {
        let gif = synthetic_gif(12, 4, 4);
        let frames = AnimatedImageSampler::sample_bytes(&gif, settings(5, 512)).unwrap();
        let last = image::load_from_memory(frames.frames()[4].data()).unwrap().to_rgba8();
        let red = last.get_pixel(0, 0)[0] as i32;
        assert!((red - 110).abs() <= 2, "unexpected red level {}", red);
    }

    #[test]
    fn apng_is_sampled_across_its_frames() {
        let apng = synthetic_apng(12, 4, 4);
        let frames = AnimatedImageSampler::sample_bytes(&apng, settings(5, 512)).unwrap();
        assert_eq!(frames.indices(), vec![0, 3, 6, 8, 11]);

        let last = image::load_from_memory(frames.frames()[4].data()).unwrap().to_rgba8();
        assert_eq!(last.get_pixel(0, 0)[0], 110);
    }

    #[test]
    fn still_png_is_a_single_frame() {
        let buffer: RgbaImage = ImageBuffer::from_pixel(8, 8, Rgba([1, 2, 3, 255]));
        let mut png = Vec::new();
        DynamicImage::ImageRgba8(buffer)
            .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .unwrap();

        let frames = AnimatedImageSampler::sample_bytes(&png, settings(5, 512)).unwrap();
        assert_eq!(frames.indices(), vec![0]);
    }

    #[test]
    fn oversized_frames_are_downscaled() {
        let gif = synthetic_gif(2, 64, 32);
        let frames = AnimatedImageSampler::sample_bytes(&gif, settings(5, 16)).unwrap();
        assert!(frames.iter().all(|frame| frame.dimensions() == (16, 8)));
    }

    #[test]
    fn garbage_is_a_frame_extraction_error() {
        let result = AnimatedImageSampler::sample_bytes(b"not an image at all", settings(5, 512));
        assert!(matches!(result, Err(ItemError::FrameExtraction(_))));
    }

    #[tokio::test]
    async fn samples_from_in_memory_media() {
        let media = LocatedMedia::Bytes {
            data: Bytes::from(synthetic_gif(6, 8, 8)),
            url: "https://example.com/a.gif".to_string(),
        };
        let frames = AnimatedImageSampler::new()
            .sample(&media, settings(5, 512))
            .await
            .unwrap();
        assert_eq!(frames.len(), 5);
    }
}
