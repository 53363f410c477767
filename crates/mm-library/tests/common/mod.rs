#![allow(dead_code)]

use async_trait::async_trait;
use image::{ImageFormat, Rgb, RgbImage};
use mm_core::{AnswerProvider, EmbeddingProvider, LibraryConfig, MmError, Result};
use std::io::Cursor;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("debug")
        .with_test_writer()
        .try_init();
}

pub fn png(color: [u8; 3]) -> Vec<u8> {
    let img = RgbImage::from_pixel(6, 6, Rgb(color));
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Png).unwrap();
    buf.into_inner()
}

pub fn write_png(dir: &Path, name: &str, color: [u8; 3]) {
    std::fs::write(dir.join(name), png(color)).unwrap();
}

pub fn library_config(dir: &Path) -> LibraryConfig {
    LibraryConfig {
        path: dir.to_path_buf(),
        ..LibraryConfig::default()
    }
}

/// Embeds an image as its mean RGB color and a text query as a named color.
/// Near-black images are refused, as a model backend failure would be.
#[derive(Default)]
pub struct ColorEmbedder {
    pub image_calls: AtomicUsize,
    pub text_calls: AtomicUsize,
}

impl ColorEmbedder {
    pub fn image_calls(&self) -> usize {
        self.image_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingProvider for ColorEmbedder {
    fn name(&self) -> &str {
        "color"
    }

    async fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
        self.text_calls.fetch_add(1, Ordering::SeqCst);
        match text.to_lowercase().as_str() {
            "red" => Ok(vec![1.0, 0.0, 0.0]),
            "green" => Ok(vec![0.0, 1.0, 0.0]),
            "blue" => Ok(vec![0.0, 0.0, 1.0]),
            "purple" => Ok(vec![1.0, 0.0, 1.0]),
            "void" => Ok(vec![0.0, 0.0, 0.0]),
            other => Err(MmError::Embedding(format!("unknown color {other}"))),
        }
    }

    async fn embed_image(&self, image: &[u8]) -> Result<Vec<f32>> {
        self.image_calls.fetch_add(1, Ordering::SeqCst);
        let img = image::load_from_memory(image)
            .map_err(|e| MmError::Embedding(e.to_string()))?
            .to_rgb8();
        let n = (img.width() * img.height()) as f32;
        let mut mean = [0f32; 3];
        for px in img.pixels() {
            for c in 0..3 {
                mean[c] += f32::from(px[c]) / 255.0 / n;
            }
        }
        if mean.iter().sum::<f32>() < 0.01 {
            return Err(MmError::Embedding("backend refused a blank image".into()));
        }
        Ok(mean.to_vec())
    }
}

pub struct EchoAnswerer;

#[async_trait]
impl AnswerProvider for EchoAnswerer {
    fn name(&self) -> &str {
        "echo"
    }

    async fn answer(&self, image: &[u8], question: &str) -> Result<String> {
        Ok(format!("{} bytes, question: {question}", image.len()))
    }
}
