use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use image::codecs::jpeg::JpegEncoder;
use image::ExtendedColorType;
use log::info;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use plotters::prelude::*;

use super::Render;
use crate::error::RenderError;

const JPEG_QUALITY: u8 = 90;

/// Output file formats, chosen by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Png,
    Jpeg,
    Pdf,
    Svg,
}

impl OutputFormat {
    pub fn from_path(path: &Path) -> Result<Self, RenderError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();
        match ext.as_str() {
            "png" => Ok(OutputFormat::Png),
            "jpg" | "jpeg" => Ok(OutputFormat::Jpeg),
            "pdf" => Ok(OutputFormat::Pdf),
            "svg" => Ok(OutputFormat::Svg),
            _ => Err(RenderError::UnsupportedFormat {
                path: path.to_path_buf(),
            }),
        }
    }
}

/// Draw `chart` on a fresh surface of `size` pixels and write it to `path`.
///
/// The format follows the extension; parent directories are created.
pub fn save<C: Render>(chart: &C, path: &Path, size: (u32, u32)) -> Result<(), RenderError> {
    let format = OutputFormat::from_path(path)?;
    let io_err = |source: std::io::Error| RenderError::Io {
        source,
        path: path.to_path_buf(),
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_err)?;
    }

    match format {
        OutputFormat::Svg => {
            let root = SVGBackend::new(path, size).into_drawing_area();
            root.fill(&WHITE).map_err(RenderError::draw)?;
            chart.draw(&root)?;
            root.present().map_err(RenderError::draw)?;
        }
        OutputFormat::Png => {
            let pixels = rasterize(chart, size)?;
            image::save_buffer_with_format(
                path,
                &pixels,
                size.0,
                size.1,
                ExtendedColorType::Rgb8,
                image::ImageFormat::Png,
            )?;
        }
        OutputFormat::Jpeg => {
            let pixels = rasterize(chart, size)?;
            let mut out = BufWriter::new(File::create(path).map_err(io_err)?);
            encode_jpeg(&mut out, &pixels, size)?;
            out.flush().map_err(io_err)?;
        }
        OutputFormat::Pdf => {
            let pixels = rasterize(chart, size)?;
            let mut jpeg = Vec::new();
            encode_jpeg(&mut jpeg, &pixels, size)?;
            let mut doc = pdf_with_image(jpeg, size)?;
            let mut out = BufWriter::new(File::create(path).map_err(io_err)?);
            doc.save_to(&mut out)
                .map_err(|e| RenderError::Pdf(e.to_string()))?;
            out.flush().map_err(io_err)?;
        }
    }

    info!("wrote {}", path.display());
    Ok(())
}

/// Draw into an in-memory RGB buffer.
pub fn rasterize<C: Render>(chart: &C, size: (u32, u32)) -> Result<Vec<u8>, RenderError> {
    let mut buffer = vec![0u8; size.0 as usize * size.1 as usize * 3];
    {
        let root = BitMapBackend::with_buffer(&mut buffer, size).into_drawing_area();
        root.fill(&WHITE).map_err(RenderError::draw)?;
        chart.draw(&root)?;
        root.present().map_err(RenderError::draw)?;
    }
    Ok(buffer)
}

fn encode_jpeg<W: Write>(out: &mut W, pixels: &[u8], size: (u32, u32)) -> Result<(), RenderError> {
    let mut encoder = JpegEncoder::new_with_quality(out, JPEG_QUALITY);
    encoder.encode(pixels, size.0, size.1, ExtendedColorType::Rgb8)?;
    Ok(())
}

/// Single-page PDF whose page is exactly the JPEG image, one point per pixel.
fn pdf_with_image(jpeg: Vec<u8>, size: (u32, u32)) -> Result<Document, RenderError> {
    let (w, h) = (size.0 as i64, size.1 as i64);
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let image_stream = Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => w,
            "Height" => h,
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8,
            "Filter" => "DCTDecode",
        },
        jpeg,
    );
    let image_id = doc.add_object(image_stream);

    let content = Content {
        operations: vec![
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![w.into(), 0.into(), 0.into(), h.into(), 0.into(), 0.into()],
            ),
            Operation::new("Do", vec![Object::Name(b"Im0".to_vec())]),
            Operation::new("Q", vec![]),
        ],
    };
    let encoded = content
        .encode()
        .map_err(|e| RenderError::Pdf(e.to_string()))?;
    let content_id = doc.add_object(Stream::new(dictionary! {}, encoded));

    let resources_id = doc.add_object(dictionary! {
        "XObject" => dictionary! { "Im0" => image_id },
    });
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
        "Resources" => resources_id,
        "MediaBox" => vec![0.into(), 0.into(), w.into(), h.into()],
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    Ok(doc)
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use image::GenericImageView;
    use plotters::coord::Shift;
    use tempfile::TempDir;

    use super::*;

    /// Draws two coloured halves; no text, so no fonts are needed.
    struct Halves;

    impl Render for Halves {
        fn draw<DB: DrawingBackend>(
            &self,
            area: &DrawingArea<DB, Shift>,
        ) -> Result<(), RenderError> {
            let (left, right) = area.split_horizontally(50);
            left.fill(&RED).map_err(RenderError::draw)?;
            right.fill(&BLUE).map_err(RenderError::draw)?;
            Ok(())
        }
    }

    #[test]
    fn format_follows_extension() {
        assert_eq!(OutputFormat::from_path(Path::new("a/b.PNG")).unwrap(), OutputFormat::Png);
        assert_eq!(OutputFormat::from_path(Path::new("x.jpeg")).unwrap(), OutputFormat::Jpeg);
        assert_eq!(OutputFormat::from_path(Path::new("x.pdf")).unwrap(), OutputFormat::Pdf);
        assert!(matches!(
            OutputFormat::from_path(Path::new("x.gif")),
            Err(RenderError::UnsupportedFormat { .. })
        ));
    }

    #[test]
    fn rasterize_fills_buffer() {
        let pixels = rasterize(&Halves, (100, 20)).unwrap();
        assert_eq!(pixels.len(), 100 * 20 * 3);
        assert_eq!(&pixels[0..3], &[255, 0, 0]);
        let last = pixels.len() - 3;
        assert_eq!(&pixels[last..], &[0, 0, 255]);
    }

    #[test]
    fn png_and_jpeg_decode_back() {
        let dir = TempDir::new().unwrap();
        for name in ["nested/chart.png", "chart.jpg"] {
            let path: PathBuf = dir.path().join(name);
            save(&Halves, &path, (64, 32)).unwrap();
            let img = image::open(&path).unwrap();
            assert_eq!((img.width(), img.height()), (64, 32));
        }
    }

    #[test]
    fn pdf_has_one_page_of_image_size() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("chart.pdf");
        save(&Halves, &path, (64, 32)).unwrap();

        let bytes = fs::read(&path).unwrap();
        assert!(bytes.starts_with(b"%PDF-1.5"));
        let doc = Document::load(&path).unwrap();
        assert_eq!(doc.get_pages().len(), 1);
    }

    #[test]
    fn unsupported_extension_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("chart.bmp");
        assert!(save(&Halves, &path, (10, 10)).is_err());
        assert!(!path.exists());
    }
}
