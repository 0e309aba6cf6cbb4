//! Writing simulated movies to disk.
//!
//! A movie is stored as a headerless little-endian u16 frame stack
//! (`<name>.raw`) with a JSON sidecar describing it (`<name>.json`).

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use image::{ImageBuffer, Luma};
use ndarray::Array2;
use tracing::info;

use crate::error::{Result, SimulationError};
use crate::simulation::{Movie, SimulationInfo};

/// Write the frames back to back in row-major order.
pub fn save_raw(path: impl AsRef<Path>, frames: &[Array2<u16>]) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path.as_ref())?);
    for frame in frames {
        for &value in frame.iter() {
            writer.write_all(&value.to_le_bytes())?;
        }
    }
    writer.flush()?;
    Ok(())
}

/// Read a stack written by [`save_raw`].
pub fn load_raw(path: impl AsRef<Path>, width: usize, height: usize) -> Result<Vec<Array2<u16>>> {
    let bytes = std::fs::read(path.as_ref())?;
    let frame_bytes = width * height * 2;
    if frame_bytes == 0 || bytes.len() % frame_bytes != 0 {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!(
                "{} bytes is not a whole number of {width}x{height} u16 frames",
                bytes.len()
            ),
        )
        .into());
    }

    bytes
        .chunks_exact(frame_bytes)
        .map(|chunk| {
            let values: Vec<u16> = chunk
                .chunks_exact(2)
                .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
                .collect();
            Array2::from_shape_vec((height, width), values).map_err(|e| {
                SimulationError::from(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    e.to_string(),
                ))
            })
        })
        .collect()
}

pub fn save_info(path: impl AsRef<Path>, info: &SimulationInfo) -> Result<()> {
    let writer = BufWriter::new(File::create(path.as_ref())?);
    serde_json::to_writer_pretty(writer, info)?;
    Ok(())
}

pub fn load_info(path: impl AsRef<Path>) -> Result<SimulationInfo> {
    let content = std::fs::read_to_string(path.as_ref())?;
    Ok(serde_json::from_str(&content)?)
}

/// Write `<base>.raw` and `<base>.json`, returning both paths.
pub fn save_movie(base: impl AsRef<Path>, movie: &Movie) -> Result<(PathBuf, PathBuf)> {
    let raw_path = base.as_ref().with_extension("raw");
    let info_path = base.as_ref().with_extension("json");
    save_raw(&raw_path, &movie.frames)?;
    save_info(&info_path, &movie.info)?;
    info!(
        raw = %raw_path.display(),
        info = %info_path.display(),
        frames = movie.frames.len(),
        "saved movie"
    );
    Ok((raw_path, info_path))
}

/// Save one frame as a 16-bit grayscale PNG, contrast-stretched to its maximum.
pub fn save_preview_png(path: impl AsRef<Path>, frame: &Array2<u16>) -> Result<()> {
    let (height, width) = frame.dim();
    let max = frame.iter().copied().max().unwrap_or(0).max(1);
    let scale = f64::from(u16::MAX) / f64::from(max);

    let mut output = ImageBuffer::<Luma<u16>, Vec<u16>>::new(width as u32, height as u32);
    for ((row, col), &value) in frame.indexed_iter() {
        let stretched = (f64::from(value) * scale).round() as u16;
        output.put_pixel(col as u32, row as u32, Luma([stretched]));
    }
    output.save(path.as_ref())?;
    Ok(())
}
