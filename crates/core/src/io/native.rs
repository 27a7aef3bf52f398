//! Native GeoTIFF reading/writing (without GDAL dependency)
//!
//! Uses the `tiff` crate. Supports north-up georeferencing through the
//! ModelPixelScale/ModelTiepoint tags, EPSG codes from the GeoKey directory
//! and the GDAL_NODATA ASCII tag. For other formats, enable the `gdal` feature.

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::raster::{GeoTransform, Raster};
use ndarray::Array2;
use std::fs::File;
use std::io::{BufReader, Cursor};
use std::path::Path;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::colortype::{self, Gray32Float, RGB32Float, RGBA32Float};
use tiff::encoder::TiffEncoder;
use tiff::tags::Tag;
use tiff::ColorType;

const MODEL_PIXEL_SCALE: u16 = 33550;
const MODEL_TIEPOINT: u16 = 33922;
const GEO_KEY_DIRECTORY: u16 = 34735;
const GDAL_NODATA: u16 = 42113;

const GT_MODEL_TYPE_KEY: u16 = 1024;
const GT_RASTER_TYPE_KEY: u16 = 1025;
const GEOGRAPHIC_TYPE_KEY: u16 = 2048;
const PROJECTED_CS_TYPE_KEY: u16 = 3072;
const USER_DEFINED: u16 = 32767;

/// Canonical tag for a numeric code, whether or not the `tiff` crate names it
fn tag(code: u16) -> Tag {
    Tag::from_u16_exhaustive(code)
}

/// Options for writing GeoTIFF files
#[derive(Debug, Clone, Default)]
pub struct GeoTiffOptions {
    /// Write the CRS EPSG code into the GeoKey directory
    pub write_crs: bool,
}

/// Read every band of a GeoTIFF file into a Raster
pub fn read_geotiff<P: AsRef<Path>>(path: P) -> Result<Raster> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| Error::io_at(path, e))?;
    decode_geotiff(BufReader::new(file)).map_err(|e| match e {
        Error::Other(reason) => Error::RasterDecode {
            path: path.to_path_buf(),
            reason,
        },
        other => other,
    })
}

/// Read a GeoTIFF from an in-memory buffer
pub fn read_geotiff_from_buffer(data: &[u8]) -> Result<Raster> {
    decode_geotiff(Cursor::new(data))
}

fn samples_per_pixel(color: ColorType) -> Result<usize> {
    match color {
        ColorType::Gray(_) => Ok(1),
        ColorType::GrayA(_) => Ok(2),
        ColorType::RGB(_) => Ok(3),
        ColorType::RGBA(_) | ColorType::CMYK(_) => Ok(4),
        other => Err(Error::UnsupportedDataType(format!("{:?}", other))),
    }
}

fn to_f64_vec<T: num_traits::NumCast>(buf: Vec<T>) -> Vec<f64> {
    buf.into_iter()
        .map(|v| num_traits::cast(v).unwrap_or(f64::NAN))
        .collect()
}

/// The declared nodata as float32 samples store it, so that a value like 0.1
/// compares equal to the decoded pixels. Integer samples are exact in f64 and
/// a fractional nodata can never match them, so those keep the declared value.
fn nodata_as_f32(value: f64) -> f64 {
    value as f32 as f64
}

fn nodata_as_declared(value: f64) -> f64 {
    value
}

/// Internal: decode a GeoTIFF from any `Read + Seek` source
fn decode_geotiff<R>(reader: R) -> Result<Raster>
where
    R: std::io::Read + std::io::Seek,
{
    let mut decoder =
        Decoder::new(reader).map_err(|e| Error::Other(format!("TIFF decode error: {}", e)))?;

    let (width, height) = decoder
        .dimensions()
        .map_err(|e| Error::Other(format!("Cannot read dimensions: {}", e)))?;
    let rows = height as usize;
    let cols = width as usize;

    let color = decoder
        .colortype()
        .map_err(|e| Error::Other(format!("Cannot read color type: {}", e)))?;
    let samples = samples_per_pixel(color)?;

    let result = decoder
        .read_image()
        .map_err(|e| Error::Other(format!("Cannot read image data: {}", e)))?;

    let (data, round): (Vec<f64>, fn(f64) -> f64) = match result {
        DecodingResult::U8(buf) => (to_f64_vec(buf), nodata_as_declared),
        DecodingResult::U16(buf) => (to_f64_vec(buf), nodata_as_declared),
        DecodingResult::U32(buf) => (to_f64_vec(buf), nodata_as_declared),
        DecodingResult::U64(buf) => (to_f64_vec(buf), nodata_as_declared),
        DecodingResult::I8(buf) => (to_f64_vec(buf), nodata_as_declared),
        DecodingResult::I16(buf) => (to_f64_vec(buf), nodata_as_declared),
        DecodingResult::I32(buf) => (to_f64_vec(buf), nodata_as_declared),
        DecodingResult::I64(buf) => (to_f64_vec(buf), nodata_as_declared),
        DecodingResult::F32(buf) => (to_f64_vec(buf), nodata_as_f32),
        DecodingResult::F64(buf) => (buf, nodata_as_declared),
        #[allow(unreachable_patterns)]
        _ => {
            return Err(Error::UnsupportedDataType(
                "Unsupported TIFF pixel format".to_string(),
            ))
        }
    };

    if data.len() != rows * cols * samples {
        return Err(Error::InvalidDimensions {
            width: cols,
            height: rows,
        });
    }

    // Chunky layout: samples of one pixel are adjacent
    let bands: Vec<Array2<f64>> = (0..samples)
        .map(|b| {
            Array2::from_shape_fn((rows, cols), |(r, c)| data[(r * cols + c) * samples + b])
        })
        .collect();

    let mut raster = Raster::from_bands(bands)?;

    if let Some(transform) = read_geotransform(&mut decoder) {
        raster.set_transform(transform);
    }
    raster.set_crs(read_epsg(&mut decoder).map(CRS::from_epsg));
    raster.set_nodata(read_nodata(&mut decoder).map(round));

    Ok(raster)
}

/// GeoTransform from ModelPixelScaleTag + ModelTiepointTag
fn read_geotransform<R: std::io::Read + std::io::Seek>(
    decoder: &mut Decoder<R>,
) -> Option<GeoTransform> {
    let scale = decoder.get_tag_f64_vec(tag(MODEL_PIXEL_SCALE)).ok()?;
    let tiepoint = decoder.get_tag_f64_vec(tag(MODEL_TIEPOINT)).ok()?;

    if scale.len() < 2 || tiepoint.len() < 6 {
        return None;
    }

    // tiepoint: [I, J, K, X, Y, Z], scale: [ScaleX, ScaleY, ScaleZ]
    let origin_x = tiepoint[3] - tiepoint[0] * scale[0];
    let origin_y = tiepoint[4] + tiepoint[1] * scale[1];
    Some(GeoTransform::new(origin_x, origin_y, scale[0], -scale[1]))
}

/// EPSG code from the GeoKey directory (projected key wins over geographic)
fn read_epsg<R: std::io::Read + std::io::Seek>(decoder: &mut Decoder<R>) -> Option<u32> {
    let keys = decoder.get_tag_u16_vec(tag(GEO_KEY_DIRECTORY)).ok()?;
    if keys.len() < 4 {
        return None;
    }
    let count = keys[3] as usize;

    let mut geographic = None;
    let mut projected = None;
    for entry in keys[4..].chunks_exact(4).take(count) {
        let (key, location, value) = (entry[0], entry[1], entry[3]);
        // location 0: value stored inline
        if location != 0 || value == 0 || value == USER_DEFINED {
            continue;
        }
        match key {
            PROJECTED_CS_TYPE_KEY => projected = Some(value as u32),
            GEOGRAPHIC_TYPE_KEY => geographic = Some(value as u32),
            _ => {}
        }
    }
    projected.or(geographic)
}

fn read_nodata<R: std::io::Read + std::io::Seek>(decoder: &mut Decoder<R>) -> Option<f64> {
    let text = decoder.get_tag_ascii_string(tag(GDAL_NODATA)).ok()?;
    let text = text.trim_matches(char::from(0)).trim();
    match text.to_ascii_lowercase().as_str() {
        "nan" => Some(f64::NAN),
        _ => text.parse().ok(),
    }
}

/// Write a Raster to a GeoTIFF file as 32-bit float.
///
/// One, three or four bands are supported, stored pixel-interleaved.
pub fn write_geotiff<P: AsRef<Path>>(
    raster: &Raster,
    path: P,
    options: Option<GeoTiffOptions>,
) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path).map_err(|e| Error::io_at(path, e))?;
    encode_geotiff(raster, file, &options.unwrap_or_default())
}

/// Write a Raster to an in-memory GeoTIFF buffer
pub fn write_geotiff_to_buffer(raster: &Raster, options: Option<GeoTiffOptions>) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    encode_geotiff(raster, Cursor::new(&mut buf), &options.unwrap_or_default())?;
    Ok(buf)
}

fn geokeys_for(crs: Option<&CRS>, write_crs: bool) -> Vec<u16> {
    let code = crs
        .filter(|_| write_crs)
        .and_then(|c| c.epsg())
        .and_then(|c| u16::try_from(c).ok());

    let geographic = crs.map(|c| c.is_geographic()).unwrap_or(false);
    // GTModelType: 1 = projected, 2 = geographic
    let model = if geographic { 2 } else { 1 };

    let mut keys = vec![
        GT_MODEL_TYPE_KEY, 0, 1, model,
        GT_RASTER_TYPE_KEY, 0, 1, 1, // RasterPixelIsArea
    ];
    if let Some(code) = code {
        let key = if geographic {
            GEOGRAPHIC_TYPE_KEY
        } else {
            PROJECTED_CS_TYPE_KEY
        };
        keys.extend_from_slice(&[key, 0, 1, code]);
    }
    let mut directory = vec![1, 1, 0, (keys.len() / 4) as u16];
    directory.extend(keys);
    directory
}

/// Internal: encode a Raster as GeoTIFF into any `Write + Seek` sink
fn encode_geotiff<W>(raster: &Raster, writer: W, options: &GeoTiffOptions) -> Result<()>
where
    W: std::io::Write + std::io::Seek,
{
    if !raster.transform().is_north_up() {
        return Err(Error::Other(
            "native GeoTIFF writer only supports north-up transforms".to_string(),
        ));
    }

    let mut encoder = TiffEncoder::new(writer)
        .map_err(|e| Error::Other(format!("TIFF encoder error: {}", e)))?;

    let bands = raster.band_count();
    let planes = (0..bands)
        .map(|b| raster.band(b))
        .collect::<Result<Vec<_>>>()?;
    // Chunky layout: samples of one pixel are adjacent
    let (rows, cols) = raster.shape();
    let mut data: Vec<f32> = Vec::with_capacity(rows * cols * bands);
    for (r, c) in ndarray::indices((rows, cols)) {
        data.extend(planes.iter().map(|p| p[(r, c)] as f32));
    }

    match bands {
        1 => write_image::<Gray32Float, W>(&mut encoder, raster, &data, options),
        3 => write_image::<RGB32Float, W>(&mut encoder, raster, &data, options),
        4 => write_image::<RGBA32Float, W>(&mut encoder, raster, &data, options),
        n => Err(Error::UnsupportedDataType(format!(
            "native GeoTIFF writer cannot store {} bands",
            n
        ))),
    }
}

fn write_image<C, W>(
    encoder: &mut TiffEncoder<W>,
    raster: &Raster,
    data: &[f32],
    options: &GeoTiffOptions,
) -> Result<()>
where
    C: colortype::ColorType<Inner = f32>,
    W: std::io::Write + std::io::Seek,
{
    let gt = raster.transform();
    let (rows, cols) = raster.shape();
    let mut image = encoder
        .new_image::<C>(cols as u32, rows as u32)
        .map_err(|e| Error::Other(format!("Cannot create TIFF image: {}", e)))?;

    let scale = [gt.pixel_width, gt.pixel_height.abs(), 0.0];
    image
        .encoder()
        .write_tag(tag(MODEL_PIXEL_SCALE), &scale[..])
        .map_err(|e| Error::Other(format!("Cannot write scale tag: {}", e)))?;

    let tiepoint = [0.0, 0.0, 0.0, gt.origin_x, gt.origin_y, 0.0];
    image
        .encoder()
        .write_tag(tag(MODEL_TIEPOINT), &tiepoint[..])
        .map_err(|e| Error::Other(format!("Cannot write tiepoint tag: {}", e)))?;

    let geokeys = geokeys_for(raster.crs(), options.write_crs);
    image
        .encoder()
        .write_tag(tag(GEO_KEY_DIRECTORY), &geokeys[..])
        .map_err(|e| Error::Other(format!("Cannot write geokey tag: {}", e)))?;

    if let Some(nodata) = raster.nodata() {
        let text = if nodata.is_nan() {
            "nan".to_string()
        } else {
            nodata.to_string()
        };
        image
            .encoder()
            .write_tag(tag(GDAL_NODATA), text.as_str())
            .map_err(|e| Error::Other(format!("Cannot write nodata tag: {}", e)))?;
    }

    image
        .write_data(data)
        .map_err(|e| Error::Other(format!("Cannot write image data: {}", e)))?;

    Ok(())
}
